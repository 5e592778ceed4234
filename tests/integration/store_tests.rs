use dupescan::cache::{HashState, HashStore, ScanMode, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn test_open_corrupted_database() {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(temp_file.path(), b"not a sqlite database at all, just bytes").unwrap();

    let res = HashStore::open(temp_file.path());
    assert!(matches!(res, Err(StoreError::Open { .. }) | Err(StoreError::Sqlite(_))));
}

#[test]
fn test_recovery_by_recreating_database() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();
    fs::write(path, b"corrupted garbage").unwrap();
    assert!(HashStore::open(path).is_err());

    fs::remove_file(path).unwrap();
    let store = HashStore::open(path).unwrap();
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_open_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("a/b/c/hashes.db");
    let store = HashStore::open(&db).unwrap();
    assert!(db.exists());
    assert_eq!(store.path(), db.as_path());
}

#[test]
fn test_records_survive_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hashes.db");
    {
        let store = HashStore::open(&db).unwrap();
        store
            .upsert(Path::new("/m/a.mkv"), 100, "p1", ScanMode::Partial, 10)
            .unwrap();
    }
    let store = HashStore::open(&db).unwrap();
    assert_eq!(
        store.lookup(Path::new("/m/a.mkv")).unwrap(),
        HashState::Partial
    );
}

#[test]
fn test_concurrent_writers_and_readers() {
    let dir = tempdir().unwrap();
    let store = Arc::new(HashStore::open(&dir.path().join("hashes.db")).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    let path = PathBuf::from(format!("/t{t}/f{i}"));
                    store
                        .upsert(&path, 1000, &format!("{t}:{i}"), ScanMode::Full, 10)
                        .unwrap();
                    assert_eq!(store.lookup(&path).unwrap(), HashState::Full);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.count().unwrap(), 200);
    let all: Vec<PathBuf> = (0..4)
        .flat_map(|t| (0..50).map(move |i| PathBuf::from(format!("/t{t}/f{i}"))))
        .collect();
    assert!(store.batch_satisfies(&all, ScanMode::Full).unwrap());
}

#[test]
fn test_batch_checks_span_many_chunks() {
    let dir = tempdir().unwrap();
    let store = HashStore::open(&dir.path().join("hashes.db")).unwrap();
    let paths: Vec<PathBuf> = (0..1200)
        .map(|i| PathBuf::from(format!("/bulk/{i:05}")))
        .collect();
    for path in &paths {
        store.upsert(path, 50, "pp", ScanMode::Partial, 10).unwrap();
    }

    assert!(store.batch_exists(&paths).unwrap());
    assert!(store.batch_satisfies(&paths, ScanMode::Partial).unwrap());
    assert!(!store.batch_satisfies(&paths, ScanMode::Full).unwrap());

    let mut with_missing = paths.clone();
    with_missing.push(PathBuf::from("/bulk/missing"));
    assert!(!store.batch_exists(&with_missing).unwrap());
}
