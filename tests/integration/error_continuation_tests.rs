use dupescan::cache::{HashState, HashStore};
use dupescan::engine::{ScanConfig, ScanRunError, Scanner};
use dupescan::scanner::ScanError;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_zero_byte_files_are_never_recorded() {
    let dir = tempdir().unwrap();
    let store = Arc::new(HashStore::open(&dir.path().join("hashes.db")).unwrap());
    let root = dir.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("empty"), b"").unwrap();
    fs::write(root.join("full"), b"content").unwrap();

    let summary = Scanner::new(Arc::clone(&store), ScanConfig::default())
        .scan(&root)
        .unwrap();
    assert_eq!(summary.empty_files, 1);
    assert_eq!(summary.hashed_full, 1);
    assert_eq!(store.lookup(&root.join("empty")).unwrap(), HashState::NotFound);

    // Empty files do not keep a directory from being pruned next time.
    let again = Scanner::new(Arc::clone(&store), ScanConfig::default())
        .scan(&root)
        .unwrap();
    assert_eq!(again.dirs_skipped, 1);
}

#[test]
fn test_directory_of_only_empty_files_is_not_pruned() {
    let dir = tempdir().unwrap();
    let store = Arc::new(HashStore::open(&dir.path().join("hashes.db")).unwrap());
    let root = dir.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("a"), b"").unwrap();

    let scanner = Scanner::new(Arc::clone(&store), ScanConfig::default());
    scanner.scan(&root).unwrap();
    let again = scanner.scan(&root).unwrap();
    assert_eq!(again.dirs_skipped, 0);
    assert_eq!(again.empty_files, 1);
    assert_eq!(store.count().unwrap(), 0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_undecodable_name_is_reported_and_scan_continues() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let store = Arc::new(HashStore::open(&dir.path().join("hashes.db")).unwrap());
    let root = dir.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join(OsStr::from_bytes(b"bad\xff.bin")), b"bytes").unwrap();
    fs::write(root.join("good.bin"), b"other bytes").unwrap();

    let summary = Scanner::new(Arc::clone(&store), ScanConfig::default())
        .scan(&root)
        .unwrap();

    assert_eq!(summary.hashed_full, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(matches!(summary.errors[0], ScanError::InvalidName(_)));
    assert_eq!(store.lookup(&root.join("good.bin")).unwrap(), HashState::Full);
}

#[test]
fn test_missing_root_aborts() {
    let dir = tempdir().unwrap();
    let store = Arc::new(HashStore::open(&dir.path().join("hashes.db")).unwrap());
    let result = Scanner::new(store, ScanConfig::default()).scan(&dir.path().join("absent"));
    assert!(matches!(result, Err(ScanRunError::PathNotFound(_))));
}

#[cfg(unix)]
#[test]
fn test_dangling_symlink_is_ignored() {
    let dir = tempdir().unwrap();
    let store = Arc::new(HashStore::open(&dir.path().join("hashes.db")).unwrap());
    let root = dir.path().join("data");
    fs::create_dir(&root).unwrap();
    std::os::unix::fs::symlink(root.join("nowhere"), root.join("dangling")).unwrap();
    fs::write(root.join("real"), b"real").unwrap();

    let summary = Scanner::new(Arc::clone(&store), ScanConfig::default())
        .scan(&root)
        .unwrap();
    assert_eq!(summary.hashed_full, 1);
    assert!(summary.errors.is_empty());
}
