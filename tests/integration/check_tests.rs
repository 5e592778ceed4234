use dupescan::cache::{HashState, HashStore, ScanMode};
use dupescan::engine::{check_tree, ScanConfig, Scanner};
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_check_after_partial_scan() {
    let dir = tempdir().unwrap();
    let store = Arc::new(HashStore::open(&dir.path().join("hashes.db")).unwrap());
    let root = dir.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("big"), vec![1u8; 64]).unwrap();
    fs::write(root.join("small"), b"tiny").unwrap();

    let config = ScanConfig::default()
        .with_mode(ScanMode::Partial)
        .with_partial_threshold(32);
    Scanner::new(Arc::clone(&store), config).scan(&root).unwrap();
    fs::write(root.join("late"), b"added after scan").unwrap();

    let mut states = Vec::new();
    let report = check_tree(&store, &root, false, None, |entry| {
        states.push((entry.path.file_name().unwrap().to_owned(), entry.state));
    })
    .unwrap();

    assert_eq!(report.found, 2);
    assert_eq!(report.not_found, 1);
    assert!(report.errors.is_empty());
    assert_eq!(
        states,
        vec![
            ("big".into(), HashState::Partial),
            ("late".into(), HashState::NotFound),
            ("small".into(), HashState::Full),
        ]
    );
}

#[test]
fn test_check_honors_shutdown() {
    let dir = tempdir().unwrap();
    let store = HashStore::open(&dir.path().join("hashes.db")).unwrap();
    fs::write(dir.path().join("f"), b"x").unwrap();

    let flag = Arc::new(AtomicBool::new(true));
    let report = check_tree(&store, dir.path(), false, Some(&flag), |_| {
        panic!("no entries expected after shutdown");
    })
    .unwrap();
    assert!(report.interrupted);
}
