use dupescan::cache::{HashState, HashStore, ScanMode};
use dupescan::engine::{ScanConfig, Scanner};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const MIB: u64 = 1024 * 1024;

fn open_store(dir: &TempDir) -> Arc<HashStore> {
    Arc::new(HashStore::open(&dir.path().join("state/hashes.db")).unwrap())
}

fn scan(store: &Arc<HashStore>, root: &Path, config: ScanConfig) -> dupescan::engine::ScanSummary {
    Scanner::new(Arc::clone(store), config).scan(root).unwrap()
}

fn hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

fn media_tree(dir: &TempDir) -> (PathBuf, PathBuf, PathBuf, Vec<u8>) {
    let root = dir.path().join("media");
    fs::create_dir(&root).unwrap();
    let small = root.join("notes.txt");
    fs::write(&small, b"0123456789").unwrap();
    let big = root.join("movie.bin");
    let content: Vec<u8> = (0..10 * MIB).map(|i| (i % 251) as u8).collect();
    fs::write(&big, &content).unwrap();
    (root, small, big, content)
}

#[test]
fn test_partial_then_full_then_nothing() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let (root, small, big, content) = media_tree(&dir);
    let partial = ScanConfig::default()
        .with_mode(ScanMode::Partial)
        .with_partial_threshold(2 * MIB);

    // Partial pass: the small file is covered completely, the big one only by prefix.
    let first = scan(&store, &root, partial);
    assert_eq!(first.hashed_partial, 2);
    assert_eq!(first.hashed_full, 0);

    let small_rec = store.record(&small).unwrap().unwrap();
    assert_eq!(small_rec.state(), HashState::Full);
    assert_eq!(small_rec.full_hash.as_deref(), Some(hex(b"0123456789").as_str()));
    assert_eq!(small_rec.partial_hash, small_rec.full_hash);

    let big_rec = store.record(&big).unwrap().unwrap();
    assert_eq!(big_rec.state(), HashState::Partial);
    let prefix_hex = hex(&content[..(2 * MIB) as usize]);
    assert_eq!(big_rec.partial_hash.as_deref(), Some(prefix_hex.as_str()));
    assert_eq!(big_rec.full_hash, None);

    // Full pass escalates only the big file and keeps its partial hash.
    let full = ScanConfig::default().with_partial_threshold(2 * MIB);
    let second = scan(&store, &root, full.clone());
    assert_eq!(second.hashed_full, 1);
    assert_eq!(second.escalated, 1);
    assert_eq!(second.skipped, 1);

    let big_rec = store.record(&big).unwrap().unwrap();
    assert_eq!(big_rec.state(), HashState::Full);
    assert_eq!(big_rec.full_hash.as_deref(), Some(hex(&content).as_str()));
    assert_eq!(big_rec.partial_hash.as_deref(), Some(prefix_hex.as_str()));

    // Everything is full now; the leaf root is pruned without visiting files.
    let third = scan(&store, &root, full);
    assert_eq!(third.hashed(), 0);
    assert_eq!(third.dirs_skipped, 1);
    assert_eq!(third.files_seen, 0);
}

#[test]
fn test_partial_scan_skips_partial_records() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let (root, _, _, _) = media_tree(&dir);
    let partial = ScanConfig::default()
        .with_mode(ScanMode::Partial)
        .with_partial_threshold(2 * MIB)
        .with_skip_known_dirs(false);

    scan(&store, &root, partial.clone());
    let again = scan(&store, &root, partial);
    assert_eq!(again.hashed(), 0);
    assert_eq!(again.skipped, 2);
}

#[test]
fn test_full_scan_never_prunes_directory_of_partial_records() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let (root, _, big, _) = media_tree(&dir);

    let partial = ScanConfig::default()
        .with_mode(ScanMode::Partial)
        .with_partial_threshold(2 * MIB);
    scan(&store, &root, partial.clone());

    // A second partial scan may prune: every file has some hash.
    let partial_again = scan(&store, &root, partial);
    assert_eq!(partial_again.dirs_skipped, 1);

    let full = scan(&store, &root, ScanConfig::default().with_partial_threshold(2 * MIB));
    assert_eq!(full.dirs_skipped, 0);
    assert_eq!(store.lookup(&big).unwrap(), HashState::Full);
}

#[test]
fn test_file_exactly_at_threshold_gets_partial_only() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let root = dir.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("exact"), [7u8; 16]).unwrap();
    fs::write(root.join("under"), [7u8; 15]).unwrap();

    let config = ScanConfig::default()
        .with_mode(ScanMode::Partial)
        .with_partial_threshold(16);
    scan(&store, &root, config);

    assert_eq!(store.lookup(&root.join("exact")).unwrap(), HashState::Partial);
    assert_eq!(store.lookup(&root.join("under")).unwrap(), HashState::Full);
}

#[test]
fn test_new_file_in_known_directory_is_hashed() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let root = dir.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("a"), b"alpha").unwrap();

    scan(&store, &root, ScanConfig::default());
    fs::write(root.join("b"), b"beta").unwrap();

    let again = scan(&store, &root, ScanConfig::default());
    assert_eq!(again.dirs_skipped, 0);
    assert_eq!(again.hashed_full, 1);
    assert_eq!(again.skipped, 1);
}

#[test]
fn test_known_parent_still_descends() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let root = dir.path().join("data");
    fs::create_dir_all(root.join("child")).unwrap();
    fs::write(root.join("top"), b"top").unwrap();
    fs::write(root.join("child/inner"), b"inner").unwrap();

    scan(&store, &root, ScanConfig::default());
    let again = scan(&store, &root, ScanConfig::default());

    // The root's own file is skipped via the directory check, the child is pruned.
    assert_eq!(again.hashed(), 0);
    assert_eq!(again.skipped, 1);
    assert_eq!(again.dirs_skipped, 1);
}

#[test]
fn test_disabling_dir_skip_visits_every_file() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let root = dir.path().join("data");
    fs::create_dir_all(root.join("x/y")).unwrap();
    fs::write(root.join("x/y/f"), b"f").unwrap();
    fs::write(root.join("x/g"), b"g").unwrap();

    scan(&store, &root, ScanConfig::default());
    let again = scan(&store, &root, ScanConfig::default().with_skip_known_dirs(false));
    assert_eq!(again.files_seen, 2);
    assert_eq!(again.skipped, 2);
    assert_eq!(again.dirs_skipped, 0);
}

#[test]
fn test_many_files_across_threads_all_recorded() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let root = dir.path().join("bulk");
    for d in 0..5 {
        let sub = root.join(format!("d{d}"));
        fs::create_dir_all(&sub).unwrap();
        for f in 0..40 {
            fs::write(sub.join(format!("f{f}")), format!("{d}-{f}")).unwrap();
        }
    }

    let config = ScanConfig::default().with_io_threads(8).with_batch_size(7);
    let summary = scan(&store, &root, config);
    assert_eq!(summary.hashed_full, 200);
    assert!(summary.errors.is_empty());
    assert_eq!(store.count().unwrap(), 200);
}

#[test]
fn test_single_file_root() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let file = dir.path().join("lonely.txt");
    fs::write(&file, b"just me").unwrap();

    let summary = scan(&store, &file, ScanConfig::default());
    assert_eq!(summary.hashed_full, 1);
    assert_eq!(store.lookup(&file).unwrap(), HashState::Full);
}

#[test]
fn test_relative_root_records_absolute_paths() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let root = dir.path().join("rel");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("f"), b"data").unwrap();

    let cwd = std::env::current_dir().unwrap();
    let relative = pathdiff(&root, &cwd);
    scan(&store, &relative, ScanConfig::default());

    let paths = store.list_paths().unwrap();
    assert_eq!(paths, vec![root.join("f")]);
}

#[test]
fn test_dotted_root_shares_rows_with_plain_root() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let d = dir.path().join("d");
    fs::create_dir_all(d.join("sub")).unwrap();
    fs::write(d.join("good"), b"good").unwrap();
    fs::write(d.join("sub/f"), b"nested").unwrap();

    let first = scan(&store, &d.join("sub").join(".."), ScanConfig::default());
    assert_eq!(first.hashed_full, 2);

    let second = scan(&store, &d, ScanConfig::default());
    assert_eq!(second.hashed(), 0);
    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(store.list_paths().unwrap(), vec![d.join("good"), d.join("sub/f")]);
}

/// Build a `../..`-style relative path from `base` to `target`.
fn pathdiff(target: &Path, base: &Path) -> PathBuf {
    let target: Vec<_> = target.components().collect();
    let base: Vec<_> = base.components().collect();
    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for part in &target[common..] {
        out.push(part.as_os_str());
    }
    out
}
