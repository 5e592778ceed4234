use clap::Parser;
use dupescan::cache::{HashState, HashStore};
use dupescan::cli::Cli;
use dupescan::error::ExitCode;
use dupescan::run_app;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use super::env_lock;

fn run(db: &Path, args: &[&str]) -> ExitCode {
    let mut argv = vec!["dupescan", "-q", "--db", db.to_str().unwrap()];
    argv.extend_from_slice(args);
    run_app(Cli::try_parse_from(argv).unwrap()).unwrap()
}

#[test]
fn test_scan_check_prune_roundtrip() {
    let _lock = env_lock();
    let dir = tempdir().unwrap();
    let db = dir.path().join("db/hashes.db");
    let root = dir.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("keep"), b"keep me").unwrap();
    fs::write(root.join("drop"), b"drop me").unwrap();
    let root_str = root.to_str().unwrap();

    assert_eq!(run(&db, &["scan", "--partial", root_str]), ExitCode::Success);
    assert_eq!(run(&db, &["check", root_str]), ExitCode::Success);

    fs::remove_file(root.join("drop")).unwrap();
    assert_eq!(run(&db, &["prune"]), ExitCode::Success);

    let store = HashStore::open(&db).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    // Files below the default limit are fully covered by a partial scan.
    assert_eq!(store.lookup(&root.join("keep")).unwrap(), HashState::Full);
}

#[cfg(target_os = "linux")]
#[test]
fn test_undecodable_name_does_not_fail_the_command() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let _lock = env_lock();
    let dir = tempdir().unwrap();
    let db = dir.path().join("hashes.db");
    let root = dir.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join(OsStr::from_bytes(b"bad\xff.bin")), b"bytes").unwrap();
    fs::write(root.join("good.bin"), b"other bytes").unwrap();
    let root_str = root.to_str().unwrap();

    assert_eq!(run(&db, &["scan", root_str]), ExitCode::Success);
    assert_eq!(run(&db, &["check", root_str]), ExitCode::Success);
    assert_eq!(HashStore::open(&db).unwrap().count().unwrap(), 1);
}

#[test]
fn test_scan_missing_path_is_an_error() {
    let _lock = env_lock();
    let dir = tempdir().unwrap();
    let db = dir.path().join("hashes.db");
    let cli = Cli::try_parse_from([
        "dupescan",
        "-q",
        "--db",
        db.to_str().unwrap(),
        "scan",
        dir.path().join("nope").to_str().unwrap(),
    ])
    .unwrap();

    let err = run_app(cli).unwrap_err();
    assert!(format!("{err:#}").contains("Path not found"));
}

#[test]
fn test_unusable_database_is_an_error() {
    let _lock = env_lock();
    let dir = tempdir().unwrap();
    let db = dir.path().join("garbage.db");
    fs::write(&db, b"definitely not sqlite, just some plain text bytes").unwrap();
    let cli = Cli::try_parse_from(["dupescan", "-q", "--db", db.to_str().unwrap(), "prune"])
        .unwrap();

    let err = run_app(cli).unwrap_err();
    assert!(format!("{err:#}").contains("Cannot open hash database"));
}

#[test]
fn test_explicit_config_file_is_used() {
    let _lock = env_lock();
    let dir = tempdir().unwrap();
    let db = dir.path().join("from-config.db");
    let config = dir.path().join("dupescan.toml");
    fs::write(&config, format!("database = {:?}\n", db.to_str().unwrap())).unwrap();
    let root = dir.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("f"), b"x").unwrap();

    let cli = Cli::try_parse_from([
        "dupescan",
        "-q",
        "--config",
        config.to_str().unwrap(),
        "scan",
        root.to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(run_app(cli).unwrap(), ExitCode::Success);
    assert_eq!(HashStore::open(&db).unwrap().count().unwrap(), 1);
}
