use std::time::Duration;

use counsel_core::retention::sweep;

#[test]
fn test_sweep_of_missing_roots_is_a_noop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ghost = dir.path().join("does-not-exist");
    let stats = sweep(&[ghost], Duration::from_secs(3600));
    assert_eq!(stats.scanned, 0);
    assert_eq!(stats.deleted, 0);
    assert!(stats.errors.is_empty());
}

#[test]
fn test_sweep_respects_retention_window() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_path_buf();

    std::fs::write(root.join("case.md"), b"demand letter").expect("write file");
    std::fs::create_dir(root.join("case-dir")).expect("mkdir");
    std::fs::write(root.join("case-dir").join("memo.md"), b"memo").expect("write nested");

    // Everything is brand new: an hour-long window deletes nothing.
    let stats = sweep(std::slice::from_ref(&root), Duration::from_secs(3600));
    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.deleted, 0);
    assert!(root.join("case.md").exists());

    // Age the items past a one-second window.
    std::thread::sleep(Duration::from_millis(1200));
    let stats = sweep(std::slice::from_ref(&root), Duration::from_secs(1));
    assert_eq!(stats.deleted, 2);
    assert!(stats.bytes_freed > 0);
    assert!(!root.join("case.md").exists());
    assert!(!root.join("case-dir").exists());
    assert!(stats.errors.is_empty());
}
