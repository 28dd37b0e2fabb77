use reclaim::duplicates::scan;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_hardlinks_group_and_count_physical_once() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.bin");
    let link = dir.path().join("link.bin");
    let copy = dir.path().join("copy.bin");
    fs::write(&original, [5u8; 3000]).unwrap();
    fs::write(&copy, [5u8; 3000]).unwrap();
    if let Err(e) = fs::hard_link(&original, &link) {
        eprintln!("Skipping hardlink test: {e}");
        return;
    }

    let report = scan(dir.path(), 0).unwrap();

    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.len(), 3);
    assert_eq!(group.reclaimable(), 6000);

    if cfg!(unix) {
        assert_eq!(report.summary.hardlinks, 1);
        assert_eq!(report.summary.total_size, 9000);
        assert_eq!(report.summary.physical_size, 6000);
        assert_eq!(group.physical_reclaimable(), 3000);
        assert_eq!(report.summary.physical_reclaimable, 3000);
        assert_eq!(group.files.iter().filter(|f| f.is_hardlink).count(), 1);
    }
}

#[cfg(unix)]
#[test]
fn test_symlinks_never_followed() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    let real = dir.path().join("real");
    fs::create_dir(&real).unwrap();
    fs::write(real.join("data.bin"), [1u8; 500]).unwrap();

    // A file symlink and a directory symlink pointing back at real data
    symlink(real.join("data.bin"), dir.path().join("data-link.bin")).unwrap();
    symlink(&real, dir.path().join("real-link")).unwrap();
    // A loop
    symlink(dir.path(), real.join("loop")).unwrap();

    let report = scan(dir.path(), 0).unwrap();

    assert_eq!(report.summary.total_files, 1);
    assert!(report.groups.is_empty());
    assert!(report.warnings.is_empty());
}

#[cfg(unix)]
#[test]
fn test_symlinked_root_rejected() {
    use reclaim::duplicates::FinderError;
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    let real = dir.path().join("real");
    fs::create_dir(&real).unwrap();
    let link = dir.path().join("link");
    symlink(&real, &link).unwrap();

    assert!(matches!(scan(&link, 0), Err(FinderError::NotADirectory(_))));
}
