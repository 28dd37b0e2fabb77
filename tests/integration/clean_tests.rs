use reclaim::actions::{clean_group, clean_groups, DeleteError, SafeDelete};
use reclaim::duplicates::{scan, RetentionPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Moves removed files into a private directory, like a trash can.
struct MoveToDir {
    bin: TempDir,
}

impl MoveToDir {
    fn new() -> Self {
        Self {
            bin: tempdir().unwrap(),
        }
    }

    fn contents(&self) -> usize {
        fs::read_dir(self.bin.path()).unwrap().count()
    }
}

impl SafeDelete for MoveToDir {
    fn remove(&self, path: &Path) -> Result<(), DeleteError> {
        let name = path.to_string_lossy().replace(['/', '\\', ':'], "_");
        fs::rename(path, self.bin.path().join(name)).map_err(|source| DeleteError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn set_mtime(path: &Path, secs: i64) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(secs, 0)).unwrap();
}

fn setup() -> (TempDir, Vec<PathBuf>) {
    let dir = tempdir().unwrap();
    let paths: Vec<PathBuf> = ["a.bin", "b.bin", "c.bin"]
        .iter()
        .map(|name| dir.path().join(name))
        .collect();
    for (i, path) in paths.iter().enumerate() {
        fs::write(path, [42u8; 2000]).unwrap();
        set_mtime(path, 1_600_000_000 + i as i64 * 10);
    }
    (dir, paths)
}

#[test]
fn test_clean_keeps_newest_copy() {
    let (dir, paths) = setup();
    let report = scan(dir.path(), 0).unwrap();
    let bin = MoveToDir::new();

    let result = clean_groups(&report.groups, RetentionPolicy::KeepNewest, &bin);

    assert!(result.all_succeeded());
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.bytes_freed, 4000);
    assert_eq!(bin.contents(), 2);
    assert!(!paths[0].exists());
    assert!(!paths[1].exists());
    assert!(paths[2].exists());
}

#[test]
fn test_clean_keeps_oldest_copy() {
    let (dir, paths) = setup();
    let report = scan(dir.path(), 0).unwrap();
    let bin = MoveToDir::new();

    let result = clean_group(&report.groups[0], RetentionPolicy::KeepOldest, &bin);

    assert_eq!(result.success_count(), 2);
    assert!(paths[0].exists());
    assert!(!paths[2].exists());
}

#[test]
fn test_clean_skips_file_modified_after_scan() {
    let (dir, paths) = setup();
    let report = scan(dir.path(), 0).unwrap();

    // a.bin changes between scan and cleanup
    fs::write(&paths[0], [42u8; 2000]).unwrap();
    set_mtime(&paths[0], 1_700_000_000);

    let bin = MoveToDir::new();
    let result = clean_group(&report.groups[0], RetentionPolicy::KeepNewest, &bin);

    assert_eq!(result.success_count(), 1);
    assert_eq!(result.failure_count(), 1);
    assert!(matches!(result.failures[0].1, DeleteError::Modified(_)));
    assert!(paths[0].exists());
    assert!(!paths[1].exists());
    assert!(paths[2].exists());
}

#[test]
fn test_clean_continues_after_vanished_file() {
    let (dir, paths) = setup();
    let report = scan(dir.path(), 0).unwrap();
    fs::remove_file(&paths[0]).unwrap();

    let bin = MoveToDir::new();
    let result = clean_group(&report.groups[0], RetentionPolicy::KeepNewest, &bin);

    assert_eq!(result.failure_count(), 1);
    assert!(matches!(result.failures[0].1, DeleteError::NotFound(_)));
    assert_eq!(result.success_count(), 1);
    assert_eq!(result.bytes_freed, 2000);
}

#[test]
fn test_clean_never_removes_every_copy() {
    let (dir, _paths) = setup();
    let report = scan(dir.path(), 0).unwrap();
    let bin = MoveToDir::new();

    for policy in [RetentionPolicy::KeepNewest, RetentionPolicy::KeepOldest] {
        clean_groups(&report.groups, policy, &bin);
    }

    // The stale second pass wants to keep a.bin, which is already gone
    let remaining = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(remaining, 1);
    assert!(scan(dir.path(), 0).unwrap().groups.is_empty());
}
