use reclaim::duplicates::{scan, DuplicateFinder, FinderConfig, FinderError, RetentionPolicy};
use reclaim::progress::{progress_channel, ScanEvent, ScanStage};
use reclaim::scanner::{ScanError, WalkerConfig};
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn file_names(group: &reclaim::duplicates::DuplicateGroup) -> Vec<String> {
    group.files.iter().map(|f| f.name.clone()).collect()
}

#[test]
fn test_concrete_scenario() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"hello");
    write(dir.path(), "b", b"hello");
    write(dir.path(), "c", b"world");
    write(dir.path(), "d", b"hi");

    let report = scan(dir.path(), 0).unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(file_names(&report.groups[0]), vec!["a", "b"]);
    assert_eq!(report.groups[0].size, 5);
    assert_eq!(report.groups[0].reclaimable(), 5);
    assert!(report.warnings.is_empty());

    let summary = &report.summary;
    assert_eq!(summary.total_files, 4);
    assert_eq!(summary.eliminated_by_size, 1);
    assert_eq!(summary.eliminated_by_quick, 1);
    assert_eq!(summary.eliminated_by_full, 0);
    assert_eq!(summary.reclaimable_space, 5);
}

#[test]
fn test_min_size_drops_small_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "small1", b"tiny");
    write(dir.path(), "small2", b"tiny");
    write(dir.path(), "big1", &[7u8; 4096]);
    write(dir.path(), "big2", &[7u8; 4096]);

    let report = scan(dir.path(), 1024).unwrap();

    assert_eq!(report.summary.total_files, 2);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(file_names(&report.groups[0]), vec!["big1", "big2"]);
}

#[test]
fn test_empty_tree_and_empty_files() {
    let dir = tempdir().unwrap();
    let report = scan(dir.path(), 0).unwrap();
    assert!(report.groups.is_empty());
    assert_eq!(report.summary.total_files, 0);

    write(dir.path(), "empty1", b"");
    write(dir.path(), "empty2", b"");
    let report = scan(dir.path(), 0).unwrap();
    assert!(report.groups.is_empty());
    assert_eq!(report.summary.total_files, 0);
}

#[test]
fn test_nested_duplicates_across_directories() {
    let dir = tempdir().unwrap();
    let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    write(dir.path(), "photos/2023/img.raw", &payload);
    write(dir.path(), "backup/img.raw", &payload);
    write(dir.path(), "backup/old/img-copy.raw", &payload);

    let report = scan(dir.path(), 0).unwrap();

    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.len(), 3);
    assert_eq!(group.reclaimable(), 100_000);
    // Walk order is sorted by name, so backup/ comes first
    assert!(group.files[0].path.ends_with("backup/img.raw"));
    assert!(group.files[1].path.ends_with("backup/old/img-copy.raw"));
}

#[test]
fn test_same_head_and_tail_different_middle() {
    let dir = tempdir().unwrap();
    let mut first = vec![0u8; 100_000];
    let mut second = first.clone();
    first[50_000] = 1;
    second[50_000] = 2;
    write(dir.path(), "one", &first);
    write(dir.path(), "two", &second);

    let report = scan(dir.path(), 0).unwrap();

    assert!(report.groups.is_empty());
    assert_eq!(report.summary.eliminated_by_quick, 0);
    assert_eq!(report.summary.eliminated_by_full, 2);
}

#[test]
fn test_groups_ranked_by_reclaimable_bytes() {
    let dir = tempdir().unwrap();
    // 2 x 3000 bytes -> 3000 reclaimable
    write(dir.path(), "m1", &[1u8; 3000]);
    write(dir.path(), "m2", &[1u8; 3000]);
    // 4 x 1000 bytes -> 3000 reclaimable, smaller size ranks later
    for i in 0..4 {
        write(dir.path(), &format!("s{i}"), &[2u8; 1000]);
    }
    // 3 x 5000 bytes -> 10000 reclaimable
    for i in 0..3 {
        write(dir.path(), &format!("l{i}"), &[3u8; 5000]);
    }

    let report = scan(dir.path(), 0).unwrap();

    let order: Vec<(u64, u64)> = report
        .groups
        .iter()
        .map(|g| (g.reclaimable(), g.size))
        .collect();
    assert_eq!(order, vec![(10_000, 5000), (3000, 3000), (3000, 1000)]);
}

#[test]
fn test_repeated_scans_are_identical() {
    let dir = tempdir().unwrap();
    for i in 0..20 {
        write(dir.path(), &format!("dir{}/f{i}", i % 3), &[(i % 4) as u8; 2048]);
    }

    let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(8));
    let first = finder.scan(dir.path()).unwrap();
    let second = DuplicateFinder::new(FinderConfig::default().with_io_threads(1))
        .scan(dir.path())
        .unwrap();

    assert_eq!(first.groups, second.groups);
    for group in &first.groups {
        let a = group.select_retained(RetentionPolicy::KeepNewest).unwrap();
        let b = group.select_retained(RetentionPolicy::KeepNewest).unwrap();
        assert_eq!(a.keep.path, b.keep.path);
    }
}

#[test]
fn test_retention_follows_mtime() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"same bytes");
    write(dir.path(), "b", b"same bytes");
    write(dir.path(), "c", b"same bytes");

    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    let set = |name: &str, offset: u64| {
        let time = filetime::FileTime::from_system_time(base + Duration::from_secs(offset));
        filetime::set_file_mtime(dir.path().join(name), time).unwrap();
    };
    set("a", 100);
    set("b", 300);
    set("c", 200);

    let report = scan(dir.path(), 0).unwrap();
    let group = &report.groups[0];

    let newest = group.select_retained(RetentionPolicy::KeepNewest).unwrap();
    assert_eq!(newest.keep.name, "b");
    assert_eq!(newest.remove.len(), 2);

    let oldest = group.select_retained(RetentionPolicy::KeepOldest).unwrap();
    assert_eq!(oldest.keep.name, "a");
    assert_eq!(oldest.removable_bytes(), 20);
}

#[test]
fn test_retention_tie_uses_discovery_order() {
    let dir = tempdir().unwrap();
    write(dir.path(), "z_last", b"tie content");
    write(dir.path(), "a_first", b"tie content");
    let time = filetime::FileTime::from_unix_time(1_500_000_000, 0);
    filetime::set_file_mtime(dir.path().join("z_last"), time).unwrap();
    filetime::set_file_mtime(dir.path().join("a_first"), time).unwrap();

    let report = scan(dir.path(), 0).unwrap();
    let group = &report.groups[0];

    for policy in [RetentionPolicy::KeepNewest, RetentionPolicy::KeepOldest] {
        let selection = group.select_retained(policy).unwrap();
        assert_eq!(selection.keep.name, "a_first");
    }
}

#[test]
fn test_ignore_patterns_and_hidden() {
    let dir = tempdir().unwrap();
    write(dir.path(), "keep1.dat", b"payload!");
    write(dir.path(), "keep2.dat", b"payload!");
    write(dir.path(), "skip.tmp", b"payload!");
    write(dir.path(), "node_modules/dep.dat", b"payload!");
    write(dir.path(), ".cache/hidden.dat", b"payload!");

    let walker_config = WalkerConfig {
        min_size: 0,
        skip_hidden: true,
        ignore_patterns: vec!["*.tmp".to_string(), "node_modules/".to_string()],
    };
    let finder = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker_config));
    let report = finder.scan(dir.path()).unwrap();

    assert_eq!(report.summary.total_files, 2);
    assert_eq!(file_names(&report.groups[0]), vec!["keep1.dat", "keep2.dat"]);
}

#[test]
fn test_root_errors() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing");
    assert!(matches!(scan(&missing, 0), Err(FinderError::PathNotFound(_))));

    write(dir.path(), "file", b"x");
    assert!(matches!(
        scan(&dir.path().join("file"), 0),
        Err(FinderError::NotADirectory(_))
    ));
}

#[test]
fn test_interrupted_before_start() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"content");
    write(dir.path(), "b", b"content");

    let flag = Arc::new(AtomicBool::new(true));
    let finder = DuplicateFinder::new(FinderConfig::default().with_shutdown_flag(flag));

    assert!(matches!(finder.scan(dir.path()), Err(FinderError::Interrupted)));
    assert_eq!(finder.state().to_string(), "idle");
}

#[test]
fn test_verify_budget_skips_large_groups() {
    let dir = tempdir().unwrap();
    write(dir.path(), "big1", &[9u8; 10_000]);
    write(dir.path(), "big2", &[9u8; 10_000]);
    write(dir.path(), "small1", &[4u8; 100]);
    write(dir.path(), "small2", &[4u8; 100]);

    // Enough for the small group only; the larger group is ranked first and
    // does not fit, so both are skipped
    let finder = DuplicateFinder::new(FinderConfig::default().with_verify_budget(Some(1000)));
    let report = finder.scan(dir.path()).unwrap();

    assert!(report.groups.is_empty());
    assert_eq!(report.warnings.len(), 4);
    assert!(report
        .warnings
        .iter()
        .all(|w| matches!(w, ScanError::BudgetExhausted(_))));
}

#[test]
fn test_progress_events_cover_every_stage() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"12345");
    write(dir.path(), "b", b"12345");

    let (sink, events) = progress_channel(256);
    let finder = DuplicateFinder::new(FinderConfig::default().with_progress(sink));
    finder.scan(dir.path()).unwrap();
    drop(finder);

    let started: Vec<ScanStage> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::StageStarted { stage, .. } => Some(stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        started,
        vec![
            ScanStage::Walking,
            ScanStage::Classifying,
            ScanStage::QuickHashing,
            ScanStage::FullHashing,
            ScanStage::Grouping,
        ]
    );
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_soft_failure() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"duplicate!");
    write(dir.path(), "b", b"duplicate!");
    write(dir.path(), "c", b"duplicate!");
    let locked = dir.path().join("c");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores permission bits
    if fs::read(&locked).is_ok() {
        eprintln!("Skipping: running with elevated privileges");
        return;
    }

    let report = scan(dir.path(), 0).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(file_names(&report.groups[0]), vec!["a", "b"]);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].path().ends_with("c"));
    assert!(report.is_partial());
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_fails_in_strict_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"duplicate!");
    write(dir.path(), "b", b"duplicate!");
    let locked = dir.path().join("b");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        return;
    }

    let finder = DuplicateFinder::new(FinderConfig::default().with_strict(true));
    let result = finder.scan(dir.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert!(matches!(result, Err(FinderError::Strict(_))));
}
