//! Size classification, duplicate groups and retention.
//!
//! # Overview
//!
//! This module holds the two zero-I/O ends of the funnel:
//!
//! - [`group_by_size`] buckets walked files by exact size and discards every
//!   bucket with a single member.
//! - [`DuplicateGroup`] is the verified output. [`rank_groups`] orders groups
//!   by reclaimable bytes, and [`DuplicateGroup::select_retained`] partitions
//!   a group into the copy to keep and the copies to remove.
//!
//! # Example
//!
//! ```
//! use reclaim::scanner::FileEntry;
//! use reclaim::duplicates::group_by_size;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let files = vec![
//!     FileEntry::new(PathBuf::from("/file1.txt"), 1024, SystemTime::now()),
//!     FileEntry::new(PathBuf::from("/file2.txt"), 1024, SystemTime::now()),
//!     FileEntry::new(PathBuf::from("/file3.txt"), 2048, SystemTime::now()),
//! ];
//!
//! let (groups, stats) = group_by_size(files);
//!
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.potential_duplicates, 2);
//! assert_eq!(groups.len(), 1);
//! ```

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::scanner::{hash_to_hex, Digest, FileEntry, InodeKey};

/// Statistics from the size classification stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Total number of files processed
    pub total_files: usize,
    /// Total size of all files in bytes
    pub total_size: u64,
    /// Number of unique file sizes
    pub unique_sizes: usize,
    /// Number of files that could be duplicates (in buckets of 2+)
    pub potential_duplicates: usize,
    /// Number of files eliminated as unique (singleton buckets)
    pub eliminated_unique: usize,
    /// Number of empty files encountered
    pub empty_files: usize,
    /// Number of size buckets with 2+ files
    pub duplicate_groups: usize,
}

impl GroupingStats {
    /// Percentage of files eliminated by size grouping.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Group files by exact size.
///
/// Returns only buckets with 2+ files. Empty files never qualify. No file
/// I/O is performed.
///
/// # Example
///
/// ```
/// use reclaim::scanner::FileEntry;
/// use reclaim::duplicates::group_by_size;
/// use std::path::PathBuf;
/// use std::time::SystemTime;
///
/// let files = vec![
///     FileEntry::new(PathBuf::from("/a.txt"), 100, SystemTime::now()),
///     FileEntry::new(PathBuf::from("/b.txt"), 100, SystemTime::now()),
///     FileEntry::new(PathBuf::from("/c.txt"), 200, SystemTime::now()),
/// ];
///
/// let (groups, stats) = group_by_size(files);
///
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[&100].len(), 2);
/// assert_eq!(stats.eliminated_unique, 1);
/// ```
#[must_use]
pub fn group_by_size(
    files: impl IntoIterator<Item = FileEntry>,
) -> (HashMap<u64, Vec<FileEntry>>, GroupingStats) {
    let mut all_groups: HashMap<u64, Vec<FileEntry>> = HashMap::new();
    let mut stats = GroupingStats::default();

    for file in files {
        stats.total_files += 1;
        stats.total_size += file.size;

        if file.size == 0 {
            stats.empty_files += 1;
            log::trace!("Empty file ignored: {}", file.path.display());
            continue;
        }

        all_groups.entry(file.size).or_default().push(file);
    }

    stats.unique_sizes = all_groups.len();

    let filtered: HashMap<u64, Vec<FileEntry>> = all_groups
        .into_iter()
        .filter(|(size, files)| {
            if files.len() < 2 {
                stats.eliminated_unique += files.len();
                log::trace!("Eliminated unique size {}: {}", size, files[0].path.display());
                false
            } else {
                stats.potential_duplicates += files.len();
                stats.duplicate_groups += 1;
                log::debug!("Size group {} bytes: {} candidates", size, files.len());
                true
            }
        })
        .collect();

    log::info!(
        "Size classification complete: {} files → {} candidates ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.elimination_rate()
    );

    (filtered, stats)
}

/// One member of a verified duplicate group.
///
/// Carries enough metadata for display and retention without touching the
/// filesystem again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Full path
    pub path: PathBuf,
    /// Final path component
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time at walk time
    pub modified: SystemTime,
    /// Device/inode identity, where available
    pub inode: Option<InodeKey>,
    /// Whether an earlier walked file shares this inode
    pub is_hardlink: bool,
    /// Walk order
    pub discovery_index: usize,
}

impl From<FileEntry> for FileRecord {
    fn from(entry: FileEntry) -> Self {
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            path: entry.path,
            size: entry.size,
            modified: entry.modified,
            inode: entry.inode,
            is_hardlink: entry.is_hardlink,
            discovery_index: entry.discovery_index,
        }
    }
}

/// Which copy of a duplicate group survives cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetentionPolicy {
    /// Keep the most recently modified copy
    #[default]
    #[serde(rename = "newest", alias = "keep_newest")]
    KeepNewest,
    /// Keep the least recently modified copy
    #[serde(rename = "oldest", alias = "keep_oldest")]
    KeepOldest,
}

impl RetentionPolicy {
    /// Build a policy from a `keep_newest` flag.
    #[must_use]
    pub fn from_keep_newest(keep_newest: bool) -> Self {
        if keep_newest {
            Self::KeepNewest
        } else {
            Self::KeepOldest
        }
    }

    /// Whether this policy keeps the newest copy.
    #[must_use]
    pub fn keeps_newest(self) -> bool {
        self == Self::KeepNewest
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepNewest => f.write_str("newest"),
            Self::KeepOldest => f.write_str("oldest"),
        }
    }
}

impl FromStr for RetentionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "keep-newest" | "keep_newest" => Ok(Self::KeepNewest),
            "oldest" | "keep-oldest" | "keep_oldest" => Ok(Self::KeepOldest),
            other => Err(format!(
                "Invalid retention policy '{other}'. Expected 'newest' or 'oldest'"
            )),
        }
    }
}

/// Partition of a group into one retained member and the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionSelection<'a> {
    /// The copy that survives
    pub keep: &'a FileRecord,
    /// Every other copy, in group order
    pub remove: Vec<&'a FileRecord>,
}

impl RetentionSelection<'_> {
    /// Logical bytes freed by removing every non-retained member.
    #[must_use]
    pub fn removable_bytes(&self) -> u64 {
        self.remove.iter().map(|f| f.size).sum()
    }
}

/// A set of two or more byte-identical files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// SHA-256 digest of the shared content
    pub digest: Digest,
    /// Size in bytes shared by every member
    pub size: u64,
    /// Members, ordered by discovery index
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Create a group; members are sorted into discovery order.
    #[must_use]
    pub fn new(digest: Digest, size: u64, mut files: Vec<FileRecord>) -> Self {
        debug_assert!(files.iter().all(|f| f.size == size));
        files.sort_by_key(|f| f.discovery_index);
        Self {
            digest,
            size,
            files,
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of redundant copies.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Bytes freed by keeping exactly one copy: `(n - 1) * size`.
    #[must_use]
    pub fn reclaimable(&self) -> u64 {
        self.duplicate_count() as u64 * self.size
    }

    /// Reclaimable bytes counting each inode once.
    ///
    /// Hard links to the same data free nothing when removed.
    #[must_use]
    pub fn physical_reclaimable(&self) -> u64 {
        let mut inodes = HashSet::new();
        let distinct = self
            .files
            .iter()
            .filter(|f| f.inode.map_or(true, |key| inodes.insert(key)))
            .count();
        distinct.saturating_sub(1) as u64 * self.size
    }

    /// Digest as lowercase hex.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hash_to_hex(&self.digest)
    }

    /// Paths of every member.
    #[must_use]
    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(|f| f.path.as_path()).collect()
    }

    /// Select the copy to keep under `policy`.
    ///
    /// Equal modification times resolve to the lowest discovery index, so the
    /// same input always gives the same selection. Returns `None` for an
    /// empty group.
    #[must_use]
    pub fn select_retained(&self, policy: RetentionPolicy) -> Option<RetentionSelection<'_>> {
        let keep = match policy {
            RetentionPolicy::KeepNewest => self.files.iter().max_by(|a, b| {
                a.modified
                    .cmp(&b.modified)
                    .then_with(|| b.discovery_index.cmp(&a.discovery_index))
            }),
            RetentionPolicy::KeepOldest => self.files.iter().min_by(|a, b| {
                a.modified
                    .cmp(&b.modified)
                    .then_with(|| a.discovery_index.cmp(&b.discovery_index))
            }),
        }?;

        let remove = self
            .files
            .iter()
            .filter(|f| !std::ptr::eq(*f, keep))
            .collect();

        Some(RetentionSelection { keep, remove })
    }
}

/// Order groups for presentation.
///
/// Reclaimable bytes descending, then size descending, then first member
/// path, then digest. The result does not depend on worker completion order.
pub fn rank_groups(groups: &mut [DuplicateGroup]) {
    groups.sort_by(compare_groups);
}

fn compare_groups(a: &DuplicateGroup, b: &DuplicateGroup) -> Ordering {
    b.reclaimable()
        .cmp(&a.reclaimable())
        .then_with(|| b.size.cmp(&a.size))
        .then_with(|| {
            let pa = a.files.first().map(|f| &f.path);
            let pb = b.files.first().map(|f| &f.path);
            pa.cmp(&pb)
        })
        .then_with(|| a.digest.cmp(&b.digest))
}
