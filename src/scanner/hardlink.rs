//! Hardlink identity tracking.
//!
//! # Overview
//!
//! Hardlinks are multiple directory entries pointing to the same inode on disk.
//! They share content, so the duplicate engine groups them together like any
//! other identical files. What must not happen is counting their bytes twice
//! when reporting how much space a scan covers or how much a deletion frees.
//! The walker records each file's identity key here and flags every repeat.
//!
//! # Platform Support
//!
//! - **Unix**: Uses (device_id, inode) pairs from file metadata
//! - **Other**: No identity is available; every file is treated as distinct
//!
//! # Example
//!
//! ```no_run
//! use reclaim::scanner::hardlink::HardlinkTracker;
//!
//! let mut tracker = HardlinkTracker::new();
//! let meta = std::fs::symlink_metadata("file.txt").unwrap();
//! let (key, repeat) = tracker.observe(&meta);
//! println!("{:?} seen before: {}", key, repeat);
//! ```

use std::collections::HashSet;
use std::fs::Metadata;

/// Platform identity of a file's underlying data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InodeKey {
    /// Device the file lives on
    pub dev: u64,
    /// Inode number on that device
    pub ino: u64,
}

impl InodeKey {
    /// Build an identity key from file metadata.
    ///
    /// Returns `None` where the platform does not expose inode numbers.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// Tracks seen inodes during a walk.
///
/// Not thread-safe; the walker is single-threaded and owns one tracker.
#[derive(Debug, Default)]
pub struct HardlinkTracker {
    seen: HashSet<InodeKey>,
}

impl HardlinkTracker {
    /// Create a new hardlink tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Record a file and report whether its inode was already seen.
    ///
    /// Returns the identity key (if any) and `true` when an earlier entry
    /// shared it.
    pub fn observe(&mut self, metadata: &Metadata) -> (Option<InodeKey>, bool) {
        match InodeKey::from_metadata(metadata) {
            Some(key) => {
                let repeat = !self.seen.insert(key);
                (Some(key), repeat)
            }
            None => (None, false),
        }
    }

    /// Number of distinct inodes recorded.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Whether identity tracking works on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}
