//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Depth-first directory walking using walkdir
//! - Quick fingerprints (BLAKE3 over a bounded head/tail sample)
//! - Full content digests (streamed SHA-256)
//! - Hardlink identity tracking
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Quick fingerprint and full digest computation
//! - [`hardlink`]: Inode identity keys
//!
//! # Example
//!
//! ```no_run
//! use reclaim::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     min_size: 1024,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hardlink;
pub mod hasher;
pub mod walker;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::progress::ScanStage;

// Re-export main types
pub use hardlink::{HardlinkTracker, InodeKey};
pub use hasher::{
    full_digest_reader, hash_to_hex, quick_fingerprint_reader, Digest, Hasher, DEFAULT_SAMPLE_SIZE,
    FULL_HASH_BUFFER_SIZE,
};
pub use walker::Walker;

/// A regular file discovered by the walker.
///
/// Immutable once produced; lives only for the duration of one scan.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Device/inode identity, where the platform exposes one
    pub inode: Option<InodeKey>,
    /// Whether an earlier entry in this walk shares the same inode
    pub is_hardlink: bool,
    /// Position in walk order, used as the deterministic tie-break
    pub discovery_index: usize,
}

impl FileEntry {
    /// Create a new FileEntry with no inode information.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `size` - File size in bytes
    /// * `modified` - Last modification time
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            inode: None,
            is_hardlink: false,
            discovery_index: 0,
        }
    }

    /// Set the discovery index.
    #[must_use]
    pub fn with_discovery_index(mut self, index: usize) -> Self {
        self.discovery_index = index;
        self
    }
}

/// Configuration for directory walking.
///
/// Symbolic links are never followed, so there is no option for it.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Minimum file size to include (in bytes).
    /// Files smaller than this are skipped. Empty files are always skipped.
    pub min_size: u64,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,
}

impl WalkerConfig {
    /// Create a configuration with only a minimum size.
    #[must_use]
    pub fn with_min_size(min_size: u64) -> Self {
        Self {
            min_size,
            ..Self::default()
        }
    }
}

/// Errors that can occur during file hashing.
///
/// The I/O source is reference counted so hash errors can be cloned into
/// both stage statistics and the scan warning list.
#[derive(thiserror::Error, Debug, Clone)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The number of bytes read differs from the size recorded by the walker.
    #[error("File changed size during scan: {path} (expected {expected} bytes, read {actual})")]
    SizeChanged {
        /// Path of the file
        path: PathBuf,
        /// Size recorded during the walk
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl HashError {
    /// Classify an I/O error raised while hashing `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: Arc::new(error),
            },
        }
    }

    /// Path of the file that failed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) => p,
            Self::SizeChanged { path, .. } | Self::Io { path, .. } => path,
        }
    }
}

/// Soft, per-file errors collected during a scan.
///
/// None of these abort a scan; they are returned to the caller as warnings
/// alongside the duplicate groups.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path vanished between listing and stat.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while walking.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A file could not be hashed and was dropped from its stage.
    #[error("{stage}: {source}")]
    Hash {
        /// Stage in which the failure happened
        stage: ScanStage,
        /// The hashing failure
        #[source]
        source: HashError,
    },

    /// The full verification byte budget ran out before this file was read.
    #[error("Verification budget exhausted, not verified: {0}")]
    BudgetExhausted(PathBuf),
}

impl ScanError {
    /// Path associated with this warning.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::BudgetExhausted(p) => p,
            Self::Io { path, .. } => path,
            Self::Hash { source, .. } => source.path(),
        }
    }
}
