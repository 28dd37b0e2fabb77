//! Safe removal of duplicate copies.
//!
//! # Overview
//!
//! This module is the collaborator that acts on a scan result:
//! - Every removal goes through a [`SafeDelete`] implementation. The shipped
//!   one, [`SystemTrash`], moves files to the system trash. There is no
//!   permanent delete.
//! - Each file is re-checked against its scan-time size and mtime right before
//!   removal (TOCTOU protection).
//! - A failure on one file never stops the rest of the group.
//! - At least one copy of each group is always preserved.
//!
//! # Example
//!
//! ```no_run
//! use reclaim::actions::delete::{clean_group, SystemTrash};
//! use reclaim::duplicates::{scan, RetentionPolicy};
//! use std::path::Path;
//!
//! let report = scan(Path::new("/home/user/Downloads"), 1024).unwrap();
//! for group in &report.groups {
//!     let result = clean_group(group, RetentionPolicy::KeepNewest, &SystemTrash);
//!     println!("{}", result.summary());
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

use crate::duplicates::{format_size, DuplicateGroup, FileRecord, RetentionPolicy};

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File was modified since scan (TOCTOU protection).
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File that could not be trashed
        path: PathBuf,
        /// Message from the trash backend
        message: String,
    },

    /// The copy chosen to survive is gone or changed, so nothing is removed.
    #[error("retained copy missing or modified: {0}")]
    RetainedCopyUnavailable(PathBuf),

    /// Attempted to delete all copies (at least one must be preserved).
    #[error("cannot delete all copies - at least one file must be preserved")]
    AllCopiesWouldBeDeleted,

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File being inspected
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::Modified(p)
            | Self::RetainedCopyUnavailable(p)
            | Self::TrashFailed { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::AllCopiesWouldBeDeleted => None,
        }
    }

    fn from_io(path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

/// A recoverable removal mechanism.
///
/// Implementations must never destroy data unconditionally.
pub trait SafeDelete {
    /// Move `path` somewhere the user can restore it from.
    ///
    /// # Errors
    ///
    /// Returns a [`DeleteError`] if the file could not be removed.
    fn remove(&self, path: &Path) -> Result<(), DeleteError>;
}

/// Moves files to the platform trash via the `trash` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTrash;

impl SafeDelete for SystemTrash {
    fn remove(&self, path: &Path) -> Result<(), DeleteError> {
        trash::delete(path).map_err(|e| {
            log::error!("Trash operation failed for {}: {}", path.display(), e);
            DeleteError::TrashFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })
    }
}

/// A file that was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    /// Path that was removed.
    pub path: PathBuf,
    /// Size of the removed file in bytes.
    pub size: u64,
    /// Whether another remaining path still referenced the same inode.
    pub shared_inode: bool,
}

/// Results of a batch deletion operation.
#[derive(Debug, Default)]
pub struct BatchDeleteResult {
    /// Successfully removed files.
    pub successes: Vec<DeleteResult>,
    /// Failed removals with their errors.
    pub failures: Vec<(PathBuf, DeleteError)>,
    /// Logical bytes removed.
    pub bytes_freed: u64,
    /// Bytes actually released, counting each inode once.
    pub physical_bytes_freed: u64,
}

impl BatchDeleteResult {
    /// Number of successful deletions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed deletions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total number of attempted deletions.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Check if all deletions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another result into this one.
    pub fn merge(&mut self, other: Self) {
        self.bytes_freed += other.bytes_freed;
        self.physical_bytes_freed += other.physical_bytes_freed;
        self.successes.extend(other.successes);
        self.failures.extend(other.failures);
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!(
                "Moved {} file(s) to trash, freed {}",
                self.success_count(),
                format_size(self.bytes_freed)
            )
        } else {
            format!(
                "Moved {} file(s) to trash, {} failed, freed {}",
                self.success_count(),
                self.failure_count(),
                format_size(self.bytes_freed)
            )
        }
    }
}

/// File metadata snapshot for TOCTOU verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: Option<SystemTime>,
}

impl FileSnapshot {
    /// Create a snapshot of a file's current state.
    ///
    /// Symlinks are not followed.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or can't be accessed.
    pub fn capture(path: &Path) -> Result<Self, DeleteError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime: metadata.modified().ok(),
        })
    }

    /// Snapshot as recorded by the scan.
    #[must_use]
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            path: record.path.clone(),
            size: record.size,
            mtime: Some(record.modified),
        }
    }

    /// Verify that the file on disk still matches this snapshot.
    ///
    /// # Errors
    ///
    /// Returns error if file was modified, deleted, or can't be accessed.
    pub fn verify(&self) -> Result<(), DeleteError> {
        let current = Self::capture(&self.path)?;

        if let (Some(orig), Some(curr)) = (self.mtime, current.mtime) {
            if orig != curr {
                log::warn!(
                    "File modified since scan: {} (mtime changed)",
                    self.path.display()
                );
                return Err(DeleteError::Modified(self.path.clone()));
            }
        }

        if self.size != current.size {
            log::warn!(
                "File modified since scan: {} (size changed from {} to {})",
                self.path.display(),
                self.size,
                current.size
            );
            return Err(DeleteError::Modified(self.path.clone()));
        }

        Ok(())
    }
}

/// Validate that a selection doesn't delete all copies.
///
/// # Errors
///
/// Returns `AllCopiesWouldBeDeleted` if every path in the group is selected.
pub fn validate_preserves_copy(
    selected_paths: &[&Path],
    group_paths: &[&Path],
) -> Result<(), DeleteError> {
    let selected: HashSet<&Path> = selected_paths.iter().copied().collect();
    let preserved = group_paths.iter().any(|p| !selected.contains(p));

    if group_paths.is_empty() || preserved {
        Ok(())
    } else {
        Err(DeleteError::AllCopiesWouldBeDeleted)
    }
}

/// Remove every copy in `group` except the one `policy` retains.
///
/// Each candidate is checked against its scan snapshot and then handed to
/// `deleter`. Failures are recorded and the remaining candidates are still
/// processed.
pub fn clean_group<D: SafeDelete + ?Sized>(
    group: &DuplicateGroup,
    policy: RetentionPolicy,
    deleter: &D,
) -> BatchDeleteResult {
    let mut result = BatchDeleteResult::default();

    let Some(selection) = group.select_retained(policy) else {
        return result;
    };

    let remove_paths: Vec<&Path> = selection.remove.iter().map(|f| f.path.as_path()).collect();
    if let Err(e) = validate_preserves_copy(&remove_paths, &group.paths()) {
        log::error!("Refusing to clean group {}: {}", group.digest_hex(), e);
        return result;
    }

    if let Err(e) = FileSnapshot::from_record(selection.keep).verify() {
        log::error!(
            "Not cleaning group {}: retained copy {} is unavailable: {}",
            group.digest_hex(),
            selection.keep.path.display(),
            e
        );
        for record in &selection.remove {
            result.failures.push((
                record.path.clone(),
                DeleteError::RetainedCopyUnavailable(selection.keep.path.clone()),
            ));
        }
        return result;
    }

    log::debug!(
        "Keeping {} ({} policy), removing {} copies",
        selection.keep.path.display(),
        policy,
        selection.remove.len()
    );

    // Inodes that stay on disk after this group is cleaned
    let mut live_inodes: HashSet<_> = selection.keep.inode.into_iter().collect();

    for record in &selection.remove {
        let outcome = FileSnapshot::from_record(record)
            .verify()
            .and_then(|()| deleter.remove(&record.path));

        match outcome {
            Ok(()) => {
                let shared_inode = record.inode.is_some_and(|key| !live_inodes.insert(key));
                log::info!(
                    "Moved to trash: {} ({})",
                    record.path.display(),
                    format_size(record.size)
                );
                result.bytes_freed += record.size;
                if !shared_inode {
                    result.physical_bytes_freed += record.size;
                }
                result.successes.push(DeleteResult {
                    path: record.path.clone(),
                    size: record.size,
                    shared_inode,
                });
            }
            Err(e) => {
                log::warn!("Failed to remove {}: {}", record.path.display(), e);
                if let Some(key) = record.inode {
                    live_inodes.insert(key);
                }
                result.failures.push((record.path.clone(), e));
            }
        }
    }

    result
}

/// Apply [`clean_group`] to every group.
pub fn clean_groups<D: SafeDelete + ?Sized>(
    groups: &[DuplicateGroup],
    policy: RetentionPolicy,
    deleter: &D,
) -> BatchDeleteResult {
    let mut total = BatchDeleteResult::default();
    for group in groups {
        total.merge(clean_group(group, policy, deleter));
    }
    log::info!("{}", total.summary());
    total
}
