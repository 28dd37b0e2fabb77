//! JSON output formatter for scan reports.
//!
//! Provides machine-readable JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "digest": "ba7816bf...",
//!       "size": 1024,
//!       "reclaimable": 1024,
//!       "files": [
//!         { "path": "/a/x.bin", "name": "x.bin", "size": 1024,
//!           "modified": "2024-01-01T00:00:00+00:00", "hardlink": false, "keep": true },
//!         { "path": "/b/x.bin", "name": "x.bin", "size": 1024,
//!           "modified": "2023-01-01T00:00:00+00:00", "hardlink": false, "keep": false }
//!       ]
//!     }
//!   ],
//!   "warnings": [ { "path": "/locked", "message": "Permission denied: /locked" } ],
//!   "summary": { "total_files": 100, "reclaimable_space": 1024, "exit_code": 0, ... }
//! }
//! ```

use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::duplicates::{DuplicateGroup, RetentionPolicy, ScanReport, ScanSummary};
use crate::error::ExitCode;
use crate::scanner::ScanError;

/// One member of a duplicate group.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFile {
    /// Absolute path where it can be resolved
    pub path: String,
    /// Final path component
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Modification time, RFC 3339
    pub modified: String,
    /// Shares its inode with an earlier member
    pub hardlink: bool,
    /// Retained under the report's retention policy
    pub keep: bool,
}

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// SHA-256 digest as hexadecimal string (64 characters)
    pub digest: String,
    /// File size in bytes
    pub size: u64,
    /// Bytes freed by keeping one copy
    pub reclaimable: u64,
    /// Members in discovery order
    pub files: Vec<JsonFile>,
}

impl JsonDuplicateGroup {
    /// Convert a group, marking the member `policy` retains.
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup, policy: RetentionPolicy) -> Self {
        let keep_index = group
            .select_retained(policy)
            .map(|selection| selection.keep.discovery_index);

        Self {
            digest: group.digest_hex(),
            size: group.size,
            reclaimable: group.reclaimable(),
            files: group
                .files
                .iter()
                .map(|f| JsonFile {
                    path: normalize_path(&f.path),
                    name: f.name.clone(),
                    size: f.size,
                    modified: format_timestamp(f.modified),
                    hardlink: f.is_hardlink,
                    keep: keep_index == Some(f.discovery_index),
                })
                .collect(),
        }
    }
}

/// A skipped file.
#[derive(Debug, Clone, Serialize)]
pub struct JsonWarning {
    /// Path of the file or directory
    pub path: String,
    /// Human-readable reason
    pub message: String,
}

impl From<&ScanError> for JsonWarning {
    fn from(error: &ScanError) -> Self {
        Self {
            path: error.path().to_string_lossy().into_owned(),
            message: error.to_string(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Total number of files walked
    pub total_files: usize,
    /// Logical size of all walked files in bytes
    pub total_size: u64,
    /// Size counting each inode once
    pub physical_size: u64,
    /// Files eliminated by size classification
    pub eliminated_by_size: usize,
    /// Files eliminated by quick fingerprint
    pub eliminated_by_quick: usize,
    /// Files eliminated by full verification
    pub eliminated_by_full: usize,
    /// Bytes read while hashing
    pub bytes_read: u64,
    /// Number of confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding retained copies)
    pub duplicate_files: usize,
    /// Space freed by keeping one copy per group (bytes)
    pub reclaimable_space: u64,
    /// Reclaimable space counting each inode once (bytes)
    pub physical_reclaimable: u64,
    /// Number of skipped files
    pub warnings: usize,
    /// Duration of the scan in milliseconds
    pub scan_duration_ms: u64,
    /// Retention policy used for the keep flags
    pub keep: RetentionPolicy,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "RC000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a ScanSummary and an exit code.
    #[must_use]
    pub fn from_scan_summary(
        summary: &ScanSummary,
        policy: RetentionPolicy,
        exit_code: ExitCode,
    ) -> Self {
        Self {
            total_files: summary.total_files,
            total_size: summary.total_size,
            physical_size: summary.physical_size,
            eliminated_by_size: summary.eliminated_by_size,
            eliminated_by_quick: summary.eliminated_by_quick,
            eliminated_by_full: summary.eliminated_by_full,
            bytes_read: summary.bytes_read,
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_space,
            physical_reclaimable: summary.physical_reclaimable,
            warnings: summary.warnings,
            scan_duration_ms: u64::try_from(summary.scan_duration.as_millis())
                .unwrap_or(u64::MAX),
            keep: policy,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Duplicate groups, ranked
    pub groups: Vec<JsonDuplicateGroup>,
    /// Files skipped during the scan
    pub warnings: Vec<JsonWarning>,
    /// Scan summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create a new JSON output from a scan report.
    ///
    /// # Example
    ///
    /// ```
    /// use reclaim::duplicates::{RetentionPolicy, ScanReport};
    /// use reclaim::error::ExitCode;
    /// use reclaim::output::JsonOutput;
    ///
    /// let report = ScanReport::default();
    /// let output = JsonOutput::new(&report, RetentionPolicy::KeepNewest, ExitCode::NoDuplicates);
    /// assert!(output.groups.is_empty());
    /// assert_eq!(output.summary.exit_code, 2);
    /// ```
    #[must_use]
    pub fn new(report: &ScanReport, policy: RetentionPolicy, exit_code: ExitCode) -> Self {
        Self {
            groups: report
                .groups
                .iter()
                .map(|g| JsonDuplicateGroup::from_duplicate_group(g, policy))
                .collect(),
            warnings: report.warnings.iter().map(JsonWarning::from).collect(),
            summary: JsonSummary::from_scan_summary(&report.summary, policy, exit_code),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Format a modification time as RFC 3339 in UTC.
#[must_use]
pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

/// Canonicalize where possible, fall back to the path as recorded.
fn normalize_path(path: &Path) -> String {
    match path.canonicalize() {
        Ok(canonical) => canonical.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
