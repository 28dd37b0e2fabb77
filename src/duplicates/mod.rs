//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size classification (no I/O)
//! - Quick fingerprint comparison (bounded head/tail reads)
//! - Full digest verification (whole file, streamed)
//! - Duplicate group ranking and retention selection
//!
//! The hashing stages share a bounded [`WorkerPool`].

pub mod finder;
pub mod groups;
pub mod pool;

pub use finder::{
    format_size, full_verify_stage, quick_fingerprint_stage, scan, DuplicateFinder, FinderConfig,
    FinderError, QuickKey, ScanReport, ScanState, ScanSummary, StageConfig, StageStats,
};
pub use groups::{
    group_by_size, rank_groups, DuplicateGroup, FileRecord, GroupingStats, RetentionPolicy,
    RetentionSelection,
};
pub use pool::{default_io_threads, PoolOutcome, WorkerPool, DEFAULT_QUEUE_DEPTH};
