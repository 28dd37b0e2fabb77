//! Duplicate finder orchestrating the detection funnel.
//!
//! # Overview
//!
//! The finder runs each stage on the survivors of the previous one:
//!
//! 1. **Walk** - collect regular files under the root (single-threaded)
//! 2. **Classify** - bucket by exact size, drop singletons (no I/O)
//! 3. **Quick hash** - BLAKE3 over size + head/tail sample (bounded pool)
//! 4. **Full hash** - SHA-256 over the whole file (bounded pool)
//! 5. **Group** - build and rank verified duplicate groups
//!
//! Per-file failures in any stage drop that file and are returned as warnings.
//! Only problems with the root itself, cancellation, strict mode or a pool
//! that cannot start abort the scan.
//!
//! # Example
//!
//! ```no_run
//! use reclaim::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::new(FinderConfig::default().with_min_size(1024));
//! let report = finder.scan(Path::new("/home/user/Downloads")).unwrap();
//!
//! for group in &report.groups {
//!     println!("{} copies of {} bytes", group.len(), group.size);
//! }
//! println!("Reclaimable: {}", report.summary.reclaimable_display());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::groups::{group_by_size, rank_groups, DuplicateGroup, FileRecord};
use super::pool::{default_io_threads, WorkerPool, DEFAULT_QUEUE_DEPTH};
use crate::progress::{ProgressSink, ScanEvent, ScanStage};
use crate::scanner::{
    hash_to_hex, Digest, FileEntry, HashError, Hasher, ScanError, Walker, WalkerConfig,
    DEFAULT_SAMPLE_SIZE,
};

/// Key of a quick-fingerprint group: file size and sample digest.
pub type QuickKey = (u64, Digest);

/// Emit a progress event every this many processed files.
const PROGRESS_INTERVAL: usize = 64;

/// Settings shared by the two hashing stages.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Number of worker threads
    pub io_threads: usize,
    /// Capacity of the bounded job queue
    pub queue_depth: usize,
    /// Maximum bytes the full stage may read; `None` is unlimited
    pub verify_budget: Option<u64>,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Progress stream
    pub progress: ProgressSink,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            io_threads: default_io_threads(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            verify_budget: None,
            shutdown_flag: None,
            progress: ProgressSink::disabled(),
        }
    }
}

impl StageConfig {
    /// Set the number of I/O threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the job queue capacity.
    #[must_use]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Cap the bytes re-read by full verification.
    #[must_use]
    pub fn with_verify_budget(mut self, budget: Option<u64>) -> Self {
        self.verify_budget = budget;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Attach a progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    fn pool(&self, name: &str) -> WorkerPool {
        WorkerPool::new(name, self.io_threads, self.queue_depth)
            .with_shutdown_flag(self.shutdown_flag.clone())
    }
}

/// Statistics from one hashing stage.
#[derive(Debug, Clone, Default)]
pub struct StageStats {
    /// Files that entered the stage
    pub input_files: usize,
    /// Files hashed successfully
    pub hashed_files: usize,
    /// Files dropped because hashing failed
    pub failed_files: usize,
    /// Files not hashed because the verify budget ran out
    pub skipped_files: usize,
    /// Soft errors recorded by the stage
    pub errors: Vec<ScanError>,
    /// Files passed to the next stage
    pub survivors: usize,
    /// Groups of 2+ files produced
    pub groups: usize,
    /// Bytes read from disk
    pub bytes_read: u64,
    /// Whether the stage stopped early on shutdown
    pub interrupted: bool,
}

impl StageStats {
    /// Percentage of input files that did not survive the stage.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.input_files == 0 {
            0.0
        } else {
            let eliminated = self.input_files.saturating_sub(self.survivors);
            (eliminated as f64 / self.input_files as f64) * 100.0
        }
    }

    /// Files that hashed fine but matched nothing.
    #[must_use]
    pub fn eliminated(&self) -> usize {
        self.hashed_files.saturating_sub(self.survivors)
    }
}

fn emit_progress(progress: &ProgressSink, stage: ScanStage, done: usize, total: usize) {
    if done % PROGRESS_INTERVAL == 0 || done == total {
        progress.emit(ScanEvent::StageProgress { stage, done, total });
    }
}

/// Quick fingerprint stage.
///
/// Hashes every size-collision candidate with [`Hasher::quick_fingerprint`]
/// and keeps only `(size, digest)` groups with 2+ members. Members of each
/// returned group are in discovery order.
///
/// # Errors
///
/// Returns [`FinderError::WorkerPool`] if no worker thread could be started.
pub fn quick_fingerprint_stage(
    size_groups: HashMap<u64, Vec<FileEntry>>,
    hasher: Hasher,
    config: &StageConfig,
) -> Result<(HashMap<QuickKey, Vec<FileEntry>>, StageStats), FinderError> {
    let mut files: Vec<FileEntry> = size_groups.into_values().flatten().collect();
    files.sort_by_key(|f| f.discovery_index);

    let total = files.len();
    let mut stats = StageStats {
        input_files: total,
        ..Default::default()
    };
    if files.is_empty() {
        log::debug!("Quick hashing: No files to process");
        return Ok((HashMap::new(), stats));
    }

    config.progress.emit(ScanEvent::StageStarted {
        stage: ScanStage::QuickHashing,
        total,
    });
    log::info!("Quick hashing {} candidates", total);

    let sample_bound = (hasher.sample_size() as u64).saturating_mul(2);
    let mut candidates: HashMap<QuickKey, Vec<FileEntry>> = HashMap::new();
    let mut done = 0usize;

    let outcome = config
        .pool("quick-hash")
        .run(
            files,
            |file: FileEntry| {
                let result = hasher.quick_fingerprint(&file.path, file.size);
                (file, result)
            },
            |(file, result): (FileEntry, Result<Digest, HashError>)| {
                done += 1;
                match result {
                    Ok(digest) => {
                        log::trace!("Quick fingerprint computed: {}", file.path.display());
                        stats.hashed_files += 1;
                        stats.bytes_read += file.size.min(sample_bound);
                        candidates.entry((file.size, digest)).or_default().push(file);
                    }
                    Err(e) => {
                        log::warn!("Failed to quick-hash {}: {}", file.path.display(), e);
                        stats.failed_files += 1;
                        stats.errors.push(ScanError::Hash {
                            stage: ScanStage::QuickHashing,
                            source: e,
                        });
                    }
                }
                emit_progress(&config.progress, ScanStage::QuickHashing, done, total);
            },
        )
        .map_err(FinderError::WorkerPool)?;

    if outcome.interrupted {
        stats.interrupted = true;
        log::info!("Quick hashing: Interrupted by shutdown signal");
    }

    let groups: HashMap<QuickKey, Vec<FileEntry>> = candidates
        .into_iter()
        .filter_map(|(key, mut files)| {
            if files.len() < 2 {
                log::trace!(
                    "Eliminated unique quick fingerprint {}: {}",
                    hash_to_hex(&key.1),
                    files[0].path.display()
                );
                return None;
            }
            files.sort_by_key(|f| f.discovery_index);
            Some((key, files))
        })
        .collect();

    stats.groups = groups.len();
    stats.survivors = groups.values().map(Vec::len).sum();

    config.progress.emit(ScanEvent::StageFinished {
        stage: ScanStage::QuickHashing,
        survivors: stats.survivors,
    });
    log::info!(
        "Quick hashing complete: {} files → {} candidates ({:.1}% eliminated)",
        stats.input_files,
        stats.survivors,
        stats.elimination_rate()
    );

    Ok((groups, stats))
}

/// Full verification stage.
///
/// Streams every quick-fingerprint collision through SHA-256 and returns the
/// ranked duplicate groups. With a verify budget set, quick groups are
/// verified most-reclaimable first; once the next group would exceed the
/// budget, it and every remaining file are skipped and recorded as
/// [`ScanError::BudgetExhausted`].
///
/// # Errors
///
/// Returns [`FinderError::WorkerPool`] if no worker thread could be started.
pub fn full_verify_stage(
    quick_groups: HashMap<QuickKey, Vec<FileEntry>>,
    hasher: Hasher,
    config: &StageConfig,
) -> Result<(Vec<DuplicateGroup>, StageStats), FinderError> {
    let mut ordered: Vec<Vec<FileEntry>> = quick_groups
        .into_values()
        .filter(|g| !g.is_empty())
        .map(|mut g| {
            g.sort_by_key(|f| f.discovery_index);
            g
        })
        .collect();
    ordered.sort_by(|a, b| {
        potential_reclaim(b)
            .cmp(&potential_reclaim(a))
            .then_with(|| a[0].discovery_index.cmp(&b[0].discovery_index))
    });

    let mut stats = StageStats {
        input_files: ordered.iter().map(Vec::len).sum(),
        ..Default::default()
    };

    let mut jobs = Vec::with_capacity(stats.input_files);
    let mut planned = 0u64;
    let mut budget_spent = false;
    for group in ordered {
        if !budget_spent {
            let bytes = group.iter().map(|f| f.size).sum::<u64>();
            match config.verify_budget {
                Some(budget) if planned.saturating_add(bytes) > budget => {
                    log::warn!(
                        "Verification budget of {} bytes exhausted; remaining candidates skipped",
                        budget
                    );
                    budget_spent = true;
                }
                _ => {
                    planned += bytes;
                    jobs.extend(group);
                    continue;
                }
            }
        }
        for file in group {
            stats.skipped_files += 1;
            stats.errors.push(ScanError::BudgetExhausted(file.path));
        }
    }

    let total = jobs.len();
    if jobs.is_empty() {
        log::debug!("Full hashing: No files to process");
        return Ok((Vec::new(), stats));
    }

    config.progress.emit(ScanEvent::StageStarted {
        stage: ScanStage::FullHashing,
        total,
    });
    log::info!("Full hashing {} candidates", total);

    let mut verified: HashMap<(u64, Digest), Vec<FileEntry>> = HashMap::new();
    let mut done = 0usize;

    let outcome = config
        .pool("full-hash")
        .run(
            jobs,
            |file: FileEntry| {
                let result = hasher.full_digest(&file.path, file.size);
                (file, result)
            },
            |(file, result): (FileEntry, Result<Digest, HashError>)| {
                done += 1;
                match result {
                    Ok(digest) => {
                        log::trace!("Full digest computed: {}", file.path.display());
                        stats.hashed_files += 1;
                        stats.bytes_read += file.size;
                        verified.entry((file.size, digest)).or_default().push(file);
                    }
                    Err(e) => {
                        log::warn!("Failed to hash {}: {}", file.path.display(), e);
                        stats.failed_files += 1;
                        stats.errors.push(ScanError::Hash {
                            stage: ScanStage::FullHashing,
                            source: e,
                        });
                    }
                }
                emit_progress(&config.progress, ScanStage::FullHashing, done, total);
            },
        )
        .map_err(FinderError::WorkerPool)?;

    if outcome.interrupted {
        stats.interrupted = true;
        log::info!("Full hashing: Interrupted by shutdown signal");
    }

    let mut groups: Vec<DuplicateGroup> = verified
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|((size, digest), files)| {
            log::debug!(
                "Duplicate group {}: {} files of {} bytes",
                hash_to_hex(&digest),
                files.len(),
                size
            );
            DuplicateGroup::new(digest, size, files.into_iter().map(FileRecord::from).collect())
        })
        .collect();
    rank_groups(&mut groups);

    stats.groups = groups.len();
    stats.survivors = groups.iter().map(DuplicateGroup::len).sum();

    config.progress.emit(ScanEvent::StageFinished {
        stage: ScanStage::FullHashing,
        survivors: stats.survivors,
    });
    log::info!(
        "Full hashing complete: {} files → {} duplicates in {} groups",
        stats.input_files,
        stats.survivors,
        stats.groups
    );

    Ok((groups, stats))
}

fn potential_reclaim(files: &[FileEntry]) -> u64 {
    let size = files.first().map_or(0, |f| f.size);
    files.len().saturating_sub(1) as u64 * size
}

/// Configuration for the duplicate finder.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Walker settings (minimum size, hidden files, ignore patterns)
    pub walker_config: WalkerConfig,
    /// Hashing worker threads per stage
    pub io_threads: usize,
    /// Capacity of each stage's job queue
    pub queue_depth: usize,
    /// Bytes sampled from each end of a file by the quick stage
    pub sample_size: usize,
    /// Maximum bytes re-read by full verification; `None` is unlimited
    pub verify_budget: Option<u64>,
    /// Abort on the first soft error instead of collecting it
    pub strict: bool,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Progress stream
    pub progress: ProgressSink,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            walker_config: WalkerConfig::default(),
            io_threads: default_io_threads(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            sample_size: DEFAULT_SAMPLE_SIZE,
            verify_budget: None,
            strict: false,
            shutdown_flag: None,
            progress: ProgressSink::disabled(),
        }
    }
}

impl FinderConfig {
    /// Set the minimum file size.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.walker_config.min_size = min_size;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the number of I/O threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the job queue capacity.
    #[must_use]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Set the quick fingerprint sample size.
    #[must_use]
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size.max(1);
        self
    }

    /// Cap the bytes re-read by full verification.
    #[must_use]
    pub fn with_verify_budget(mut self, budget: Option<u64>) -> Self {
        self.verify_budget = budget;
        self
    }

    /// Enable strict mode (fail on the first soft error).
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Attach a progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    fn stage_config(&self) -> StageConfig {
        StageConfig {
            io_threads: self.io_threads,
            queue_depth: self.queue_depth,
            verify_budget: self.verify_budget,
            shutdown_flag: self.shutdown_flag.clone(),
            progress: self.progress.clone(),
        }
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Where a scan currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanState {
    /// No scan running
    Idle = 0,
    /// Walking the directory tree
    Walking = 1,
    /// Bucketing by size
    Classifying = 2,
    /// Computing quick fingerprints
    QuickHashing = 3,
    /// Computing full digests
    FullHashing = 4,
    /// Groups built, scan finishing
    Grouped = 5,
}

impl ScanState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Walking,
            2 => Self::Classifying,
            3 => Self::QuickHashing,
            4 => Self::FullHashing,
            5 => Self::Grouped,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Walking => "walking",
            Self::Classifying => "classifying",
            Self::QuickHashing => "quick hashing",
            Self::FullHashing => "full hashing",
            Self::Grouped => "grouped",
        };
        f.write_str(name)
    }
}

/// Sets the scan state and resets it to idle when dropped.
struct StateGuard<'a>(&'a AtomicU8);

impl<'a> StateGuard<'a> {
    fn new(state: &'a AtomicU8) -> Self {
        Self(state)
    }

    fn set(&self, state: ScanState) {
        log::debug!("Scan state: {}", state);
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(ScanState::Idle as u8, Ordering::SeqCst);
    }
}

/// Summary statistics from a duplicate scan.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Total number of files walked
    pub total_files: usize,
    /// Logical size of all walked files in bytes
    pub total_size: u64,
    /// Size of all walked files counting each inode once
    pub physical_size: u64,
    /// Walked files that repeat an earlier inode
    pub hardlinks: usize,
    /// Files eliminated by size classification
    pub eliminated_by_size: usize,
    /// Files eliminated by quick fingerprint
    pub eliminated_by_quick: usize,
    /// Files eliminated by full verification
    pub eliminated_by_full: usize,
    /// Bytes read by the hashing stages
    pub bytes_read: u64,
    /// Number of confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Redundant copies across all groups
    pub duplicate_files: usize,
    /// Space freed by keeping one copy per group
    pub reclaimable_space: u64,
    /// Reclaimable space counting each inode once
    pub physical_reclaimable: u64,
    /// Number of soft errors recorded
    pub warnings: usize,
    /// Duration of the entire scan
    pub scan_duration: Duration,
}

impl ScanSummary {
    /// Percentage of the walked bytes that duplicates occupy.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Reclaimable space as a human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        format_size(self.reclaimable_space)
    }

    /// Total size as a human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        format_size(self.total_size)
    }
}

/// Format a byte count for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    bytesize::ByteSize(bytes).to_string()
}

/// Result of a successful scan.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Verified duplicate groups, ranked by reclaimable bytes
    pub groups: Vec<DuplicateGroup>,
    /// Files skipped or dropped along the way
    pub warnings: Vec<ScanError>,
    /// Totals and per-stage counts
    pub summary: ScanSummary,
}

impl ScanReport {
    /// Whether any duplicate group was found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Whether any file was skipped.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Errors that abort a scan.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory (symlinked roots included).
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The root exists but cannot be listed.
    #[error("Cannot read directory {path}: {source}")]
    RootUnreadable {
        /// The root path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Strict mode turned a soft error into a failure.
    #[error("Aborted in strict mode: {0}")]
    Strict(#[source] ScanError),

    /// No hashing worker could be started.
    #[error("Failed to start hashing workers: {0}")]
    WorkerPool(#[source] std::io::Error),
}

/// Duplicate finder running the staged detection funnel.
///
/// # Example
///
/// ```no_run
/// use reclaim::duplicates::{DuplicateFinder, FinderConfig};
/// use std::path::Path;
///
/// let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(4));
/// match finder.scan(Path::new(".")) {
///     Ok(report) => println!("Found {} duplicate groups", report.groups.len()),
///     Err(e) => eprintln!("Scan failed: {}", e),
/// }
/// ```
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Hasher,
    state: AtomicU8,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let hasher = Hasher::with_sample_size(config.sample_size);
        Self {
            config,
            hasher,
            state: AtomicU8::new(ScanState::Idle as u8),
        }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// The finder's configuration.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Current scan state. Safe to call from another thread during a scan.
    #[must_use]
    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Scan `root` for duplicate files.
    ///
    /// # Errors
    ///
    /// Returns a [`FinderError`] if the root does not exist, is not a
    /// directory, cannot be read, the scan is interrupted, strict mode sees a
    /// soft error, or no hashing worker can be started.
    pub fn scan(&self, root: &Path) -> Result<ScanReport, FinderError> {
        let start_time = Instant::now();
        validate_root(root)?;

        log::info!("Starting duplicate scan of {}", root.display());
        self.check_shutdown()?;

        let state = StateGuard::new(&self.state);
        let progress = &self.config.progress;
        let mut warnings = Vec::new();
        let mut summary = ScanSummary::default();

        // Walk
        state.set(ScanState::Walking);
        progress.emit(ScanEvent::StageStarted {
            stage: ScanStage::Walking,
            total: 0,
        });
        let files = self.walk(root, &mut warnings)?;
        progress.emit(ScanEvent::StageFinished {
            stage: ScanStage::Walking,
            survivors: files.len(),
        });

        summary.total_files = files.len();
        summary.total_size = files.iter().map(|f| f.size).sum();
        summary.physical_size = files.iter().filter(|f| !f.is_hardlink).map(|f| f.size).sum();
        summary.hardlinks = files.iter().filter(|f| f.is_hardlink).count();
        log::info!(
            "Found {} files ({} total)",
            summary.total_files,
            format_size(summary.total_size)
        );
        self.check_shutdown()?;

        // Classify
        state.set(ScanState::Classifying);
        progress.emit(ScanEvent::StageStarted {
            stage: ScanStage::Classifying,
            total: files.len(),
        });
        let (size_groups, size_stats) = group_by_size(files);
        summary.eliminated_by_size = size_stats.eliminated_unique;
        progress.emit(ScanEvent::StageFinished {
            stage: ScanStage::Classifying,
            survivors: size_stats.potential_duplicates,
        });
        self.check_shutdown()?;

        let stage_config = self.config.stage_config();

        // Quick fingerprint
        state.set(ScanState::QuickHashing);
        let (quick_groups, quick_stats) =
            quick_fingerprint_stage(size_groups, self.hasher, &stage_config)?;
        summary.eliminated_by_quick = quick_stats.eliminated();
        summary.bytes_read += quick_stats.bytes_read;
        if quick_stats.interrupted {
            return Err(FinderError::Interrupted);
        }
        self.absorb(quick_stats.errors, &mut warnings)?;
        self.check_shutdown()?;

        // Full verification
        state.set(ScanState::FullHashing);
        let (groups, full_stats) = full_verify_stage(quick_groups, self.hasher, &stage_config)?;
        summary.eliminated_by_full = full_stats.eliminated();
        summary.bytes_read += full_stats.bytes_read;
        if full_stats.interrupted {
            return Err(FinderError::Interrupted);
        }
        self.absorb(full_stats.errors, &mut warnings)?;
        self.check_shutdown()?;

        // Group
        state.set(ScanState::Grouped);
        progress.emit(ScanEvent::StageStarted {
            stage: ScanStage::Grouping,
            total: groups.len(),
        });
        summary.duplicate_groups = groups.len();
        summary.duplicate_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        summary.reclaimable_space = groups.iter().map(DuplicateGroup::reclaimable).sum();
        summary.physical_reclaimable = groups
            .iter()
            .map(DuplicateGroup::physical_reclaimable)
            .sum();
        summary.warnings = warnings.len();
        summary.scan_duration = start_time.elapsed();
        progress.emit(ScanEvent::StageFinished {
            stage: ScanStage::Grouping,
            survivors: groups.len(),
        });
        progress.emit(ScanEvent::ScanFinished {
            groups: groups.len(),
            warnings: warnings.len(),
        });

        log::info!(
            "Scan complete: {} duplicate groups, {} reclaimable, {} warnings in {:.2?}",
            summary.duplicate_groups,
            summary.reclaimable_display(),
            summary.warnings,
            summary.scan_duration
        );

        Ok(ScanReport {
            groups,
            warnings,
            summary,
        })
    }

    fn walk(
        &self,
        root: &Path,
        warnings: &mut Vec<ScanError>,
    ) -> Result<Vec<FileEntry>, FinderError> {
        let mut walker = Walker::new(root, self.config.walker_config.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        let mut files = Vec::new();
        for result in walker.walk() {
            match result {
                Ok(file) => {
                    files.push(file);
                    if files.len() % PROGRESS_INTERVAL == 0 {
                        self.config.progress.emit(ScanEvent::StageProgress {
                            stage: ScanStage::Walking,
                            done: files.len(),
                            total: 0,
                        });
                    }
                }
                Err(e) if self.config.strict => return Err(FinderError::Strict(e)),
                Err(e) => warnings.push(e),
            }
        }
        Ok(files)
    }

    fn absorb(
        &self,
        errors: Vec<ScanError>,
        warnings: &mut Vec<ScanError>,
    ) -> Result<(), FinderError> {
        if self.config.strict {
            if let Some(first) = errors.into_iter().next() {
                return Err(FinderError::Strict(first));
            }
            return Ok(());
        }
        warnings.extend(errors);
        Ok(())
    }

    fn check_shutdown(&self) -> Result<(), FinderError> {
        if self.config.is_shutdown_requested() {
            log::info!("Scan interrupted by shutdown signal");
            return Err(FinderError::Interrupted);
        }
        Ok(())
    }
}

fn validate_root(root: &Path) -> Result<(), FinderError> {
    let metadata = match fs::symlink_metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FinderError::PathNotFound(root.to_path_buf()));
        }
        Err(source) => {
            return Err(FinderError::RootUnreadable {
                path: root.to_path_buf(),
                source,
            });
        }
    };

    // A symlinked root would be followed by any traversal, so refuse it
    if metadata.file_type().is_symlink() || !metadata.is_dir() {
        return Err(FinderError::NotADirectory(root.to_path_buf()));
    }

    fs::read_dir(root).map_err(|source| FinderError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Scan `root` for duplicates of at least `min_size` bytes with defaults.
///
/// # Errors
///
/// See [`DuplicateFinder::scan`].
pub fn scan(root: &Path, min_size: u64) -> Result<ScanReport, FinderError> {
    DuplicateFinder::new(FinderConfig::default().with_min_size(min_size)).scan(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::progress_channel;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn create_test_file(dir: &TempDir, name: &str, content: &[u8], index: usize) -> FileEntry {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        FileEntry::new(path, content.len() as u64, SystemTime::now()).with_discovery_index(index)
    }

    fn size_groups(files: Vec<FileEntry>) -> HashMap<u64, Vec<FileEntry>> {
        let mut map: HashMap<u64, Vec<FileEntry>> = HashMap::new();
        for f in files {
            map.entry(f.size).or_default().push(f);
        }
        map
    }

    #[test]
    fn test_quick_stage_groups_identical() {
        let dir = TempDir::new().unwrap();
        let a = create_test_file(&dir, "a.txt", b"identical content", 0);
        let b = create_test_file(&dir, "b.txt", b"identical content", 1);
        let c = create_test_file(&dir, "c.txt", b"different content", 2);

        let (groups, stats) = quick_fingerprint_stage(
            size_groups(vec![a, b, c]),
            Hasher::new(),
            &StageConfig::default(),
        )
        .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(stats.input_files, 3);
        assert_eq!(stats.hashed_files, 3);
        assert_eq!(stats.survivors, 2);
        assert_eq!(stats.eliminated(), 1);
        let members = groups.values().next().unwrap();
        assert_eq!(members[0].discovery_index, 0);
        assert_eq!(members[1].discovery_index, 1);
    }

    #[test]
    fn test_quick_stage_missing_file_is_soft() {
        let dir = TempDir::new().unwrap();
        let a = create_test_file(&dir, "a.txt", b"0123456789", 0);
        let b = create_test_file(&dir, "b.txt", b"0123456789", 1);
        let ghost = FileEntry::new(dir.path().join("ghost.txt"), 10, SystemTime::now())
            .with_discovery_index(2);

        let (groups, stats) = quick_fingerprint_stage(
            size_groups(vec![a, b, ghost]),
            Hasher::new(),
            &StageConfig::default().with_io_threads(2),
        )
        .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(stats.failed_files, 1);
        assert!(matches!(
            stats.errors[0],
            ScanError::Hash {
                stage: ScanStage::QuickHashing,
                ..
            }
        ));
    }

    #[test]
    fn test_quick_stage_interrupted() {
        let dir = TempDir::new().unwrap();
        let a = create_test_file(&dir, "a.txt", b"abc", 0);
        let b = create_test_file(&dir, "b.txt", b"abc", 1);

        let config = StageConfig::default().with_shutdown_flag(Arc::new(AtomicBool::new(true)));
        let (groups, stats) =
            quick_fingerprint_stage(size_groups(vec![a, b]), Hasher::new(), &config).unwrap();

        assert!(stats.interrupted);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_full_stage_separates_middle_difference() {
        let dir = TempDir::new().unwrap();
        let mut x = vec![b'a'; 64 * 1024];
        let mut y = x.clone();
        x[32 * 1024] = b'x';
        y[32 * 1024] = b'y';

        let a = create_test_file(&dir, "a.bin", &x, 0);
        let b = create_test_file(&dir, "b.bin", &x, 1);
        let c = create_test_file(&dir, "c.bin", &y, 2);

        let hasher = Hasher::with_sample_size(1024);
        let config = StageConfig::default();
        let (quick, _) =
            quick_fingerprint_stage(size_groups(vec![a, b, c]), hasher, &config).unwrap();
        assert_eq!(quick.values().next().unwrap().len(), 3);

        let (groups, stats) = full_verify_stage(quick, hasher, &config).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].files[0].name, "a.bin");
        assert_eq!(groups[0].files[1].name, "b.bin");
        assert_eq!(stats.survivors, 2);
        assert_eq!(stats.bytes_read, 3 * 64 * 1024);
    }

    #[test]
    fn test_full_stage_size_changed_drops_file() {
        let dir = TempDir::new().unwrap();
        let a = create_test_file(&dir, "a.txt", b"same bytes", 0);
        let b = create_test_file(&dir, "b.txt", b"same bytes", 1);
        let c = create_test_file(&dir, "c.txt", b"same bytes", 2);

        let mut quick = HashMap::new();
        quick.insert((10, [0u8; 32]), vec![a, b, c.clone()]);
        fs::write(&c.path, b"same bytes, then more").unwrap();

        let (groups, stats) =
            full_verify_stage(quick, Hasher::new(), &StageConfig::default()).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(stats.failed_files, 1);
    }

    #[test]
    fn test_full_stage_budget_exhausted() {
        let dir = TempDir::new().unwrap();
        let big_a = create_test_file(&dir, "big_a", &[1u8; 1000], 0);
        let big_b = create_test_file(&dir, "big_b", &[1u8; 1000], 1);
        let small_a = create_test_file(&dir, "small_a", &[2u8; 10], 2);
        let small_b = create_test_file(&dir, "small_b", &[2u8; 10], 3);

        let mut quick = HashMap::new();
        quick.insert((1000, [1u8; 32]), vec![big_a, big_b]);
        quick.insert((10, [2u8; 32]), vec![small_a, small_b]);

        let config = StageConfig::default().with_verify_budget(Some(2000));
        let (groups, stats) = full_verify_stage(quick, Hasher::new(), &config).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].size, 1000);
        assert_eq!(stats.skipped_files, 2);
        assert!(stats
            .errors
            .iter()
            .all(|e| matches!(e, ScanError::BudgetExhausted(_))));
    }

    #[test]
    fn test_scan_concrete_scenario() {
        let dir = TempDir::new().unwrap();
        let x = vec![b'X'; 100];
        let y = vec![b'Y'; 100];
        fs::write(dir.path().join("a.txt"), &x).unwrap();
        fs::write(dir.path().join("b.txt"), &x).unwrap();
        fs::write(dir.path().join("c.txt"), &y).unwrap();
        fs::write(dir.path().join("d.txt"), &x[..50]).unwrap();

        let report = scan(dir.path(), 10).unwrap();

        assert_eq!(report.groups.len(), 1);
        let names: Vec<_> = report.groups[0].files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(report.groups[0].size, 100);
        assert!(report.warnings.is_empty());
        assert_eq!(report.summary.total_files, 4);
        assert_eq!(report.summary.reclaimable_space, 100);
    }

    #[test]
    fn test_scan_path_not_found() {
        let result = scan(Path::new("/nonexistent/reclaim/root"), 0);
        assert!(matches!(result, Err(FinderError::PathNotFound(_))));
    }

    #[test]
    fn test_scan_file_root_is_not_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(scan(&file, 0), Err(FinderError::NotADirectory(_))));
    }

    #[test]
    #[cfg(unix)]
    fn test_scan_symlink_root_is_not_followed() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target");
        fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(matches!(scan(&link, 0), Err(FinderError::NotADirectory(_))));
    }

    #[test]
    fn test_scan_interrupted_before_start() {
        let dir = TempDir::new().unwrap();
        let config = FinderConfig::default().with_shutdown_flag(Arc::new(AtomicBool::new(true)));
        let finder = DuplicateFinder::new(config);

        assert!(matches!(finder.scan(dir.path()), Err(FinderError::Interrupted)));
        assert_eq!(finder.state(), ScanState::Idle);
    }

    #[test]
    fn test_scan_state_returns_to_idle() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), b"dup").unwrap();
        fs::write(dir.path().join("b"), b"dup").unwrap();

        let finder = DuplicateFinder::with_defaults();
        assert_eq!(finder.state(), ScanState::Idle);
        let report = finder.scan(dir.path()).unwrap();
        assert_eq!(report.groups.len(), 1);
        assert_eq!(finder.state(), ScanState::Idle);
    }

    #[test]
    fn test_scan_emits_stage_events_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), b"content").unwrap();
        fs::write(dir.path().join("b"), b"content").unwrap();

        let (sink, events) = progress_channel(256);
        let finder = DuplicateFinder::new(FinderConfig::default().with_progress(sink));
        finder.scan(dir.path()).unwrap();
        drop(finder);

        let started: Vec<ScanStage> = events
            .try_iter()
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

    #[test]
    fn test_scan_no_duplicates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), b"one").unwrap();
        fs::write(dir.path().join("b"), b"two!").unwrap();

        let report = scan(dir.path(), 0).unwrap();
        assert!(!report.has_duplicates());
        assert_eq!(report.summary.eliminated_by_size, 2);
    }

    #[test]
    fn test_scan_state_display() {
        assert_eq!(ScanState::QuickHashing.to_string(), "quick hashing");
        assert_eq!(ScanState::from_u8(5), ScanState::Grouped);
        assert_eq!(ScanState::from_u8(200), ScanState::Idle);
    }

    #[test]
    fn test_finder_config_builders() {
        let config = FinderConfig::default()
            .with_min_size(10)
            .with_io_threads(0)
            .with_queue_depth(16)
            .with_sample_size(4096)
            .with_verify_budget(Some(1 << 20))
            .with_strict(true);

        assert_eq!(config.walker_config.min_size, 10);
        assert_eq!(config.io_threads, 1);
        assert_eq!(config.queue_depth, 16);
        assert_eq!(config.sample_size, 4096);
        assert_eq!(config.verify_budget, Some(1 << 20));
        assert!(config.strict);
    }
}
