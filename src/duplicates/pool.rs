//! Bounded worker pool shared by the hashing stages.
//!
//! Jobs go through a bounded `crossbeam-channel` queue, so the feeding thread
//! blocks once every worker is busy and the queue is full. Workers send their
//! results over a second channel that the calling thread drains as the single
//! collector; no accumulation map is shared between threads.
//!
//! Workers are scoped threads, which lets the work closure borrow from the
//! caller's stack.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded};

/// Default capacity of the job queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// Upper bound on hashing workers when no explicit count is configured.
pub const MAX_DEFAULT_IO_THREADS: usize = 8;

/// Default number of I/O workers.
///
/// Twice the available parallelism, clamped to `[2, 8]`. Hashing is I/O-bound,
/// and more readers than that only makes the disk seek.
#[must_use]
pub fn default_io_threads() -> usize {
    let cores = thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    (cores * 2).clamp(2, MAX_DEFAULT_IO_THREADS)
}

/// What happened during one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolOutcome {
    /// Jobs handed to the workers
    pub submitted: usize,
    /// Results passed to the collector
    pub collected: usize,
    /// Workers that actually started
    pub workers: usize,
    /// Feeding stopped early because shutdown was requested
    pub interrupted: bool,
}

/// A fixed-size pool of scoped worker threads with a bounded job queue.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: String,
    workers: usize,
    queue_depth: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl WorkerPool {
    /// Create a pool. Zero workers or queue depth are raised to 1.
    #[must_use]
    pub fn new(name: impl Into<String>, workers: usize, queue_depth: usize) -> Self {
        Self {
            name: name.into(),
            workers: workers.max(1),
            queue_depth: queue_depth.max(1),
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag checked before each job is fed.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Option<Arc<AtomicBool>>) -> Self {
        self.shutdown_flag = flag;
        self
    }

    /// Configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Run `work` over every job and pass each result to `collect`.
    ///
    /// Results arrive in completion order. If shutdown is requested, feeding
    /// stops; jobs already queued still run but their results are discarded.
    ///
    /// # Errors
    ///
    /// Returns the spawn error if not a single worker thread could be started.
    /// A partial failure only shrinks the pool.
    pub fn run<J, R, W, C>(
        &self,
        jobs: impl IntoIterator<Item = J>,
        work: W,
        mut collect: C,
    ) -> io::Result<PoolOutcome>
    where
        J: Send,
        R: Send,
        W: Fn(J) -> R + Sync,
        C: FnMut(R),
    {
        thread::scope(|scope| {
            let (job_tx, job_rx) = bounded::<J>(self.queue_depth);
            let (result_tx, result_rx) = unbounded::<R>();
            let work = &work;

            let mut outcome = PoolOutcome::default();
            let mut last_error = None;

            for i in 0..self.workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("{}-{}", self.name, i))
                    .spawn_scoped(scope, move || {
                        for job in job_rx.iter() {
                            if result_tx.send(work(job)).is_err() {
                                break;
                            }
                        }
                    });
                match spawned {
                    Ok(_) => outcome.workers += 1,
                    Err(e) => {
                        log::warn!("{}: failed to spawn worker {}: {}", self.name, i, e);
                        last_error = Some(e);
                    }
                }
            }

            // Workers hold the only remaining clones
            drop(job_rx);
            drop(result_tx);

            if outcome.workers == 0 {
                return Err(last_error
                    .unwrap_or_else(|| io::Error::other("no worker threads started")));
            }
            log::debug!("{}: {} workers started", self.name, outcome.workers);

            for job in jobs {
                if self.is_shutdown_requested() {
                    log::debug!("{}: Shutdown requested, no more jobs fed", self.name);
                    outcome.interrupted = true;
                    break;
                }
                if job_tx.send(job).is_err() {
                    break;
                }
                outcome.submitted += 1;

                while let Ok(result) = result_rx.try_recv() {
                    collect(result);
                    outcome.collected += 1;
                }
            }
            drop(job_tx);

            for result in result_rx.iter() {
                if outcome.interrupted {
                    continue;
                }
                collect(result);
                outcome.collected += 1;
            }

            Ok(outcome)
        })
    }
}
