//! Typed progress reporting for the duplicate funnel.
//!
//! The engine emits [`ScanEvent`] values through a [`ProgressSink`]. The sink
//! never blocks: when the channel is full, disconnected or absent the event is
//! dropped. Presentation is left to the receiver; [`ProgressRenderer`] is the
//! terminal renderer used by the binary and draws indicatif bars on its own
//! thread.
//!
//! # Example
//!
//! ```
//! use reclaim::progress::{describe_event, progress_channel, ScanEvent, ScanStage};
//!
//! let (sink, events) = progress_channel(16);
//! sink.emit(ScanEvent::StageStarted { stage: ScanStage::QuickHashing, total: 42 });
//! drop(sink);
//!
//! let lines: Vec<String> = events.iter().map(|e| describe_event(&e)).collect();
//! assert_eq!(lines, vec!["Stage 2: quick-hashing 42 candidates"]);
//! ```

use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// A stage of the duplicate funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanStage {
    /// Directory traversal
    Walking,
    /// Size bucketing
    Classifying,
    /// Bounded head/tail fingerprinting
    QuickHashing,
    /// Whole-file verification
    FullHashing,
    /// Group assembly and ranking
    Grouping,
}

impl ScanStage {
    /// Position of the stage in the funnel, starting at 0 for the walk.
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::Walking => 0,
            Self::Classifying => 1,
            Self::QuickHashing => 2,
            Self::FullHashing => 3,
            Self::Grouping => 4,
        }
    }
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Walking => "walking",
            Self::Classifying => "classifying",
            Self::QuickHashing => "quick hashing",
            Self::FullHashing => "full hashing",
            Self::Grouping => "grouping",
        };
        f.write_str(name)
    }
}

/// An observation emitted by the engine while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A stage began with `total` items to process (0 when unknown).
    StageStarted {
        /// Stage that started
        stage: ScanStage,
        /// Items the stage will process
        total: usize,
    },
    /// A stage advanced.
    StageProgress {
        /// Stage reporting progress
        stage: ScanStage,
        /// Items processed so far
        done: usize,
        /// Items the stage will process (0 when unknown)
        total: usize,
    },
    /// A stage completed, leaving `survivors` items for the next one.
    StageFinished {
        /// Stage that finished
        stage: ScanStage,
        /// Items passed on to the next stage
        survivors: usize,
    },
    /// The whole scan completed.
    ScanFinished {
        /// Number of duplicate groups found
        groups: usize,
        /// Number of soft errors recorded
        warnings: usize,
    },
}

/// Non-blocking sender half of the progress stream.
///
/// The default sink has no receiver and discards everything.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    sender: Option<Sender<ScanEvent>>,
}

impl ProgressSink {
    /// Wrap a channel sender.
    #[must_use]
    pub fn new(sender: Sender<ScanEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sink that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether a receiver was attached.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Send an event without blocking. Full or closed channels drop it.
    pub fn emit(&self, event: ScanEvent) {
        if let Some(sender) = &self.sender {
            match sender.try_send(event) {
                Ok(()) | Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }
}

/// Create a bounded progress channel.
#[must_use]
pub fn progress_channel(capacity: usize) -> (ProgressSink, Receiver<ScanEvent>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (ProgressSink::new(tx), rx)
}

/// Human-readable description of an event.
#[must_use]
pub fn describe_event(event: &ScanEvent) -> String {
    match event {
        ScanEvent::StageStarted { stage, total } => {
            let n = stage.number();
            match stage {
                ScanStage::Walking => format!("Stage {n}: walking directory tree"),
                ScanStage::Classifying => format!("Stage {n}: grouping {total} files by size"),
                ScanStage::QuickHashing => format!("Stage {n}: quick-hashing {total} candidates"),
                ScanStage::FullHashing => format!("Stage {n}: full-hashing {total} candidates"),
                ScanStage::Grouping => format!("Stage {n}: building duplicate groups"),
            }
        }
        ScanEvent::StageProgress { stage, done, total } if *total > 0 => {
            format!("{stage}: {done}/{total}")
        }
        ScanEvent::StageProgress { stage, done, .. } => format!("{stage}: {done}"),
        ScanEvent::StageFinished { stage, survivors } => {
            format!("Stage {} complete: {survivors} remaining", stage.number())
        }
        ScanEvent::ScanFinished { groups, warnings } => {
            format!("Scan complete: {groups} duplicate groups, {warnings} warnings")
        }
    }
}

/// Terminal renderer draining a progress stream on a background thread.
///
/// The thread exits once every [`ProgressSink`] for the channel is dropped.
#[derive(Debug)]
pub struct ProgressRenderer {
    handle: Option<JoinHandle<()>>,
}

impl ProgressRenderer {
    /// Start rendering events from `events`.
    ///
    /// With `quiet` set the events are drained without drawing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the rendering thread cannot be spawned.
    pub fn spawn(events: Receiver<ScanEvent>, quiet: bool) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name("reclaim-progress".to_string())
            .spawn(move || render_loop(&events, quiet))?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wait for the renderer to drain the stream.
    pub fn finish(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::debug!("Progress renderer thread panicked");
            }
        }
    }
}

impl Drop for ProgressRenderer {
    fn drop(&mut self) {
        self.join();
    }
}

fn render_loop(events: &Receiver<ScanEvent>, quiet: bool) {
    let multi = MultiProgress::new();
    let mut active: Option<(ScanStage, ProgressBar)> = None;

    for event in events.iter() {
        if quiet {
            continue;
        }
        match event {
            ScanEvent::StageStarted {
                stage: ScanStage::Walking,
                ..
            } => {
                let pb = multi.add(ProgressBar::new_spinner());
                pb.set_style(walking_style());
                pb.set_message("Walking directory");
                pb.enable_steady_tick(Duration::from_millis(100));
                active = Some((ScanStage::Walking, pb));
            }
            ScanEvent::StageStarted { stage, total }
                if matches!(stage, ScanStage::QuickHashing | ScanStage::FullHashing) =>
            {
                let pb = multi.add(ProgressBar::new(total as u64));
                pb.set_style(hashing_style(stage));
                pb.set_message(stage.to_string());
                active = Some((stage, pb));
            }
            ScanEvent::StageStarted { .. } => {}
            ScanEvent::StageProgress { stage, done, .. } => {
                if let Some((current, pb)) = &active {
                    if *current == stage {
                        pb.set_position(done as u64);
                    }
                }
            }
            ScanEvent::StageFinished { stage, survivors } => {
                if let Some((current, pb)) = active.take() {
                    if current == stage {
                        pb.finish_with_message(format!("{stage} complete: {survivors} remaining"));
                    } else {
                        active = Some((current, pb));
                    }
                }
            }
            ScanEvent::ScanFinished { .. } => {
                if let Some((_, pb)) = active.take() {
                    pb.finish_and_clear();
                }
            }
        }
    }

    if let Some((_, pb)) = active.take() {
        pb.abandon();
    }
}

fn walking_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
}

fn hashing_style(stage: ScanStage) -> ProgressStyle {
    let template = if stage == ScanStage::FullHashing {
        "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} ({percent}%) {msg} {per_sec} (ETA: {eta})"
    } else {
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})"
    };
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
}
