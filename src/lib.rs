//! Reclaim - duplicate file detection for disk space reclamation
//!
//! The engine narrows a directory tree down to verified duplicate groups in
//! stages: walk, classify by size, sampled BLAKE3 fingerprint, full SHA-256
//! verification, then ranking by reclaimable bytes. Cleanup moves every copy
//! but one per group to the system trash.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::Context;

use crate::actions::{clean_groups, SystemTrash};
use crate::cli::{Cli, Commands, OutputFormat};
use crate::config::Config;
use crate::duplicates::{format_size, DuplicateFinder, FinderError, RetentionPolicy, ScanReport};
use crate::error::ExitCode;
use crate::output::{JsonOutput, TextOutput};
use crate::progress::{progress_channel, ProgressRenderer, ProgressSink};

/// Capacity of the progress event channel.
const PROGRESS_CAPACITY: usize = 1024;

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the scan fails fatally or
/// output cannot be written. An interrupted scan surfaces as
/// [`FinderError::Interrupted`] inside the returned error.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let args = cli.command.scan_args();
    let config = Config::load(cli.config.as_deref(), &args.overrides())
        .context("Failed to load configuration")?;
    log::debug!("Effective configuration: {config:?}");

    let handler = signal::install_handler()?;

    let show_progress =
        !cli.quiet && args.output == OutputFormat::Text && io::stderr().is_terminal();
    let (sink, renderer) = if show_progress {
        let (sink, events) = progress_channel(PROGRESS_CAPACITY);
        (sink, Some(ProgressRenderer::spawn(events, false)?))
    } else {
        (ProgressSink::disabled(), None)
    };

    let finder = DuplicateFinder::new(config.finder_config(Some(handler.flag()), sink));
    let result = finder.scan(&args.path);
    // The renderer exits once the finder's sink is gone
    drop(finder);
    if let Some(renderer) = renderer {
        renderer.finish();
    }
    let report = result.with_context(|| format!("Failed to scan {}", args.path.display()))?;

    let mut exit_code = ExitCode::from_report(&report);
    let use_color = !cli.no_color && io::stdout().is_terminal();
    let mut stdout = io::stdout().lock();
    write_report(&mut stdout, &report, config.keep, args.output, exit_code, use_color)?;

    if let Commands::Clean(clean) = &cli.command {
        if handler.is_shutdown_requested() {
            return Err(FinderError::Interrupted.into());
        }
        if !report.has_duplicates() {
            return Ok(exit_code);
        }

        let count = report.summary.duplicate_files;
        let prompt = format!(
            "Move {} file(s) ({}) to the trash, keeping the {} copy of each group?",
            count,
            format_size(report.summary.reclaimable_space),
            config.keep
        );
        let approved = clean.yes || confirm(&mut io::stdin().lock(), &mut io::stderr(), &prompt)?;
        if !approved {
            eprintln!("Cleanup cancelled.");
            return Ok(exit_code);
        }

        let result = clean_groups(&report.groups, config.keep, &SystemTrash);
        for (path, err) in &result.failures {
            log::warn!("Not removed {}: {}", path.display(), err);
        }
        eprintln!("{}", result.summary());
        if !result.all_succeeded() {
            exit_code = ExitCode::PartialSuccess;
        }
    }

    Ok(exit_code)
}

fn write_report<W: Write>(
    writer: &mut W,
    report: &ScanReport,
    policy: RetentionPolicy,
    format: OutputFormat,
    exit_code: ExitCode,
    use_color: bool,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => JsonOutput::new(report, policy, exit_code)
            .write_to(writer, true)
            .context("Failed to write JSON report")?,
        OutputFormat::Text => TextOutput::new(report, policy)
            .with_color(use_color)
            .write_to(writer)
            .context("Failed to write report")?,
    }
    Ok(())
}

/// Ask a yes/no question. Anything but `y`/`yes` declines, as does EOF.
fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<bool> {
    write!(output, "{prompt} (y/N): ")?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Ok(false);
    }
    let answer = answer.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}
