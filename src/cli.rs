//! Command-line interface definitions.
//!
//! ```bash
//! # Report duplicates of at least 1 MiB
//! reclaim scan ~/Downloads --min-size 1MiB
//!
//! # Machine-readable report, keeping the oldest copy of each group
//! reclaim scan ~/Downloads --output json --keep oldest
//!
//! # Move every non-retained copy to the trash without prompting
//! reclaim clean ~/Downloads --yes
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::ConfigOverrides;
use crate::duplicates::RetentionPolicy;

/// Find duplicate files and reclaim the space they waste.
///
/// Files are compared by size, then by a sampled BLAKE3 fingerprint, then by
/// a full SHA-256 digest. Cleanup moves copies to the system trash.
#[derive(Debug, Parser)]
#[command(name = "reclaim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Config file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory and report duplicate groups
    Scan(ScanArgs),
    /// Scan, then move every non-retained copy to the trash
    Clean(CleanArgs),
}

impl Commands {
    /// Scan options shared by every subcommand.
    #[must_use]
    pub fn scan_args(&self) -> &ScanArgs {
        match self {
            Self::Scan(args) => args,
            Self::Clean(args) => &args.scan,
        }
    }
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Minimum file size to consider (e.g., 4KiB, 1MB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Which copy of each group to keep
    #[arg(long, value_enum, value_name = "POLICY")]
    pub keep: Option<KeepArg>,

    /// Number of hashing threads (default: 2 per core, between 2 and 8)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub io_threads: Option<u16>,

    /// Stop full verification after reading this many bytes
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub verify_budget: Option<u64>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Gitignore-style pattern to skip (can be repeated)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Fail on the first unreadable file instead of skipping it
    #[arg(long)]
    pub strict: bool,
}

impl ScanArgs {
    /// The configuration layer these flags contribute.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            min_size: self.min_size,
            keep: self.keep.map(RetentionPolicy::from),
            io_threads: self.io_threads.map(usize::from),
            verify_budget: self.verify_budget,
            skip_hidden: self.skip_hidden.then_some(true),
            ignore_patterns: (!self.ignore_patterns.is_empty())
                .then(|| self.ignore_patterns.clone()),
            strict: self.strict.then_some(true),
            ..ConfigOverrides::default()
        }
    }
}

/// Arguments for the clean subcommand.
#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Scan options
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Retention policy flag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeepArg {
    /// Keep the most recently modified copy
    Newest,
    /// Keep the least recently modified copy
    Oldest,
}

impl From<KeepArg> for RetentionPolicy {
    fn from(arg: KeepArg) -> Self {
        match arg {
            KeepArg::Newest => Self::KeepNewest,
            KeepArg::Oldest => Self::KeepOldest,
        }
    }
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use reclaim::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
