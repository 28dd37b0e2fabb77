//! Report formatters for scan results.
//!
//! - [`json`] for automation and scripting
//! - [`text`] for terminals
//!
//! # Example
//!
//! ```no_run
//! use reclaim::duplicates::{scan, RetentionPolicy};
//! use reclaim::error::ExitCode;
//! use reclaim::output::JsonOutput;
//! use std::path::Path;
//!
//! let report = scan(Path::new("."), 1024).unwrap();
//! let exit_code = ExitCode::from_report(&report);
//! let output = JsonOutput::new(&report, RetentionPolicy::KeepNewest, exit_code);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::{JsonOutput, JsonOutputError};
pub use text::TextOutput;
