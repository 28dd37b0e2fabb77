//! File actions module.
//!
//! Acting on a scan result happens here, never inside the engine. Every
//! removal is a move to the system trash, re-checked against the scan
//! snapshot first.
//!
//! ```no_run
//! use reclaim::actions::{clean_groups, SystemTrash};
//! use reclaim::duplicates::{scan, RetentionPolicy};
//! use std::path::Path;
//!
//! let report = scan(Path::new("."), 1024).unwrap();
//! let result = clean_groups(&report.groups, RetentionPolicy::KeepNewest, &SystemTrash);
//! println!("{}", result.summary());
//! ```

pub mod delete;

pub use delete::{
    clean_group, clean_groups, validate_preserves_copy, BatchDeleteResult, DeleteError,
    DeleteResult, FileSnapshot, SafeDelete, SystemTrash,
};
