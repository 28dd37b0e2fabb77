//! Human-readable text report.
//!
//! Groups are printed in ranked order. The member the retention policy keeps
//! is marked `[keep]`; every other member is a removal candidate.

use std::io::{self, Write};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use yansi::{Paint, Style};

use crate::duplicates::{format_size, DuplicateGroup, RetentionPolicy, ScanReport, ScanSummary};
use crate::scanner::ScanError;

const HEADER: Style = Style::new().cyan().bold();
const KEEP: Style = Style::new().green().bold();
const REMOVE: Style = Style::new().red();
const DIM: Style = Style::new().bright_black();
const WARN: Style = Style::new().yellow();

/// Number of digest characters shown per group.
const DIGEST_PREFIX: usize = 12;

/// Renders a [`ScanReport`] as plain or colored text.
#[derive(Debug, Clone, Copy)]
pub struct TextOutput<'a> {
    report: &'a ScanReport,
    policy: RetentionPolicy,
    use_color: bool,
}

impl<'a> TextOutput<'a> {
    /// Create a renderer for `report`.
    #[must_use]
    pub fn new(report: &'a ScanReport, policy: RetentionPolicy) -> Self {
        Self {
            report,
            policy,
            use_color: true,
        }
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.use_color {
            text.paint(style).to_string()
        } else {
            text.to_string()
        }
    }

    /// Write the full report.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        if self.report.groups.is_empty() {
            writeln!(writer, "No duplicate files found.")?;
        }
        for (i, group) in self.report.groups.iter().enumerate() {
            self.write_group(writer, i + 1, group)?;
            writeln!(writer)?;
        }
        if !self.report.warnings.is_empty() {
            self.write_warnings(writer, &self.report.warnings)?;
            writeln!(writer)?;
        }
        self.write_summary(writer, &self.report.summary)
    }

    fn write_group<W: Write>(
        &self,
        writer: &mut W,
        number: usize,
        group: &DuplicateGroup,
    ) -> io::Result<()> {
        let digest = group.digest_hex();
        let header = format!(
            "Group {}: {} copies of {} ({} reclaimable)",
            number,
            group.len(),
            format_size(group.size),
            format_size(group.reclaimable())
        );
        writeln!(
            writer,
            "{}  {}",
            self.paint(&header, HEADER),
            self.paint(&format!("sha256:{}", &digest[..DIGEST_PREFIX]), DIM)
        )?;

        let keep_index = group
            .select_retained(self.policy)
            .map(|s| s.keep.discovery_index);
        for file in &group.files {
            let marker = if keep_index == Some(file.discovery_index) {
                self.paint("[keep]", KEEP)
            } else {
                self.paint("[dup] ", REMOVE)
            };
            let link = if file.is_hardlink { " (hardlink)" } else { "" };
            writeln!(
                writer,
                "  {} {}  {}{}",
                marker,
                file.path.display(),
                self.paint(&format_local(file.modified), DIM),
                link
            )?;
        }
        Ok(())
    }

    fn write_warnings<W: Write>(&self, writer: &mut W, warnings: &[ScanError]) -> io::Result<()> {
        writeln!(
            writer,
            "{}",
            self.paint(&format!("Skipped {} file(s):", warnings.len()), WARN)
        )?;
        for warning in warnings {
            writeln!(writer, "  {warning}")?;
        }
        Ok(())
    }

    fn write_summary<W: Write>(&self, writer: &mut W, summary: &ScanSummary) -> io::Result<()> {
        writeln!(
            writer,
            "Scanned {} files ({}) in {:.2?}",
            summary.total_files,
            summary.total_size_display(),
            summary.scan_duration
        )?;
        writeln!(
            writer,
            "Eliminated: {} by size, {} by quick hash, {} by full hash",
            summary.eliminated_by_size, summary.eliminated_by_quick, summary.eliminated_by_full
        )?;
        let reclaim = format!(
            "{} duplicate groups, {} redundant files, {} reclaimable ({:.1}%)",
            summary.duplicate_groups,
            summary.duplicate_files,
            summary.reclaimable_display(),
            summary.wasted_percentage()
        );
        writeln!(writer, "{}", self.paint(&reclaim, HEADER))?;
        if summary.physical_reclaimable != summary.reclaimable_space {
            writeln!(
                writer,
                "{} on disk after hard links",
                format_size(summary.physical_reclaimable)
            )?;
        }
        Ok(())
    }
}

fn format_local(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
