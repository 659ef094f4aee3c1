//! Split report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::{EnumScanWarningKind, SpecScanWarning, SpecSplitError};

/// Aggregate counters and diagnostics for one split run.
#[derive(Debug, Default, Clone)]
pub struct ReportSplit {
    /// Directories listed by the scanner.
    pub cnt_folders_scanned: u64,
    /// Folders with a valid allocation in the plan.
    pub cnt_folders_planned: u64,
    /// Folders skipped by a scan warning or an allocation error.
    pub cnt_folders_skipped: u64,
    /// Files assigned to a split.
    pub cnt_files_planned: u64,
    /// Files written to a split directory.
    pub cnt_files_copied: u64,
    /// Files not written (dry-run or conflict strategy).
    pub cnt_files_skipped: u64,
    /// Non-fatal scan problems.
    pub warnings: Vec<SpecScanWarning>,
    /// Per-folder and per-file failures.
    pub errors: Vec<SpecSplitError>,
}

impl ReportSplit {
    /// Number of collected hard errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_folders_scanned".to_string(), self.cnt_folders_scanned);
        dict_counts.insert("cnt_folders_planned".to_string(), self.cnt_folders_planned);
        dict_counts.insert("cnt_folders_skipped".to_string(), self.cnt_folders_skipped);
        dict_counts.insert("cnt_files_planned".to_string(), self.cnt_files_planned);
        dict_counts.insert("cnt_files_copied".to_string(), self.cnt_files_copied);
        dict_counts.insert("cnt_files_skipped".to_string(), self.cnt_files_skipped);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} folders={} planned={} skipped={} files={} copied={} files_skipped={} errors={} warnings={}",
            self.cnt_folders_scanned,
            self.cnt_folders_planned,
            self.cnt_folders_skipped,
            self.cnt_files_planned,
            self.cnt_files_copied,
            self.cnt_files_skipped,
            self.error_count(),
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[SPLIT]"))
    }
}

/// Mutable accumulator for split statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportSplitBuilder {
    /// See [`ReportSplit::cnt_folders_scanned`].
    pub cnt_folders_scanned: u64,
    /// See [`ReportSplit::cnt_folders_planned`].
    pub cnt_folders_planned: u64,
    /// See [`ReportSplit::cnt_folders_skipped`].
    pub cnt_folders_skipped: u64,
    /// See [`ReportSplit::cnt_files_planned`].
    pub cnt_files_planned: u64,
    /// See [`ReportSplit::cnt_files_copied`].
    pub cnt_files_copied: u64,
    /// See [`ReportSplit::cnt_files_skipped`].
    pub cnt_files_skipped: u64,
    /// See [`ReportSplit::warnings`].
    pub warnings: Vec<SpecScanWarning>,
    /// See [`ReportSplit::errors`].
    pub errors: Vec<SpecSplitError>,
}

impl ReportSplitBuilder {
    /// Record one planned folder with `n_files` files.
    pub fn add_planned_folder(&mut self, n_files: usize) {
        self.cnt_folders_planned += 1;
        self.cnt_files_planned += n_files as u64;
    }

    /// Increment skipped folder count by one.
    pub fn add_skipped_folder(&mut self) {
        self.cnt_folders_skipped += 1;
    }

    /// Increment copied file count by one.
    pub fn add_copied(&mut self) {
        self.cnt_files_copied += 1;
    }

    /// Increment skipped file count by one.
    pub fn add_skipped(&mut self) {
        self.cnt_files_skipped += 1;
    }

    /// Record a scan warning. Folder-level kinds also count the folder as skipped.
    pub fn add_warning(&mut self, spec_warning: SpecScanWarning) {
        tracing::warn!("{}", spec_warning.message);
        if matches!(
            spec_warning.kind,
            EnumScanWarningKind::Unreadable | EnumScanWarningKind::EmptyAfterFilter
        ) {
            self.cnt_folders_skipped += 1;
        }
        self.warnings.push(spec_warning);
    }

    /// Add one path-scoped error.
    pub fn add_error(&mut self, path: PathBuf, exception: String) {
        tracing::warn!("{}: {exception}", path.display());
        self.errors.push(SpecSplitError { path, exception });
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportSplit {
        ReportSplit {
            cnt_folders_scanned: self.cnt_folders_scanned,
            cnt_folders_planned: self.cnt_folders_planned,
            cnt_folders_skipped: self.cnt_folders_skipped,
            cnt_files_planned: self.cnt_files_planned,
            cnt_files_copied: self.cnt_files_copied,
            cnt_files_skipped: self.cnt_files_skipped,
            warnings: self.warnings,
            errors: self.errors,
        }
    }
}
