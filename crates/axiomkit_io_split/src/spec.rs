//! Split configuration models, enums and top-level error types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region Constants

/// Integer units per percent. Percentages are quantized to micro-percent.
pub const N_PERCENT_SCALE: u64 = 1_000_000;
/// Integer units of a complete 100% configuration.
pub const N_PERCENT_UNITS_TOTAL: u64 = 100 * N_PERCENT_SCALE;
/// Tolerance used when a full percentage list is checked against 100.
pub const F_PERCENT_SUM_TOLERANCE: f64 = 1e-6;
/// Minimum number of splits.
pub const N_SPLITS_MIN: usize = 2;
/// Prefix of split directory names (`split-1`, `split-2`, ...).
pub const C_SPLIT_DIR_PREFIX: &str = "split-";
/// File name of the plan manifest written next to the split directories.
pub const C_PLAN_MANIFEST_NAME: &str = "split_plan.json";

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Policy converting non-integer ideal counts to integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumSplitRoundingMode {
    /// Round half to even on every split but the last; last takes the remainder.
    #[default]
    Standard,
    /// Round down on every split but the last; last takes the remainder.
    Floor,
    /// Round up on every split but the last, clamped to the remaining budget.
    Ceil,
    /// Largest-remainder apportionment over all splits.
    Proportional,
}

/// Which folders of the input tree are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumSplitFolderMode {
    /// Only folders without subfolders.
    #[default]
    LeafOnly,
    /// Every folder that directly contains files.
    AllFolders,
}

/// Existing destination file conflict policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumSplitFileConflictStrategy {
    /// Keep destination file and skip current source file.
    Skip,
    /// Replace destination file with source file.
    #[default]
    Overwrite,
    /// Record an error and skip this file.
    Error,
}

/// Reason a folder or file was skipped during scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumScanWarningKind {
    /// Directory could not be listed.
    Unreadable,
    /// One directory entry could not be inspected.
    UnreadableEntry,
    /// Directory had files, but none passed the extension filter.
    EmptyAfterFilter,
    /// File name is not valid UTF-8.
    NonUtf8Name,
}

impl EnumSplitRoundingMode {
    /// Canonical snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Proportional => "proportional",
        }
    }
}

impl EnumSplitFolderMode {
    /// Canonical snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeafOnly => "leaf_only",
            Self::AllFolders => "all_folders",
        }
    }
}

impl EnumSplitFileConflictStrategy {
    /// Canonical snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
            Self::Error => "error",
        }
    }
}

impl EnumScanWarningKind {
    /// Canonical snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreadable => "unreadable",
            Self::UnreadableEntry => "unreadable_entry",
            Self::EmptyAfterFilter => "empty_after_filter",
            Self::NonUtf8Name => "non_utf8_name",
        }
    }
}

impl FromStr for EnumSplitRoundingMode {
    type Err = SplitTreeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "floor" => Ok(Self::Floor),
            "ceil" => Ok(Self::Ceil),
            "proportional" => Ok(Self::Proportional),
            _ => Err(SplitTreeError::InvalidConfig(format!(
                "Invalid rounding mode: `{value}`. Expected one of: ['standard', 'floor', 'ceil', 'proportional']"
            ))),
        }
    }
}

impl FromStr for EnumSplitFolderMode {
    type Err = SplitTreeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "leaf_only" | "leaf" => Ok(Self::LeafOnly),
            "all_folders" | "all" => Ok(Self::AllFolders),
            _ => Err(SplitTreeError::InvalidConfig(format!(
                "Invalid folder mode: `{value}`. Expected one of: ['leaf_only', 'all_folders']"
            ))),
        }
    }
}

impl FromStr for EnumSplitFileConflictStrategy {
    type Err = SplitTreeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "overwrite" => Ok(Self::Overwrite),
            "error" => Ok(Self::Error),
            _ => Err(SplitTreeError::InvalidConfig(format!(
                "Invalid file conflict strategy: `{value}`. Expected one of: ['skip', 'overwrite', 'error']"
            ))),
        }
    }
}

impl fmt::Display for EnumSplitRoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for EnumSplitFolderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for EnumSplitFileConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SplitConfig

/// Validated, ordered split percentages.
///
/// Holds both the user-facing percentages and their micro-percent integer
/// units. Units always sum to [`N_PERCENT_UNITS_TOTAL`]; the last split's
/// units are derived so quantization never breaks the total.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSplitConfig {
    percentages: Vec<f64>,
    units: Vec<u64>,
}

impl SpecSplitConfig {
    /// Build from the first `K-1` percentages; the `K`-th is `100 - sum`.
    pub fn from_leading_percentages(percentages_leading: &[f64]) -> Result<Self, SplitTreeError> {
        if percentages_leading.len() + 1 < N_SPLITS_MIN {
            return Err(SplitTreeError::InvalidConfig(format!(
                "At least {N_SPLITS_MIN} splits are required; got {} split(s).",
                percentages_leading.len() + 1
            )));
        }
        let sum_leading: f64 = percentages_leading.iter().sum();
        let mut percentages = percentages_leading.to_vec();
        percentages.push(100.0 - sum_leading);
        Self::from_quantized(percentages)
    }

    /// Build from all `K` percentages, which must sum to 100.
    pub fn from_percentages(percentages: &[f64]) -> Result<Self, SplitTreeError> {
        if percentages.len() < N_SPLITS_MIN {
            return Err(SplitTreeError::InvalidConfig(format!(
                "At least {N_SPLITS_MIN} splits are required; got {} split(s).",
                percentages.len()
            )));
        }
        let sum_total: f64 = percentages.iter().sum();
        if (sum_total - 100.0).abs() > F_PERCENT_SUM_TOLERANCE {
            return Err(SplitTreeError::InvalidConfig(format!(
                "Split percentages must sum to 100; got {sum_total}."
            )));
        }
        Self::from_quantized(percentages.to_vec())
    }

    fn from_quantized(percentages: Vec<f64>) -> Result<Self, SplitTreeError> {
        for (n_idx, pct) in percentages.iter().enumerate() {
            if !pct.is_finite() || *pct <= 0.0 || *pct >= 100.0 {
                return Err(SplitTreeError::InvalidConfig(format!(
                    "Percentage for {C_SPLIT_DIR_PREFIX}{} must be in (0, 100); got {pct}.",
                    n_idx + 1
                )));
            }
        }

        let n_splits = percentages.len();
        let mut units = Vec::with_capacity(n_splits);
        let mut units_used: u64 = 0;
        for (n_idx, pct) in percentages[..n_splits - 1].iter().enumerate() {
            let unit = (pct * N_PERCENT_SCALE as f64).round() as u64;
            if unit == 0 {
                return Err(SplitTreeError::InvalidConfig(format!(
                    "Percentage for {C_SPLIT_DIR_PREFIX}{} is below the supported resolution: {pct}.",
                    n_idx + 1
                )));
            }
            units_used += unit;
            units.push(unit);
        }
        if units_used >= N_PERCENT_UNITS_TOTAL {
            return Err(SplitTreeError::InvalidConfig(format!(
                "Leading split percentages leave nothing for {C_SPLIT_DIR_PREFIX}{n_splits}."
            )));
        }
        units.push(N_PERCENT_UNITS_TOTAL - units_used);

        Ok(Self { percentages, units })
    }

    /// Number of splits `K`.
    pub fn n_splits(&self) -> usize {
        self.units.len()
    }

    /// Percentages in split order.
    pub fn percentages(&self) -> &[f64] {
        &self.percentages
    }

    /// Micro-percent units in split order.
    pub fn units(&self) -> &[u64] {
        &self.units
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Input options for planning a split.
#[derive(Debug, Clone)]
pub struct SpecSplitOptions {
    /// Validated split percentages.
    pub spec_split_config: SpecSplitConfig,
    /// Accepted file suffixes (case-insensitive). `None`/empty accepts all files.
    pub extensions: Option<Vec<String>>,
    /// Which folders are split.
    pub rule_folder: EnumSplitFolderMode,
    /// Count rounding policy.
    pub rule_rounding: EnumSplitRoundingMode,
    /// Shuffle each folder's files before slicing.
    pub if_shuffle: bool,
    /// Run seed. Only valid together with `if_shuffle`.
    pub seed: Option<u64>,
    /// Maximum worker threads for folder planning.
    pub num_workers_max: Option<usize>,
}

impl SpecSplitOptions {
    /// Options with default behavior for the given percentages.
    pub fn new(spec_split_config: SpecSplitConfig) -> Self {
        Self {
            spec_split_config,
            extensions: None,
            rule_folder: EnumSplitFolderMode::LeafOnly,
            rule_rounding: EnumSplitRoundingMode::Standard,
            if_shuffle: false,
            seed: None,
            num_workers_max: None,
        }
    }

    /// Reject combinations that are invalid regardless of the input tree.
    pub fn validate(&self) -> Result<(), SplitTreeError> {
        if self.seed.is_some() && !self.if_shuffle {
            return Err(SplitTreeError::InvalidConfig(
                "A seed was supplied but shuffling is disabled.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Input options for the filesystem plan writer.
#[derive(Debug, Clone)]
pub struct SpecWriteOptions {
    /// Conflict behavior for destination files.
    pub rule_conflict_file: EnumSplitFileConflictStrategy,
    /// Maximum worker threads for the file-copy stage.
    pub num_workers_max: Option<usize>,
    /// Remove existing `split-*` directories and manifest before writing.
    pub if_clear_output: bool,
    /// Do not mutate filesystem; record what would happen.
    pub if_dry_run: bool,
}

impl Default for SpecWriteOptions {
    fn default() -> Self {
        Self {
            rule_conflict_file: EnumSplitFileConflictStrategy::Overwrite,
            num_workers_max: None,
            if_clear_output: true,
            if_dry_run: false,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// One failure item with path + error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecSplitError {
    /// Failed folder, source or destination path.
    pub path: PathBuf,
    /// User-facing error text.
    pub exception: String,
}

/// One recoverable scan problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecScanWarning {
    /// Folder or file concerned.
    pub path: PathBuf,
    /// Warning category.
    pub kind: EnumScanWarningKind,
    /// User-facing warning text.
    pub message: String,
}

/// "Top-level call failed" errors (configuration / setup stage).
#[derive(Debug, Error)]
pub enum SplitTreeError {
    /// Invalid percentages, seed usage or option value.
    #[error("{0}")]
    InvalidConfig(String),
    /// Invalid extension filter entry.
    #[error("{0}")]
    InvalidExtension(String),
    /// Source path is not a directory.
    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    /// Source and destination overlap (`src` contains `dst` or vice versa).
    #[error(
        "Source and destination directories overlap: {} <-> {}",
        source_dir.display(),
        destination_dir.display()
    )]
    SourceDestinationOverlap {
        /// Normalized source directory.
        source_dir: PathBuf,
        /// Normalized destination directory.
        destination_dir: PathBuf,
    },
    /// Destination initialization failed.
    #[error("Failed to initialize destination {}: {message}", path.display())]
    DestinationInitFailed {
        /// Destination path that failed initialization.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
}

/// Per-folder allocation/assignment defects. Never expected for valid input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitAllocationError {
    /// Counts do not add up to the folder's file count.
    #[error("Allocation invariant violated: counts {counts:?} do not sum to {n_files}")]
    InvariantViolation {
        /// Folder file count.
        n_files: usize,
        /// Offending counts.
        counts: Vec<usize>,
    },
    /// Number of counts differs from the number of splits.
    #[error("Allocation produced {n_counts} counts for {n_splits} splits")]
    SplitCountMismatch {
        /// Expected number of splits.
        n_splits: usize,
        /// Number of counts produced.
        n_counts: usize,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
