//! `axiomkit_io_split` v1:
//! Rust-side dataset tree splitter.
//!
//! Pipeline stages, one module each:
//! - `scan`     : lazy folder discovery
//! - `filter`   : extension filter
//! - `random`   : seeded per-folder shuffling
//! - `allocate` : exact per-split counts
//! - `assign`   : contiguous slicing into splits
//! - `plan`     : side-effect-free output plan
//! - `write`    : plan writer boundary and filesystem writer
//! - `split`    : orchestration
//! - `spec`     : enums/options/errors
//! - `report`   : run-time report model
//! - `util`     : shared helper functions

pub mod allocate;
pub mod assign;
pub mod filter;
pub mod plan;
pub mod random;
pub mod report;
pub mod scan;
pub mod spec;
pub mod split;
#[cfg(test)]
mod test_util;
mod util;
pub mod write;

pub use allocate::{allocate_counts, derive_ideal_counts, validate_counts};
pub use assign::assign_to_splits;
pub use filter::SpecExtensionFilter;
pub use plan::{SpecFolderAllocation, SplitPlan};
pub use random::SpecRandomizer;
pub use report::{ReportSplit, ReportSplitBuilder};
pub use scan::{EnumScanItem, FolderScanner, SpecFolderRecord};
pub use spec::{
    EnumScanWarningKind, EnumSplitFileConflictStrategy, EnumSplitFolderMode,
    EnumSplitRoundingMode, SpecScanWarning, SpecSplitConfig, SpecSplitError, SpecSplitOptions,
    SpecWriteOptions, SplitAllocationError, SplitTreeError,
};
pub use split::{plan_split_tree, split_tree, split_tree_with_writer};
pub use util::is_overlap;
pub use write::{FsPlanWriter, SplitPlanWriter};
