//! Side-effect-free output plan handed to writers and loggers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::spec::{C_SPLIT_DIR_PREFIX, EnumSplitFolderMode, EnumSplitRoundingMode};

/// Allocation and assignment of one source folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecFolderAllocation {
    /// Folder path relative to the source root.
    pub path_dir_rel: PathBuf,
    /// Number of files split.
    pub n_files: usize,
    /// Files per split, in split order.
    pub counts: Vec<usize>,
    /// Assigned file names per split, in split order.
    pub l_splits: Vec<Vec<String>>,
}

/// Complete result of planning one run.
///
/// `l_folders` keeps scan order. The per-split view (split index to relative
/// folder to files) is derived from it, see [`SplitPlan::folders_for_split`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    /// Source root the relative folder paths are anchored at.
    pub path_dir_src: PathBuf,
    /// Split percentages, in split order.
    pub percentages: Vec<f64>,
    /// Rounding policy used.
    pub rule_rounding: EnumSplitRoundingMode,
    /// Folder selection used.
    pub rule_folder: EnumSplitFolderMode,
    /// Normalized accepted suffixes; empty when all files were accepted.
    pub extensions: Vec<String>,
    /// Effective shuffle seed; `None` when files kept their lexical order.
    pub seed: Option<u64>,
    /// Planned folders.
    pub l_folders: Vec<SpecFolderAllocation>,
}

impl SplitPlan {
    /// Number of splits.
    pub fn n_splits(&self) -> usize {
        self.percentages.len()
    }

    /// Directory name of split `n_idx` (zero-based index, one-based name).
    pub fn split_name(n_idx: usize) -> String {
        format!("{C_SPLIT_DIR_PREFIX}{}", n_idx + 1)
    }

    /// Directory names of all splits.
    pub fn split_names(&self) -> Vec<String> {
        (0..self.n_splits()).map(Self::split_name).collect()
    }

    /// Folder allocation for a relative folder path.
    pub fn folder(&self, path_dir_rel: &Path) -> Option<&SpecFolderAllocation> {
        self.l_folders
            .iter()
            .find(|f| f.path_dir_rel.as_path() == path_dir_rel)
    }

    /// Files of `path_dir_rel` assigned to split `n_idx`.
    pub fn files_for(&self, n_idx: usize, path_dir_rel: &Path) -> Option<&[String]> {
        self.folder(path_dir_rel)
            .and_then(|f| f.l_splits.get(n_idx))
            .map(Vec::as_slice)
    }

    /// Relative folder to assigned files, for split `n_idx`.
    ///
    /// Every planned folder is present, possibly with an empty list.
    pub fn folders_for_split(&self, n_idx: usize) -> BTreeMap<&Path, &[String]> {
        self.l_folders
            .iter()
            .filter_map(|f| {
                f.l_splits
                    .get(n_idx)
                    .map(|l_files| (f.path_dir_rel.as_path(), l_files.as_slice()))
            })
            .collect()
    }

    /// Total planned files.
    pub fn cnt_files(&self) -> usize {
        self.l_folders.iter().map(|f| f.n_files).sum()
    }

    /// Planned files per split.
    pub fn cnt_files_per_split(&self) -> Vec<usize> {
        let mut l_cnt = vec![0; self.n_splits()];
        for spec_folder in &self.l_folders {
            for (n_cnt, n_count) in l_cnt.iter_mut().zip(&spec_folder.counts) {
                *n_cnt += n_count;
            }
        }
        l_cnt
    }

    /// Concatenate a folder's splits in split order.
    pub fn reconstruct_folder(&self, path_dir_rel: &Path) -> Option<Vec<String>> {
        self.folder(path_dir_rel).map(|f| f.l_splits.concat())
    }

    /// Pretty JSON manifest.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
