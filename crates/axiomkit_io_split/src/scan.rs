//! Lazy, deterministic discovery of the folders to split.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::filter::SpecExtensionFilter;
use crate::spec::{EnumScanWarningKind, EnumSplitFolderMode, SpecScanWarning};

/// One folder selected for splitting, with its filtered files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFolderRecord {
    /// Folder path relative to the scan root (empty for the root itself).
    pub path_dir_rel: PathBuf,
    /// Folder path as seen on disk.
    pub path_dir_src: PathBuf,
    /// Direct files accepted by the extension filter, in lexical order.
    pub l_files: Vec<String>,
}

/// Item produced by [`FolderScanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumScanItem {
    /// A qualifying folder with at least one accepted file.
    Folder(SpecFolderRecord),
    /// A recoverable problem; the folder or file concerned was skipped.
    Warning(SpecScanWarning),
}

#[derive(Debug, Default)]
struct SpecDirListing {
    l_dirs: Vec<(String, PathBuf)>,
    l_files: Vec<String>,
    /// Set for every subfolder entry, including ones skipped with a warning.
    b_has_subdir: bool,
}

/// Depth-first folder walker.
///
/// Parents are visited before their children, children in lexical order of
/// their names, so an unchanged tree always enumerates identically. Directory
/// symlinks are not followed and do not count as subfolders.
#[derive(Debug)]
pub struct FolderScanner {
    path_dir_root: PathBuf,
    rule_folder: EnumSplitFolderMode,
    spec_ext_filter: SpecExtensionFilter,
    l_stack: Vec<PathBuf>,
    l_pending: VecDeque<EnumScanItem>,
    cnt_dirs_visited: u64,
}

impl FolderScanner {
    /// Scanner over the tree rooted at `path_dir_root`.
    pub fn new<P: AsRef<Path>>(
        path_dir_root: P,
        rule_folder: EnumSplitFolderMode,
        spec_ext_filter: SpecExtensionFilter,
    ) -> Self {
        let path_dir_root = path_dir_root.as_ref().to_path_buf();
        Self {
            l_stack: vec![path_dir_root.clone()],
            path_dir_root,
            rule_folder,
            spec_ext_filter,
            l_pending: VecDeque::new(),
            cnt_dirs_visited: 0,
        }
    }

    /// Number of directories listed so far.
    pub fn cnt_dirs_visited(&self) -> u64 {
        self.cnt_dirs_visited
    }

    fn visit(&mut self, path_dir: PathBuf) {
        self.cnt_dirs_visited += 1;

        let spec_listing = match self.read_listing(&path_dir) {
            Ok(v) => v,
            Err(e) => {
                self.push_warning(
                    path_dir.clone(),
                    EnumScanWarningKind::Unreadable,
                    format!("Failed to read directory {} ({e})", path_dir.display()),
                );
                return;
            }
        };

        for (_, path_dir_sub) in spec_listing.l_dirs.iter().rev() {
            self.l_stack.push(path_dir_sub.clone());
        }

        let b_qualifies = match self.rule_folder {
            EnumSplitFolderMode::LeafOnly => !spec_listing.b_has_subdir,
            EnumSplitFolderMode::AllFolders => true,
        };
        if !b_qualifies || spec_listing.l_files.is_empty() {
            return;
        }

        let l_files = self.spec_ext_filter.apply(spec_listing.l_files);
        if l_files.is_empty() {
            self.push_warning(
                path_dir.clone(),
                EnumScanWarningKind::EmptyAfterFilter,
                format!(
                    "No files matching {:?} in {}",
                    self.spec_ext_filter.suffixes(),
                    path_dir.display()
                ),
            );
            return;
        }

        let path_dir_rel = path_dir
            .strip_prefix(&self.path_dir_root)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.l_pending
            .push_back(EnumScanItem::Folder(SpecFolderRecord {
                path_dir_rel,
                path_dir_src: path_dir,
                l_files,
            }));
    }

    fn read_listing(&mut self, path_dir: &Path) -> std::io::Result<SpecDirListing> {
        let mut spec_listing = SpecDirListing::default();

        for entry_res in fs::read_dir(path_dir)? {
            let entry = match entry_res {
                Ok(v) => v,
                Err(e) => {
                    self.push_warning(
                        path_dir.to_path_buf(),
                        EnumScanWarningKind::UnreadableEntry,
                        format!(
                            "Failed to read directory entry under {} ({e})",
                            path_dir.display()
                        ),
                    );
                    continue;
                }
            };

            let path_entry = entry.path();
            let res_file_type = entry
                .file_type()
                .or_else(|_| fs::symlink_metadata(&path_entry).map(|m| m.file_type()));
            let cfg_file_type = match res_file_type {
                Ok(v) => v,
                Err(e) => {
                    // Unknown entry may be a subfolder: the parent is not a leaf.
                    spec_listing.b_has_subdir = true;
                    self.push_warning(
                        path_entry.clone(),
                        EnumScanWarningKind::UnreadableEntry,
                        format!("Failed to inspect {} ({e})", path_entry.display()),
                    );
                    continue;
                }
            };
            if cfg_file_type.is_dir() {
                spec_listing.b_has_subdir = true;
            }

            let b_is_file = if cfg_file_type.is_symlink() {
                fs::metadata(&path_entry).is_ok_and(|m| m.is_file())
            } else {
                cfg_file_type.is_file()
            };
            if !cfg_file_type.is_dir() && !b_is_file {
                tracing::debug!("Entry skipped: {}", path_entry.display());
                continue;
            }

            let name_entry = match entry.file_name().into_string() {
                Ok(v) => v,
                Err(_) => {
                    self.push_warning(
                        path_entry.clone(),
                        EnumScanWarningKind::NonUtf8Name,
                        format!("Non UTF-8 name skipped: {}", path_entry.display()),
                    );
                    continue;
                }
            };

            if cfg_file_type.is_dir() {
                spec_listing.l_dirs.push((name_entry, path_entry));
            } else {
                spec_listing.l_files.push(name_entry);
            }
        }

        spec_listing.l_dirs.sort_by(|a, b| a.0.cmp(&b.0));
        spec_listing.l_files.sort();
        Ok(spec_listing)
    }

    fn push_warning(&mut self, path: PathBuf, kind: EnumScanWarningKind, message: String) {
        self.l_pending
            .push_back(EnumScanItem::Warning(SpecScanWarning {
                path,
                kind,
                message,
            }));
    }
}

impl Iterator for FolderScanner {
    type Item = EnumScanItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.l_pending.pop_front() {
                return Some(item);
            }
            let path_dir = self.l_stack.pop()?;
            self.visit(path_dir);
        }
    }
}
