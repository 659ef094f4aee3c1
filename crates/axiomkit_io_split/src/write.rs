//! Filesystem materialization of a [`SplitPlan`].

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::plan::SplitPlan;
use crate::report::ReportSplitBuilder;
use crate::spec::{C_PLAN_MANIFEST_NAME, C_SPLIT_DIR_PREFIX, SpecWriteOptions, SplitTreeError};
use crate::util::{
    build_thread_pool, calculate_worker_limit, copy_file_with_metadata, is_overlap,
    should_skip_file_conflict, validate_destination_path_safety,
};

/// I/O collaborator receiving a finished plan.
///
/// Planning never touches the destination; everything observable on disk
/// goes through an implementation of this trait.
pub trait SplitPlanWriter {
    /// Materialize `plan`, recording per-file outcomes in `builder_report`.
    ///
    /// Returns an error only for setup failures that prevent writing at all.
    fn write_plan(
        &self,
        plan: &SplitPlan,
        builder_report: &mut ReportSplitBuilder,
    ) -> Result<(), SplitTreeError>;
}

#[derive(Debug, Clone)]
struct SpecCopyTaskFile {
    path_file_src: PathBuf,
    path_file_dst: PathBuf,
}

/// Copies planned files into `split-<i>/<relative folder>/` under a root.
#[derive(Debug, Clone)]
pub struct FsPlanWriter {
    path_dir_dst: PathBuf,
    spec_write_options: SpecWriteOptions,
}

impl FsPlanWriter {
    /// Writer targeting `dir_destination` (the output root).
    pub fn new<P: AsRef<Path>>(dir_destination: P, spec_write_options: SpecWriteOptions) -> Self {
        Self {
            path_dir_dst: dir_destination.as_ref().to_path_buf(),
            spec_write_options,
        }
    }

    /// Output root.
    pub fn path_dir_dst(&self) -> &Path {
        &self.path_dir_dst
    }

    fn init_destination_root(&self) -> Result<(), SplitTreeError> {
        let path_dir_dst = &self.path_dir_dst;
        if self.spec_write_options.if_dry_run {
            if let Ok(meta_dir_dst) = fs::symlink_metadata(path_dir_dst) {
                if meta_dir_dst.file_type().is_symlink() {
                    return Err(SplitTreeError::DestinationInitFailed {
                        path: path_dir_dst.clone(),
                        message: "Destination root path must not be a symbolic link.".to_string(),
                    });
                }
            }
            return Ok(());
        }

        fs::create_dir_all(path_dir_dst).map_err(|e| SplitTreeError::DestinationInitFailed {
            path: path_dir_dst.clone(),
            message: e.to_string(),
        })?;
        let meta_dir_dst =
            fs::symlink_metadata(path_dir_dst).map_err(|e| SplitTreeError::DestinationInitFailed {
                path: path_dir_dst.clone(),
                message: e.to_string(),
            })?;
        if meta_dir_dst.file_type().is_symlink() {
            return Err(SplitTreeError::DestinationInitFailed {
                path: path_dir_dst.clone(),
                message: "Destination root path must not be a symbolic link.".to_string(),
            });
        }
        Ok(())
    }

    /// Remove `split-<n>` entries and the manifest left by a previous run.
    fn clear_previous_output(&self) -> Result<(), SplitTreeError> {
        let map_init_err = |path: &Path, e: std::io::Error| SplitTreeError::DestinationInitFailed {
            path: path.to_path_buf(),
            message: format!("Failed to clear previous output ({e})"),
        };

        let iter_entries =
            fs::read_dir(&self.path_dir_dst).map_err(|e| map_init_err(&self.path_dir_dst, e))?;
        for entry in iter_entries {
            let entry = entry.map_err(|e| map_init_err(&self.path_dir_dst, e))?;
            let name_entry = entry.file_name();
            let Some(name_entry) = name_entry.to_str() else {
                continue;
            };
            let path_entry = entry.path();
            if !is_split_dir_name(name_entry) && name_entry != C_PLAN_MANIFEST_NAME {
                continue;
            }

            let file_type = entry
                .file_type()
                .map_err(|e| map_init_err(&path_entry, e))?;
            let res_remove = if file_type.is_dir() {
                fs::remove_dir_all(&path_entry)
            } else {
                fs::remove_file(&path_entry)
            };
            res_remove.map_err(|e| map_init_err(&path_entry, e))?;
            tracing::debug!("Removed previous output {}", path_entry.display());
        }
        Ok(())
    }

    fn collect_copy_tasks(
        &self,
        plan: &SplitPlan,
        builder_report: &mut ReportSplitBuilder,
    ) -> Vec<SpecCopyTaskFile> {
        let if_dry_run = self.spec_write_options.if_dry_run;
        let rule_conflict = self.spec_write_options.rule_conflict_file;
        let mut l_tasks_file_copy = Vec::with_capacity(plan.cnt_files());

        for name_split in plan.split_names() {
            let path_dir_split = self.path_dir_dst.join(&name_split);
            if !if_dry_run {
                if let Err(e) = fs::create_dir_all(&path_dir_split) {
                    builder_report.add_error(path_dir_split, e.to_string());
                }
            }
        }

        for spec_folder in &plan.l_folders {
            let path_dir_src = plan.path_dir_src.join(&spec_folder.path_dir_rel);
            for (n_idx, l_files) in spec_folder.l_splits.iter().enumerate() {
                let path_dir_dst_sub = self
                    .path_dir_dst
                    .join(SplitPlan::split_name(n_idx))
                    .join(&spec_folder.path_dir_rel);

                if let Err(message) =
                    validate_destination_path_safety(&path_dir_dst_sub, &self.path_dir_dst)
                {
                    builder_report.add_error(path_dir_dst_sub, message);
                    continue;
                }
                if !if_dry_run {
                    if let Err(e) = fs::create_dir_all(&path_dir_dst_sub) {
                        builder_report.add_error(path_dir_dst_sub, e.to_string());
                        continue;
                    }
                }

                for name_file in l_files {
                    let path_file_dst = path_dir_dst_sub.join(name_file);
                    if should_skip_file_conflict(&path_file_dst, rule_conflict, builder_report) {
                        continue;
                    }
                    if if_dry_run {
                        builder_report.add_skipped();
                        continue;
                    }
                    l_tasks_file_copy.push(SpecCopyTaskFile {
                        path_file_src: path_dir_src.join(name_file),
                        path_file_dst,
                    });
                }
            }
        }
        l_tasks_file_copy
    }

    fn flush_file_copy_tasks(
        &self,
        l_tasks_file_copy: Vec<SpecCopyTaskFile>,
        builder_report: &mut ReportSplitBuilder,
    ) {
        if l_tasks_file_copy.is_empty() {
            return;
        }

        let path_dir_dst_root = self.path_dir_dst.as_path();
        let run_task = |spec_task: SpecCopyTaskFile| {
            let res_copy =
                validate_destination_path_safety(&spec_task.path_file_dst, path_dir_dst_root)
                    .and_then(|_| {
                        copy_file_with_metadata(&spec_task.path_file_src, &spec_task.path_file_dst)
                            .map_err(|e| {
                                format!("Failed to copy {} ({e})", spec_task.path_file_src.display())
                            })
                    });
            (spec_task.path_file_dst, res_copy)
        };

        let n_workers = calculate_worker_limit(self.spec_write_options.num_workers_max);
        let l_results = match build_thread_pool(n_workers) {
            Some(thread_pool) => thread_pool.install(|| {
                l_tasks_file_copy
                    .into_par_iter()
                    .map(run_task)
                    .collect::<Vec<_>>()
            }),
            None => l_tasks_file_copy
                .into_iter()
                .map(run_task)
                .collect::<Vec<_>>(),
        };

        for (path_file_dst, res_copy) in l_results {
            match res_copy {
                Ok(_) => builder_report.add_copied(),
                Err(msg) => builder_report.add_error(path_file_dst, msg),
            }
        }
    }

    fn write_manifest(&self, plan: &SplitPlan, builder_report: &mut ReportSplitBuilder) {
        let path_file_manifest = self.path_dir_dst.join(C_PLAN_MANIFEST_NAME);
        let res_write = plan
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|txt| fs::write(&path_file_manifest, txt).map_err(|e| e.to_string()));
        match res_write {
            Ok(_) => tracing::info!("Plan manifest written to {}", path_file_manifest.display()),
            Err(msg) => builder_report.add_error(path_file_manifest, msg),
        }
    }
}

/// Whether `name` is a split directory name (`split-` followed by digits only).
fn is_split_dir_name(name: &str) -> bool {
    name.strip_prefix(C_SPLIT_DIR_PREFIX)
        .is_some_and(|n_part| !n_part.is_empty() && n_part.bytes().all(|b| b.is_ascii_digit()))
}

impl SplitPlanWriter for FsPlanWriter {
    fn write_plan(
        &self,
        plan: &SplitPlan,
        builder_report: &mut ReportSplitBuilder,
    ) -> Result<(), SplitTreeError> {
        if is_overlap(&plan.path_dir_src, &self.path_dir_dst) {
            return Err(SplitTreeError::SourceDestinationOverlap {
                source_dir: plan.path_dir_src.clone(),
                destination_dir: self.path_dir_dst.clone(),
            });
        }
        self.init_destination_root()?;

        let if_dry_run = self.spec_write_options.if_dry_run;
        if self.spec_write_options.if_clear_output && !if_dry_run {
            self.clear_previous_output()?;
        }

        let l_tasks_file_copy = self.collect_copy_tasks(plan, builder_report);
        tracing::info!(
            "Writing {} file(s) into {} split(s) under {}{}",
            l_tasks_file_copy.len(),
            plan.n_splits(),
            self.path_dir_dst.display(),
            if if_dry_run { " [dry-run]" } else { "" }
        );
        self.flush_file_copy_tasks(l_tasks_file_copy, builder_report);

        if !if_dry_run {
            self.write_manifest(plan, builder_report);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{FsPlanWriter, SplitPlanWriter, is_split_dir_name};
    use crate::plan::{SpecFolderAllocation, SplitPlan};
    use crate::report::ReportSplitBuilder;
    use crate::spec::{
        EnumSplitFileConflictStrategy, EnumSplitFolderMode, EnumSplitRoundingMode,
        SpecWriteOptions, SplitTreeError,
    };
    use crate::test_util::{TestDir, write_text};

    fn build_plan(path_dir_src: &Path) -> SplitPlan {
        write_text(&path_dir_src.join("cats/c0.png"), "c0");
        write_text(&path_dir_src.join("cats/c1.png"), "c1");
        write_text(&path_dir_src.join("cats/c2.png"), "c2");
        write_text(&path_dir_src.join("dogs/d0.png"), "d0");
        SplitPlan {
            path_dir_src: path_dir_src.to_path_buf(),
            percentages: vec![70.0, 30.0],
            rule_rounding: EnumSplitRoundingMode::Standard,
            rule_folder: EnumSplitFolderMode::LeafOnly,
            extensions: vec![],
            seed: None,
            l_folders: vec![
                SpecFolderAllocation {
                    path_dir_rel: PathBuf::from("cats"),
                    n_files: 3,
                    counts: vec![2, 1],
                    l_splits: vec![
                        vec!["c0.png".to_string(), "c1.png".to_string()],
                        vec!["c2.png".to_string()],
                    ],
                },
                SpecFolderAllocation {
                    path_dir_rel: PathBuf::from("dogs"),
                    n_files: 1,
                    counts: vec![1, 0],
                    l_splits: vec![vec!["d0.png".to_string()], vec![]],
                },
            ],
        }
    }

    #[test]
    fn fs_writer_copies_files_into_split_dirs() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("outputs");
        let plan = build_plan(&src);

        let mut builder_report = ReportSplitBuilder::default();
        FsPlanWriter::new(&dst, SpecWriteOptions::default())
            .write_plan(&plan, &mut builder_report)
            .expect("write plan");
        let report = builder_report.build();

        assert_eq!(report.error_count(), 0);
        assert_eq!(report.cnt_files_copied, 4);
        assert!(dst.join("split-1/cats/c0.png").is_file());
        assert!(dst.join("split-1/cats/c1.png").is_file());
        assert!(dst.join("split-2/cats/c2.png").is_file());
        assert!(dst.join("split-1/dogs/d0.png").is_file());
        assert!(dst.join("split-2/dogs").is_dir());
        assert!(!dst.join("split-2/cats/c0.png").exists());
        assert_eq!(
            std::fs::read_to_string(dst.join("split-2/cats/c2.png")).expect("read"),
            "c2"
        );

        let txt = std::fs::read_to_string(dst.join("split_plan.json")).expect("manifest");
        let plan_back: SplitPlan = serde_json::from_str(&txt).expect("parse manifest");
        assert_eq!(plan_back, plan);
    }

    #[test]
    fn fs_writer_dry_run_writes_nothing() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("outputs");
        let plan = build_plan(&src);

        let spec_write_options = SpecWriteOptions {
            if_dry_run: true,
            ..SpecWriteOptions::default()
        };
        let mut builder_report = ReportSplitBuilder::default();
        FsPlanWriter::new(&dst, spec_write_options)
            .write_plan(&plan, &mut builder_report)
            .expect("write plan");
        let report = builder_report.build();

        assert_eq!(report.cnt_files_copied, 0);
        assert_eq!(report.cnt_files_skipped, 4);
        assert!(!dst.exists());
    }

    #[test]
    fn fs_writer_rejects_overlap() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        let plan = build_plan(&src);

        let mut builder_report = ReportSplitBuilder::default();
        let err = FsPlanWriter::new(src.join("outputs"), SpecWriteOptions::default())
            .write_plan(&plan, &mut builder_report)
            .expect_err("overlap must fail");
        assert!(matches!(err, SplitTreeError::SourceDestinationOverlap { .. }));
        assert!(!src.join("outputs").exists());
    }

    #[test]
    fn fs_writer_clears_previous_splits_only() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("outputs");
        let plan = build_plan(&src);
        write_text(&dst.join("split-3/stale/x.png"), "stale");
        write_text(&dst.join("split-1/cats/old.png"), "old");
        write_text(&dst.join("log.txt"), "log");

        let mut builder_report = ReportSplitBuilder::default();
        FsPlanWriter::new(&dst, SpecWriteOptions::default())
            .write_plan(&plan, &mut builder_report)
            .expect("write plan");

        assert!(!dst.join("split-3").exists());
        assert!(!dst.join("split-1/cats/old.png").exists());
        assert!(dst.join("log.txt").is_file());
        assert!(dst.join("split-1/cats/c0.png").is_file());
    }

    #[test]
    fn fs_writer_clear_keeps_entries_that_only_share_the_prefix() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("outputs");
        let plan = build_plan(&src);
        write_text(&dst.join("split-notes.txt"), "notes");
        write_text(&dst.join("split-backup/model.bin"), "model");
        write_text(&dst.join("split-/x.png"), "x");
        write_text(&dst.join("split-7/stale.png"), "stale");

        let mut builder_report = ReportSplitBuilder::default();
        FsPlanWriter::new(&dst, SpecWriteOptions::default())
            .write_plan(&plan, &mut builder_report)
            .expect("write plan");

        assert!(dst.join("split-notes.txt").is_file());
        assert!(dst.join("split-backup/model.bin").is_file());
        assert!(dst.join("split-/x.png").is_file());
        assert!(!dst.join("split-7").exists());
    }

    #[test]
    fn split_dir_name_requires_digits() {
        assert!(is_split_dir_name("split-1"));
        assert!(is_split_dir_name("split-12"));
        assert!(!is_split_dir_name("split-"));
        assert!(!is_split_dir_name("split-1a"));
        assert!(!is_split_dir_name("split-notes.txt"));
        assert!(!is_split_dir_name("Split-1"));
    }

    #[test]
    fn fs_writer_conflict_skip_keeps_existing_file() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("outputs");
        let plan = build_plan(&src);
        write_text(&dst.join("split-1/cats/c0.png"), "keep");

        let spec_write_options = SpecWriteOptions {
            rule_conflict_file: EnumSplitFileConflictStrategy::Skip,
            if_clear_output: false,
            ..SpecWriteOptions::default()
        };
        let mut builder_report = ReportSplitBuilder::default();
        FsPlanWriter::new(&dst, spec_write_options)
            .write_plan(&plan, &mut builder_report)
            .expect("write plan");
        let report = builder_report.build();

        assert_eq!(report.cnt_files_skipped, 1);
        assert_eq!(report.cnt_files_copied, 3);
        assert_eq!(
            std::fs::read_to_string(dst.join("split-1/cats/c0.png")).expect("read"),
            "keep"
        );
    }

    #[test]
    fn fs_writer_conflict_error_is_recorded() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("outputs");
        let plan = build_plan(&src);
        write_text(&dst.join("split-2/cats/c2.png"), "keep");

        let spec_write_options = SpecWriteOptions {
            rule_conflict_file: EnumSplitFileConflictStrategy::Error,
            if_clear_output: false,
            ..SpecWriteOptions::default()
        };
        let mut builder_report = ReportSplitBuilder::default();
        FsPlanWriter::new(&dst, spec_write_options)
            .write_plan(&plan, &mut builder_report)
            .expect("write plan");
        let report = builder_report.build();

        assert_eq!(report.error_count(), 1);
        assert_eq!(report.errors[0].path, dst.join("split-2/cats/c2.png"));
        assert_eq!(report.cnt_files_copied, 3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn fs_writer_preserves_linux_metadata() {
        use filetime::{FileTime, set_file_times};
        use std::os::unix::fs::PermissionsExt;

        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("outputs");
        let plan = build_plan(&src);
        let path_file_src = src.join("dogs/d0.png");

        std::fs::set_permissions(&path_file_src, std::fs::Permissions::from_mode(0o640))
            .expect("set permissions");
        set_file_times(
            &path_file_src,
            FileTime::from_unix_time(1_700_000_010, 0),
            FileTime::from_unix_time(1_700_000_020, 0),
        )
        .expect("set times");
        let c_xattr_name = "user.axiomkit_split_test";
        let b_if_has_xattr = xattr::set(&path_file_src, c_xattr_name, b"meta_value").is_ok();

        let mut builder_report = ReportSplitBuilder::default();
        FsPlanWriter::new(&dst, SpecWriteOptions::default())
            .write_plan(&plan, &mut builder_report)
            .expect("write plan");
        assert_eq!(builder_report.build().error_count(), 0);

        let path_file_dst = dst.join("split-1/dogs/d0.png");
        let stat_src = std::fs::metadata(&path_file_src).expect("src metadata");
        let stat_dst = std::fs::metadata(&path_file_dst).expect("dst metadata");
        assert_eq!(
            stat_src.permissions().mode() & 0o777,
            stat_dst.permissions().mode() & 0o777
        );
        assert_eq!(
            FileTime::from_last_modification_time(&stat_src),
            FileTime::from_last_modification_time(&stat_dst)
        );

        if b_if_has_xattr {
            let raw_value_dst = xattr::get(&path_file_dst, c_xattr_name)
                .expect("get dst xattr")
                .expect("xattr exists");
            assert_eq!(raw_value_dst, b"meta_value");
        }
    }

    #[cfg(unix)]
    #[test]
    fn fs_writer_rejects_symlink_destination_root() {
        use std::os::unix::fs::symlink;

        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        let dst_real = tmp.path().join("dst_real");
        let dst_link = tmp.path().join("dst_link");
        let plan = build_plan(&src);
        std::fs::create_dir_all(&dst_real).expect("create dst real");
        symlink(&dst_real, &dst_link).expect("create dst symlink");

        let mut builder_report = ReportSplitBuilder::default();
        let err = FsPlanWriter::new(&dst_link, SpecWriteOptions::default())
            .write_plan(&plan, &mut builder_report)
            .expect_err("symlink destination root must fail");
        assert!(matches!(err, SplitTreeError::DestinationInitFailed { .. }));
    }
}
