//! Split orchestration: scan, randomize, allocate, assign, write.

use std::path::Path;

use rayon::prelude::*;

use crate::allocate::{allocate_counts, derive_ideal_counts};
use crate::assign::assign_to_splits;
use crate::filter::SpecExtensionFilter;
use crate::plan::{SpecFolderAllocation, SplitPlan};
use crate::random::SpecRandomizer;
use crate::report::{ReportSplit, ReportSplitBuilder};
use crate::scan::{EnumScanItem, FolderScanner, SpecFolderRecord};
use crate::spec::{
    SpecSplitConfig, SpecSplitOptions, SpecWriteOptions, SplitAllocationError, SplitTreeError,
};
use crate::util::{build_thread_pool, calculate_worker_limit};
use crate::write::{FsPlanWriter, SplitPlanWriter};

#[derive(Debug)]
struct SpecFolderContext<'a> {
    spec_split_config: &'a SpecSplitConfig,
    spec_options: &'a SpecSplitOptions,
    spec_randomizer: SpecRandomizer,
}

/// Build the split plan for `dir_source` without writing anything.
///
/// Configuration problems are returned as [`SplitTreeError`] before any
/// folder is processed. Scan warnings and per-folder allocation failures are
/// collected in the returned [`ReportSplit`]; a failing folder is left out of
/// the plan entirely.
pub fn plan_split_tree<P: AsRef<Path>>(
    dir_source: P,
    spec_split_options: &SpecSplitOptions,
) -> Result<(SplitPlan, ReportSplit), SplitTreeError> {
    let (plan, builder_report) = build_plan(dir_source.as_ref(), spec_split_options)?;
    Ok((plan, builder_report.build()))
}

/// Plan `dir_source` and copy the result under `dir_destination`.
///
/// `dir_destination` is the output root: it receives `split-1`, `split-2`,
/// ... and the `split_plan.json` manifest.
pub fn split_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_split_options: SpecSplitOptions,
    spec_write_options: SpecWriteOptions,
) -> Result<ReportSplit, SplitTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let fs_writer = FsPlanWriter::new(dir_destination, spec_write_options);
    let (_, report) = split_tree_with_writer(dir_source, &spec_split_options, &fs_writer)?;
    Ok(report)
}

/// Plan `dir_source` and hand the plan to `writer`.
pub fn split_tree_with_writer<P, W>(
    dir_source: P,
    spec_split_options: &SpecSplitOptions,
    writer: &W,
) -> Result<(SplitPlan, ReportSplit), SplitTreeError>
where
    P: AsRef<Path>,
    W: SplitPlanWriter + ?Sized,
{
    let (plan, mut builder_report) = build_plan(dir_source.as_ref(), spec_split_options)?;
    writer.write_plan(&plan, &mut builder_report)?;
    let report = builder_report.build();
    tracing::info!("{}", report);
    Ok((plan, report))
}

fn build_plan(
    path_dir_src: &Path,
    spec_split_options: &SpecSplitOptions,
) -> Result<(SplitPlan, ReportSplitBuilder), SplitTreeError> {
    spec_split_options.validate()?;
    let spec_ext_filter = SpecExtensionFilter::from_raw(spec_split_options.extensions.as_deref())?;
    if !path_dir_src.is_dir() {
        return Err(SplitTreeError::SourceNotDirectory(path_dir_src.to_path_buf()));
    }

    let spec_split_config = &spec_split_options.spec_split_config;
    let spec_randomizer =
        SpecRandomizer::new(spec_split_options.if_shuffle, spec_split_options.seed);
    tracing::info!(
        "Planning {} into {} split(s) {:?} (folders={}, rounding={}, seed={:?})",
        path_dir_src.display(),
        spec_split_config.n_splits(),
        spec_split_config.percentages(),
        spec_split_options.rule_folder,
        spec_split_options.rule_rounding,
        spec_randomizer.seed()
    );

    let mut builder_report = ReportSplitBuilder::default();
    let l_suffixes = spec_ext_filter.suffixes().to_vec();
    let mut scanner =
        FolderScanner::new(path_dir_src, spec_split_options.rule_folder, spec_ext_filter);
    let mut l_records = Vec::new();
    for item in scanner.by_ref() {
        match item {
            EnumScanItem::Folder(spec_record) => l_records.push(spec_record),
            EnumScanItem::Warning(spec_warning) => builder_report.add_warning(spec_warning),
        }
    }
    builder_report.cnt_folders_scanned = scanner.cnt_dirs_visited();

    let spec_ctx = SpecFolderContext {
        spec_split_config,
        spec_options: spec_split_options,
        spec_randomizer,
    };
    let n_workers = calculate_worker_limit(spec_split_options.num_workers_max);
    let l_results = match build_thread_pool(n_workers) {
        Some(thread_pool) => thread_pool.install(|| {
            l_records
                .into_par_iter()
                .map(|spec_record| plan_folder(spec_record, &spec_ctx))
                .collect::<Vec<_>>()
        }),
        None => l_records
            .into_iter()
            .map(|spec_record| plan_folder(spec_record, &spec_ctx))
            .collect::<Vec<_>>(),
    };

    let mut l_folders = Vec::with_capacity(l_results.len());
    for (spec_record, res_plan) in l_results {
        match res_plan {
            Ok(spec_folder) => {
                tracing::info!(
                    "{}: {} file(s) -> {:?}",
                    spec_record.path_dir_src.display(),
                    spec_folder.n_files,
                    spec_folder.counts
                );
                builder_report.add_planned_folder(spec_folder.n_files);
                l_folders.push(spec_folder);
            }
            Err(e) => {
                builder_report.add_error(spec_record.path_dir_src, e.to_string());
                builder_report.add_skipped_folder();
            }
        }
    }

    let plan = SplitPlan {
        path_dir_src: path_dir_src.to_path_buf(),
        percentages: spec_split_config.percentages().to_vec(),
        rule_rounding: spec_split_options.rule_rounding,
        rule_folder: spec_split_options.rule_folder,
        extensions: l_suffixes,
        seed: spec_ctx.spec_randomizer.seed(),
        l_folders,
    };
    Ok((plan, builder_report))
}

/// Randomize, allocate and assign one folder. The record comes back without
/// its file list so failures can still be attributed to a path.
fn plan_folder(
    mut spec_record: SpecFolderRecord,
    spec_ctx: &SpecFolderContext<'_>,
) -> (SpecFolderRecord, Result<SpecFolderAllocation, SplitAllocationError>) {
    let l_files = std::mem::take(&mut spec_record.l_files);
    let n_files = l_files.len();
    let l_files = spec_ctx
        .spec_randomizer
        .randomize(&spec_record.path_dir_rel, l_files);

    let res_plan = allocate_counts(
        n_files,
        spec_ctx.spec_split_config,
        spec_ctx.spec_options.rule_rounding,
    )
    .and_then(|counts| {
        tracing::debug!(
            "{}: ideal {:?} -> {:?}",
            spec_record.path_dir_rel.display(),
            derive_ideal_counts(n_files, spec_ctx.spec_split_config),
            counts
        );
        let l_splits = assign_to_splits(l_files, &counts)?;
        Ok(SpecFolderAllocation {
            path_dir_rel: spec_record.path_dir_rel.clone(),
            n_files,
            counts,
            l_splits,
        })
    });
    (spec_record, res_plan)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    use super::{plan_split_tree, split_tree, split_tree_with_writer};
    use crate::plan::SplitPlan;
    use crate::report::ReportSplitBuilder;
    use crate::spec::{
        EnumSplitFolderMode, EnumSplitRoundingMode, SpecSplitConfig, SpecSplitOptions,
        SpecWriteOptions, SplitTreeError,
    };
    use crate::test_util::{TestDir, write_text};
    use crate::write::SplitPlanWriter;

    fn build_dataset(tmp: &TestDir) -> PathBuf {
        let src = tmp.path().join("data");
        for i in 0..10 {
            write_text(&src.join(format!("cats/c{i:02}.png")), "c");
        }
        for i in 0..5 {
            write_text(&src.join(format!("dogs/d{i:02}.jpg")), "d");
        }
        write_text(&src.join("dogs/notes.txt"), "n");
        write_text(&src.join("readme.txt"), "r");
        src
    }

    fn options_70_15_15() -> SpecSplitOptions {
        SpecSplitOptions::new(
            SpecSplitConfig::from_leading_percentages(&[70.0, 15.0]).expect("config"),
        )
    }

    #[test]
    fn plan_split_tree_allocates_each_leaf_folder() {
        let tmp = TestDir::new();
        let src = build_dataset(&tmp);
        let spec_split_options = SpecSplitOptions {
            extensions: Some(vec!["png".to_string(), ".JPG".to_string()]),
            ..options_70_15_15()
        };

        let (plan, report) = plan_split_tree(&src, &spec_split_options).expect("plan");
        assert_eq!(report.error_count(), 0);
        assert_eq!(report.cnt_folders_planned, 2);
        assert_eq!(report.cnt_files_planned, 15);
        assert_eq!(report.cnt_folders_scanned, 3);

        let spec_cats = plan.folder(Path::new("cats")).expect("cats planned");
        assert_eq!(spec_cats.counts, vec![7, 2, 1]);
        assert_eq!(
            plan.files_for(0, Path::new("cats")).expect("split-1").first(),
            Some(&"c00.png".to_string())
        );
        let spec_dogs = plan.folder(Path::new("dogs")).expect("dogs planned");
        assert_eq!(spec_dogs.n_files, 5);
        assert_eq!(spec_dogs.counts, vec![4, 1, 0]);
        assert!(plan.folder(Path::new("")).is_none());
        assert_eq!(plan.extensions, vec![".png".to_string(), ".jpg".to_string()]);
        assert_eq!(plan.seed, None);
    }

    #[test]
    fn plan_split_tree_proportional_rounding() {
        let tmp = TestDir::new();
        let src = build_dataset(&tmp);
        let spec_split_options = SpecSplitOptions {
            extensions: Some(vec![".jpg".to_string()]),
            rule_rounding: EnumSplitRoundingMode::Proportional,
            ..options_70_15_15()
        };

        let (plan, report) = plan_split_tree(&src, &spec_split_options).expect("plan");
        assert_eq!(
            plan.folder(Path::new("dogs")).expect("dogs").counts,
            vec![3, 1, 1]
        );
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.cnt_folders_skipped, 1);
    }

    #[test]
    fn plan_split_tree_all_folders_includes_root() {
        let tmp = TestDir::new();
        let src = build_dataset(&tmp);
        let spec_split_options = SpecSplitOptions {
            rule_folder: EnumSplitFolderMode::AllFolders,
            ..options_70_15_15()
        };

        let (plan, _) = plan_split_tree(&src, &spec_split_options).expect("plan");
        let l_rel: Vec<&Path> = plan
            .l_folders
            .iter()
            .map(|f| f.path_dir_rel.as_path())
            .collect();
        assert_eq!(l_rel, vec![Path::new(""), Path::new("cats"), Path::new("dogs")]);
        assert_eq!(plan.folder(Path::new("")).expect("root").counts, vec![1, 0, 0]);
    }

    #[test]
    fn plan_split_tree_seeded_shuffle_is_reproducible() {
        let tmp = TestDir::new();
        let src = build_dataset(&tmp);
        let spec_split_options = SpecSplitOptions {
            if_shuffle: true,
            seed: Some(42),
            num_workers_max: Some(4),
            ..options_70_15_15()
        };

        let (plan_a, _) = plan_split_tree(&src, &spec_split_options).expect("plan a");
        let (plan_b, _) = plan_split_tree(&src, &spec_split_options).expect("plan b");
        assert_eq!(plan_a, plan_b);
        assert_eq!(plan_a.seed, Some(42));

        let mut l_cats = plan_a
            .reconstruct_folder(Path::new("cats"))
            .expect("cats planned");
        l_cats.sort();
        let l_expected: Vec<String> = (0..10).map(|i| format!("c{i:02}.png")).collect();
        assert_eq!(l_cats, l_expected);
    }

    #[test]
    fn plan_split_tree_unseeded_shuffle_reports_replayable_seed() {
        let tmp = TestDir::new();
        let src = build_dataset(&tmp);
        let spec_split_options = SpecSplitOptions {
            if_shuffle: true,
            ..options_70_15_15()
        };

        let (plan_a, _) = plan_split_tree(&src, &spec_split_options).expect("plan a");
        let seed = plan_a.seed.expect("generated seed");

        let spec_replay_options = SpecSplitOptions {
            if_shuffle: true,
            seed: Some(seed),
            ..options_70_15_15()
        };
        let (plan_b, _) = plan_split_tree(&src, &spec_replay_options).expect("plan b");
        assert_eq!(plan_a, plan_b);
    }

    #[test]
    fn plan_split_tree_rejects_configuration_errors() {
        let tmp = TestDir::new();
        let src = build_dataset(&tmp);

        let spec_seed_only = SpecSplitOptions {
            seed: Some(1),
            ..options_70_15_15()
        };
        assert!(matches!(
            plan_split_tree(&src, &spec_seed_only),
            Err(SplitTreeError::InvalidConfig(_))
        ));

        let spec_bad_ext = SpecSplitOptions {
            extensions: Some(vec!["a/b".to_string()]),
            ..options_70_15_15()
        };
        assert!(matches!(
            plan_split_tree(&src, &spec_bad_ext),
            Err(SplitTreeError::InvalidExtension(_))
        ));

        assert!(matches!(
            plan_split_tree(src.join("missing"), &options_70_15_15()),
            Err(SplitTreeError::SourceNotDirectory(_))
        ));
    }

    #[test]
    fn split_tree_writes_every_planned_file_once() {
        let tmp = TestDir::new();
        let src = build_dataset(&tmp);
        let dst = tmp.path().join("outputs");
        let spec_split_options = SpecSplitOptions {
            extensions: Some(vec![".png".to_string(), ".jpg".to_string()]),
            if_shuffle: true,
            seed: Some(7),
            ..options_70_15_15()
        };

        let report = split_tree(&src, &dst, spec_split_options, SpecWriteOptions::default())
            .expect("split tree");
        assert_eq!(report.error_count(), 0);
        assert_eq!(report.cnt_files_copied, 15);

        let mut l_cats = Vec::new();
        for name_split in ["split-1", "split-2", "split-3"] {
            let path_dir = dst.join(name_split).join("cats");
            for entry in std::fs::read_dir(&path_dir).expect("read split dir") {
                l_cats.push(entry.expect("entry").file_name().into_string().expect("utf8"));
            }
        }
        l_cats.sort();
        let l_expected: Vec<String> = (0..10).map(|i| format!("c{i:02}.png")).collect();
        assert_eq!(l_cats, l_expected);
        assert_eq!(std::fs::read_dir(dst.join("split-1/cats")).expect("read").count(), 7);
        assert!(dst.join("split_plan.json").is_file());
    }

    struct RecordingWriter {
        l_plans: RefCell<Vec<SplitPlan>>,
    }

    impl SplitPlanWriter for RecordingWriter {
        fn write_plan(
            &self,
            plan: &SplitPlan,
            _builder_report: &mut ReportSplitBuilder,
        ) -> Result<(), SplitTreeError> {
            self.l_plans.borrow_mut().push(plan.clone());
            Ok(())
        }
    }

    #[test]
    fn split_tree_with_writer_hands_plan_to_writer() {
        let tmp = TestDir::new();
        let src = build_dataset(&tmp);
        let writer = RecordingWriter {
            l_plans: RefCell::new(Vec::new()),
        };

        let (plan, report) =
            split_tree_with_writer(&src, &options_70_15_15(), &writer).expect("split tree");
        assert_eq!(report.cnt_files_copied, 0);
        assert_eq!(writer.l_plans.borrow().as_slice(), &[plan]);
    }
}
