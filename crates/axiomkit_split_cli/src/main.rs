use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context as _, bail};
use axiomkit_io_split::{
    EnumSplitFileConflictStrategy, EnumSplitFolderMode, EnumSplitRoundingMode, FsPlanWriter,
    ReportSplit, SpecSplitConfig, SpecSplitOptions, SpecWriteOptions, is_overlap,
    split_tree_with_writer,
};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

const C_OUTPUT_DIR_NAME: &str = "outputs";
const C_LOG_FILE_NAME: &str = "log.txt";

/// Split every folder of a dataset tree into percentage-based splits.
#[derive(Debug, Parser)]
#[command(name = "axiomkit-split", version)]
struct Args {
    /// Root folder of the dataset tree.
    input: PathBuf,

    /// Output location; splits are written to `<output>/outputs` (default: `./outputs`).
    output: Option<PathBuf>,

    /// Leading split percentages, comma separated or repeated; the last split
    /// receives the remainder.
    #[arg(short = 'p', long = "percent", required = true, value_delimiter = ',')]
    percentages: Vec<f64>,

    /// Accepted file extensions, comma separated (default: all files).
    #[arg(short = 'e', long = "ext", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Folders to split: `leaf_only` or `all_folders`.
    #[arg(long, default_value = "leaf_only")]
    folder_mode: EnumSplitFolderMode,

    /// Shuffle files inside each folder before splitting.
    #[arg(long)]
    shuffle: bool,

    /// Shuffle seed (requires `--shuffle`).
    #[arg(long)]
    seed: Option<u64>,

    /// Rounding: `standard`, `floor`, `ceil` or `proportional`.
    #[arg(long, default_value = "standard")]
    rounding: EnumSplitRoundingMode,

    /// Maximum worker threads.
    #[arg(long)]
    workers: Option<usize>,

    /// Plan and report without writing anything.
    #[arg(long)]
    dry_run: bool,

    /// Keep existing `split-*` directories in the output root.
    #[arg(long)]
    no_clear: bool,

    /// Existing destination file policy: `skip`, `overwrite` or `error`.
    #[arg(long, default_value = "overwrite")]
    file_conflict: EnumSplitFileConflictStrategy,

    /// Log filter (overrides `RUST_LOG`; default `info`).
    #[arg(long)]
    log_level: Option<String>,
}

fn resolve_output_root(output: Option<&Path>) -> PathBuf {
    match output {
        Some(path) => path.join(C_OUTPUT_DIR_NAME),
        None => PathBuf::from(C_OUTPUT_DIR_NAME),
    }
}

fn build_env_filter(log_level: Option<&str>) -> anyhow::Result<EnvFilter> {
    match log_level {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("invalid log level `{level}`"))
        }
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
    }
}

fn init_logging(log_level: Option<&str>, path_file_log: Option<&Path>) -> anyhow::Result<()> {
    let env_filter = build_env_filter(log_level)?;
    let layer_file = match path_file_log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .with(layer_file)
        .try_init()
        .context("failed to install logger")
}

fn build_split_options(args: &Args) -> anyhow::Result<SpecSplitOptions> {
    let spec_split_config = SpecSplitConfig::from_leading_percentages(&args.percentages)
        .context("invalid split percentages")?;
    let extensions = (!args.extensions.is_empty()).then(|| args.extensions.clone());
    let spec_split_options = SpecSplitOptions {
        extensions,
        rule_folder: args.folder_mode,
        rule_rounding: args.rounding,
        if_shuffle: args.shuffle,
        seed: args.seed,
        num_workers_max: args.workers,
        ..SpecSplitOptions::new(spec_split_config)
    };
    spec_split_options.validate()?;
    Ok(spec_split_options)
}

fn run(args: &Args) -> anyhow::Result<ReportSplit> {
    let spec_split_options = build_split_options(args)?;
    if !args.input.is_dir() {
        bail!("input is not a directory: {}", args.input.display());
    }

    let path_dir_out = resolve_output_root(args.output.as_deref());
    if is_overlap(&args.input, &path_dir_out) {
        bail!(
            "output root {} overlaps input tree {}",
            path_dir_out.display(),
            args.input.display()
        );
    }

    let path_file_log = if args.dry_run {
        None
    } else {
        fs::create_dir_all(&path_dir_out)
            .with_context(|| format!("failed to create {}", path_dir_out.display()))?;
        Some(path_dir_out.join(C_LOG_FILE_NAME))
    };
    init_logging(args.log_level.as_deref(), path_file_log.as_deref())?;

    let spec_split_config = &spec_split_options.spec_split_config;
    tracing::info!("Input path: {}", args.input.display());
    tracing::info!("Output path: {}", path_dir_out.display());
    tracing::info!("Splits: {:?}", spec_split_config.percentages());
    tracing::info!(
        "File extensions: {}",
        if args.extensions.is_empty() {
            "all files".to_string()
        } else {
            args.extensions.join(", ")
        }
    );
    tracing::info!("Folder mode: {}", args.folder_mode);
    tracing::info!("Rounding: {}", args.rounding);

    let spec_write_options = SpecWriteOptions {
        rule_conflict_file: args.file_conflict,
        num_workers_max: args.workers,
        if_clear_output: !args.no_clear,
        if_dry_run: args.dry_run,
    };
    let fs_writer = FsPlanWriter::new(&path_dir_out, spec_write_options);
    let (plan, report) = split_tree_with_writer(&args.input, &spec_split_options, &fs_writer)
        .with_context(|| format!("split {}", args.input.display()))?;

    if let Some(seed) = plan.seed {
        tracing::info!("Shuffle seed: {seed}");
    }
    for (name_split, n_files) in plan.split_names().iter().zip(plan.cnt_files_per_split()) {
        tracing::info!("{name_split}: {n_files} file(s)");
    }
    for spec_error in &report.errors {
        tracing::error!("{}: {}", spec_error.path.display(), spec_error.exception);
    }
    Ok(report)
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(v) => v,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&args) {
        Ok(report) if report.error_count() > 0 => {
            println!("{report}");
            ExitCode::from(2)
        }
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}
