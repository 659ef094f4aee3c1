use std::collections::BTreeMap;

use axiomkit_io_split::{
    EnumSplitFileConflictStrategy, EnumSplitFolderMode, EnumSplitRoundingMode, ReportSplit,
    SpecScanWarning, SpecSplitConfig, SpecSplitError, SpecSplitOptions, SpecWriteOptions,
    SplitTreeError, plan_split_tree, split_tree,
};
use pyo3::exceptions::{PyNotADirectoryError, PyOSError, PyValueError};
use pyo3::prelude::*;

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "axiomkit.io.split.split_tree.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "SpecSplitError")]
#[derive(Debug, Clone)]
struct PySpecSplitError {
    #[pyo3(get)]
    path: String,
    #[pyo3(get)]
    exception: String,
}

impl From<SpecSplitError> for PySpecSplitError {
    fn from(spec_error: SpecSplitError) -> Self {
        Self {
            path: spec_error.path.to_string_lossy().to_string(),
            exception: spec_error.exception,
        }
    }
}

#[pyclass(name = "SpecScanWarning")]
#[derive(Debug, Clone)]
struct PySpecScanWarning {
    #[pyo3(get)]
    path: String,
    #[pyo3(get)]
    kind: String,
    #[pyo3(get)]
    message: String,
}

impl From<SpecScanWarning> for PySpecScanWarning {
    fn from(spec_warning: SpecScanWarning) -> Self {
        Self {
            path: spec_warning.path.to_string_lossy().to_string(),
            kind: spec_warning.kind.as_str().to_string(),
            message: spec_warning.message,
        }
    }
}

#[pyclass(name = "ReportSplit")]
#[derive(Debug, Clone)]
struct PyReportSplit {
    #[pyo3(get)]
    cnt_folders_scanned: u64,
    #[pyo3(get)]
    cnt_folders_planned: u64,
    #[pyo3(get)]
    cnt_folders_skipped: u64,
    #[pyo3(get)]
    cnt_files_planned: u64,
    #[pyo3(get)]
    cnt_files_copied: u64,
    #[pyo3(get)]
    cnt_files_skipped: u64,
    #[pyo3(get)]
    warnings: Vec<PySpecScanWarning>,
    #[pyo3(get)]
    errors: Vec<PySpecSplitError>,
    report: ReportSplit,
}

impl From<ReportSplit> for PyReportSplit {
    fn from(report: ReportSplit) -> Self {
        Self {
            cnt_folders_scanned: report.cnt_folders_scanned,
            cnt_folders_planned: report.cnt_folders_planned,
            cnt_folders_skipped: report.cnt_folders_skipped,
            cnt_files_planned: report.cnt_files_planned,
            cnt_files_copied: report.cnt_files_copied,
            cnt_files_skipped: report.cnt_files_skipped,
            warnings: report
                .warnings
                .iter()
                .cloned()
                .map(PySpecScanWarning::from)
                .collect(),
            errors: report
                .errors
                .iter()
                .cloned()
                .map(PySpecSplitError::from)
                .collect(),
            report,
        }
    }
}

#[pymethods]
impl PyReportSplit {
    #[getter]
    fn error_count(&self) -> usize {
        self.report.error_count()
    }

    #[getter]
    fn warning_count(&self) -> usize {
        self.report.warning_count()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.report.to_dict()
    }

    #[pyo3(signature = (prefix = "[SPLIT]"))]
    fn format(&self, prefix: &str) -> String {
        self.report.format(prefix)
    }

    fn __str__(&self) -> String {
        self.report.to_string()
    }
}

fn parse_rule_folder(value: &str) -> PyResult<EnumSplitFolderMode> {
    value.parse().map_err(map_split_tree_error)
}

fn parse_rule_rounding(value: &str) -> PyResult<EnumSplitRoundingMode> {
    value.parse().map_err(map_split_tree_error)
}

fn parse_rule_conflict_file(value: &str) -> PyResult<EnumSplitFileConflictStrategy> {
    value.parse().map_err(map_split_tree_error)
}

fn map_split_tree_error(exception: SplitTreeError) -> PyErr {
    match exception {
        SplitTreeError::SourceNotDirectory(_) => {
            PyNotADirectoryError::new_err(exception.to_string())
        }
        SplitTreeError::DestinationInitFailed { .. } => PyOSError::new_err(exception.to_string()),
        SplitTreeError::InvalidConfig(_)
        | SplitTreeError::InvalidExtension(_)
        | SplitTreeError::SourceDestinationOverlap { .. } => {
            PyValueError::new_err(exception.to_string())
        }
    }
}

fn build_split_options(
    percentages: Vec<f64>,
    extensions: Option<Vec<String>>,
    rule_folder: &str,
    rule_rounding: &str,
    if_shuffle: bool,
    seed: Option<u64>,
    num_workers_max: Option<usize>,
) -> PyResult<SpecSplitOptions> {
    let spec_split_config =
        SpecSplitConfig::from_leading_percentages(&percentages).map_err(map_split_tree_error)?;
    let spec_split_options = SpecSplitOptions {
        extensions,
        rule_folder: parse_rule_folder(rule_folder)?,
        rule_rounding: parse_rule_rounding(rule_rounding)?,
        if_shuffle,
        seed,
        num_workers_max,
        ..SpecSplitOptions::new(spec_split_config)
    };
    spec_split_options
        .validate()
        .map_err(map_split_tree_error)?;
    Ok(spec_split_options)
}

/// Returns `(plan_json, report)`.
#[pyfunction(name = "plan_split_tree")]
#[pyo3(signature = (
    dir_source,
    percentages,
    extensions = None,
    rule_folder = "leaf_only",
    rule_rounding = "standard",
    if_shuffle = false,
    seed = None,
    num_workers_max = None
))]
#[allow(clippy::too_many_arguments)]
fn plan_split_tree_py(
    py: Python<'_>,
    dir_source: String,
    percentages: Vec<f64>,
    extensions: Option<Vec<String>>,
    rule_folder: &str,
    rule_rounding: &str,
    if_shuffle: bool,
    seed: Option<u64>,
    num_workers_max: Option<usize>,
) -> PyResult<(String, PyReportSplit)> {
    let spec_split_options = build_split_options(
        percentages,
        extensions,
        rule_folder,
        rule_rounding,
        if_shuffle,
        seed,
        num_workers_max,
    )?;

    let res_plan = py.allow_threads(|| plan_split_tree(dir_source, &spec_split_options));
    let (plan, report) = res_plan.map_err(map_split_tree_error)?;
    let plan_json = plan
        .to_json()
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok((plan_json, PyReportSplit::from(report)))
}

#[pyfunction(name = "split_tree")]
#[pyo3(signature = (
    dir_source,
    dir_destination,
    percentages,
    extensions = None,
    rule_folder = "leaf_only",
    rule_rounding = "standard",
    if_shuffle = false,
    seed = None,
    rule_conflict_file = "overwrite",
    num_workers_max = None,
    if_clear_output = true,
    if_dry_run = false
))]
#[allow(clippy::too_many_arguments)]
fn split_tree_py(
    py: Python<'_>,
    dir_source: String,
    dir_destination: String,
    percentages: Vec<f64>,
    extensions: Option<Vec<String>>,
    rule_folder: &str,
    rule_rounding: &str,
    if_shuffle: bool,
    seed: Option<u64>,
    rule_conflict_file: &str,
    num_workers_max: Option<usize>,
    if_clear_output: bool,
    if_dry_run: bool,
) -> PyResult<PyReportSplit> {
    let spec_split_options = build_split_options(
        percentages,
        extensions,
        rule_folder,
        rule_rounding,
        if_shuffle,
        seed,
        num_workers_max,
    )?;
    let spec_write_options = SpecWriteOptions {
        rule_conflict_file: parse_rule_conflict_file(rule_conflict_file)?,
        num_workers_max,
        if_clear_output,
        if_dry_run,
    };

    let report = py.allow_threads(|| {
        split_tree(
            dir_source,
            dir_destination,
            spec_split_options,
            spec_write_options,
        )
    });
    let report = report.map_err(map_split_tree_error)?;
    Ok(PyReportSplit::from(report))
}

#[pymodule]
fn _axiomkit_io_split_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySpecSplitError>()?;
    module.add_class::<PySpecScanWarning>()?;
    module.add_class::<PyReportSplit>()?;
    module.add_function(wrap_pyfunction!(plan_split_tree_py, module)?)?;
    module.add_function(wrap_pyfunction!(split_tree_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
