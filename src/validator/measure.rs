use std::{
    path::{self, Path, PathBuf},
    time::Duration,
};

use tracing::{debug, error};

use crate::{
    coverage::{CoverageReport, CoverageTool, process_coverage},
    errors::CovError,
    runtime::Runtime,
};

/// Which part of the coverage report decides whether a candidate helped.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageMode {
    /// Only the units matching the source file.
    Target,
    /// Every unit in the report, compared file by file.
    Global,
    /// Lines changed against `comparison_branch`, via a generated diff report.
    Diff {
        comparison_branch: String,
        diff_report_path: PathBuf,
    },
}

impl CoverageMode {
    pub fn is_global(&self) -> bool {
        matches!(self, CoverageMode::Global)
    }
}

pub struct Measurement<'a> {
    pub coverage_type: &'a str,
    pub report_path: &'a Path,
    pub src_file_path: &'a str,
    pub mode: &'a CoverageMode,
    pub diff_cover_command: &'a str,
    pub cwd: &'a Path,
    pub max_run_time: Duration,
}

impl Measurement<'_> {
    /// diff-cover runs in `cwd`, so both reports are passed as absolute paths
    /// resolved against this process.
    fn diff_cover_command_line(
        &self,
        comparison_branch: &str,
        diff_report_path: &Path,
    ) -> Result<String, CovError> {
        Ok(format!(
            "{} --json-report {} --compare-branch={} {}",
            self.diff_cover_command,
            path::absolute(diff_report_path)?.display(),
            comparison_branch,
            path::absolute(self.report_path)?.display()
        ))
    }

    pub fn generate_diff_report<RT: Runtime>(
        &self,
        runtime: &RT,
        comparison_branch: &str,
        diff_report_path: &Path,
    ) -> Result<(), CovError> {
        let command = self.diff_cover_command_line(comparison_branch, diff_report_path)?;
        debug!(command = %command, runtime = %runtime.name(), "generating diff coverage report");
        let output = runtime.run_command(&command, self.cwd, self.max_run_time)?;
        if output.success() {
            Ok(())
        } else {
            Err(CovError::RuntimeError(format!(
                "exit code {}: {}",
                output.exit_code,
                output.stderr.trim()
            )))
        }
    }

    /// Parses the report written by the run that started at
    /// `time_of_test_command`.
    pub fn measure<RT: Runtime>(
        &self,
        runtime: &RT,
        time_of_test_command: u128,
    ) -> Result<CoverageReport, CovError> {
        match self.mode {
            CoverageMode::Target => process_coverage(
                self.coverage_type,
                time_of_test_command,
                self.report_path,
                self.src_file_path,
                false,
                None,
            ),
            CoverageMode::Global => process_coverage(
                self.coverage_type,
                time_of_test_command,
                self.report_path,
                self.src_file_path,
                true,
                None,
            ),
            CoverageMode::Diff {
                comparison_branch,
                diff_report_path,
            } => {
                if let Err(e) = self.generate_diff_report(runtime, comparison_branch, diff_report_path) {
                    error!("Error running diff-cover: {}", e);
                    return Ok(CoverageReport::default());
                }
                process_coverage(
                    &CoverageTool::DiffCoverJson.to_string(),
                    time_of_test_command,
                    self.report_path,
                    self.src_file_path,
                    false,
                    Some(diff_report_path),
                )
            }
        }
    }
}
