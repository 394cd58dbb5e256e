use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{errors::CovError, validator::result::ValidationResult};

pub mod command_adapter;
pub mod cover_runner;
pub mod summary;

pub trait Runner {
    fn run(&mut self) -> Result<RunSummary, CovError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub source_file_path: PathBuf,
    pub test_file_path: PathBuf,
    /// Copy of the test file that receives the new tests. The test file
    /// itself is edited when unset.
    pub test_file_output_path: Option<PathBuf>,
    pub project_root: PathBuf,
    pub code_coverage_report_path: PathBuf,
    pub test_command: String,
    pub test_command_dir: PathBuf,
    pub included_files: Vec<PathBuf>,
    pub coverage_type: String,
    pub report_filepath: PathBuf,
    pub desired_coverage: f64,
    pub max_iterations: usize,
    pub additional_instructions: String,
    pub use_report_coverage_feature_flag: bool,
    pub diff_coverage: bool,
    pub branch: String,
    pub diff_cover_command: String,
    pub run_tests_multiple_times: usize,
    pub max_run_time: Duration,
    pub strict_coverage: bool,
    pub run_each_test_separately: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub iterations: usize,
    /// Fraction in `0..=1`.
    pub final_coverage: f64,
    pub target_reached: bool,
    pub results: Vec<ValidationResult>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl RunSummary {
    /// Exit code 2 signals an unmet target under `--strict-coverage`.
    pub fn exit_code(&self, strict_coverage: bool) -> i32 {
        if strict_coverage && !self.target_reached {
            2
        } else {
            0
        }
    }
}
