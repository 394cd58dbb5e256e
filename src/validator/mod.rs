use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use tracing::{error, info, warn};

use crate::{
    agent::{
        AgentCompletion, CandidateTest, Completion, FailedTestRun, FailureRequest, SuiteRequest,
        number_lines,
    },
    coverage::{CoverageReport, as_percent},
    errors::CovError,
    parser::Language,
    runtime::{Runtime, ShellRuntime},
    utils::process::CaptureOutput,
};

pub mod insertion;
pub mod measure;
pub mod result;
pub mod test_file;

use insertion::{Insertion, splice};
use measure::{CoverageMode, Measurement};
use result::{Status, ValidationResult};
use test_file::TestFileGuard;

const MAX_ANALYSIS_ATTEMPTS: usize = 3;
const DIFF_REPORT_FILE_NAME: &str = "diff-cover-report.json";

pub const TEST_FAILED: &str = "Test failed";
pub const COVERAGE_NOT_INCREASED: &str = "Coverage did not increase. Maybe the test did run but did not increase coverage, or maybe the test execution was skipped due to some problem";

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub source_file_path: PathBuf,
    pub test_file_path: PathBuf,
    pub code_coverage_report_path: PathBuf,
    pub test_command: String,
    pub test_command_dir: PathBuf,
    pub coverage_type: String,
    /// Percentage, `0..=100`.
    pub desired_coverage: f64,
    pub use_report_coverage_feature_flag: bool,
    pub diff_coverage: bool,
    pub comparison_branch: String,
    pub diff_cover_command: String,
    pub num_attempts: usize,
    pub max_run_time: Duration,
}

impl ValidatorConfig {
    pub fn coverage_mode(&self) -> CoverageMode {
        if self.diff_coverage {
            let diff_report_path = self
                .test_file_path
                .parent()
                .map(|dir| dir.join(DIFF_REPORT_FILE_NAME))
                .unwrap_or_else(|| PathBuf::from(DIFF_REPORT_FILE_NAME));
            CoverageMode::Diff {
                comparison_branch: self.comparison_branch.clone(),
                diff_report_path,
            }
        } else if self.use_report_coverage_feature_flag {
            CoverageMode::Global
        } else {
            CoverageMode::Target
        }
    }
}

/// Where new tests and imports go in the test file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertionPoint {
    pub indentation: usize,
    /// 1-based line after which tests are inserted.
    pub test_line: usize,
    /// 1-based line after which imports are inserted.
    pub import_line: usize,
    pub testing_framework: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageSnapshot {
    pub failed_test_runs: Vec<FailedTestRun>,
    pub language: Language,
    pub testing_framework: String,
    pub coverage_report: String,
}

fn coverage_summary(report: &CoverageReport) -> String {
    format!(
        "Lines covered: {:?}\nLines missed: {:?}\nPercentage covered: {}%",
        report.covered_lines(),
        report.missed_lines(),
        as_percent(report.total_coverage)
    )
}

/// Splices candidate tests into the test file and keeps only those that pass
/// and raise coverage.
pub struct Validator<A: AgentCompletion, RT: Runtime = ShellRuntime> {
    config: ValidatorConfig,
    agent: A,
    runtime: RT,
    mode: CoverageMode,
    src_file_path: String,
    language: Language,
    insertion_point: InsertionPoint,
    current_coverage: f64,
    last_coverage_percentages: HashMap<String, f64>,
    code_coverage_report: String,
    failed_test_runs: Vec<FailedTestRun>,
    total_input_tokens: u64,
    total_output_tokens: u64,
}

impl<A: AgentCompletion, RT: Runtime> Validator<A, RT> {
    pub fn new(config: ValidatorConfig, agent: A, runtime: RT) -> Self {
        let mode = config.coverage_mode();
        let src_file_path = config.source_file_path.to_string_lossy().to_string();
        let language = Language::from_path(&config.source_file_path);
        Self {
            config,
            agent,
            runtime,
            mode,
            src_file_path,
            language,
            insertion_point: InsertionPoint::default(),
            current_coverage: 0.0,
            last_coverage_percentages: HashMap::new(),
            code_coverage_report: String::new(),
            failed_test_runs: vec![],
            total_input_tokens: 0,
            total_output_tokens: 0,
        }
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn insertion_point(&self) -> &InsertionPoint {
        &self.insertion_point
    }

    /// Fraction in `0..=1`.
    pub fn current_coverage(&self) -> f64 {
        self.current_coverage
    }

    /// Percentage in `0..=100`.
    pub fn desired_coverage(&self) -> f64 {
        self.config.desired_coverage
    }

    pub fn target_reached(&self) -> bool {
        self.current_coverage >= self.config.desired_coverage / 100.0
    }

    pub fn token_usage(&self) -> (u64, u64) {
        (self.total_input_tokens, self.total_output_tokens)
    }

    fn add_tokens<T>(&mut self, completion: &Completion<T>) {
        self.total_input_tokens += completion.input_tokens;
        self.total_output_tokens += completion.output_tokens;
    }

    fn measurement(&self) -> Measurement<'_> {
        Measurement {
            coverage_type: &self.config.coverage_type,
            report_path: &self.config.code_coverage_report_path,
            src_file_path: &self.src_file_path,
            mode: &self.mode,
            diff_cover_command: &self.config.diff_cover_command,
            cwd: &self.config.test_command_dir,
            max_run_time: self.config.max_run_time,
        }
    }

    fn run_test_command(&self) -> Result<CaptureOutput, CovError> {
        self.runtime.run_command(
            &self.config.test_command,
            &self.config.test_command_dir,
            self.config.max_run_time,
        )
    }

    fn suite_request(&self) -> Result<SuiteRequest, CovError> {
        let test_file = fs::read_to_string(&self.config.test_file_path)?;
        Ok(SuiteRequest {
            language: self.language.to_string(),
            test_file_name: self
                .config
                .test_file_path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
            test_file_numbered: number_lines(&test_file),
        })
    }

    fn analyze_with_retries<T, F>(&mut self, subject: &str, call: F) -> Result<T, CovError>
    where
        F: Fn(&A) -> Result<Completion<T>, CovError>,
    {
        for attempt in 1..=MAX_ANALYSIS_ATTEMPTS {
            match call(&self.agent) {
                Ok(completion) => {
                    self.add_tokens(&completion);
                    return Ok(completion.content);
                }
                Err(e) => warn!(attempt, error = %e, "failed to analyze the {}", subject),
            }
        }
        Err(CovError::AgentError(format!(
            "Failed to analyze the {} after {} attempts",
            subject, MAX_ANALYSIS_ATTEMPTS
        )))
    }

    /// Asks the agent for the indentation of test headers and the lines
    /// after which tests and imports are inserted.
    pub fn initial_test_suite_analysis(&mut self) -> Result<(), CovError> {
        let request = self.suite_request()?;
        let indentation = self.analyze_with_retries("test headers indentation", |agent| {
            agent.analyze_suite_indentation(&request)
        })?;
        let insert_lines = self.analyze_with_retries("test insertion lines", |agent| {
            agent.analyze_insert_lines(&request)
        })?;
        self.insertion_point = InsertionPoint {
            indentation: indentation.test_headers_indentation,
            test_line: insert_lines.relevant_line_number_to_insert_tests_after,
            import_line: insert_lines.relevant_line_number_to_insert_imports_after,
            testing_framework: insert_lines.testing_framework,
        };
        info!(
            indentation = self.insertion_point.indentation,
            test_line = self.insertion_point.test_line,
            import_line = self.insertion_point.import_line,
            framework = %self.insertion_point.testing_framework,
            "analyzed test suite"
        );
        Ok(())
    }

    /// Baseline measurement. The unmodified suite has to pass.
    pub fn run_coverage(&mut self) -> Result<(), CovError> {
        info!(command = %self.config.test_command, "running baseline test command");
        let output = self.run_test_command()?;
        if !output.success() {
            error!(exit_code = output.exit_code, "baseline test command failed");
            return Err(CovError::RuntimeError(format!(
                "Fatal: Error running test command. Are you sure the command is correct? \"{}\"\nExit code {}.\nStdout:\n{}\nStderr:\n{}",
                self.config.test_command, output.exit_code, output.stdout, output.stderr
            )));
        }
        let report = self.measurement().measure(&self.runtime, output.start_time_ms)?;
        self.current_coverage = report.total_coverage;
        if self.mode.is_global() {
            self.last_coverage_percentages = report.file_percentages();
        }
        self.code_coverage_report = coverage_summary(&report);
        Ok(())
    }

    /// State handed to the generator. Failed runs are reported once.
    pub fn get_coverage(&mut self) -> CoverageSnapshot {
        CoverageSnapshot {
            failed_test_runs: std::mem::take(&mut self.failed_test_runs),
            language: self.language,
            testing_framework: self.insertion_point.testing_framework.clone(),
            coverage_report: self.code_coverage_report.clone(),
        }
    }

    fn coverage_increased(&self, report: &CoverageReport) -> bool {
        if self.mode.is_global() {
            report.file_percentages().iter().any(|(unit, percentage)| {
                *percentage
                    > self
                        .last_coverage_percentages
                        .get(unit)
                        .copied()
                        .unwrap_or(0.0)
            })
        } else {
            report.total_coverage > self.current_coverage
        }
    }

    fn explain_failure(&mut self, insertion: &Insertion, output: &CaptureOutput) -> String {
        let request = FailureRequest {
            source_file: fs::read_to_string(&self.config.source_file_path).unwrap_or_default(),
            processed_test_file: insertion.processed_file.clone(),
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            test_code: insertion.test_code.clone(),
        };
        match self.agent.analyze_test_failure(&request) {
            Ok(completion) => {
                self.add_tokens(&completion);
                completion.content
            }
            Err(e) => {
                warn!(error = %e, "failed to analyze test failure");
                String::new()
            }
        }
    }

    fn reject(
        &mut self,
        guard: TestFileGuard,
        mut result: ValidationResult,
        error_message: String,
    ) -> Result<ValidationResult, CovError> {
        guard.restore()?;
        info!(reason = %result.reason, "rejected candidate test");
        self.failed_test_runs.push(FailedTestRun {
            code: result.test.clone(),
            error_message,
        });
        result.status = Status::Fail;
        Ok(result)
    }

    /// Runs one candidate against the suite. The test file keeps the
    /// candidate only when the returned status is `PASS`.
    pub fn validate(&mut self, candidate: &CandidateTest) -> Result<ValidationResult, CovError> {
        let guard = TestFileGuard::snapshot(&self.config.test_file_path)?;
        let insertion = splice(
            guard.original(),
            &candidate.test_code,
            &candidate.new_imports_code,
            self.insertion_point.indentation,
            self.insertion_point.test_line,
            self.insertion_point.import_line,
        );
        guard.write(&insertion.processed_file)?;

        let output = self.run_test_command()?;
        let mut result = ValidationResult {
            status: Status::Fail,
            reason: String::new(),
            exit_code: output.exit_code,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            test_code: insertion.test_code.clone(),
            imports: insertion.imports.join("\n"),
            language: self.language.to_string(),
            source_file: self.src_file_path.clone(),
            original_test_file: guard.original().to_string(),
            processed_test_file: insertion.processed_file.clone(),
            coverage_before: self.current_coverage,
            coverage_after: self.current_coverage,
            test: candidate.clone(),
        };

        if !output.success() {
            result.reason = String::from(TEST_FAILED);
            let explanation = self.explain_failure(&insertion, &output);
            return self.reject(guard, result, explanation);
        }

        let report = self.measurement().measure(&self.runtime, output.start_time_ms)?;
        result.coverage_after = report.total_coverage;
        if !self.coverage_increased(&report) {
            result.reason = String::from(COVERAGE_NOT_INCREASED);
            return self.reject(guard, result, String::from(COVERAGE_NOT_INCREASED));
        }

        for run in 2..=self.config.num_attempts {
            let repeat = self.run_test_command()?;
            if !repeat.success() {
                result.reason = format!(
                    "Test failed on repeat run {} of {}",
                    run, self.config.num_attempts
                );
                result.exit_code = repeat.exit_code;
                result.stdout = repeat.stdout.clone();
                result.stderr = repeat.stderr.clone();
                let explanation = self.explain_failure(&insertion, &repeat);
                return self.reject(guard, result, explanation);
            }
        }

        guard.commit();
        // earlier lines shifted down by the new imports
        self.insertion_point.test_line += insertion.imports.len();
        self.current_coverage = report.total_coverage;
        if self.mode.is_global() {
            self.last_coverage_percentages.extend(report.file_percentages());
        }
        self.code_coverage_report = coverage_summary(&report);
        info!(
            coverage_before = as_percent(result.coverage_before),
            coverage_after = as_percent(result.coverage_after),
            "test passed and coverage increased"
        );
        result.status = Status::Pass;
        Ok(result)
    }
}
