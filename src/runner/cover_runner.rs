use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{error, info, warn};

use crate::{
    agent::{AgentCompletion, GenerationRequest, number_lines},
    coverage::as_percent,
    errors::CovError,
    runtime::{Runtime, ShellRuntime},
    utils::path_resolver::get_relative_path,
    validator::{CoverageSnapshot, Validator, ValidatorConfig, result::ValidationResult},
};

use super::{
    RunSummary, Runner, RunnerConfig,
    command_adapter::adapt_test_command,
    summary::{print_coverage, print_results},
};

fn validate_paths(config: &RunnerConfig) -> Result<(), CovError> {
    if !config.source_file_path.is_file() {
        return Err(CovError::InvalidArgument(format!(
            "Source file not found at {}",
            config.source_file_path.display()
        )));
    }
    if !config.test_file_path.is_file() {
        return Err(CovError::InvalidArgument(format!(
            "Test file not found at {}",
            config.test_file_path.display()
        )));
    }
    if !config.project_root.is_dir() {
        return Err(CovError::InvalidArgument(format!(
            "Project root not found at {}",
            config.project_root.display()
        )));
    }
    Ok(())
}

/// Copies the test file to the output path, if one is set, and returns the
/// file that receives the new tests.
fn duplicate_test_file(config: &RunnerConfig) -> Result<PathBuf, CovError> {
    match &config.test_file_output_path {
        Some(output_path) if output_path != &config.test_file_path => {
            fs::copy(&config.test_file_path, output_path)?;
            Ok(output_path.clone())
        }
        _ => Ok(config.test_file_path.clone()),
    }
}

fn relative_or_full(project_root: &Path, path: &Path) -> String {
    get_relative_path(project_root, path).unwrap_or_else(|_| path.display().to_string())
}

/// `file_path: ... content: ...` blocks for every readable file.
pub fn read_included_files(included_files: &[PathBuf], project_root: &Path) -> String {
    let mut sections = vec![];
    for path in included_files {
        match fs::read_to_string(path) {
            Ok(content) => sections.push(format!(
                "file_path: `{}`\ncontent:\n```\n{}\n```",
                relative_or_full(project_root, path),
                content
            )),
            Err(e) => warn!(file = %path.display(), error = %e, "failed to read included file"),
        }
    }
    sections.join("\n\n\n")
}

/// Drives generation and validation until the desired coverage or the
/// iteration budget is reached.
pub struct CoverRunner<A: AgentCompletion, RT: Runtime = ShellRuntime> {
    config: RunnerConfig,
    validator: Validator<A, RT>,
    included_files: String,
    results: Vec<ValidationResult>,
    generator_input_tokens: u64,
    generator_output_tokens: u64,
}

impl<A: AgentCompletion, RT: Runtime> CoverRunner<A, RT> {
    pub fn new(config: RunnerConfig, agent: A, runtime: RT) -> Result<Self, CovError> {
        validate_paths(&config)?;
        let test_file_path = duplicate_test_file(&config)?;

        let mut test_command = config.test_command.clone();
        let mut generator_input_tokens = 0;
        let mut generator_output_tokens = 0;
        if config.run_each_test_separately {
            let test_file_relative_path = relative_or_full(&config.project_root, &test_file_path);
            if let Some(adapted) = adapt_test_command(
                &agent,
                &config.test_command,
                &test_file_relative_path,
                &config.test_command_dir.display().to_string(),
            ) {
                info!(
                    original = %config.test_command,
                    adapted = %adapted.content,
                    "converted test command to run only a single test"
                );
                generator_input_tokens += adapted.input_tokens;
                generator_output_tokens += adapted.output_tokens;
                test_command = adapted.content;
            }
        }

        let validator_config = ValidatorConfig {
            source_file_path: config.source_file_path.clone(),
            test_file_path,
            code_coverage_report_path: config.code_coverage_report_path.clone(),
            test_command,
            test_command_dir: config.test_command_dir.clone(),
            coverage_type: config.coverage_type.clone(),
            desired_coverage: config.desired_coverage,
            use_report_coverage_feature_flag: config.use_report_coverage_feature_flag,
            diff_coverage: config.diff_coverage,
            comparison_branch: config.branch.clone(),
            diff_cover_command: config.diff_cover_command.clone(),
            num_attempts: config.run_tests_multiple_times,
            max_run_time: config.max_run_time,
        };
        let included_files = read_included_files(&config.included_files, &config.project_root);
        Ok(Self {
            config,
            validator: Validator::new(validator_config, agent, runtime),
            included_files,
            results: vec![],
            generator_input_tokens,
            generator_output_tokens,
        })
    }

    pub fn validator(&self) -> &Validator<A, RT> {
        &self.validator
    }

    fn generation_request(&self, snapshot: CoverageSnapshot) -> Result<GenerationRequest, CovError> {
        let validator_config = self.validator.config();
        let source = fs::read_to_string(&self.config.source_file_path)?;
        let test_file = fs::read_to_string(&validator_config.test_file_path)?;
        Ok(GenerationRequest {
            source_file_name: relative_or_full(&self.config.project_root, &self.config.source_file_path),
            source_file_numbered: number_lines(&source),
            test_file_name: relative_or_full(&self.config.project_root, &validator_config.test_file_path),
            test_file,
            language: snapshot.language.to_string(),
            testing_framework: snapshot.testing_framework,
            coverage_report: snapshot.coverage_report,
            failed_test_runs: snapshot.failed_test_runs,
            included_files: self.included_files.clone(),
            additional_instructions: self.config.additional_instructions.clone(),
        })
    }

    fn generate_and_validate(&mut self, snapshot: CoverageSnapshot) -> Result<(), CovError> {
        let request = self.generation_request(snapshot)?;
        let generated = match self.validator.agent().generate_tests(&request) {
            Ok(completion) => {
                self.generator_input_tokens += completion.input_tokens;
                self.generator_output_tokens += completion.output_tokens;
                completion.content
            }
            Err(e) => {
                error!(error = %e, "Error during test generation");
                return Ok(());
            }
        };
        info!(count = generated.new_tests.len(), "generated candidate tests");
        for candidate in &generated.new_tests {
            let result = self.validator.validate(candidate)?;
            self.results.push(result);
        }
        Ok(())
    }

    fn token_usage(&self) -> (u64, u64) {
        let (validator_input, validator_output) = self.validator.token_usage();
        (
            self.generator_input_tokens + validator_input,
            self.generator_output_tokens + validator_output,
        )
    }

    fn write_report(&self) -> Result<(), CovError> {
        let report = serde_json::to_string_pretty(&self.results)?;
        fs::write(&self.config.report_filepath, report)?;
        info!(report = %self.config.report_filepath.display(), "wrote test results report");
        Ok(())
    }

    fn finalize(&self, iterations: usize) -> Result<RunSummary, CovError> {
        let current = as_percent(self.validator.current_coverage());
        let target_reached = self.validator.target_reached();
        if target_reached {
            info!(
                "Reached above target coverage of {}% (Current Coverage: {}%) in {} iterations.",
                self.config.desired_coverage, current, iterations
            );
        } else {
            let coverage_type = if self.config.diff_coverage {
                "diff coverage"
            } else {
                "coverage"
            };
            let message = format!(
                "Reached maximum iteration limit without achieving desired {}. Current Coverage: {}%",
                coverage_type, current
            );
            if self.config.strict_coverage {
                error!("{}", message);
            } else {
                info!("{}", message);
            }
        }

        let (input_tokens, output_tokens) = self.token_usage();
        info!("Total number of input tokens used: {}", input_tokens);
        info!("Total number of output tokens used: {}", output_tokens);

        print_results(&self.results);
        self.write_report()?;
        Ok(RunSummary {
            iterations,
            final_coverage: self.validator.current_coverage(),
            target_reached,
            results: self.results.clone(),
            input_tokens,
            output_tokens,
        })
    }
}

impl<A: AgentCompletion, RT: Runtime> Runner for CoverRunner<A, RT> {
    fn run(&mut self) -> Result<RunSummary, CovError> {
        self.validator.initial_test_suite_analysis()?;
        self.validator.run_coverage()?;

        let mut iterations = 0;
        while iterations < self.config.max_iterations && !self.validator.target_reached() {
            info!(
                "Iteration {} of {}.",
                iterations + 1,
                self.config.max_iterations
            );
            print_coverage(
                self.validator.current_coverage(),
                self.config.desired_coverage,
                self.config.diff_coverage,
            );
            let snapshot = self.validator.get_coverage();
            self.generate_and_validate(snapshot)?;
            iterations += 1;
        }
        self.finalize(iterations)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::agent::{CandidateTest, GeneratedTests, scripted::ScriptedAgent};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    const SOURCE: &str = "def add(a, b):\n    return a + b\n\n\ndef sub(a, b):\n    return a - b\n";
    const TEST_FILE: &str = "from app import add\n\n\ndef test_add():\n    assert add(1, 1) == 2\n";

    // coverage depends on whether test_sub made it into the test file
    const SCRIPT: &str = "sleep 0.1
if grep -q BROKEN tests/test_app.py; then exit 1; fi
if grep -q test_sub tests/test_app.py; then cp full.info coverage.info; else cp base.info coverage.info; fi
";

    fn lcov(source: &Path, covered: &[u32], missed: &[u32]) -> String {
        let mut record = format!("SF:{}\n", source.display());
        for line in covered {
            record.push_str(&format!("DA:{},1\n", line));
        }
        for line in missed {
            record.push_str(&format!("DA:{},0\n", line));
        }
        record.push_str("end_of_record\n");
        record
    }

    fn project() -> (TempDir, RunnerConfig) {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("tests")).unwrap();
        let source = root.join("app.py");
        fs::write(&source, SOURCE).unwrap();
        fs::write(root.join("tests/test_app.py"), TEST_FILE).unwrap();
        fs::write(root.join("helpers.py"), "HELPER = 1\n").unwrap();
        fs::write(root.join("run.sh"), SCRIPT).unwrap();
        fs::write(root.join("base.info"), lcov(&source, &[1, 2], &[5, 6])).unwrap();
        fs::write(root.join("full.info"), lcov(&source, &[1, 2, 5, 6], &[])).unwrap();

        let config = RunnerConfig {
            source_file_path: source,
            test_file_path: root.join("tests/test_app.py"),
            test_file_output_path: Some(root.join("tests/test_app_generated.py")),
            project_root: root.to_path_buf(),
            code_coverage_report_path: root.join("coverage.info"),
            test_command: String::from("sh run.sh"),
            test_command_dir: root.to_path_buf(),
            included_files: vec![root.join("helpers.py")],
            coverage_type: String::from("lcov"),
            report_filepath: root.join("test_results.json"),
            desired_coverage: 100.0,
            max_iterations: 3,
            additional_instructions: String::from("keep tests small"),
            use_report_coverage_feature_flag: false,
            diff_coverage: false,
            branch: String::from("main"),
            diff_cover_command: String::from("diff-cover"),
            run_tests_multiple_times: 1,
            max_run_time: Duration::from_secs(10),
            strict_coverage: false,
            run_each_test_separately: false,
        };
        (dir, config)
    }

    fn candidate(name: &str, code: &str) -> CandidateTest {
        CandidateTest {
            test_behavior: String::new(),
            test_name: name.to_string(),
            test_code: code.to_string(),
            new_imports_code: String::from("from app import sub"),
        }
    }

    #[test]
    fn run_validates_candidates_until_target_is_reached() {
        let (dir, mut config) = project();
        // run.sh inspects tests/test_app.py itself
        config.test_file_output_path = None;
        let agent = ScriptedAgent::new(0, 5, 1);
        agent.generated.borrow_mut().push_back(GeneratedTests {
            language: String::from("python"),
            new_tests: vec![
                candidate("test_broken", "def test_broken():\n    assert 'BROKEN'"),
                candidate("test_sub", "def test_sub():\n    assert sub(2, 1) == 1"),
            ],
        });

        let mut runner = CoverRunner::new(config.clone(), agent, ShellRuntime::default()).unwrap();
        let summary = runner.run().unwrap();

        assert_eq!(summary.iterations, 1);
        assert!(summary.target_reached);
        assert_eq!(summary.final_coverage, 1.0);
        assert_eq!(summary.results.len(), 2);
        assert!(!summary.results[0].passed());
        assert!(summary.results[1].passed());
        assert_eq!(summary.exit_code(true), 0);

        let test_file = fs::read_to_string(&config.test_file_path).unwrap();
        assert!(test_file.contains("def test_sub():"));
        assert!(!test_file.contains("BROKEN"));

        let report: Vec<ValidationResult> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("test_results.json")).unwrap())
                .unwrap();
        assert_eq!(report, summary.results);

        let requests = runner.validator().agent().generation_requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].source_file_name, "app.py");
        assert_eq!(requests[0].test_file_name, "tests/test_app.py");
        assert!(requests[0].included_files.starts_with("file_path: `helpers.py`"));
        assert!(requests[0].coverage_report.contains("Percentage covered: 50%"));
        assert_eq!(requests[0].testing_framework, "pytest");
    }

    #[test]
    fn failed_runs_are_fed_back_to_the_next_generation() {
        let (_dir, mut config) = project();
        config.test_file_output_path = None;
        config.max_iterations = 2;
        config.strict_coverage = true;
        let agent = ScriptedAgent::new(0, 5, 1);
        agent.generated.borrow_mut().push_back(GeneratedTests {
            language: String::from("python"),
            new_tests: vec![candidate("test_broken", "def test_broken():\n    assert 'BROKEN'")],
        });

        let mut runner = CoverRunner::new(config, agent, ShellRuntime::default()).unwrap();
        let summary = runner.run().unwrap();

        assert_eq!(summary.iterations, 2);
        assert!(!summary.target_reached);
        assert_eq!(summary.final_coverage, 0.5);
        assert_eq!(summary.exit_code(true), 2);

        let requests = runner.validator().agent().generation_requests.borrow();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].failed_test_runs.is_empty());
        assert_eq!(requests[1].failed_test_runs.len(), 1);
        assert_eq!(requests[1].failed_test_runs[0].code.test_name, "test_broken");
    }

    #[test]
    fn test_file_is_copied_to_output_path() {
        let (_dir, config) = project();
        let output_path = config.test_file_output_path.clone().unwrap();
        let runner = CoverRunner::new(config, ScriptedAgent::new(0, 5, 1), ShellRuntime::default())
            .unwrap();
        assert_eq!(fs::read_to_string(&output_path).unwrap(), TEST_FILE);
        assert_eq!(runner.validator().config().test_file_path, output_path);
    }

    #[test]
    fn pytest_command_is_narrowed_to_the_test_file() {
        let (_dir, mut config) = project();
        config.test_file_output_path = None;
        config.test_command = String::from("python -m pytest tests --cov=app");
        config.run_each_test_separately = true;
        let runner = CoverRunner::new(config, ScriptedAgent::new(0, 5, 1), ShellRuntime::default())
            .unwrap();
        assert_eq!(
            runner.validator().config().test_command,
            "python -m pytest tests/test_app.py --cov=app"
        );
    }

    #[test]
    fn missing_source_file_is_rejected() {
        let (dir, mut config) = project();
        config.source_file_path = dir.path().join("missing.py");
        let result = CoverRunner::new(config, ScriptedAgent::new(0, 5, 1), ShellRuntime::default());
        match result {
            Err(CovError::InvalidArgument(message)) => {
                assert!(message.starts_with("Source file not found"))
            }
            _ => panic!("expected InvalidArgument"),
        }
    }

    #[test]
    fn unreadable_included_files_are_skipped() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("present.py");
        fs::write(&present, "X = 1").unwrap();
        let included = read_included_files(&[dir.path().join("absent.py"), present], dir.path());
        assert_eq!(included, "file_path: `present.py`\ncontent:\n```\nX = 1\n```");
    }
}
