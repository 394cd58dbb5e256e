use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::{
    coverage::CoverageTool,
    errors::CovError,
    runner::RunnerConfig,
};

use super::{CliCommand, RunRequest, settings::Settings};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Generate unit tests and keep only those that raise coverage",
    long_about = None,
    args_conflicts_with_subcommands = true,
    after_help = "Example:\n  \
        covagent --source-file-path app.py --test-file-path tests/test_app.py \\\n    \
        --code-coverage-report-path coverage.xml \\\n    \
        --test-command \"pytest --cov=. --cov-report=xml\" --agent-command my-agent"
)]
pub struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[arg(long, short, default_value_t = false, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open ~/.covagent/config in $VISUAL or $EDITOR
    Config,
    /// Check that the tools covagent shells out to are installed
    Check,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[arg(long, help = "Source file the tests are generated for")]
    source_file_path: Option<PathBuf>,

    #[arg(long, help = "Existing test file that receives the new tests")]
    test_file_path: Option<PathBuf>,

    #[arg(long, help = "Write the extended test suite here instead of editing the test file")]
    test_file_output_path: Option<PathBuf>,

    #[arg(long, help = "Project root, defaults to the current directory")]
    project_root: Option<PathBuf>,

    #[arg(long, help = "Coverage report written by the test command")]
    code_coverage_report_path: Option<PathBuf>,

    #[arg(long, help = "Command that runs the tests and writes the coverage report")]
    test_command: Option<String>,

    #[arg(long, help = "Working directory of the test command")]
    test_command_dir: Option<PathBuf>,

    #[arg(long, num_args = 1.., help = "Extra files shown to the agent as context")]
    included_files: Vec<PathBuf>,

    #[arg(long, value_parser = ["cobertura", "lcov", "jacoco", "diff_cover_json"])]
    coverage_type: Option<String>,

    #[arg(long, default_value = "test_results.json")]
    report_filepath: PathBuf,

    #[arg(long, help = "Target line coverage in percent")]
    desired_coverage: Option<f64>,

    #[arg(long)]
    max_iterations: Option<usize>,

    #[arg(long, default_value = "")]
    additional_instructions: String,

    #[arg(long, help = "Executable that answers agent requests")]
    agent_command: Option<String>,

    #[arg(
        long,
        default_value_t = false,
        help = "Accept tests that raise the coverage of any file in the report"
    )]
    use_report_coverage_feature_flag: bool,

    #[arg(long, default_value_t = false, help = "Measure coverage of the changed lines only")]
    diff_coverage: bool,

    #[arg(long, default_value = "main", help = "Branch the diff is computed against")]
    branch: String,

    #[arg(long, help = "Runs a candidate must pass before it is kept")]
    run_tests_multiple_times: Option<usize>,

    #[arg(long, help = "Timeout of a single test command run in seconds")]
    max_run_time_sec: Option<u64>,

    #[arg(long, default_value_t = false, help = "Exit with code 2 when the target is not reached")]
    strict_coverage: bool,

    #[arg(long, default_value_t = false, help = "Run only the test file instead of the whole suite")]
    run_each_test_separately: bool,
}

fn required<T>(value: Option<T>, flag: &str) -> Result<T, CovError> {
    value.ok_or_else(|| CovError::InvalidArgument(format!("{} is required", flag)))
}

impl RunArgs {
    /// Command line values win over the settings file, which wins over defaults.
    fn into_request(self, settings: Settings) -> Result<RunRequest, CovError> {
        let coverage_type = self.coverage_type.unwrap_or(settings.coverage_type);
        coverage_type.parse::<CoverageTool>()?;

        let desired_coverage = self.desired_coverage.unwrap_or(settings.desired_coverage);
        if !(0.0..=100.0).contains(&desired_coverage) {
            return Err(CovError::InvalidArgument(format!(
                "--desired-coverage must be between 0 and 100, got {}",
                desired_coverage
            )));
        }
        let run_tests_multiple_times = self
            .run_tests_multiple_times
            .unwrap_or(settings.run_tests_multiple_times);
        if run_tests_multiple_times == 0 {
            return Err(CovError::InvalidArgument(String::from(
                "--run-tests-multiple-times must be at least 1",
            )));
        }
        let agent_command = self.agent_command.or(settings.agent_command).ok_or_else(|| {
            CovError::InvalidArgument(String::from(
                "--agent-command is required unless agent_command is set in ~/.covagent/config",
            ))
        })?;

        let current_dir = std::env::current_dir()?;
        let runner_config = RunnerConfig {
            source_file_path: required(self.source_file_path, "--source-file-path")?,
            test_file_path: required(self.test_file_path, "--test-file-path")?,
            test_file_output_path: self.test_file_output_path,
            project_root: self.project_root.unwrap_or_else(|| current_dir.clone()),
            code_coverage_report_path: required(
                self.code_coverage_report_path,
                "--code-coverage-report-path",
            )?,
            test_command: required(self.test_command, "--test-command")?,
            test_command_dir: self.test_command_dir.unwrap_or(current_dir),
            included_files: self.included_files,
            coverage_type,
            report_filepath: self.report_filepath,
            desired_coverage,
            max_iterations: self.max_iterations.unwrap_or(settings.max_iterations),
            additional_instructions: self.additional_instructions,
            use_report_coverage_feature_flag: self.use_report_coverage_feature_flag,
            diff_coverage: self.diff_coverage,
            branch: self.branch,
            diff_cover_command: settings.diff_cover_command,
            run_tests_multiple_times,
            max_run_time: Duration::from_secs(
                self.max_run_time_sec.unwrap_or(settings.max_run_time_sec),
            ),
            strict_coverage: self.strict_coverage,
            run_each_test_separately: self.run_each_test_separately,
        };
        Ok(RunRequest {
            runner_config,
            agent_command,
        })
    }
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn into_command(self, settings: Settings) -> Result<CliCommand, CovError> {
        match self.command {
            Some(Commands::Config) => Ok(CliCommand::EditSettings),
            Some(Commands::Check) => Ok(CliCommand::CheckDependencies {
                agent_command: self.run.agent_command.or(settings.agent_command),
                diff_cover_command: settings.diff_cover_command,
            }),
            None => Ok(CliCommand::Run(Box::new(self.run.into_request(settings)?))),
        }
    }
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REQUIRED: [&str; 11] = [
        "covagent",
        "--source-file-path",
        "app.py",
        "--test-file-path",
        "tests/test_app.py",
        "--code-coverage-report-path",
        "coverage.xml",
        "--test-command",
        "pytest --cov=app",
        "--agent-command",
        "my-agent",
    ];

    fn run_request(extra: &[&str], settings: Settings) -> Result<RunRequest, CovError> {
        let args: Vec<&str> = REQUIRED.iter().chain(extra.iter()).copied().collect();
        match Cli::try_parse_from(args).unwrap().into_command(settings)? {
            CliCommand::Run(request) => Ok(*request),
            _ => panic!("expected a run command"),
        }
    }

    #[test]
    fn defaults_come_from_settings() {
        let request = run_request(&[], Settings::default()).unwrap();
        let config = request.runner_config;
        assert_eq!(request.agent_command, "my-agent");
        assert_eq!(config.source_file_path, PathBuf::from("app.py"));
        assert_eq!(config.test_command, "pytest --cov=app");
        assert_eq!(config.coverage_type, "cobertura");
        assert_eq!(config.desired_coverage, 90.0);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.run_tests_multiple_times, 1);
        assert_eq!(config.max_run_time, Duration::from_secs(30));
        assert_eq!(config.report_filepath, PathBuf::from("test_results.json"));
        assert_eq!(config.branch, "main");
        assert_eq!(config.diff_cover_command, "diff-cover");
        assert_eq!(config.project_root, std::env::current_dir().unwrap());
        assert!(!config.strict_coverage);
    }

    #[test]
    fn command_line_wins_over_settings() {
        let settings = Settings {
            desired_coverage: 70.0,
            max_iterations: 8,
            coverage_type: String::from("jacoco"),
            ..Settings::default()
        };
        let request = run_request(
            &[
                "--desired-coverage",
                "95",
                "--coverage-type",
                "lcov",
                "--included-files",
                "a.py",
                "b.py",
                "--strict-coverage",
            ],
            settings,
        )
        .unwrap();
        let config = request.runner_config;
        assert_eq!(config.desired_coverage, 95.0);
        assert_eq!(config.coverage_type, "lcov");
        assert_eq!(config.max_iterations, 8);
        assert_eq!(
            config.included_files,
            vec![PathBuf::from("a.py"), PathBuf::from("b.py")]
        );
        assert!(config.strict_coverage);
    }

    #[test]
    fn agent_command_falls_back_to_settings() {
        let cli = Cli::try_parse_from([
            "covagent",
            "--source-file-path",
            "app.py",
            "--test-file-path",
            "tests/test_app.py",
            "--code-coverage-report-path",
            "coverage.xml",
            "--test-command",
            "pytest",
        ])
        .unwrap();
        let settings = Settings {
            agent_command: Some(String::from("configured-agent")),
            ..Settings::default()
        };
        match cli.into_command(settings).unwrap() {
            CliCommand::Run(request) => assert_eq!(request.agent_command, "configured-agent"),
            _ => panic!("expected a run command"),
        }
    }

    #[test]
    fn missing_values_are_invalid_arguments() {
        let cli = Cli::try_parse_from(["covagent", "--source-file-path", "app.py"]).unwrap();
        let settings = Settings {
            agent_command: Some(String::from("agent")),
            ..Settings::default()
        };
        assert!(matches!(
            cli.into_command(settings),
            Err(CovError::InvalidArgument(_))
        ));

        let cli = Cli::try_parse_from(["covagent", "--source-file-path", "app.py"]).unwrap();
        assert!(matches!(
            cli.into_command(Settings::default()),
            Err(CovError::InvalidArgument(_))
        ));

        assert!(matches!(
            run_request(&["--desired-coverage", "120"], Settings::default()),
            Err(CovError::InvalidArgument(_))
        ));
        assert!(matches!(
            run_request(&["--run-tests-multiple-times", "0"], Settings::default()),
            Err(CovError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unsupported_coverage_type_from_settings() {
        let settings = Settings {
            coverage_type: String::from("clover"),
            ..Settings::default()
        };
        assert!(matches!(
            run_request(&[], settings),
            Err(CovError::UnsupportedCoverageTool(_))
        ));
    }

    #[test]
    fn subcommands() {
        let cli = Cli::try_parse_from(["covagent", "config"]).unwrap();
        assert!(matches!(
            cli.into_command(Settings::default()).unwrap(),
            CliCommand::EditSettings
        ));

        let cli = Cli::try_parse_from(["covagent", "check", "-v"]).unwrap();
        assert!(cli.verbose());
        match cli.into_command(Settings::default()).unwrap() {
            CliCommand::CheckDependencies {
                agent_command,
                diff_cover_command,
            } => {
                assert_eq!(agent_command, None);
                assert_eq!(diff_cover_command, "diff-cover");
            }
            _ => panic!("expected a dependency check"),
        }
    }
}
