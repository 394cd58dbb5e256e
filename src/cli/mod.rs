use crate::runner::RunnerConfig;

pub mod cli_parser;
pub mod dependency_check;
pub mod settings;

pub struct RunRequest {
    pub runner_config: RunnerConfig,
    pub agent_command: String,
}

pub enum CliCommand {
    Run(Box<RunRequest>),
    EditSettings,
    CheckDependencies {
        agent_command: Option<String>,
        diff_cover_command: String,
    },
}
