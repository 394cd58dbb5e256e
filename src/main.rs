use std::env;

use colored::Colorize;
use covagent::{
    agent::command::CommandAgent,
    cli::{
        CliCommand,
        cli_parser::parse_cli,
        dependency_check::check_dependencies,
        settings::{Settings, update_settings},
    },
    errors::CovError,
    runner::{Runner, cover_runner::CoverRunner},
    runtime::ShellRuntime,
};
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let log_json = env::var("COVAGENT_LOG_JSON").is_ok_and(|value| value == "1");
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(command: CliCommand) -> Result<i32, CovError> {
    match command {
        CliCommand::EditSettings => {
            update_settings()?;
            Ok(0)
        }
        CliCommand::CheckDependencies {
            agent_command,
            diff_cover_command,
        } => {
            if check_dependencies(agent_command.as_deref(), &diff_cover_command) {
                Ok(0)
            } else {
                Ok(1)
            }
        }
        CliCommand::Run(request) => {
            let strict_coverage = request.runner_config.strict_coverage;
            let agent = CommandAgent::new(request.agent_command);
            let mut runner =
                CoverRunner::new(request.runner_config, agent, ShellRuntime::default())?;
            let summary = runner.run()?;
            Ok(summary.exit_code(strict_coverage))
        }
    }
}

fn main() {
    let cli = parse_cli();
    init_tracing(cli.verbose());
    let exit_code = match Settings::load()
        .and_then(|settings| cli.into_command(settings))
        .and_then(run)
    {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "covagent failed");
            eprintln!("{} {}", "error:".red().bold(), e);
            1
        }
    };
    std::process::exit(exit_code);
}
