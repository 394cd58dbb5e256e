use tracing::{error, warn};

use crate::agent::{AdaptCommandRequest, AgentCompletion, Completion};

/// `cd proj && pytest tests --cov=app` -> `cd proj && pytest tests/test_app.py --cov=app`
///
/// Everything between `pytest` and the first `--` is replaced by the test file.
/// `None` when the command has no option after `pytest`.
pub fn adapt_pytest_command(test_command: &str, test_file_relative_path: &str) -> Option<String> {
    let pytest_at = test_command.find("pytest")?;
    let options_at = test_command[pytest_at..].find("--")?;
    Some(format!(
        "{}pytest {} {}",
        &test_command[..pytest_at],
        test_file_relative_path,
        &test_command[pytest_at + options_at..]
    ))
}

/// Rewrites `test_command` to run only one test file. Pytest commands are
/// rewritten locally, anything else is asked of the agent. Failures leave the
/// command unchanged.
pub fn adapt_test_command<A: AgentCompletion>(
    agent: &A,
    test_command: &str,
    test_file_relative_path: &str,
    project_root_dir: &str,
) -> Option<Completion<String>> {
    if test_command.contains("pytest") {
        let adapted = adapt_pytest_command(test_command, test_file_relative_path);
        if adapted.is_none() {
            error!(
                test_command,
                "Failed to adapt test command for running a single test"
            );
        }
        return adapted.map(Completion::new);
    }
    let request = AdaptCommandRequest {
        test_file_relative_path: test_file_relative_path.to_string(),
        test_command: test_command.to_string(),
        project_root_dir: project_root_dir.to_string(),
    };
    match agent.adapt_test_command(&request) {
        Ok(completion) if !completion.content.trim().is_empty() => Some(completion),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, test_command, "agent could not adapt test command");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::scripted::ScriptedAgent;
    use pretty_assertions::assert_eq;

    #[test]
    fn rewrites_pytest_target() {
        assert_eq!(
            adapt_pytest_command(
                "cd project && pytest tests --cov=app --cov-report=xml",
                "tests/test_app.py"
            ),
            Some(String::from(
                "cd project && pytest tests/test_app.py --cov=app --cov-report=xml"
            ))
        );
    }

    #[test]
    fn pytest_without_options_is_left_alone() {
        assert_eq!(adapt_pytest_command("pytest tests", "tests/test_app.py"), None);

        let agent = ScriptedAgent::new(0, 1, 1);
        assert_eq!(
            adapt_test_command(&agent, "pytest tests", "tests/test_app.py", "."),
            None
        );
    }

    #[test]
    fn other_commands_are_adapted_by_the_agent() {
        let mut agent = ScriptedAgent::new(0, 1, 1);
        agent.adapted_command = Some(String::from("npx jest tests/app.test.js --coverage"));
        let adapted = adapt_test_command(&agent, "npx jest --coverage", "tests/app.test.js", ".")
            .unwrap();
        assert_eq!(adapted.content, "npx jest tests/app.test.js --coverage");
        assert_eq!(adapted.input_tokens, 10);
    }

    #[test]
    fn agent_failure_keeps_the_command() {
        let agent = ScriptedAgent::new(0, 1, 1);
        assert_eq!(
            adapt_test_command(&agent, "go test ./...", "app_test.go", "."),
            None
        );
    }
}
