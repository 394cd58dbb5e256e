use std::{
    io::{ErrorKind, Write},
    process::Stdio,
    str, thread,
};

use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{errors::CovError, utils::process::shell_command};

use super::{
    AdaptCommandRequest, AgentCompletion, Completion, FailureRequest, GeneratedTests,
    GenerationRequest, InsertLines, SuiteIndentation, SuiteRequest,
};

/// Delegates every call to an external executable.
///
/// The executable is invoked as `<command> <operation>`, receives the request
/// as JSON on stdin and must print a JSON object
/// `{"content": ..., "input_tokens": n, "output_tokens": n}` on stdout.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    command: String,
}

impl CommandAgent {
    pub fn new(command: String) -> Self {
        Self { command }
    }

    fn call<Req: Serialize, Res: DeserializeOwned>(
        &self,
        operation: &str,
        request: &Req,
    ) -> Result<Completion<Res>, CovError> {
        let request_json = serde_json::to_string(request)?;
        debug!(operation, agent = %self.command, "calling agent");
        let mut child = shell_command(&format!("{} {}", self.command, operation))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CovError::AgentError(format!("Failed to start agent '{}': {}", self.command, e))
            })?;
        // stdin is fed while stdout and stderr are drained
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || stdin.write_all(request_json.as_bytes()))
        });
        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
                Err(_) => {
                    return Err(CovError::AgentError(String::from(
                        "Agent request writer thread panicked",
                    )));
                }
                _ => {}
            }
        }
        if !output.status.success() {
            return Err(CovError::AgentError(format!(
                "Agent '{}' failed on {}: {}",
                self.command,
                operation,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let response = str::from_utf8(output.stdout.as_slice())
            .map_err(|e| CovError::AgentError(format!("Agent returned invalid UTF-8: {}", e)))?;
        Ok(serde_json::from_str(response)?)
    }
}

impl AgentCompletion for CommandAgent {
    fn analyze_suite_indentation(
        &self,
        request: &SuiteRequest,
    ) -> Result<Completion<SuiteIndentation>, CovError> {
        self.call("analyze_suite_indentation", request)
    }

    fn analyze_insert_lines(
        &self,
        request: &SuiteRequest,
    ) -> Result<Completion<InsertLines>, CovError> {
        self.call("analyze_insert_lines", request)
    }

    fn analyze_test_failure(&self, request: &FailureRequest) -> Result<Completion<String>, CovError> {
        self.call("analyze_test_failure", request)
    }

    fn generate_tests(
        &self,
        request: &GenerationRequest,
    ) -> Result<Completion<GeneratedTests>, CovError> {
        self.call("generate_tests", request)
    }

    fn adapt_test_command(
        &self,
        request: &AdaptCommandRequest,
    ) -> Result<Completion<String>, CovError> {
        self.call("adapt_test_command", request)
    }
}
