use std::{path::Path, time::Duration};

use crate::{
    errors::CovError,
    utils::process::{CaptureOutput, run_command},
};

/// Executes test and tool commands on behalf of the validator.
pub trait Runtime {
    fn run_command(
        &self,
        command: &str,
        cwd: &Path,
        max_run_time: Duration,
    ) -> Result<CaptureOutput, CovError>;
    fn name(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct ShellRuntime {}

impl Runtime for ShellRuntime {
    fn run_command(
        &self,
        command: &str,
        cwd: &Path,
        max_run_time: Duration,
    ) -> Result<CaptureOutput, CovError> {
        run_command(command, Some(cwd), max_run_time)
    }

    fn name(&self) -> String {
        String::from("shell")
    }
}
