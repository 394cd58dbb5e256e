use std::{
    io::Read,
    path::Path,
    process::{Child, Command, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::{errors::CovError, utils::file::current_timestamp_ms};

pub const TIMEOUT_EXIT_CODE: i32 = -1;
pub const TIMEOUT_MESSAGE: &str = "Command timed out";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Wall clock time in ms at which the command was started.
    pub start_time_ms: u128,
    pub timed_out: bool,
}

impl CaptureOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn timed_out(start_time_ms: u128) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::from(TIMEOUT_MESSAGE),
            exit_code: TIMEOUT_EXIT_CODE,
            start_time_ms,
            timed_out: true,
        }
    }
}

pub(crate) fn shell_command(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut shell = Command::new("cmd");
        shell.arg("/C").arg(command);
        shell
    } else {
        let mut shell = Command::new("sh");
        shell.arg("-c").arg(command);
        shell
    }
}

/// Kills the child and, on unix, every process in its group.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        // the child leads its own group, see `run_command`
        let pgid = child.id() as libc::pid_t;
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buffer);
        }
        buffer
    })
}

fn collect(reader: JoinHandle<Vec<u8>>) -> Result<String, CovError> {
    let raw = reader
        .join()
        .map_err(|_| CovError::RuntimeError(String::from("Output reader thread panicked")))?;
    let plain = strip_ansi_escapes::strip(raw.as_slice());
    Ok(String::from_utf8_lossy(&plain).to_string())
}

/// Runs `command` through the platform shell and waits at most `max_run_time`.
///
/// On timeout the shell and everything it started are killed and a sentinel
/// output with exit code `-1` is returned instead of an error. Output readers
/// of a killed child are left detached.
pub fn run_command(
    command: &str,
    cwd: Option<&Path>,
    max_run_time: Duration,
) -> Result<CaptureOutput, CovError> {
    let start_time_ms = current_timestamp_ms()?;
    let mut shell = shell_command(command);
    if let Some(cwd) = cwd {
        shell.current_dir(cwd);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        shell.process_group(0);
    }
    debug!(command, "running shell command");
    let mut child = shell
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let started_at = Instant::now();
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if started_at.elapsed() >= max_run_time {
                    warn!(
                        command,
                        max_run_time_ms = max_run_time.as_millis() as u64,
                        "command exceeded its time budget, killing it"
                    );
                    kill_process_group(&mut child);
                    return Ok(CaptureOutput::timed_out(start_time_ms));
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };

    Ok(CaptureOutput {
        stdout: collect(stdout_reader)?,
        stderr: collect(stderr_reader)?,
        exit_code: status.code().unwrap_or(TIMEOUT_EXIT_CODE),
        start_time_ms,
        timed_out: false,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn captures_stdout_stderr_and_exit_code() {
        let output = run_command(
            "echo out; echo err 1>&2; exit 3",
            None,
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, 3);
        assert!(!output.timed_out);
        assert!(!output.success());
    }

    #[test]
    fn runs_in_working_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let output = run_command("cat marker.txt", Some(dir.path()), Duration::from_secs(10))
            .unwrap();
        assert_eq!(output.stdout, "here");
        assert!(output.success());
    }

    #[test]
    fn strips_ansi_escapes() {
        let output = run_command(
            r"printf '\033[31mred\033[0m'",
            None,
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(output.stdout, "red");
    }

    #[test]
    fn timeout_returns_sentinel() {
        let started = Instant::now();
        let output = run_command("sleep 5", None, Duration::from_millis(200)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(output.exit_code, TIMEOUT_EXIT_CODE);
        assert_eq!(output.stderr, TIMEOUT_MESSAGE);
        assert_eq!(output.stdout, "");
        assert!(output.timed_out);
    }

    #[test]
    fn timeout_kills_commands_started_by_the_shell() {
        let dir = tempdir().unwrap();
        let output = run_command(
            "cd . && sh -c 'sleep 1; echo late > coverage.info'",
            Some(dir.path()),
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(output.timed_out);

        std::thread::sleep(Duration::from_secs(2));
        assert!(!dir.path().join("coverage.info").exists());
    }

    #[test]
    fn start_time_is_recorded_before_the_run() {
        let before = current_timestamp_ms().unwrap();
        let output = run_command("true", None, Duration::from_secs(10)).unwrap();
        assert!(output.start_time_ms >= before);
    }
}
