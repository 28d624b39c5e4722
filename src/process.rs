use std::fmt;
use std::io::Write;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::config::app_config;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeoutInfo {
    pub label: String,
    pub timeout_secs: u64,
}

#[derive(Debug)]
pub enum ProcessError {
    Timeout(TimeoutInfo),
    Message(String),
}

impl ProcessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(info) => {
                write!(f, "{} timed out after {}s", info.label, info.timeout_secs)
            }
            Self::Message(msg) => write!(f, "{msg}"),
        }
    }
}

fn parse_env_secs(name: &str) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(|v| v.max(1))
}

/// Remote commands run unbounded unless `BACKUPSCAN_TIMEOUT_SSH_SECS` is set.
pub fn ssh_timeout_secs() -> Option<u64> {
    parse_env_secs("BACKUPSCAN_TIMEOUT_SSH_SECS")
}

fn default_timeout_secs() -> u64 {
    (app_config().cmd_timeout_secs as u64).max(1)
}

fn timeout_error(label: &str, timeout_secs: u64) -> ProcessError {
    ProcessError::Timeout(TimeoutInfo {
        label: label.to_string(),
        timeout_secs,
    })
}

fn terminate_pid(pid: u32) {
    let pid_s = pid.to_string();
    let _ = Command::new("kill").args(["-TERM", &pid_s]).status();
}

fn kill_pid(pid: u32) {
    let pid_s = pid.to_string();
    let _ = Command::new("kill").args(["-KILL", &pid_s]).status();
}

/// Runs `cmd` to completion and returns its exit status only; output is
/// discarded.
pub fn run_command_status_with_timeout(
    mut cmd: Command,
    label: &str,
) -> Result<ExitStatus, ProcessError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let child = cmd
        .spawn()
        .map_err(|e| ProcessError::Message(format!("{label} spawn failed: {e}")))?;
    wait_status(child, label, Some(default_timeout_secs()))
}

fn wait_status(
    mut child: Child,
    label: &str,
    timeout_secs: Option<u64>,
) -> Result<ExitStatus, ProcessError> {
    let Some(secs) = timeout_secs else {
        return child
            .wait()
            .map_err(|e| ProcessError::Message(format!("{label} wait failed: {e}")));
    };
    match child
        .wait_timeout(Duration::from_secs(secs))
        .map_err(|e| ProcessError::Message(format!("{label} wait timeout error: {e}")))?
    {
        Some(status) => Ok(status),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(timeout_error(label, secs))
        }
    }
}

/// Runs `cmd` with the caller's stdout and stderr so its output shows up as it
/// is produced. `None` waits for as long as the command runs.
pub fn run_command_streaming(
    mut cmd: Command,
    label: &str,
    timeout_secs: Option<u64>,
) -> Result<ExitStatus, ProcessError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    let child = cmd
        .spawn()
        .map_err(|e| ProcessError::Message(format!("{label} spawn failed: {e}")))?;
    wait_status(child, label, timeout_secs)
}

fn wait_output_with_timeout(child: Child, label: &str) -> Result<Output, ProcessError> {
    let pid = child.id();
    let secs = default_timeout_secs();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(child.wait_with_output());
    });
    match rx.recv_timeout(Duration::from_secs(secs)) {
        Ok(res) => {
            res.map_err(|e| ProcessError::Message(format!("{label} read output failed: {e}")))
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            terminate_pid(pid);
            if rx.recv_timeout(Duration::from_secs(2)).is_err() {
                kill_pid(pid);
            }
            Err(timeout_error(label, secs))
        }
        Err(_) => Err(ProcessError::Message(format!(
            "{label} output worker channel closed unexpectedly"
        ))),
    }
}

pub fn run_command_output_with_timeout(
    mut cmd: Command,
    label: &str,
) -> Result<Output, ProcessError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let child = cmd
        .spawn()
        .map_err(|e| ProcessError::Message(format!("{label} spawn failed: {e}")))?;
    wait_output_with_timeout(child, label)
}

pub fn run_command_with_stdin_output_with_timeout(
    mut cmd: Command,
    stdin_text: &str,
    label: &str,
) -> Result<Output, ProcessError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .map_err(|e| ProcessError::Message(format!("{label} spawn failed: {e}")))?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin
            .write_all(stdin_text.as_bytes())
            .map_err(|e| ProcessError::Message(format!("{label} failed writing stdin: {e}")))?;
    }
    let _ = child.stdin.take();
    wait_output_with_timeout(child, label)
}
