use std::path::Path;
use std::process::Command;

use crate::process::{
    run_command_status_with_timeout, run_command_streaming,
    run_command_with_stdin_output_with_timeout, ssh_timeout_secs,
};
use crate::types::ResolvedConfig;

/// Turns a backup configuration file into the values it defines.
pub trait ConfigResolver: Send + Sync {
    fn resolve(&self, config_path: &Path) -> Result<ResolvedConfig, String>;
}

/// Reports whether a backup process for a job is currently running.
pub trait LivenessProbe: Send + Sync {
    fn is_running(&self, job_id: &str) -> bool;
}

/// Runs a command on a remote host, passing its output straight through.
pub trait HostDispatcher {
    fn dispatch(&self, address: &str, command: &str) -> Result<(), String>;
}

pub fn parse_words(input: &str) -> Vec<String> {
    match shell_words::split(input) {
        Ok(v) => v,
        Err(_) => input
            .split_whitespace()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Sources the configuration in a shell and reads the variables back.
#[derive(Debug, Clone)]
pub struct ShellConfigResolver {
    shell: String,
}

impl ShellConfigResolver {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    fn script(config_path: &Path) -> String {
        let quoted = shell_words::quote(&config_path.to_string_lossy()).to_string();
        format!(
            "source {quoted} >/dev/null 2>&1\n\
             printf '%s\\0' \"${{backupDest}}\" \"${{sshRemoteServer}}\" \"${{log_fileName}}\" \"${{backupSource}}\"\n"
        )
    }
}

impl ConfigResolver for ShellConfigResolver {
    fn resolve(&self, config_path: &Path) -> Result<ResolvedConfig, String> {
        if !config_path.is_file() {
            return Err(format!(
                "configuration file not found: {}",
                config_path.display()
            ));
        }
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-s");
        let label = format!("{} source {}", self.shell, config_path.display());
        let script = Self::script(config_path);
        let output = run_command_with_stdin_output_with_timeout(cmd, &script, &label)
            .map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(format!(
                "{label} exited with {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let fields: Vec<&str> = text.split('\0').collect();
        if fields.len() < 4 {
            return Err(format!("{label} produced unexpected output"));
        }
        Ok(ResolvedConfig {
            backup_dest: fields[0].trim().to_string(),
            ssh_remote_server: fields[1].trim().to_string(),
            log_file_name: fields[2].trim().to_string(),
            backup_source: fields[3].trim().to_string(),
        })
    }
}

/// Runs a process-matching command with the job id appended; exit status 0
/// means a matching process exists.
#[derive(Debug, Clone)]
pub struct CommandLivenessProbe {
    argv: Vec<String>,
}

impl CommandLivenessProbe {
    pub fn new(command: &str) -> Self {
        Self {
            argv: parse_words(command),
        }
    }
}

impl LivenessProbe for CommandLivenessProbe {
    fn is_running(&self, job_id: &str) -> bool {
        let Some((program, args)) = self.argv.split_first() else {
            return false;
        };
        let mut cmd = Command::new(program);
        cmd.args(args).arg(job_id);
        match run_command_status_with_timeout(cmd, &format!("liveness {program}")) {
            Ok(status) => status.success(),
            Err(e) if e.is_timeout() => {
                log::warn!("liveness check for {job_id} gave up: {e}");
                false
            }
            Err(e) => {
                log::warn!("liveness check for {job_id} failed: {e}");
                false
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SshDispatcher {
    program: String,
}

impl SshDispatcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl HostDispatcher for SshDispatcher {
    fn dispatch(&self, address: &str, command: &str) -> Result<(), String> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(address).arg(command);
        let label = format!("ssh {address}");
        let status =
            run_command_streaming(cmd, &label, ssh_timeout_secs()).map_err(|e| e.to_string())?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{label} exited with {}", status.code().unwrap_or(-1)))
        }
    }
}
