#![allow(dead_code)]

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const SEPARATOR: &str = "##################";
pub const SUCCESS_MARKER: &str = "Backup Completed Successfully";
pub const LOCK_NOTICE: &str =
    "ERROR! : Backup configuration lock file present : /etc/lbackup/lbackup_in_progress.lock";

/// Scratch area for one test: backup job directories, path lists and mock
/// executables that shadow the real ones on `PATH`.
pub struct Workspace {
    dir: TempDir,
    pub root: PathBuf,
    pub mock_bin: PathBuf,
    original_path: String,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("backupscan-it-")
            .tempdir()
            .expect("create temp workspace");
        let root = dir.path().join("work");
        let mock_bin = dir.path().join("mockbin");
        fs::create_dir_all(&root).expect("create work dir");
        fs::create_dir_all(&mock_bin).expect("create mock bin dir");
        let me = Self {
            dir,
            root,
            mock_bin,
            original_path: std::env::var("PATH").unwrap_or_default(),
        };
        me.write_mock("pgrep", "#!/bin/sh\nexit 1\n");
        me
    }

    pub fn write_mock(&self, name: &str, body: &str) {
        let p = self.mock_bin.join(name);
        fs::write(&p, body).expect("write mock");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&p).expect("mock metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&p, perms).expect("set mock executable");
        }
    }

    /// Creates `<root>/<name>/backup.conf` and `<root>/<name>/backup.log`.
    /// Returns `(log_path, config_path)`.
    pub fn add_job(&self, name: &str, log_lines: &[String]) -> (PathBuf, PathBuf) {
        let job_dir = self.root.join(name);
        fs::create_dir_all(&job_dir).expect("create job dir");
        let config = job_dir.join("backup.conf");
        fs::write(
            &config,
            format!(
                "backupDest=\"/backups/{name}\"\nsshRemoteServer=\"\"\nlog_fileName=\"backup.log\"\nbackupSource=\"/srv/{name}\"\n"
            ),
        )
        .expect("write config");
        let log = job_dir.join("backup.log");
        let mut body = log_lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        fs::write(&log, body).expect("write log");
        (log, config)
    }

    pub fn write_lock(&self, config: &Path, text: &str) {
        let lock = config
            .parent()
            .expect("config dir")
            .join("lbackup_in_progress.lock");
        fs::write(lock, text).expect("write lock");
    }

    pub fn write_lists(&self, jobs: &[(PathBuf, PathBuf)]) {
        let mut logs = String::new();
        let mut confs = String::new();
        for (log, conf) in jobs {
            logs.push_str(&format!("{}\n", log.display()));
            confs.push_str(&format!("{}\n", conf.display()));
        }
        fs::write(self.root.join("backuploglist.txt"), logs).expect("write log list");
        fs::write(self.root.join("backupconfiglist.txt"), confs).expect("write config list");
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.run_with_env(args, &[])
    }

    pub fn run_with_env(&self, args: &[&str], envs: &[(&str, &str)]) -> Output {
        let path = format!("{}:{}", self.mock_bin.display(), self.original_path);
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_backupscan"));
        cmd.args(args)
            .current_dir(&self.root)
            .env("PATH", path)
            .env("BACKUPSCAN_TIMEZONE", "utc")
            .env("BACKUPSCAN_NOW", "2024-03-10T12:00:00Z")
            .env_remove("BACKUPSCAN_JOURNAL")
            .env_remove("BACKUPSCAN_TIMEOUT_SSH_SECS")
            .env_remove("RUST_LOG");
        for (k, v) in envs {
            cmd.env(k, v);
        }
        cmd.output().expect("run backupscan command")
    }
}

/// One complete, successful run record.
pub fn successful_run(start: &str, elapsed: u64) -> Vec<String> {
    vec![
        SEPARATOR.to_string(),
        start.to_string(),
        "Backup Started".to_string(),
        "rsync: 1200 files transferred".to_string(),
        format!("Time elapsed in seconds : {elapsed}"),
        "Post action scripts completed".to_string(),
        SUCCESS_MARKER.to_string(),
    ]
}

pub fn stdout_str(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

pub fn stderr_str(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

pub fn parse_jsonl(path: &Path) -> Vec<Value> {
    let text =
        fs::read_to_string(path).unwrap_or_else(|_| panic!("read jsonl: {}", path.display()));
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| serde_json::from_str::<Value>(line).expect("valid json line"))
        .collect()
}
