use chrono::{DateTime, Utc};
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const APP_NAME: &str = "backupscan";
pub const APP_DESC: &str = "Scan backup logs and flag failed, stale or overlong runs";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_LOG_LIST: &str = "backuploglist.txt";
pub const DEFAULT_CONFIG_LIST: &str = "backupconfiglist.txt";
pub const DEFAULT_HOST_LIST: &str = "host_list.txt";

/// 86400 seconds is one day, 604800 one week.
pub const DEFAULT_MAX_INITIATION_STALENESS_SECS: u64 = 604_800;
pub const DEFAULT_MAX_DURATION_SECS: u64 = 151_200;
pub const DEFAULT_TAIL_LINES: usize = 50;
pub const DEFAULT_HISTORY_LINES: usize = 5_000;
pub const DEFAULT_TIME_FORMATS: &str = "%Y-%m-%d %H:%M:%S;%a %b %e %H:%M:%S %Y";
pub const DEFAULT_LOCK_FILE_NAME: &str = "lbackup_in_progress.lock";
pub const DEFAULT_LIVENESS_CMD: &str = "pgrep -f";
pub const DEFAULT_LBACKUP_BIN: &str = "/usr/local/sbin/lbackup";
pub const DEFAULT_CMD_TIMEOUT_SECS: usize = 30;
pub const DEFAULT_LOG_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_WORKERS: usize = 4;

/// Zone applied to timestamps whose format carries no UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZoneMode {
    Local,
    Utc,
}

impl TimeZoneMode {
    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("utc") {
            TimeZoneMode::Utc
        } else {
            TimeZoneMode::Local
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyThresholds {
    pub max_initiation_staleness_secs: u64,
    pub max_duration_secs: u64,
}

/// Process-level configuration snapshot.
///
/// Loaded once at startup; command-line flags derive per-invocation values
/// from it but never write back.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub thresholds: PolicyThresholds,
    pub tail_lines: usize,
    pub history_lines: usize,
    pub time_formats: Vec<String>,
    pub time_zone: TimeZoneMode,
    pub lock_file_name: String,
    pub liveness_cmd: String,
    pub shell: String,
    pub ssh: String,
    pub lbackup_bin: String,
    pub cmd_timeout_secs: usize,
    pub log_timeout_secs: u64,
    pub workers: usize,
    pub journal: Option<PathBuf>,
    pub now_override: Option<DateTime<Utc>>,
}

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub fn split_time_formats(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn resolve_now_override() -> Option<DateTime<Utc>> {
    let raw = env::var("BACKUPSCAN_NOW").ok()?;
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(v) => Some(v.with_timezone(&Utc)),
        Err(e) => {
            log::warn!("ignoring BACKUPSCAN_NOW='{raw}': {e}");
            None
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let tail_lines = env_usize("BACKUPSCAN_TAIL_LINES", DEFAULT_TAIL_LINES).max(1);
        let mut time_formats = split_time_formats(&env_string(
            "BACKUPSCAN_TIME_FORMATS",
            DEFAULT_TIME_FORMATS,
        ));
        if time_formats.is_empty() {
            time_formats = split_time_formats(DEFAULT_TIME_FORMATS);
        }
        Self {
            thresholds: PolicyThresholds {
                max_initiation_staleness_secs: env_u64(
                    "BACKUPSCAN_MAX_INITIATION_SECS",
                    DEFAULT_MAX_INITIATION_STALENESS_SECS,
                ),
                max_duration_secs: env_u64(
                    "BACKUPSCAN_MAX_DURATION_SECS",
                    DEFAULT_MAX_DURATION_SECS,
                ),
            },
            tail_lines,
            history_lines: env_usize("BACKUPSCAN_HISTORY_LINES", DEFAULT_HISTORY_LINES)
                .max(tail_lines),
            time_formats,
            time_zone: TimeZoneMode::parse(&env_string("BACKUPSCAN_TIMEZONE", "local")),
            lock_file_name: env_string("BACKUPSCAN_LOCK_FILE", DEFAULT_LOCK_FILE_NAME),
            liveness_cmd: env_string("BACKUPSCAN_LIVENESS_CMD", DEFAULT_LIVENESS_CMD),
            shell: env_string("BACKUPSCAN_SHELL", "bash"),
            ssh: env_string("BACKUPSCAN_SSH", "ssh"),
            lbackup_bin: env_string("BACKUPSCAN_LBACKUP_BIN", DEFAULT_LBACKUP_BIN),
            cmd_timeout_secs: env_usize("BACKUPSCAN_CMD_TIMEOUT_SECS", DEFAULT_CMD_TIMEOUT_SECS)
                .max(1),
            log_timeout_secs: env_u64("BACKUPSCAN_LOG_TIMEOUT_SECS", DEFAULT_LOG_TIMEOUT_SECS),
            workers: env_usize("BACKUPSCAN_WORKERS", DEFAULT_WORKERS).max(1),
            journal: env::var_os("BACKUPSCAN_JOURNAL")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            now_override: resolve_now_override(),
        }
    }
}

pub fn app_config() -> &'static AppConfig {
    APP_CONFIG.get_or_init(AppConfig::from_env)
}
