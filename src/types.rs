use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Terminal state observed at the end of a log tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    ErrorTail { lines: Vec<String> },
    Empty,
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DurationResult {
    Determined { seconds: u64 },
    Undetermined { reason: String },
}

impl DurationResult {
    pub fn undetermined(reason: impl Into<String>) -> Self {
        DurationResult::Undetermined {
            reason: reason.into(),
        }
    }

    pub fn seconds(&self) -> Option<u64> {
        match self {
            DurationResult::Determined { seconds } => Some(*seconds),
            DurationResult::Undetermined { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    /// Read from the elapsed-seconds line of a finished run.
    Completed,
    /// Derived from the start epoch in a running job's lock file.
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DurationCheck {
    pub source: DurationSource,
    pub result: DurationResult,
}

/// Start of a run as recovered from the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Initiation {
    At { raw: String, instant: DateTime<Utc> },
    /// A start record was found but its timestamp line did not parse.
    Unparsable { raw: String },
    /// Every candidate record was a lock-contention notice, or none existed.
    Undetermined,
}

impl Initiation {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Initiation::At { instant, .. } => Some(*instant),
            _ => None,
        }
    }

    pub fn is_determined(&self) -> bool {
        !matches!(self, Initiation::Undetermined)
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            Initiation::At { raw, .. } | Initiation::Unparsable { raw } => Some(raw),
            Initiation::Undetermined => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Violations {
    pub stale_initiation: bool,
    pub stale_successful_initiation: bool,
    pub over_duration: bool,
}

impl Violations {
    pub fn any(&self) -> bool {
        self.stale_initiation || self.stale_successful_initiation || self.over_duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Successful,
    Failed,
    InProgress,
    Empty,
    Unreadable,
    TimedOut,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Successful => "successful",
            LogStatus::Failed => "failed",
            LogStatus::InProgress => "in_progress",
            LogStatus::Empty => "empty",
            LogStatus::Unreadable => "unreadable",
            LogStatus::TimedOut => "timed_out",
        }
    }

    /// Statuses that are an error on their own, before any policy check.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            LogStatus::Failed | LogStatus::Empty | LogStatus::Unreadable | LogStatus::TimedOut
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogIssue {
    LogUnreadable,
    LogEmpty,
    TimestampUnparsable,
    InitiationUndetermined,
    DurationUndetermined,
    LockFileUnreadable,
    LockTimestampInvalid,
    ConfigResolutionFailure,
    ScanTimedOut,
}

/// One backup job to inspect: a log and the configuration that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanTarget {
    pub index: usize,
    pub log_path: PathBuf,
    pub config_path: PathBuf,
}

/// Values a backup configuration file resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    pub backup_dest: String,
    pub ssh_remote_server: String,
    pub log_file_name: String,
    pub backup_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullPaths {
    pub config_path: PathBuf,
    /// `None` when the configuration could not be resolved.
    pub destination: Option<String>,
    pub remote_server: Option<String>,
    pub log_path: PathBuf,
}

/// Per-log result of one scan. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub target: ScanTarget,
    pub status: LogStatus,
    pub outcome: RunOutcome,
    pub last_initiation: Initiation,
    pub last_successful_initiation: Initiation,
    pub seconds_since_initiation: Option<i64>,
    pub duration: Option<DurationCheck>,
    pub violations: Violations,
    pub issues: Vec<LogIssue>,
    pub full_paths: Option<FullPaths>,
    pub details: Vec<String>,
}

impl Verdict {
    /// Contribution of this verdict to the fleet error counter.
    ///
    /// At most one for the run itself (failure status, overlong run or stale
    /// initiation) plus one when the last successful run is stale, so a single
    /// log may count twice.
    pub fn error_tally(&self) -> usize {
        let primary = self.status.is_failure()
            || self.violations.over_duration
            || self.violations.stale_initiation;
        usize::from(primary) + usize::from(self.violations.stale_successful_initiation)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub logs_scanned: usize,
    pub logs_with_errors: usize,
    pub logs_in_progress: usize,
    pub stale_initiations: usize,
    pub stale_successful_initiations: usize,
    pub over_duration: usize,
}

impl Summary {
    pub fn fold(&mut self, verdict: &Verdict) {
        self.logs_scanned += 1;
        self.logs_with_errors += verdict.error_tally();
        if verdict.status == LogStatus::InProgress {
            self.logs_in_progress += 1;
        }
        if verdict.violations.stale_initiation {
            self.stale_initiations += 1;
        }
        if verdict.violations.stale_successful_initiation {
            self.stale_successful_initiations += 1;
        }
        if verdict.violations.over_duration {
            self.over_duration += 1;
        }
    }
}
