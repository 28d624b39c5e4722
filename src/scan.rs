//! Per-log scan pipeline and the fleet-wide fold.

use chrono::{DateTime, Utc};
use std::fs;

use crate::collab::{ConfigResolver, LivenessProbe};
use crate::config::PolicyThresholds;
use crate::infer::{
    TimestampExtractor, classify_run, completed_run_duration, in_progress_duration,
    last_initiation, last_successful_initiation,
};
use crate::paths::lock_file_path;
use crate::policy::{evaluate, format_elapsed, seconds_since};
use crate::snapshot::{LogSnapshot, TailWindow, read_snapshot};
use crate::types::{
    DurationCheck, DurationResult, DurationSource, FullPaths, Initiation, LogIssue, LogStatus,
    RunOutcome, ScanTarget, Verdict, Violations,
};

#[path = "scan_pool.rs"]
mod scan_pool;

pub use scan_pool::{PoolOptions, scan_fleet};

/// Everything a single log scan needs. Shared read-only by all workers.
pub struct ScanContext {
    pub thresholds: PolicyThresholds,
    /// Captured once per invocation.
    pub now: DateTime<Utc>,
    pub window: TailWindow,
    pub extractor: TimestampExtractor,
    pub lock_file_name: String,
    pub resolver: Box<dyn ConfigResolver>,
    pub liveness: Box<dyn LivenessProbe>,
}

struct Draft {
    target: ScanTarget,
    status: LogStatus,
    outcome: RunOutcome,
    last: Initiation,
    last_ok: Initiation,
    duration: Option<DurationCheck>,
    issues: Vec<LogIssue>,
    full_paths: Option<FullPaths>,
    notes: Vec<String>,
}

impl Draft {
    fn new(target: &ScanTarget, status: LogStatus, outcome: RunOutcome) -> Self {
        Self {
            target: target.clone(),
            status,
            outcome,
            last: Initiation::Undetermined,
            last_ok: Initiation::Undetermined,
            duration: None,
            issues: Vec::new(),
            full_paths: None,
            notes: Vec::new(),
        }
    }

    fn issue(&mut self, issue: LogIssue) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }

    fn analyse_initiations(&mut self, ctx: &ScanContext, snapshot: &LogSnapshot) {
        self.last = last_initiation(snapshot.history(), &ctx.extractor);
        self.last_ok = last_successful_initiation(snapshot.history(), &ctx.extractor);
    }

    fn resolve_full_paths(&mut self, ctx: &ScanContext) {
        let (destination, remote_server) = match ctx.resolver.resolve(&self.target.config_path) {
            Ok(resolved) => {
                let dest = Some(resolved.backup_dest).filter(|d| !d.is_empty());
                let remote = Some(resolved.ssh_remote_server).filter(|r| !r.is_empty());
                (dest, remote)
            }
            Err(e) => {
                log::warn!("{}: {e}", self.target.config_path.display());
                (None, None)
            }
        };
        if destination.is_none() {
            self.issue(LogIssue::ConfigResolutionFailure);
        }
        self.full_paths = Some(FullPaths {
            config_path: self.target.config_path.clone(),
            destination,
            remote_server,
            log_path: self.target.log_path.clone(),
        });
    }

    fn finish(mut self, ctx: &ScanContext) -> Verdict {
        let analysed = matches!(
            self.status,
            LogStatus::Successful | LogStatus::Failed | LogStatus::InProgress
        );
        let violations = if analysed {
            evaluate(
                &ctx.thresholds,
                ctx.now,
                &self.last,
                &self.last_ok,
                self.duration.as_ref(),
            )
        } else {
            Violations::default()
        };
        if analysed {
            for initiation in [self.last.clone(), self.last_ok.clone()] {
                match initiation {
                    Initiation::Unparsable { .. } => self.issue(LogIssue::TimestampUnparsable),
                    Initiation::Undetermined => self.issue(LogIssue::InitiationUndetermined),
                    Initiation::At { .. } => {}
                }
            }
        }
        if let Some(DurationCheck {
            result: DurationResult::Undetermined { .. },
            ..
        }) = &self.duration
        {
            self.issue(LogIssue::DurationUndetermined);
        }
        let mut details = std::mem::take(&mut self.notes);
        details.extend(status_details(
            ctx,
            self.status,
            &violations,
            self.duration.as_ref(),
        ));
        log::debug!(
            "{}: status={} violations={:?} issues={:?}",
            self.target.log_path.display(),
            self.status.as_str(),
            violations,
            self.issues
        );
        Verdict {
            seconds_since_initiation: self.last.instant().map(|t| seconds_since(t, ctx.now)),
            target: self.target,
            status: self.status,
            outcome: self.outcome,
            last_initiation: self.last,
            last_successful_initiation: self.last_ok,
            duration: self.duration,
            violations,
            issues: self.issues,
            full_paths: self.full_paths,
            details,
        }
    }
}

fn staleness_detail(status: LogStatus, v: &Violations) -> Option<&'static str> {
    match (status, v.stale_initiation, v.stale_successful_initiation) {
        (LogStatus::Successful, true, _) => {
            Some("Backup appears to be successful. However, last backup was initiated too long ago.")
        }
        (LogStatus::Successful, false, true) => Some(
            "Backup appears to be successful. However, last successful backup was initiated too long ago.",
        ),
        (_, true, _) => Some("Last backup was initiated too long ago."),
        (_, false, true) => Some("Last successful backup was initiated too long ago."),
        _ => None,
    }
}

fn duration_detail(ctx: &ScanContext, check: &DurationCheck) -> String {
    let limit = format_elapsed(ctx.thresholds.max_duration_secs);
    match (&check.source, &check.result) {
        (DurationSource::Completed, DurationResult::Determined { seconds }) => format!(
            "Backup took too long : {} (limit {limit}).",
            format_elapsed(*seconds)
        ),
        (DurationSource::InProgress, DurationResult::Determined { seconds }) => format!(
            "Backup has been in progress for too long : {} (limit {limit}).",
            format_elapsed(*seconds)
        ),
        (DurationSource::Completed, DurationResult::Undetermined { reason }) => {
            format!("Unable to determine backup duration : {reason}.")
        }
        (DurationSource::InProgress, DurationResult::Undetermined { reason }) => {
            format!("Unable to determine how long the backup has been in progress : {reason}.")
        }
    }
}

fn status_details(
    ctx: &ScanContext,
    status: LogStatus,
    violations: &Violations,
    duration: Option<&DurationCheck>,
) -> Vec<String> {
    let mut out = Vec::new();
    match status {
        LogStatus::Empty => out.push("WARNING! : Backup log is empty.".to_string()),
        LogStatus::Unreadable => {
            out.push("WARNING! : Backup log is unable to be opened for examination.".to_string())
        }
        LogStatus::InProgress => out.push("Backup is currently in progress.".to_string()),
        LogStatus::Successful | LogStatus::Failed | LogStatus::TimedOut => {}
    }
    match staleness_detail(status, violations) {
        Some(msg) => out.push(msg.to_string()),
        None if status == LogStatus::Successful => {
            out.push("Backup appears to be successful.".to_string())
        }
        None => {}
    }
    if violations.over_duration
        && let Some(check) = duration
    {
        out.push(duration_detail(ctx, check));
    }
    if status == LogStatus::Failed {
        out.push("Backup log indicates error:".to_string());
    }
    out
}

/// Runs the whole inference pipeline for one log.
pub fn scan_log(ctx: &ScanContext, target: &ScanTarget) -> Verdict {
    let snapshot = match read_snapshot(&target.log_path, ctx.window) {
        Ok(s) => s,
        Err(e) => {
            log::debug!("{e}");
            return unreadable_log(ctx, target, e.to_string());
        }
    };
    match classify_run(snapshot.tail()) {
        RunOutcome::Empty => {
            let mut draft = Draft::new(target, LogStatus::Empty, RunOutcome::Empty);
            draft.issue(LogIssue::LogEmpty);
            draft.resolve_full_paths(ctx);
            draft.finish(ctx)
        }
        RunOutcome::Success => successful_run(ctx, target, &snapshot),
        RunOutcome::ErrorTail { lines } => error_tail(ctx, target, &snapshot, lines),
        RunOutcome::Unreadable { reason } => unreadable_log(ctx, target, reason),
    }
}

fn unreadable_log(ctx: &ScanContext, target: &ScanTarget, reason: String) -> Verdict {
    let mut draft = Draft::new(
        target,
        LogStatus::Unreadable,
        RunOutcome::Unreadable { reason },
    );
    draft.issue(LogIssue::LogUnreadable);
    draft.resolve_full_paths(ctx);
    draft.finish(ctx)
}

fn successful_run(ctx: &ScanContext, target: &ScanTarget, snapshot: &LogSnapshot) -> Verdict {
    let mut draft = Draft::new(target, LogStatus::Successful, RunOutcome::Success);
    draft.duration = Some(DurationCheck {
        source: DurationSource::Completed,
        result: completed_run_duration(snapshot.tail()),
    });
    draft.analyse_initiations(ctx, snapshot);
    draft.finish(ctx)
}

fn error_tail(
    ctx: &ScanContext,
    target: &ScanTarget,
    snapshot: &LogSnapshot,
    lines: Vec<String>,
) -> Verdict {
    let lock_path = lock_file_path(&target.config_path, &ctx.lock_file_name);
    let lock_present = lock_path.is_file();
    let running =
        lock_present && ctx.liveness.is_running(&target.config_path.to_string_lossy());
    let status = if running {
        LogStatus::InProgress
    } else {
        LogStatus::Failed
    };
    let mut draft = Draft::new(target, status, RunOutcome::ErrorTail { lines });
    draft.analyse_initiations(ctx, snapshot);
    if running {
        let result = match fs::read_to_string(&lock_path) {
            Ok(text) => {
                let r = in_progress_duration(&text, ctx.now);
                if r.seconds().is_none() {
                    draft.issue(LogIssue::LockTimestampInvalid);
                }
                r
            }
            Err(e) => {
                draft.issue(LogIssue::LockFileUnreadable);
                DurationResult::undetermined(format!("lock file unreadable: {e}"))
            }
        };
        log::debug!("{}: in progress, duration {:?}", target.log_path.display(), result);
        draft.duration = Some(DurationCheck {
            source: DurationSource::InProgress,
            result,
        });
    } else if lock_present {
        draft.notes.push(format!(
            "WARNING! : Lock file present but no running backup process was found : {}",
            lock_path.display()
        ));
    }
    draft.resolve_full_paths(ctx);
    draft.finish(ctx)
}

/// Verdict for a log whose scan was abandoned.
pub fn timed_out_log(ctx: &ScanContext, target: &ScanTarget, reason: String) -> Verdict {
    let mut draft = Draft::new(
        target,
        LogStatus::TimedOut,
        RunOutcome::Unreadable {
            reason: reason.clone(),
        },
    );
    draft.issue(LogIssue::ScanTimedOut);
    draft.notes.push(format!("ERROR! : Scan of this backup log was abandoned : {reason}"));
    draft.finish(ctx)
}
