use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

use crate::config::PolicyThresholds;
use crate::error::{ScanError, ScanResult};
use crate::paths::display_file_name;
use crate::policy::format_elapsed;
use crate::types::{LogStatus, RunOutcome, Summary, Verdict};

const RULE_WIDTH: usize = 72;
const UNRESOLVED_DESTINATION: &str = "ERROR! : Unable to determine backup destination path, \
     manual inspection of the configuration file is required.";

/// Machine-readable form of a whole scan.
#[derive(Debug, Serialize)]
pub struct ScanReport<'a> {
    pub scanned_at: DateTime<Utc>,
    pub thresholds: PolicyThresholds,
    pub verdicts: &'a [Verdict],
    pub summary: Summary,
}

impl ScanReport<'_> {
    pub fn to_json(&self) -> ScanResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ScanError::json("scan report serialize", e))
    }
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn full_path_section(out: &mut String, verdict: &Verdict) {
    let target = &verdict.target;
    let _ = writeln!(
        out,
        "       Configuration path : {}",
        target.config_path.display()
    );
    if let Some(paths) = &verdict.full_paths {
        let dest = paths.destination.as_deref().unwrap_or(UNRESOLVED_DESTINATION);
        let _ = writeln!(out, "         Destination path : {dest}");
        if let Some(remote) = &paths.remote_server {
            let _ = writeln!(out, "            Remote server : {remote}");
        }
    }
    let _ = writeln!(out, "                 Log path : {}", target.log_path.display());
}

fn initiation_section(out: &mut String, verdict: &Verdict) {
    let last = &verdict.last_initiation;
    if last.is_determined() {
        let _ = writeln!(out, "Backup initiated at : {}", last.raw().unwrap_or(""));
    } else {
        let _ = writeln!(
            out,
            "Backup initiated at : Unable to determine from information within the log file."
        );
    }
    if verdict.violations.stale_initiation
        && let Some(secs) = verdict.seconds_since_initiation
    {
        let _ = writeln!(
            out,
            "                      {} ago",
            format_elapsed(secs.max(0) as u64)
        );
    }
}

/// Human-readable section for one log.
pub fn render_verdict(verdict: &Verdict) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(
        out,
        "Inspecting most recent backup log {}",
        display_file_name(&verdict.target.log_path)
    );
    if verdict.status != LogStatus::Successful {
        full_path_section(&mut out, verdict);
    }
    if matches!(
        verdict.status,
        LogStatus::Successful | LogStatus::Failed | LogStatus::InProgress
    ) {
        initiation_section(&mut out, verdict);
    }
    for line in &verdict.details {
        let _ = writeln!(out, "{line}");
    }
    if verdict.status == LogStatus::Failed
        && let RunOutcome::ErrorTail { lines } = &verdict.outcome
    {
        for line in lines {
            let _ = writeln!(out, "\t{line}");
        }
    }
    out
}

pub fn render_summary(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(
        out,
        "Summary : {} log files scanned. {} logs with errors. {} backups in progress.",
        summary.logs_scanned, summary.logs_with_errors, summary.logs_in_progress
    );
    let paragraphs = [
        (
            summary.stale_initiations,
            "have not been initiated recently\n          enough to comply with specified limits.",
        ),
        (
            summary.stale_successful_initiations,
            "have not completed successfully recently\n          enough to comply with specified limits.",
        ),
        (
            summary.over_duration,
            "ran longer than the duration limit or could\n          not be checked against it.",
        ),
    ];
    for (count, text) in paragraphs {
        if count > 0 {
            let _ = writeln!(out);
            let _ = writeln!(out, "          A total of {count} backup(s) {text}");
            let _ = writeln!(out);
        }
    }
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out);
    let _ = writeln!(out);
    out
}

pub fn render_text(verdicts: &[Verdict], summary: &Summary) -> String {
    let mut out: String = verdicts.iter().map(render_verdict).collect();
    out.push_str(&render_summary(summary));
    out
}
