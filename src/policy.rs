use chrono::{DateTime, Utc};

use crate::config::PolicyThresholds;
use crate::types::{DurationCheck, DurationResult, Initiation, Violations};

/// A missing start time is always a violation; being exactly at the limit is
/// not.
pub fn violates_staleness(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_staleness_secs: u64,
) -> bool {
    match last {
        Some(at) => i128::from(seconds_since(at, now)) > i128::from(max_staleness_secs),
        None => true,
    }
}

/// An undetermined duration is always a violation.
pub fn violates_duration(result: &DurationResult, max_duration_secs: u64) -> bool {
    match result {
        DurationResult::Determined { seconds } => *seconds > max_duration_secs,
        DurationResult::Undetermined { .. } => true,
    }
}

pub fn seconds_since(at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.timestamp() - at.timestamp()
}

/// Flags for one log, computed only from the values handed in.
pub fn evaluate(
    thresholds: &PolicyThresholds,
    now: DateTime<Utc>,
    last: &Initiation,
    last_successful: &Initiation,
    duration: Option<&DurationCheck>,
) -> Violations {
    let max_age = thresholds.max_initiation_staleness_secs;
    Violations {
        stale_initiation: violates_staleness(last.instant(), now, max_age),
        stale_successful_initiation: violates_staleness(last_successful.instant(), now, max_age),
        over_duration: duration
            .map(|d| violates_duration(&d.result, thresholds.max_duration_secs))
            .unwrap_or(false),
    }
}

/// `3 days, 4 hours, 5 minutes`
pub fn format_elapsed(secs: u64) -> String {
    let mm = secs / 60;
    let (hh, mm) = (mm / 60, mm % 60);
    let (dd, hh) = (hh / 24, hh % 24);
    format!("{dd} days, {hh} hours, {mm} minutes")
}
