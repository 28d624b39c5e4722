use chrono::{DateTime, Utc};

use crate::types::DurationResult;

use super::{ELAPSED_LABEL, ELAPSED_UNAVAILABLE};

pub const REASON_FIELD_INVALID: &str = "duration field missing or invalid";
pub const REASON_LOCK_START_INVALID: &str = "lock file start time missing or invalid";
pub const REASON_LOCK_START_NOT_PAST: &str = "lock file start time is not in the past";

/// Duration of a finished run, read from the elapsed-seconds line the backup
/// writes two lines above the success marker.
pub fn completed_run_duration(tail: &[String]) -> DurationResult {
    let Some(idx) = tail.len().checked_sub(3) else {
        return DurationResult::undetermined(REASON_FIELD_INVALID);
    };
    match parse_elapsed_line(&tail[idx]) {
        Some(seconds) => DurationResult::Determined { seconds },
        None => {
            log::debug!("elapsed line rejected: '{}'", tail[idx]);
            DurationResult::undetermined(REASON_FIELD_INVALID)
        }
    }
}

/// `Time elapsed in seconds : 120` -> `Some(120)`. Zero, non-numeric values and
/// the tool's own "unable to calculate" warning are rejected.
pub fn parse_elapsed_line(line: &str) -> Option<u64> {
    let text = line.trim();
    if text.contains(ELAPSED_UNAVAILABLE) {
        return None;
    }
    let rest = text.strip_prefix(ELAPSED_LABEL)?;
    let value = rest.split_whitespace().last()?.parse::<u64>().ok()?;
    (value > 0).then_some(value)
}

/// Epoch seconds recorded after the label on the first line of a lock file,
/// e.g. `Backup started (epoch seconds) : 1706745600`.
pub fn parse_lock_start_epoch(lock_text: &str) -> Option<i64> {
    let first = lock_text.lines().next()?;
    let (label, value) = first.rsplit_once(':')?;
    if label.trim().is_empty() {
        return None;
    }
    value.trim().parse::<i64>().ok()
}

/// How long a still-running job has been going, from its lock file contents.
pub fn in_progress_duration(lock_text: &str, now: DateTime<Utc>) -> DurationResult {
    let Some(started) = parse_lock_start_epoch(lock_text) else {
        return DurationResult::undetermined(REASON_LOCK_START_INVALID);
    };
    let Some(elapsed) = now.timestamp().checked_sub(started) else {
        return DurationResult::undetermined(REASON_LOCK_START_INVALID);
    };
    if elapsed <= 0 {
        return DurationResult::undetermined(REASON_LOCK_START_NOT_PAST);
    }
    DurationResult::Determined {
        seconds: elapsed as u64,
    }
}
