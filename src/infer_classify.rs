use crate::types::RunOutcome;

use super::SUCCESS_MARKER;

/// Classifies the cleaned tail (blank lines already removed).
///
/// `Unreadable` is never produced here; it comes from the snapshot reader when
/// the log cannot be opened at all.
pub fn classify_run(tail: &[String]) -> RunOutcome {
    match tail.last() {
        None => RunOutcome::Empty,
        Some(last) if is_success_marker(last) => RunOutcome::Success,
        Some(_) => RunOutcome::ErrorTail {
            lines: tail.to_vec(),
        },
    }
}

pub fn is_success_marker(line: &str) -> bool {
    line.trim() == SUCCESS_MARKER
}
