use crate::types::Initiation;

use super::SUCCESS_MARKER;
use super::infer_blocks::{LogRecord, Records, nth_marker_from_end};
use super::infer_timestamp::TimestampExtractor;

/// Start of the most recent genuine run in `lines`.
///
/// Records written by a run that stopped on a held configuration lock are
/// skipped, since their timestamp is only the time of the lock check. A lone
/// record is taken as is.
pub fn last_initiation(lines: &[String], extractor: &TimestampExtractor) -> Initiation {
    let records = Records::split(lines);
    if records.is_empty() {
        log::debug!("initiation scan: no run records in window");
        return Initiation::Undetermined;
    }
    let candidate = if records.len() == 1 {
        records.nth_from_end(0)
    } else {
        records.last_matching(|r| !r.is_lock_notice())
    };
    if log::log_enabled!(log::Level::Debug) {
        let skipped = records.iter_rev().take_while(|r| r.is_lock_notice()).count();
        log::debug!(
            "initiation scan: {} records, {} trailing lock notices skipped",
            records.len(),
            skipped
        );
    }
    match candidate {
        Some(record) => {
            log::debug!("initiation taken from record at line {}", record.separator_at());
            initiation_of(record, extractor)
        }
        None => Initiation::Undetermined,
    }
}

/// Start of the most recent run that finished successfully.
pub fn last_successful_initiation(lines: &[String], extractor: &TimestampExtractor) -> Initiation {
    last_initiation(successful_run_window(lines), extractor)
}

/// Lines belonging to the run that ended at the last success marker.
///
/// Spans from just after the second-to-last marker up to and including the
/// last one. Without any marker the whole window is searched.
pub fn successful_run_window(lines: &[String]) -> &[String] {
    let Some(last) = nth_marker_from_end(lines, SUCCESS_MARKER, 1) else {
        return lines;
    };
    let start = nth_marker_from_end(lines, SUCCESS_MARKER, 2)
        .map(|i| i + 1)
        .unwrap_or(0);
    &lines[start..=last]
}

fn initiation_of(record: &LogRecord<'_>, extractor: &TimestampExtractor) -> Initiation {
    let raw = record.start_line().unwrap_or("").trim().to_string();
    match extractor.parse(&raw) {
        Some(instant) => Initiation::At { raw, instant },
        None => {
            log::debug!("initiation timestamp did not parse: '{raw}'");
            Initiation::Unparsable { raw }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeZoneMode;
    use crate::infer::{SEPARATOR, SUCCESS_MARKER};

    const LOCK: &str = "ERROR! : Backup configuration lock file present : /etc/lbackup/a/lbackup.lock";

    fn extractor() -> TimestampExtractor {
        TimestampExtractor::new(vec!["%Y-%m-%d %H:%M:%S".to_string()], TimeZoneMode::Utc)
    }

    fn genuine(ts: &str) -> Vec<String> {
        vec![
            SEPARATOR.to_string(),
            ts.to_string(),
            "Backup Started".to_string(),
            "rsync output".to_string(),
        ]
    }

    fn lock_notice(ts: &str) -> Vec<String> {
        vec![SEPARATOR.to_string(), ts.to_string(), LOCK.to_string()]
    }

    fn raw_of(i: &Initiation) -> Option<String> {
        i.raw().map(ToOwned::to_owned)
    }

    #[test]
    fn skips_any_number_of_trailing_lock_notices() {
        let total = 5;
        for n in 0..total {
            let mut log = Vec::new();
            for k in 0..(total - n) {
                log.extend(genuine(&format!("2024-02-0{} 00:00:00", k + 1)));
            }
            for _ in 0..n {
                log.extend(lock_notice("2024-03-01 00:00:00"));
            }
            let got = last_initiation(&log, &extractor());
            let expected = format!("2024-02-0{} 00:00:00", total - n);
            assert_eq!(raw_of(&got), Some(expected), "n = {n}");
        }
    }

    #[test]
    fn all_lock_notices_is_undetermined() {
        let mut log = lock_notice("2024-03-01 00:00:00");
        log.extend(lock_notice("2024-03-02 00:00:00"));
        assert_eq!(last_initiation(&log, &extractor()), Initiation::Undetermined);
    }

    #[test]
    fn single_record_is_used_even_when_it_is_a_lock_notice() {
        let log = lock_notice("2024-03-01 00:00:00");
        let got = last_initiation(&log, &extractor());
        assert_eq!(raw_of(&got).as_deref(), Some("2024-03-01 00:00:00"));
        assert!(got.instant().is_some());
    }

    #[test]
    fn no_records_is_undetermined() {
        let log = vec!["rsync: connection refused".to_string()];
        let got = last_initiation(&log, &extractor());
        assert!(!got.is_determined());
    }

    #[test]
    fn two_lock_notices_over_genuine_start() {
        let mut log = genuine("2024-02-01 00:00:00");
        log.push(SUCCESS_MARKER.to_string());
        log.extend(lock_notice("2024-02-02 00:00:00"));
        log.extend(lock_notice("2024-02-03 00:00:00"));
        let got = last_initiation(&log, &extractor());
        assert_eq!(raw_of(&got).as_deref(), Some("2024-02-01 00:00:00"));
        assert_eq!(
            got.instant().map(|t| t.to_rfc3339()),
            Some("2024-02-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn unparsable_start_is_determined_without_instant() {
        let log = genuine("last tuesday");
        let got = last_initiation(&log, &extractor());
        assert_eq!(
            got,
            Initiation::Unparsable {
                raw: "last tuesday".to_string()
            }
        );
        assert!(got.is_determined());
        assert!(got.instant().is_none());
    }

    #[test]
    fn failing_run_does_not_shadow_previous_success() {
        let mut log = genuine("2024-01-01 00:00:00");
        log.push(SUCCESS_MARKER.to_string());
        log.extend(genuine("2024-01-02 00:00:00"));
        log.push(SUCCESS_MARKER.to_string());
        log.extend(genuine("2024-01-03 00:00:00"));
        log.push("rsync: connection refused".to_string());
        let ok = last_successful_initiation(&log, &extractor());
        assert_eq!(raw_of(&ok).as_deref(), Some("2024-01-02 00:00:00"));
        let any = last_initiation(&log, &extractor());
        assert_eq!(raw_of(&any).as_deref(), Some("2024-01-03 00:00:00"));
    }

    #[test]
    fn successful_window_bounds() {
        let mut log = genuine("2024-01-01 00:00:00");
        log.push(SUCCESS_MARKER.to_string());
        let one = successful_run_window(&log);
        assert_eq!(one.len(), log.len());
        log.extend(genuine("2024-01-02 00:00:00"));
        log.push(SUCCESS_MARKER.to_string());
        let two = successful_run_window(&log);
        assert_eq!(two.first().map(String::as_str), Some(SEPARATOR));
        assert_eq!(two.len(), 5);
        let none = vec!["x".to_string()];
        assert_eq!(successful_run_window(&none).len(), 1);
    }
}
