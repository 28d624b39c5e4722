use super::{LOCK_NOTICE_PREFIX, SEPARATOR};

/// Lines following the start line that may carry a lock-contention notice.
const LOCK_NOTICE_WINDOW: usize = 2;

/// One run record: the lines between a separator and the next separator (or
/// the end of the scanned window).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord<'a> {
    separator_at: usize,
    lines: &'a [String],
}

impl<'a> LogRecord<'a> {
    /// Index of the separator line that opens this record.
    pub fn separator_at(&self) -> usize {
        self.separator_at
    }

    /// First line after the separator; expected to be a timestamp.
    pub fn start_line(&self) -> Option<&'a str> {
        self.lines.first().map(String::as_str)
    }

    pub fn following(&self, n: usize) -> &'a [String] {
        let end = self.lines.len().min(n + 1);
        if end <= 1 { &[] } else { &self.lines[1..end] }
    }

    /// True when the record was written by a run that gave up because another
    /// instance held the configuration lock.
    pub fn is_lock_notice(&self) -> bool {
        self.following(LOCK_NOTICE_WINDOW)
            .iter()
            .any(|l| is_lock_notice_line(l))
    }
}

pub fn is_lock_notice_line(line: &str) -> bool {
    let width = LOCK_NOTICE_PREFIX.chars().count();
    let excerpt: String = line.chars().take(width).collect();
    excerpt.trim_end() == LOCK_NOTICE_PREFIX.trim_end()
}

/// Ordered run records of a log window, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Records<'a> {
    records: Vec<LogRecord<'a>>,
}

impl<'a> Records<'a> {
    pub fn split(lines: &'a [String]) -> Self {
        let starts: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.as_str() == SEPARATOR)
            .map(|(i, _)| i)
            .collect();
        let records = starts
            .iter()
            .enumerate()
            .map(|(n, &at)| {
                let end = starts.get(n + 1).copied().unwrap_or(lines.len());
                LogRecord {
                    separator_at: at,
                    lines: &lines[at + 1..end],
                }
            })
            .collect();
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent first.
    pub fn iter_rev(&self) -> impl Iterator<Item = &LogRecord<'a>> {
        self.records.iter().rev()
    }

    /// `n == 0` is the most recent record.
    pub fn nth_from_end(&self, n: usize) -> Option<&LogRecord<'a>> {
        self.iter_rev().nth(n)
    }

    pub fn last_matching(&self, pred: impl Fn(&LogRecord<'a>) -> bool) -> Option<&LogRecord<'a>> {
        self.iter_rev().find(|r| pred(r))
    }
}

/// Line index of the `k`-th from last line equal to `marker` (`k == 1` is the
/// last occurrence).
pub fn nth_marker_from_end(lines: &[String], marker: &str, k: usize) -> Option<usize> {
    if k == 0 {
        return None;
    }
    lines
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, l)| l.trim() == marker)
        .nth(k - 1)
        .map(|(i, _)| i)
}
