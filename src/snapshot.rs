use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{ScanError, ScanResult};

const READ_CHUNK: u64 = 8192;
/// Read budget per windowed line; longer lines are cut at the window start.
const MAX_LINE_BYTES: u64 = 4096;

/// Line windows taken from the end of a backup log in a single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailWindow {
    /// Raw lines inspected for the run classification and the error report.
    pub tail_lines: usize,
    /// Raw lines searched for run records and success markers.
    pub history_lines: usize,
}

/// Immutable view of one log, blank lines removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSnapshot {
    history: Vec<String>,
    tail: Vec<String>,
}

impl LogSnapshot {
    pub fn from_text(text: &str, window: TailWindow) -> Self {
        let raw: Vec<&str> = text
            .lines()
            .flat_map(|l| l.split('\r'))
            .collect();
        let keep = window.history_lines.max(window.tail_lines);
        let history_raw = &raw[raw.len().saturating_sub(keep)..];
        let tail_raw = &raw[raw.len().saturating_sub(window.tail_lines)..];
        Self {
            history: non_blank(history_raw),
            tail: non_blank(tail_raw),
        }
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn tail(&self) -> &[String] {
        &self.tail
    }
}

fn non_blank(lines: &[&str]) -> Vec<String> {
    lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.to_string())
        .collect()
}

/// Reads only as much of the end of `path` as the window needs.
pub fn read_snapshot(path: &Path, window: TailWindow) -> ScanResult<LogSnapshot> {
    let wanted = window.history_lines.max(window.tail_lines);
    let text = read_last_lines(path, wanted)?;
    Ok(LogSnapshot::from_text(&text, window))
}

fn read_last_lines(path: &Path, n: usize) -> ScanResult<String> {
    let mut f =
        File::open(path).map_err(|e| ScanError::io(format!("cannot open {}", path.display()), e))?;
    let len = f
        .metadata()
        .map_err(|e| ScanError::io(format!("cannot stat {}", path.display()), e))?
        .len();
    let budget = (n as u64).saturating_mul(MAX_LINE_BYTES).max(READ_CHUNK);
    let mut pos = len;
    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut newlines = 0;
    // One extra newline covers a trailing newline at end of file.
    while pos > 0 && newlines <= n && len - pos < budget {
        let step = READ_CHUNK.min(pos).min(budget - (len - pos));
        pos -= step;
        f.seek(SeekFrom::Start(pos))
            .map_err(|e| ScanError::io(format!("seek failed on {}", path.display()), e))?;
        let mut chunk = vec![0u8; step as usize];
        f.read_exact(&mut chunk)
            .map_err(|e| ScanError::io(format!("read failed on {}", path.display()), e))?;
        newlines += count_newlines(&chunk);
        chunks.push(chunk);
    }
    let mut buf: Vec<u8> = chunks.into_iter().rev().flatten().collect();
    // Out of budget mid-line: the first line is cut, drop it.
    if pos > 0
        && newlines <= n
        && let Some(first) = buf.iter().position(|b| *b == b'\n')
    {
        buf.drain(..=first);
    }
    Ok(String::from_utf8_lossy(&buf).to_string())
}

fn count_newlines(buf: &[u8]) -> usize {
    buf.iter().filter(|b| **b == b'\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const WINDOW: TailWindow = TailWindow {
        tail_lines: 3,
        history_lines: 5,
    };

    #[test]
    fn blank_lines_are_dropped_after_windowing() {
        let s = LogSnapshot::from_text("a\nb\n\nc\n \nd\n", WINDOW);
        assert_eq!(s.tail(), &["c".to_string(), "d".to_string()]);
        assert_eq!(
            s.history(),
            &["b".to_string(), "c".to_string(), "d".to_string()]
        );
    }

    #[test]
    fn carriage_returns_split_lines() {
        let s = LogSnapshot::from_text("a\r\nb\rc\n", WINDOW);
        assert_eq!(s.tail().last().map(String::as_str), Some("c"));
        assert_eq!(s.history().len(), 3);
    }

    #[test]
    fn all_blank_tail_is_empty_even_with_older_content() {
        let s = LogSnapshot::from_text("old\n\n\n\n", WINDOW);
        assert!(s.tail().is_empty());
    }

    #[test]
    fn reads_tail_of_large_file() {
        let dir = tempdir().expect("tempdir");
        let p = dir.path().join("big.log");
        let mut text = String::new();
        for i in 0..5000 {
            text.push_str(&format!("line {i}\n"));
        }
        fs::write(&p, &text).expect("write log");
        let s = read_snapshot(
            &p,
            TailWindow {
                tail_lines: 2,
                history_lines: 10,
            },
        )
        .expect("snapshot");
        assert_eq!(s.tail(), &["line 4998".to_string(), "line 4999".to_string()]);
        assert_eq!(s.history().len(), 10);
        assert_eq!(s.history()[0], "line 4990");
    }

    #[test]
    fn reads_are_capped_for_logs_without_newlines() {
        let dir = tempdir().expect("tempdir");
        let p = dir.path().join("flat.log");
        let window = TailWindow {
            tail_lines: 1,
            history_lines: 2,
        };
        let budget = 2 * MAX_LINE_BYTES as usize;
        fs::write(&p, "x".repeat(budget * 10)).expect("write log");
        let text = read_last_lines(&p, 2).expect("read");
        assert_eq!(text.len(), budget);

        let mut mixed = "y".repeat(budget * 3);
        mixed.push_str("\nlast line\n");
        fs::write(&p, &mixed).expect("write log");
        let s = read_snapshot(&p, window).expect("snapshot");
        assert_eq!(s.tail(), &["last line".to_string()]);
        assert_eq!(s.history(), &["last line".to_string()]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let err = read_snapshot(&dir.path().join("nope.log"), WINDOW).expect_err("missing");
        assert!(err.to_string().contains("cannot open"));
    }

    #[test]
    fn empty_file_gives_empty_snapshot() {
        let dir = tempdir().expect("tempdir");
        let p = dir.path().join("empty.log");
        fs::write(&p, "").expect("write");
        let s = read_snapshot(&p, WINDOW).expect("snapshot");
        assert!(s.tail().is_empty());
        assert!(s.history().is_empty());
    }
}
