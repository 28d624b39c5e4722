use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

use crate::config::TimeZoneMode;

/// Parses the human-readable start line a backup run writes after each
/// separator, using the same formats the backup tool was configured with.
#[derive(Debug, Clone)]
pub struct TimestampExtractor {
    formats: Vec<String>,
    zone: TimeZoneMode,
}

impl TimestampExtractor {
    pub fn new(formats: Vec<String>, zone: TimeZoneMode) -> Self {
        Self { formats, zone }
    }

    /// `None` for empty or unparsable input; never an error.
    pub fn parse(&self, line: &str) -> Option<DateTime<Utc>> {
        let text = line.trim();
        if text.is_empty() {
            return None;
        }
        self.formats
            .iter()
            .find_map(|fmt| self.parse_with(text, fmt))
    }

    fn parse_with(&self, text: &str, fmt: &str) -> Option<DateTime<Utc>> {
        if let Ok(v) = DateTime::parse_from_str(text, fmt) {
            return Some(v.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(text, fmt).ok()?;
        match self.zone {
            TimeZoneMode::Utc => Some(Utc.from_utc_datetime(&naive)),
            TimeZoneMode::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|v| v.with_timezone(&Utc)),
        }
    }
}
