use std::fmt;
use std::path::PathBuf;

pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that abort a whole invocation.
///
/// Problems confined to a single backup log never become a `ScanError`; they
/// are recorded on that log's verdict as a `LogIssue` instead.
#[derive(Debug)]
pub enum ScanError {
    Io {
        context: String,
        source: std::io::Error,
    },
    Json {
        context: String,
        source: serde_json::Error,
    },
    InputListMismatch {
        log_list: PathBuf,
        config_list: PathBuf,
        log_count: usize,
        config_count: usize,
    },
    InvalidData {
        context: String,
    },
}

impl ScanError {
    pub fn invalid(context: impl Into<String>) -> Self {
        ScanError::InvalidData {
            context: context.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ScanError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        ScanError::Json {
            context: context.into(),
            source,
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Io { context, source } => write!(f, "{context}: {source}"),
            ScanError::Json { context, source } => write!(f, "{context}: {source}"),
            ScanError::InputListMismatch {
                log_list,
                config_list,
                log_count,
                config_count,
            } => write!(
                f,
                "input lists differ in length ({} has {} entries, {} has {})",
                log_list.display(),
                log_count,
                config_list.display(),
                config_count
            ),
            ScanError::InvalidData { context } => write!(f, "{context}"),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Io { source, .. } => Some(source),
            ScanError::Json { source, .. } => Some(source),
            ScanError::InputListMismatch { .. } => None,
            ScanError::InvalidData { .. } => None,
        }
    }
}
