//! Log-based inference: record splitting, run classification, start times and
//! durations recovered from the tail of a backup log.

#[path = "infer_blocks.rs"]
mod infer_blocks;
#[path = "infer_classify.rs"]
mod infer_classify;
#[path = "infer_duration.rs"]
mod infer_duration;
#[path = "infer_initiation.rs"]
mod infer_initiation;
#[path = "infer_timestamp.rs"]
mod infer_timestamp;

pub use infer_classify::classify_run;
pub use infer_duration::{completed_run_duration, in_progress_duration};
pub use infer_initiation::{last_initiation, last_successful_initiation};
pub use infer_timestamp::TimestampExtractor;

/// Line written before every run.
pub const SEPARATOR: &str = "##################";
pub const SUCCESS_MARKER: &str = "Backup Completed Successfully";
/// Start of the line a run writes when another instance holds the lock.
pub const LOCK_NOTICE_PREFIX: &str = "ERROR! : Backup configuration lock file present : ";
pub const ELAPSED_LABEL: &str = "Time elapsed in seconds";
pub const ELAPSED_UNAVAILABLE: &str = "Unable to calculate";
