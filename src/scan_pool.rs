use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::types::{ScanTarget, Summary, Verdict};

use super::{ScanContext, scan_log, timed_out_log};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    pub workers: usize,
    /// `None` lets every scan run to completion.
    pub per_log_timeout: Option<Duration>,
}

/// Scans every target on a bounded set of workers.
///
/// Verdicts come back in input order. The summary and `on_verdict` are driven
/// by a single collector, in completion order.
pub fn scan_fleet(
    ctx: Arc<ScanContext>,
    targets: &[ScanTarget],
    opts: PoolOptions,
    mut on_verdict: impl FnMut(&Verdict),
) -> (Vec<Verdict>, Summary) {
    let mut slots: Vec<Option<Verdict>> = vec![None; targets.len()];
    let mut summary = Summary::default();
    let workers = opts.workers.clamp(1, targets.len().max(1));
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, Verdict)>();
    log::debug!("scanning {} logs on {workers} workers", targets.len());

    thread::scope(|s| {
        for _ in 0..workers {
            let tx = tx.clone();
            let ctx = Arc::clone(&ctx);
            let next = &next;
            s.spawn(move || {
                loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    let Some(target) = targets.get(i) else {
                        break;
                    };
                    let verdict = scan_bounded(&ctx, target, opts.per_log_timeout);
                    if tx.send((i, verdict)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);
        for (i, verdict) in rx {
            summary.fold(&verdict);
            on_verdict(&verdict);
            slots[i] = Some(verdict);
        }
    });

    (slots.into_iter().flatten().collect(), summary)
}

/// A scan that overruns is left behind on its own thread and reported as
/// timed out.
fn scan_bounded(ctx: &Arc<ScanContext>, target: &ScanTarget, limit: Option<Duration>) -> Verdict {
    let Some(limit) = limit else {
        return scan_log(ctx, target);
    };
    let (tx, rx) = mpsc::channel();
    let job_ctx = Arc::clone(ctx);
    let job = target.clone();
    thread::spawn(move || {
        let _ = tx.send(scan_log(&job_ctx, &job));
    });
    match rx.recv_timeout(limit) {
        Ok(verdict) => verdict,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!(
                "scan of {} exceeded {}s",
                target.log_path.display(),
                limit.as_secs()
            );
            timed_out_log(
                ctx,
                target,
                format!("did not finish within {} seconds", limit.as_secs()),
            )
        }
        Err(RecvTimeoutError::Disconnected) => {
            log::warn!("scan of {} stopped unexpectedly", target.log_path.display());
            timed_out_log(ctx, target, "scan worker stopped unexpectedly".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{ConfigResolver, LivenessProbe};
    use crate::config::{PolicyThresholds, TimeZoneMode};
    use crate::infer::{SEPARATOR, SUCCESS_MARKER, TimestampExtractor};
    use crate::snapshot::TailWindow;
    use crate::types::{LogStatus, ResolvedConfig};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    struct SlowResolver(Duration);

    impl ConfigResolver for SlowResolver {
        fn resolve(&self, config_path: &Path) -> Result<ResolvedConfig, String> {
            if config_path.to_string_lossy().contains("slow") {
                thread::sleep(self.0);
            }
            Ok(ResolvedConfig::default())
        }
    }

    struct NeverRunning;

    impl LivenessProbe for NeverRunning {
        fn is_running(&self, _job_id: &str) -> bool {
            false
        }
    }

    fn context(resolver_delay: Duration) -> Arc<ScanContext> {
        Arc::new(ScanContext {
            thresholds: PolicyThresholds {
                max_initiation_staleness_secs: 86_400,
                max_duration_secs: 3_600,
            },
            now: Utc
                .with_ymd_and_hms(2024, 1, 1, 1, 0, 0)
                .single()
                .expect("valid time"),
            window: TailWindow {
                tail_lines: 50,
                history_lines: 200,
            },
            extractor: TimestampExtractor::new(
                vec!["%Y-%m-%d %H:%M:%S".to_string()],
                TimeZoneMode::Utc,
            ),
            lock_file_name: "job.lock".to_string(),
            resolver: Box::new(SlowResolver(resolver_delay)),
            liveness: Box::new(NeverRunning),
        })
    }

    fn write_targets(dir: &Path, n: usize) -> Vec<ScanTarget> {
        (0..n)
            .map(|i| {
                let log_path = dir.join(format!("job{i}.log"));
                let body = if i % 2 == 0 {
                    format!(
                        "{SEPARATOR}\n2024-01-01 00:00:00\nTime elapsed in seconds : 60\nx\n{SUCCESS_MARKER}\n"
                    )
                } else {
                    format!("{SEPARATOR}\n2024-01-01 00:00:00\nrsync failed\n")
                };
                fs::write(&log_path, body).expect("write log");
                ScanTarget {
                    index: i,
                    log_path,
                    config_path: dir.join(format!("job{i}.conf")),
                }
            })
            .collect()
    }

    #[test]
    fn verdicts_keep_input_order_and_summary_matches() {
        let dir = tempdir().expect("tempdir");
        let targets = write_targets(dir.path(), 9);
        let mut seen = 0;
        let (verdicts, summary) = scan_fleet(
            context(Duration::ZERO),
            &targets,
            PoolOptions {
                workers: 3,
                per_log_timeout: None,
            },
            |_| seen += 1,
        );
        assert_eq!(seen, 9);
        assert_eq!(verdicts.len(), 9);
        for (i, v) in verdicts.iter().enumerate() {
            assert_eq!(v.target.index, i);
        }
        assert_eq!(verdicts[0].status, LogStatus::Successful);
        assert_eq!(verdicts[1].status, LogStatus::Failed);
        assert_eq!(summary.logs_scanned, 9);
        assert_eq!(summary.logs_with_errors, 4);
    }

    #[test]
    fn worker_count_does_not_change_results() {
        let dir = tempdir().expect("tempdir");
        let targets = write_targets(dir.path(), 5);
        let run = |workers| {
            scan_fleet(
                context(Duration::ZERO),
                &targets,
                PoolOptions {
                    workers,
                    per_log_timeout: None,
                },
                |_| {},
            )
        };
        let (serial, s1) = run(1);
        let (parallel, s8) = run(8);
        assert_eq!(serial, parallel);
        assert_eq!(s1, s8);
    }

    #[test]
    fn overrunning_scan_is_reported_as_timed_out() {
        let dir = tempdir().expect("tempdir");
        let mut targets = write_targets(dir.path(), 2);
        targets[1].config_path = PathBuf::from("/nonexistent/slow/job.conf");
        let (verdicts, summary) = scan_fleet(
            context(Duration::from_secs(5)),
            &targets,
            PoolOptions {
                workers: 2,
                per_log_timeout: Some(Duration::from_millis(200)),
            },
            |_| {},
        );
        assert_eq!(verdicts[0].status, LogStatus::Successful);
        assert_eq!(verdicts[1].status, LogStatus::TimedOut);
        assert_eq!(summary.logs_with_errors, 1);
    }

    #[test]
    fn empty_target_list_scans_nothing() {
        let (verdicts, summary) = scan_fleet(
            context(Duration::ZERO),
            &[],
            PoolOptions {
                workers: 4,
                per_log_timeout: None,
            },
            |_| {},
        );
        assert!(verdicts.is_empty());
        assert_eq!(summary, Summary::default());
    }
}
