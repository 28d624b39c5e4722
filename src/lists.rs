//! Path lists that drive a scan, and their discovery from the crontab.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::collab::{ConfigResolver, parse_words};
use crate::error::{ScanError, ScanResult};
use crate::paths::{config_dir, ensure_parent_dir};
use crate::process::run_command_output_with_timeout;
use crate::types::ScanTarget;

pub fn read_path_list(path: &Path) -> ScanResult<Vec<String>> {
    let text = fs::read_to_string(path)
        .map_err(|e| ScanError::io(format!("cannot read {}", path.display()), e))?;
    Ok(text.lines().map(|l| l.trim().to_string()).collect())
}

fn is_skipped_entry(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

/// Pairs the two lists line by line. Skipped log entries keep their
/// configuration line out of the scan so the remaining pairs stay aligned.
pub fn pair_targets(
    log_list: &Path,
    logs: &[String],
    config_list: &Path,
    configs: &[String],
) -> ScanResult<Vec<ScanTarget>> {
    if logs.len() != configs.len() {
        return Err(ScanError::InputListMismatch {
            log_list: log_list.to_path_buf(),
            config_list: config_list.to_path_buf(),
            log_count: logs.len(),
            config_count: configs.len(),
        });
    }
    Ok(logs
        .iter()
        .zip(configs)
        .enumerate()
        .filter(|(_, (log, _))| !is_skipped_entry(log))
        .map(|(index, (log, config))| ScanTarget {
            index,
            log_path: PathBuf::from(log),
            config_path: PathBuf::from(config),
        })
        .collect())
}

pub fn load_targets(log_list: &Path, config_list: &Path) -> ScanResult<Vec<ScanTarget>> {
    let logs = read_path_list(log_list)?;
    let configs = read_path_list(config_list)?;
    pair_targets(log_list, &logs, config_list, &configs)
}

/// Configuration paths of the uncommented crontab entries that run `lbackup_bin`.
pub fn parse_crontab(text: &str, lbackup_bin: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| {
            let words = parse_words(l);
            let at = words.iter().position(|w| w == lbackup_bin)?;
            words.get(at + 1).map(PathBuf::from)
        })
        .collect()
}

pub fn crontab_configs(lbackup_bin: &str) -> ScanResult<Vec<PathBuf>> {
    let mut cmd = Command::new("crontab");
    cmd.arg("-l");
    let output = run_command_output_with_timeout(cmd, "crontab -l")
        .map_err(|e| ScanError::invalid(e.to_string()))?;
    if !output.status.success() {
        return Err(ScanError::invalid(format!(
            "crontab -l exited with {}: {}",
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    let configs = parse_crontab(&String::from_utf8_lossy(&output.stdout), lbackup_bin);
    log::debug!("crontab lists {} lbackup jobs", configs.len());
    Ok(configs)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPair {
    pub logs: Vec<PathBuf>,
    pub configs: Vec<PathBuf>,
}

/// Resolves each job's log path. Jobs whose log name cannot be resolved are
/// left out of both lists.
pub fn build_lists(configs: &[PathBuf], resolver: &dyn ConfigResolver) -> ListPair {
    let mut out = ListPair::default();
    for config in configs {
        match resolver.resolve(config) {
            Ok(resolved) if !resolved.log_file_name.is_empty() => {
                out.logs.push(config_dir(config).join(&resolved.log_file_name));
                out.configs.push(config.clone());
            }
            Ok(_) => eprintln!(
                "backupscan: {}: log_fileName is not set, job left out",
                config.display()
            ),
            Err(e) => eprintln!("backupscan: {e}, job left out"),
        }
    }
    out
}

fn write_list(path: &Path, entries: &[PathBuf]) -> ScanResult<()> {
    ensure_parent_dir(path).map_err(ScanError::invalid)?;
    let mut text = String::new();
    for entry in entries {
        text.push_str(&entry.to_string_lossy());
        text.push('\n');
    }
    fs::write(path, text).map_err(|e| ScanError::io(format!("cannot write {}", path.display()), e))
}

pub fn write_lists(lists: &ListPair, log_out: &Path, config_out: &Path) -> ScanResult<()> {
    write_list(log_out, &lists.logs)?;
    write_list(config_out, &lists.configs)
}

/// `<config dir> : <sshRemoteServer> : <backupSource>` per job.
pub fn crontab_listing(configs: &[PathBuf], resolver: &dyn ConfigResolver) -> Vec<String> {
    configs
        .iter()
        .map(|config| {
            let (remote, source) = match resolver.resolve(config) {
                Ok(r) => (r.ssh_remote_server, r.backup_source),
                Err(e) => {
                    log::warn!("{e}");
                    (String::new(), String::new())
                }
            };
            format!("{} : {remote} : {source}", config_dir(config).display())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResolvedConfig;
    use tempfile::tempdir;

    struct NamedLogs;

    impl ConfigResolver for NamedLogs {
        fn resolve(&self, config_path: &Path) -> Result<ResolvedConfig, String> {
            if config_path.to_string_lossy().contains("nolog") {
                return Ok(ResolvedConfig::default());
            }
            Ok(ResolvedConfig {
                backup_dest: "/backups".to_string(),
                ssh_remote_server: "files01".to_string(),
                log_file_name: "backup.log".to_string(),
                backup_source: "/srv".to_string(),
            })
        }
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mismatched_lists_are_rejected() {
        let err = pair_targets(
            Path::new("logs.txt"),
            &strings(&["a.log", "b.log"]),
            Path::new("confs.txt"),
            &strings(&["a.conf"]),
        )
        .expect_err("mismatch");
        match err {
            ScanError::InputListMismatch {
                log_count,
                config_count,
                ..
            } => assert_eq!((log_count, config_count), (2, 1)),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn skipped_entries_keep_alignment() {
        let targets = pair_targets(
            Path::new("logs.txt"),
            &strings(&["a.log", "# retired.log", "", "d.log"]),
            Path::new("confs.txt"),
            &strings(&["a.conf", "retired.conf", "c.conf", "d.conf"]),
        )
        .expect("pairs");
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].index, 3);
        assert_eq!(targets[1].config_path, PathBuf::from("d.conf"));
    }

    #[test]
    fn crontab_parsing_skips_comments_and_other_jobs() {
        let text = "\
# 0 1 * * * /usr/local/sbin/lbackup /etc/lbackup/old/backup.conf
0 2 * * * /usr/local/sbin/lbackup /etc/lbackup/web/backup.conf
30 2 * * * /usr/bin/other /etc/other.conf
0 3 * * * /usr/local/sbin/lbackup '/etc/lbackup/my files/backup.conf' >/dev/null 2>&1
";
        assert_eq!(
            parse_crontab(text, "/usr/local/sbin/lbackup"),
            vec![
                PathBuf::from("/etc/lbackup/web/backup.conf"),
                PathBuf::from("/etc/lbackup/my files/backup.conf"),
            ]
        );
    }

    #[test]
    fn lists_are_built_and_written() {
        let dir = tempdir().expect("tempdir");
        let configs = vec![
            PathBuf::from("/etc/lbackup/web/backup.conf"),
            PathBuf::from("/etc/lbackup/nolog/backup.conf"),
        ];
        let lists = build_lists(&configs, &NamedLogs);
        assert_eq!(lists.logs, vec![PathBuf::from("/etc/lbackup/web/backup.log")]);
        assert_eq!(lists.configs.len(), 1);

        let log_out = dir.path().join("out").join("logs.txt");
        let config_out = dir.path().join("out").join("confs.txt");
        write_lists(&lists, &log_out, &config_out).expect("write lists");
        let targets = load_targets(&log_out, &config_out).expect("load targets");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].log_path, PathBuf::from("/etc/lbackup/web/backup.log"));
    }

    #[test]
    fn listing_uses_config_dir() {
        let lines = crontab_listing(&[PathBuf::from("/etc/lbackup/web/backup.conf")], &NamedLogs);
        assert_eq!(lines, vec!["/etc/lbackup/web : files01 : /srv".to_string()]);
    }

    #[test]
    fn unreadable_list_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let err = read_path_list(&dir.path().join("missing.txt")).expect_err("missing");
        assert!(err.to_string().contains("cannot read"));
    }
}
