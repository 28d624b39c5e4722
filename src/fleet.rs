use std::io::Write;
use std::path::Path;

use crate::collab::HostDispatcher;
use crate::error::ScanResult;
use crate::lists::read_path_list;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub address: String,
    pub command: String,
}

/// `address<TAB>command` per line; blank and `#` lines are ignored, lines
/// without a tab are reported and skipped.
pub fn parse_host_list(lines: &[String]) -> Vec<HostEntry> {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| match l.split_once('\t') {
            Some((address, command)) if !address.trim().is_empty() => Some(HostEntry {
                address: address.trim().to_string(),
                command: command.trim().to_string(),
            }),
            _ => {
                eprintln!("backupscan: ignoring malformed host line: {l}");
                None
            }
        })
        .collect()
}

pub fn load_hosts(path: &Path) -> ScanResult<Vec<HostEntry>> {
    Ok(parse_host_list(&read_path_list(path)?))
}

/// Runs each host's command in list order; remote output goes straight to our
/// stdout and stderr. Returns the number of hosts that failed.
pub fn run_fleet(hosts: &[HostEntry], dispatcher: &dyn HostDispatcher) -> usize {
    let mut failures = 0;
    for host in hosts {
        log::debug!("dispatching to {}: {}", host.address, host.command);
        let _ = std::io::stdout().flush();
        if let Err(e) = dispatcher.dispatch(&host.address, &host.command) {
            failures += 1;
            eprintln!("backupscan: {}: {e}", host.address);
        }
    }
    failures
}
