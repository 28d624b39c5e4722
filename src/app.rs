use chrono::Utc;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::collab::{CommandLivenessProbe, ShellConfigResolver, SshDispatcher};
use crate::config::{
    APP_DESC, APP_NAME, APP_VERSION, AppConfig, DEFAULT_CONFIG_LIST, DEFAULT_HOST_LIST,
    DEFAULT_LOG_LIST, PolicyThresholds, app_config,
};
use crate::error::ScanError;
use crate::fleet::{load_hosts, run_fleet};
use crate::infer::TimestampExtractor;
use crate::journal::append_verdict;
use crate::lists::{build_lists, crontab_configs, crontab_listing, load_targets, write_lists};
use crate::report::{ScanReport, render_text};
use crate::scan::{PoolOptions, ScanContext, scan_fleet};
use crate::snapshot::TailWindow;

fn print_help() {
    println!("{APP_NAME} - {APP_DESC}");
    println!();
    println!("Usage:");
    println!("  {APP_NAME} [scan] [options]");
    println!("  {APP_NAME} <command> [args]");
    println!();
    println!("Commands:");
    println!("  scan               Scan the listed backup logs (default)");
    println!("  update-lists [-l OUT] [-c OUT]  Rebuild both path lists from the crontab");
    println!("  list-crontab       Print directory, remote server and source per crontab job");
    println!("  fleet [-h FILE]    Run a command on each host from the host list over ssh");
    println!("  version            Print tool version");
    println!("  help               Show this help");
    println!();
    println!("Scan options:");
    println!(
        "  -l, --loglist FILE       Backup log paths, one per line (default {DEFAULT_LOG_LIST})"
    );
    println!(
        "  -c, --conflist FILE      Configuration paths, aligned with the log list (default {DEFAULT_CONFIG_LIST})"
    );
    println!("  -s, --max-staleness SECS Longest accepted time since a backup started");
    println!("  -d, --max-duration SECS  Longest accepted backup run time");
    println!("  -w, --workers N          Logs scanned in parallel");
    println!("  --json                   Print the scan as JSON");
    println!("  --strict                 Exit 1 when any log has errors");
    println!("  --journal PATH           Append one JSON line per log to PATH");
    println!();
    println!("Environment:");
    println!("  RUST_LOG                 Diagnostic log filter (default warn)");
    println!("  BACKUPSCAN_*             Defaults for thresholds, windows, timeouts and commands");
}

fn print_version() {
    println!("{APP_NAME} {APP_VERSION}");
}

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .try_init();
}

/// Value following `args[*i]`, advancing the cursor.
fn take_value(args: &[String], i: &mut usize) -> Result<String, String> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_number<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T, String> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| format!("{flag} expects a non-negative integer, got '{raw}'"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScanArgs {
    log_list: PathBuf,
    config_list: PathBuf,
    max_staleness: Option<u64>,
    max_duration: Option<u64>,
    workers: Option<usize>,
    json: bool,
    strict: bool,
    journal: Option<PathBuf>,
}

fn parse_scan_args(args: &[String]) -> Result<ScanArgs, String> {
    let mut out = ScanArgs {
        log_list: PathBuf::from(DEFAULT_LOG_LIST),
        config_list: PathBuf::from(DEFAULT_CONFIG_LIST),
        max_staleness: None,
        max_duration: None,
        workers: None,
        json: false,
        strict: false,
        journal: None,
    };
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "-l" | "--loglist" => out.log_list = PathBuf::from(take_value(args, &mut i)?),
            "-c" | "--conflist" => out.config_list = PathBuf::from(take_value(args, &mut i)?),
            "-s" | "--max-staleness" => {
                out.max_staleness = Some(parse_number(flag, &take_value(args, &mut i)?)?)
            }
            "-d" | "--max-duration" => {
                out.max_duration = Some(parse_number(flag, &take_value(args, &mut i)?)?)
            }
            "-w" | "--workers" => {
                let n: usize = parse_number(flag, &take_value(args, &mut i)?)?;
                if n == 0 {
                    return Err(format!("{flag} must be at least 1"));
                }
                out.workers = Some(n);
            }
            "--json" => out.json = true,
            "--strict" => out.strict = true,
            "--journal" => out.journal = Some(PathBuf::from(take_value(args, &mut i)?)),
            other => return Err(format!("unknown scan option '{other}'")),
        }
        i += 1;
    }
    Ok(out)
}

fn scan_context(cfg: &AppConfig, thresholds: PolicyThresholds) -> ScanContext {
    ScanContext {
        thresholds,
        now: cfg.now_override.unwrap_or_else(Utc::now),
        window: TailWindow {
            tail_lines: cfg.tail_lines,
            history_lines: cfg.history_lines,
        },
        extractor: TimestampExtractor::new(cfg.time_formats.clone(), cfg.time_zone),
        lock_file_name: cfg.lock_file_name.clone(),
        resolver: Box::new(ShellConfigResolver::new(cfg.shell.clone())),
        liveness: Box::new(CommandLivenessProbe::new(&cfg.liveness_cmd)),
    }
}

fn report_list_error(err: &ScanError, opts: &ScanArgs) {
    match err {
        ScanError::InputListMismatch { .. } => {
            eprintln!(
                "    ERROR! : Input files differ in length please check the input list files are valid."
            );
            eprintln!("             {err}");
        }
        _ => {
            eprintln!(
                "    ERROR! : Unable to read one or more of the input files which were specified"
            );
            eprintln!("             Please confirm that both of the following input files exist.");
            eprintln!();
            eprintln!("             log_list    :   {}", opts.log_list.display());
            eprintln!("             config_list :   {}", opts.config_list.display());
            eprintln!();
            eprintln!("             {err}");
        }
    }
}

fn cmd_scan(args: &[String]) -> i32 {
    let opts = match parse_scan_args(args) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            eprintln!(
                "Usage: {APP_NAME} scan [-l FILE] [-c FILE] [-s SECS] [-d SECS] [-w N] [--json] [--strict] [--journal PATH]"
            );
            return 2;
        }
    };
    let cfg = app_config();
    let targets = match load_targets(&opts.log_list, &opts.config_list) {
        Ok(v) => v,
        Err(e) => {
            report_list_error(&e, &opts);
            return 1;
        }
    };
    let thresholds = PolicyThresholds {
        max_initiation_staleness_secs: opts
            .max_staleness
            .unwrap_or(cfg.thresholds.max_initiation_staleness_secs),
        max_duration_secs: opts.max_duration.unwrap_or(cfg.thresholds.max_duration_secs),
    };
    let ctx = Arc::new(scan_context(cfg, thresholds));
    let scanned_at = ctx.now;
    let pool = PoolOptions {
        workers: opts.workers.unwrap_or(cfg.workers),
        per_log_timeout: (cfg.log_timeout_secs > 0)
            .then(|| Duration::from_secs(cfg.log_timeout_secs)),
    };
    let journal = opts.journal.clone().or_else(|| cfg.journal.clone());
    let mut journal_ok = true;
    let (verdicts, summary) = scan_fleet(ctx, &targets, pool, |verdict| {
        if let Some(path) = &journal
            && journal_ok
            && let Err(e) = append_verdict(path, scanned_at, verdict)
        {
            eprintln!("{APP_NAME}: journal disabled for this scan: {e}");
            journal_ok = false;
        }
    });

    if opts.json {
        let report = ScanReport {
            scanned_at,
            thresholds,
            verdicts: &verdicts,
            summary,
        };
        match report.to_json() {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("{APP_NAME}: {e}");
                return 1;
            }
        }
    } else {
        print!("{}", render_text(&verdicts, &summary));
    }
    if opts.strict && summary.logs_with_errors > 0 {
        1
    } else {
        0
    }
}

fn parse_list_outputs(args: &[String]) -> Result<(PathBuf, PathBuf), String> {
    let mut log_out = PathBuf::from(DEFAULT_LOG_LIST);
    let mut config_out = PathBuf::from(DEFAULT_CONFIG_LIST);
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-l" | "--loglist" => log_out = PathBuf::from(take_value(args, &mut i)?),
            "-c" | "--conflist" => config_out = PathBuf::from(take_value(args, &mut i)?),
            other => return Err(format!("unknown update-lists option '{other}'")),
        }
        i += 1;
    }
    Ok((log_out, config_out))
}

fn cmd_update_lists(args: &[String]) -> i32 {
    let (log_out, config_out) = match parse_list_outputs(args) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            eprintln!("Usage: {APP_NAME} update-lists [-l OUT] [-c OUT]");
            return 2;
        }
    };
    let cfg = app_config();
    let configs = match crontab_configs(&cfg.lbackup_bin) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            return 1;
        }
    };
    let lists = build_lists(&configs, &ShellConfigResolver::new(cfg.shell.clone()));
    if let Err(e) = write_lists(&lists, &log_out, &config_out) {
        eprintln!("{APP_NAME}: {e}");
        return 1;
    }
    println!(
        "Wrote {} backup job(s) to {} and {}",
        lists.logs.len(),
        log_out.display(),
        config_out.display()
    );
    0
}

fn cmd_list_crontab(args: &[String]) -> i32 {
    if let Some(extra) = args.first() {
        eprintln!("{APP_NAME}: unexpected argument '{extra}'");
        eprintln!("Usage: {APP_NAME} list-crontab");
        return 2;
    }
    let cfg = app_config();
    let configs = match crontab_configs(&cfg.lbackup_bin) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            return 1;
        }
    };
    for line in crontab_listing(&configs, &ShellConfigResolver::new(cfg.shell.clone())) {
        println!("{line}");
    }
    0
}

fn cmd_fleet(args: &[String]) -> i32 {
    let mut hosts_file = PathBuf::from(DEFAULT_HOST_LIST);
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--hosts" => match take_value(args, &mut i) {
                Ok(v) => hosts_file = PathBuf::from(v),
                Err(e) => {
                    eprintln!("{APP_NAME}: {e}");
                    return 2;
                }
            },
            other => {
                eprintln!("{APP_NAME}: unknown fleet option '{other}'");
                eprintln!("Usage: {APP_NAME} fleet [-h|--hosts FILE]");
                return 2;
            }
        }
        i += 1;
    }
    let hosts = match load_hosts(&hosts_file) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            return 1;
        }
    };
    let failures = run_fleet(&hosts, &SshDispatcher::new(app_config().ssh.clone()));
    if failures > 0 { 1 } else { 0 }
}

pub fn run() -> i32 {
    init_logging();
    let args: Vec<String> = env::args().collect();
    let cmd = args.get(1).map(String::as_str);
    match cmd {
        None => cmd_scan(&[]),
        Some("help" | "-h" | "--help") => {
            print_help();
            0
        }
        Some("version" | "-V" | "--version") => {
            print_version();
            0
        }
        Some("scan") => cmd_scan(&args[2..]),
        Some("update-lists") => cmd_update_lists(&args[2..]),
        Some("list-crontab") => cmd_list_crontab(&args[2..]),
        Some("fleet") => cmd_fleet(&args[2..]),
        Some(flag) if flag.starts_with('-') => cmd_scan(&args[1..]),
        Some(other) => {
            eprintln!("{APP_NAME}: unknown command '{other}'");
            eprintln!("Run '{APP_NAME} help' for usage.");
            2
        }
    }
}
