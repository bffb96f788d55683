use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::CONFIG;
use crate::utils::timing::TIMING_TARGET;

const LOGS_DIR: &str = "logs";
pub const GENERAL_LOG: &str = "librarian.log";
pub const TIMING_LOG: &str = "timing.log";

pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

#[derive(Debug, Clone)]
pub struct LogTail {
    pub path: PathBuf,
    pub lines: Vec<String>,
}

fn parse_log_level(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

fn rolling_writer(file_name: &str, guards: &mut Vec<WorkerGuard>) -> NonBlocking {
    let appender = tracing_appender::rolling::daily(LOGS_DIR, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    writer
}

/// Installs the console layer, rolling text/JSON files and a separate timing log.
pub fn init_logging() -> LoggingGuards {
    if let Err(err) = fs::create_dir_all(LOGS_DIR) {
        eprintln!("Failed to create logs directory: {err}");
    }

    let mut guards = Vec::with_capacity(4);
    let general_writer = rolling_writer(GENERAL_LOG, &mut guards);
    let general_json_writer = rolling_writer("librarian.jsonl", &mut guards);
    let timing_writer = rolling_writer(TIMING_LOG, &mut guards);
    let timing_json_writer = rolling_writer("timing.jsonl", &mut guards);

    let general_filter = Targets::new()
        .with_default(parse_log_level(&CONFIG.log_level))
        .with_target(TIMING_TARGET, LevelFilter::OFF)
        .with_target("hyper", LevelFilter::WARN)
        .with_target("hyper_util", LevelFilter::WARN)
        .with_target("reqwest", LevelFilter::WARN);
    let timing_filter = Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target(TIMING_TARGET, LevelFilter::INFO);

    // stdout carries results, so console logs go to stderr at warn and above.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(
            general_filter
                .clone()
                .with_default(parse_log_level(&CONFIG.log_level).min(LevelFilter::WARN)),
        );
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(general_writer)
        .with_ansi(false)
        .with_filter(general_filter.clone());
    let json_file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(general_json_writer)
        .with_filter(general_filter);
    let timing_layer = tracing_subscriber::fmt::layer()
        .with_writer(timing_writer)
        .with_ansi(false)
        .with_filter(timing_filter.clone());
    let json_timing_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(timing_json_writer)
        .with_filter(timing_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(json_file_layer)
        .with(timing_layer)
        .with(json_timing_layer)
        .init();

    LoggingGuards { _guards: guards }
}

pub fn read_recent_log_lines(base_name: &str, max_lines: usize) -> io::Result<Option<LogTail>> {
    read_recent_log_lines_in(Path::new(LOGS_DIR), base_name, max_lines)
}

fn read_recent_log_lines_in(
    logs_dir: &Path,
    base_name: &str,
    max_lines: usize,
) -> io::Result<Option<LogTail>> {
    if max_lines == 0 {
        return Ok(None);
    }

    let Some(path) = find_latest_log_file(logs_dir, base_name)? else {
        return Ok(None);
    };

    let lines = tail_file_lines(&path, max_lines)?;
    Ok(Some(LogTail { path, lines }))
}

fn find_latest_log_file(logs_dir: &Path, base_name: &str) -> io::Result<Option<PathBuf>> {
    if !logs_dir.exists() {
        return Ok(None);
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(logs_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(base_name) {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        match &newest {
            Some((current_time, _)) if modified <= *current_time => {}
            _ => newest = Some((modified, path)),
        }
    }

    Ok(newest.map(|(_, path)| path))
}

fn tail_file_lines(path: &Path, max_lines: usize) -> io::Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut ring = VecDeque::with_capacity(max_lines);

    for line in reader.lines() {
        let line = line?;
        if ring.len() == max_lines {
            ring.pop_front();
        }
        ring.push_back(line);
    }

    Ok(ring.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(parse_log_level("WARNING"), LevelFilter::WARN);
        assert_eq!(parse_log_level("verbose"), LevelFilter::INFO);
    }

    #[test]
    fn tails_the_matching_log_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("timing.log.2026-10-18"), "one\n").unwrap();
        fs::write(
            dir.path().join("librarian.log.2026-10-18"),
            "a\nb\nc\nd\n",
        )
        .unwrap();

        let tail = read_recent_log_lines_in(dir.path(), GENERAL_LOG, 2)
            .unwrap()
            .unwrap();
        assert_eq!(tail.lines, vec!["c".to_string(), "d".to_string()]);
        assert!(read_recent_log_lines_in(dir.path(), "missing", 5)
            .unwrap()
            .is_none());
    }
}
