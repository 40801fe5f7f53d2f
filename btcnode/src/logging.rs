//! Tracing setup for the btcnode binary and for library users who want it.
//!
//! Output goes to stderr, to `run.log` inside a log directory, or both. A
//! `run.log` left behind by an earlier run is archived as
//! `btcnode.<timestamp>.log` before the new one is opened, and only the newest
//! `max_files` archives are kept.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{LoggingError, LoggingResult};

const ARCHIVE_PREFIX: &str = "btcnode.";
const ACTIVE_LOG: &str = "run.log";
const ARCHIVE_TIME_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Keeps the background log writer alive. Buffered lines are flushed on drop.
#[derive(Debug)]
pub struct LoggingGuard {
    _writer: Option<WorkerGuard>,
}

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Maximum level. `None` reads `RUST_LOG` and falls back to INFO.
    pub level: Option<LevelFilter>,
    /// Log to stderr.
    pub console: bool,
    /// Log to a file as well.
    pub file: Option<LogFileConfig>,
}

/// File output settings.
#[derive(Debug, Clone)]
pub struct LogFileConfig {
    pub log_dir: PathBuf,
    /// Number of archived logs to keep.
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            console: true,
            file: None,
        }
    }
}

/// Stderr logging at `level`.
pub fn init_console_logging(level: LevelFilter) -> LoggingResult<LoggingGuard> {
    init_logging(LoggingConfig {
        level: Some(level),
        console: true,
        file: None,
    })
}

/// Installs the global subscriber described by `config`.
///
/// Keep the returned guard for as long as the process logs. With neither
/// console nor file output enabled nothing is installed.
///
/// ```no_run
/// use btcnode::logging::{LogFileConfig, LoggingConfig, init_logging};
/// use btcnode::LevelFilter;
///
/// let _guard = init_logging(LoggingConfig {
///     level: Some(LevelFilter::DEBUG),
///     console: false,
///     file: Some(LogFileConfig {
///         log_dir: "logs".into(),
///         max_files: 10,
///     }),
/// })
/// .unwrap();
/// ```
pub fn init_logging(config: LoggingConfig) -> LoggingResult<LoggingGuard> {
    if !config.console && config.file.is_none() {
        return Ok(LoggingGuard {
            _writer: None,
        });
    }

    let filter = match config.level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(LevelFilter::INFO.to_string())),
    };

    let mut writer_guard = None;
    let file_layer = match config.file.as_ref() {
        Some(file_config) => {
            let (writer, guard) = open_log_file(file_config)?;
            writer_guard = Some(guard);
            Some(fmt::layer().with_ansi(false).with_target(true).with_writer(writer))
        }
        None => None,
    };
    let console_layer = config.console.then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| LoggingError::SubscriberInit(e.to_string()))?;

    Ok(LoggingGuard {
        _writer: writer_guard,
    })
}

fn open_log_file(config: &LogFileConfig) -> LoggingResult<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.log_dir)?;
    archive_previous_log(&config.log_dir)?;
    prune_archives(&config.log_dir, config.max_files)?;

    let file = File::create(config.log_dir.join(ACTIVE_LOG))?;
    Ok(tracing_appender::non_blocking(file))
}

/// Moves an existing `run.log` aside, named after its last modification time.
fn archive_previous_log(log_dir: &Path) -> LoggingResult<()> {
    let active = log_dir.join(ACTIVE_LOG);
    if !active.exists() {
        return Ok(());
    }

    let stamp = modified_at(&active).unwrap_or_else(Local::now).format(ARCHIVE_TIME_FORMAT);
    let mut target = log_dir.join(format!("{ARCHIVE_PREFIX}{stamp}.log"));
    let mut suffix = 1;
    while target.exists() {
        if suffix > 999 {
            return Err(LoggingError::RotationFailed(format!(
                "no free archive name for {}",
                active.display()
            )));
        }
        target = log_dir.join(format!("{ARCHIVE_PREFIX}{stamp}-{suffix}.log"));
        suffix += 1;
    }

    fs::rename(&active, &target).map_err(|e| LoggingError::RotationFailed(e.to_string()))
}

fn modified_at(path: &Path) -> Option<DateTime<Local>> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.into())
}

fn is_archive(name: &str) -> bool {
    name.starts_with(ARCHIVE_PREFIX) && name.ends_with(".log")
}

/// Deletes the oldest archives beyond `keep`. `run.log` is never touched.
fn prune_archives(log_dir: &Path, keep: usize) -> LoggingResult<()> {
    let entries = fs::read_dir(log_dir)
        .map_err(|e| LoggingError::RotationFailed(format!("reading {}: {}", log_dir.display(), e)))?;

    let mut archives: Vec<(Option<std::time::SystemTime>, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_str().is_some_and(is_archive))
        .map(|entry| (entry.metadata().and_then(|m| m.modified()).ok(), entry.path()))
        .collect();

    if archives.len() <= keep {
        return Ok(());
    }

    // Oldest first; ties broken by name so the timestamped names decide.
    archives.sort();
    let excess = archives.len() - keep;
    for (_, path) in archives.into_iter().take(excess) {
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!("could not remove old log {}: {}", path.display(), e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn archives_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| is_archive(name))
            .collect();
        names.sort();
        names
    }

    fn touch(dir: &Path, name: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        writeln!(file, "{}", name).unwrap();
    }

    #[test]
    fn test_archive_without_active_log_is_noop() {
        let dir = TempDir::new().unwrap();
        archive_previous_log(dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_archive_moves_active_log() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ACTIVE_LOG);

        archive_previous_log(dir.path()).unwrap();

        assert!(!dir.path().join(ACTIVE_LOG).exists());
        let archived = archives_in(dir.path());
        assert_eq!(archived.len(), 1);
        assert!(archived[0].starts_with("btcnode."));
    }

    #[test]
    fn test_archive_name_collision_gets_suffix() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ACTIVE_LOG);
        archive_previous_log(dir.path()).unwrap();

        // Same mtime second is likely; either way two distinct archives must exist.
        touch(dir.path(), ACTIVE_LOG);
        archive_previous_log(dir.path()).unwrap();

        assert_eq!(archives_in(dir.path()).len(), 2);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        for i in 1..=6 {
            touch(dir.path(), &format!("btcnode.2026010{}-120000.log", i));
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        touch(dir.path(), ACTIVE_LOG);
        touch(dir.path(), "unrelated.log");

        prune_archives(dir.path(), 2).unwrap();

        assert_eq!(
            archives_in(dir.path()),
            vec!["btcnode.20260105-120000.log", "btcnode.20260106-120000.log"]
        );
        assert!(dir.path().join(ACTIVE_LOG).exists());
        assert!(dir.path().join("unrelated.log").exists());
    }

    #[test]
    fn test_prune_under_limit() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "btcnode.20260101-120000.log");

        prune_archives(dir.path(), 5).unwrap();
        assert_eq!(archives_in(dir.path()).len(), 1);

        prune_archives(dir.path(), 0).unwrap();
        assert!(archives_in(dir.path()).is_empty());
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("nested").join("logs");

        let (_writer, _guard) = open_log_file(&LogFileConfig {
            log_dir: log_dir.clone(),
            max_files: 3,
        })
        .unwrap();

        assert!(log_dir.join(ACTIVE_LOG).exists());
    }
}
