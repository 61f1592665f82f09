//! Shared logging setup for FilmDesk binaries.
//!
//! Logs go to two places: a size-rotated file under `~/.filmdesk/logs` (always,
//! full filter) and stderr (full filter with `--verbose`, warnings otherwise).

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "filmdesk=info,filmdesk_agents=info,filmdesk_db=info";
const HOME_ENV: &str = "FILMDESK_HOME";

/// Rotation limits for the file writer.
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    /// Files kept including the live one (`app.log`, `app.log.1`, ...).
    pub max_files: usize,
    /// Size at which the live file is rotated.
    pub max_bytes: u64,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Logging configuration shared by FilmDesk binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Override for the log directory (defaults to [`logs_dir`]).
    pub log_dir: Option<PathBuf>,
    pub rotation: RotationPolicy,
}

impl<'a> LogConfig<'a> {
    pub fn new(app_name: &'a str) -> Self {
        Self {
            app_name,
            verbose: false,
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Install the global subscriber. Call once per process.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => logs_dir(),
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;

    let file_writer = SharedRollingWriter::open(&log_dir, config.app_name, config.rotation)
        .context("Failed to initialize rolling log writer")?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Global tracing subscriber already installed")?;

    Ok(())
}

/// FilmDesk home directory.
///
/// Priority:
/// 1) FILMDESK_HOME
/// 2) ~/.filmdesk
/// 3) ./.filmdesk
pub fn filmdesk_home() -> PathBuf {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        return PathBuf::from(override_path);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".filmdesk"),
        None => PathBuf::from(".").join(".filmdesk"),
    }
}

/// Logs directory: ~/.filmdesk/logs
pub fn logs_dir() -> PathBuf {
    filmdesk_home().join("logs")
}

struct RollingFile {
    dir: PathBuf,
    stem: String,
    policy: RotationPolicy,
    file: Option<File>,
    written: u64,
}

impl RollingFile {
    fn open(dir: &Path, app_name: &str, policy: RotationPolicy) -> io::Result<Self> {
        let mut rolling = Self {
            dir: dir.to_path_buf(),
            stem: sanitize_name(app_name),
            policy: RotationPolicy {
                max_files: policy.max_files.max(1),
                max_bytes: policy.max_bytes,
            },
            file: None,
            written: 0,
        };
        rolling.reopen()?;
        if rolling.written > rolling.policy.max_bytes {
            rolling.rotate()?;
        }
        Ok(rolling)
    }

    fn live_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.stem))
    }

    fn archived_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.stem, index))
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.live_path())?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    /// Shift `app.log.N` -> `app.log.N+1`, dropping the oldest, then start a
    /// fresh live file.
    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        let last = self.policy.max_files - 1;
        if last == 0 {
            fs::remove_file(self.live_path()).or_else(ignore_missing)?;
            return self.reopen();
        }

        fs::remove_file(self.archived_path(last)).or_else(ignore_missing)?;
        for index in (1..last).rev() {
            let from = self.archived_path(index);
            if from.exists() {
                fs::rename(&from, self.archived_path(index + 1))?;
            }
        }
        let live = self.live_path();
        if live.exists() {
            fs::rename(live, self.archived_path(1))?;
        }

        self.reopen()
    }
}

fn ignore_missing(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(err)
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.policy.max_bytes {
            self.rotate()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
struct SharedRollingWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl SharedRollingWriter {
    fn open(dir: &Path, app_name: &str, policy: RotationPolicy) -> Result<Self> {
        let file = RollingFile::open(dir, app_name, policy)
            .with_context(|| format!("Failed to open log file for {}", app_name))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

struct RollingWriterGuard {
    inner: Arc<Mutex<RollingFile>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRollingWriter {
    type Writer = RollingWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        RollingWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for RollingWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        file.flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
