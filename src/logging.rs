//! Persistent leveled log sinks shared by all backup jobs.
//!
//! A [`LogSinks`] value is built once at startup and handed to every job
//! through an `Arc`. It owns three independent append-only logs, one each for
//! informational, warning, and fatal records. Every record carries a
//! timestamp and the `file:line` of the call site, and is mirrored to the
//! global `log` facade so it also shows up on the console logger.
//!
//! Each sink serialises its writes internally, so concurrent jobs never
//! interleave partial lines.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::panic::Location;
use std::path::Path;

use anyhow::{Context, Result};
use log::{Level, LevelFilter, Log, Record};
use simplelog::{Config, ConfigBuilder, LevelPadding, WriteLogger};

use crate::constants::{FATAL_LOG_FILE, INFO_LOG_FILE, WARN_LOG_FILE};
use crate::security::{redact_literals, scrub_credentials};

const TARGET: &str = "rust_backup";

/// Which persistent sink a record goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Fatal,
}

impl Severity {
    fn level(self) -> Level {
        match self {
            Severity::Info => Level::Info,
            Severity::Warning => Level::Warn,
            Severity::Fatal => Level::Error,
        }
    }
}

/// The three persistent log sinks.
pub struct LogSinks {
    info: Box<dyn Log>,
    warn: Box<dyn Log>,
    fatal: Box<dyn Log>,
    secrets: Vec<String>,
}

impl LogSinks {
    /// Open (or create) `info.txt`, `warn.txt` and `panic.txt` in `dir` for appending.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let info = open_append(&dir.join(INFO_LOG_FILE))?;
        let warn = open_append(&dir.join(WARN_LOG_FILE))?;
        let fatal = open_append(&dir.join(FATAL_LOG_FILE))?;

        Ok(Self::from_writers(info, warn, fatal))
    }

    /// Build sinks over arbitrary writers.
    pub fn from_writers<I, W, F>(info: I, warn: W, fatal: F) -> Self
    where
        I: Write + Send + 'static,
        W: Write + Send + 'static,
        F: Write + Send + 'static,
    {
        let config = sink_config();
        Self {
            info: WriteLogger::new(LevelFilter::Trace, config.clone(), info),
            warn: WriteLogger::new(LevelFilter::Trace, config.clone(), warn),
            fatal: WriteLogger::new(LevelFilter::Trace, config, fatal),
            secrets: Vec::new(),
        }
    }

    /// Redact these literal values from every record.
    pub fn with_secrets(mut self, secrets: Vec<String>) -> Self {
        self.secrets = secrets;
        self
    }

    #[track_caller]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.record(Severity::Info, Location::caller(), args);
    }

    #[track_caller]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.record(Severity::Warning, Location::caller(), args);
    }

    #[track_caller]
    pub fn fatal(&self, args: fmt::Arguments<'_>) {
        self.record(Severity::Fatal, Location::caller(), args);
    }

    /// Remove credentials and configured secrets from `text`.
    pub fn scrub(&self, text: &str) -> String {
        redact_literals(&scrub_credentials(text), &self.secrets)
    }

    /// Write one record to the sink for `severity`.
    pub fn record(&self, severity: Severity, location: &'static Location<'static>, args: fmt::Arguments<'_>) {
        let message = self.scrub(&args.to_string());
        let sink = match severity {
            Severity::Info => &self.info,
            Severity::Warning => &self.warn,
            Severity::Fatal => &self.fatal,
        };

        emit(sink.as_ref(), severity.level(), location, format_args!("{}", message));
    }

    pub fn flush(&self) {
        self.info.flush();
        self.warn.flush();
        self.fatal.flush();
    }
}

fn emit(sink: &dyn Log, level: Level, location: &'static Location<'static>, args: fmt::Arguments<'_>) {
    let record = Record::builder()
        .args(args)
        .level(level)
        .target(TARGET)
        .file(Some(location.file()))
        .line(Some(location.line()))
        .build();

    sink.log(&record);
    sink.flush();
    log::logger().log(&record);
}

fn sink_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_time_level(LevelFilter::Error)
        .set_location_level(LevelFilter::Error)
        .set_level_padding(LevelPadding::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build()
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Record an informational message with the caller's location.
#[macro_export]
macro_rules! sink_info {
    ($sinks:expr, $($arg:tt)+) => {
        $sinks.info(format_args!($($arg)+))
    };
}

/// Record a warning with the caller's location.
#[macro_export]
macro_rules! sink_warn {
    ($sinks:expr, $($arg:tt)+) => {
        $sinks.warn(format_args!($($arg)+))
    };
}

/// Record a fatal message with the caller's location.
#[macro_export]
macro_rules! sink_fatal {
    ($sinks:expr, $($arg:tt)+) => {
        $sinks.fatal(format_args!($($arg)+))
    };
}
