//! Minimal stderr logger for the `log` facade.
//!
//! Each record is written as one line:
//! `[<UTC timestamp>] [LEVEL] target: message`.

use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Environment variable consulted when no `-v`/`-q` flag is given.
pub const ENV_VAR: &str = "STICKER_LOG";

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(Utc::now(), record);
        // Nothing sensible to do if stderr itself is gone.
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn format_line(now: DateTime<Utc>, record: &Record) -> String {
    format!(
        "[{}] [{:>5}] {}: {}",
        now.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        record.level(),
        record.target(),
        record.args()
    )
}

/// Pick the log level from the command-line flags, falling back to
/// `env` (the value of [`ENV_VAR`]) and then to `warn`.
///
/// `-q` wins over everything; each `-v` raises the level one step from
/// `warn`.
#[must_use]
pub fn level_from(verbose: u8, quiet: bool, env: Option<&str>) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => env
            .and_then(|value| LevelFilter::from_str(value.trim()).ok())
            .unwrap_or(LevelFilter::Warn),
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the stderr logger at `level`.
///
/// # Errors
///
/// Returns [`SetLoggerError`] if a logger was already installed.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
