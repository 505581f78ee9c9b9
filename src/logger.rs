//! The bot's trade log: timestamped lines, echoed to stdout, appended to a
//! file per call. This is the user-facing activity log, not a diagnostics
//! channel; there is no rotation, buffering, or persistent handle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::config::BotConfig;

/// Timestamp layout for log lines, microsecond precision.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone)]
pub struct LogWriter {
    coin: String,
    log_file: PathBuf,
    disabled: bool,
}

impl LogWriter {
    pub fn new(coin: impl Into<String>, log_file: impl Into<PathBuf>, disabled: bool) -> Self {
        Self {
            coin: coin.into(),
            log_file: log_file.into(),
            disabled,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(
            config.coin.clone(),
            config.log_file.clone(),
            config.log_disabled,
        )
    }

    /// Log a message at the current UTC wall-clock time.
    ///
    /// The coin identifier is prepended unless the message already mentions
    /// it, so every line carries it exactly once.
    pub fn logit(&self, msg: &str) -> Result<()> {
        self.logit_at(msg, Utc::now())
    }

    /// Same as [`logit`](Self::logit) with a caller-supplied timestamp.
    pub fn logit_at(&self, msg: &str, timestamp: DateTime<Utc>) -> Result<()> {
        if msg.contains(&self.coin) {
            self.write_line(msg, timestamp)
        } else {
            self.write_line(&format!("{} {}", self.coin, msg), timestamp)
        }
    }

    fn write_line(&self, msg: &str, timestamp: DateTime<Utc>) -> Result<()> {
        let line = format!("{} {}", timestamp.format(TIMESTAMP_FORMAT), msg.trim());
        println!("{line}");
        if self.disabled {
            return Ok(());
        }
        let mut fd = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.log_file)
            .with_context(|| format!("failed to open log file {}", self.log_file.display()))?;
        writeln!(fd, "{line}")
            .with_context(|| format!("failed to append to log file {}", self.log_file.display()))?;
        Ok(())
    }
}
