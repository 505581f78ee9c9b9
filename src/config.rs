//! Bot configuration: one fully enumerated struct, validated at construction.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cache::{has_cache_suffix, CACHE_SUFFIX};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("cache filenames must end in {CACHE_SUFFIX}: {0}")]
    InvalidCacheName(PathBuf),
    #[error("coin identifier must not be blank")]
    BlankCoin,
    #[error("mail_from and mail_host are required when mail_to has recipients")]
    IncompleteMail,
}

/// Settings shared by every bot process.
///
/// Hosts either embed this in their own config file (it is plain serde) or
/// load a standalone YAML file with [`BotConfig::load`]. Read-only to this
/// crate once constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Cache file path; must end in `.cache`.
    pub cache_file: PathBuf,
    /// Identifier prefixed onto log lines and mail subjects, e.g. `BTC`.
    pub coin: String,
    /// Trade log path.
    pub log_file: PathBuf,
    /// Skip the log file (stdout echo still happens).
    #[serde(default)]
    pub log_disabled: bool,
    /// Alert mail recipients; blank entries are skipped at send time.
    #[serde(default)]
    pub mail_to: Vec<String>,
    /// Alert mail sender address.
    #[serde(default)]
    pub mail_from: String,
    /// Trusted relay, `host` or `host:port`.
    #[serde(default)]
    pub mail_host: String,
}

impl BotConfig {
    /// Load and validate a standalone YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants every component relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !has_cache_suffix(&self.cache_file) {
            return Err(ConfigError::InvalidCacheName(self.cache_file.clone()));
        }
        if self.coin.trim().is_empty() {
            return Err(ConfigError::BlankCoin);
        }
        let has_recipients = self.mail_to.iter().any(|r| !r.trim().is_empty());
        if has_recipients && (self.mail_from.trim().is_empty() || self.mail_host.trim().is_empty())
        {
            return Err(ConfigError::IncompleteMail);
        }
        Ok(())
    }
}
