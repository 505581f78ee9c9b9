//! Host-facing façade wiring the components to one configuration.
//!
//! Mirrors the lifecycle bots follow at startup: construct with a validated
//! config, then run the init steps independently before entering the run
//! loop. Logging and mail are side-effect utilities available throughout.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::cache::{CacheError, CacheStore};
use crate::config::{BotConfig, ConfigError};
use crate::lock::{InstanceLock, LockError};
use crate::logger::LogWriter;
use crate::mailer::Notifier;

pub struct BaseBot {
    config: BotConfig,
    logger: LogWriter,
    notifier: Notifier,
    cache: Option<CacheStore>,
    lock: Option<InstanceLock>,
}

impl BaseBot {
    /// Validate `config` and build the bot. Cache and lock are initialized
    /// separately so hosts control the startup order.
    pub fn new(config: BotConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let logger = LogWriter::from_config(&config);
        let notifier = Notifier::from_config(&config);
        Ok(Self {
            config,
            logger,
            notifier,
            cache: None,
            lock: None,
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Load the cache file if it exists, otherwise start empty.
    pub fn init_cache(&mut self) -> Result<(), CacheError> {
        self.cache = Some(CacheStore::open(&self.config.cache_file)?);
        Ok(())
    }

    /// Take the instance lock, terminating the process on contention.
    ///
    /// Held until the bot is dropped; a duplicate run on the same
    /// configuration never gets past this call.
    pub fn init_lock(&mut self) {
        self.lock = Some(InstanceLock::acquire_or_exit(&self.config.cache_file));
    }

    /// Fallible variant of [`init_lock`](Self::init_lock) for hosts that
    /// handle contention themselves.
    pub fn try_init_lock(&mut self) -> Result<(), LockError> {
        self.lock = Some(InstanceLock::acquire(&self.config.cache_file)?);
        Ok(())
    }

    /// Persist the in-memory cache atomically.
    pub fn write_cache(&self) -> Result<(), CacheError> {
        self.cache()?.write()
    }

    pub fn cache(&self) -> Result<&CacheStore, CacheError> {
        self.cache.as_ref().ok_or(CacheError::NotInitialized)
    }

    pub fn cache_mut(&mut self) -> Result<&mut CacheStore, CacheError> {
        self.cache.as_mut().ok_or(CacheError::NotInitialized)
    }

    pub fn logit(&self, msg: &str) -> Result<()> {
        self.logger.logit(msg)
    }

    pub fn logit_at(&self, msg: &str, timestamp: DateTime<Utc>) -> Result<()> {
        self.logger.logit_at(msg, timestamp)
    }

    pub fn send_email(&self, subject: &str, body: Option<&str>) -> Result<usize> {
        self.notifier.send_email(subject, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> BotConfig {
        BotConfig {
            cache_file: dir.join("doge.cache"),
            coin: "DOGE".to_string(),
            log_file: dir.join("doge.log"),
            log_disabled: false,
            mail_to: vec![],
            mail_from: String::new(),
            mail_host: String::new(),
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = config_in(std::path::Path::new("/tmp"));
        config.cache_file = PathBuf::from("/tmp/doge.db");
        assert!(BaseBot::new(config).is_err());
    }

    #[test]
    fn test_write_before_init_fails() {
        let dir = tempdir().unwrap();
        let bot = BaseBot::new(config_in(dir.path())).unwrap();
        assert!(matches!(
            bot.write_cache(),
            Err(CacheError::NotInitialized)
        ));
    }

    #[test]
    fn test_cache_survives_restart() {
        let dir = tempdir().unwrap();

        let mut bot = BaseBot::new(config_in(dir.path())).unwrap();
        bot.init_cache().unwrap();
        bot.try_init_lock().unwrap();
        bot.cache_mut()
            .unwrap()
            .insert("last_buy", json!({"price": 0.42, "qty": 1000}));
        bot.write_cache().unwrap();
        drop(bot);

        let mut restarted = BaseBot::new(config_in(dir.path())).unwrap();
        restarted.init_cache().unwrap();
        restarted.try_init_lock().unwrap();
        assert_eq!(
            restarted.cache().unwrap().get("last_buy"),
            Some(&json!({"price": 0.42, "qty": 1000}))
        );
    }

    #[test]
    fn test_second_bot_cannot_lock() {
        let dir = tempdir().unwrap();

        let mut first = BaseBot::new(config_in(dir.path())).unwrap();
        first.try_init_lock().unwrap();

        let mut second = BaseBot::new(config_in(dir.path())).unwrap();
        assert!(second.try_init_lock().is_err());
    }
}
