//! Shared foundation for small trading-bot processes.
//!
//! Provides the infrastructure every bot in the fleet needs: a persisted
//! key-value cache with atomic writes, a file-based single-instance lock,
//! a timestamped trade log, and plain-text alert mail to a trusted relay.
//! Everything is synchronous and blocking; hosts own the run loop.

pub mod bot;
pub mod cache;
pub mod config;
pub mod lock;
pub mod logger;
pub mod mailer;

pub use bot::BaseBot;
pub use cache::{CacheError, CacheStore};
pub use config::{BotConfig, ConfigError};
pub use lock::{InstanceLock, LockError};
pub use logger::LogWriter;
pub use mailer::Notifier;
