//! Logging management for MCP server.
//!
//! Client-facing logging: messages at or above the level chosen through
//! `logging/setLevel` are published on a broadcast channel that transports
//! relay as `notifications/message`. This is separate from the server's own
//! `tracing` output, which always goes to stderr.

use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::protocol::{LoggingLevel, LoggingMessageParams};

/// Capacity of the outbound log channel
const LOG_CAPACITY: usize = 64;

/// Logging manager for handling MCP logging
pub struct LoggingManager {
    /// Minimum level forwarded to the client
    level: RwLock<LoggingLevel>,

    /// Outbound messages
    sender: broadcast::Sender<LoggingMessageParams>,
}

impl LoggingManager {
    /// Create a new logging manager at `info`
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(LOG_CAPACITY);
        Self {
            level: RwLock::new(LoggingLevel::Info),
            sender,
        }
    }

    /// Set the logging level
    pub fn set_level(&self, level: LoggingLevel) {
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = level;
        info!("Set client logging level to: {:?}", level);
    }

    /// Get the current logging level
    pub fn level(&self) -> LoggingLevel {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to messages that pass the level filter
    pub fn subscribe(&self) -> broadcast::Receiver<LoggingMessageParams> {
        self.sender.subscribe()
    }

    /// Whether a message at `level` would be forwarded
    pub fn should_log(&self, level: LoggingLevel) -> bool {
        level >= self.level()
    }

    /// Publish a log message. Returns true if it passed the level filter.
    pub fn log(&self, level: LoggingLevel, logger: Option<&str>, data: impl Into<Value>) -> bool {
        if !self.should_log(level) {
            return false;
        }

        let message = LoggingMessageParams {
            level,
            logger: logger.map(str::to_string),
            data: data.into(),
        };
        if self.sender.send(message).is_err() {
            debug!("No listeners for client log message");
        }
        true
    }

    /// Log an error message
    pub fn error(&self, logger: Option<&str>, data: impl Into<Value>) -> bool {
        self.log(LoggingLevel::Error, logger, data)
    }

    /// Log a warning message
    pub fn warning(&self, logger: Option<&str>, data: impl Into<Value>) -> bool {
        self.log(LoggingLevel::Warning, logger, data)
    }

    /// Log an info message
    pub fn info(&self, logger: Option<&str>, data: impl Into<Value>) -> bool {
        self.log(LoggingLevel::Info, logger, data)
    }
}

impl Default for LoggingManager {
    fn default() -> Self {
        Self::new()
    }
}
