//! Utilities for log messages

use serde::{Serialize, Deserialize};
use crate::types::notification::Notification;
#[cfg(test)]
use crate::types::notification::commands;

/// The severity of a log message.
/// This maps to syslog message severities, as specified in
/// [RFC-5424](https://datatracker.ietf.org/doc/html/rfc5424#section-6.2.1):
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    /// Detailed debug information, typically only valuable to developers.
    Debug,

    /// Normal operational messages that require no action.
    Info,

    /// Normal but significant events that might deserve attention.
    Notice,

    /// Warning conditions that don't represent an error but indicate potential issues.
    Warning,

    /// Error conditions that should be addressed but don't require immediate action.
    Error,

    /// Critical conditions that require immediate attention.
    Critical,

    /// Action must be taken immediately to address the condition.
    Alert,

    /// System is unusable and requires immediate attention.
    Emergency
}

/// Sent from the server as the payload of `notifications/message` whenever
/// a log message is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    /// The severity of this log message.
    pub level: LoggingLevel,

    /// An optional name of the logger issuing this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,

    /// The data to be logged, such as a string message or an object.
    pub data: Option<serde_json::Value>,
}

/// A request from the client to the server, to enable or adjust logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLevelRequestParams {
    /// The level of logging that the client wants to receive from the server.
    /// The server should send all logs at this level and higher to the client
    /// as `notifications/message`.
    pub level: LoggingLevel,
}

impl From<LogMessage> for Notification {
    #[inline]
    fn from(log: LogMessage) -> Self {
        Notification::log(log)
    }
}

impl LogMessage {
    /// Creates a new [`LogMessage`]
    #[inline]
    pub fn new(
        level: LoggingLevel,
        logger: Option<String>,
        data: Option<serde_json::Value>
    ) -> Self {
        Self { level, logger, data }
    }

    /// Writes this message to the ambient tracing subscriber
    #[inline]
    pub fn write(&self) {
        let data = serde_json::to_value(&self.data).unwrap_or_default();
        match self.level {
            LoggingLevel::Debug => tracing::debug!(logger = "ladoga", %data),
            LoggingLevel::Info => tracing::info!(logger = "ladoga", %data),
            LoggingLevel::Notice
            | LoggingLevel::Warning => tracing::warn!(logger = "ladoga", %data),
            _ => tracing::error!(logger = "ladoga", %data),
        };
    }
}
