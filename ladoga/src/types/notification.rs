//! Utilities for Notifications

use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use crate::types::JSONRPC_VERSION;

pub use log_message::{LogMessage, LoggingLevel, SetLevelRequestParams};
pub use progress::ProgressNotification;

pub mod log_message;
pub mod progress;

/// List of notification methods
pub mod commands {
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const CANCELLED: &str = "notifications/cancelled";
    pub const PROGRESS: &str = "notifications/progress";
    pub const MESSAGE: &str = "notifications/message";
    pub const STREAM_RESUMED: &str = "notifications/stream/resumed";
    pub const SET_LOG_LEVEL: &str = "logging/setLevel";
}

/// A notification which does not expect a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// JSON-RPC protocol version.
    ///
    /// > Note: always 2.0.
    pub jsonrpc: String,

    /// Name of the notification method.
    pub method: String,

    /// Optional parameters for the notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<NotificationParams>,
}

/// Notification parameters: a reserved `_meta` mapping plus open additional
/// fields. The two are merged on the wire but addressable separately here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationParams {
    /// Metadata reserved by MCP for protocol-level information
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,

    /// Everything else the sender attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parameters of a `notifications/cancelled` notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledNotificationParams {
    /// Identifier of the request being cancelled
    #[serde(rename = "requestId")]
    pub request_id: crate::types::RequestId,

    /// Optional human-readable reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NotificationParams {
    /// Splits a JSON object into `_meta` and the remaining fields.
    /// Non-object values produce empty params.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };
        let meta = match fields.remove("_meta") {
            Some(Value::Object(meta)) => Some(meta),
            _ => None,
        };
        Self { meta, extra: fields }
    }

    /// Reads a field from the additional-fields mapping
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

impl Notification {
    /// Creates a new [`Notification`]
    #[inline]
    pub fn new(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params: params.map(NotificationParams::from_value),
        }
    }

    /// Creates a logging [`Notification`]
    #[inline]
    pub fn log(log: LogMessage) -> Self {
        Self::new(commands::MESSAGE, serde_json::to_value(log).ok())
    }

    /// Creates the `stream/resumed` sentinel emitted after an SSE reconnect
    #[inline]
    pub fn stream_resumed(resumed_from: &str) -> Self {
        Self::new(
            commands::STREAM_RESUMED,
            Some(serde_json::json!({ "resumedFrom": resumed_from })))
    }

    /// Deserializes this notification's params into `T`, treating absent params as `{}`
    pub fn parse_params<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::error::Error> {
        let value = match &self.params {
            Some(params) => serde_json::to_value(params)?,
            None => Value::Object(Default::default()),
        };
        serde_json::from_value(value)
            .map_err(|err| crate::error::Error::new(
                crate::error::ErrorCode::InvalidParams,
                err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    #[test]
    fn it_creates_new_notification() {
        let notification = Notification::new("test", Some(json!({ "param": "value" })));

        assert_eq!(notification.jsonrpc, "2.0");
        assert_eq!(notification.method, "test");

        let params = notification.params.unwrap();
        assert_eq!(params.get("param"), Some(&json!("value")));
    }

    #[test]
    fn it_splits_meta_from_additional_fields() {
        let notification = Notification::new("test", Some(json!({
            "_meta": { "progressToken": 1 },
            "payload": "data"
        })));

        let params = notification.params.unwrap();
        assert_eq!(params.meta.as_ref().unwrap()["progressToken"], json!(1));
        assert_eq!(params.get("payload"), Some(&json!("data")));
        assert!(params.get("_meta").is_none());
    }

    #[test]
    fn it_merges_meta_back_on_the_wire() {
        let notification = Notification::new("test", Some(json!({
            "_meta": { "k": "v" },
            "x": 1
        })));

        let wire = serde_json::to_value(&notification).unwrap();

        assert_eq!(wire["params"]["_meta"]["k"], "v");
        assert_eq!(wire["params"]["x"], 1);
    }

    #[test]
    fn it_parses_cancelled_params() {
        let notification = Notification::new(
            commands::CANCELLED,
            Some(json!({ "requestId": 5, "reason": "user" })));

        let params: CancelledNotificationParams = notification.parse_params().unwrap();

        assert_eq!(params.request_id, crate::types::RequestId::Number(5));
        assert_eq!(params.reason.as_deref(), Some("user"));
    }
}
