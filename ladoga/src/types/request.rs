//! Represents a request from an MCP peer

use std::fmt;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use crate::types::{JSONRPC_VERSION, ProgressToken};

/// A unique identifier for a request.
///
/// `Null` only ever appears on error responses to unparseable requests;
/// a request carrying a `null` id is rejected during validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer form
    Number(i64),
    /// String form
    String(String),
    /// The `null` id of a parse-error response
    Null,
}

impl Default for RequestId {
    #[inline]
    fn default() -> RequestId {
        Self::Null
    }
}

impl fmt::Display for RequestId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(str) => write!(f, "{str}"),
            RequestId::Number(num) => write!(f, "{num}"),
            RequestId::Null => write!(f, "(no id)"),
        }
    }
}

impl From<i64> for RequestId {
    #[inline]
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::String(id.into())
    }
}

/// A request in the JSON-RPC protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// JSON-RPC protocol version.
    ///
    /// > Note: always 2.0.
    pub jsonrpc: String,

    /// Request identifier. Must be a string or number and unique within the originating side.
    pub id: RequestId,

    /// Name of the method to invoke.
    pub method: String,

    /// Optional parameters for the method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Creates a new [`Request`]
    #[inline]
    pub fn new(id: impl Into<RequestId>, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Returns the request's params, substituting an empty object for absent params
    /// so that handlers never observe `null`.
    #[inline]
    pub fn params_or_default(&self) -> Value {
        self.params
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    /// Deserializes the request's params into `T`, treating absent params as `{}`.
    pub fn parse_params<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::error::Error> {
        serde_json::from_value(self.params_or_default())
            .map_err(|err| crate::error::Error::new(
                crate::error::ErrorCode::InvalidParams,
                err.to_string()))
    }

    /// Extracts the `_meta.progressToken` value when the caller supplied one
    pub fn progress_token(&self) -> Option<ProgressToken> {
        self.params
            .as_ref()
            .and_then(|params| params.get("_meta"))
            .and_then(|meta| meta.get("progressToken"))
            .and_then(|token| serde_json::from_value(token.clone()).ok())
    }
}
