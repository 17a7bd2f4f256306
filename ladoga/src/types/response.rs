//! Represents a response to an MCP request

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use crate::error::Error;
use crate::types::{RequestId, JSONRPC_VERSION};

pub use error_details::ErrorDetails;

pub mod error_details;

/// A response message in the JSON-RPC protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// JSON-RPC protocol version.
    ///
    /// > Note: always 2.0.
    pub jsonrpc: String,

    /// Request identifier matching the original request.
    pub id: RequestId,

    /// The result of the method invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

impl Response {
    /// Creates a successful response
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates a dummy successful response
    pub fn empty(id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(json!({})),
            error: None,
        }
    }

    /// Creates an error response.
    ///
    /// Local error kinds (transport, state) are downgraded to an internal error
    /// since they must never appear on the wire.
    pub fn error(id: RequestId, error: Error) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Returns `true` if this is an error response
    #[inline]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Unwraps the [`Response`] into either result of `T` or [`Error`]
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, Error> {
        match self.result {
            Some(result) => serde_json::from_value::<T>(result)
                .map_err(Into::into),
            None => {
                let error = self.error
                    .unwrap_or_default()
                    .into();
                Err(error)
            }
        }
    }
}

/// Converts a handler outcome into a [`Response`] for the request `id`
pub(crate) fn into_response(outcome: Result<Value, Error>, id: RequestId) -> Response {
    match outcome {
        Ok(value) => Response::success(id, value),
        Err(err) => Response::error(id, err),
    }
}
