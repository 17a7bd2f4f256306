//! Error payload of a JSON-RPC error response

use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::error::{Error, ErrorCode};

/// The `error` member of a JSON-RPC error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// One of the canonical JSON-RPC error codes
    pub code: ErrorCode,

    /// A short description of the error
    pub message: String,

    /// Optional structured details
    pub data: Option<Value>,
}

impl Default for ErrorDetails {
    #[inline]
    fn default() -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: ErrorCode::InternalError.to_string(),
            data: None,
        }
    }
}

impl From<Error> for ErrorDetails {
    fn from(err: Error) -> Self {
        let code = if err.code.is_local() {
            ErrorCode::InternalError
        } else {
            err.code
        };
        Self {
            code,
            message: err.to_string(),
            data: None,
        }
    }
}

impl From<ErrorDetails> for Error {
    #[inline]
    fn from(details: ErrorDetails) -> Self {
        Error::new(details.code, details.message)
    }
}
