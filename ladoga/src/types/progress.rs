//! Progress token utilities

use serde::{Serialize, Deserialize};

/// An opaque token supplied by the caller inside `_meta.progressToken`,
/// echoed on every progress notification bound to that request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    /// Integer form
    Number(i64),
    /// String form
    String(String),
}

impl From<i64> for ProgressToken {
    #[inline]
    fn from(token: i64) -> Self {
        Self::Number(token)
    }
}

impl From<&str> for ProgressToken {
    #[inline]
    fn from(token: &str) -> Self {
        Self::String(token.into())
    }
}
