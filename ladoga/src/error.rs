//! Represents a protocol runtime error

use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;

pub use error_code::ErrorCode;

pub mod error_code;

type BoxError = Box<
    dyn StdError
    + Send
    + Sync
>;

/// Represents an MCP runtime error
#[derive(Debug)]
pub struct Error {
    pub(crate) code: ErrorCode,
    inner: BoxError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Self {
            inner: err.into(),
            code: ErrorCode::ParseError
        }
    }
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Error {
        Self {
            inner: err.into(),
            code: ErrorCode::Transport
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Self {
            inner: err.into(),
            code: ErrorCode::Transport
        }
    }
}

impl From<Infallible> for Error {
    fn from(infallible: Infallible) -> Error {
        match infallible {}
    }
}

impl Error {
    /// Creates a new [`Error`]
    #[inline]
    pub fn new(code: impl TryInto<ErrorCode>, err: impl Into<BoxError>) -> Error {
        Self {
            inner: err.into(),
            code: code
                .try_into()
                .unwrap_or_default()
        }
    }

    /// Returns the [`ErrorCode`] of this error
    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns `true` when the error is local to this process
    /// and must never be written onto the wire
    #[inline]
    pub fn is_local(&self) -> bool {
        self.code.is_local()
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorCode};

    #[test]
    fn it_keeps_the_code_it_was_created_with() {
        let err = Error::new(ErrorCode::InvalidParams, "missing argument");

        assert_eq!(err.code(), ErrorCode::InvalidParams);
        assert_eq!(err.to_string(), "missing argument");
    }

    #[test]
    fn it_falls_back_to_internal_error_for_unknown_codes() {
        let err = Error::new(42, "odd code");

        assert_eq!(err.code(), ErrorCode::InternalError);
    }

    #[test]
    fn it_maps_json_errors_to_parse_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err();
        let err: Error = json_err.into();

        assert_eq!(err.code(), ErrorCode::ParseError);
    }

    #[test]
    fn it_marks_transport_errors_as_local() {
        let err = Error::new(ErrorCode::Transport, "connection reset");

        assert!(err.is_local());
        assert!(!Error::new(ErrorCode::InvalidRequest, "bad envelope").is_local());
    }
}
