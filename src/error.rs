//! Error types for nexus-client
//!
//! This module provides the error taxonomy shared by every layer of the client:
//! - The domain error ([`Error::Api`]) carrying the server-facing `N00.<status>` / `N01` codes
//! - Transport failures, propagated unchanged from `reqwest`
//! - Binary framing failures ([`FrameError`]) raised while decoding sample streams
//! - Job outcome failures (canceled, faulted, inconsistent result)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nexus-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used as the inner cause of a domain error
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Domain code prefix for HTTP failures (`N00.<status>`)
pub const HTTP_FAILURE_CODE: &str = "N00";

/// Domain code for response bodies that could not be deserialized
pub const DESERIALIZATION_FAILURE_CODE: &str = "N01";

/// Main error type for nexus-client
#[derive(Debug, Error)]
pub enum Error {
    /// Domain error reported to API callers
    ///
    /// `code` is either `N00.<httpStatus>` (non-success response that survived the
    /// refresh-and-retry policy) or `N01` (response body could not be deserialized).
    #[error("{message}")]
    Api {
        /// Machine-readable domain code
        code: String,
        /// Human-readable message
        message: String,
        /// Optional inner cause
        #[source]
        source: Option<BoxError>,
    },

    /// Transport-level HTTP failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response headers did not arrive within the configured timeout
    #[error("no response within {0:?}")]
    Timeout(std::time::Duration),

    /// Binary sample stream did not match its declared framing
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The operation was canceled, locally or by the server
    #[error("operation canceled: {0}")]
    Canceled(String),

    /// A completed job did not carry a string artifact id
    #[error("the job result is invalid")]
    InvalidJobResult,

    /// The batched catalog lookup did not return an item for a requested path
    #[error("no catalog item returned for resource path {0}")]
    MissingCatalogItem(String),

    /// Archive extraction failed
    #[error("extraction failed for {archive}: {reason}")]
    Extraction {
        /// The archive that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },

    /// A header name or value could not be constructed
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Binary framing errors raised by [`crate::frame`]
///
/// These indicate a protocol mismatch between client and server and are not
/// user-facing domain codes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The response did not declare a content length
    #[error("the data length is unknown")]
    LengthUnknown,

    /// The declared length is not a multiple of the sample width
    #[error("the data length {0} is invalid")]
    LengthInvalid(u64),

    /// The stream ended before the declared number of bytes arrived
    #[error("the stream ended early after {received} of {expected} bytes")]
    StreamEndedEarly {
        /// Declared byte length
        expected: u64,
        /// Bytes actually received before end of stream
        received: u64,
    },
}

impl Error {
    /// Create an `N00.<status>` domain error from a failed HTTP exchange
    ///
    /// The response text is appended to the message when it is not blank.
    pub fn http_failure(status: reqwest::StatusCode, body: &str) -> Self {
        let status = status.as_u16();
        let code = format!("{}.{}", HTTP_FAILURE_CODE, status);
        let message = if body.trim().is_empty() {
            format!("The HTTP request failed with status code {}.", status)
        } else {
            format!(
                "The HTTP request failed with status code {}. The response message is: {}",
                status, body
            )
        };

        Error::Api {
            code,
            message,
            source: None,
        }
    }

    /// Create an `N01` domain error wrapping a deserialization failure
    pub fn deserialization(cause: impl Into<BoxError>) -> Self {
        Error::Api {
            code: DESERIALIZATION_FAILURE_CODE.to_string(),
            message: "Response data could not be deserialized.".to_string(),
            source: Some(cause.into()),
        }
    }

    /// Create a configuration error for the given key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// The domain code (`N00.<status>` or `N01`) if this is a domain error
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// The HTTP status carried by an `N00.<status>` domain error
    pub fn status(&self) -> Option<u16> {
        self.code()?
            .strip_prefix(HTTP_FAILURE_CODE)?
            .strip_prefix('.')?
            .parse()
            .ok()
    }

    /// Whether this error represents a cancellation (local or remote)
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled(_))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn http_failure_without_body_uses_short_message() {
        let err = Error::http_failure(StatusCode::NOT_FOUND, "  ");

        assert_eq!(err.code(), Some("N00.404"));
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.to_string(),
            "The HTTP request failed with status code 404."
        );
    }

    #[test]
    fn http_failure_with_body_appends_response_text() {
        let err = Error::http_failure(StatusCode::BAD_REQUEST, "begin must be before end");

        assert_eq!(err.code(), Some("N00.400"));
        assert!(
            err.to_string()
                .ends_with("The response message is: begin must be before end")
        );
    }

    #[test]
    fn deserialization_error_keeps_inner_cause() {
        let cause = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let err = Error::deserialization(cause);

        assert_eq!(err.code(), Some("N01"));
        assert_eq!(err.status(), None);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn non_domain_errors_have_no_code() {
        let cases = [
            Error::Canceled("The job has been cancelled.".into()),
            Error::InvalidJobResult,
            Error::Frame(FrameError::LengthUnknown),
            Error::MissingCatalogItem("/a/b/c".into()),
        ];

        for err in cases {
            assert_eq!(err.code(), None, "{err:?} must not carry a domain code");
        }
    }

    #[test]
    fn frame_error_messages() {
        assert_eq!(
            FrameError::LengthInvalid(13).to_string(),
            "the data length 13 is invalid"
        );
        assert_eq!(
            FrameError::StreamEndedEarly {
                expected: 16,
                received: 8
            }
            .to_string(),
            "the stream ended early after 8 of 16 bytes"
        );
    }

    #[test]
    fn only_canceled_reports_cancellation() {
        assert!(Error::Canceled("stop".into()).is_canceled());
        assert!(!Error::InvalidJobResult.is_canceled());
    }
}
