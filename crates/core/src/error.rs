//! Error types surfaced by the API client, cache and validators.

use thiserror::Error;

/// Message shown when the server rejects a request without explaining why.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Failure of a client-side input check. Requests are never issued when one of these is raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Name of the offending input.
    pub field: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl ValidationError {
    /// Build an error for `field`.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors returned by every network-facing operation.
///
/// The type is `Clone` so a single in-flight fetch can hand the same outcome to
/// every caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with a non-success status.
    #[error("{message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message taken from the error payload, or [`GENERIC_FAILURE`].
        message: String,
    },
    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
    /// No usable session exists for an authenticated call.
    #[error("not signed in")]
    Unauthenticated,
    /// Input rejected before any request was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ApiError {
    /// True when the server rejected the access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Server { status: 401, .. })
    }

    /// True when the server refused the credentials outright (401 or 403).
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Server { status: 401 | 403, .. })
    }

    /// Text suitable for a notification body.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            Self::Decode(_) => GENERIC_FAILURE.to_string(),
            Self::Unauthenticated => "Please log in again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
