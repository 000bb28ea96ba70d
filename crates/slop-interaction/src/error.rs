//! Errors surfaced by completion calls.

use thiserror::Error;

/// Failure of a completion or model-listing call.
///
/// `Aborted` is not a failure in the usual sense: it marks a stream that was
/// cancelled by the caller or superseded by a newer call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// Non-2xx response; carries the response body text.
    #[error("API Error: {status} - {body}")]
    Http { status: u16, body: String },

    /// The request could not be sent or the body could not be read.
    #[error("Network error: {0}")]
    Network(String),

    /// The stream was cancelled before it finished.
    #[error("Request aborted")]
    Aborted,

    /// A 2xx response whose body did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Check if this marks a cancelled stream rather than a real failure
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
