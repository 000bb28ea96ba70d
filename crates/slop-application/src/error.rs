//! Errors returned by orchestrator operations.

use slop_core::SlopError;
use slop_interaction::CompletionError;
use thiserror::Error;

/// Rejections and failures of orchestrator operations.
///
/// Streaming failures are not returned here: they are rendered through the
/// event channel and reported as [`crate::RunOutcome::Failed`].
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Input rejected before any network call; the message is user-facing.
    #[error("{0}")]
    Validation(String),

    /// A conflicting stream is active.
    #[error("Another request is still streaming. Stop it first.")]
    Busy,

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Storage(SlopError),
}

impl OrchestratorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

impl From<SlopError> for OrchestratorError {
    fn from(err: SlopError) -> Self {
        match err {
            SlopError::Validation(message) => Self::Validation(message),
            other => Self::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
