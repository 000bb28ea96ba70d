//! Error types for the SLOP core.

use serde::Serialize;
use thiserror::Error;

/// Failures raised by the domain model and the persistence port.
///
/// Adapters convert their native errors into one of these variants so the
/// layers above only match on `SlopError`.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum SlopError {
    /// A session (or other keyed record) does not exist.
    #[error("{entity_type} '{id}' not found")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The file system refused an operation.
    #[error("I/O failure: {message}")]
    Io { message: String },

    /// The key-value store could not be reached or locked.
    #[error("Store unavailable: {0}")]
    DataAccess(String),

    /// A stored value could not be encoded or decoded.
    #[error("Could not process {format} data: {message}")]
    Serialization { format: &'static str, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Rejected user input. Displayed as-is to the user.
    #[error("{0}")]
    Validation(String),

    #[error("Unexpected failure: {0}")]
    Internal(String),
}

impl SlopError {
    // ============================================================================
    // Constructors
    // ============================================================================

    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    fn serialization(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            format,
            message: err.to_string(),
        }
    }

    // ============================================================================
    // Predicates
    // ============================================================================

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    pub fn is_data_access(&self) -> bool {
        matches!(self, Self::DataAccess(_))
    }

    /// True when stored data is unreadable, e.g. a corrupt sessions record.
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<std::io::Error> for SlopError {
    fn from(err: std::io::Error) -> Self {
        Self::io(format!("{} ({:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for SlopError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("JSON", err)
    }
}

impl From<toml::de::Error> for SlopError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization("TOML", err)
    }
}

impl From<toml::ser::Error> for SlopError {
    fn from(err: toml::ser::Error) -> Self {
        Self::serialization("TOML", err)
    }
}

impl From<anyhow::Error> for SlopError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, SlopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_conversion_keeps_kind() {
        let err: SlopError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(err.is_io());
        assert!(err.to_string().contains("PermissionDenied"));
    }

    #[test]
    fn test_json_conversion_is_serialization() {
        let err: SlopError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(err.is_serialization());
        assert!(err.to_string().starts_with("Could not process JSON data"));
    }

    #[test]
    fn test_data_access_names_the_store() {
        let err = SlopError::data_access("Failed to acquire exclusive lock: busy");
        assert!(err.is_data_access());
        assert!(!err.is_io());
        assert_eq!(err.to_string(), "Store unavailable: Failed to acquire exclusive lock: busy");
    }

    #[test]
    fn test_not_found_names_the_record() {
        let err = SlopError::not_found("Session", "abc-1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Session 'abc-1' not found");
    }

    #[test]
    fn test_validation_displays_message_verbatim() {
        let err = SlopError::validation("Please optimize a prompt first.");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Please optimize a prompt first.");
    }
}
