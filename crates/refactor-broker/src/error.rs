//! Error types for the refactoring broker
//!
//! Only infrastructure faults are represented here. Expected domain failures
//! (symbol not found, naming conflicts, bad source references) travel inside
//! result objects as an [`ErrorKind`](crate::types::ErrorKind).

use thiserror::Error;

use crate::types::ErrorKind;

/// Result type for broker operations
pub type Result<T> = std::result::Result<T, RefactoringError>;

/// Errors that can occur while brokering refactoring operations
#[derive(Debug, Error)]
pub enum RefactoringError {
    /// A provider hit an unexpected internal condition
    #[error("Provider {provider} failed during {operation}: {message}")]
    ProviderFailure {
        provider: String,
        operation: String,
        message: String,
    },

    /// Every candidate provider raised
    #[error("All {attempts} provider(s) failed during {operation}: {last_error}")]
    AllProvidersFailed {
        operation: String,
        attempts: usize,
        last_error: Box<RefactoringError>,
    },

    /// Backup could not be created before a destructive operation
    #[error("Backup failed for operation {operation_id}: {reason}")]
    BackupFailed { operation_id: String, reason: String },

    /// A destructive operation failed after its backup was taken; the backup is kept
    #[error("Operation {operation_id} failed, backup preserved for manual restore: {source}")]
    OperationFailed {
        operation_id: String,
        #[source]
        source: Box<RefactoringError>,
    },

    /// Source could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Other error
    #[error("{0}")]
    Other(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl RefactoringError {
    /// Create a provider failure
    pub fn provider(
        provider: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ProviderFailure {
            provider: provider.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Map a raised error onto the failure taxonomy
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::AllProvidersFailed { .. } => ErrorKind::AllProvidersFailed,
            Self::BackupFailed { .. } => ErrorKind::BackupFailed,
            Self::OperationFailed { source, .. } => source.error_kind(),
            Self::ConfigError(_) | Self::InvalidConfiguration(_) => ErrorKind::ValidationFailed,
            _ => ErrorKind::ProviderFailure,
        }
    }

    /// Operation id embedded in the error, if the backup guard attached one
    pub fn operation_id(&self) -> Option<&str> {
        match self {
            Self::BackupFailed { operation_id, .. }
            | Self::OperationFailed { operation_id, .. } => Some(operation_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_unwraps_operation_failed() {
        let err = RefactoringError::OperationFailed {
            operation_id: "op-1".to_string(),
            source: Box::new(RefactoringError::AllProvidersFailed {
                operation: "rename_symbol".to_string(),
                attempts: 2,
                last_error: Box::new(RefactoringError::provider("a", "rename_symbol", "boom")),
            }),
        };

        assert_eq!(err.error_kind(), ErrorKind::AllProvidersFailed);
        assert_eq!(err.operation_id(), Some("op-1"));
        assert!(err.to_string().contains("op-1"));
    }

    #[test]
    fn test_io_error_is_provider_failure() {
        let err: RefactoringError = std::io::Error::other("disk gone").into();
        assert_eq!(err.error_kind(), ErrorKind::ProviderFailure);
        assert!(err.operation_id().is_none());
    }
}
