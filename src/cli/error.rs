//! CLI error type

use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;
use crate::export::ExportError;
use crate::import::ImportError;
use crate::transform::TransformError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Failed to write {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Transformation failed: {0}")]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CliError {
    /// Message printed to stderr before exiting
    pub fn user_message(&self) -> String {
        match self {
            CliError::Api(e) => e.user_message(),
            CliError::Config(msg) => format!(
                "Configuration error: {msg}\n\n\
                Hint: run 'docschema configure' to create a profile"
            ),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_delegates_to_api_error() {
        let err = CliError::from(ApiError::Authentication("bad password".to_string()));
        assert!(err.user_message().contains("docschema configure"));

        let err = CliError::InvalidArgument("--id is required".to_string());
        assert_eq!(err.user_message(), "Invalid argument: --id is required");
    }
}
