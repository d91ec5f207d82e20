//! Error types for the gdrive_cli crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when interacting with Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("No such file or folder: '{}'", .0.display())]
    FileNotFound(PathBuf),

    #[error("'{0}' already exists in your google drive")]
    AlreadyExists(String),

    #[error("{0}")]
    Precondition(String),

    #[error("Glob pattern error: {0}")]
    GlobPatternError(#[from] glob::PatternError),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No credentials found at {}; authorize the CLI with gdrive-auth first", .0.display())]
    MissingCredentials(PathBuf),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<DriveError>,
    },
}

impl DriveError {
    /// Wrap this error with a description of the item it concerns.
    pub fn context(self, context: impl Into<String>) -> Self {
        DriveError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the error is a fatal configuration problem that should stop the process.
    pub fn is_fatal(&self) -> bool {
        match self {
            DriveError::Settings(_) | DriveError::Config(_) | DriveError::MissingCredentials(_) => {
                true
            }
            DriveError::Context { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let err = DriveError::ApiError {
            status: 403,
            message: "forbidden".to_string(),
        }
        .context("cannot trash abc");
        assert_eq!(err.to_string(), "cannot trash abc: API error (403): forbidden");
    }

    #[test]
    fn test_is_fatal() {
        assert!(DriveError::Settings("missing".into()).is_fatal());
        assert!(DriveError::Config("missing".into()).context("download").is_fatal());
        assert!(!DriveError::Validation("bad".into()).is_fatal());
    }
}
