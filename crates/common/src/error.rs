//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias using the shared Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by shared configuration and template machinery
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Template marker pair for key `{key}` not found in markup")]
    MissingTemplateMarker { key: String },

    #[error(
        "Invalid feature flags. Staging and production don't have the same keys. \
         Staging had keys {staging:?} and production had {production:?}"
    )]
    FlagKeyMismatch {
        staging: Vec<String>,
        production: Vec<String>,
    },

    #[error(
        "Invalid feature flags. Local overrides didn't have the same flags as \
         deployment ones. Deployment had keys {deployment:?} and local overrides \
         had {overrides:?}"
    )]
    OverrideKeyMismatch {
        deployment: Vec<String>,
        overrides: Vec<String>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
