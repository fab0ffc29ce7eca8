//! Credential error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while acquiring or persisting a credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Network error during the handshake.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The key page did not contain the embedded configuration block.
    #[error("Embedded configuration block not found at {0}")]
    MissingConfigBlock(String),

    /// The configuration block did not contain the key field.
    #[error("Key field {0} missing from embedded configuration")]
    MissingKey(String),

    /// The handshake response set no session cookie.
    #[error("Missing session cookie: {0}")]
    MissingCookie(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// No key extractor registered for the strategy.
    #[error("Unsupported strategy: {0}")]
    UnsupportedStrategy(String),

    /// Durable storage failure.
    #[error("Storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
