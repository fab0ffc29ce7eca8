use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::CredentialError;

/// Failure classification reported to callers of
/// [`TrailerResolver::resolve`](super::TrailerResolver::resolve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorReason {
    UnknownDomain,
    CredentialUnavailable,
    IdNotFound,
    NoHits,
    NoFormats,
    NoUrl,
    NoTrailerFound,
    NetworkError,
    Timeout,
    MalformedResponse,
}

impl std::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UnknownDomain => "UnknownDomain",
            Self::CredentialUnavailable => "CredentialUnavailable",
            Self::IdNotFound => "IdNotFound",
            Self::NoHits => "NoHits",
            Self::NoFormats => "NoFormats",
            Self::NoUrl => "NoUrl",
            Self::NoTrailerFound => "NoTrailerFound",
            Self::NetworkError => "NetworkError",
            Self::Timeout => "Timeout",
            Self::MalformedResponse => "MalformedResponse",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown domain: {0}")]
    UnknownDomain(String),
    #[error("credential unavailable for {domain}: {source}")]
    CredentialUnavailable {
        domain: String,
        #[source]
        source: Arc<CredentialError>,
    },
    #[error("no scene id in url: {0}")]
    IdNotFound(String),
    #[error("search index returned no hits")]
    NoHits,
    #[error("first hit has no video formats")]
    NoFormats,
    #[error("selected format has no trailer url")]
    NoUrl,
    #[error("no trailer found in release")]
    NoTrailerFound,
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ResolveError {
    /// The public failure classification for this error.
    pub fn reason(&self) -> ErrorReason {
        match self {
            Self::UnknownDomain(_) => ErrorReason::UnknownDomain,
            Self::CredentialUnavailable { .. } => ErrorReason::CredentialUnavailable,
            Self::IdNotFound(_) => ErrorReason::IdNotFound,
            Self::NoHits => ErrorReason::NoHits,
            Self::NoFormats => ErrorReason::NoFormats,
            Self::NoUrl => ErrorReason::NoUrl,
            Self::NoTrailerFound => ErrorReason::NoTrailerFound,
            Self::HttpError(e) if e.is_timeout() => ErrorReason::Timeout,
            Self::HttpError(e) if e.is_decode() => ErrorReason::MalformedResponse,
            Self::HttpError(_) => ErrorReason::NetworkError,
            Self::JsonError(_) | Self::MalformedResponse(_) => ErrorReason::MalformedResponse,
        }
    }
}

/// Errors raised while loading the registry or building the HTTP client.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid registry toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid registry json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("provider {domain} is missing required field `{field}`")]
    MissingField { domain: String, field: &'static str },
    #[error("tls setup failed: {0}")]
    Tls(String),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}
