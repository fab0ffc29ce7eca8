use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::error::{ErrorReason, ResolveError};
use super::platforms::{ResourceFetchResolver, SearchIndexResolver};
use super::registry::{DomainRegistry, StrategyKind};
use super::scene::domain_of;
use crate::credentials::{CredentialError, CredentialManager};

/// Outcome of one resolution. Exactly one of `trailer_url` and
/// `error_reason` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    trailer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_reason: Option<ErrorReason>,
}

impl ResolutionResult {
    pub fn found<S: Into<String>>(trailer_url: S) -> Self {
        Self {
            found: true,
            trailer_url: Some(trailer_url.into()),
            error_reason: None,
        }
    }

    pub fn failed(reason: ErrorReason) -> Self {
        Self {
            found: false,
            trailer_url: None,
            error_reason: Some(reason),
        }
    }

    pub fn is_found(&self) -> bool {
        self.found
    }

    pub fn trailer_url(&self) -> Option<&str> {
        self.trailer_url.as_deref()
    }

    pub fn error_reason(&self) -> Option<ErrorReason> {
        self.error_reason
    }
}

impl From<Result<String, ResolveError>> for ResolutionResult {
    fn from(result: Result<String, ResolveError>) -> Self {
        match result {
            Ok(url) => Self::found(url),
            Err(e) => Self::failed(e.reason()),
        }
    }
}

/// One row of a batch resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub url: String,
    #[serde(flatten)]
    pub result: ResolutionResult,
}

/// Entry point: dispatches a scene URL to the strategy its domain uses.
pub struct TrailerResolver {
    registry: Arc<DomainRegistry>,
    credentials: Arc<CredentialManager>,
    search_index: SearchIndexResolver,
    resource_fetch: ResourceFetchResolver,
}

impl TrailerResolver {
    pub fn new(
        registry: Arc<DomainRegistry>,
        credentials: Arc<CredentialManager>,
        client: Client,
    ) -> Self {
        Self {
            registry,
            credentials,
            search_index: SearchIndexResolver::new(client.clone()),
            resource_fetch: ResourceFetchResolver::new(client),
        }
    }

    /// Resolve one scene URL. Never fails: every failure is reported through
    /// [`ResolutionResult::error_reason`] and logged.
    #[instrument(skip(self))]
    pub async fn resolve(&self, url: &str) -> ResolutionResult {
        match self.try_resolve(url).await {
            Ok(trailer) => {
                info!(trailer = %trailer, "Resolved trailer");
                ResolutionResult::found(trailer)
            }
            Err(e) => {
                let reason = e.reason();
                match reason {
                    ErrorReason::NetworkError
                    | ErrorReason::Timeout
                    | ErrorReason::MalformedResponse
                    | ErrorReason::CredentialUnavailable => {
                        warn!(%reason, error = %e, "Trailer resolution failed")
                    }
                    _ => debug!(%reason, error = %e, "No trailer resolved"),
                }
                ResolutionResult::failed(reason)
            }
        }
    }

    /// The fallible pipeline behind [`resolve`](Self::resolve).
    pub async fn try_resolve(&self, url: &str) -> Result<String, ResolveError> {
        let domain = domain_of(url).ok_or_else(|| ResolveError::UnknownDomain(url.to_owned()))?;
        let provider = self
            .registry
            .lookup(&domain)
            .ok_or(ResolveError::UnknownDomain(domain))?;

        let credential = self
            .credentials
            .acquire(&provider)
            .await
            .map_err(|source| ResolveError::CredentialUnavailable {
                domain: provider.domain.clone(),
                source,
            })?;

        match provider.strategy {
            StrategyKind::SearchIndex => {
                self.search_index
                    .resolve(url, &credential, &provider)
                    .await
            }
            StrategyKind::ResourceFetch => {
                self.resource_fetch
                    .resolve(url, &credential, &provider)
                    .await
            }
        }
    }

    /// Resolve many URLs with at most `max_concurrent` in flight. Results keep
    /// the input order.
    pub async fn resolve_many<I, S>(&self, urls: I, max_concurrent: usize) -> Vec<BatchEntry>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        stream::iter(urls.into_iter().map(Into::into))
            .map(|url: String| async move {
                let result = self.resolve(&url).await;
                BatchEntry { url, result }
            })
            .buffered(max_concurrent.max(1))
            .collect()
            .await
    }

    /// Flush buffered credentials. Call once on orderly shutdown.
    pub async fn shutdown(&self) -> Result<(), CredentialError> {
        self.credentials.flush().await
    }
}
