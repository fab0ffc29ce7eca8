use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use rustls::{ClientConfig, crypto::aws_lc_rs};
use rustls_platform_verifier::BuilderVerifierExt;

use super::error::ConfigError;
use super::facade::TrailerResolver;
use super::registry::DomainRegistry;
use crate::credentials::{CredentialManager, CredentialStore};

pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Per-call timeout applied to every outbound request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn default_client(timeout: Duration) -> Result<Client, ConfigError> {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(e.to_string()))?
        .with_platform_verifier()
        .map_err(|e| ConfigError::Tls(e.to_string()))?
        .with_no_client_auth();

    let client = Client::builder()
        .use_preconfigured_tls(tls_config)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Returns a [`TrailerResolver`] wired with the default client and both
/// built-in strategies.
pub fn default_resolver(
    registry: DomainRegistry,
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
) -> Result<TrailerResolver, ConfigError> {
    let client = default_client(timeout)?;
    let credentials = CredentialManager::new(client.clone(), store);
    Ok(TrailerResolver::new(
        Arc::new(registry),
        Arc::new(credentials),
        client,
    ))
}
