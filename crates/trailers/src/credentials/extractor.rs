//! Strategy-specific credential handshakes.
//!
//! Each [`KeyExtractor`] knows how to obtain a fresh secret for one
//! [`StrategyKind`](crate::resolver::registry::StrategyKind). The
//! pattern-matching lives here so it can be swapped without touching the
//! resolvers.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::debug;

use super::error::CredentialError;
use crate::resolver::registry::ProviderDescriptor;
use crate::resolver::request::{ProviderClient, parse_set_cookies};
use crate::resolver::utils::{capture_group_1, non_empty};

static WINDOW_ENV_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)window\.env\s*=\s*(\{.+?\});").unwrap());

#[async_trait]
pub trait KeyExtractor: Send + Sync {
    /// Perform the handshake and return a fresh secret.
    async fn fetch(
        &self,
        client: &Client,
        provider: &ProviderDescriptor,
    ) -> Result<String, CredentialError>;
}

/// Scrapes a JSON configuration block embedded in a public page and reads the
/// key at the provider's `key_pointer`.
#[derive(Debug, Clone)]
pub struct EmbeddedConfigExtractor {
    pattern: Regex,
}

impl Default for EmbeddedConfigExtractor {
    fn default() -> Self {
        Self {
            pattern: WINDOW_ENV_REGEX.clone(),
        }
    }
}

impl EmbeddedConfigExtractor {
    /// Use a custom pattern. Capture group 1 must match the JSON object.
    pub fn with_pattern(pattern: Regex) -> Self {
        Self { pattern }
    }

    /// Extract the key from a page body.
    pub fn extract_key(&self, body: &str, pointer: &str) -> Result<String, CredentialError> {
        let block = capture_group_1(&self.pattern, body)
            .ok_or_else(|| CredentialError::MissingConfigBlock(self.pattern.to_string()))?;
        let config: serde_json::Value = serde_json::from_str(block)
            .map_err(|e| CredentialError::ParseError(format!("embedded configuration: {e}")))?;

        config
            .pointer(pointer)
            .and_then(|v| v.as_str())
            .and_then(non_empty)
            .map(ToOwned::to_owned)
            .ok_or_else(|| CredentialError::MissingKey(pointer.to_owned()))
    }
}

#[async_trait]
impl KeyExtractor for EmbeddedConfigExtractor {
    async fn fetch(
        &self,
        client: &Client,
        provider: &ProviderDescriptor,
    ) -> Result<String, CredentialError> {
        let url = provider.key_source_url();
        debug!(domain = %provider.domain, %url, "Fetching embedded configuration");

        let body = ProviderClient::new(&provider.domain, client.clone())
            .get(&url)
            .send()
            .await?
            .text()
            .await?;

        self.extract_key(&body, provider.key_pointer())
            .map_err(|e| match e {
                CredentialError::MissingConfigBlock(_) => CredentialError::MissingConfigBlock(url),
                other => other,
            })
    }
}

/// Reads a session token from a cookie set by an unauthenticated request to
/// the provider's site root.
#[derive(Debug, Clone, Default)]
pub struct SessionCookieExtractor;

#[async_trait]
impl KeyExtractor for SessionCookieExtractor {
    async fn fetch(
        &self,
        client: &Client,
        provider: &ProviderDescriptor,
    ) -> Result<String, CredentialError> {
        let url = provider.site_host();
        let cookie_name = provider.token_cookie();
        debug!(domain = %provider.domain, %url, cookie = cookie_name, "Fetching session cookie");

        // Status is ignored: error pages also set the cookie.
        let response = ProviderClient::new(&provider.domain, client.clone())
            .get(&url)
            .send()
            .await?;
        let status = response.status();

        parse_set_cookies(response.headers())
            .remove(cookie_name)
            .ok_or_else(|| {
                debug!(domain = %provider.domain, %status, "Handshake response set no session cookie");
                CredentialError::MissingCookie(cookie_name.to_owned())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><script>
        window.env = {"api":{"algolia":{"apiKey":"abc123","appId":"X"}},"flags":{}};
        window.other = {};
    </script></html>"#;

    #[test]
    fn extracts_nested_key() {
        let key = EmbeddedConfigExtractor::default()
            .extract_key(PAGE, "/api/algolia/apiKey")
            .unwrap();
        assert_eq!(key, "abc123");
    }

    #[test]
    fn missing_block_and_missing_key_are_distinct() {
        let extractor = EmbeddedConfigExtractor::default();
        assert!(matches!(
            extractor.extract_key("<html></html>", "/api/algolia/apiKey"),
            Err(CredentialError::MissingConfigBlock(_))
        ));
        assert!(matches!(
            extractor.extract_key(PAGE, "/api/search/apiKey"),
            Err(CredentialError::MissingKey(_))
        ));
    }

    #[test]
    fn custom_pattern() {
        let extractor =
            EmbeddedConfigExtractor::with_pattern(Regex::new(r"__CONFIG__\s*=\s*(\{.*?\})\s*</script>").unwrap());
        let key = extractor
            .extract_key(r#"<script>__CONFIG__ = {"key":"k9"}</script>"#, "/key")
            .unwrap();
        assert_eq!(key, "k9");
    }
}
