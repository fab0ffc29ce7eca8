//! Domain registry: which provider strategy serves which domain.
//!
//! The registry is configuration, not code. It is loaded once (usually from a
//! TOML file) and shared read-only for the lifetime of the process.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::scene::{normalize_host, provider_key};
use super::utils::expand_template;

const DEFAULT_SITE_HOST: &str = "https://www.{domain}";
const DEFAULT_KEY_SOURCE_URL: &str = "https://www.{domain}/en";
const DEFAULT_INDEX_URL: &str = "https://{application_id}-dsn.algolia.net/1/indexes/all_scenes/query";
const DEFAULT_CLIENT_AGENT: &str = "Algolia for JavaScript (4.22.1); Browser";
const DEFAULT_KEY_POINTER: &str = "/api/algolia/apiKey";
const DEFAULT_API_BASE: &str = "https://site-api.project1service.com";
const DEFAULT_TOKEN_COOKIE: &str = "instance_token";
const DEFAULT_TOKEN_HEADER: &str = "Instance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SearchIndex,
    ResourceFetch,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SearchIndex => f.write_str("search_index"),
            Self::ResourceFetch => f.write_str("resource_fetch"),
        }
    }
}

/// Strategy-specific site parameters.
///
/// Every field is optional in the file; accessors on [`ProviderDescriptor`]
/// fill in defaults. URL-valued fields are templates accepting `{domain}`,
/// `{provider}` and `{application_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteParams {
    /// Canonical site used for `Origin`/`Referer` and as the handshake root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_host: Option<String>,
    /// Page embedding the search-index key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_source_url: Option<String>,
    /// JSON pointer to the key inside the embedded configuration block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pointer: Option<String>,
    /// Shared application identifier of the search index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,
    /// Base of the per-scene release API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Cookie carrying the session token after the handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_cookie: Option<String>,
    /// Request header the session token is sent in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_header: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub domain: String,
    pub strategy: StrategyKind,
    pub params: SiteParams,
}

impl ProviderDescriptor {
    pub fn new<S: AsRef<str>>(domain: S, strategy: StrategyKind, params: SiteParams) -> Self {
        Self {
            domain: normalize_host(domain.as_ref()),
            strategy,
            params,
        }
    }

    fn expand(&self, template: &str) -> String {
        expand_template(
            template,
            &[
                ("domain", self.domain.as_str()),
                (
                    "provider",
                    provider_key(&self.domain).unwrap_or(self.domain.as_str()),
                ),
                ("application_id", self.application_id().unwrap_or_default()),
            ],
        )
    }

    pub fn site_host(&self) -> String {
        let template = self.params.site_host.as_deref().unwrap_or(DEFAULT_SITE_HOST);
        self.expand(template).trim_end_matches('/').to_owned()
    }

    pub fn key_source_url(&self) -> String {
        let template = self
            .params
            .key_source_url
            .as_deref()
            .unwrap_or(DEFAULT_KEY_SOURCE_URL);
        self.expand(template)
    }

    pub fn key_pointer(&self) -> &str {
        self.params
            .key_pointer
            .as_deref()
            .unwrap_or(DEFAULT_KEY_POINTER)
    }

    pub fn application_id(&self) -> Option<&str> {
        self.params.application_id.as_deref()
    }

    pub fn client_agent(&self) -> &str {
        self.params
            .client_agent
            .as_deref()
            .unwrap_or(DEFAULT_CLIENT_AGENT)
    }

    pub fn index_url(&self) -> String {
        let template = self.params.index_url.as_deref().unwrap_or(DEFAULT_INDEX_URL);
        self.expand(template)
    }

    pub fn api_base(&self) -> String {
        let template = self.params.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        self.expand(template).trim_end_matches('/').to_owned()
    }

    pub fn token_cookie(&self) -> &str {
        self.params
            .token_cookie
            .as_deref()
            .unwrap_or(DEFAULT_TOKEN_COOKIE)
    }

    pub fn token_header(&self) -> &str {
        self.params
            .token_header
            .as_deref()
            .unwrap_or(DEFAULT_TOKEN_HEADER)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy == StrategyKind::SearchIndex && self.application_id().is_none() {
            return Err(ConfigError::MissingField {
                domain: self.domain.clone(),
                field: "application_id",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProviderEntry {
    strategy: StrategyKind,
    #[serde(flatten)]
    params: SiteParams,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    providers: BTreeMap<String, ProviderEntry>,
}

/// Read-only map from domain to [`ProviderDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    providers: BTreeMap<String, Arc<ProviderDescriptor>>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a provider. Returns `self` for chaining in code-built registries.
    pub fn with_provider(mut self, descriptor: ProviderDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn insert(&mut self, descriptor: ProviderDescriptor) {
        self.providers
            .insert(descriptor.domain.clone(), Arc::new(descriptor));
    }

    /// Look up a host. `www.` and letter case are ignored.
    pub fn lookup(&self, host: &str) -> Option<Arc<ProviderDescriptor>> {
        self.providers.get(&normalize_host(host)).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.values().map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: RegistryFile = toml::from_str(s)?;
        Self::from_file(file)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let file: RegistryFile = serde_json::from_str(s)?;
        Self::from_file(file)
    }

    /// Load a registry file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    fn from_file(file: RegistryFile) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (domain, entry) in file.providers {
            let descriptor = ProviderDescriptor::new(domain, entry.strategy, entry.params);
            descriptor.validate()?;
            registry.insert(descriptor);
        }
        Ok(registry)
    }
}

impl FromStr for DomainRegistry {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[providers."www.Alpha-Studio.com"]
strategy = "search_index"
application_id = "APPID123"

[providers."beta.com"]
strategy = "resource_fetch"
api_base = "https://site-api.{provider}.net/"
"#;

    #[test]
    fn loads_toml_and_normalizes_domains() {
        let registry: DomainRegistry = SAMPLE.parse().unwrap();
        assert_eq!(registry.len(), 2);

        let alpha = registry.lookup("WWW.alpha-studio.com").unwrap();
        assert_eq!(alpha.domain, "alpha-studio.com");
        assert_eq!(alpha.strategy, StrategyKind::SearchIndex);
        assert_eq!(alpha.site_host(), "https://www.alpha-studio.com");
        assert_eq!(alpha.key_source_url(), "https://www.alpha-studio.com/en");
        assert_eq!(
            alpha.index_url(),
            "https://APPID123-dsn.algolia.net/1/indexes/all_scenes/query"
        );
        assert_eq!(alpha.key_pointer(), "/api/algolia/apiKey");

        let beta = registry.lookup("beta.com").unwrap();
        assert_eq!(beta.strategy, StrategyKind::ResourceFetch);
        assert_eq!(beta.api_base(), "https://site-api.beta.net");
        assert_eq!(beta.token_cookie(), "instance_token");
        assert_eq!(beta.token_header(), "Instance");

        assert!(registry.lookup("gamma.com").is_none());
    }

    #[test]
    fn search_index_requires_application_id() {
        let err = DomainRegistry::from_toml_str(
            r#"
[providers."alpha.com"]
strategy = "search_index"
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                field: "application_id",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = DomainRegistry::from_toml_str(
            r#"
[providers."alpha.com"]
strategy = "carrier_pigeon"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn loads_json_registry() {
        let registry = DomainRegistry::from_json_str(
            r#"{"providers": {"beta.com": {"strategy": "resource_fetch", "token_cookie": "sid"}}}"#,
        )
        .unwrap();
        assert_eq!(registry.lookup("beta.com").unwrap().token_cookie(), "sid");
    }

    #[test]
    fn empty_file_is_empty_registry() {
        let registry = DomainRegistry::from_toml_str("").unwrap();
        assert!(registry.is_empty());
    }
}
