use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use trailers_parser::credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use trailers_parser::resolver::registry::{DomainRegistry, StrategyKind};
use trailers_parser::{TrailerResolver, default_resolver};

use crate::{
    cli::OutputFormat,
    config::AppConfig,
    error::{AppError, Result},
    output::OutputManager,
};

#[derive(Debug, Serialize)]
struct ProviderRow<'a> {
    domain: &'a str,
    strategy: StrategyKind,
}

pub struct CommandExecutor {
    config: AppConfig,
    registry_override: Option<PathBuf>,
    no_cache: bool,
    output: OutputManager,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, output: OutputFormat) -> Self {
        Self {
            config,
            registry_override: None,
            no_cache: false,
            output: OutputManager::new(output),
        }
    }

    pub fn with_registry(mut self, registry: Option<PathBuf>) -> Self {
        self.registry_override = registry;
        self
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    fn load_registry(&self) -> Result<DomainRegistry> {
        let path = self
            .registry_override
            .clone()
            .or_else(|| self.config.registry_path())
            .ok_or_else(|| AppError::InvalidInput("no registry configured".to_string()))?;

        if !path.exists() {
            return Err(AppError::RegistryNotFound(path));
        }

        let registry = DomainRegistry::load(&path)?;
        debug!(path = %path.display(), providers = registry.len(), "Loaded provider registry");
        Ok(registry)
    }

    async fn open_store(&self) -> Result<Arc<dyn CredentialStore>> {
        if self.no_cache {
            return Ok(Arc::new(MemoryCredentialStore::new()));
        }

        match self.config.cache_dir() {
            Some(dir) => {
                let store = FileCredentialStore::open(dir, self.config.persistence).await?;
                Ok(Arc::new(store))
            }
            None => {
                warn!("No cache directory available; credentials will not be persisted");
                Ok(Arc::new(MemoryCredentialStore::new()))
            }
        }
    }

    async fn build_resolver(&self) -> Result<TrailerResolver> {
        let registry = self.load_registry()?;
        let store = self.open_store().await?;
        Ok(default_resolver(registry, store, self.config.timeout())?)
    }

    /// Resolve the given URLs. One URL prints a single result object, several
    /// print an array of entries.
    pub async fn resolve_urls(&self, urls: Vec<String>) -> Result<()> {
        let resolver = self.build_resolver().await?;

        if let [url] = urls.as_slice() {
            let result = resolver.resolve(url).await;
            self.output.print(&result)?;
        } else {
            let entries = resolver
                .resolve_many(urls, self.config.max_concurrent)
                .await;
            self.output.print(&entries)?;
        }

        Self::shutdown(&resolver).await;
        Ok(())
    }

    pub async fn batch(&self, input: &str, max_concurrent: Option<usize>) -> Result<()> {
        let content = if input == "-" {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer
        } else {
            tokio::fs::read_to_string(input).await?
        };

        let urls = parse_url_list(&content);
        let max_concurrent = max_concurrent.unwrap_or(self.config.max_concurrent);
        info!(urls = urls.len(), max_concurrent, "Starting batch resolution");

        let resolver = self.build_resolver().await?;
        let entries = resolver.resolve_many(urls, max_concurrent).await;

        let found = entries.iter().filter(|e| e.result.is_found()).count();
        info!(found, total = entries.len(), "Batch resolution finished");

        self.output.print(&entries)?;
        Self::shutdown(&resolver).await;
        Ok(())
    }

    pub fn list_providers(&self) -> Result<()> {
        let registry = self.load_registry()?;
        let rows: Vec<ProviderRow<'_>> = registry
            .iter()
            .map(|p| ProviderRow {
                domain: &p.domain,
                strategy: p.strategy,
            })
            .collect();
        self.output.print(&rows)
    }

    async fn shutdown(resolver: &TrailerResolver) {
        if let Err(e) = resolver.shutdown().await {
            warn!(error = %e, "Failed to flush credential cache");
        }
    }
}

/// Newline-separated URLs; blank lines and `#` comments are skipped.
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect()
}
