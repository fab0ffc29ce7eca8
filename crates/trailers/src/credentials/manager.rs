//! Per-domain credential cache with single-flight refresh.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use super::error::CredentialError;
use super::extractor::{EmbeddedConfigExtractor, KeyExtractor, SessionCookieExtractor};
use super::store::CredentialStore;
use super::types::{CredentialRecord, today};
use crate::resolver::registry::{ProviderDescriptor, StrategyKind};

/// Outcome of one refresh, cloned out to every caller that joined it.
pub type RefreshResult = Result<String, Arc<CredentialError>>;

type RefreshFuture = Shared<BoxFuture<'static, RefreshResult>>;

/// Obtains and caches the daily secret each provider requires.
///
/// A cached record is reused only on the UTC day it was acquired. At most one
/// refresh per domain is in flight: callers arriving while it runs await the
/// same attempt and receive its secret or its error. The next caller after it
/// completes starts a new attempt if the store still has no fresh record.
pub struct CredentialManager {
    client: Client,
    store: Arc<dyn CredentialStore>,
    extractors: HashMap<StrategyKind, Arc<dyn KeyExtractor>>,
    /// In-flight refreshes keyed by domain
    in_flight: DashMap<String, RefreshFuture>,
}

impl CredentialManager {
    /// Create a manager with the built-in extractor for each strategy.
    pub fn new(client: Client, store: Arc<dyn CredentialStore>) -> Self {
        let mut extractors: HashMap<StrategyKind, Arc<dyn KeyExtractor>> = HashMap::new();
        extractors.insert(
            StrategyKind::SearchIndex,
            Arc::new(EmbeddedConfigExtractor::default()),
        );
        extractors.insert(StrategyKind::ResourceFetch, Arc::new(SessionCookieExtractor));

        Self {
            client,
            store,
            extractors,
            in_flight: DashMap::new(),
        }
    }

    /// Replace the handshake used for `strategy`.
    pub fn with_extractor(mut self, strategy: StrategyKind, extractor: Arc<dyn KeyExtractor>) -> Self {
        self.extractors.insert(strategy, extractor);
        self
    }

    /// Return today's secret for the provider, performing the handshake if the
    /// cached record is missing or from an earlier day.
    #[instrument(skip(self, provider), fields(domain = %provider.domain, strategy = %provider.strategy))]
    pub async fn acquire(&self, provider: &ProviderDescriptor) -> RefreshResult {
        if let Some(secret) = cached_secret(self.store.as_ref(), &provider.domain).await {
            debug!("Using cached credential from today");
            return Ok(secret);
        }

        let refresh = self.join_refresh(provider)?;
        let result = refresh.clone().await;

        self.in_flight
            .remove_if(&provider.domain, |_, running| running.ptr_eq(&refresh));
        result
    }

    /// Persist buffered records (deferred persistence only).
    pub async fn flush(&self) -> Result<(), CredentialError> {
        self.store.flush().await
    }

    fn join_refresh(&self, provider: &ProviderDescriptor) -> Result<RefreshFuture, Arc<CredentialError>> {
        match self.in_flight.entry(provider.domain.clone()) {
            Entry::Occupied(entry) => {
                debug!("Joining in-flight credential refresh");
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                let extractor = self.extractors.get(&provider.strategy).cloned().ok_or_else(|| {
                    Arc::new(CredentialError::UnsupportedStrategy(
                        provider.strategy.to_string(),
                    ))
                })?;

                let refresh = refresh(
                    self.client.clone(),
                    self.store.clone(),
                    extractor,
                    provider.clone(),
                )
                .boxed()
                .shared();
                entry.insert(refresh.clone());
                Ok(refresh)
            }
        }
    }
}

async fn cached_secret(store: &dyn CredentialStore, domain: &str) -> Option<String> {
    let record = store.get(domain).await?;
    if record.is_fresh_on(today()) {
        Some(record.secret)
    } else {
        debug!(acquired = %record.date, "Cached credential is stale");
        None
    }
}

async fn refresh(
    client: Client,
    store: Arc<dyn CredentialStore>,
    extractor: Arc<dyn KeyExtractor>,
    provider: ProviderDescriptor,
) -> RefreshResult {
    // A previous attempt may have finished between the cache miss and registration.
    if let Some(secret) = cached_secret(store.as_ref(), &provider.domain).await {
        return Ok(secret);
    }

    info!(domain = %provider.domain, "Refreshing provider credential");
    let secret = extractor
        .fetch(&client, &provider)
        .await
        .map_err(|e| {
            debug!(domain = %provider.domain, error = %e, "Credential handshake failed");
            Arc::new(e)
        })?;

    if let Err(e) = store
        .put(&provider.domain, CredentialRecord::acquired_today(secret.clone()))
        .await
    {
        warn!(domain = %provider.domain, error = %e, "Failed to persist refreshed credential");
    }

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{FileCredentialStore, MemoryCredentialStore, PersistencePolicy};
    use crate::resolver::registry::SiteParams;
    use async_trait::async_trait;
    use chrono::Days;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts handshakes and hands out "secret-N".
    #[derive(Default)]
    struct CountingExtractor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl KeyExtractor for CountingExtractor {
        async fn fetch(
            &self,
            _client: &Client,
            _provider: &ProviderDescriptor,
        ) -> Result<String, CredentialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                return Err(CredentialError::MissingCookie("instance_token".into()));
            }
            Ok(format!("secret-{n}"))
        }
    }

    fn test_client() -> Client {
        crate::resolver::default_client(Duration::from_secs(5)).unwrap()
    }

    fn provider() -> ProviderDescriptor {
        ProviderDescriptor::new("a.com", StrategyKind::ResourceFetch, SiteParams::default())
    }

    fn manager(
        store: Arc<dyn CredentialStore>,
        extractor: Arc<CountingExtractor>,
    ) -> CredentialManager {
        CredentialManager::new(test_client(), store)
            .with_extractor(StrategyKind::ResourceFetch, extractor)
    }

    #[tokio::test]
    async fn second_acquire_same_day_hits_cache() {
        let store = Arc::new(MemoryCredentialStore::new());
        let extractor = Arc::new(CountingExtractor::default());
        let manager = manager(store.clone(), extractor.clone());

        assert_eq!(manager.acquire(&provider()).await.unwrap(), "secret-1");
        assert_eq!(manager.acquire(&provider()).await.unwrap(), "secret-1");
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("a.com").await.unwrap().date, today());
    }

    #[tokio::test]
    async fn stale_record_is_refreshed() {
        let store = Arc::new(MemoryCredentialStore::new());
        let yesterday = today().checked_sub_days(Days::new(1)).unwrap();
        store
            .put("a.com", CredentialRecord::new("old", yesterday))
            .await
            .unwrap();
        let extractor = Arc::new(CountingExtractor::default());
        let manager = manager(store.clone(), extractor.clone());

        assert_eq!(manager.acquire(&provider()).await.unwrap(), "secret-1");
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("a.com").await.unwrap().secret, "secret-1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let store = Arc::new(MemoryCredentialStore::new());
        let extractor = Arc::new(CountingExtractor::default());
        let manager = Arc::new(manager(store, extractor.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.acquire(&provider()).await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "secret-1");
        }
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_handshake_leaves_store_untouched() {
        let store = Arc::new(MemoryCredentialStore::new());
        let extractor = Arc::new(CountingExtractor {
            fail: true,
            ..Default::default()
        });
        let manager = manager(store.clone(), extractor);

        let err = manager.acquire(&provider()).await.unwrap_err();
        assert!(matches!(*err, CredentialError::MissingCookie(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_failed_refresh() {
        let store = Arc::new(MemoryCredentialStore::new());
        let extractor = Arc::new(CountingExtractor {
            fail: true,
            ..Default::default()
        });
        let manager = Arc::new(manager(store, extractor.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.acquire(&provider()).await })
            })
            .collect();

        for task in tasks {
            let err = task.await.unwrap().unwrap_err();
            assert!(matches!(*err, CredentialError::MissingCookie(_)));
        }
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

        // A later caller starts a fresh attempt.
        assert!(manager.acquire(&provider()).await.is_err());
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unwritable_cache_still_serves_todays_secret() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let store = Arc::new(
            FileCredentialStore::open(&cache, PersistencePolicy::Immediate)
                .await
                .unwrap(),
        );
        std::fs::write(&cache, b"not a directory").unwrap();

        let extractor = Arc::new(CountingExtractor::default());
        let manager = manager(store, extractor.clone());

        assert_eq!(manager.acquire(&provider()).await.unwrap(), "secret-1");
        assert_eq!(manager.acquire(&provider()).await.unwrap(), "secret-1");
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }
}
