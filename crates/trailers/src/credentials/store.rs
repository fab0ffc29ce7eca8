//! Credential persistence.
//!
//! The manager only needs a get/put contract. [`MemoryCredentialStore`] keeps
//! records for the process lifetime; [`FileCredentialStore`] persists them to
//! a directory under one of two [`PersistencePolicy`] values.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::CredentialError;
use super::types::CredentialRecord;

/// Aggregate document written by the deferred policy.
const AGGREGATE_FILE: &str = "trailer_tokens.json";

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The stored record for `domain`, fresh or not.
    async fn get(&self, domain: &str) -> Option<CredentialRecord>;

    /// Replace the record for `domain`.
    async fn put(&self, domain: &str, record: CredentialRecord) -> Result<(), CredentialError>;

    /// Write any buffered records. Called on orderly shutdown.
    async fn flush(&self) -> Result<(), CredentialError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, domain: &str) -> Option<CredentialRecord> {
        self.entries.read().await.get(domain).cloned()
    }

    async fn put(&self, domain: &str, record: CredentialRecord) -> Result<(), CredentialError> {
        self.entries.write().await.insert(domain.to_owned(), record);
        Ok(())
    }
}

/// When refreshed credentials reach the disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Every put writes `<dir>/<domain>.json` before returning.
    #[default]
    Immediate,
    /// Puts are buffered and written as one aggregate document on
    /// [`CredentialStore::flush`]. An abnormal exit loses every record
    /// acquired since the last flush.
    Deferred,
}

impl fmt::Display for PersistencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("immediate"),
            Self::Deferred => f.write_str("deferred"),
        }
    }
}

impl FromStr for PersistencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "deferred" => Ok(Self::Deferred),
            other => Err(format!("unknown persistence policy: {other}")),
        }
    }
}

/// Directory-backed store.
///
/// On open, the aggregate document is loaded first and per-domain files
/// override it, so records written under either policy are picked up.
#[derive(Debug)]
pub struct FileCredentialStore {
    dir: PathBuf,
    policy: PersistencePolicy,
    entries: RwLock<HashMap<String, CredentialRecord>>,
    dirty: AtomicBool,
}

impl FileCredentialStore {
    pub async fn open<P: Into<PathBuf>>(
        dir: P,
        policy: PersistencePolicy,
    ) -> Result<Self, CredentialError> {
        let dir = dir.into();
        let mut entries: HashMap<String, CredentialRecord> = HashMap::new();

        if let Some(aggregate) =
            read_json::<HashMap<String, CredentialRecord>>(&dir.join(AGGREGATE_FILE)).await?
        {
            entries.extend(aggregate);
        }

        match tokio::fs::read_dir(&dir).await {
            Ok(mut read_dir) => {
                while let Some(entry) = read_dir
                    .next_entry()
                    .await
                    .map_err(|source| storage_error(&dir, source))?
                {
                    let path = entry.path();
                    if path.extension().is_none_or(|ext| ext != "json")
                        || path.file_name().is_some_and(|name| name == AGGREGATE_FILE)
                    {
                        continue;
                    }
                    let Some(domain) = path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    if let Some(record) = read_json::<CredentialRecord>(&path).await? {
                        entries.insert(domain.to_owned(), record);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(storage_error(&dir, source)),
        }

        debug!(dir = %dir.display(), %policy, loaded = entries.len(), "Opened credential store");

        Ok(Self {
            dir,
            policy,
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        })
    }

    fn record_path(&self, domain: &str) -> PathBuf {
        let name: String = domain
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, domain: &str) -> Option<CredentialRecord> {
        self.entries.read().await.get(domain).cloned()
    }

    async fn put(&self, domain: &str, record: CredentialRecord) -> Result<(), CredentialError> {
        match self.policy {
            PersistencePolicy::Immediate => {
                let path = self.record_path(domain);
                self.entries
                    .write()
                    .await
                    .insert(domain.to_owned(), record.clone());
                write_json_atomic(&path, &record).await?;
            }
            PersistencePolicy::Deferred => {
                self.entries.write().await.insert(domain.to_owned(), record);
                self.dirty.store(true, Ordering::Release);
            }
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), CredentialError> {
        if self.policy != PersistencePolicy::Deferred || !self.dirty.swap(false, Ordering::AcqRel)
        {
            return Ok(());
        }

        let snapshot = self.entries.read().await.clone();
        let result = write_json_atomic(&self.dir.join(AGGREGATE_FILE), &snapshot).await;
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        } else {
            debug!(dir = %self.dir.display(), records = snapshot.len(), "Flushed credentials");
        }
        result
    }
}

fn storage_error(path: &Path, source: std::io::Error) -> CredentialError {
    CredentialError::Storage {
        path: path.to_path_buf(),
        source,
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CredentialError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable credential file");
                Ok(None)
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(storage_error(path, source)),
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CredentialError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| storage_error(parent, source))?;
    }

    let data = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data)
        .await
        .map_err(|source| storage_error(&tmp, source))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| storage_error(path, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::today;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[tokio::test]
    async fn memory_store_replaces_records() {
        let store = MemoryCredentialStore::new();
        assert!(store.get("a.com").await.is_none());

        store
            .put("a.com", CredentialRecord::new("one", day(1)))
            .await
            .unwrap();
        store
            .put("a.com", CredentialRecord::new("two", day(2)))
            .await
            .unwrap();

        assert_eq!(store.get("a.com").await.unwrap().secret, "two");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn immediate_policy_writes_per_domain_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::open(dir.path(), PersistencePolicy::Immediate)
            .await
            .unwrap();

        store
            .put("a.com", CredentialRecord::acquired_today("key-a"))
            .await
            .unwrap();

        let on_disk: CredentialRecord =
            serde_json::from_slice(&std::fs::read(dir.path().join("a.com.json")).unwrap())
                .unwrap();
        assert_eq!(on_disk.secret, "key-a");
        assert_eq!(on_disk.date, today());
        assert!(!dir.path().join(AGGREGATE_FILE).exists());

        let reopened = FileCredentialStore::open(dir.path(), PersistencePolicy::Immediate)
            .await
            .unwrap();
        assert_eq!(reopened.get("a.com").await.unwrap().secret, "key-a");
    }

    #[tokio::test]
    async fn deferred_policy_writes_only_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::open(dir.path(), PersistencePolicy::Deferred)
            .await
            .unwrap();

        store
            .put("a.com", CredentialRecord::new("key-a", day(3)))
            .await
            .unwrap();
        store
            .put("b.com", CredentialRecord::new("key-b", day(3)))
            .await
            .unwrap();
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());

        store.flush().await.unwrap();

        let aggregate: HashMap<String, CredentialRecord> =
            serde_json::from_slice(&std::fs::read(dir.path().join(AGGREGATE_FILE)).unwrap())
                .unwrap();
        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate["b.com"].secret, "key-b");

        let reopened = FileCredentialStore::open(dir.path(), PersistencePolicy::Immediate)
            .await
            .unwrap();
        assert_eq!(reopened.get("a.com").await.unwrap().secret, "key-a");
    }

    #[tokio::test]
    async fn per_domain_files_override_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let aggregate = HashMap::from([(
            "a.com".to_string(),
            CredentialRecord::new("old", day(1)),
        )]);
        std::fs::write(
            dir.path().join(AGGREGATE_FILE),
            serde_json::to_vec(&aggregate).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.com.json"),
            serde_json::to_vec(&CredentialRecord::new("new", day(2))).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.com.json"), b"not json").unwrap();

        let store = FileCredentialStore::open(dir.path(), PersistencePolicy::Immediate)
            .await
            .unwrap();
        assert_eq!(store.get("a.com").await.unwrap().secret, "new");
        assert!(store.get("broken.com").await.is_none());
    }

    #[tokio::test]
    async fn missing_directory_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::open(dir.path().join("nested"), PersistencePolicy::Immediate)
            .await
            .unwrap();
        assert!(store.get("a.com").await.is_none());

        store
            .put("a.com", CredentialRecord::acquired_today("k"))
            .await
            .unwrap();
        assert!(dir.path().join("nested").join("a.com.json").exists());
    }

    #[tokio::test]
    async fn failed_write_keeps_record_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let store = FileCredentialStore::open(&cache, PersistencePolicy::Immediate)
            .await
            .unwrap();
        std::fs::write(&cache, b"not a directory").unwrap();

        let result = store
            .put("a.com", CredentialRecord::acquired_today("k"))
            .await;

        assert!(matches!(result, Err(CredentialError::Storage { .. })));
        assert_eq!(store.get("a.com").await.unwrap().secret, "k");
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Deferred".parse::<PersistencePolicy>(), Ok(PersistencePolicy::Deferred));
        assert_eq!(PersistencePolicy::default(), PersistencePolicy::Immediate);
        assert!("sometimes".parse::<PersistencePolicy>().is_err());
    }
}
