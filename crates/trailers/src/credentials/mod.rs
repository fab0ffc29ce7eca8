//! Credential management.
//!
//! Providers require a short-lived secret (API key or session token) that is
//! valid for one UTC calendar day.
//!
//! # Architecture
//!
//! - [`CredentialRecord`]: durable `{date, secret}` record per domain
//! - [`CredentialStore`]: get/put persistence, see [`PersistencePolicy`]
//! - [`KeyExtractor`]: strategy-specific handshake that obtains a fresh secret
//! - [`CredentialManager`]: cache check, single-flight refresh and persistence

mod error;
mod extractor;
mod manager;
mod store;
mod types;

pub use error::CredentialError;
pub use extractor::{EmbeddedConfigExtractor, KeyExtractor, SessionCookieExtractor};
pub use manager::{CredentialManager, RefreshResult};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, PersistencePolicy};
pub use types::{CredentialRecord, today};
