//! Trailer URL resolution for provider-hosted scenes.
//!
//! Given a scene's public page URL, [`resolver::TrailerResolver`] looks the
//! host up in a [`resolver::registry::DomainRegistry`], obtains a daily
//! credential through [`credentials::CredentialManager`] and queries the
//! provider backend for the best available trailer.

pub mod credentials;
pub mod resolver;

pub use resolver::{
    BatchEntry, ErrorReason, ResolutionResult, TrailerResolver, default_client, default_resolver,
};
