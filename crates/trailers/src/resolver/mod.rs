pub mod error;
pub mod facade;
pub mod formats;
pub mod platforms;
pub mod registry;
pub mod request;
pub mod scene;
pub mod utils;
mod default;

pub use default::{DEFAULT_TIMEOUT, DEFAULT_UA, default_client, default_resolver};
pub use error::{ConfigError, ErrorReason, ResolveError};
pub use facade::{BatchEntry, ResolutionResult, TrailerResolver};
