//! One module per resolution strategy.

pub mod resource_fetch;
pub mod search_index;

pub use resource_fetch::ResourceFetchResolver;
pub use search_index::SearchIndexResolver;
