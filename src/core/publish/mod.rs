//! Resource publishing
//!
//! - [`publisher`] - [`EventResourcePublisher`], the per-message pipeline
//! - [`cache`] - run-scoped deduplication caches
//! - [`response`] - [`PublishResponse`] and its stable message phrases

pub mod cache;
pub mod publisher;
pub mod response;

pub use cache::{InMemoryRunCache, NoopRunCache, RunCache};
pub use publisher::EventResourcePublisher;
pub use response::{PublishResponse, ResponseStatus};
