//! Resource transformation
//!
//! Every fetched resource passes through a [`ResourceTransformer`] before it
//! is published. A failed transformation only drops that one resource; the
//! publisher keeps going with the survivors.
//!
//! - [`localize`] - the default transformer, which tenant-localizes ids and references

pub mod localize;

pub use localize::LocalizingTransformer;

use crate::domain::{Resource, Result, Tenant};
use chrono::{DateTime, Utc};

/// Request-level inputs available to a transformer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformContext {
    /// Lower bound for normalization registry lookups made while transforming
    pub minimum_registry_cache_time: Option<DateTime<Utc>>,
}

/// Per-resource transformation into the published profile
pub trait ResourceTransformer: Send + Sync {
    /// Transform one resource for `tenant`
    ///
    /// # Errors
    ///
    /// An error means this resource cannot be published. It is never fatal
    /// to the batch.
    fn transform(
        &self,
        resource: &Resource,
        tenant: &Tenant,
        context: &TransformContext,
    ) -> Result<Resource>;
}
