//! EHR access trait
//!
//! [`FhirService`] abstracts the vendor EHR the relay reads resources from.
//! Implementations may fail; those failures are the only source of fetch
//! errors in the pipeline.

use crate::domain::{DateRange, Resource, Result, Tenant};
use async_trait::async_trait;
use std::collections::HashMap;

/// Read access to a tenant's EHR FHIR API
#[async_trait]
pub trait FhirService: Send + Sync {
    /// Fetch a single resource by its unlocalized id
    ///
    /// Returns `Ok(None)` when the EHR has no such resource.
    async fn get_by_id(
        &self,
        tenant: &Tenant,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<Resource>>;

    /// Fetch several resources in one call, keyed by requested id
    async fn get_by_ids(
        &self,
        tenant: &Tenant,
        resource_type: &str,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<Resource>>>;

    /// Fetch several resources restricted to a backfill window, keyed by requested id
    async fn get_by_ids_in_range(
        &self,
        tenant: &Tenant,
        resource_type: &str,
        ids: &[String],
        date_range: &DateRange,
    ) -> Result<HashMap<String, Vec<Resource>>>;
}
