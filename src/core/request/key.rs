//! Resource request keys
//!
//! A [`ResourceRequestKey`] identifies one resource, for one tenant, for one
//! run, optionally scoped to a backfill date range. It is the unit of
//! deduplication for the whole pipeline.

use crate::domain::{DateRange, Tenant};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a single resource fetch within a run
///
/// Equality and hashing compare the run id, resource type, tenant mnemonic,
/// date range and the *unlocalized* resource id, so `tenant-1234` and `1234`
/// address the same key.
#[derive(Debug, Clone)]
pub struct ResourceRequestKey {
    run_id: String,
    resource_type: String,
    tenant: Tenant,
    resource_id: String,
    date_range: Option<DateRange>,
}

impl ResourceRequestKey {
    pub fn new(
        run_id: impl Into<String>,
        resource_type: impl Into<String>,
        tenant: Tenant,
        resource_id: impl Into<String>,
        date_range: Option<DateRange>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            resource_type: resource_type.into(),
            tenant,
            resource_id: resource_id.into(),
            date_range,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// The id exactly as it was supplied
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn date_range(&self) -> Option<&DateRange> {
        self.date_range.as_ref()
    }

    /// The resource id with the tenant's mnemonic prefix removed
    pub fn unlocalized_resource_id(&self) -> &str {
        self.tenant.unlocalize(&self.resource_id)
    }
}

impl PartialEq for ResourceRequestKey {
    fn eq(&self, other: &Self) -> bool {
        self.run_id == other.run_id
            && self.resource_type == other.resource_type
            && self.tenant.mnemonic == other.tenant.mnemonic
            && self.date_range == other.date_range
            && self.unlocalized_resource_id() == other.unlocalized_resource_id()
    }
}

impl Eq for ResourceRequestKey {}

impl Hash for ResourceRequestKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.run_id.hash(state);
        self.resource_type.hash(state);
        self.tenant.mnemonic.hash(state);
        self.date_range.hash(state);
        self.unlocalized_resource_id().hash(state);
    }
}

impl fmt::Display for ResourceRequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date_range = self
            .date_range
            .map(|range| range.to_string())
            .unwrap_or_else(|| "null".to_string());
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.run_id,
            self.resource_type,
            date_range,
            self.tenant.mnemonic,
            self.unlocalized_resource_id()
        )
    }
}
