//! Tenant lookup and per-tenant configuration
//!
//! [`TenantService`] resolves mnemonics to tenants; [`TenantConfigService`]
//! answers per-tenant settings such as the blocked resource list.
//! [`TenantDirectory`] implements both from the `[[tenants]]` config section.

use crate::domain::{Result, Tenant};
use async_trait::async_trait;
use std::collections::HashMap;

/// Resolves tenants by mnemonic
#[async_trait]
pub trait TenantService: Send + Sync {
    /// Returns `Ok(None)` when no tenant has this mnemonic
    async fn get_tenant_for_mnemonic(&self, mnemonic: &str) -> Result<Option<Tenant>>;
}

/// Per-tenant configuration values
pub trait TenantConfigService: Send + Sync {
    /// Comma-separated resource types blocked for this tenant, if configured
    fn blocked_resources(&self, mnemonic: &str) -> Option<String>;
}

/// In-memory tenant directory
#[derive(Debug, Clone, Default)]
pub struct TenantDirectory {
    tenants: HashMap<String, Tenant>,
}

impl TenantDirectory {
    pub fn new(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        Self {
            tenants: tenants
                .into_iter()
                .map(|tenant| (tenant.mnemonic.clone(), tenant))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

#[async_trait]
impl TenantService for TenantDirectory {
    async fn get_tenant_for_mnemonic(&self, mnemonic: &str) -> Result<Option<Tenant>> {
        Ok(self.tenants.get(mnemonic).cloned())
    }
}

impl TenantConfigService for TenantDirectory {
    fn blocked_resources(&self, mnemonic: &str) -> Option<String> {
        self.tenants
            .get(mnemonic)
            .and_then(|tenant| tenant.blocked_resources.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> TenantDirectory {
        TenantDirectory::new(vec![
            Tenant::new("tenant", "Test Tenant").with_blocked_resources("Location"),
            Tenant::new("other", "Other Tenant"),
        ])
    }

    #[tokio::test]
    async fn test_lookup_by_mnemonic() {
        let directory = directory();
        let tenant = directory.get_tenant_for_mnemonic("other").await.unwrap();
        assert_eq!(tenant.unwrap().name, "Other Tenant");
        assert!(directory
            .get_tenant_for_mnemonic("missing")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_blocked_resources() {
        let directory = directory();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.blocked_resources("tenant"), Some("Location".to_string()));
        assert_eq!(directory.blocked_resources("other"), None);
        assert_eq!(directory.blocked_resources("missing"), None);
    }
}
