//! Tenant model and resource id localization
//!
//! Resource ids published downstream are "localized": prefixed with the
//! owning tenant's mnemonic and a dash (`tenant-1234`). Comparisons across
//! events always use the unlocalized form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tenant served by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Short identifier used in event payloads and localized ids
    pub mnemonic: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Comma-separated list of resource types this tenant must not receive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_resources: Option<String>,
}

impl Tenant {
    /// Creates a tenant with no blocked resources
    pub fn new(mnemonic: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            name: name.into(),
            blocked_resources: None,
        }
    }

    /// Sets the blocked resource list
    pub fn with_blocked_resources(mut self, blocked: impl Into<String>) -> Self {
        self.blocked_resources = Some(blocked.into());
        self
    }

    /// Prefix applied to this tenant's localized resource ids
    pub fn id_prefix(&self) -> String {
        format!("{}-", self.mnemonic)
    }

    /// Localizes a resource id for this tenant. Already-localized ids are returned unchanged.
    pub fn localize(&self, id: &str) -> String {
        let prefix = self.id_prefix();
        if id.starts_with(&prefix) {
            id.to_string()
        } else {
            format!("{prefix}{id}")
        }
    }

    /// Strips this tenant's prefix from a resource id, if present
    pub fn unlocalize<'a>(&self, id: &'a str) -> &'a str {
        id.strip_prefix(&self.id_prefix()).unwrap_or(id)
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic)
    }
}

/// Returns true when `resource_type` appears in a comma-separated block list
///
/// Entries are trimmed and compared exactly.
pub fn is_resource_blocked(blocked_resources: Option<&str>, resource_type: &str) -> bool {
    blocked_resources
        .map(|list| list.split(',').any(|entry| entry.trim() == resource_type))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localize_adds_prefix_once() {
        let tenant = Tenant::new("tenant", "Test Tenant");
        assert_eq!(tenant.localize("1234"), "tenant-1234");
        assert_eq!(tenant.localize("tenant-1234"), "tenant-1234");
    }

    #[test]
    fn test_unlocalize_strips_only_own_prefix() {
        let tenant = Tenant::new("tenant", "Test Tenant");
        assert_eq!(tenant.unlocalize("tenant-1234"), "1234");
        assert_eq!(tenant.unlocalize("1234"), "1234");
        assert_eq!(tenant.unlocalize("other-1234"), "other-1234");
    }

    #[test]
    fn test_is_resource_blocked() {
        assert!(is_resource_blocked(Some("Patient, Location"), "Location"));
        assert!(is_resource_blocked(Some("Patient"), "Patient"));
        assert!(!is_resource_blocked(Some("Patient,Location"), "Appointment"));
        assert!(!is_resource_blocked(Some(""), "Patient"));
        assert!(!is_resource_blocked(None, "Patient"));
    }
}
