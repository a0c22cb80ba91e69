//! Tenant localization transform
//!
//! Rewrites a resource for publication under a tenant: the id and every
//! relative reference get the tenant's mnemonic prefix, and a tenant
//! identifier is attached.

use super::{ResourceTransformer, TransformContext};
use crate::domain::{RelayError, Resource, Result, Tenant};
use serde_json::{json, Value};

/// Identifier system recording which tenant a resource came from
pub const TENANT_IDENTIFIER_SYSTEM: &str = "urn:interop-relay:tenant";

/// Default transformer: localizes ids and references for the owning tenant
#[derive(Debug, Clone, Default)]
pub struct LocalizingTransformer;

impl LocalizingTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceTransformer for LocalizingTransformer {
    fn transform(
        &self,
        resource: &Resource,
        tenant: &Tenant,
        _context: &TransformContext,
    ) -> Result<Resource> {
        let id = resource.id().ok_or_else(|| {
            RelayError::Validation(format!(
                "{} resource has no id and cannot be localized",
                resource.resource_type()
            ))
        })?;

        let mut localized = resource.clone();
        localized.set_id(tenant.localize(id));
        localize_references(localized.as_value_mut(), tenant);
        add_tenant_identifier(localized.as_value_mut(), tenant);

        Ok(localized)
    }
}

/// Prefixes relative `Type/id` references. Absolute URLs and contained (`#`) references are left alone.
fn localize_references(value: &mut Value, tenant: &Tenant) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == "reference" {
                    if let Some(reference) = child.as_str() {
                        if let Some(localized) = localize_reference(reference, tenant) {
                            *child = Value::String(localized);
                        }
                    }
                } else {
                    localize_references(child, tenant);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                localize_references(item, tenant);
            }
        }
        _ => {}
    }
}

fn localize_reference(reference: &str, tenant: &Tenant) -> Option<String> {
    if reference.starts_with('#') || reference.contains("://") {
        return None;
    }
    let (resource_type, id) = reference.split_once('/')?;
    if resource_type.is_empty() || id.is_empty() || id.contains('/') {
        return None;
    }
    Some(format!("{resource_type}/{}", tenant.localize(id)))
}

fn add_tenant_identifier(value: &mut Value, tenant: &Tenant) {
    let Value::Object(map) = value else {
        return;
    };
    let identifier = json!({"system": TENANT_IDENTIFIER_SYSTEM, "value": tenant.mnemonic});
    match map.get_mut("identifier") {
        Some(Value::Array(identifiers)) => {
            let present = identifiers
                .iter()
                .any(|existing| existing.get("system").and_then(Value::as_str) == Some(TENANT_IDENTIFIER_SYSTEM));
            if !present {
                identifiers.push(identifier);
            }
        }
        _ => {
            map.insert("identifier".to_string(), Value::Array(vec![identifier]));
        }
    }
}
