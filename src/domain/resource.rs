//! Opaque FHIR resource wrapper
//!
//! The relay never interprets clinical content. A resource is a JSON object
//! carrying at least a `resourceType`; the `id` may be absent on malformed
//! input and is reported as `None`.

use crate::domain::{RelayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A FHIR resource held as raw JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Value);

impl Resource {
    /// Wraps a JSON value, requiring it to be an object with a `resourceType`
    pub fn new(value: Value) -> Result<Self> {
        match value.get("resourceType") {
            Some(Value::String(_)) => Ok(Self(value)),
            _ => Err(RelayError::Validation(
                "FHIR resource must be a JSON object with a string resourceType".to_string(),
            )),
        }
    }

    /// Parses a resource from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::new(value)
    }

    /// The resource's `resourceType`
    pub fn resource_type(&self) -> &str {
        self.0
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The resource's logical id, if present
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// `ResourceType/id` reference string, if the resource has an id
    pub fn reference(&self) -> Option<String> {
        self.id().map(|id| format!("{}/{}", self.resource_type(), id))
    }

    /// Replaces the resource id
    pub fn set_id(&mut self, id: impl Into<String>) {
        if let Value::Object(map) = &mut self.0 {
            map.insert("id".to_string(), Value::String(id.into()));
        }
    }

    /// Borrow the underlying JSON
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Mutably borrow the underlying JSON
    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    /// Collects ids referenced from anywhere in this resource that point at `target_type`
    ///
    /// Any `reference` string of the form `TargetType/<id>` is matched, at any
    /// depth. Ids are returned in document order without duplicates.
    pub fn referenced_ids(&self, target_type: &str) -> Vec<String> {
        let prefix = format!("{target_type}/");
        let mut ids = Vec::new();
        collect_references(&self.0, &prefix, &mut ids);
        ids
    }
}

fn collect_references(value: &Value, prefix: &str, ids: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "reference" {
                    if let Some(id) = child.as_str().and_then(|r| r.strip_prefix(prefix)) {
                        if !id.is_empty() && !ids.iter().any(|existing| existing == id) {
                            ids.push(id.to_string());
                        }
                    }
                } else {
                    collect_references(child, prefix, ids);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, prefix, ids);
            }
        }
        _ => {}
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{}/{}", self.resource_type(), id),
            None => write!(f, "{}/<no id>", self.resource_type()),
        }
    }
}
