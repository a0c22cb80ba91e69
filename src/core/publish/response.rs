//! Publish responses
//!
//! One [`PublishResponse`] is produced per inbound message. The `message`
//! field is drawn from a small set of stable phrases that dashboards and
//! tests match on; `detailed_message` carries diagnostics.

use crate::core::request::ResourceRequestKey;
use crate::domain::Resource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Data map key: number of resources published
pub const RESOURCE_COUNT_KEY: &str = "resourceCount";

/// Data map key: number of resources dropped during transformation
pub const FAILURE_COUNT_KEY: &str = "failureCount";

/// Data map key: comma-separated `Type/id` references of the originating resources
pub const EVENT_METADATA_SOURCE_KEY: &str = "eventMetadataSource";

/// Data map key: number of resources reused from earlier in the run
pub const CACHED_RESOURCE_COUNT_KEY: &str = "cachedResourceCount";

/// Largest list rendered in full in a detailed message
pub const DETAIL_LIMIT: usize = 5;

pub const NO_RESOURCES: &str = "No resources";
pub const FAILED_EHR_CALL: &str = "Failed EHR Call";
pub const ALREADY_PROCESSED: &str = "Already processed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Sent,
    Error,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Sent => write!(f, "SENT"),
            ResponseStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Outcome of processing one inbound message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub status: ResponseStatus,
    pub message: String,
    pub detailed_message: String,
    pub data: BTreeMap<String, String>,
    /// Resources published, plus any reused from the run cache
    #[serde(skip)]
    pub resources: Vec<Resource>,
}

impl PublishResponse {
    pub fn sent(message: impl Into<String>, detailed_message: impl Into<String>) -> Self {
        Self::new(ResponseStatus::Sent, message, detailed_message)
    }

    pub fn error(message: impl Into<String>, detailed_message: impl Into<String>) -> Self {
        Self::new(ResponseStatus::Error, message, detailed_message)
    }

    fn new(
        status: ResponseStatus,
        message: impl Into<String>,
        detailed_message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            detailed_message: detailed_message.into(),
            data: BTreeMap::new(),
            resources: Vec::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl ToString) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self
    }

    pub fn is_sent(&self) -> bool {
        self.status == ResponseStatus::Sent
    }

    pub fn data_value(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

pub fn published_message(count: usize) -> String {
    format!("Published {count} resource(s).")
}

pub fn failed_transform_message(count: usize) -> String {
    format!("Failed to transform {count} resource(s)")
}

pub fn failed_publish_message(count: usize) -> String {
    format!("Failed to publish {count} resource(s)")
}

/// Renders resources for a detailed message
///
/// Up to [`DETAIL_LIMIT`] resources are rendered as full JSON; larger lists
/// collapse to a JSON array of their ids, with `null` for missing ids.
pub fn truncated_detail(resources: &[Resource]) -> String {
    let rendered = if resources.len() <= DETAIL_LIMIT {
        serde_json::to_string(resources)
    } else {
        let ids: Vec<Option<&str>> = resources.iter().map(Resource::id).collect();
        serde_json::to_string(&ids)
    };
    rendered.unwrap_or_else(|e| format!("<unrenderable resources: {e}>"))
}

/// Renders request keys for a detailed message
///
/// Up to [`DETAIL_LIMIT`] keys are rendered in full; larger sets collapse to
/// a JSON array of every unlocalized id.
pub fn truncated_key_detail(keys: &[ResourceRequestKey]) -> String {
    if keys.len() <= DETAIL_LIMIT {
        return keys
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
    }
    let ids: Vec<&str> = keys
        .iter()
        .map(ResourceRequestKey::unlocalized_resource_id)
        .collect();
    serde_json::to_string(&ids).unwrap_or_else(|e| format!("<unrenderable keys: {e}>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Tenant;
    use serde_json::{json, Value};
    use test_case::test_case;

    fn resources(ids: &[Option<&str>]) -> Vec<Resource> {
        ids.iter()
            .map(|id| {
                let mut value = json!({"resourceType": "Location"});
                if let Some(id) = id {
                    value["id"] = json!(id);
                }
                Resource::new(value).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_detail_full_json_at_limit() {
        let list = resources(&[Some("1"), Some("2"), Some("3"), Some("4"), Some("5")]);
        let detail: Value = serde_json::from_str(&truncated_detail(&list)).unwrap();
        assert_eq!(detail.as_array().unwrap().len(), 5);
        assert_eq!(detail[0], json!({"resourceType": "Location", "id": "1"}));
    }

    #[test]
    fn test_detail_ids_only_above_limit() {
        let list = resources(&[
            Some("1"),
            Some("2"),
            Some("3"),
            Some("4"),
            Some("5"),
            None,
            None,
        ]);
        assert_eq!(
            truncated_detail(&list),
            r#"["1","2","3","4","5",null,null]"#
        );
    }

    #[test_case(1, "Published 1 resource(s)." ; "single")]
    #[test_case(12, "Published 12 resource(s)." ; "many")]
    fn test_published_message(count: usize, expected: &str) {
        assert_eq!(published_message(count), expected);
    }

    fn keys(count: usize) -> Vec<ResourceRequestKey> {
        let tenant = Tenant::new("tenant", "Test Tenant");
        (1..=count)
            .map(|n| {
                ResourceRequestKey::new("run1", "Location", tenant.clone(), format!("tenant-{n}"), None)
            })
            .collect()
    }

    #[test]
    fn test_key_detail_full_at_limit() {
        let detail = truncated_key_detail(&keys(2));
        assert_eq!(detail, "run1:Location:null:tenant:1, run1:Location:null:tenant:2");
    }

    #[test]
    fn test_key_detail_lists_every_id_above_limit() {
        assert_eq!(
            truncated_key_detail(&keys(7)),
            r#"["1","2","3","4","5","6","7"]"#
        );
    }

    #[test]
    fn test_response_builders() {
        let response = PublishResponse::sent(published_message(2), "[]")
            .with_data(RESOURCE_COUNT_KEY, 2)
            .with_data(FAILURE_COUNT_KEY, 0);
        assert!(response.is_sent());
        assert_eq!(response.data_value(RESOURCE_COUNT_KEY), Some("2"));
        assert_eq!(response.data_value(FAILURE_COUNT_KEY), Some("0"));
        assert_eq!(response.status.to_string(), "SENT");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "SENT");
        assert_eq!(json["detailedMessage"], "[]");
    }
}
