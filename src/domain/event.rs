//! Raw inbound event payloads
//!
//! These are the JSON shapes read from the event topics. The relay only
//! interprets the fields declared here; anything else on the wire is ignored.

use crate::domain::{RelayError, Resource, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event class discriminator for load events
pub const LOAD_EVENT_NAME: &str = "InteropResourceLoadV1";

/// Event class discriminator for publish events
pub const PUBLISH_EVENT_NAME: &str = "InteropResourcePublishV1";

/// Why a resource fetch was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataTrigger {
    /// Single on-demand request
    AdHoc,
    /// Scheduled nightly batch
    Nightly,
    /// Date-bounded historical re-fetch
    Backfill,
}

impl DataTrigger {
    /// Wire form of the trigger
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdHoc => "adhoc",
            Self::Nightly => "nightly",
            Self::Backfill => "backfill",
        }
    }

    /// Resolves an optional raw trigger, failing on null or unknown values
    pub fn resolve(raw: Option<&str>) -> Result<Self> {
        match raw {
            Some(value) => value.parse(),
            None => Err(RelayError::Configuration(
                "Event has no data trigger".to_string(),
            )),
        }
    }
}

impl FromStr for DataTrigger {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(|c: char| c == '_' || c == '-', "").as_str() {
            "adhoc" => Ok(Self::AdHoc),
            "nightly" => Ok(Self::Nightly),
            "backfill" => Ok(Self::Backfill),
            _ => Err(RelayError::Configuration(format!(
                "Received a data trigger which cannot be transformed to a known value: {s}"
            ))),
        }
    }
}

impl fmt::Display for DataTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive date bounds for a backfill fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Lineage pointer to the resource whose publication triggered a fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamReference {
    pub resource_type: String,
    pub id: String,
}

impl UpstreamReference {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

/// Backfill window attached to run metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillRequest {
    pub backfill_id: String,
    pub backfill_start_date: DateTime<Utc>,
    pub backfill_end_date: DateTime<Utc>,
}

impl BackfillRequest {
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.backfill_start_date, self.backfill_end_date)
    }
}

/// Run metadata carried on every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub run_id: String,
    pub run_date_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_references: Option<Vec<UpstreamReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backfill_request: Option<BackfillRequest>,
}

impl Metadata {
    pub fn new(run_id: impl Into<String>, run_date_time: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            run_date_time,
            upstream_references: None,
            backfill_request: None,
        }
    }

    pub fn with_upstream_references(mut self, references: Vec<UpstreamReference>) -> Self {
        self.upstream_references = Some(references);
        self
    }

    pub fn with_backfill_request(mut self, request: BackfillRequest) -> Self {
        self.backfill_request = Some(request);
        self
    }

    /// Copy of this metadata with `reference` appended to the upstream chain
    pub fn with_appended_reference(&self, reference: UpstreamReference) -> Self {
        let mut references = self.upstream_references.clone().unwrap_or_default();
        references.push(reference);
        Self {
            upstream_references: Some(references),
            ..self.clone()
        }
    }
}

/// Flow controls on a load event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowOptions {
    #[serde(default)]
    pub disable_downstream_resources: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalization_registry_minimum_time: Option<DateTime<Utc>>,
}

/// Request to load a single resource from the EHR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteropResourceLoadV1 {
    pub tenant_id: String,
    pub resource_type: String,
    #[serde(rename = "resourceFHIRId")]
    pub resource_fhir_id: String,
    #[serde(default)]
    pub data_trigger: Option<String>,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_options: Option<FlowOptions>,
}

impl InteropResourceLoadV1 {
    pub fn data_trigger(&self) -> Result<DataTrigger> {
        DataTrigger::resolve(self.data_trigger.as_deref())
    }
}

/// Notification that a resource was published upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteropResourcePublishV1 {
    pub tenant_id: String,
    pub resource_type: String,
    #[serde(default)]
    pub data_trigger: Option<String>,
    pub resource_json: String,
    pub metadata: Metadata,
}

impl InteropResourcePublishV1 {
    pub fn data_trigger(&self) -> Result<DataTrigger> {
        DataTrigger::resolve(self.data_trigger.as_deref())
    }

    /// Parses the embedded resource
    pub fn resource(&self) -> Result<Resource> {
        Resource::from_json(&self.resource_json)
    }
}

/// Topic an inbound message was read from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Publish events of an upstream resource type
    Publish {
        resource_type: String,
        trigger: DataTrigger,
    },
    /// Load events of the channel's own resource type
    Load { resource_type: String },
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish {
                resource_type,
                trigger,
            } => write!(f, "publish/{trigger}/{resource_type}"),
            Self::Load { resource_type } => write!(f, "load/{resource_type}"),
        }
    }
}

/// A raw message handed from the event source to the publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Serialized event JSON
    pub body: String,
    /// Tenant the event belongs to
    pub tenant_mnemonic: String,
    /// Which event class `body` holds
    pub event_name: Option<String>,
    /// Run id tag, when the event carries one
    pub run_id: Option<String>,
    /// Topic the message came from, used to hand it back on failure
    pub topic: Option<Topic>,
}

impl InboundMessage {
    pub fn new(body: impl Into<String>, tenant_mnemonic: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            tenant_mnemonic: tenant_mnemonic.into(),
            event_name: None,
            run_id: None,
            topic: None,
        }
    }

    pub fn with_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = Some(event_name.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = Some(topic);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_topic_display() {
        let publish = Topic::Publish {
            resource_type: "Appointment".to_string(),
            trigger: DataTrigger::Nightly,
        };
        let load = Topic::Load {
            resource_type: "Location".to_string(),
        };
        assert_eq!(publish.to_string(), "publish/nightly/Appointment");
        assert_eq!(load.to_string(), "load/Location");
    }

    #[test_case("adhoc", DataTrigger::AdHoc ; "adhoc")]
    #[test_case("AD_HOC", DataTrigger::AdHoc ; "upper snake ad hoc")]
    #[test_case("nightly", DataTrigger::Nightly ; "nightly")]
    #[test_case("Backfill", DataTrigger::Backfill ; "mixed case backfill")]
    fn test_data_trigger_parse(raw: &str, expected: DataTrigger) {
        assert_eq!(raw.parse::<DataTrigger>().unwrap(), expected);
    }

    #[test]
    fn test_data_trigger_unknown_is_configuration_error() {
        let err = "weekly".parse::<DataTrigger>().unwrap_err();
        assert!(matches!(err, RelayError::Configuration(_)));
    }

    #[test]
    fn test_data_trigger_null_is_configuration_error() {
        let err = DataTrigger::resolve(None).unwrap_err();
        assert!(matches!(err, RelayError::Configuration(_)));
    }

    #[test]
    fn test_load_event_deserialize() {
        let json = r#"{
            "tenantId": "tenant",
            "resourceType": "Location",
            "resourceFHIRId": "1234",
            "dataTrigger": "nightly",
            "metadata": {"runId": "run1", "runDateTime": "2024-01-01T00:00:00Z"},
            "flowOptions": {"disableDownstreamResources": true}
        }"#;
        let event: InteropResourceLoadV1 = serde_json::from_str(json).unwrap();
        assert_eq!(event.resource_fhir_id, "1234");
        assert_eq!(event.data_trigger().unwrap(), DataTrigger::Nightly);
        assert!(event.flow_options.unwrap().disable_downstream_resources);
        assert!(event.metadata.upstream_references.is_none());
    }

    #[test]
    fn test_publish_event_embedded_resource() {
        let event = InteropResourcePublishV1 {
            tenant_id: "tenant".to_string(),
            resource_type: "Patient".to_string(),
            data_trigger: Some("adhoc".to_string()),
            resource_json: r#"{"resourceType":"Patient","id":"tenant-42"}"#.to_string(),
            metadata: Metadata::new("run1", Utc::now()),
        };
        let resource = event.resource().unwrap();
        assert_eq!(resource.id(), Some("tenant-42"));
    }

    #[test]
    fn test_appended_reference_preserves_order_without_mutation() {
        let original = Metadata::new("run1", Utc::now())
            .with_upstream_references(vec![UpstreamReference::new("Appointment", "a1")]);
        let updated = original.with_appended_reference(UpstreamReference::new("Patient", "p1"));

        assert_eq!(original.upstream_references.as_ref().unwrap().len(), 1);
        assert_eq!(
            updated.upstream_references.unwrap(),
            vec![
                UpstreamReference::new("Appointment", "a1"),
                UpstreamReference::new("Patient", "p1"),
            ]
        );
    }
}
