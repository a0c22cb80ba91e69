//! Resource requests
//!
//! A [`ResourceRequest`] aggregates the events of one inbound message and
//! resolves their keys to fetched resources, batching EHR calls.

use super::event::ResourceEvent;
use super::key::ResourceRequestKey;
use crate::domain::{DataTrigger, DateRange, Metadata, RelayError, Resource, Result, Tenant};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Fetch strategy for one resource type
///
/// Implementations return resources keyed by the unlocalized id they were
/// requested with. Ids that were not found are simply absent.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch `ids` for `tenant`, optionally restricted to a backfill window
    async fn load_resources_for_ids(
        &self,
        tenant: &Tenant,
        ids: &[String],
        date_range: Option<&DateRange>,
    ) -> Result<HashMap<String, Vec<Resource>>>;
}

/// The set of events processed together for one fetch cycle
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    source_events: Vec<ResourceEvent>,
    tenant: Tenant,
    data_trigger: DataTrigger,
    /// Transform but do not publish anything
    pub skip_all_publishing: bool,
    /// Publish to the data store only, without downstream event notification
    pub skip_kafka_publishing: bool,
}

impl ResourceRequest {
    /// Creates a request over one or more events
    ///
    /// # Errors
    ///
    /// Returns a validation error if `source_events` is empty.
    pub fn new(source_events: Vec<ResourceEvent>, tenant: Tenant) -> Result<Self> {
        let first = source_events.first().ok_or_else(|| {
            RelayError::Validation("A resource request requires at least one event".to_string())
        })?;
        let data_trigger = first.data_trigger();

        Ok(Self {
            source_events,
            tenant,
            data_trigger,
            skip_all_publishing: false,
            skip_kafka_publishing: false,
        })
    }

    pub fn source_events(&self) -> &[ResourceEvent] {
        &self.source_events
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn data_trigger(&self) -> DataTrigger {
        self.data_trigger
    }

    /// Run id of the first event
    pub fn run_id(&self) -> &str {
        &self.source_events[0].metadata().run_id
    }

    /// Metadata to publish with, taken from the first event
    pub fn metadata(&self) -> Metadata {
        self.source_events[0].updated_metadata()
    }

    pub fn process_downstream_references(&self) -> bool {
        self.source_events[0].process_downstream_references()
    }

    /// Every requested key mapped back to the event that asked for it
    ///
    /// When two events request the same key the first one wins.
    pub fn events_by_request_key(&self) -> HashMap<&ResourceRequestKey, &ResourceEvent> {
        let mut events = HashMap::new();
        for event in &self.source_events {
            for key in event.request_keys() {
                events.entry(key).or_insert(event);
            }
        }
        events
    }

    /// Distinct request keys across all events, in event order
    pub fn request_keys(&self) -> Vec<ResourceRequestKey> {
        let mut seen = HashSet::new();
        self.source_events
            .iter()
            .flat_map(|event| event.request_keys())
            .filter(|key| seen.insert(*key))
            .cloned()
            .collect()
    }

    /// Distinct source references across all events
    pub fn source_references(&self) -> Vec<String> {
        let mut references: Vec<String> = Vec::new();
        for reference in self.source_events.iter().filter_map(|e| e.source_reference()) {
            if !references.contains(&reference) {
                references.push(reference);
            }
        }
        references
    }

    /// The latest minimum registry cache time requested by any event
    pub fn minimum_registry_cache_time(&self) -> Option<DateTime<Utc>> {
        self.source_events
            .iter()
            .filter_map(|event| event.minimum_registry_cache_time())
            .max()
    }

    /// Resolves `keys` to resources
    ///
    /// Undated keys are collapsed to unique unlocalized ids and fetched in one
    /// call. Backfill keys are grouped by date range with one call per range.
    /// Results are fanned back out to every key sharing an id; keys with no
    /// result are absent from the returned map.
    pub async fn load_resources<F>(
        &self,
        fetcher: &F,
        keys: &[ResourceRequestKey],
    ) -> Result<HashMap<ResourceRequestKey, Vec<Resource>>>
    where
        F: ResourceFetcher + ?Sized,
    {
        let mut resources = HashMap::new();
        if keys.is_empty() {
            return Ok(resources);
        }

        let (backfill, undated): (Vec<&ResourceRequestKey>, Vec<&ResourceRequestKey>) =
            keys.iter().partition(|key| key.date_range().is_some());

        if !undated.is_empty() {
            resources.extend(self.load_group(fetcher, &undated, None).await?);
        }

        let mut ranges: Vec<(DateRange, Vec<&ResourceRequestKey>)> = Vec::new();
        for key in backfill {
            let Some(range) = key.date_range() else {
                continue;
            };
            match ranges.iter_mut().find(|(existing, _)| existing == range) {
                Some((_, group)) => group.push(key),
                None => ranges.push((*range, vec![key])),
            }
        }

        for (range, group) in &ranges {
            resources.extend(self.load_group(fetcher, group, Some(range)).await?);
        }

        Ok(resources)
    }

    async fn load_group<F>(
        &self,
        fetcher: &F,
        keys: &[&ResourceRequestKey],
        date_range: Option<&DateRange>,
    ) -> Result<Vec<(ResourceRequestKey, Vec<Resource>)>>
    where
        F: ResourceFetcher + ?Sized,
    {
        let mut ids: Vec<String> = Vec::new();
        for key in keys {
            let id = key.unlocalized_resource_id();
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }

        tracing::debug!(
            tenant = %self.tenant.mnemonic,
            id_count = ids.len(),
            date_range = ?date_range.map(|range| range.to_string()),
            "Fetching resources by id"
        );

        let found = fetcher
            .load_resources_for_ids(&self.tenant, &ids, date_range)
            .await?;

        Ok(keys
            .iter()
            .filter_map(|key| {
                found
                    .get(key.unlocalized_resource_id())
                    .map(|resources| ((*key).clone(), resources.clone()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::request::event::{LoadResourceEvent, PublishResourceEvent};
    use crate::domain::{BackfillRequest, FlowOptions, InteropResourceLoadV1, InteropResourcePublishV1};
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every call and answers with one resource per id, except ids in `missing`
    #[derive(Default)]
    struct RecordingFetcher {
        calls: Mutex<Vec<(Vec<String>, Option<DateRange>)>>,
        missing: Vec<String>,
    }

    #[async_trait]
    impl ResourceFetcher for RecordingFetcher {
        async fn load_resources_for_ids(
            &self,
            _tenant: &Tenant,
            ids: &[String],
            date_range: Option<&DateRange>,
        ) -> Result<HashMap<String, Vec<Resource>>> {
            self.calls
                .lock()
                .unwrap()
                .push((ids.to_vec(), date_range.copied()));
            Ok(ids
                .iter()
                .filter(|id| !self.missing.contains(id))
                .map(|id| {
                    let resource =
                        Resource::new(json!({"resourceType": "Location", "id": id})).unwrap();
                    (id.clone(), vec![resource])
                })
                .collect())
        }
    }

    fn tenant() -> Tenant {
        Tenant::new("tenant", "Test Tenant")
    }

    fn range(month: u32) -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, month, 28, 0, 0, 0).unwrap(),
        )
    }

    fn key(id: &str, date_range: Option<DateRange>) -> ResourceRequestKey {
        ResourceRequestKey::new("run1", "Location", tenant(), id, date_range)
    }

    fn load(id: &str, minimum: Option<DateTime<Utc>>) -> ResourceEvent {
        let raw = InteropResourceLoadV1 {
            tenant_id: "tenant".to_string(),
            resource_type: "Location".to_string(),
            resource_fhir_id: id.to_string(),
            data_trigger: Some("adhoc".to_string()),
            metadata: Metadata::new("run1", Utc::now()),
            flow_options: minimum.map(|time| FlowOptions {
                disable_downstream_resources: false,
                normalization_registry_minimum_time: Some(time),
            }),
        };
        LoadResourceEvent::new(raw, &tenant()).unwrap().into()
    }

    fn request() -> ResourceRequest {
        ResourceRequest::new(vec![load("1", None)], tenant()).unwrap()
    }

    #[test]
    fn test_empty_request_rejected() {
        let err = ResourceRequest::new(Vec::new(), tenant()).unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }

    #[test]
    fn test_derived_attributes() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let publish = InteropResourcePublishV1 {
            tenant_id: "tenant".to_string(),
            resource_type: "Location".to_string(),
            data_trigger: Some("adhoc".to_string()),
            resource_json: r#"{"resourceType":"Location","id":"tenant-1"}"#.to_string(),
            metadata: Metadata::new("run1", Utc::now()),
        };
        let publish_event: ResourceEvent =
            PublishResourceEvent::for_embedded_resource(publish, &tenant())
                .unwrap()
                .into();
        let request = ResourceRequest::new(
            vec![load("1", Some(early)), load("2", Some(late)), publish_event],
            tenant(),
        )
        .unwrap();

        assert_eq!(request.run_id(), "run1");
        assert_eq!(request.data_trigger(), DataTrigger::AdHoc);
        assert_eq!(request.minimum_registry_cache_time(), Some(late));
        // "tenant-1" and "1" collapse to the same key
        assert_eq!(request.request_keys(), vec![key("1", None), key("2", None)]);
        assert_eq!(request.events_by_request_key().len(), 2);
        assert_eq!(request.source_references(), vec!["Location/tenant-1".to_string()]);
        assert!(!request.skip_all_publishing);
        assert!(!request.skip_kafka_publishing);
    }

    #[tokio::test]
    async fn test_load_resources_empty_input_skips_fetch() {
        let fetcher = RecordingFetcher::default();
        let result = request().load_resources(&fetcher, &[]).await.unwrap();

        assert!(result.is_empty());
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_undated_keys_sharing_an_id_fetch_once() {
        let fetcher = RecordingFetcher::default();
        let keys = vec![
            ResourceRequestKey::new("run1", "Location", tenant(), "tenant-1", None),
            ResourceRequestKey::new("run2", "Location", tenant(), "1", None),
            key("2", None),
        ];

        let result = request().load_resources(&fetcher, &keys).await.unwrap();

        let calls = fetcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (vec!["1".to_string(), "2".to_string()], None));
        assert_eq!(result.len(), 3);
        for key in &keys {
            assert_eq!(result[key].len(), 1);
        }
    }

    #[tokio::test]
    async fn test_backfill_keys_grouped_by_range() {
        let fetcher = RecordingFetcher::default();
        let keys = vec![
            key("1", Some(range(1))),
            key("2", Some(range(2))),
            key("3", Some(range(1))),
            key("4", None),
        ];

        let result = request().load_resources(&fetcher, &keys).await.unwrap();

        let calls = fetcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], (vec!["4".to_string()], None));
        assert_eq!(
            calls[1],
            (vec!["1".to_string(), "3".to_string()], Some(range(1)))
        );
        assert_eq!(calls[2], (vec!["2".to_string()], Some(range(2))));
        assert_eq!(result.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_resources_are_absent_not_errors() {
        let fetcher = RecordingFetcher {
            missing: vec!["2".to_string()],
            ..Default::default()
        };
        let keys = vec![key("1", None), key("2", None)];

        let result = request().load_resources(&fetcher, &keys).await.unwrap();

        assert_eq!(result.len(), 1);
        assert!(result.contains_key(&key("1", None)));
        assert!(!result.contains_key(&key("2", None)));
    }

    #[test]
    fn test_backfill_request_range_used_for_keys() {
        let mut raw = InteropResourceLoadV1 {
            tenant_id: "tenant".to_string(),
            resource_type: "Location".to_string(),
            resource_fhir_id: "1".to_string(),
            data_trigger: Some("backfill".to_string()),
            metadata: Metadata::new("run1", Utc::now()),
            flow_options: None,
        };
        raw.metadata.backfill_request = Some(BackfillRequest {
            backfill_id: "b1".to_string(),
            backfill_start_date: range(1).start,
            backfill_end_date: range(1).end,
        });
        let event: ResourceEvent = LoadResourceEvent::new(raw, &tenant()).unwrap().into();
        let request = ResourceRequest::new(vec![event], tenant()).unwrap();

        assert_eq!(request.data_trigger(), DataTrigger::Backfill);
        assert_eq!(request.request_keys(), vec![key("1", Some(range(1)))]);
    }
}
