//! Per-resource-type request handling
//!
//! A [`ResourceTypeHandler`] supplies the two resource-type specific pieces
//! of the pipeline: turning a raw message into a [`ResourceRequest`] and
//! fetching resources by id. [`FhirResourceHandler`] covers the common case
//! of a channel that loads one FHIR resource type from the EHR.

use super::event::{LoadResourceEvent, PublishResourceEvent, ResourceEvent};
use super::request::{ResourceFetcher, ResourceRequest};
use crate::adapters::ehr::FhirService;
use crate::domain::{
    DateRange, InteropResourceLoadV1, InteropResourcePublishV1, RelayError, Resource, Result,
    Tenant, LOAD_EVENT_NAME, PUBLISH_EVENT_NAME,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// Resource-type strategy used by the publisher
pub trait ResourceTypeHandler: ResourceFetcher {
    /// The resource type this handler loads and publishes
    fn resource_type(&self) -> &str;

    /// Builds a request from a raw message body
    ///
    /// # Errors
    ///
    /// Fails on unknown event names, malformed bodies or unrecognized data triggers.
    fn convert_event_to_request(
        &self,
        body: &str,
        event_name: &str,
        tenant: &Tenant,
    ) -> Result<ResourceRequest>;
}

/// Handler loading a single FHIR resource type through a [`FhirService`]
///
/// Load events request the named resource. Publish events of the same type
/// request the published resource itself; publish events of any other type
/// request the resources of this type they reference.
///
/// The publish flags are stamped onto every request the handler builds.
pub struct FhirResourceHandler {
    resource_type: String,
    fhir: Arc<dyn FhirService>,
    skip_all_publishing: bool,
    skip_kafka_publishing: bool,
}

impl FhirResourceHandler {
    pub fn new(resource_type: impl Into<String>, fhir: Arc<dyn FhirService>) -> Self {
        Self {
            resource_type: resource_type.into(),
            fhir,
            skip_all_publishing: false,
            skip_kafka_publishing: false,
        }
    }

    /// Transform requested resources without publishing them
    pub fn with_skip_all_publishing(mut self, skip: bool) -> Self {
        self.skip_all_publishing = skip;
        self
    }

    /// Publish to the data store without downstream event notification
    pub fn with_skip_kafka_publishing(mut self, skip: bool) -> Self {
        self.skip_kafka_publishing = skip;
        self
    }

    fn publish_event(&self, raw: InteropResourcePublishV1, tenant: &Tenant) -> Result<ResourceEvent> {
        let event = if raw.resource_type == self.resource_type {
            PublishResourceEvent::for_embedded_resource(raw, tenant)?
        } else {
            PublishResourceEvent::for_references(raw, tenant, &self.resource_type)?
        };
        Ok(event.into())
    }
}

/// Parses a body holding either one event or a JSON array of events
fn parse_events<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    if body.trim_start().starts_with('[') {
        Ok(serde_json::from_str(body)?)
    } else {
        Ok(vec![serde_json::from_str(body)?])
    }
}

#[async_trait]
impl ResourceFetcher for FhirResourceHandler {
    async fn load_resources_for_ids(
        &self,
        tenant: &Tenant,
        ids: &[String],
        date_range: Option<&DateRange>,
    ) -> Result<HashMap<String, Vec<Resource>>> {
        match date_range {
            Some(range) => {
                self.fhir
                    .get_by_ids_in_range(tenant, &self.resource_type, ids, range)
                    .await
            }
            None => self.fhir.get_by_ids(tenant, &self.resource_type, ids).await,
        }
    }
}

impl ResourceTypeHandler for FhirResourceHandler {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn convert_event_to_request(
        &self,
        body: &str,
        event_name: &str,
        tenant: &Tenant,
    ) -> Result<ResourceRequest> {
        let events = match event_name {
            LOAD_EVENT_NAME => parse_events::<InteropResourceLoadV1>(body)?
                .into_iter()
                .map(|raw| LoadResourceEvent::new(raw, tenant).map(ResourceEvent::from))
                .collect::<Result<Vec<_>>>()?,
            PUBLISH_EVENT_NAME => parse_events::<InteropResourcePublishV1>(body)?
                .into_iter()
                .map(|raw| self.publish_event(raw, tenant))
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(RelayError::Configuration(format!(
                    "Unsupported event name {other} for {} channel",
                    self.resource_type
                )))
            }
        };

        let mut request = ResourceRequest::new(events, tenant.clone())?;
        request.skip_all_publishing = self.skip_all_publishing;
        request.skip_kafka_publishing = self.skip_kafka_publishing;
        Ok(request)
    }
}
