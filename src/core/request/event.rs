//! Resource events
//!
//! A [`ResourceEvent`] wraps one raw inbound event and exposes the request
//! keys it wants plus the lineage metadata to publish with. Load events
//! originate a run; publish events continue one and extend its upstream
//! reference chain.

use super::key::ResourceRequestKey;
use crate::domain::{
    DataTrigger, InteropResourceLoadV1, InteropResourcePublishV1, Metadata, RelayError, Resource,
    Result, Tenant, UpstreamReference,
};
use chrono::{DateTime, Utc};

/// Event derived from an [`InteropResourceLoadV1`]
#[derive(Debug, Clone)]
pub struct LoadResourceEvent {
    source: InteropResourceLoadV1,
    data_trigger: DataTrigger,
    request_keys: Vec<ResourceRequestKey>,
}

impl LoadResourceEvent {
    /// Builds the event, resolving its data trigger
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the trigger is missing or unknown.
    pub fn new(source: InteropResourceLoadV1, tenant: &Tenant) -> Result<Self> {
        let data_trigger = source.data_trigger()?;
        let date_range = source
            .metadata
            .backfill_request
            .as_ref()
            .map(|request| request.date_range());
        let key = ResourceRequestKey::new(
            source.metadata.run_id.clone(),
            source.resource_type.clone(),
            tenant.clone(),
            source.resource_fhir_id.clone(),
            date_range,
        );

        Ok(Self {
            source,
            data_trigger,
            request_keys: vec![key],
        })
    }

    pub fn source(&self) -> &InteropResourceLoadV1 {
        &self.source
    }
}

/// Event derived from an [`InteropResourcePublishV1`]
#[derive(Debug, Clone)]
pub struct PublishResourceEvent {
    source: InteropResourcePublishV1,
    resource: Resource,
    data_trigger: DataTrigger,
    request_keys: Vec<ResourceRequestKey>,
}

impl PublishResourceEvent {
    /// Builds an event that requests the embedded resource itself
    ///
    /// # Errors
    ///
    /// Fails if the trigger is unrecognized, the embedded resource cannot be
    /// parsed, or it has no id.
    pub fn for_embedded_resource(source: InteropResourcePublishV1, tenant: &Tenant) -> Result<Self> {
        let data_trigger = source.data_trigger()?;
        let resource = source.resource()?;
        let id = resource.id().ok_or_else(|| {
            RelayError::Validation(format!(
                "Published {} resource has no id",
                source.resource_type
            ))
        })?;
        let key = ResourceRequestKey::new(
            source.metadata.run_id.clone(),
            source.resource_type.clone(),
            tenant.clone(),
            id,
            backfill_range(&source.metadata),
        );

        Ok(Self {
            source,
            resource,
            data_trigger,
            request_keys: vec![key],
        })
    }

    /// Builds an event that requests every `target_resource_type` the embedded resource references
    ///
    /// An Appointment publish can, for example, request each Patient named in
    /// its participants.
    pub fn for_references(
        source: InteropResourcePublishV1,
        tenant: &Tenant,
        target_resource_type: &str,
    ) -> Result<Self> {
        let data_trigger = source.data_trigger()?;
        let resource = source.resource()?;
        let date_range = backfill_range(&source.metadata);
        let request_keys = resource
            .referenced_ids(target_resource_type)
            .into_iter()
            .map(|id| {
                ResourceRequestKey::new(
                    source.metadata.run_id.clone(),
                    target_resource_type,
                    tenant.clone(),
                    id,
                    date_range,
                )
            })
            .collect();

        Ok(Self {
            source,
            resource,
            data_trigger,
            request_keys,
        })
    }

    pub fn source(&self) -> &InteropResourcePublishV1 {
        &self.source
    }

    /// The resource embedded in the publish event
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    fn self_reference(&self) -> Option<UpstreamReference> {
        self.resource
            .id()
            .map(|id| UpstreamReference::new(self.source.resource_type.clone(), id))
    }
}

fn backfill_range(metadata: &Metadata) -> Option<crate::domain::DateRange> {
    metadata
        .backfill_request
        .as_ref()
        .map(|request| request.date_range())
}

/// One inbound event contributing keys to a [`super::ResourceRequest`]
#[derive(Debug, Clone)]
pub enum ResourceEvent {
    Load(LoadResourceEvent),
    Publish(PublishResourceEvent),
}

impl ResourceEvent {
    /// Keys this event wants loaded
    pub fn request_keys(&self) -> &[ResourceRequestKey] {
        match self {
            Self::Load(event) => &event.request_keys,
            Self::Publish(event) => &event.request_keys,
        }
    }

    /// Metadata as received
    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Load(event) => &event.source.metadata,
            Self::Publish(event) => &event.source.metadata,
        }
    }

    /// Metadata to publish downstream resources with
    ///
    /// Load events pass their metadata through. Publish events return a copy
    /// with their own resource appended to the upstream reference chain.
    pub fn updated_metadata(&self) -> Metadata {
        match self {
            Self::Load(event) => event.source.metadata.clone(),
            Self::Publish(event) => match event.self_reference() {
                Some(reference) => event.source.metadata.with_appended_reference(reference),
                None => event.source.metadata.clone(),
            },
        }
    }

    /// `ResourceType/id` of the resource that caused this event, if any
    pub fn source_reference(&self) -> Option<String> {
        match self {
            Self::Load(_) => None,
            Self::Publish(event) => event
                .self_reference()
                .map(|reference| format!("{}/{}", reference.resource_type, reference.id)),
        }
    }

    pub fn process_downstream_references(&self) -> bool {
        match self {
            Self::Load(event) => !event
                .source
                .flow_options
                .as_ref()
                .map(|options| options.disable_downstream_resources)
                .unwrap_or(false),
            Self::Publish(_) => true,
        }
    }

    pub fn minimum_registry_cache_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Load(event) => event
                .source
                .flow_options
                .as_ref()
                .and_then(|options| options.normalization_registry_minimum_time),
            Self::Publish(_) => None,
        }
    }

    pub fn data_trigger(&self) -> DataTrigger {
        match self {
            Self::Load(event) => event.data_trigger,
            Self::Publish(event) => event.data_trigger,
        }
    }
}

impl From<LoadResourceEvent> for ResourceEvent {
    fn from(event: LoadResourceEvent) -> Self {
        Self::Load(event)
    }
}

impl From<PublishResourceEvent> for ResourceEvent {
    fn from(event: PublishResourceEvent) -> Self {
        Self::Publish(event)
    }
}
