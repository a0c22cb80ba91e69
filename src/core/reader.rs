//! Topic reader - chooses the next batch of inbound messages
//!
//! Each poll drains exactly one topic, in priority order: nightly publish
//! events for the subscribed upstream types, then load events for the
//! channel's own type, then ad-hoc publish events. Within the publish
//! streams the first subscribed type with events wins; types are never
//! merged into one batch.

use crate::adapters::events::EventSource;
use crate::adapters::tenant::TenantConfigService;
use crate::domain::{
    is_resource_blocked, DataTrigger, InboundMessage, InteropResourceLoadV1,
    InteropResourcePublishV1, Result, Topic, LOAD_EVENT_NAME, PUBLISH_EVENT_NAME,
};
use std::sync::Arc;

/// Polls an [`EventSource`] on behalf of one channel
pub struct TopicReader {
    source: Arc<dyn EventSource>,
    tenant_config: Arc<dyn TenantConfigService>,
    resource_type: String,
    subscribed_resource_types: Vec<String>,
}

impl TopicReader {
    pub fn new(
        source: Arc<dyn EventSource>,
        tenant_config: Arc<dyn TenantConfigService>,
        resource_type: impl Into<String>,
        subscribed_resource_types: Vec<String>,
    ) -> Self {
        Self {
            source,
            tenant_config,
            resource_type: resource_type.into(),
            subscribed_resource_types,
        }
    }

    /// The next batch of messages, or an empty batch when every topic is empty
    pub async fn next_batch(&self) -> Result<Vec<InboundMessage>> {
        let nightly = self.publish_batch(DataTrigger::Nightly).await?;
        if !nightly.is_empty() {
            return Ok(nightly);
        }

        let load = self.load_batch().await?;
        if !load.is_empty() {
            return Ok(load);
        }

        self.publish_batch(DataTrigger::AdHoc).await
    }

    async fn publish_batch(&self, trigger: DataTrigger) -> Result<Vec<InboundMessage>> {
        for resource_type in &self.subscribed_resource_types {
            let events = self
                .source
                .retrieve_publish_events(resource_type, trigger)
                .await?;
            let messages = events
                .iter()
                .filter(|event| self.is_allowed(&event.tenant_id, &event.resource_type))
                .map(|event| publish_message(event, resource_type, trigger))
                .collect::<Result<Vec<_>>>()?;

            if !messages.is_empty() {
                tracing::debug!(
                    resource_type = %resource_type,
                    trigger = %trigger.as_str(),
                    count = messages.len(),
                    "Read publish events"
                );
                return Ok(messages);
            }
        }
        Ok(Vec::new())
    }

    /// Hands a message that failed processing back to its source
    pub async fn reject(&self, message: &InboundMessage) -> Result<()> {
        self.source.reject(message).await
    }

    /// Moves previously rejected messages back onto their topics
    pub async fn requeue_rejected(&self) -> Result<usize> {
        self.source.requeue_rejected().await
    }

    async fn load_batch(&self) -> Result<Vec<InboundMessage>> {
        let events = self.source.retrieve_load_events(&self.resource_type).await?;
        let messages = events
            .iter()
            .filter(|event| self.is_allowed(&event.tenant_id, &event.resource_type))
            .map(|event| load_message(event, &self.resource_type))
            .collect::<Result<Vec<_>>>()?;

        if !messages.is_empty() {
            tracing::debug!(
                resource_type = %self.resource_type,
                count = messages.len(),
                "Read load events"
            );
        }
        Ok(messages)
    }

    fn is_allowed(&self, tenant: &str, resource_type: &str) -> bool {
        let blocked = self.tenant_config.blocked_resources(tenant);
        if is_resource_blocked(blocked.as_deref(), resource_type) {
            tracing::debug!(
                tenant = %tenant,
                resource_type = %resource_type,
                "Dropping event for blocked resource type"
            );
            return false;
        }
        true
    }
}

fn publish_message(
    event: &InteropResourcePublishV1,
    topic_type: &str,
    trigger: DataTrigger,
) -> Result<InboundMessage> {
    Ok(InboundMessage::new(serde_json::to_string(event)?, &event.tenant_id)
        .with_event_name(PUBLISH_EVENT_NAME)
        .with_run_id(&event.metadata.run_id)
        .with_topic(Topic::Publish {
            resource_type: topic_type.to_string(),
            trigger,
        }))
}

fn load_message(event: &InteropResourceLoadV1, topic_type: &str) -> Result<InboundMessage> {
    Ok(InboundMessage::new(serde_json::to_string(event)?, &event.tenant_id)
        .with_event_name(LOAD_EVENT_NAME)
        .with_run_id(&event.metadata.run_id)
        .with_topic(Topic::Load {
            resource_type: topic_type.to_string(),
        }))
}
