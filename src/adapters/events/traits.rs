//! Event source trait

use crate::domain::{
    DataTrigger, InboundMessage, InteropResourceLoadV1, InteropResourcePublishV1, Result,
};
use async_trait::async_trait;

/// Topic client the reader polls
///
/// Each call drains whatever is currently available for the topic. Events
/// returned are considered consumed unless handed back with [`reject`].
///
/// [`reject`]: EventSource::reject
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Publish events for an upstream resource type and trigger
    async fn retrieve_publish_events(
        &self,
        resource_type: &str,
        trigger: DataTrigger,
    ) -> Result<Vec<InteropResourcePublishV1>>;

    /// Load events for a resource type
    async fn retrieve_load_events(&self, resource_type: &str) -> Result<Vec<InteropResourceLoadV1>>;

    /// Keeps a message that failed processing so it can be redelivered
    async fn reject(&self, message: &InboundMessage) -> Result<()>;

    /// Returns every rejected message to its topic, reporting how many were moved
    async fn requeue_rejected(&self) -> Result<usize>;
}
