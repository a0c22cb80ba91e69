//! Publish sink trait

use crate::domain::{DataTrigger, Metadata, Resource};
use async_trait::async_trait;

/// Everything a sink needs besides the resources themselves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishContext {
    /// Run metadata, including the upstream reference chain
    pub metadata: Metadata,
    pub data_trigger: DataTrigger,
    /// Store the resources without emitting downstream publish events
    pub skip_kafka_publishing: bool,
    /// Whether downstream channels should follow references from these resources
    pub process_downstream_references: bool,
}

/// Destination for transformed resources
///
/// Publishing is all-or-nothing for the batch handed over; `false` means the
/// whole batch failed. Sinks are expected to be idempotent per resource.
#[async_trait]
pub trait PublishSink: Send + Sync {
    async fn publish_resources(
        &self,
        tenant_mnemonic: &str,
        resources: &[Resource],
        context: &PublishContext,
    ) -> bool;
}
