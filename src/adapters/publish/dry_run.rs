//! Dry-run publish sink
//!
//! Logs what would be published and reports success. Used when the
//! application runs with `dry_run` or has no publish endpoint configured.

use super::traits::{PublishContext, PublishSink};
use crate::domain::Resource;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct DryRunSink;

#[async_trait]
impl PublishSink for DryRunSink {
    async fn publish_resources(
        &self,
        tenant_mnemonic: &str,
        resources: &[Resource],
        context: &PublishContext,
    ) -> bool {
        let references: Vec<String> = resources.iter().map(ToString::to_string).collect();
        tracing::info!(
            tenant = tenant_mnemonic,
            run_id = %context.metadata.run_id,
            data_trigger = %context.data_trigger,
            count = resources.len(),
            resources = ?references,
            "Dry run: skipping publish"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataTrigger, Metadata};
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn test_dry_run_always_succeeds() {
        let resource = Resource::new(json!({"resourceType": "Patient", "id": "1"})).unwrap();
        let context = PublishContext {
            metadata: Metadata::new("run1", Utc::now()),
            data_trigger: DataTrigger::AdHoc,
            skip_kafka_publishing: false,
            process_downstream_references: true,
        };
        assert!(DryRunSink.publish_resources("tenant", &[resource], &context).await);
        assert!(DryRunSink.publish_resources("tenant", &[], &context).await);
    }
}
