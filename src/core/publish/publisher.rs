//! Event resource publisher - the per-message orchestrator
//!
//! Takes one inbound message through tenant resolution, request building,
//! run-level deduplication, fetch, transform and publish, and reports the
//! outcome as a [`PublishResponse`].

use super::cache::RunCache;
use super::response::{
    failed_publish_message, failed_transform_message, published_message, truncated_detail,
    truncated_key_detail, PublishResponse, ALREADY_PROCESSED, CACHED_RESOURCE_COUNT_KEY,
    EVENT_METADATA_SOURCE_KEY, FAILED_EHR_CALL, FAILURE_COUNT_KEY, NO_RESOURCES,
    RESOURCE_COUNT_KEY,
};
use crate::adapters::publish::{PublishContext, PublishSink};
use crate::adapters::tenant::TenantService;
use crate::config::PublisherConfig;
use crate::core::request::{ResourceRequestKey, ResourceTypeHandler};
use crate::core::transform::{ResourceTransformer, TransformContext};
use crate::domain::{InboundMessage, RelayError, Resource, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Publishes the resources requested by inbound events for one resource type
pub struct EventResourcePublisher {
    tenants: Arc<dyn TenantService>,
    handler: Arc<dyn ResourceTypeHandler>,
    transformer: Arc<dyn ResourceTransformer>,
    sink: Arc<dyn PublishSink>,
    cache: Arc<dyn RunCache>,
    config: PublisherConfig,
}

/// Fetched resources flattened to distinct entries, with each key's slots
struct FetchedBatch {
    resources: Vec<Resource>,
    slots_by_key: Vec<(ResourceRequestKey, Vec<usize>)>,
}

impl FetchedBatch {
    fn new(keys: &[ResourceRequestKey], mut fetched: HashMap<ResourceRequestKey, Vec<Resource>>) -> Self {
        let mut resources: Vec<Resource> = Vec::new();
        let mut slots_by_key = Vec::new();

        for key in keys {
            let Some(found) = fetched.remove(key) else {
                continue;
            };
            let mut slots = Vec::with_capacity(found.len());
            for resource in found {
                let existing = resource.reference().and_then(|reference| {
                    resources
                        .iter()
                        .position(|r| r.reference().as_deref() == Some(reference.as_str()))
                });
                let slot = match existing {
                    Some(slot) => slot,
                    None => {
                        resources.push(resource);
                        resources.len() - 1
                    }
                };
                if !slots.contains(&slot) {
                    slots.push(slot);
                }
            }
            slots_by_key.push((key.clone(), slots));
        }

        Self {
            resources,
            slots_by_key,
        }
    }
}

impl EventResourcePublisher {
    pub fn new(
        tenants: Arc<dyn TenantService>,
        handler: Arc<dyn ResourceTypeHandler>,
        transformer: Arc<dyn ResourceTransformer>,
        sink: Arc<dyn PublishSink>,
        cache: Arc<dyn RunCache>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            tenants,
            handler,
            transformer,
            sink,
            cache,
            config,
        }
    }

    /// The resource type this publisher loads
    pub fn resource_type(&self) -> &str {
        self.handler.resource_type()
    }

    /// Process one inbound message
    ///
    /// Fetch, transform and publish failures are reported through the
    /// returned response.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown tenant, a missing event name, or a
    /// body that cannot be turned into a request. These abort the message.
    pub async fn process(&self, message: &InboundMessage) -> Result<PublishResponse> {
        let start_time = Instant::now();

        let tenant = self
            .tenants
            .get_tenant_for_mnemonic(&message.tenant_mnemonic)
            .await?
            .ok_or_else(|| {
                RelayError::Tenant(format!("Unknown tenant mnemonic {}", message.tenant_mnemonic))
            })?;

        let event_name = message.event_name.as_deref().ok_or_else(|| {
            RelayError::Configuration("Missing event name on inbound message".to_string())
        })?;

        let request = self
            .handler
            .convert_event_to_request(&message.body, event_name, &tenant)?;
        let run_id = request.run_id().to_string();
        let request_keys = request.request_keys();

        crate::log_publish_start!(
            tenant.mnemonic,
            self.handler.resource_type(),
            run_id,
            request_keys.len()
        );

        let cached = if self.config.deduplicate {
            self.cache.lookup(&run_id, &request_keys)
        } else {
            HashMap::new()
        };

        if !request_keys.is_empty() && cached.len() == request_keys.len() {
            tracing::info!(
                run_id = %run_id,
                keys = request_keys.len(),
                "Every requested resource already processed for run"
            );
            let detail = format!(
                "All {} requested resource(s) already processed for run {}: {}",
                request_keys.len(),
                run_id,
                truncated_key_detail(&request_keys)
            );
            return Ok(PublishResponse::sent(ALREADY_PROCESSED, detail)
                .with_resources(self.folded_resources(&request_keys, &cached)));
        }

        let remaining: Vec<ResourceRequestKey> = request_keys
            .iter()
            .filter(|key| !cached.contains_key(*key))
            .cloned()
            .collect();
        let folded = self.folded_resources(&request_keys, &cached);
        if !cached.is_empty() {
            tracing::debug!(
                run_id = %run_id,
                cached_keys = cached.len(),
                folded_resources = folded.len(),
                remaining_keys = remaining.len(),
                "Skipping keys already processed for run"
            );
        }

        let fetched = match request.load_resources(self.handler.as_ref(), &remaining).await {
            Ok(fetched) => fetched,
            Err(e) => {
                crate::log_error_with_context!(&e, "Failed to load resources from EHR");
                let detail = match e {
                    RelayError::Ehr(inner) => inner.to_string(),
                    other => other.to_string(),
                };
                return Ok(PublishResponse::error(FAILED_EHR_CALL, detail));
            }
        };

        let batch = FetchedBatch::new(&remaining, fetched);
        if batch.resources.is_empty() {
            return Ok(self.no_resources_response(&run_id, folded));
        }

        let context = TransformContext {
            minimum_registry_cache_time: request.minimum_registry_cache_time(),
        };
        let transformed: Vec<Option<Resource>> = batch
            .resources
            .iter()
            .map(|resource| match self.transformer.transform(resource, &tenant, &context) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::debug!(resource = %resource, error = %e, "Resource failed transformation");
                    None
                }
            })
            .collect();

        let survivors: Vec<Resource> = transformed.iter().flatten().cloned().collect();
        let failure_count = batch.resources.len() - survivors.len();

        if survivors.is_empty() {
            tracing::error!(
                count = batch.resources.len(),
                run_id = %run_id,
                "No resources survived transformation"
            );
            return Ok(PublishResponse::error(
                failed_transform_message(batch.resources.len()),
                truncated_detail(&batch.resources),
            )
            .with_data(FAILURE_COUNT_KEY, failure_count));
        }

        if failure_count > 0 {
            let dropped: Vec<String> = batch
                .resources
                .iter()
                .zip(&transformed)
                .filter(|(_, result)| result.is_none())
                .map(|(source, _)| source.to_string())
                .collect();
            tracing::warn!(
                dropped = ?dropped,
                failure_count,
                transformed = survivors.len(),
                "Some resources failed transformation"
            );
        }

        if request.skip_all_publishing {
            tracing::info!(
                count = survivors.len(),
                run_id = %run_id,
                "Publishing skipped for request"
            );
        } else {
            let publish_context = PublishContext {
                metadata: request.metadata(),
                data_trigger: request.data_trigger(),
                skip_kafka_publishing: request.skip_kafka_publishing,
                process_downstream_references: request.process_downstream_references(),
            };
            if !self
                .sink
                .publish_resources(&tenant.mnemonic, &survivors, &publish_context)
                .await
            {
                tracing::error!(
                    count = survivors.len(),
                    run_id = %run_id,
                    tenant = %tenant.mnemonic,
                    "Failed to publish resources"
                );
                return Ok(PublishResponse::error(
                    failed_publish_message(survivors.len()),
                    truncated_detail(&survivors),
                )
                .with_data(FAILURE_COUNT_KEY, survivors.len()));
            }
        }

        if self.config.deduplicate {
            self.cache
                .record(&run_id, self.resolved_entries(&batch, &transformed));
        }

        crate::log_publish_complete!(survivors.len(), start_time.elapsed());

        let mut response = PublishResponse::sent(
            published_message(survivors.len()),
            truncated_detail(&survivors),
        )
        .with_data(RESOURCE_COUNT_KEY, survivors.len())
        .with_data(FAILURE_COUNT_KEY, failure_count);

        let sources = request.source_references();
        if !sources.is_empty() {
            response = response.with_data(EVENT_METADATA_SOURCE_KEY, sources.join(","));
        }
        if !folded.is_empty() {
            response = response.with_data(CACHED_RESOURCE_COUNT_KEY, folded.len());
        }

        let mut resources = survivors;
        resources.extend(folded);
        Ok(response.with_resources(resources))
    }

    /// Distinct cached resources for the matched keys, when responses are cached
    fn folded_resources(
        &self,
        keys: &[ResourceRequestKey],
        cached: &HashMap<ResourceRequestKey, Vec<Resource>>,
    ) -> Vec<Resource> {
        if !self.config.cache_responses {
            return Vec::new();
        }
        let mut folded: Vec<Resource> = Vec::new();
        for resource in keys.iter().filter_map(|key| cached.get(key)).flatten() {
            if !folded.contains(resource) {
                folded.push(resource.clone());
            }
        }
        folded
    }

    /// Keys that produced at least one published resource
    fn resolved_entries(
        &self,
        batch: &FetchedBatch,
        transformed: &[Option<Resource>],
    ) -> HashMap<ResourceRequestKey, Vec<Resource>> {
        batch
            .slots_by_key
            .iter()
            .filter_map(|(key, slots)| {
                let published: Vec<Resource> = slots
                    .iter()
                    .filter_map(|slot| transformed[*slot].clone())
                    .collect();
                if published.is_empty() {
                    return None;
                }
                let retained = if self.config.cache_responses {
                    published
                } else {
                    Vec::new()
                };
                Some((key.clone(), retained))
            })
            .collect()
    }

    fn no_resources_response(&self, run_id: &str, folded: Vec<Resource>) -> PublishResponse {
        tracing::info!(run_id = %run_id, "No resources returned from EHR");
        if folded.is_empty() {
            return PublishResponse::sent(NO_RESOURCES, "No resources returned for request");
        }
        let detail = format!(
            "No new resources returned; {} resource(s) already processed for run {}",
            folded.len(),
            run_id
        );
        PublishResponse::sent(NO_RESOURCES, detail)
            .with_data(CACHED_RESOURCE_COUNT_KEY, folded.len())
            .with_resources(folded)
    }
}
