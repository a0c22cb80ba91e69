//! HTTP publish sink
//!
//! Posts each batch to `{endpoint}/{tenant}/{resourceType}` as a JSON
//! envelope. Any transport failure or non-2xx status fails the batch.

use super::traits::{PublishContext, PublishSink};
use crate::config::PublishConfig;
use crate::domain::{RelayError, Resource, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishEnvelope<'a> {
    tenant_id: &'a str,
    data_trigger: &'a str,
    metadata: &'a crate::domain::Metadata,
    publish_events: bool,
    process_downstream_references: bool,
    resources: &'a [Resource],
}

/// Sink posting resources to an HTTP endpoint
pub struct HttpPublishSink {
    client: Client,
    endpoint: String,
    config: PublishConfig,
}

impl HttpPublishSink {
    /// Create a sink for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no endpoint is configured or the HTTP
    /// client cannot be built.
    pub fn new(config: PublishConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| {
                RelayError::Configuration("publish.endpoint is required for HTTP publishing".to_string())
            })?
            .trim_end_matches('/')
            .to_string();

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| RelayError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }
}

#[async_trait]
impl PublishSink for HttpPublishSink {
    async fn publish_resources(
        &self,
        tenant_mnemonic: &str,
        resources: &[Resource],
        context: &PublishContext,
    ) -> bool {
        let Some(resource_type) = resources.first().map(Resource::resource_type) else {
            return true;
        };
        let url = format!("{}/{}/{}", self.endpoint, tenant_mnemonic, resource_type);
        let envelope = PublishEnvelope {
            tenant_id: tenant_mnemonic,
            data_trigger: context.data_trigger.as_str(),
            metadata: &context.metadata,
            publish_events: !context.skip_kafka_publishing,
            process_downstream_references: context.process_downstream_references,
            resources,
        };

        let mut request = self.client.post(&url).json(&envelope);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    url = %url,
                    status = status.as_u16(),
                    body = %body,
                    "Publish endpoint rejected batch"
                );
                false
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Publish request failed");
                false
            }
        }
    }
}
