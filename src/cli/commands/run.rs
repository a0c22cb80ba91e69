//! Run command implementation
//!
//! Polls the event spool and pushes every inbound message through the
//! publisher, either until the spool is empty or, with `--follow`, until a
//! shutdown signal arrives.

use crate::adapters::ehr::HttpFhirService;
use crate::adapters::events::SpoolEventSource;
use crate::adapters::publish::create_publish_sink;
use crate::adapters::tenant::TenantDirectory;
use crate::config::{load_config, RelayConfig};
use crate::core::publish::{EventResourcePublisher, InMemoryRunCache, NoopRunCache, RunCache};
use crate::core::reader::TopicReader;
use crate::core::request::FhirResourceHandler;
use crate::core::transform::LocalizingTransformer;
use crate::domain::{InboundMessage, Result};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Keep polling after the spool is drained
    #[arg(short, long)]
    pub follow: bool,

    /// Log batches instead of publishing them
    #[arg(long)]
    pub dry_run: bool,

    /// Move messages that failed in earlier runs back onto their topics first
    #[arg(long)]
    pub requeue_failed: bool,
}

/// Totals for one run of the command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Batches read from the spool
    pub batches: usize,
    /// Messages that ended in a SENT response
    pub sent: usize,
    /// Messages that ended in an ERROR response
    pub failed: usize,
    /// Messages aborted before a response could be built
    pub aborted: usize,
}

impl RunSummary {
    pub fn messages(&self) -> usize {
        self.sent + self.failed + self.aborted
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.aborted == 0
    }
}

/// Wires the reader and publisher for a configuration
///
/// # Errors
///
/// Returns an error when the EHR client or publish sink cannot be built.
pub fn build_pipeline(config: &RelayConfig) -> Result<(TopicReader, EventResourcePublisher)> {
    let tenants = Arc::new(TenantDirectory::new(config.tenants.clone()));
    let ehr = Arc::new(HttpFhirService::new(config.ehr.clone())?);
    let handler = Arc::new(
        FhirResourceHandler::new(config.channel.resource_type.clone(), ehr)
            .with_skip_all_publishing(config.channel.skip_all_publishing)
            .with_skip_kafka_publishing(config.channel.skip_kafka_publishing),
    );
    let cache: Arc<dyn RunCache> = if config.publisher.deduplicate {
        Arc::new(InMemoryRunCache::new(config.publisher.max_cached_runs))
    } else {
        Arc::new(NoopRunCache)
    };

    let publisher = EventResourcePublisher::new(
        tenants.clone(),
        handler,
        Arc::new(LocalizingTransformer::new()),
        create_publish_sink(config)?,
        cache,
        config.publisher.clone(),
    );

    let source = Arc::new(SpoolEventSource::new(
        &config.events.spool_dir,
        config.events.max_files_per_poll,
    ));
    let reader = TopicReader::new(
        source,
        tenants,
        config.channel.resource_type.clone(),
        config.channel.subscribed_resource_types.clone(),
    );

    Ok((reader, publisher))
}

/// Polls `reader` and processes every message with `publisher`
///
/// Stops when a poll comes back empty, unless `follow` is set, in which case
/// it sleeps for `poll_interval` and polls again until `shutdown` turns true.
/// A failing poll is fatal. Failing messages are counted and handed back to
/// the reader with [`TopicReader::reject`] so they are not lost.
pub async fn process_until_idle(
    reader: &TopicReader,
    publisher: &EventResourcePublisher,
    mut shutdown: watch::Receiver<bool>,
    follow: bool,
    poll_interval: Duration,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    while !*shutdown.borrow() {
        let batch = reader.next_batch().await?;

        if batch.is_empty() {
            if !follow {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown.changed() => {}
            }
            continue;
        }

        summary.batches += 1;
        for message in &batch {
            match publisher.process(message).await {
                Ok(response) if response.is_sent() => {
                    tracing::info!(
                        tenant = %message.tenant_mnemonic,
                        message = %response.message,
                        "Message processed"
                    );
                    summary.sent += 1;
                }
                Ok(response) => {
                    tracing::error!(
                        tenant = %message.tenant_mnemonic,
                        message = %response.message,
                        detail = %response.detailed_message,
                        "Message failed"
                    );
                    summary.failed += 1;
                    reject(reader, message).await;
                }
                Err(e) => {
                    crate::log_error_with_context!(&e, "Message aborted");
                    summary.aborted += 1;
                    reject(reader, message).await;
                }
            }
        }
    }

    Ok(summary)
}

async fn reject(reader: &TopicReader, message: &InboundMessage) {
    if let Err(e) = reader.reject(message).await {
        crate::log_error_with_context!(&e, "Failed message could not be kept");
    }
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        let (reader, publisher) = build_pipeline(&config)?;

        if self.requeue_failed {
            let requeued = reader.requeue_rejected().await?;
            println!("Requeued {requeued} failed message(s)");
        }

        tracing::info!(
            resource_type = %publisher.resource_type(),
            subscribed = ?config.channel.subscribed_resource_types,
            spool_dir = %config.events.spool_dir,
            follow = self.follow,
            "Starting relay"
        );

        let summary = process_until_idle(
            &reader,
            &publisher,
            shutdown_signal,
            self.follow,
            Duration::from_secs(config.events.poll_interval_seconds),
        )
        .await?;

        println!("Run complete");
        println!("  Batches: {}", summary.batches);
        println!("  Messages: {}", summary.messages());
        println!("  Sent: {}", summary.sent);
        println!("  Failed: {}", summary.failed);
        println!("  Aborted: {}", summary.aborted);

        Ok(if summary.is_success() { 0 } else { 1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_success() {
        let mut summary = RunSummary {
            batches: 2,
            sent: 3,
            ..RunSummary::default()
        };
        assert!(summary.is_success());
        assert_eq!(summary.messages(), 3);

        summary.aborted = 1;
        assert!(!summary.is_success());
        assert_eq!(summary.messages(), 4);
    }
}
