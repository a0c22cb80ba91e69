//! Publish sinks
//!
//! - [`traits`] - the [`PublishSink`] abstraction and [`PublishContext`]
//! - [`http`] - HTTP endpoint sink
//! - [`dry_run`] - logging-only sink

pub mod dry_run;
pub mod http;
pub mod traits;

pub use dry_run::DryRunSink;
pub use http::HttpPublishSink;
pub use traits::{PublishContext, PublishSink};

use crate::config::RelayConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Selects the sink for a configuration: dry-run when requested or when no endpoint is set
pub fn create_publish_sink(config: &RelayConfig) -> Result<Arc<dyn PublishSink>> {
    if config.application.dry_run || config.publish.endpoint.is_none() {
        tracing::info!("Using dry-run publish sink");
        return Ok(Arc::new(DryRunSink));
    }
    Ok(Arc::new(HttpPublishSink::new(config.publish.clone())?))
}
