//! Logging and observability
//!
//! Structured logging through `tracing`, with:
//! - Console output
//! - JSON-formatted local log files with rotation
//! - Log levels from configuration or `RUST_LOG`
//!
//! # Example
//!
//! ```no_run
//! use interop_relay::logging::init_logging;
//! use interop_relay::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Relay started");
//! tracing::error!(error = "EHR unreachable", "Fetch failed");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of processing one inbound message
///
/// # Example
///
/// ```no_run
/// use interop_relay::log_publish_start;
///
/// log_publish_start!("tenant", "Location", "run-42", 3);
/// ```
#[macro_export]
macro_rules! log_publish_start {
    ($tenant:expr, $resource_type:expr, $run_id:expr, $key_count:expr) => {
        tracing::info!(
            tenant = %$tenant,
            resource_type = %$resource_type,
            run_id = %$run_id,
            key_count = $key_count,
            "Processing resource request"
        );
    };
}

/// Log a successful publish
///
/// ```no_run
/// use interop_relay::log_publish_complete;
/// use std::time::Duration;
///
/// log_publish_complete!(12, Duration::from_millis(340));
/// ```
#[macro_export]
macro_rules! log_publish_complete {
    ($count:expr, $duration:expr) => {
        tracing::info!(
            count = $count,
            duration_ms = $duration.as_millis(),
            "Published resources"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use interop_relay::log_error_with_context;
/// use interop_relay::domain::RelayError;
///
/// let error = RelayError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
