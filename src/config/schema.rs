//! Configuration schema types
//!
//! This module defines the configuration structure for the relay.

use crate::config::SecretString;
use crate::domain::Tenant;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// Main relay configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// The channel this process serves
    pub channel: ChannelConfig,

    /// Publisher behavior
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// EHR FHIR API
    pub ehr: EhrConfig,

    /// Publish destination
    #[serde(default)]
    pub publish: PublishConfig,

    /// Inbound event spool
    #[serde(default)]
    pub events: EventsConfig,

    /// Tenants served by this relay
    #[serde(default)]
    pub tenants: Vec<Tenant>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.channel.validate()?;
        self.publisher.validate()?;
        self.ehr.validate()?;
        self.publish.validate()?;
        self.events.validate()?;
        validate_tenants(&self.tenants)?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (log batches instead of publishing them)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Resource type this channel loads and publishes
    pub resource_type: String,

    /// Upstream resource types whose publish events feed this channel, in priority order
    #[serde(default)]
    pub subscribed_resource_types: Vec<String>,

    /// Fetch and transform without handing anything to the publish sink
    #[serde(default)]
    pub skip_all_publishing: bool,

    /// Store published resources without emitting downstream publish events
    #[serde(default)]
    pub skip_kafka_publishing: bool,
}

impl ChannelConfig {
    fn validate(&self) -> Result<(), String> {
        if self.resource_type.trim().is_empty() {
            return Err("channel.resource_type cannot be empty".to_string());
        }
        if self
            .subscribed_resource_types
            .iter()
            .any(|resource_type| resource_type.trim().is_empty())
        {
            return Err("channel.subscribed_resource_types cannot contain empty entries".to_string());
        }
        Ok(())
    }
}

/// Publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Skip keys already published within the same run
    #[serde(default = "default_true")]
    pub deduplicate: bool,

    /// Keep published resources so later partial duplicates can reuse them
    #[serde(default = "default_true")]
    pub cache_responses: bool,

    /// Number of runs retained by the deduplication cache
    #[serde(default = "default_max_cached_runs")]
    pub max_cached_runs: usize,
}

impl PublisherConfig {
    fn validate(&self) -> Result<(), String> {
        if self.deduplicate && self.max_cached_runs == 0 {
            return Err("publisher.max_cached_runs must be > 0 when deduplicate is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            deduplicate: true,
            cache_responses: true,
            max_cached_runs: default_max_cached_runs(),
        }
    }
}

/// EHR FHIR API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EhrConfig {
    /// Base URL of the FHIR API; `{tenant}` is replaced with the tenant mnemonic
    pub base_url: String,

    /// Bearer token (optional)
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub auth_token: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// TLS certificate verification enabled
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Largest number of ids sent in one `_id` search
    #[serde(default = "default_max_ids_per_request")]
    pub max_ids_per_request: usize,
}

impl EhrConfig {
    fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("ehr.base_url cannot be empty".to_string());
        }
        let sample_url = self.base_url.replace("{tenant}", "tenant");
        Url::parse(&sample_url).map_err(|e| format!("Invalid ehr.base_url '{}': {}", self.base_url, e))?;

        if self.timeout_seconds == 0 {
            return Err("ehr.timeout_seconds must be > 0".to_string());
        }
        if self.max_ids_per_request == 0 || self.max_ids_per_request > 1000 {
            return Err("ehr.max_ids_per_request must be between 1 and 1000".to_string());
        }
        if !self.tls_verify {
            tracing::warn!("TLS certificate verification is disabled for the EHR");
        }
        Ok(())
    }
}

impl Default for EhrConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: None,
            timeout_seconds: default_timeout_seconds(),
            tls_verify: true,
            max_ids_per_request: default_max_ids_per_request(),
        }
    }
}

/// Publish destination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// HTTP endpoint receiving published batches; dry-run when absent
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token (optional)
    #[serde(default)]
    pub auth_token: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl PublishConfig {
    fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = &self.endpoint {
            Url::parse(endpoint)
                .map_err(|e| format!("Invalid publish.endpoint '{endpoint}': {e}"))?;
        }
        if self.timeout_seconds == 0 {
            return Err("publish.timeout_seconds must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            auth_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Inbound event spool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Root directory of the event spool
    #[serde(default = "default_spool_dir")]
    pub spool_dir: String,

    /// Event files read per topic per poll
    #[serde(default = "default_max_files_per_poll")]
    pub max_files_per_poll: usize,

    /// Seconds between polls when following an empty spool
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

impl EventsConfig {
    fn validate(&self) -> Result<(), String> {
        if self.spool_dir.is_empty() {
            return Err("events.spool_dir cannot be empty".to_string());
        }
        if self.max_files_per_poll == 0 {
            return Err("events.max_files_per_poll must be > 0".to_string());
        }
        if self.poll_interval_seconds == 0 {
            return Err("events.poll_interval_seconds must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
            max_files_per_poll: default_max_files_per_poll(),
            poll_interval_seconds: default_poll_interval_seconds(),
        }
    }
}

fn validate_tenants(tenants: &[Tenant]) -> Result<(), String> {
    if tenants.is_empty() {
        return Err("at least one [[tenants]] entry is required".to_string());
    }
    let mut seen = HashSet::new();
    for tenant in tenants {
        if tenant.mnemonic.trim().is_empty() {
            return Err("tenant mnemonic cannot be empty".to_string());
        }
        if tenant.mnemonic.contains('-') {
            return Err(format!(
                "tenant mnemonic '{}' cannot contain '-'",
                tenant.mnemonic
            ));
        }
        if !seen.insert(tenant.mnemonic.as_str()) {
            return Err(format!("duplicate tenant mnemonic '{}'", tenant.mnemonic));
        }
    }
    Ok(())
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log file path
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_max_cached_runs() -> usize {
    100
}

fn default_max_ids_per_request() -> usize {
    100
}

fn default_spool_dir() -> String {
    "/var/spool/interop-relay".to_string()
}

fn default_max_files_per_poll() -> usize {
    100
}

fn default_poll_interval_seconds() -> u64 {
    5
}

fn default_local_path() -> String {
    "/var/log/interop-relay".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn valid_config() -> RelayConfig {
        RelayConfig {
            application: ApplicationConfig::default(),
            channel: ChannelConfig {
                resource_type: "Location".to_string(),
                subscribed_resource_types: vec!["Appointment".to_string()],
                skip_all_publishing: false,
                skip_kafka_publishing: false,
            },
            publisher: PublisherConfig::default(),
            ehr: EhrConfig {
                base_url: "https://ehr.example.com/{tenant}/fhir/r4".to_string(),
                auth_token: Some(secret_string("token".to_string())),
                ..EhrConfig::default()
            },
            publish: PublishConfig::default(),
            events: EventsConfig::default(),
            tenants: vec![Tenant::new("tenant", "Test Tenant")],
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ehr_base_url_validation() {
        let mut config = valid_config();
        config.ehr.base_url = "not a url".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().contains("ehr.base_url"));

        config.ehr.base_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ehr_id_chunk_bounds() {
        let mut config = valid_config();
        config.ehr.max_ids_per_request = 0;
        assert!(config.validate().is_err());

        config.ehr.max_ids_per_request = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_publish_endpoint_validation() {
        let mut config = valid_config();
        config.publish.endpoint = Some("https://publish.example.com/resources".to_string());
        assert!(config.validate().is_ok());

        config.publish.endpoint = Some("::nope".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tenant_validation() {
        let mut config = valid_config();
        config.tenants.push(Tenant::new("tenant", "Duplicate"));
        assert!(config.validate().unwrap_err().contains("duplicate"));

        config.tenants = vec![Tenant::new("ten-ant", "Dashed")];
        assert!(config.validate().is_err());

        config.tenants = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_validation() {
        let mut config = valid_config();
        config.channel.resource_type = " ".to_string();
        assert!(config.validate().is_err());

        config.channel.resource_type = "Location".to_string();
        config.channel.subscribed_resource_types.push(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_requires_capacity() {
        let mut config = valid_config();
        config.publisher.max_cached_runs = 0;
        assert!(config.validate().is_err());

        config.publisher.deduplicate = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_logging_rotation_validation() {
        let mut config = LoggingConfig::default();
        config.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }
}
