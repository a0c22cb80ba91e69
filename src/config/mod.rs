//! Configuration management for the relay.
//!
//! # Overview
//!
//! The relay reads a TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `RELAY_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use interop_relay::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("interop-relay.toml")?;
//!
//! println!("Channel: {}", config.channel.resource_type);
//! println!("EHR: {}", config.ehr.base_url);
//! println!("Tenants: {}", config.tenants.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run mode
//! - [`ChannelConfig`] - Channel resource type and subscribed upstream types
//! - [`PublisherConfig`] - Run deduplication and response caching
//! - [`EhrConfig`] - EHR FHIR endpoint and credentials
//! - [`PublishConfig`] - Publish endpoint and credentials
//! - [`EventsConfig`] - Inbound event spool
//! - `[[tenants]]` - Tenants and their blocked resource types
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [channel]
//! resource_type = "Location"
//! subscribed_resource_types = ["Appointment", "Encounter"]
//!
//! [ehr]
//! base_url = "https://ehr.example.com/{tenant}/fhir/r4"
//! auth_token = "${RELAY_EHR_TOKEN}"
//!
//! [publish]
//! endpoint = "https://publish.example.com/resources"
//!
//! [[tenants]]
//! mnemonic = "tenant"
//! name = "Example Health"
//! blocked_resources = "Patient"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, ChannelConfig, EhrConfig, EventsConfig, LoggingConfig, PublishConfig,
    PublisherConfig, RelayConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
