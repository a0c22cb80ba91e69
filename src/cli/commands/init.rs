//! Init command implementation
//!
//! Writes a sample configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "interop-relay.toml")]
    pub output: String,

    /// Include every section with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your channel, EHR and tenants", self.output);
                println!("  2. Put tokens in a .env file (RELAY_EHR_AUTH_TOKEN, RELAY_PUBLISH_AUTH_TOKEN)");
                println!("  3. Validate configuration: interop-relay validate-config");
                println!("  4. Run: interop-relay run --follow");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# Interop Relay Configuration

[application]
log_level = "info"
dry_run = true

[channel]
resource_type = "Location"
subscribed_resource_types = ["Appointment"]

[ehr]
base_url = "https://ehr.example.com/{tenant}/fhir/r4"

[events]
spool_dir = "./spool"

[[tenants]]
mnemonic = "tenant"
name = "Example Health"

[logging]
local_enabled = false
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# Interop Relay Configuration
#
# Values of the form ${VAR} are read from the environment (or a .env file).
# Any setting can also be overridden with RELAY_<SECTION>_<KEY>.

[application]
# trace | debug | info | warn | error
log_level = "info"
# Log batches instead of publishing them
dry_run = false

[channel]
# Resource type this channel loads from the EHR and publishes
resource_type = "Location"
# Upstream types whose publish events reference this type, highest priority first
subscribed_resource_types = ["Appointment", "Encounter"]
# Fetch and transform only; nothing reaches the publish sink
skip_all_publishing = false
# Store resources without emitting downstream publish events
skip_kafka_publishing = false

[publisher]
# Skip resources already published within the same run
deduplicate = true
# Reuse cached resources when a message is only partly a duplicate
cache_responses = true
# Runs remembered by the deduplication cache before the oldest is dropped
max_cached_runs = 100

[ehr]
# {tenant} is replaced with the tenant mnemonic
base_url = "https://ehr.example.com/{tenant}/fhir/r4"
auth_token = "${RELAY_EHR_TOKEN}"
timeout_seconds = 60
tls_verify = true
max_ids_per_request = 100

[publish]
# Omit the endpoint to use the dry-run sink
endpoint = "https://publish.example.com/resources"
auth_token = "${RELAY_PUBLISH_TOKEN}"
timeout_seconds = 60

[events]
# publish/<nightly|adhoc>/<Type>/*.json and load/<Type>/*.json
spool_dir = "/var/spool/interop-relay"
max_files_per_poll = 100
poll_interval_seconds = 5

[[tenants]]
mnemonic = "tenant"
name = "Example Health"
# Comma-separated resource types never relayed for this tenant
blocked_resources = "Patient"

[[tenants]]
mnemonic = "other"
name = "Other Clinic"

[logging]
local_enabled = true
local_path = "/var/log/interop-relay"
# daily | hourly | never
local_rotation = "daily"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, RelayConfig};
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_is_valid() {
        let config = parse_config(&InitArgs::generate_minimal_config()).unwrap();
        assert_eq!(config.channel.resource_type, "Location");
        assert!(config.application.dry_run);
    }

    #[test]
    fn test_example_config_parses() {
        let config: RelayConfig =
            toml::from_str(&InitArgs::generate_config_with_examples()).unwrap();
        assert_eq!(config.tenants.len(), 2);
        assert_eq!(config.tenants[0].blocked_resources.as_deref(), Some("Patient"));
        assert_eq!(
            config.channel.subscribed_resource_types,
            vec!["Appointment".to_string(), "Encounter".to_string()]
        );
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("relay.toml");
        std::fs::write(&output, "existing").unwrap();

        let args = InitArgs {
            output: output.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "existing");

        let forced = InitArgs { force: true, ..args };
        assert_eq!(forced.execute().await.unwrap(), 0);
        assert!(std::fs::read_to_string(&output).unwrap().contains("[channel]"));
    }
}
