//! Validate config command implementation
//!
//! Loads the configuration file, runs validation, and prints a summary.

use crate::config::{load_config, RelayConfig};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        // load_config validates as part of loading
        match load_config(config_path) {
            Ok(config) => {
                println!("Configuration is valid");
                println!();
                print_summary(&config);
                Ok(0)
            }
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                println!();
                Ok(2)
            }
        }
    }
}

fn print_summary(config: &RelayConfig) {
    println!("Configuration Summary:");
    println!("  Log Level: {}", config.application.log_level);
    println!("  Dry Run: {}", config.application.dry_run);
    println!("  Channel Resource Type: {}", config.channel.resource_type);
    println!(
        "  Subscribed Resource Types: {:?}",
        config.channel.subscribed_resource_types
    );
    println!("  EHR Base URL: {}", config.ehr.base_url);
    println!(
        "  Publish Endpoint: {}",
        config.publish.endpoint.as_deref().unwrap_or("(dry-run sink)")
    );
    println!("  Spool Directory: {}", config.events.spool_dir);
    println!(
        "  Deduplication: {} (cache responses: {}, max runs: {})",
        config.publisher.deduplicate,
        config.publisher.cache_responses,
        config.publisher.max_cached_runs
    );
    println!("  Tenants:");
    for tenant in &config.tenants {
        match &tenant.blocked_resources {
            Some(blocked) => println!("    {} ({}), blocked: {}", tenant.mnemonic, tenant.name, blocked),
            None => println!("    {} ({})", tenant.mnemonic, tenant.name),
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let args = ValidateArgs {};
        let code = args.execute("does-not-exist.toml").await.unwrap();
        assert_eq!(code, 2);
    }
}
