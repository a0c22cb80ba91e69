//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::RelayConfig;
use crate::config::secret_string;
use crate::domain::errors::RelayError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into RelayConfig
/// 4. Applies environment variable overrides (RELAY_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use interop_relay::config::loader::load_config;
///
/// let config = load_config("interop-relay.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<RelayConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(RelayError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        RelayError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses, overrides and validates configuration text
pub fn parse_config(contents: &str) -> Result<RelayConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: RelayConfig = toml::from_str(&contents)
        .map_err(|e| RelayError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        RelayError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| RelayError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|missing| missing == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(RelayError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the RELAY_* prefix
///
/// Environment variables follow the pattern RELAY_<SECTION>_<KEY>, for
/// example RELAY_EHR_BASE_URL or RELAY_APPLICATION_DRY_RUN. Values that do
/// not parse are ignored.
fn apply_env_overrides(config: &mut RelayConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("RELAY_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("RELAY_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // Channel overrides
    if let Ok(val) = std::env::var("RELAY_CHANNEL_RESOURCE_TYPE") {
        config.channel.resource_type = val;
    }
    if let Ok(val) = std::env::var("RELAY_CHANNEL_SUBSCRIBED_RESOURCE_TYPES") {
        config.channel.subscribed_resource_types = val
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(String::from)
            .collect();
    }

    if let Ok(val) = std::env::var("RELAY_CHANNEL_SKIP_ALL_PUBLISHING") {
        config.channel.skip_all_publishing = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("RELAY_CHANNEL_SKIP_KAFKA_PUBLISHING") {
        config.channel.skip_kafka_publishing = val.parse().unwrap_or(false);
    }

    // Publisher overrides
    if let Ok(val) = std::env::var("RELAY_PUBLISHER_DEDUPLICATE") {
        config.publisher.deduplicate = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("RELAY_PUBLISHER_CACHE_RESPONSES") {
        config.publisher.cache_responses = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("RELAY_PUBLISHER_MAX_CACHED_RUNS") {
        if let Ok(runs) = val.parse() {
            config.publisher.max_cached_runs = runs;
        }
    }

    // EHR overrides
    if let Ok(val) = std::env::var("RELAY_EHR_BASE_URL") {
        config.ehr.base_url = val;
    }
    if let Ok(val) = std::env::var("RELAY_EHR_AUTH_TOKEN") {
        config.ehr.auth_token = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("RELAY_EHR_TLS_VERIFY") {
        config.ehr.tls_verify = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("RELAY_EHR_TIMEOUT_SECONDS") {
        if let Ok(timeout) = val.parse() {
            config.ehr.timeout_seconds = timeout;
        }
    }

    // Publish overrides
    if let Ok(val) = std::env::var("RELAY_PUBLISH_ENDPOINT") {
        config.publish.endpoint = Some(val);
    }
    if let Ok(val) = std::env::var("RELAY_PUBLISH_AUTH_TOKEN") {
        config.publish.auth_token = Some(secret_string(val));
    }

    // Events overrides
    if let Ok(val) = std::env::var("RELAY_EVENTS_SPOOL_DIR") {
        config.events.spool_dir = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("RELAY_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("RELAY_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}
