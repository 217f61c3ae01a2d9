//! Configuration Loader
//!
//! Environment-aware configuration loading: `config/default.toml` first,
//! then `config/<environment>.toml`, then `EDW_`-prefixed environment
//! variables (`EDW_DATABASE__REDSHIFT__HOST` maps to
//! `database.redshift.host`). The environment name comes from `EDW_ENV`,
//! falling back to the deployment parameter in the parameter store.

use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::{debug, warn};

use super::AppConfig;
use crate::aws::ssm::ParameterStore;
use crate::constants::system;
use crate::error::BatchResult;

/// Owns the loaded configuration and where it came from
pub struct ConfigManager {
    config: AppConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> BatchResult<ConfigManager> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> BatchResult<ConfigManager> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    ///
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> BatchResult<ConfigManager> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config: AppConfig = Config::builder()
            .add_source(File::from(config_directory.join("default.toml")).required(true))
            .add_source(
                File::from(config_directory.join(format!("{environment}.toml"))).required(false),
            )
            .add_source(Environment::with_prefix("EDW").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        })
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Get sanitized configuration for debugging/logging
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// Detect current environment from environment variables
    fn detect_environment() -> String {
        env::var(system::ENVIRONMENT_VAR)
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// Default configuration directory relative to the working directory
    fn default_config_directory() -> PathBuf {
        PathBuf::from("config")
    }

    /// Mask sensitive fields before configuration reaches a log line
    fn sanitize_config_for_logging(config: &AppConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "token", "credential"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        *val = serde_json::Value::String("[MASKED]".to_string());
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}

/// Resolve the deployment environment name for configuration layering
///
/// The environment variable wins when set. Otherwise the deployment
/// parameter decides: the literal `prod` selects production, anything else
/// (including a missing or unreadable parameter) selects `test`.
pub async fn resolve_environment(parameter_store: &ParameterStore) -> String {
    if let Ok(name) = env::var(system::ENVIRONMENT_VAR) {
        return name.to_lowercase();
    }

    match parameter_store
        .get_parameter(system::ENVIRONMENT_PARAMETER, false)
        .await
    {
        Ok(value) if value == "prod" => "prod".to_string(),
        Ok(_) => "test".to_string(),
        Err(err) => {
            warn!(
                error = %err,
                parameter = system::ENVIRONMENT_PARAMETER,
                "Environment parameter unavailable, defaulting to test"
            );
            "test".to_string()
        }
    }
}
