//! # Batch Configuration
//!
//! Typed configuration for the batch jobs: warehouse and OLTP endpoints,
//! schema names, audit defaults, and local paths. Values load from TOML
//! files layered by environment, then `EDW_`-prefixed environment
//! variables (see [`loader`]).
//!
//! Credentials never live here. Endpoints carry parameter-store paths and
//! the password (and optionally host/port/database) is resolved at connect
//! time.

pub mod loader;

pub use loader::ConfigManager;

use serde::{Deserialize, Serialize};

use crate::error::{BatchError, BatchResult};
use crate::validation;

/// Root configuration for a deployment environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub schemas: SchemaConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub aws: AwsConfig,
}

/// Database endpoints and pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub redshift: WarehouseConfig,
    #[serde(default)]
    pub aurora: Option<DbEndpointConfig>,
    #[serde(default)]
    pub pool: PoolConfig,
}

/// The shared Redshift endpoint with its two credential sets
///
/// All jobs hit one cluster; the datamart and ODS users differ only in
/// grants. `host`, `port`, and `database` may be inline or resolved from
/// the parameter store under `parameter_prefix` (`<prefix>/host`,
/// `<prefix>/port`, `<prefix>/database`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub parameter_prefix: Option<String>,
    pub datamart: CredentialConfig,
    pub ods: CredentialConfig,
}

/// A database user plus the parameter-store path of its password
///
/// The password parameter is always fetched with decryption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub username: String,
    pub password_parameter: String,
}

/// A standalone database endpoint (the OLTP store)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbEndpointConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub parameter_prefix: Option<String>,
    pub username: String,
    pub password_parameter: String,
}

/// Connection pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout_seconds: 30,
        }
    }
}

/// Warehouse schema names interpolated into job SQL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub ods: String,
    pub datamart_stg: String,
    pub datamart: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            ods: "edw_ods".to_string(),
            datamart_stg: "edw_datamart_stg".to_string(),
            datamart: "edw_datamart".to_string(),
        }
    }
}

/// Audit and window defaults shared by the jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub subject_area_id: i32,
    pub lookup_buffer_days: i32,
    pub cutoff_process_nm: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            subject_area_id: crate::constants::system::DEFAULT_SUBJECT_AREA_ID,
            lookup_buffer_days: crate::constants::system::DEFAULT_LOOKUP_BUFFER_DAYS,
            cutoff_process_nm: "Fact_Summary".to_string(),
        }
    }
}

/// Local filesystem paths used by the exec-log and context overlay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    pub etl_home: String,
    pub local_context_path: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            etl_home: "/tmp/".to_string(),
            local_context_path: "/tmp/".to_string(),
        }
    }
}

/// AWS client settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AwsConfig {
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                redshift: WarehouseConfig {
                    host: None,
                    port: None,
                    database: None,
                    parameter_prefix: Some("/edo/dev/redshift".to_string()),
                    datamart: CredentialConfig {
                        username: "edw_datamart_etl".to_string(),
                        password_parameter: "/edo/dev/redshift/datamart/edw_datamart_stg"
                            .to_string(),
                    },
                    ods: CredentialConfig {
                        username: "edw_datamart_etl".to_string(),
                        password_parameter: "/edo/dev/redshift/ods/edw_ods".to_string(),
                    },
                },
                aurora: None,
                pool: PoolConfig::default(),
            },
            schemas: SchemaConfig::default(),
            batch: BatchConfig::default(),
            paths: PathConfig::default(),
            aws: AwsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate configuration invariants after loading
    pub fn validate(&self) -> BatchResult<()> {
        validation::validate_identifier(&self.schemas.ods)?;
        validation::validate_identifier(&self.schemas.datamart_stg)?;
        validation::validate_identifier(&self.schemas.datamart)?;

        self.database.redshift.validate("database.redshift")?;
        if let Some(aurora) = &self.database.aurora {
            aurora.validate("database.aurora")?;
        }

        if self.database.pool.max_connections == 0 {
            return Err(BatchError::configuration(
                "database.pool",
                "max_connections must be at least 1",
            ));
        }

        if self.batch.subject_area_id < 0 {
            return Err(BatchError::configuration(
                "batch.subject_area_id",
                "subject area id must not be negative",
            ));
        }

        if self.batch.lookup_buffer_days < 0 {
            return Err(BatchError::configuration(
                "batch.lookup_buffer_days",
                "buffer days must not be negative",
            ));
        }

        if self.batch.cutoff_process_nm.trim().is_empty() {
            return Err(BatchError::configuration(
                "batch.cutoff_process_nm",
                "cutoff process name must not be empty",
            ));
        }

        Ok(())
    }
}

impl WarehouseConfig {
    fn validate(&self, component: &str) -> BatchResult<()> {
        if self.host.is_none() && self.parameter_prefix.is_none() {
            return Err(BatchError::configuration(
                component,
                "either host or parameter_prefix is required",
            ));
        }

        self.datamart.validate(&format!("{component}.datamart"))?;
        self.ods.validate(&format!("{component}.ods"))?;

        Ok(())
    }
}

impl CredentialConfig {
    fn validate(&self, component: &str) -> BatchResult<()> {
        if self.username.trim().is_empty() {
            return Err(BatchError::configuration(
                component,
                "username must not be empty",
            ));
        }

        if self.password_parameter.trim().is_empty() {
            return Err(BatchError::configuration(
                component,
                "password_parameter must not be empty",
            ));
        }

        Ok(())
    }
}

impl DbEndpointConfig {
    fn validate(&self, component: &str) -> BatchResult<()> {
        if self.username.trim().is_empty() {
            return Err(BatchError::configuration(
                component,
                "username must not be empty",
            ));
        }

        if self.password_parameter.trim().is_empty() {
            return Err(BatchError::configuration(
                component,
                "password_parameter must not be empty",
            ));
        }

        if self.host.is_none() && self.parameter_prefix.is_none() {
            return Err(BatchError::configuration(
                component,
                "either host or parameter_prefix is required",
            ));
        }

        Ok(())
    }
}
