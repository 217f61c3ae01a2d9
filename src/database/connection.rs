//! Connection settings and pool construction
//!
//! Both warehouse targets speak the PostgreSQL wire protocol, so one
//! connection layer covers Redshift and Aurora. Host, port, and database
//! may be inline in configuration or resolved from the parameter store;
//! passwords always come from the parameter store with decryption.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::aws::ssm::ParameterStore;
use crate::config::{CredentialConfig, DbEndpointConfig, PoolConfig, WarehouseConfig};
use crate::error::{BatchError, BatchResult};

/// Which engine a connection points at; decides the default port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbPlatform {
    Redshift,
    AuroraPostgres,
}

impl DbPlatform {
    pub fn default_port(&self) -> u16 {
        match self {
            DbPlatform::Redshift => 5439,
            DbPlatform::AuroraPostgres => 5432,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DbPlatform::Redshift => "redshift",
            DbPlatform::AuroraPostgres => "aurora_postgres",
        }
    }
}

/// Fully resolved settings for one database login
#[derive(Clone)]
pub struct ConnectionSettings {
    pub platform: DbPlatform,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    password: String,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("platform", &self.platform)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"[MASKED]")
            .finish()
    }
}

impl ConnectionSettings {
    /// Resolve settings for one warehouse credential set
    ///
    /// Inline configuration wins; anything missing is read from the
    /// parameter store under the configured prefix (`<prefix>/host`,
    /// `<prefix>/port`, `<prefix>/database`).
    pub async fn for_warehouse(
        warehouse: &WarehouseConfig,
        credentials: &CredentialConfig,
        parameter_store: &ParameterStore,
    ) -> BatchResult<ConnectionSettings> {
        let (host, port, database) = resolve_endpoint_parts(
            warehouse.host.as_deref(),
            warehouse.port,
            warehouse.database.as_deref(),
            warehouse.parameter_prefix.as_deref(),
            DbPlatform::Redshift,
            parameter_store,
        )
        .await?;

        let password = parameter_store
            .get_parameter(&credentials.password_parameter, true)
            .await?;

        Ok(ConnectionSettings {
            platform: DbPlatform::Redshift,
            host,
            port,
            database,
            username: credentials.username.clone(),
            password,
        })
    }

    /// Resolve settings for a standalone endpoint (the OLTP store)
    pub async fn for_endpoint(
        endpoint: &DbEndpointConfig,
        platform: DbPlatform,
        parameter_store: &ParameterStore,
    ) -> BatchResult<ConnectionSettings> {
        let (host, port, database) = resolve_endpoint_parts(
            endpoint.host.as_deref(),
            endpoint.port,
            endpoint.database.as_deref(),
            endpoint.parameter_prefix.as_deref(),
            platform,
            parameter_store,
        )
        .await?;

        let password = parameter_store
            .get_parameter(&endpoint.password_parameter, true)
            .await?;

        Ok(ConnectionSettings {
            platform,
            host,
            port,
            database,
            username: endpoint.username.clone(),
            password,
        })
    }

    /// Build connect options without leaking the password into logs
    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
    }
}

/// Resolve host, port, and database from inline values or the parameter store
async fn resolve_endpoint_parts(
    host: Option<&str>,
    port: Option<u16>,
    database: Option<&str>,
    parameter_prefix: Option<&str>,
    platform: DbPlatform,
    parameter_store: &ParameterStore,
) -> BatchResult<(String, u16, String)> {
    if let (Some(host), Some(database)) = (host, database) {
        return Ok((
            host.to_string(),
            port.unwrap_or_else(|| platform.default_port()),
            database.to_string(),
        ));
    }

    let prefix = parameter_prefix.ok_or_else(|| {
        BatchError::configuration(
            platform.as_str(),
            "endpoint incomplete and no parameter_prefix configured",
        )
    })?;

    let fetched = parameter_store.get_parameters_by_path(prefix, false).await?;
    let lookup = |name: &str| -> Option<String> {
        fetched
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };

    let host = match host {
        Some(inline) => inline.to_string(),
        None => lookup("host")
            .ok_or_else(|| BatchError::parameter_store(format!("{prefix}/host"), "not found"))?,
    };

    let port = match port {
        Some(inline) => inline,
        None => match lookup("port") {
            Some(raw) => raw.parse::<u16>().map_err(|err| {
                BatchError::parameter_store(format!("{prefix}/port"), err.to_string())
            })?,
            None => platform.default_port(),
        },
    };

    let database = match database {
        Some(inline) => inline.to_string(),
        None => lookup("database").ok_or_else(|| {
            BatchError::parameter_store(format!("{prefix}/database"), "not found")
        })?,
    };

    Ok((host, port, database))
}

/// A live pool for one resolved login
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Open a pool for the given settings
    pub async fn connect(
        settings: &ConnectionSettings,
        pool_config: &PoolConfig,
    ) -> BatchResult<DatabaseConnection> {
        debug!(
            platform = settings.platform.as_str(),
            host = %settings.host,
            port = settings.port,
            database = %settings.database,
            username = %settings.username,
            "Opening database pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(pool_config.max_connections)
            .acquire_timeout(Duration::from_secs(pool_config.acquire_timeout_seconds))
            .connect_with(settings.connect_options())
            .await
            .map_err(|err| BatchError::database_connection(err.to_string()))?;

        info!(
            platform = settings.platform.as_str(),
            database = %settings.database,
            "Database pool established"
        );

        Ok(DatabaseConnection { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(DbPlatform::Redshift.default_port(), 5439);
        assert_eq!(DbPlatform::AuroraPostgres.default_port(), 5432);
    }

    #[test]
    fn test_connect_options_assembly() {
        let settings = ConnectionSettings {
            platform: DbPlatform::Redshift,
            host: "warehouse.cluster.local".to_string(),
            port: 5439,
            database: "edw".to_string(),
            username: "edw_datamart_etl".to_string(),
            password: "secret".to_string(),
        };

        let options = settings.connect_options();
        assert_eq!(options.get_host(), "warehouse.cluster.local");
        assert_eq!(options.get_port(), 5439);
        assert_eq!(options.get_database(), Some("edw"));
        assert_eq!(options.get_username(), "edw_datamart_etl");
    }

    #[test]
    fn test_settings_debug_masks_password() {
        let settings = ConnectionSettings {
            platform: DbPlatform::AuroraPostgres,
            host: "oltp.local".to_string(),
            port: 5432,
            database: "ods".to_string(),
            username: "etl_batch".to_string(),
            password: "s3cr3t-value".to_string(),
        };

        let rendered = format!("{settings:?}");
        assert!(rendered.contains("oltp.local"));
        assert!(!rendered.contains("s3cr3t-value"));
        assert!(rendered.contains("[MASKED]"));
    }
}
