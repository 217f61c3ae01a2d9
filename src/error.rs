//! # Batch Error Types
//!
//! Structured error handling for the batch jobs using thiserror
//! instead of `Box<dyn Error>` patterns. Every failure is logged where
//! it occurs and propagated up to the binary entry point, which maps it
//! to a non-zero exit code.

use thiserror::Error;

/// Error type shared by every layer of the batch framework
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },

    #[error("Argument error: {message}")]
    Arguments { message: String },

    #[error("Invalid SQL identifier: {name}: {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Audit state error: {message}")]
    AuditState { message: String },

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Database query error: {operation}: {message}")]
    DatabaseQuery { operation: String, message: String },

    #[error("Parameter store error: {parameter}: {message}")]
    ParameterStore { parameter: String, message: String },

    #[error("Object store error: {location}: {message}")]
    ObjectStore { location: String, message: String },

    #[error("Context overlay error: {source_name}: {message}")]
    ContextOverlay { source_name: String, message: String },

    #[error("Date range error: {message}")]
    DateRange { message: String },

    #[error("Unknown job: {job_name}")]
    UnknownJob { job_name: String },

    #[error("Job failed: {job_name}: {message}")]
    Job { job_name: String, message: String },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl BatchError {
    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an argument validation error
    pub fn arguments(message: impl Into<String>) -> Self {
        Self::Arguments {
            message: message.into(),
        }
    }

    /// Create an invalid identifier error
    pub fn invalid_identifier(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an audit state error
    pub fn audit_state(message: impl Into<String>) -> Self {
        Self::AuditState {
            message: message.into(),
        }
    }

    /// Create a database connection error
    pub fn database_connection(message: impl Into<String>) -> Self {
        Self::DatabaseConnection {
            message: message.into(),
        }
    }

    /// Create a database query error
    pub fn database_query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DatabaseQuery {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a parameter store error
    pub fn parameter_store(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParameterStore {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an object store error
    pub fn object_store(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ObjectStore {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a context overlay error
    pub fn context_overlay(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContextOverlay {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a date range error
    pub fn date_range(message: impl Into<String>) -> Self {
        Self::DateRange {
            message: message.into(),
        }
    }

    /// Create a job failure error
    pub fn job(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Job {
            job_name: job_name.into(),
            message: message.into(),
        }
    }
}

/// Conversion from sqlx::Error to BatchError
impl From<sqlx::Error> for BatchError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => BatchError::database_query("query", "No rows found"),
            sqlx::Error::Database(db_err) => {
                BatchError::database_query("database", db_err.to_string())
            }
            sqlx::Error::Configuration(config_err) => {
                BatchError::configuration("database", config_err.to_string())
            }
            _ => BatchError::database_connection(err.to_string()),
        }
    }
}

/// Conversion from config::ConfigError to BatchError
impl From<config::ConfigError> for BatchError {
    fn from(err: config::ConfigError) -> Self {
        BatchError::configuration("config", err.to_string())
    }
}

/// Conversion from std::io::Error to BatchError
impl From<std::io::Error> for BatchError {
    fn from(err: std::io::Error) -> Self {
        BatchError::Io {
            message: err.to_string(),
        }
    }
}

/// Conversion from chrono::ParseError to BatchError
impl From<chrono::ParseError> for BatchError {
    fn from(err: chrono::ParseError) -> Self {
        BatchError::date_range(err.to_string())
    }
}

/// Result type alias for batch operations
pub type BatchResult<T> = Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_error_creation() {
        let audit_err = BatchError::audit_state("No in-progress batch found");
        assert!(matches!(audit_err, BatchError::AuditState { .. }));

        let query_err = BatchError::database_query("detail_close", "update failed");
        assert!(matches!(query_err, BatchError::DatabaseQuery { .. }));

        let arg_err = BatchError::arguments("JOB_NAME is required");
        assert!(matches!(arg_err, BatchError::Arguments { .. }));
    }

    #[test]
    fn test_error_conversions() {
        let sqlx_err = sqlx::Error::RowNotFound;
        let batch_err: BatchError = sqlx_err.into();
        assert!(matches!(batch_err, BatchError::DatabaseQuery { .. }));

        let parse_err = chrono::NaiveDate::parse_from_str("not-a-date", "%Y-%m-%d").unwrap_err();
        let batch_err: BatchError = parse_err.into();
        assert!(matches!(batch_err, BatchError::DateRange { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = BatchError::audit_state("no batch in progress for subject area 1");
        let display_str = format!("{err}");
        assert!(display_str.contains("Audit state error"));
        assert!(display_str.contains("subject area 1"));

        let err = BatchError::parameter_store("/edo/dev/redshift/host", "not found");
        let display_str = format!("{err}");
        assert!(display_str.contains("/edo/dev/redshift/host"));
        assert!(display_str.contains("not found"));
    }
}
