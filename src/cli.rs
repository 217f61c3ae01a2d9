//! # Job Argument Surface
//!
//! Command-line contract shared with the scheduler. The flag spellings
//! (`--JOB_NAME`, `--log_level`, `--region`) are fixed by the scheduler's
//! invocation templates and validated before any connection is opened.

use clap::Parser;

use crate::error::{BatchError, BatchResult};

/// Arguments accepted by every batch job invocation
#[derive(Parser, Debug, Clone)]
#[command(name = "edw-batch")]
#[command(about = "Run an EDW batch job by its registered name")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct JobArgs {
    /// Registered name of the job to run
    #[arg(long = "JOB_NAME", value_name = "JOB_NAME")]
    pub job_name: String,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long = "log_level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// AWS region override for SDK clients
    #[arg(long = "region", value_name = "REGION")]
    pub region: Option<String>,

    /// Context overlay: local properties/JSON path or an s3:// location
    #[arg(long = "context_file", value_name = "PATH")]
    pub context_file: Option<String>,
}

impl JobArgs {
    /// Validate argument content beyond structural parsing
    ///
    /// Runs before configuration load or connection setup so a bad
    /// invocation never touches the database.
    pub fn validate(&self) -> BatchResult<()> {
        if self.job_name.trim().is_empty() {
            return Err(BatchError::arguments("JOB_NAME must not be empty"));
        }

        if let Some(level) = &self.log_level {
            let normalized = level.to_lowercase();
            let known = ["trace", "debug", "info", "warn", "error"];
            if !known.contains(&normalized.as_str()) {
                return Err(BatchError::arguments(format!(
                    "unknown log level: {level}"
                )));
            }
        }

        Ok(())
    }
}
