//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and
//! files. Console output follows the run interactively; the JSON file layer
//! is what operations pulls when a scheduled run fails overnight.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `level_override` comes from the `--log_level` argument and wins over the
/// environment default when present.
pub fn init_structured_logging(level_override: Option<&str>) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = level_override
            .map(|level| level.to_lowercase())
            .unwrap_or_else(|| get_log_level(&environment));

        // Create log directory if it doesn't exist
        let log_dir = PathBuf::from("log");
        if !log_dir.exists() && fs::create_dir_all(&log_dir).is_err() {
            eprintln!("Failed to create log directory; file layer disabled");
        }

        // Log file name carries environment, PID, and timestamp
        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");
        let log_path = log_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(EnvFilter::new(log_level.clone())),
            )
            .with(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level)),
            );

        // try_init instead of init: tests may have installed a subscriber
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_path.display(),
            "Structured logging initialized with file output"
        );

        // The guard must outlive the process for the non-blocking writer
        std::mem::forget(guard);
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var(crate::constants::system::ENVIRONMENT_VAR)
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "prod" | "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log the start of a job run
pub fn log_job_start(job_name: &str, run_id: &str) {
    tracing::info!(
        job_name = %job_name,
        run_id = %run_id,
        timestamp = %Utc::now().to_rfc3339(),
        "JOB_START"
    );
}

/// Log the end of a job run with its outcome
pub fn log_job_end(job_name: &str, run_id: &str, status: &str, duration_ms: u64) {
    tracing::info!(
        job_name = %job_name,
        run_id = %run_id,
        status = %status,
        duration_ms = duration_ms,
        timestamp = %Utc::now().to_rfc3339(),
        "JOB_END"
    );
}

/// Log the start of a named step within a job
pub fn log_step_start(step: &str, job_name: &str) {
    tracing::info!(
        step = %step,
        job_name = %job_name,
        "STEP_START"
    );
}

/// Log the end of a named step within a job
pub fn log_step_end(step: &str, job_name: &str, duration_ms: u64) {
    tracing::info!(
        step = %step,
        job_name = %job_name,
        duration_ms = duration_ms,
        "STEP_END"
    );
}

/// Log an error with its full source chain
pub fn log_exception(component: &str, operation: &str, error: &(dyn std::error::Error + 'static)) {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %chain,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
