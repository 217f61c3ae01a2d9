//! Batch job entry point.
//!
//! Resolves the deployment environment, loads configuration, builds the
//! requested job, and maps the outcome to the process exit code the
//! scheduler watches: 0 on success, 1 on any failure.

use clap::Parser;

use edw_batch::aws::{self, ObjectStore, ParameterStore};
use edw_batch::cli::JobArgs;
use edw_batch::config::loader::resolve_environment;
use edw_batch::config::ConfigManager;
use edw_batch::context::RunContext;
use edw_batch::error::BatchResult;
use edw_batch::jobs::{self, JobServices};
use edw_batch::logging::{init_structured_logging, log_exception};

#[tokio::main]
async fn main() {
    let args = JobArgs::parse();

    if let Err(err) = args.validate() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    init_structured_logging(args.log_level.as_deref());

    match run(args).await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            log_exception("edw-batch", "main", &err);
            std::process::exit(1);
        }
    }
}

async fn run(args: JobArgs) -> BatchResult<()> {
    let mut sdk_config = aws::load_sdk_config(args.region.as_deref()).await;
    let mut parameter_store = ParameterStore::new(&sdk_config);

    let environment = resolve_environment(&parameter_store).await;
    let manager = ConfigManager::load_from_directory_with_env(None, &environment)?;

    // CLI region wins; a configured region applies when none was given.
    if args.region.is_none() {
        if let Some(region) = manager.config().aws.region.clone() {
            sdk_config = aws::load_sdk_config(Some(&region)).await;
            parameter_store = ParameterStore::new(&sdk_config);
        }
    }
    let object_store = ObjectStore::new(&sdk_config);

    let mut job = jobs::build_job(&args.job_name)?;
    let mut ctx = RunContext::new(&args.job_name, manager.config(), &environment);
    let services = JobServices::new(manager.config().clone(), parameter_store, object_store);

    jobs::run_job(
        job.as_mut(),
        &mut ctx,
        &services,
        args.context_file.as_deref(),
    )
    .await
}
