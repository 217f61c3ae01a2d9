//! # Batch Jobs
//!
//! Each job is a pre/main/post lifecycle behind the [`BatchJob`] trait:
//! `prepare` loads what the run needs (connections, audit identifiers),
//! `execute` runs the transformation SQL, and `finalize` records the
//! outcome and releases connections. The runner drives the phases and
//! guarantees `finalize` is attempted even when an earlier phase fails.

pub mod batch_detail_close;
pub mod batch_detail_start;
pub mod consumption_detail;
pub mod runner;

use async_trait::async_trait;

use crate::aws::s3::ObjectStore;
use crate::aws::ssm::ParameterStore;
use crate::config::AppConfig;
use crate::constants::{jobs, ProcessStatus};
use crate::context::RunContext;
use crate::error::{BatchError, BatchResult};

pub use batch_detail_close::BatchDetailCloseJob;
pub use batch_detail_start::BatchDetailStartJob;
pub use consumption_detail::ConsumptionDetailJob;
pub use runner::{run_job, JobServices};

/// One registered batch job
///
/// Implementations hold their own connections as state between phases.
/// `finalize` receives the run outcome and must release resources on both
/// the success and the error path.
#[async_trait]
pub trait BatchJob: Send {
    /// Registered job name, as recorded in the audit tables
    fn name(&self) -> &'static str;

    /// Acquire connections and open audit state
    async fn prepare(&mut self, ctx: &mut RunContext, services: &JobServices) -> BatchResult<()>;

    /// Run the job's transformation steps
    async fn execute(&mut self, ctx: &mut RunContext, services: &JobServices) -> BatchResult<()>;

    /// Record the outcome and release connections
    async fn finalize(
        &mut self,
        ctx: &mut RunContext,
        services: &JobServices,
        outcome: ProcessStatus,
    ) -> BatchResult<()>;
}

/// Look up a job implementation by its registered name
pub fn build_job(job_name: &str) -> BatchResult<Box<dyn BatchJob>> {
    match job_name {
        jobs::CONSUMPTION_SUBSCRIPTION_DETAIL => Ok(Box::new(ConsumptionDetailJob::new())),
        jobs::BATCH_DETAIL_START => Ok(Box::new(BatchDetailStartJob::new())),
        jobs::BATCH_DETAIL_CLOSE => Ok(Box::new(BatchDetailCloseJob::new())),
        other => Err(BatchError::UnknownJob {
            job_name: other.to_string(),
        }),
    }
}
