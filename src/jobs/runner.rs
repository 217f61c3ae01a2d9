//! Drives a job through its phases and records the outcome.
//!
//! The runner owns everything that is common to every job: the context
//! overlay, the exec-log status lines the scheduler watches, structured
//! log boundaries, and the guarantee that `finalize` runs with an `Error`
//! outcome when any phase fails.

use std::time::Instant;

use tracing::debug;

use crate::aws::s3::ObjectStore;
use crate::aws::ssm::ParameterStore;
use crate::config::AppConfig;
use crate::constants::ProcessStatus;
use crate::context::{load_overlay, RunContext};
use crate::error::BatchResult;
use crate::execlog::ExecLog;
use crate::jobs::BatchJob;
use crate::logging::{log_exception, log_job_end, log_job_start};

/// Shared clients and configuration handed to every job phase
#[derive(Clone)]
pub struct JobServices {
    pub config: AppConfig,
    pub parameter_store: ParameterStore,
    pub object_store: ObjectStore,
}

impl JobServices {
    pub fn new(
        config: AppConfig,
        parameter_store: ParameterStore,
        object_store: ObjectStore,
    ) -> JobServices {
        JobServices {
            config,
            parameter_store,
            object_store,
        }
    }
}

/// Apply the startup context overlay
///
/// An explicitly named overlay must load; the conventional default path
/// is optional and silently skipped when absent.
pub async fn apply_context_overlay(
    ctx: &mut RunContext,
    explicit: Option<&str>,
    object_store: &ObjectStore,
) -> BatchResult<()> {
    match explicit {
        Some(location) => {
            load_overlay(ctx, location, object_store).await?;
        }
        None => {
            let default_path = ctx.default_overlay_path();
            if default_path.exists() {
                let location = default_path.to_string_lossy().to_string();
                load_overlay(ctx, &location, object_store).await?;
            } else {
                debug!(
                    path = %default_path.display(),
                    "No context overlay present, running on defaults"
                );
            }
        }
    }
    Ok(())
}

/// Run one job end to end
///
/// Phase order is overlay, prepare, execute, finalize. A failure in any
/// phase short-circuits to `finalize(Error)`; a finalize failure on that
/// path is logged and swallowed so the original error is what surfaces.
pub async fn run_job(
    job: &mut dyn BatchJob,
    ctx: &mut RunContext,
    services: &JobServices,
    context_file: Option<&str>,
) -> BatchResult<()> {
    apply_context_overlay(ctx, context_file, &services.object_store).await?;

    let exec_log = ExecLog::for_context(ctx);
    let started = Instant::now();

    log_job_start(&ctx.job_name, &ctx.run_id);
    exec_log.record_status(ProcessStatus::InProgress.as_str(), 0, 0);
    exec_log.record_event("INFO", &format!("Job {} started", ctx.job_name));

    let outcome = match run_phases(job, ctx, services).await {
        Ok(()) => match job.finalize(ctx, services, ProcessStatus::Complete).await {
            Ok(()) => Ok(()),
            Err(err) => {
                log_exception("jobs", "finalize", &err);
                Err(err)
            }
        },
        Err(err) => {
            log_exception("jobs", "run", &err);
            if let Err(cleanup_err) = job.finalize(ctx, services, ProcessStatus::Error).await {
                log_exception("jobs", "finalize", &cleanup_err);
            }
            Err(err)
        }
    };

    let duration_secs = started.elapsed().as_secs() as i64;
    let duration_ms = started.elapsed().as_millis() as u64;

    match &outcome {
        Ok(()) => {
            exec_log.record_status(
                ProcessStatus::Complete.as_str(),
                duration_secs,
                ctx.counts.ins_rec_qty,
            );
            exec_log.record_event("INFO", &format!("Job {} completed", ctx.job_name));
            log_job_end(
                &ctx.job_name,
                &ctx.run_id,
                ProcessStatus::Complete.as_str(),
                duration_ms,
            );
        }
        Err(err) => {
            exec_log.record_status(
                ProcessStatus::Error.as_str(),
                duration_secs,
                ctx.counts.ins_rec_qty,
            );
            exec_log.record_event("ERROR", &format!("Job {} failed: {err}", ctx.job_name));
            log_job_end(
                &ctx.job_name,
                &ctx.run_id,
                ProcessStatus::Error.as_str(),
                duration_ms,
            );
        }
    }

    outcome
}

async fn run_phases(
    job: &mut dyn BatchJob,
    ctx: &mut RunContext,
    services: &JobServices,
) -> BatchResult<()> {
    job.prepare(ctx, services).await?;
    job.execute(ctx, services).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BatchError;
    use async_trait::async_trait;
    use std::path::Path;

    fn hermetic_services() -> JobServices {
        let sdk_config = aws_config::SdkConfig::builder().build();
        JobServices::new(
            AppConfig::default(),
            ParameterStore::new(&sdk_config),
            ObjectStore::new(&sdk_config),
        )
    }

    fn context_in(dir: &Path) -> RunContext {
        let mut ctx = RunContext::new("Job_Stub", &AppConfig::default(), "test");
        ctx.paths.etl_home = dir.to_string_lossy().to_string();
        ctx.paths.context_path = dir.to_string_lossy().to_string();
        ctx
    }

    struct ScriptedJob {
        fail_execute: bool,
        phases: Vec<String>,
    }

    impl ScriptedJob {
        fn new(fail_execute: bool) -> ScriptedJob {
            ScriptedJob {
                fail_execute,
                phases: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl BatchJob for ScriptedJob {
        fn name(&self) -> &'static str {
            "Job_Stub"
        }

        async fn prepare(
            &mut self,
            _ctx: &mut RunContext,
            _services: &JobServices,
        ) -> BatchResult<()> {
            self.phases.push("prepare".to_string());
            Ok(())
        }

        async fn execute(
            &mut self,
            _ctx: &mut RunContext,
            _services: &JobServices,
        ) -> BatchResult<()> {
            self.phases.push("execute".to_string());
            if self.fail_execute {
                return Err(BatchError::job("Job_Stub", "scripted failure"));
            }
            Ok(())
        }

        async fn finalize(
            &mut self,
            _ctx: &mut RunContext,
            _services: &JobServices,
            outcome: ProcessStatus,
        ) -> BatchResult<()> {
            self.phases.push(format!("finalize:{outcome}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_job_success_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context_in(dir.path());
        let services = hermetic_services();
        let mut job = ScriptedJob::new(false);

        run_job(&mut job, &mut ctx, &services, None).await.unwrap();

        assert_eq!(job.phases, vec!["prepare", "execute", "finalize:Complete"]);

        let status = std::fs::read_to_string(
            dir.path().join("log").join("Job_Stub_status.txt"),
        )
        .unwrap();
        let lines: Vec<&str> = status.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("|In Progress|"));
        assert!(lines[1].contains("|Complete|"));
    }

    #[tokio::test]
    async fn test_run_job_failure_finalizes_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context_in(dir.path());
        let services = hermetic_services();
        let mut job = ScriptedJob::new(true);

        let err = run_job(&mut job, &mut ctx, &services, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Job { .. }));
        assert_eq!(job.phases, vec!["prepare", "execute", "finalize:Error"]);

        let status = std::fs::read_to_string(
            dir.path().join("log").join("Job_Stub_status.txt"),
        )
        .unwrap();
        assert!(status.lines().last().unwrap().contains("|Error|"));
    }

    #[tokio::test]
    async fn test_overlay_applied_before_phases() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = dir.path().join("context.properties");
        std::fs::write(&overlay, "flow_path=TRIP\nlookup_buffer_days=2\n").unwrap();

        let mut ctx = context_in(dir.path());
        let services = hermetic_services();
        let mut job = ScriptedJob::new(false);

        run_job(&mut job, &mut ctx, &services, None).await.unwrap();

        assert_eq!(ctx.control.flow_path.as_str(), "TRIP");
        assert_eq!(ctx.control.lookup_buffer_days, 2);
    }

    #[tokio::test]
    async fn test_explicit_overlay_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context_in(dir.path());
        let services = hermetic_services();

        let err = apply_context_overlay(
            &mut ctx,
            Some("/nonexistent/run.properties"),
            &services.object_store,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BatchError::ContextOverlay { .. }));
    }

    #[tokio::test]
    async fn test_missing_default_overlay_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context_in(dir.path());
        let services = hermetic_services();

        apply_context_overlay(&mut ctx, None, &services.object_store)
            .await
            .unwrap();
        assert_eq!(ctx.control.lookup_buffer_days, 7);
    }
}
