//! Standalone detail-close step.
//!
//! Marks the run's detail row `Complete` with the counts and file
//! metadata carried in the context. When the opening id was not carried
//! across processes it falls back to the newest in-progress row for the
//! job name, which assumes single-flight execution per job.

use async_trait::async_trait;

use crate::constants::{jobs, ProcessStatus};
use crate::context::RunContext;
use crate::database::{ConnectionSettings, DatabaseConnection};
use crate::error::{BatchError, BatchResult};
use crate::jobs::{BatchJob, JobServices};
use crate::models::{BatchDetail, DetailClose};

pub struct BatchDetailCloseJob {
    warehouse: Option<DatabaseConnection>,
}

impl BatchDetailCloseJob {
    pub fn new() -> BatchDetailCloseJob {
        BatchDetailCloseJob { warehouse: None }
    }
}

impl Default for BatchDetailCloseJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchJob for BatchDetailCloseJob {
    fn name(&self) -> &'static str {
        jobs::BATCH_DETAIL_CLOSE
    }

    async fn prepare(&mut self, _ctx: &mut RunContext, services: &JobServices) -> BatchResult<()> {
        let warehouse = &services.config.database.redshift;
        let settings = ConnectionSettings::for_warehouse(
            warehouse,
            &warehouse.datamart,
            &services.parameter_store,
        )
        .await?;
        self.warehouse =
            Some(DatabaseConnection::connect(&settings, &services.config.database.pool).await?);
        Ok(())
    }

    async fn execute(&mut self, ctx: &mut RunContext, _services: &JobServices) -> BatchResult<()> {
        let connection = self
            .warehouse
            .as_ref()
            .ok_or_else(|| BatchError::job(self.name(), "warehouse connection not prepared"))?;

        let batch_detail_id = match ctx.batch.batch_detail_id {
            Some(batch_detail_id) => batch_detail_id,
            None => {
                BatchDetail::find_in_progress_id(
                    connection.pool(),
                    &ctx.schemas.ods,
                    &ctx.job_name,
                )
                .await?
            }
        };
        ctx.batch.batch_detail_id = Some(batch_detail_id);

        BatchDetail::close(
            connection.pool(),
            &ctx.schemas.ods,
            batch_detail_id,
            &DetailClose {
                status: ProcessStatus::Complete,
                counts: ctx.counts,
                file: ctx.file.clone(),
            },
        )
        .await?;

        Ok(())
    }

    async fn finalize(
        &mut self,
        _ctx: &mut RunContext,
        _services: &JobServices,
        _outcome: ProcessStatus,
    ) -> BatchResult<()> {
        if let Some(connection) = self.warehouse.take() {
            connection.close().await;
        }
        Ok(())
    }
}
