//! Standalone detail-start step.
//!
//! Attaches a new in-progress detail row to the newest open batch for the
//! run's subject area. The row stays open on purpose; the paired close
//! step finishes it once the workflow's main load is done.

use async_trait::async_trait;

use crate::constants::{jobs, ProcessStatus};
use crate::context::RunContext;
use crate::database::{ConnectionSettings, DatabaseConnection};
use crate::error::{BatchError, BatchResult};
use crate::jobs::{BatchJob, JobServices};
use crate::models::{Batch, BatchDetail, NewBatchDetail};

pub struct BatchDetailStartJob {
    warehouse: Option<DatabaseConnection>,
}

impl BatchDetailStartJob {
    pub fn new() -> BatchDetailStartJob {
        BatchDetailStartJob { warehouse: None }
    }
}

impl Default for BatchDetailStartJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchJob for BatchDetailStartJob {
    fn name(&self) -> &'static str {
        jobs::BATCH_DETAIL_START
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

        let batch = Batch::find_in_progress(
            connection.pool(),
            &ctx.schemas.ods,
            ctx.batch.subject_area_id,
        )
        .await?;
        ctx.batch.batch_id = Some(batch.batch_id);

        let detail = BatchDetail::start(
            connection.pool(),
            &ctx.schemas.ods,
            NewBatchDetail {
                batch_id: batch.batch_id,
                job_nm: &ctx.job_name,
                src_table_nm: &ctx.batch.src_table_nm,
                tgt_table_nm: &ctx.batch.tgt_table_nm,
            },
        )
        .await?;
        ctx.batch.batch_detail_id = Some(detail.batch_detail_id);

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
