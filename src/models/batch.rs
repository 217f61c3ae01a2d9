use sqlx::PgPool;
use tracing::info;

use crate::constants::ProcessStatus;
use crate::error::{BatchError, BatchResult};
use crate::validation::validate_identifier;

/// An open batch in `batch_audit`
///
/// Batches are opened by an upstream controller process; jobs here only
/// ever attach detail rows to the newest one for their subject area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub batch_id: i64,
    pub subject_area_id: i32,
}

impl Batch {
    /// Find the newest in-progress batch for a subject area
    ///
    /// No open batch is an error: running a detail job outside an open
    /// batch would attach its counts to nothing.
    pub async fn find_in_progress(
        pool: &PgPool,
        ods_schema: &str,
        subject_area_id: i32,
    ) -> BatchResult<Batch> {
        let sql = find_in_progress_sql(ods_schema)?;

        let batch_id: Option<i64> = sqlx::query_scalar(&sql)
            .bind(ProcessStatus::InProgress.as_str())
            .bind(subject_area_id)
            .fetch_one(pool)
            .await?;

        match batch_id {
            Some(batch_id) => {
                info!(batch_id = batch_id, subject_area_id = subject_area_id, "Retrieved batch ID");
                Ok(Batch {
                    batch_id,
                    subject_area_id,
                })
            }
            None => Err(BatchError::audit_state(format!(
                "no batch in progress for subject area {subject_area_id}"
            ))),
        }
    }
}

fn find_in_progress_sql(ods_schema: &str) -> BatchResult<String> {
    validate_identifier(ods_schema)?;
    Ok(format!(
        "SELECT max(batch_id) FROM {ods_schema}.batch_audit \
         WHERE process_status_cd = $1 AND subject_area_id = $2"
    ))
}
