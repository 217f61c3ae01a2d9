use sqlx::PgPool;
use tracing::info;

use crate::constants::{system, ProcessStatus};
use crate::context::{FileMetadata, RowCounts};
use crate::error::{BatchError, BatchResult};
use crate::validation::validate_identifier;

/// A detail row in `batch_audit_detail`, one per job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchDetail {
    pub batch_detail_id: i64,
    pub batch_id: i64,
}

/// Fields for opening a detail row
#[derive(Debug, Clone)]
pub struct NewBatchDetail<'a> {
    pub batch_id: i64,
    pub job_nm: &'a str,
    pub src_table_nm: &'a str,
    pub tgt_table_nm: &'a str,
}

/// Values written onto the detail row at close time
#[derive(Debug, Clone)]
pub struct DetailClose {
    pub status: ProcessStatus,
    pub counts: RowCounts,
    pub file: FileMetadata,
}

impl BatchDetail {
    /// Open a detail row and return its generated id
    ///
    /// The insert and the id lookup run in one transaction so the max-id
    /// scan, scoped to this batch and job, can only see our own row as
    /// the newest in-progress one.
    pub async fn start(
        pool: &PgPool,
        ods_schema: &str,
        new_detail: NewBatchDetail<'_>,
    ) -> BatchResult<BatchDetail> {
        let insert_sql = insert_sql(ods_schema)?;
        let detail_id_sql = scoped_detail_id_sql(ods_schema)?;

        let mut tx = pool.begin().await?;

        sqlx::query(&insert_sql)
            .bind(new_detail.batch_id)
            .bind(new_detail.job_nm)
            .bind(ProcessStatus::InProgress.as_str())
            .bind(system::FILE_NM_NOT_APPLICABLE)
            .bind(new_detail.src_table_nm)
            .bind(new_detail.tgt_table_nm)
            .execute(&mut *tx)
            .await?;

        let batch_detail_id: Option<i64> = sqlx::query_scalar(&detail_id_sql)
            .bind(new_detail.batch_id)
            .bind(new_detail.job_nm)
            .bind(ProcessStatus::InProgress.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let Some(batch_detail_id) = batch_detail_id else {
            return Err(BatchError::audit_state(format!(
                "detail row for job {} did not surface after insert",
                new_detail.job_nm
            )));
        };

        info!(
            batch_id = new_detail.batch_id,
            batch_detail_id = batch_detail_id,
            job_nm = %new_detail.job_nm,
            "Opened batch audit detail"
        );

        Ok(BatchDetail {
            batch_detail_id,
            batch_id: new_detail.batch_id,
        })
    }

    /// Newest in-progress detail id for a job name
    ///
    /// Used when the close runs as its own process and the opening id was
    /// not carried across.
    pub async fn find_in_progress_id(
        pool: &PgPool,
        ods_schema: &str,
        job_nm: &str,
    ) -> BatchResult<i64> {
        let sql = find_in_progress_sql(ods_schema)?;

        let batch_detail_id: Option<i64> = sqlx::query_scalar(&sql)
            .bind(job_nm)
            .bind(ProcessStatus::InProgress.as_str())
            .fetch_one(pool)
            .await?;

        match batch_detail_id {
            Some(batch_detail_id) => {
                info!(batch_detail_id = batch_detail_id, job_nm = %job_nm, "Retrieved batch detail ID");
                Ok(batch_detail_id)
            }
            None => Err(BatchError::audit_state(format!(
                "no batch detail in progress for job {job_nm}"
            ))),
        }
    }

    /// Close a detail row with final status, counts, and file metadata
    ///
    /// Exactly one row must be updated; anything else means the id does
    /// not point at a live detail row and the run's counts went nowhere.
    pub async fn close(
        pool: &PgPool,
        ods_schema: &str,
        batch_detail_id: i64,
        close: &DetailClose,
    ) -> BatchResult<()> {
        let sql = close_sql(ods_schema)?;

        let file_nm = if close.file.file_nm.is_empty() {
            system::FILE_NM_NOT_APPLICABLE
        } else {
            close.file.file_nm.as_str()
        };

        let result = sqlx::query(&sql)
            .bind(batch_detail_id)
            .bind(close.status.as_str())
            .bind(file_nm)
            .bind(close.file.file_rcvd_ts)
            .bind(close.file.file_size_in_bytes_qty)
            .bind(close.counts.src_rec_qty)
            .bind(close.counts.ins_rec_qty)
            .bind(close.counts.upd_rec_qty)
            .bind(close.counts.err_rec_qty)
            .execute(pool)
            .await?;

        if result.rows_affected() != 1 {
            return Err(BatchError::audit_state(format!(
                "close updated {} rows for batch detail {batch_detail_id}, expected 1",
                result.rows_affected()
            )));
        }

        info!(
            batch_detail_id = batch_detail_id,
            status = %close.status,
            src_rec_qty = close.counts.src_rec_qty,
            ins_rec_qty = close.counts.ins_rec_qty,
            err_rec_qty = close.counts.err_rec_qty,
            "Closed batch audit detail"
        );

        Ok(())
    }
}

fn insert_sql(ods_schema: &str) -> BatchResult<String> {
    validate_identifier(ods_schema)?;
    Ok(format!(
        "INSERT INTO {ods_schema}.batch_audit_detail \
         (batch_id, job_nm, process_status_cd, batch_detail_start_ts, file_nm, src_table_nm, tgt_table_nm) \
         VALUES ($1, $2, $3, current_timestamp, $4, $5, $6)"
    ))
}

fn scoped_detail_id_sql(ods_schema: &str) -> BatchResult<String> {
    validate_identifier(ods_schema)?;
    Ok(format!(
        "SELECT max(batch_detail_id) FROM {ods_schema}.batch_audit_detail \
         WHERE batch_id = $1 AND job_nm = $2 AND process_status_cd = $3"
    ))
}

fn find_in_progress_sql(ods_schema: &str) -> BatchResult<String> {
    validate_identifier(ods_schema)?;
    Ok(format!(
        "SELECT max(batch_detail_id) FROM {ods_schema}.batch_audit_detail \
         WHERE job_nm = $1 AND process_status_cd = $2"
    ))
}

fn close_sql(ods_schema: &str) -> BatchResult<String> {
    validate_identifier(ods_schema)?;
    Ok(format!(
        "UPDATE {ods_schema}.batch_audit_detail \
         SET process_status_cd = $2, \
             batch_detail_end_ts = current_timestamp, \
             file_nm = $3, \
             file_rcvd_ts = $4, \
             file_size_in_bytes_qty = $5, \
             src_rec_qty = $6, \
             ins_rec_qty = $7, \
             upd_rec_qty = $8, \
             err_rec_qty = $9 \
         WHERE batch_detail_id = $1"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_shape() {
        let sql = insert_sql("edw_ods").unwrap();
        assert!(sql.starts_with("INSERT INTO edw_ods.batch_audit_detail"));
        assert!(sql.contains("batch_detail_start_ts"));
        assert!(sql.contains("current_timestamp"));
        assert!(sql.contains("$6"));
    }

    #[test]
    fn test_scoped_lookup_filters_on_batch_and_job() {
        let sql = scoped_detail_id_sql("edw_ods").unwrap();
        assert!(sql.contains("batch_id = $1"));
        assert!(sql.contains("job_nm = $2"));
        assert!(sql.contains("process_status_cd = $3"));
    }

    #[test]
    fn test_standalone_lookup_filters_on_job_only() {
        let sql = find_in_progress_sql("edw_ods").unwrap();
        assert!(sql.contains("job_nm = $1"));
        assert!(!sql.contains("batch_id"));
    }

    #[test]
    fn test_close_sql_updates_every_audit_field() {
        let sql = close_sql("edw_ods").unwrap();
        for column in [
            "process_status_cd",
            "batch_detail_end_ts",
            "file_nm",
            "file_rcvd_ts",
            "file_size_in_bytes_qty",
            "src_rec_qty",
            "ins_rec_qty",
            "upd_rec_qty",
            "err_rec_qty",
        ] {
            assert!(sql.contains(column), "missing column {column}");
        }
        assert!(sql.ends_with("WHERE batch_detail_id = $1"));
    }

    #[test]
    fn test_sql_builders_reject_injection_shapes() {
        assert!(insert_sql("edw_ods; drop table x").is_err());
        assert!(close_sql("bad-schema").is_err());
        assert!(find_in_progress_sql("1edw").is_err());
    }
}
