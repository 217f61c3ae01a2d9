//! Audit lifecycle tests against a live database.
//!
//! These run with `cargo test -- --ignored` and need `DATABASE_URL`
//! pointing at a disposable Postgres. Each test builds its own schema
//! with the audit tables, so nothing outside that schema is touched.

use sqlx::PgPool;

use edw_batch::context::{FileMetadata, RowCounts};
use edw_batch::models::{Batch, BatchDetail, DetailClose, NewBatchDetail};
use edw_batch::{BatchError, ProcessStatus};

async fn connect() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must point at a disposable Postgres for ignored tests");
    PgPool::connect(&url).await.expect("database connection")
}

async fn create_audit_schema(pool: &PgPool, schema: &str) {
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(pool)
        .await
        .expect("create schema");

    sqlx::query(&format!(
        "CREATE TABLE {schema}.batch_audit (
             batch_id bigint NOT NULL,
             subject_area_id integer NOT NULL,
             process_status_cd varchar(20) NOT NULL
         )"
    ))
    .execute(pool)
    .await
    .expect("create batch_audit");

    sqlx::query(&format!(
        "CREATE TABLE {schema}.batch_audit_detail (
             batch_detail_id bigserial PRIMARY KEY,
             batch_id bigint NOT NULL,
             job_nm varchar(255) NOT NULL,
             process_status_cd varchar(20) NOT NULL,
             batch_detail_start_ts timestamp,
             batch_detail_end_ts timestamp,
             file_nm varchar(255),
             file_rcvd_ts timestamp,
             file_size_in_bytes_qty bigint,
             src_table_nm varchar(255),
             tgt_table_nm varchar(255),
             src_rec_qty bigint,
             ins_rec_qty bigint,
             upd_rec_qty bigint,
             err_rec_qty bigint
         )"
    ))
    .execute(pool)
    .await
    .expect("create batch_audit_detail");
}

async fn seed_open_batch(pool: &PgPool, schema: &str, batch_id: i64) {
    sqlx::query(&format!(
        "INSERT INTO {schema}.batch_audit (batch_id, subject_area_id, process_status_cd) \
         VALUES ($1, $2, $3)"
    ))
    .bind(batch_id)
    .bind(1i32)
    .bind("In Progress")
    .execute(pool)
    .await
    .expect("seed batch_audit");
}

async fn drop_audit_schema(pool: &PgPool, schema: &str) {
    sqlx::query(&format!("DROP SCHEMA {schema} CASCADE"))
        .execute(pool)
        .await
        .expect("drop schema");
}

fn unique_schema(label: &str) -> String {
    format!("audit_it_{label}_{}", std::process::id())
}

#[tokio::test]
#[ignore]
async fn test_detail_lifecycle_start_to_complete() {
    let pool = connect().await;
    let schema = unique_schema("lifecycle");
    create_audit_schema(&pool, &schema).await;
    seed_open_batch(&pool, &schema, 100).await;

    let batch = Batch::find_in_progress(&pool, &schema, 1).await.unwrap();
    assert_eq!(batch.batch_id, 100);

    let detail = BatchDetail::start(
        &pool,
        &schema,
        NewBatchDetail {
            batch_id: batch.batch_id,
            job_nm: "Job_IT_Lifecycle",
            src_table_nm: "stg.src",
            tgt_table_nm: "stg.tgt",
        },
    )
    .await
    .unwrap();
    assert!(detail.batch_detail_id > 0);
    assert_eq!(detail.batch_id, 100);

    let close = DetailClose {
        status: ProcessStatus::Complete,
        counts: RowCounts {
            src_rec_qty: 100,
            ins_rec_qty: 97,
            upd_rec_qty: 0,
            err_rec_qty: 3,
        },
        file: FileMetadata {
            file_nm: String::new(),
            file_rcvd_ts: None,
            file_size_in_bytes_qty: 0,
        },
    };
    BatchDetail::close(&pool, &schema, detail.batch_detail_id, &close)
        .await
        .unwrap();

    let (status, file_nm, src, ins, err, closed): (String, String, i64, i64, i64, bool) =
        sqlx::query_as(&format!(
            "SELECT process_status_cd, file_nm, src_rec_qty, ins_rec_qty, err_rec_qty, \
                    batch_detail_end_ts IS NOT NULL \
             FROM {schema}.batch_audit_detail WHERE batch_detail_id = $1"
        ))
        .bind(detail.batch_detail_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(status, "Complete");
    assert_eq!(file_nm, "N/A");
    assert_eq!(src, 100);
    assert_eq!(ins, 97);
    assert_eq!(err, 3);
    assert!(closed);

    let detail_rows: i64 = sqlx::query_scalar(&format!(
        "SELECT count(*) FROM {schema}.batch_audit_detail"
    ))
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(detail_rows, 1);

    drop_audit_schema(&pool, &schema).await;
}

#[tokio::test]
#[ignore]
async fn test_find_in_progress_requires_an_open_batch() {
    let pool = connect().await;
    let schema = unique_schema("nobatch");
    create_audit_schema(&pool, &schema).await;

    let err = Batch::find_in_progress(&pool, &schema, 1).await.unwrap_err();
    assert!(matches!(err, BatchError::AuditState { .. }));

    drop_audit_schema(&pool, &schema).await;
}

#[tokio::test]
#[ignore]
async fn test_detail_start_returns_its_own_row_id() {
    let pool = connect().await;
    let schema = unique_schema("scoped");
    create_audit_schema(&pool, &schema).await;
    seed_open_batch(&pool, &schema, 7).await;

    let new_detail = NewBatchDetail {
        batch_id: 7,
        job_nm: "Job_IT_Scoped",
        src_table_nm: "stg.src",
        tgt_table_nm: "stg.tgt",
    };

    let first = BatchDetail::start(&pool, &schema, new_detail.clone())
        .await
        .unwrap();
    let second = BatchDetail::start(&pool, &schema, new_detail).await.unwrap();

    assert!(second.batch_detail_id > first.batch_detail_id);

    drop_audit_schema(&pool, &schema).await;
}

#[tokio::test]
#[ignore]
async fn test_close_of_unknown_detail_is_an_error() {
    let pool = connect().await;
    let schema = unique_schema("unknown");
    create_audit_schema(&pool, &schema).await;

    let close = DetailClose {
        status: ProcessStatus::Complete,
        counts: RowCounts::default(),
        file: FileMetadata {
            file_nm: "N/A".to_string(),
            file_rcvd_ts: None,
            file_size_in_bytes_qty: 0,
        },
    };
    let err = BatchDetail::close(&pool, &schema, 999_999, &close)
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::AuditState { .. }));

    drop_audit_schema(&pool, &schema).await;
}
