//! Consumption day/subscription staging-to-detail load.
//!
//! The run resolves a load window first: IDL runs take the scheduler's
//! execution bounds as dates, regular runs compute the window from the
//! process-control and consumption-cutoff tables (previous month until
//! one day past the cutoff, current month after). The selected flow path
//! then rebuilds the day/subscription staging table with rank-1
//! deduplication per (date, subscription key, consumed service), and the
//! detail load joins it out to the subscription dimensions.
//!
//! All window values are bound parameters; relation and column names come
//! from the context and pass identifier validation before they reach SQL
//! text.

use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::info;

use crate::constants::{jobs, FlowPath, ProcessStatus};
use crate::context::{DateWindow, RunContext, SchemaNames, TableNames};
use crate::database::{ConnectionSettings, DatabaseConnection};
use crate::error::{BatchError, BatchResult};
use crate::jobs::{BatchJob, JobServices};
use crate::logging::{log_step_end, log_step_start};
use crate::models::{Batch, BatchDetail, DetailClose, NewBatchDetail};
use crate::validation::{validate_identifier, validate_qualified_name};

const TRIP_TEMP_TABLE: &str = "tmp_st_device_trip_dt_subs";

pub struct ConsumptionDetailJob {
    datamart: Option<DatabaseConnection>,
    ods: Option<DatabaseConnection>,
}

impl ConsumptionDetailJob {
    pub fn new() -> ConsumptionDetailJob {
        ConsumptionDetailJob {
            datamart: None,
            ods: None,
        }
    }

    fn datamart(&self) -> BatchResult<&DatabaseConnection> {
        self.datamart
            .as_ref()
            .ok_or_else(|| BatchError::job(self.name(), "datamart connection not prepared"))
    }

    fn ods(&self) -> BatchResult<&DatabaseConnection> {
        self.ods
            .as_ref()
            .ok_or_else(|| BatchError::job(self.name(), "ods connection not prepared"))
    }
}

impl Default for ConsumptionDetailJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchJob for ConsumptionDetailJob {
    fn name(&self) -> &'static str {
        jobs::CONSUMPTION_SUBSCRIPTION_DETAIL
    }

    async fn prepare(&mut self, ctx: &mut RunContext, services: &JobServices) -> BatchResult<()> {
        ctx.batch.src_table_nm = ctx.tables.stg_src_table.clone();
        ctx.batch.tgt_table_nm = ctx.tables.stg_table_dt_subs_dtl.clone();

        let warehouse = &services.config.database.redshift;
        let pool_config = &services.config.database.pool;

        let datamart_settings = ConnectionSettings::for_warehouse(
            warehouse,
            &warehouse.datamart,
            &services.parameter_store,
        )
        .await?;
        self.datamart = Some(DatabaseConnection::connect(&datamart_settings, pool_config).await?);

        let ods_settings =
            ConnectionSettings::for_warehouse(warehouse, &warehouse.ods, &services.parameter_store)
                .await?;
        self.ods = Some(DatabaseConnection::connect(&ods_settings, pool_config).await?);

        let pool = self.datamart()?.pool();
        let batch =
            Batch::find_in_progress(pool, &ctx.schemas.ods, ctx.batch.subject_area_id).await?;
        ctx.batch.batch_id = Some(batch.batch_id);

        let detail = BatchDetail::start(
            pool,
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

    async fn execute(&mut self, ctx: &mut RunContext, _services: &JobServices) -> BatchResult<()> {
        let datamart = self.datamart()?;

        let step = Instant::now();
        log_step_start("resolve_date_window", &ctx.job_name);
        let (from_dt, to_dt) = if ctx.window.is_idl {
            idl_date_window(&ctx.window)
        } else {
            cutoff_date_window(
                self.ods()?.pool(),
                &ctx.schemas.ods,
                &ctx.control.cutoff_process_nm,
            )
            .await?
        };
        ctx.window.from_dt = Some(from_dt);
        ctx.window.to_dt = Some(to_dt);
        info!(
            from_dt = %from_dt,
            to_dt = %to_dt,
            is_idl = ctx.window.is_idl,
            "Resolved load window"
        );
        log_step_end(
            "resolve_date_window",
            &ctx.job_name,
            step.elapsed().as_millis() as u64,
        );

        match ctx.control.flow_path {
            FlowPath::Trip => run_trip_path(datamart.pool(), ctx).await?,
            FlowPath::Consumption => run_consumption_path(datamart.pool(), ctx).await?,
        }

        load_subscription_detail(datamart.pool(), ctx).await?;

        let source_count = count_rows(datamart.pool(), &ctx.tables.stg_table_dt_subs).await?;
        let target_count = count_rows(datamart.pool(), &ctx.tables.stg_table_dt_subs_dtl).await?;
        ctx.record_counts(source_count, target_count);
        info!(
            source = source_count,
            target = target_count,
            errored = ctx.counts.err_rec_qty,
            "Recorded row counts"
        );

        Ok(())
    }

    async fn finalize(
        &mut self,
        ctx: &mut RunContext,
        _services: &JobServices,
        outcome: ProcessStatus,
    ) -> BatchResult<()> {
        let close_result = match (&self.datamart, ctx.batch.batch_detail_id) {
            (Some(connection), Some(batch_detail_id)) => {
                BatchDetail::close(
                    connection.pool(),
                    &ctx.schemas.ods,
                    batch_detail_id,
                    &DetailClose {
                        status: outcome,
                        counts: ctx.counts,
                        file: ctx.file.clone(),
                    },
                )
                .await
            }
            _ => Ok(()),
        };

        if let Some(connection) = self.datamart.take() {
            connection.close().await;
        }
        if let Some(connection) = self.ods.take() {
            connection.close().await;
        }

        close_result
    }
}

/// IDL window: the scheduler's execution bounds truncated to dates
fn idl_date_window(window: &DateWindow) -> (NaiveDate, NaiveDate) {
    (window.start_exec_ts.date(), window.end_exec_ts.date())
}

/// Non-IDL window from the process-control and cutoff tables
async fn cutoff_date_window(
    pool: &PgPool,
    ods_schema: &str,
    cutoff_process_nm: &str,
) -> BatchResult<(NaiveDate, NaiveDate)> {
    let sql = cutoff_window_sql(ods_schema)?;

    let window: Option<(NaiveDate, NaiveDate)> = sqlx::query_as(&sql)
        .bind(cutoff_process_nm)
        .fetch_optional(pool)
        .await?;

    window.ok_or_else(|| {
        BatchError::date_range(format!(
            "no cutoff dates found for process {cutoff_process_nm}"
        ))
    })
}

async fn run_consumption_path(pool: &PgPool, ctx: &RunContext) -> BatchResult<()> {
    let step = Instant::now();
    log_step_start("consumption_path", &ctx.job_name);

    let (from_dt, to_dt) = ctx.resolved_window()?;
    let truncate = truncate_sql(&ctx.tables.stg_table_dt_subs)?;
    let insert = consumption_insert_sql(&ctx.tables, &ctx.schemas)?;

    let mut conn = pool.acquire().await?;
    sqlx::query(&truncate).execute(&mut *conn).await?;
    sqlx::query(&insert)
        .bind(from_dt)
        .bind(ctx.control.lookup_buffer_days)
        .bind(to_dt)
        .execute(&mut *conn)
        .await?;

    log_step_end(
        "consumption_path",
        &ctx.job_name,
        step.elapsed().as_millis() as u64,
    );
    Ok(())
}

async fn run_trip_path(pool: &PgPool, ctx: &RunContext) -> BatchResult<()> {
    let step = Instant::now();
    log_step_start("trip_path", &ctx.job_name);

    let (from_dt, to_dt) = ctx.resolved_window()?;
    let create_tmp = trip_temp_table_sql(&ctx.tables, &ctx.schemas)?;
    let truncate = truncate_sql(&ctx.tables.stg_table_dt_subs)?;
    let insert = trip_insert_sql(&ctx.tables, &ctx.schemas)?;

    // The temp table is connection-local, so every statement of this
    // path must run on the same acquired connection.
    let mut conn = pool.acquire().await?;
    sqlx::query(&format!("DROP TABLE IF EXISTS {TRIP_TEMP_TABLE}"))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&create_tmp)
        .bind(from_dt)
        .bind(ctx.control.lookup_buffer_days)
        .bind(to_dt)
        .execute(&mut *conn)
        .await?;
    sqlx::query(&truncate).execute(&mut *conn).await?;
    sqlx::query(&insert).execute(&mut *conn).await?;

    log_step_end("trip_path", &ctx.job_name, step.elapsed().as_millis() as u64);
    Ok(())
}

async fn load_subscription_detail(pool: &PgPool, ctx: &RunContext) -> BatchResult<()> {
    let step = Instant::now();
    log_step_start("load_subscription_detail", &ctx.job_name);

    let truncate = truncate_sql(&ctx.tables.stg_table_dt_subs_dtl)?;
    let insert = detail_insert_sql(&ctx.tables, &ctx.schemas)?;

    let mut conn = pool.acquire().await?;
    sqlx::query(&truncate).execute(&mut *conn).await?;
    sqlx::query(&insert).execute(&mut *conn).await?;

    log_step_end(
        "load_subscription_detail",
        &ctx.job_name,
        step.elapsed().as_millis() as u64,
    );
    Ok(())
}

async fn count_rows(pool: &PgPool, table: &str) -> BatchResult<i64> {
    validate_qualified_name(table)?;
    let sql = format!("SELECT count(*) FROM {table}");
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(count)
}

fn truncate_sql(table: &str) -> BatchResult<String> {
    validate_qualified_name(table)?;
    Ok(format!("TRUNCATE TABLE {table}"))
}

/// Window query; binds: $1 = cutoff process name
///
/// The month of the previous run decides the join to the cutoff table,
/// and the window starts at the previous month while the run date is at
/// most one day past the consumption cutoff.
fn cutoff_window_sql(ods_schema: &str) -> BatchResult<String> {
    validate_identifier(ods_schema)?;
    Ok(format!(
        "SELECT \
           CASE WHEN start_exec_dt <= dateadd(day, 1, cnsmptn_cutoff_dt) \
                THEN first_day_of_prev_month ELSE first_day_of_curr_month END AS from_dt, \
           start_exec_dt AS to_dt \
         FROM ( \
           SELECT pc.*, max(coff.cnsmptn_cutoff_dt) cnsmptn_cutoff_dt \
           FROM ( \
             SELECT start_exec_ts, \
                    start_exec_ts::date AS start_exec_dt, \
                    add_months(start_exec_ts, -1) prev_month_dt, \
                    date_part('year', add_months(start_exec_ts, -1))::integer AS prev_month_year, \
                    date_part('month', add_months(start_exec_ts, -1))::integer AS prev_month, \
                    date_trunc('month', prev_month_dt)::date AS first_day_of_prev_month, \
                    date_trunc('month', start_exec_ts)::date AS first_day_of_curr_month, \
                    date_part('month', start_exec_ts)::integer AS curr_month \
             FROM {ods_schema}.process_control WHERE process_nm = $1 \
           ) pc \
           JOIN {ods_schema}.consumption_cutoff coff \
             ON pc.prev_month_year = coff.brdcst_year_nbr \
            AND pc.prev_month = coff.brdcst_month_nbr \
           GROUP BY 1, 2, 3, 4, 5, 6, 7, 8 \
         )"
    ))
}

fn validate_path_names(tables: &TableNames, schemas: &SchemaNames) -> BatchResult<()> {
    validate_qualified_name(&tables.stg_table_dt_subs)?;
    validate_qualified_name(&tables.stg_src_table)?;
    validate_identifier(&schemas.ods)?;
    validate_identifier(&tables.ods_table_subscription_link)?;
    validate_identifier(&tables.link_id)?;
    Ok(())
}

/// Consumption path insert; binds: $1 = from date, $2 = buffer days, $3 = to date
fn consumption_insert_sql(tables: &TableNames, schemas: &SchemaNames) -> BatchResult<String> {
    validate_path_names(tables, schemas)?;
    validate_identifier(&tables.dt_subs_date_column)?;
    validate_identifier(&tables.event_date_column)?;

    let stg_dt_subs = &tables.stg_table_dt_subs;
    let stg_src = &tables.stg_src_table;
    let ods = &schemas.ods;
    let link_table = &tables.ods_table_subscription_link;
    let date_col = &tables.dt_subs_date_column;
    let event_col = &tables.event_date_column;
    let link_id = &tables.link_id;

    Ok(format!(
        "INSERT INTO {stg_dt_subs} ( \
           {date_col}, sbscrptn_key_id, cnsmd_srvc_cd, cnsumd_veh_device_id, \
           sbscrptn_subtype_prdct_catg_cd) \
         SELECT {date_col}, sbscrptn_key_id, cnsmd_srvc_cd, cnsumd_veh_device_id, \
                sbscrptn_subtype_prdct_catg_cd \
         FROM ( \
           SELECT tmp.{date_col}, tmp.sbscrptn_key_id, tmp.cnsmd_srvc_cd, \
                  tmp.cnsumd_veh_device_id, tmp.sbscrptn_subtype_prdct_catg_cd, \
                  row_number() OVER (PARTITION BY tmp.{date_col}, tmp.sbscrptn_key_id, \
                    tmp.cnsmd_srvc_cd ORDER BY tmp.rec_cnt DESC) rnk \
           FROM ( \
             SELECT DISTINCT a.{date_col}, b.sbscrptn_key_id, a.cnsmd_srvc_cd, \
                    a.device_id AS cnsumd_veh_device_id, b.sbscrptn_subtype_prdct_catg_cd, \
                    count(1) rec_cnt \
             FROM {stg_src} a \
             JOIN {ods}.{link_table} b ON a.{link_id} = b.{link_id} \
             WHERE a.{event_col} >= $1 - $2 AND a.{event_col} < $3 + $2 \
             GROUP BY 1, 2, 3, 4, 5 \
           ) tmp \
         ) tmp1 WHERE rnk = 1"
    ))
}

/// Trip temp-table build; binds: $1 = from date, $2 = buffer days, $3 = to date
///
/// Trip events only carry the audio service, and device ids are clamped
/// to the staging column width.
fn trip_temp_table_sql(tables: &TableNames, schemas: &SchemaNames) -> BatchResult<String> {
    validate_path_names(tables, schemas)?;

    let stg_src = &tables.stg_src_table;
    let ods = &schemas.ods;
    let link_table = &tables.ods_table_subscription_link;
    let link_id = &tables.link_id;

    Ok(format!(
        "CREATE TEMP TABLE {TRIP_TEMP_TABLE} AS \
         SELECT DISTINCT a.trip_start_est_ts::date AS trip_start_est_dt, \
                a.trip_end_est_ts::date AS trip_end_est_dt, \
                b.sbscrptn_key_id, \
                'Audio' AS cnsmd_srvc_cd, \
                a.device_id::varchar(20) AS cnsumd_veh_device_id, \
                b.sbscrptn_subtype_prdct_catg_cd, \
                count(1) rec_cnt \
         FROM {stg_src} a \
         JOIN {ods}.{link_table} b ON a.{link_id} = b.{link_id} \
         WHERE a.trip_start_est_ts::date >= $1 - $2 AND a.trip_start_est_ts::date < $3 + $2 \
         GROUP BY 1, 2, 3, 4, 5, 6"
    ))
}

/// Trip path insert: expand each trip across its calendar days, then rank
fn trip_insert_sql(tables: &TableNames, schemas: &SchemaNames) -> BatchResult<String> {
    validate_qualified_name(&tables.stg_table_dt_subs)?;
    validate_identifier(&schemas.datamart)?;

    let stg_dt_subs = &tables.stg_table_dt_subs;
    let datamart = &schemas.datamart;

    Ok(format!(
        "INSERT INTO {stg_dt_subs} ( \
           trip_start_est_dt, sbscrptn_key_id, cnsmd_srvc_cd, cnsumd_veh_device_id, \
           sbscrptn_subtype_prdct_catg_cd) \
         SELECT trip_start_est_dt, sbscrptn_key_id, cnsmd_srvc_cd, cnsumd_veh_device_id, \
                sbscrptn_subtype_prdct_catg_cd \
         FROM ( \
           SELECT tmp.trip_start_est_dt, tmp.sbscrptn_key_id, tmp.cnsmd_srvc_cd, \
                  tmp.cnsumd_veh_device_id, tmp.sbscrptn_subtype_prdct_catg_cd, \
                  row_number() OVER (PARTITION BY tmp.trip_start_est_dt, tmp.sbscrptn_key_id, \
                    tmp.cnsmd_srvc_cd ORDER BY tmp.rec_cnt DESC) rnk \
           FROM ( \
             SELECT DISTINCT dd.clndr_dt AS trip_start_est_dt, a.sbscrptn_key_id, \
                    a.cnsmd_srvc_cd, a.cnsumd_veh_device_id, a.sbscrptn_subtype_prdct_catg_cd, \
                    rec_cnt \
             FROM {TRIP_TEMP_TABLE} a \
             JOIN {datamart}.dim_date dd \
               ON dd.clndr_dt BETWEEN a.trip_start_est_dt AND a.trip_end_est_dt \
           ) tmp \
         ) tmp1 WHERE rnk = 1"
    ))
}

/// Detail load: staging days joined out to subscription dimensions
///
/// Trial and self-pay windows collapse to the `2999-12-31` / `1970-01-01`
/// sentinels the downstream marts expect, and service subtype lookups go
/// through the audio and streaming views separately.
fn detail_insert_sql(tables: &TableNames, schemas: &SchemaNames) -> BatchResult<String> {
    validate_qualified_name(&tables.stg_table_dt_subs_dtl)?;
    validate_qualified_name(&tables.stg_table_dt_subs)?;
    validate_identifier(&tables.dt_subs_date_column)?;
    validate_identifier(&schemas.datamart)?;
    validate_identifier(&schemas.ods)?;

    let dtl = &tables.stg_table_dt_subs_dtl;
    let stg_dt_subs = &tables.stg_table_dt_subs;
    let date_col = &tables.dt_subs_date_column;
    let datamart = &schemas.datamart;
    let ods = &schemas.ods;

    Ok(format!(
        "INSERT INTO {dtl} ( \
           {date_col}, sbscrptn_key_id, cnsmd_srvc_cd, sbscrptn_id, short_sbscrptn_id, \
           sbscrbr_id, audio_srvc_id, strmng_srvc_id, srvc_subtype_cd, srvc_type_cd, \
           trial_start_est_dt, trial_end_est_dt, trial_actvtn_est_dt, trial_durn_cd, \
           sbscrptn_start_dt, sbscrptn_end_dt, strmng_promo_key_id, strmng_promo_cd, \
           strmng_rgstrtn_zip_cd, cnsumd_veh_device_id, sbscrptn_device_id, create_ts, \
           sbscrptn_subtype_prdct_catg_cd) \
         SELECT \
           a.{date_col}, \
           a.sbscrptn_key_id, \
           a.cnsmd_srvc_cd, \
           b.sbscrptn_id, \
           b.short_sbscrptn_id, \
           b.sbscrbr_id, \
           b.audio_srvc_id, \
           b.strmng_srvc_id, \
           CASE WHEN a.cnsmd_srvc_cd = 'Audio' THEN b.curr_audio_srvc_subtype_cd \
                ELSE b.curr_strmng_srvc_subtype_cd END AS srvc_subtype_cd, \
           coalesce(CASE WHEN a.cnsmd_srvc_cd = 'Audio' THEN audsrvc.srvc_type_cd \
                         ELSE strsrvc.srvc_type_cd END, 'N/D') AS srvc_type_cd, \
           CASE WHEN audsrvc.srvc_type_cd = 'T' \
                  THEN coalesce(b.audio_trial_start_dt, '2999-12-31') \
                WHEN (strsrvc.srvc_type_cd = 'T' OR b.sbscrptn_subtype_prdct_catg_cd = 'AFL') \
                  THEN coalesce(b.strmng_trial_start_dt, '2999-12-31') \
                ELSE '1970-01-01' END AS trial_start_est_dt, \
           CASE WHEN audsrvc.srvc_type_cd = 'T' \
                  THEN coalesce(b.audio_trial_end_dt, '2999-12-31') \
                WHEN (strsrvc.srvc_type_cd = 'T' OR b.sbscrptn_subtype_prdct_catg_cd = 'AFL') \
                  THEN coalesce(b.strmng_trial_end_dt, '2999-12-31') \
                ELSE '1970-01-01' END AS trial_end_est_dt, \
           CASE WHEN a.cnsmd_srvc_cd = 'Audio' THEN '2999-12-31' \
                ELSE coalesce(trunc(b.strmng_actvtn_ts), '2999-12-31') END AS trial_actvtn_est_dt, \
           b.strmng_promo_durn_day_month_cd AS trial_durn_cd, \
           CASE WHEN audsrvc.srvc_type_cd = 'S' \
                  THEN coalesce(b.audio_self_pay_start_dt, '2999-12-31') \
                WHEN strsrvc.srvc_type_cd = 'S' \
                  THEN coalesce(b.strmng_self_pay_start_dt, '2999-12-31') \
                ELSE '1970-01-01' END AS sbscrptn_start_dt, \
           CASE WHEN audsrvc.srvc_type_cd = 'S' \
                  THEN coalesce(b.audio_self_pay_end_dt, '2999-12-31') \
                WHEN strsrvc.srvc_type_cd = 'S' \
                  THEN coalesce(b.strmng_self_pay_end_dt, '2999-12-31') \
                ELSE '1970-01-01' END AS sbscrptn_end_dt, \
           c.strmng_promo_key_id, \
           b.strmng_promo_cd, \
           b.strmng_rgstrtn_zip_cd, \
           upper(a.cnsumd_veh_device_id) AS cnsumd_veh_device_id, \
           upper(b.device_id) AS sbscrptn_device_id, \
           sysdate AS create_ts, \
           a.sbscrptn_subtype_prdct_catg_cd \
         FROM {stg_dt_subs} a \
         LEFT OUTER JOIN {datamart}.dim_subscription b \
           ON b.sbscrptn_key_id = a.sbscrptn_key_id \
         LEFT OUTER JOIN {datamart}.dim_streaming_promo c \
           ON c.strmng_promo_cd = b.strmng_promo_cd \
          AND a.{date_col} BETWEEN c.rec_eff_ts AND c.rec_exp_ts \
         LEFT OUTER JOIN {ods}.v_service_subtype audsrvc \
           ON (CASE WHEN a.cnsmd_srvc_cd = 'Audio' THEN b.curr_audio_srvc_subtype_cd \
                    ELSE 'N/A' END) = audsrvc.srvc_subtype_cd \
         LEFT OUTER JOIN {ods}.v_service_subtype strsrvc \
           ON (CASE WHEN a.cnsmd_srvc_cd = 'SIR' THEN b.curr_strmng_srvc_subtype_cd \
                    ELSE 'N/A' END) = strsrvc.srvc_subtype_cd"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use chrono::NaiveDateTime;

    fn test_context() -> RunContext {
        RunContext::new(
            jobs::CONSUMPTION_SUBSCRIPTION_DETAIL,
            &AppConfig::default(),
            "test",
        )
    }

    fn window(start: &str, end: &str) -> DateWindow {
        DateWindow {
            is_idl: true,
            start_exec_ts: NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M:%S").unwrap(),
            end_exec_ts: NaiveDateTime::parse_from_str(end, "%Y-%m-%d %H:%M:%S").unwrap(),
            from_dt: None,
            to_dt: None,
        }
    }

    #[test]
    fn test_idl_window_truncates_to_dates() {
        let (from_dt, to_dt) = idl_date_window(&window(
            "2024-02-01 04:30:15",
            "2024-03-04 23:59:59",
        ));
        assert_eq!(from_dt.to_string(), "2024-02-01");
        assert_eq!(to_dt.to_string(), "2024-03-04");
    }

    #[test]
    fn test_idl_window_is_idempotent() {
        let w = window("2024-02-01 04:30:15", "2024-03-04 23:59:59");
        assert_eq!(idl_date_window(&w), idl_date_window(&w));
    }

    #[test]
    fn test_cutoff_window_sql_shape() {
        let sql = cutoff_window_sql("edw_ods").unwrap();
        assert!(sql.contains("process_nm = $1"));
        assert!(sql.contains("FROM edw_ods.process_control"));
        assert!(sql.contains("JOIN edw_ods.consumption_cutoff"));
        assert!(sql.contains("dateadd(day, 1, cnsmptn_cutoff_dt)"));
        assert!(sql.contains("first_day_of_prev_month ELSE first_day_of_curr_month"));
        assert!(sql.contains("prev_month_year = coff.brdcst_year_nbr"));
    }

    #[test]
    fn test_consumption_insert_dedup_and_window() {
        let ctx = test_context();
        let sql = consumption_insert_sql(&ctx.tables, &ctx.schemas).unwrap();

        assert!(sql.starts_with("INSERT INTO edw_datamart_stg.stg_st_consumption_dt_subs"));
        assert!(sql.contains("FROM edw_datamart_stg.stg_si_consumption a"));
        assert!(sql.contains("JOIN edw_ods.consumption_subscription b"));
        assert!(sql.contains("a.cnsmptn_id = b.cnsmptn_id"));
        assert!(sql.contains("a.brdcst_start_est_dt >= $1 - $2"));
        assert!(sql.contains("a.brdcst_start_est_dt < $3 + $2"));
        assert!(sql.contains(
            "PARTITION BY tmp.brdcst_start_est_dt, tmp.sbscrptn_key_id, tmp.cnsmd_srvc_cd"
        ));
        assert!(sql.contains("ORDER BY tmp.rec_cnt DESC"));
        assert!(sql.ends_with("WHERE rnk = 1"));
    }

    #[test]
    fn test_trip_temp_table_sql_shape() {
        let ctx = test_context();
        let sql = trip_temp_table_sql(&ctx.tables, &ctx.schemas).unwrap();

        assert!(sql.starts_with("CREATE TEMP TABLE tmp_st_device_trip_dt_subs"));
        assert!(sql.contains("'Audio' AS cnsmd_srvc_cd"));
        assert!(sql.contains("a.device_id::varchar(20)"));
        assert!(sql.contains("a.trip_start_est_ts::date >= $1 - $2"));
        assert!(sql.contains("GROUP BY 1, 2, 3, 4, 5, 6"));
    }

    #[test]
    fn test_trip_insert_expands_days_and_ranks() {
        let ctx = test_context();
        let sql = trip_insert_sql(&ctx.tables, &ctx.schemas).unwrap();

        assert!(sql.contains("FROM tmp_st_device_trip_dt_subs a"));
        assert!(sql.contains("JOIN edw_datamart.dim_date dd"));
        assert!(sql.contains("BETWEEN a.trip_start_est_dt AND a.trip_end_est_dt"));
        assert!(sql.contains("PARTITION BY tmp.trip_start_est_dt"));
        assert!(sql.ends_with("WHERE rnk = 1"));
    }

    #[test]
    fn test_detail_insert_derivations() {
        let ctx = test_context();
        let sql = detail_insert_sql(&ctx.tables, &ctx.schemas).unwrap();

        assert!(sql.starts_with("INSERT INTO edw_datamart_stg.stg_st_consumption_dt_subs_dtl"));
        assert!(sql.contains("LEFT OUTER JOIN edw_datamart.dim_subscription b"));
        assert!(sql.contains("LEFT OUTER JOIN edw_datamart.dim_streaming_promo c"));
        assert!(sql.contains("BETWEEN c.rec_eff_ts AND c.rec_exp_ts"));
        assert!(sql.contains("edw_ods.v_service_subtype audsrvc"));
        assert!(sql.contains("edw_ods.v_service_subtype strsrvc"));
        assert!(sql.contains("'N/D'"));
        assert!(sql.contains("'2999-12-31'"));
        assert!(sql.contains("'1970-01-01'"));
        assert!(sql.contains("b.sbscrptn_subtype_prdct_catg_cd = 'AFL'"));
        assert!(sql.contains("upper(a.cnsumd_veh_device_id)"));
        assert!(sql.contains("sysdate AS create_ts"));
        assert!(sql.contains("a.cnsmd_srvc_cd = 'SIR'"));
    }

    #[test]
    fn test_builders_reject_invalid_names() {
        let mut ctx = test_context();
        ctx.tables.stg_src_table = "stg; drop table x".to_string();
        assert!(consumption_insert_sql(&ctx.tables, &ctx.schemas).is_err());
        assert!(trip_temp_table_sql(&ctx.tables, &ctx.schemas).is_err());

        let mut ctx = test_context();
        ctx.tables.dt_subs_date_column = "dt or 1=1".to_string();
        assert!(consumption_insert_sql(&ctx.tables, &ctx.schemas).is_err());
        assert!(detail_insert_sql(&ctx.tables, &ctx.schemas).is_err());

        assert!(truncate_sql("a.b.c.d").is_err());
        assert!(truncate_sql("edw_datamart_stg.stg_st_consumption_dt_subs").is_ok());
    }
}
