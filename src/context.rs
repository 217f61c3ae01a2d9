//! # Run Context
//!
//! Mutable state for one job execution, threaded explicitly through the
//! job phases instead of living in process-global scope. Defaults come
//! from configuration; a properties or JSON overlay (local file or S3
//! object) may replace individual values before the run starts, keyed by
//! the property names the scheduling environment has always used.

use std::path::PathBuf;

use chrono::{Local, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aws::s3::{ObjectStore, S3Location};
use crate::config::AppConfig;
use crate::constants::{system, FlowPath};
use crate::error::{BatchError, BatchResult};

/// Audit identifiers and table names for the current run
#[derive(Debug, Clone)]
pub struct BatchState {
    pub batch_id: Option<i64>,
    pub batch_detail_id: Option<i64>,
    pub subject_area_id: i32,
    pub src_table_nm: String,
    pub tgt_table_nm: String,
}

/// Row counts reported on Detail-Close
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCounts {
    pub src_rec_qty: i64,
    pub ins_rec_qty: i64,
    pub upd_rec_qty: i64,
    pub err_rec_qty: i64,
}

/// File metadata reported on Detail-Close
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub file_nm: String,
    pub file_rcvd_ts: Option<NaiveDateTime>,
    pub file_size_in_bytes_qty: i64,
}

/// Execution bounds and the resolved load window
#[derive(Debug, Clone)]
pub struct DateWindow {
    pub is_idl: bool,
    pub start_exec_ts: NaiveDateTime,
    pub end_exec_ts: NaiveDateTime,
    pub from_dt: Option<NaiveDate>,
    pub to_dt: Option<NaiveDate>,
}

/// Relation and column names the consumption job interpolates
///
/// Every value passes identifier validation before reaching SQL text.
#[derive(Debug, Clone)]
pub struct TableNames {
    pub stg_src_table: String,
    pub stg_table_dt_subs: String,
    pub stg_table_dt_subs_dtl: String,
    pub ods_table_subscription_link: String,
    pub dt_subs_date_column: String,
    pub event_date_column: String,
    pub link_id: String,
}

/// Warehouse schema names
#[derive(Debug, Clone)]
pub struct SchemaNames {
    pub ods: String,
    pub datamart_stg: String,
    pub datamart: String,
}

/// Path selection and window controls
#[derive(Debug, Clone)]
pub struct ProcessControl {
    pub flow_path: FlowPath,
    pub cutoff_process_nm: String,
    pub lookup_buffer_days: i32,
}

/// Local filesystem locations for the exec-log and default overlay
///
/// The exec-log file names are templates; `jobname` is replaced with the
/// running job's name when the path is built.
#[derive(Debug, Clone)]
pub struct LocalPaths {
    pub etl_home: String,
    pub context_path: String,
    pub context_file_nm: String,
    pub status_file_nm: String,
    pub log_file_nm: String,
}

/// Process identifiers carried into the exec-log lines
#[derive(Debug, Clone)]
pub struct ExecIds {
    pub father_pid: String,
    pub pid: String,
}

/// All mutable state of one job execution
#[derive(Debug, Clone)]
pub struct RunContext {
    pub job_name: String,
    pub run_id: String,
    pub environment: String,
    pub batch: BatchState,
    pub counts: RowCounts,
    pub file: FileMetadata,
    pub window: DateWindow,
    pub tables: TableNames,
    pub schemas: SchemaNames,
    pub control: ProcessControl,
    pub paths: LocalPaths,
    pub exec: ExecIds,
}

impl RunContext {
    /// Seed a context from configuration defaults
    pub fn new(job_name: &str, config: &AppConfig, environment: &str) -> RunContext {
        let now = Local::now().naive_local();
        let datamart_stg = &config.schemas.datamart_stg;

        RunContext {
            job_name: job_name.to_string(),
            run_id: Uuid::new_v4().to_string(),
            environment: environment.to_string(),
            batch: BatchState {
                batch_id: None,
                batch_detail_id: None,
                subject_area_id: config.batch.subject_area_id,
                src_table_nm: String::new(),
                tgt_table_nm: String::new(),
            },
            counts: RowCounts::default(),
            file: FileMetadata {
                file_nm: system::FILE_NM_NOT_APPLICABLE.to_string(),
                file_rcvd_ts: None,
                file_size_in_bytes_qty: 0,
            },
            window: DateWindow {
                is_idl: false,
                start_exec_ts: now,
                end_exec_ts: now,
                from_dt: None,
                to_dt: None,
            },
            tables: TableNames {
                stg_src_table: format!("{datamart_stg}.stg_si_consumption"),
                stg_table_dt_subs: format!("{datamart_stg}.stg_st_consumption_dt_subs"),
                stg_table_dt_subs_dtl: format!("{datamart_stg}.stg_st_consumption_dt_subs_dtl"),
                ods_table_subscription_link: "consumption_subscription".to_string(),
                dt_subs_date_column: "brdcst_start_est_dt".to_string(),
                event_date_column: "brdcst_start_est_dt".to_string(),
                link_id: "cnsmptn_id".to_string(),
            },
            schemas: SchemaNames {
                ods: config.schemas.ods.clone(),
                datamart_stg: config.schemas.datamart_stg.clone(),
                datamart: config.schemas.datamart.clone(),
            },
            control: ProcessControl {
                flow_path: FlowPath::default(),
                cutoff_process_nm: config.batch.cutoff_process_nm.clone(),
                lookup_buffer_days: config.batch.lookup_buffer_days,
            },
            paths: LocalPaths {
                etl_home: config.paths.etl_home.clone(),
                context_path: config.paths.local_context_path.clone(),
                context_file_nm: "context.properties".to_string(),
                status_file_nm: "jobname_status.txt".to_string(),
                log_file_nm: "jobname_log.txt".to_string(),
            },
            exec: ExecIds {
                father_pid: "0".to_string(),
                pid: std::process::id().to_string(),
            },
        }
    }

    /// Default overlay location: `<context_path>/<context_file_nm>`
    pub fn default_overlay_path(&self) -> PathBuf {
        PathBuf::from(&self.paths.context_path).join(&self.paths.context_file_nm)
    }

    /// Record the source object that fed this run
    pub fn set_file_metadata(
        &mut self,
        file_nm: &str,
        size_bytes: Option<i64>,
        received_ts: Option<NaiveDateTime>,
    ) {
        self.file.file_nm = file_nm.to_string();
        if let Some(size) = size_bytes {
            self.file.file_size_in_bytes_qty = size;
        }
        self.file.file_rcvd_ts = received_ts;
    }

    /// Record source and inserted counts; errored rows are the difference
    pub fn record_counts(&mut self, source: i64, inserted: i64) {
        self.counts.src_rec_qty = source;
        self.counts.ins_rec_qty = inserted;
        self.counts.err_rec_qty = source - inserted;
    }

    /// The resolved load window, required before a path runs
    pub fn resolved_window(&self) -> BatchResult<(NaiveDate, NaiveDate)> {
        match (self.window.from_dt, self.window.to_dt) {
            (Some(from), Some(to)) => Ok((from, to)),
            _ => Err(BatchError::date_range(
                "load window has not been resolved for this run",
            )),
        }
    }

    /// Apply overlay entries, skipping unknown keys with a warning
    pub fn apply_entries<I, K, V>(&mut self, entries: I) -> BatchResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut applied = 0;
        for (key, value) in entries {
            if self.apply_entry(key.as_ref(), value.as_ref())? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Apply one overlay entry; returns false for unknown keys
    ///
    /// Values that fail their typed parse are errors: silently holding a
    /// default after a bad overlay is how wrong windows reach the
    /// warehouse.
    pub fn apply_entry(&mut self, key: &str, value: &str) -> BatchResult<bool> {
        match key {
            "batch_env" => self.environment = value.to_string(),
            "parameter_workflow_name" => self.job_name = value.to_string(),
            "batch_subject_area_id" => {
                self.batch.subject_area_id = parse_typed(key, value)?;
            }
            "batch_src_tbl_name" => self.batch.src_table_nm = value.to_string(),
            "batch_tgt_tbl_name" => self.batch.tgt_table_nm = value.to_string(),
            "batch_id" => self.batch.batch_id = Some(parse_typed(key, value)?),
            "batch_detail_id" => self.batch.batch_detail_id = Some(parse_typed(key, value)?),
            "batch_audit_detail_SRC_REC_QTY" => {
                self.counts.src_rec_qty = parse_typed(key, value)?;
            }
            "batch_audit_detail_INS_REC_QTY" => {
                self.counts.ins_rec_qty = parse_typed(key, value)?;
            }
            "batch_audit_detail_UPD_REC_QTY" => {
                self.counts.upd_rec_qty = parse_typed(key, value)?;
            }
            "batch_audit_detail_ERR_REC_QTY" => {
                self.counts.err_rec_qty = parse_typed(key, value)?;
            }
            "batch_audit_detail_FILE_NM" => self.file.file_nm = value.to_string(),
            "batch_audit_detail_FILE_SIZE_IN_BYTES_QTY" => {
                self.file.file_size_in_bytes_qty = parse_typed(key, value)?;
            }
            "batch_audit_detail_FILE_RCVD_TS" => {
                self.file.file_rcvd_ts = Some(parse_timestamp(key, value)?);
            }
            "pc_is_idl_ind" => self.window.is_idl = value == "Y",
            "pc_start_exec_ts" => self.window.start_exec_ts = parse_timestamp(key, value)?,
            "pc_end_exec_ts" => self.window.end_exec_ts = parse_timestamp(key, value)?,
            "from_dt" => self.window.from_dt = Some(parse_date(key, value)?),
            "to_dt" => self.window.to_dt = Some(parse_date(key, value)?),
            "flow_path" => self.control.flow_path = FlowPath::from_value(value),
            "cutoff_process_nm" => self.control.cutoff_process_nm = value.to_string(),
            "lookup_buffer_days" => {
                self.control.lookup_buffer_days = parse_typed(key, value)?;
            }
            "stg_src_table" => self.tables.stg_src_table = value.to_string(),
            "stg_table_dt_subs" => self.tables.stg_table_dt_subs = value.to_string(),
            "stg_table_dt_subs_dtl" => self.tables.stg_table_dt_subs_dtl = value.to_string(),
            "ods_table_subscription_link" => {
                self.tables.ods_table_subscription_link = value.to_string();
            }
            "dt_subs_date_column" => self.tables.dt_subs_date_column = value.to_string(),
            "start_est_dt" => self.tables.event_date_column = value.to_string(),
            "link_id" => self.tables.link_id = value.to_string(),
            "db_edw_ods_schema" => self.schemas.ods = value.to_string(),
            "db_edw_datamart_schema" => self.schemas.datamart_stg = value.to_string(),
            "ic_etl_local_home_path_nm" => self.paths.etl_home = value.to_string(),
            "parameter_file_local_context_path" => {
                self.paths.context_path = value.to_string();
            }
            "parameter_file_context_file_nm" => {
                self.paths.context_file_nm = value.to_string();
            }
            "file_status_file_nm" => self.paths.status_file_nm = value.to_string(),
            "file_log_file_nm" => self.paths.log_file_nm = value.to_string(),
            "father_pid" => self.exec.father_pid = value.to_string(),
            "pid" => self.exec.pid = value.to_string(),
            unknown => {
                warn!(key = %unknown, "Skipping unknown context variable");
                return Ok(false);
            }
        }

        debug!(key = %key, "Context variable set");
        Ok(true)
    }
}

fn parse_typed<T: std::str::FromStr>(key: &str, value: &str) -> BatchResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| BatchError::context_overlay(key, err.to_string()))
}

fn parse_timestamp(key: &str, value: &str) -> BatchResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), system::EXEC_TIMESTAMP_FORMAT)
        .map_err(|err| BatchError::context_overlay(key, err.to_string()))
}

fn parse_date(key: &str, value: &str) -> BatchResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), system::DATE_FORMAT)
        .map_err(|err| BatchError::context_overlay(key, err.to_string()))
}

/// Overlay file formats the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayFormat {
    Properties,
    Json,
}

impl OverlayFormat {
    /// Decide the format from a file or object name
    pub fn from_location(location: &str) -> BatchResult<OverlayFormat> {
        if location.ends_with(".properties") {
            Ok(OverlayFormat::Properties)
        } else if location.ends_with(".json") {
            Ok(OverlayFormat::Json)
        } else {
            Err(BatchError::context_overlay(
                location,
                "unsupported context file format",
            ))
        }
    }
}

/// Parse Java-style properties content into key/value pairs
///
/// Blank lines and `#` comments are skipped; the first `=` splits key from
/// value; both sides are trimmed. Lines without `=` are ignored.
pub fn parse_properties(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            line.split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Parse a JSON object overlay into key/value pairs
///
/// Scalar values are stringified and go through the same typed
/// application path as properties entries.
pub fn parse_json_overlay(content: &str) -> BatchResult<Vec<(String, String)>> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|err| BatchError::context_overlay("json", err.to_string()))?;

    let serde_json::Value::Object(map) = value else {
        return Err(BatchError::context_overlay(
            "json",
            "context overlay must be a JSON object",
        ));
    };

    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        let rendered = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Null => continue,
            other => {
                return Err(BatchError::context_overlay(
                    key,
                    format!("unsupported overlay value: {other}"),
                ));
            }
        };
        entries.push((key, rendered));
    }

    Ok(entries)
}

/// Load an overlay into the context from a local path or s3:// location
///
/// An S3 overlay also records the object's name, size, and last-modified
/// time as the run's file metadata for the audit row.
pub async fn load_overlay(
    ctx: &mut RunContext,
    location: &str,
    object_store: &ObjectStore,
) -> BatchResult<usize> {
    let format = OverlayFormat::from_location(location)?;

    let content = if location.starts_with("s3://") {
        let parsed = S3Location::parse(location)?;
        let content = object_store.read_to_string(&parsed).await?;
        let metadata = object_store.object_metadata(&parsed).await?;
        ctx.set_file_metadata(
            parsed.file_name(),
            metadata.size_bytes,
            metadata.last_modified,
        );
        content
    } else {
        std::fs::read_to_string(location)
            .map_err(|err| BatchError::context_overlay(location, err.to_string()))?
    };

    let entries = match format {
        OverlayFormat::Properties => parse_properties(&content),
        OverlayFormat::Json => parse_json_overlay(&content)?,
    };

    let applied = ctx.apply_entries(entries)?;
    info!(
        location = %location,
        applied = applied,
        "Loaded context overlay"
    );
    Ok(applied)
}
