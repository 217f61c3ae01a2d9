//! # System Constants
//!
//! Core constants and enums that define the operational boundaries of the
//! batch framework: audit status codes, registered job names, flow paths,
//! and the fixed formats shared with the scheduling environment.
//!
//! The string values here are the data contract with the `batch_audit` /
//! `batch_audit_detail` tables and the scheduler; they must not drift.

use std::fmt;
use std::str::FromStr;

use crate::error::BatchError;

/// Registered job names as known to the scheduler and the audit tables
pub mod jobs {
    /// Standalone batch-detail start step
    pub const BATCH_DETAIL_START: &str = "Job_Frmwrk_EDW_BATCH_DETAIL_START";

    /// Standalone batch-detail close step
    pub const BATCH_DETAIL_CLOSE: &str = "Job_Frmwrk_EDW_BATCH_DETAIL_CLOSE";

    /// Consumption day/subscription staging-to-detail load
    pub const CONSUMPTION_SUBSCRIPTION_DETAIL: &str =
        "Job_EDW_ST_CNSMPTN_CMN_DIM_US_STG_TO_SUBS_DTL";
}

/// Audit lifecycle status of a batch or batch-detail row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStatus {
    InProgress,
    Complete,
    Error,
}

impl ProcessStatus {
    /// The literal stored in `process_status_cd`
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::InProgress => "In Progress",
            ProcessStatus::Complete => "Complete",
            ProcessStatus::Error => "Error",
        }
    }

    /// Check if this status ends the lifecycle of its row
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStatus::Complete | ProcessStatus::Error)
    }

    /// Check if this status indicates a failed run
    pub fn is_error(&self) -> bool {
        matches!(self, ProcessStatus::Error)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProcessStatus {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In Progress" => Ok(ProcessStatus::InProgress),
            "Complete" => Ok(ProcessStatus::Complete),
            "Error" => Ok(ProcessStatus::Error),
            other => Err(BatchError::audit_state(format!(
                "unknown process status: {other}"
            ))),
        }
    }
}

/// Transformation path of the consumption-detail job
///
/// The run context carries the path as a string; anything other than the
/// literal `TRIP` selects the consumption path, matching the behavior the
/// downstream schedules depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlowPath {
    Trip,
    #[default]
    Consumption,
}

impl FlowPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowPath::Trip => "TRIP",
            FlowPath::Consumption => "CONSUMPTION",
        }
    }

    /// Resolve a context value to a path; non-`TRIP` values select consumption
    pub fn from_value(value: &str) -> Self {
        if value == "TRIP" {
            FlowPath::Trip
        } else {
            FlowPath::Consumption
        }
    }
}

impl fmt::Display for FlowPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// System-wide constants
pub mod system {
    /// Subject area of the consumption jobs in `batch_audit`
    pub const DEFAULT_SUBJECT_AREA_ID: i32 = 1;

    /// Placeholder for audit rows with no source file
    pub const FILE_NM_NOT_APPLICABLE: &str = "N/A";

    /// Days added on both sides of the resolved date window
    pub const DEFAULT_LOOKUP_BUFFER_DAYS: i32 = 7;

    /// Timestamp format used by the scheduler for execution bounds
    pub const EXEC_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Date format used in resolved windows and SQL literals
    pub const DATE_FORMAT: &str = "%Y-%m-%d";

    /// Parameter-store key naming the deployment environment
    pub const ENVIRONMENT_PARAMETER: &str = "talend/migration/env";

    /// Environment variable overriding parameter-store environment detection
    pub const ENVIRONMENT_VAR: &str = "EDW_ENV";

    /// Version compatibility marker
    pub const EDW_BATCH_VERSION: &str = "0.1.0";
}

/// Status groupings for validation and logic
pub mod status_groups {
    use super::ProcessStatus;

    /// Statuses that end a batch-detail lifecycle
    pub const DETAIL_FINAL_STATES: &[ProcessStatus] =
        &[ProcessStatus::Complete, ProcessStatus::Error];

    /// Statuses under which a detail row may still be closed
    pub const DETAIL_OPEN_STATES: &[ProcessStatus] = &[ProcessStatus::InProgress];
}
