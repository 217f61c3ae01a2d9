//! Pipe-delimited execution log consumed by the scheduling environment.
//!
//! Two append-only files per job under `<etl_home>/log/`: a status file
//! with one line per lifecycle transition and an event file with free-form
//! messages. Writing these is best-effort; a job never fails because its
//! status line could not be appended.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use crate::constants::system;
use crate::context::RunContext;

/// Appender for the per-job status and event files
#[derive(Debug, Clone)]
pub struct ExecLog {
    job_name: String,
    father_pid: String,
    pid: String,
    status_path: PathBuf,
    event_path: PathBuf,
}

impl ExecLog {
    /// Build an appender from the run's paths and process identifiers
    ///
    /// File names come from the context templates with `jobname` replaced
    /// by the actual job name.
    pub fn for_context(ctx: &RunContext) -> ExecLog {
        let log_dir = Path::new(&ctx.paths.etl_home).join("log");
        let status_file = ctx.paths.status_file_nm.replace("jobname", &ctx.job_name);
        let event_file = ctx.paths.log_file_nm.replace("jobname", &ctx.job_name);

        ExecLog {
            job_name: ctx.job_name.clone(),
            father_pid: ctx.exec.father_pid.clone(),
            pid: ctx.exec.pid.clone(),
            status_path: log_dir.join(status_file),
            event_path: log_dir.join(event_file),
        }
    }

    /// Append one status line: ts|job|duration|status|records|father_pid|pid
    pub fn record_status(&self, status: &str, duration_secs: i64, records: i64) {
        let line = format!(
            "{}|{}|{}|{}|{}|{}|{}",
            Local::now().format(system::EXEC_TIMESTAMP_FORMAT),
            self.job_name,
            duration_secs,
            status,
            records,
            self.father_pid,
            self.pid,
        );
        self.append(&self.status_path, &line);
    }

    /// Append one event line: ts|job|level|message|father_pid|pid
    pub fn record_event(&self, level: &str, message: &str) {
        let line = format!(
            "{}|{}|{}|{}|{}|{}",
            Local::now().format(system::EXEC_TIMESTAMP_FORMAT),
            self.job_name,
            level,
            message,
            self.father_pid,
            self.pid,
        );
        self.append(&self.event_path, &line);
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    pub fn event_path(&self) -> &Path {
        &self.event_path
    }

    fn append(&self, path: &Path, line: &str) {
        match append_line(path, line) {
            Ok(()) => debug!(path = %path.display(), "Appended exec-log line"),
            Err(err) => warn!(
                path = %path.display(),
                error = %err,
                "Failed to append exec-log line"
            ),
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn exec_log_in(dir: &Path) -> ExecLog {
        let mut ctx = RunContext::new("Job_T", &AppConfig::default(), "test");
        ctx.paths.etl_home = dir.to_string_lossy().to_string();
        ctx.exec.father_pid = "41".to_string();
        ctx.exec.pid = "42".to_string();
        ExecLog::for_context(&ctx)
    }

    #[test]
    fn test_paths_substitute_job_name() {
        let dir = tempfile::tempdir().unwrap();
        let exec_log = exec_log_in(dir.path());
        assert!(exec_log
            .status_path()
            .ends_with(Path::new("log/Job_T_status.txt")));
        assert!(exec_log.event_path().ends_with(Path::new("log/Job_T_log.txt")));
    }

    #[test]
    fn test_status_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let exec_log = exec_log_in(dir.path());

        exec_log.record_status("In Progress", 0, 0);
        exec_log.record_status("Complete", 12, 250);

        let content = std::fs::read_to_string(exec_log.status_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parts: Vec<&str> = lines[1].split('|').collect();
        assert_eq!(parts.len(), 7);
        assert_eq!(parts[1], "Job_T");
        assert_eq!(parts[2], "12");
        assert_eq!(parts[3], "Complete");
        assert_eq!(parts[4], "250");
        assert_eq!(parts[5], "41");
        assert_eq!(parts[6], "42");
    }

    #[test]
    fn test_event_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let exec_log = exec_log_in(dir.path());

        exec_log.record_event("INFO", "Job Job_T started");

        let content = std::fs::read_to_string(exec_log.event_path()).unwrap();
        let parts: Vec<&str> = content.trim_end().split('|').collect();
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[2], "INFO");
        assert_eq!(parts[3], "Job Job_T started");
    }

    #[test]
    fn test_append_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("log");
        std::fs::write(&blocker, "not a directory").unwrap();

        let exec_log = exec_log_in(dir.path());
        exec_log.record_status("In Progress", 0, 0);
        exec_log.record_event("ERROR", "should not panic");
    }
}
