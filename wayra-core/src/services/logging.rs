//! Run log service - structured setup events in DuckDB
//!
//! Every setup run leaves a trail in `runs.duckdb`: stage transitions,
//! outcomes and failures. Credentials, keys and backup contents are never
//! written here.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::Utc;
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::domain::SetupStage;
use crate::log_migrations::LOG_MIGRATIONS;

pub const RUN_LOG_FILE: &str = "runs.duckdb";

/// Counter for unique IDs within one millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Timestamp in the lower 48 bits, counter in the upper 16
fn generate_id() -> u64 {
    let timestamp = now_ms() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    (timestamp << 16) | counter
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// An event to record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl RunEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            stage: None,
            detail: None,
            error_message: None,
            error_details: None,
        }
    }

    pub fn with_stage(mut self, stage: SetupStage) -> Self {
        self.stage = Some(stage.as_str().to_string());
        self
    }

    /// Free-form context, e.g. a backup file name or a command line with secrets masked
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A stored run log row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub stage: Option<String>,
    pub detail: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

const SELECT_COLUMNS: &str = "SELECT id, timestamp, app_version, platform, event, stage, detail, error_message, error_details FROM sys_run_log";

fn map_entry(row: &duckdb::Row<'_>) -> duckdb::Result<RunLogEntry> {
    Ok(RunLogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        app_version: row.get(2)?,
        platform: row.get(3)?,
        event: row.get(4)?,
        stage: row.get(5)?,
        detail: row.get(6)?,
        error_message: row.get(7)?,
        error_details: row.get(8)?,
    })
}

/// Owns `runs.duckdb` in the state directory
pub struct RunLogService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    app_version: String,
    platform: &'static str,
}

impl RunLogService {
    /// Open or create the run log in `state_dir` and apply pending migrations
    pub fn new(state_dir: &Path, app_version: impl Into<String>) -> Result<Self> {
        let db_path = state_dir.join(RUN_LOG_FILE);
        let conn = Connection::open(&db_path)?;

        let service = Self {
            conn: Mutex::new(conn),
            db_path,
            app_version: app_version.into(),
            platform: detect_platform(),
        };
        service.run_migrations()?;
        Ok(service)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;

        let table_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM information_schema.tables WHERE table_name = 'sys_migrations'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !table_exists {
            if let Some((name, sql)) = LOG_MIGRATIONS.iter().find(|(n, _)| *n == "000_migrations.sql") {
                conn.execute_batch(sql)?;
                conn.execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])?;
            }
        }

        let mut stmt = conn.prepare("SELECT migration_name FROM sys_migrations")?;
        let applied: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        for (name, sql) in LOG_MIGRATIONS.iter() {
            if applied.iter().any(|a| a == name) {
                continue;
            }
            conn.execute_batch(sql)?;
            conn.execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])?;
        }

        Ok(())
    }

    pub fn log(&self, event: RunEvent) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO sys_run_log (
                id, timestamp, app_version, platform,
                event, stage, detail, error_message, error_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            duckdb::params![
                generate_id(),
                now_ms(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.stage,
                &event.detail,
                &event.error_message,
                &event.error_details,
            ],
        )?;
        Ok(())
    }

    pub fn log_event(&self, event: &str) -> Result<()> {
        self.log(RunEvent::new(event))
    }

    /// Record entry into a pipeline stage
    pub fn log_stage(&self, stage: SetupStage) -> Result<()> {
        self.log(RunEvent::new("stage_started").with_stage(stage))
    }

    /// Record the error that stopped a run in `stage`
    pub fn log_failure(&self, stage: SetupStage, error: &Error) -> Result<()> {
        self.log(
            RunEvent::new("setup_failed")
                .with_stage(stage)
                .with_error(error.to_string())
                .with_error_details(format!("exit code {}", error.exit_code())),
        )
    }

    /// Most recent entries first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<RunLogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY timestamp DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        ))?;
        let entries = stmt
            .query_map([limit as i64], map_entry)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    pub fn get_errors(&self, limit: usize) -> Result<Vec<RunLogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE error_message IS NOT NULL ORDER BY timestamp DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        ))?;
        let entries = stmt
            .query_map([limit as i64], map_entry)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM sys_run_log", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete entries older than `timestamp_ms` (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM sys_run_log WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_creates_database() {
        let dir = tempdir().unwrap();
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
        assert!(service.db_path().exists());
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let dir = tempdir().unwrap();
        {
            let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
            service.log_event("setup_started").unwrap();
        }
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
        assert_eq!(service.count().unwrap(), 1);
    }

    #[test]
    fn test_log_stage() {
        let dir = tempdir().unwrap();
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
        service.log_stage(SetupStage::Decrypt).unwrap();

        let entries = service.get_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "stage_started");
        assert_eq!(entries[0].stage.as_deref(), Some("decrypt"));
        assert_eq!(entries[0].app_version, "0.1.0");
        assert!(entries[0].error_message.is_none());
    }

    #[test]
    fn test_log_failure() {
        let dir = tempdir().unwrap();
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
        service.log_event("setup_started").unwrap();
        let error = Error::Subprocess {
            tool: "pg_restore".to_string(),
            exit_code: Some(1),
            stderr: "bad archive".to_string(),
        };
        service.log_failure(SetupStage::TruncateAndRestore, &error).unwrap();

        let errors = service.get_errors(10).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].event, "setup_failed");
        assert_eq!(errors[0].stage.as_deref(), Some("truncate_and_restore"));
        assert_eq!(errors[0].error_message.as_deref(), Some(error.to_string().as_str()));
        assert_eq!(errors[0].error_details.as_deref(), Some("exit code 7"));
    }

    #[test]
    fn test_recent_is_newest_first() {
        let dir = tempdir().unwrap();
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
        service.log_event("first").unwrap();
        service.log_event("second").unwrap();
        service.log_event("third").unwrap();

        let events: Vec<String> = service
            .get_recent(2)
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(events, vec!["third", "second"]);
    }

    #[test]
    fn test_count_and_delete() {
        let dir = tempdir().unwrap();
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
        service.log_event("one").unwrap();
        service.log_event("two").unwrap();

        assert_eq!(service.count().unwrap(), 2);
        assert_eq!(service.delete_before(now_ms() + 1000).unwrap(), 2);
        assert_eq!(service.count().unwrap(), 0);
    }
}
