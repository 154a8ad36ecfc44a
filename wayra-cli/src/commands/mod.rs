//! CLI command implementations

pub mod backup;
pub mod deps;
pub mod logs;
pub mod restore;
pub mod setup;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::output;
use wayra_core::adapters::{HttpUserDirectory, PostgresAdmin, SystemCommandRunner};
use wayra_core::settings::state_dir;
use wayra_core::{RunEvent, RunLogService, Settings, SetupFailure, SetupOutcome, SetupPipeline};

/// Overrides applied on top of settings.json and `WAYRA_*` variables
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// User service base URL
    #[arg(long, global = true)]
    pub service_url: Option<String>,
    /// Where config.yaml is written
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,
    /// Directory holding encrypted backups
    #[arg(long, global = true)]
    pub migrations_dir: Option<PathBuf>,
    /// PostgreSQL host
    #[arg(long, global = true)]
    pub db_host: Option<String>,
    /// PostgreSQL port
    #[arg(long, global = true)]
    pub db_port: Option<u16>,
}

impl SettingsArgs {
    /// Settings file, then environment, then these flags
    pub fn load(&self) -> Result<Settings> {
        let mut settings = Settings::load(&state_dir()).context("Failed to load settings")?;
        if let Some(url) = &self.service_url {
            settings.service_url = url.clone();
        }
        if let Some(path) = &self.config_path {
            settings.config_path = path.clone();
        }
        if let Some(dir) = &self.migrations_dir {
            settings.migrations_dir = dir.clone();
        }
        if let Some(host) = &self.db_host {
            settings.db_host = host.clone();
        }
        if let Some(port) = self.db_port {
            settings.db_port = port;
        }
        Ok(settings)
    }
}

/// Run log for CLI operations
///
/// Returns None if it cannot be opened; logging never blocks a command.
pub fn get_run_log() -> Option<Arc<RunLogService>> {
    let dir = state_dir();
    std::fs::create_dir_all(&dir).ok()?;
    RunLogService::new(&dir, env!("CARGO_PKG_VERSION"))
        .ok()
        .map(Arc::new)
}

/// Log an event, ignoring any errors
pub fn log_event(run_log: &Option<Arc<RunLogService>>, event: RunEvent) {
    if let Some(l) = run_log {
        let _ = l.log(event);
    }
}

/// Pipeline wired to PostgreSQL and real subprocesses
///
/// The user service is attached separately by commands that contact it.
pub fn build_pipeline(settings: Settings, run_log: &Option<Arc<RunLogService>>) -> SetupPipeline {
    let admin = PostgresAdmin::new(settings.timeouts.connect());

    let mut pipeline = SetupPipeline::new(
        settings,
        Arc::new(SystemCommandRunner::new()),
        Arc::new(admin),
    );
    if let Some(run_log) = run_log {
        pipeline = pipeline.with_run_log(run_log.clone());
    }
    pipeline
}

/// HTTP client for the user service named in settings
pub fn user_directory(settings: &Settings) -> Result<Arc<HttpUserDirectory>> {
    let directory = HttpUserDirectory::with_timeout(&settings.service_url, settings.timeouts.http())?;
    Ok(Arc::new(directory))
}

/// Print the result of a pipeline run; failures are returned for exit-code mapping
pub fn report_outcome(
    result: std::result::Result<SetupOutcome, SetupFailure>,
    json: bool,
) -> Result<()> {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(failure) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "failed",
                        "stage": failure.stage,
                        "error": failure.error.to_string(),
                        "exit_code": failure.exit_code(),
                    })
                );
            } else {
                output::error(&format!("{} failed", output::stage_label(failure.stage)));
            }
            return Err(failure.into());
        }
    };

    if json {
        let value = match &outcome {
            SetupOutcome::Completed { config, backup, database_created, warnings } => serde_json::json!({
                "status": "completed",
                "database": config.dbname,
                "database_created": database_created,
                "backup": backup,
                "warnings": warnings,
            }),
            SetupOutcome::NoBackup { config, database_created, warnings } => serde_json::json!({
                "status": "no_backup",
                "database": config.dbname,
                "database_created": database_created,
                "warnings": warnings,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for warning in outcome.warnings() {
        output::warning(&format!("Warning: {}", warning));
    }

    match outcome {
        SetupOutcome::Completed { config, backup, database_created, .. } => {
            if database_created {
                println!("  Created database {}", config.dbname.bold());
            }
            println!("  Restored {} ({})", backup.name(), backup.size_display());
            output::success("Migration completed successfully.");
        }
        SetupOutcome::NoBackup { config, database_created, .. } => {
            if database_created {
                println!("  Created database {}", config.dbname.bold());
            }
            output::info("No backup files found in the migrations directory; nothing to restore.");
        }
    }
    Ok(())
}
