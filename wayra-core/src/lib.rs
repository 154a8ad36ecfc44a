//! Wayra Core - provisioning logic for a Wayra server install
//!
//! Follows the same hexagonal layout as the rest of the Wayra tooling:
//!
//! - **domain**: Plain data (UserConfig, BackupFile, tool commands, errors)
//! - **ports**: Traits for external systems (user service, database admin, subprocesses)
//! - **services**: Setup stages and the pipeline that drives them
//! - **adapters**: Concrete implementations (reqwest, sqlx, std::process)

pub mod adapters;
pub mod domain;
mod log_migrations;
pub mod ports;
pub mod services;
pub mod settings;

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{
    BackupFile, DatabaseTarget, SetupStage, ToolCommand, ToolEnv, ToolOutput, UserConfig,
};
pub use services::logging::{RunEvent, RunLogEntry, RunLogService};
pub use services::account::UserAction;
pub use services::setup::{SetupFailure, SetupOutcome, SetupPipeline, SetupRequest};
pub use settings::Settings;
