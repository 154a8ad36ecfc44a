//! Service layer - setup stages and their orchestration
//!
//! Each service owns one stage of the setup. [`SetupPipeline`] drives them
//! in order and records every transition in the run log.

pub mod account;
pub mod config;
pub mod encryption;
pub mod installer;
pub mod locator;
pub mod logging;
pub mod restore;
pub mod setup;

pub use account::{AccountService, UserAction};
pub use config::ConfigService;
pub use encryption::FernetCipher;
pub use installer::{InstallReport, InstallerService, ToolStatus};
pub use locator::BackupLocator;
pub use logging::{RunEvent, RunLogEntry, RunLogService};
pub use restore::{RestoreReport, RestoreService};
pub use setup::{SetupFailure, SetupOutcome, SetupPipeline, SetupRequest};
