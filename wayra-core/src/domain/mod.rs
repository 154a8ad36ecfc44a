//! Core domain entities
//!
//! Plain data structures shared by every setup stage - no I/O here.

mod backup;
mod command;
mod stage;
mod user_config;
pub mod result;

pub use backup::BackupFile;
pub use command::{ToolCommand, ToolEnv, ToolOutput};
pub use stage::SetupStage;
pub use user_config::{DatabaseTarget, UserConfig};
