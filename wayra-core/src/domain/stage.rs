//! Setup pipeline stages

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of the setup pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStage {
    ResolveConfig,
    InstallDeps,
    EnsureDatabase,
    LocateBackup,
    Decrypt,
    TruncateAndRestore,
    ReEncrypt,
    Done,
}

impl SetupStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupStage::ResolveConfig => "resolve_config",
            SetupStage::InstallDeps => "install_deps",
            SetupStage::EnsureDatabase => "ensure_database",
            SetupStage::LocateBackup => "locate_backup",
            SetupStage::Decrypt => "decrypt",
            SetupStage::TruncateAndRestore => "truncate_and_restore",
            SetupStage::ReEncrypt => "re_encrypt",
            SetupStage::Done => "done",
        }
    }

    /// Stage that follows this one; `Done` is terminal
    pub fn next(&self) -> Option<SetupStage> {
        match self {
            SetupStage::ResolveConfig => Some(SetupStage::InstallDeps),
            SetupStage::InstallDeps => Some(SetupStage::EnsureDatabase),
            SetupStage::EnsureDatabase => Some(SetupStage::LocateBackup),
            SetupStage::LocateBackup => Some(SetupStage::Decrypt),
            SetupStage::Decrypt => Some(SetupStage::TruncateAndRestore),
            SetupStage::TruncateAndRestore => Some(SetupStage::ReEncrypt),
            SetupStage::ReEncrypt => Some(SetupStage::Done),
            SetupStage::Done => None,
        }
    }
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
