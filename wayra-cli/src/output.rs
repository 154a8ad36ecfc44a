//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};

use wayra_core::SetupStage;

pub fn success(msg: &str) {
    println!("{}", msg.green());
}

pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Human label for a pipeline stage
pub fn stage_label(stage: SetupStage) -> &'static str {
    match stage {
        SetupStage::ResolveConfig => "Resolving user config",
        SetupStage::InstallDeps => "Installing dependencies",
        SetupStage::EnsureDatabase => "Preparing database",
        SetupStage::LocateBackup => "Locating backup",
        SetupStage::Decrypt => "Decrypting backup",
        SetupStage::TruncateAndRestore => "Restoring database",
        SetupStage::ReEncrypt => "Re-encrypting backup",
        SetupStage::Done => "Done",
    }
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}
