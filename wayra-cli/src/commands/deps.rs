//! Deps command - report which build dependencies are available

use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use crate::output;
use wayra_core::adapters::SystemCommandRunner;
use wayra_core::services::InstallerService;

#[derive(Subcommand)]
pub enum DepsCommands {
    /// Probe go, psql and task
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: DepsCommands) -> Result<()> {
    match command {
        DepsCommands::Check { json } => {
            let installer = InstallerService::new(Arc::new(SystemCommandRunner::new()));
            let statuses = installer.check();
            let (env, warnings) = installer.tool_env();

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "tools": statuses,
                        "path": env.get("PATH"),
                        "warnings": warnings,
                    }))?
                );
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Tool", "Status", "Version"]);
            for status in &statuses {
                let state = if status.installed {
                    "installed".green().to_string()
                } else {
                    "missing".red().to_string()
                };
                table.add_row(vec![
                    status.name.clone(),
                    state,
                    status.version.clone().unwrap_or_default(),
                ]);
            }
            println!("{}", table);

            for warning in &warnings {
                output::warning(warning);
            }
            if statuses.iter().all(|s| s.installed) {
                output::success("All dependencies are available.");
            } else {
                output::info("Missing tools are installed by `wayra-setup setup` on Windows.");
            }
        }
    }
    Ok(())
}
