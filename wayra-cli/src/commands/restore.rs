//! Restore command - re-run the backup restore from an existing config.yaml

use anyhow::Result;
use dialoguer::Confirm;

use super::{build_pipeline, get_run_log, log_event, report_outcome, SettingsArgs};
use crate::output;
use wayra_core::RunEvent;

pub fn run(settings_args: &SettingsArgs, force: bool, json: bool) -> Result<()> {
    let settings = settings_args.load()?;
    let run_log = get_run_log();
    log_event(&run_log, RunEvent::new("command_executed").with_detail("restore"));

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Truncate the Wayra tables on {}:{} and restore the newest backup from {}?",
                settings.db_host,
                settings.db_port,
                settings.migrations_dir.display()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if !json {
        output::info(&format!("Using config {}", settings.config_path.display()));
    }

    let pipeline = build_pipeline(settings, &run_log);
    report_outcome(pipeline.restore_only(), json)
}
