//! Wayra setup CLI - provisions a local Wayra server

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{backup, deps, logs, restore, setup, SettingsArgs};
use wayra_core::SetupFailure;

/// Wayra setup - user config, dependencies and database restore
#[derive(Parser)]
#[command(name = "wayra-setup", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full setup: account, config.yaml, dependencies, database restore
    Setup(setup::SetupArgs),

    /// Restore the newest backup using the existing config.yaml
    Restore {
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect, encrypt and decrypt backup files
    Backup {
        #[command(subcommand)]
        command: backup::BackupCommands,
    },

    /// Check Go, PostgreSQL and Task
    Deps {
        #[command(subcommand)]
        command: deps::DepsCommands,
    },

    /// View and manage the run log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

/// Exit code for a failed command; core errors carry their own
fn exit_code_for(error: &anyhow::Error) -> u8 {
    if let Some(failure) = error.downcast_ref::<SetupFailure>() {
        return failure.exit_code();
    }
    if let Some(core) = error.downcast_ref::<wayra_core::Error>() {
        return core.exit_code();
    }
    1
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Setup(args) => setup::run(&cli.settings, args),
        Commands::Restore { force, json } => restore::run(&cli.settings, force, json),
        Commands::Backup { command } => backup::run(&cli.settings, command),
        Commands::Deps { command } => deps::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use wayra_core::SetupStage;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exit_codes_follow_core_errors() {
        let failure = SetupFailure {
            stage: SetupStage::EnsureDatabase,
            error: wayra_core::Error::DatabaseConnection("refused".into()),
        };
        assert_eq!(exit_code_for(&anyhow::Error::new(failure)), 5);

        let core = anyhow::Error::new(wayra_core::Error::InvalidKey("short".into()))
            .context("Failed to decrypt backup.enc");
        assert_eq!(exit_code_for(&core), 6);

        assert_eq!(exit_code_for(&anyhow::anyhow!("prompt cancelled")), 1);
    }

    #[test]
    fn test_global_settings_flags() {
        let cli = Cli::try_parse_from([
            "wayra-setup",
            "--db-port",
            "5433",
            "restore",
            "--force",
        ])
        .unwrap();
        assert_eq!(cli.settings.db_port, Some(5433));
        assert!(matches!(cli.command, Commands::Restore { force: true, json: false }));
    }
}
