//! Backup command - inspect, encrypt and decrypt backup files

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use super::SettingsArgs;
use crate::output;
use wayra_core::services::{BackupLocator, ConfigService, FernetCipher};
use wayra_core::Settings;

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Show the backup a restore would pick, plus every other candidate
    Latest {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Encrypt a plaintext file into a Fernet token
    Encrypt {
        /// File to encrypt
        file: PathBuf,
        /// Where to write the token (default: replace FILE)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Encryption key (default: from config.yaml)
        #[arg(long, env = "WAYRA_ENCRYPTION_KEY", hide_env_values = true)]
        key: Option<String>,
    },
    /// Decrypt a Fernet token file
    Decrypt {
        /// File to decrypt
        file: PathBuf,
        /// Where to write the plaintext (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Encryption key (default: from config.yaml)
        #[arg(long, env = "WAYRA_ENCRYPTION_KEY", hide_env_values = true)]
        key: Option<String>,
    },
}

/// Key from --key / WAYRA_ENCRYPTION_KEY, else the one in config.yaml
fn get_cipher(key: Option<String>, settings: &Settings) -> Result<FernetCipher> {
    let key = match key {
        Some(key) => key,
        None => {
            let config = ConfigService::new(settings.config_path.clone())
                .load()
                .context("No --key given and config.yaml could not be read")?;
            config.encryption_key
        }
    };
    Ok(FernetCipher::new(&key)?)
}

fn write_output(path: Option<&Path>, data: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, data)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            std::io::stdout().write_all(data.as_bytes())?;
            Ok(())
        }
    }
}

pub fn run(settings_args: &SettingsArgs, command: BackupCommands) -> Result<()> {
    let settings = settings_args.load()?;

    match command {
        BackupCommands::Latest { json } => {
            let locator = BackupLocator::new(settings.migrations_dir.clone());
            let backups = locator.list().with_context(|| {
                format!("Failed to read migrations directory {}", locator.dir().display())
            })?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "latest": backups.first(),
                        "backups": backups,
                    }))?
                );
                return Ok(());
            }

            if backups.is_empty() {
                println!("No backups found in {}.", locator.dir().display());
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["", "Name", "Modified", "Size"]);
            for (i, backup) in backups.iter().enumerate() {
                table.add_row(vec![
                    if i == 0 { "*".green().to_string() } else { String::new() },
                    backup.name(),
                    backup.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
                    backup.size_display(),
                ]);
            }
            println!("{}", table);
            println!("{} marks the backup a restore will use", "*".green());
        }
        BackupCommands::Encrypt { file, output: out, key } => {
            let cipher = get_cipher(key, &settings)?;
            let plaintext = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let target = out.unwrap_or_else(|| file.clone());
            write_output(Some(target.as_path()), &cipher.encrypt_str(&plaintext))?;
            output::success(&format!("Encrypted {} -> {}", file.display(), target.display()));
        }
        BackupCommands::Decrypt { file, output: out, key } => {
            let cipher = get_cipher(key, &settings)?;
            let plaintext = cipher
                .decrypt_file(&file)
                .with_context(|| format!("Failed to decrypt {}", file.display()))?;
            write_output(out.as_deref(), &plaintext)?;
            if let Some(path) = out {
                output::success(&format!("Decrypted {} -> {}", file.display(), path.display()));
            }
        }
    }

    Ok(())
}
