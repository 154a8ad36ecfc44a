//! Tool settings
//!
//! Stored as `settings.json` in the state directory (`WAYRA_DIR`, or
//! `~/.wayra`):
//! ```json
//! {
//!   "serviceUrl": "http://localhost:8080",
//!   "configPath": "./server/config/config.yaml",
//!   "migrationsDir": "./server/migrations",
//!   "dbHost": "localhost",
//!   "dbPort": 5432,
//!   "timeouts": { "httpSecs": 30, "restoreSecs": 1800 }
//! }
//! ```
//! Every key is optional. Keys this tool does not know are kept on save.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

pub const SETTINGS_FILE: &str = "settings.json";

/// State directory from `WAYRA_DIR`, falling back to `~/.wayra`
pub fn state_dir() -> PathBuf {
    match std::env::var("WAYRA_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .map(|home| home.join(".wayra"))
            .unwrap_or_else(|| PathBuf::from(".wayra")),
    }
}

/// Time limits for external calls, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
    pub http_secs: u64,
    pub connect_secs: u64,
    pub probe_secs: u64,
    pub install_secs: u64,
    pub truncate_secs: u64,
    pub restore_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            http_secs: 30,
            connect_secs: 10,
            probe_secs: 30,
            install_secs: 30 * 60,
            truncate_secs: 5 * 60,
            restore_secs: 30 * 60,
        }
    }
}

impl Timeouts {
    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn install(&self) -> Duration {
        Duration::from_secs(self.install_secs)
    }

    pub fn truncate(&self) -> Duration {
        Duration::from_secs(self.truncate_secs)
    }

    pub fn restore(&self) -> Duration {
        Duration::from_secs(self.restore_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Base URL of the Wayra user service
    pub service_url: String,
    /// Where config.yaml is written
    pub config_path: PathBuf,
    /// Directory holding encrypted backups
    pub migrations_dir: PathBuf,
    pub db_host: String,
    pub db_port: u16,
    pub timeouts: Timeouts,
    #[serde(flatten)]
    pub(crate) other: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8080".to_string(),
            config_path: PathBuf::from("./server/config/config.yaml"),
            migrations_dir: PathBuf::from("./server/migrations"),
            db_host: "localhost".to_string(),
            db_port: 5432,
            timeouts: Timeouts::default(),
            other: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from `state_dir`, then apply `WAYRA_*` environment overrides
    pub fn load(state_dir: &Path) -> Result<Self> {
        let mut settings = Self::load_file(state_dir)?;
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Settings file only; defaults when it does not exist
    pub fn load_file(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| Error::ConfigRead {
            path: path.clone(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::ConfigRead {
            path,
            message: e.to_string(),
        })
    }

    /// Apply overrides from `lookup` (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("WAYRA_SERVICE_URL") {
            self.service_url = url;
        }
        if let Some(path) = lookup("WAYRA_CONFIG_PATH") {
            self.config_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("WAYRA_MIGRATIONS_DIR") {
            self.migrations_dir = PathBuf::from(dir);
        }
        if let Some(host) = lookup("WAYRA_DB_HOST") {
            self.db_host = host;
        }
        if let Some(port) = lookup("WAYRA_DB_PORT") {
            self.db_port = port.trim().parse().map_err(|_| {
                Error::validation(format!("WAYRA_DB_PORT is not a valid port: {}", port))
            })?;
        }
        Ok(())
    }

    /// Write settings back, keeping keys written by other tools
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let path = state_dir.join(SETTINGS_FILE);
        let write_error = |message: String| Error::ConfigWrite {
            path: path.clone(),
            message,
        };

        fs::create_dir_all(state_dir).map_err(|e| write_error(e.to_string()))?;
        let content = serde_json::to_string_pretty(self).map_err(|e| write_error(e.to_string()))?;
        fs::write(&path, content).map_err(|e| write_error(e.to_string()))
    }
}
