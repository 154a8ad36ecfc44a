//! Config service - reads and writes the server's config.yaml

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::result::{Error, Result};
use crate::domain::UserConfig;

/// Persists a [`UserConfig`] as YAML at a fixed path
pub struct ConfigService {
    path: PathBuf,
}

impl ConfigService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the config, creating parent directories as needed
    ///
    /// An existing file is replaced.
    pub fn write(&self, config: &UserConfig) -> Result<()> {
        let write_error = |message: String| Error::ConfigWrite {
            path: self.path.clone(),
            message,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
            }
        }

        let yaml = serde_yaml::to_string(config).map_err(|e| write_error(e.to_string()))?;
        fs::write(&self.path, yaml).map_err(|e| write_error(e.to_string()))
    }

    /// Read a previously written config back
    pub fn load(&self) -> Result<UserConfig> {
        let read_error = |message: String| Error::ConfigRead {
            path: self.path.clone(),
            message,
        };

        let content = fs::read_to_string(&self.path).map_err(|e| read_error(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| read_error(e.to_string()))
    }
}
