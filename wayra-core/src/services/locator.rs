//! Backup locator - finds the newest backup in the migrations directory

use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::result::Result;
use crate::domain::BackupFile;

/// Scans one directory (non-recursive) for backup files
pub struct BackupLocator {
    dir: PathBuf,
}

/// Newest first; equal timestamps fall back to the greater file name
fn newest_first(a: &BackupFile, b: &BackupFile) -> Ordering {
    b.modified
        .cmp(&a.modified)
        .then_with(|| b.name().cmp(&a.name()))
}

impl BackupLocator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All regular files directly inside the directory, newest first
    ///
    /// Subdirectories and dangling symlinks are skipped. A missing directory
    /// is an error, an empty one is not.
    pub fn list(&self) -> Result<Vec<BackupFile>> {
        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            // Follows symlinks. Dangling links and files removed since
            // read_dir are not regular files.
            let metadata = match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let modified: DateTime<Utc> = metadata.modified()?.into();
            backups.push(BackupFile::new(path, modified, metadata.len()));
        }

        backups.sort_by(newest_first);
        Ok(backups)
    }

    /// The most recently modified file, or `None` when there is none
    pub fn latest(&self) -> Result<Option<BackupFile>> {
        Ok(self.list()?.into_iter().next())
    }
}
