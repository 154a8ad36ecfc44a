//! Installer service - probes for Go, PostgreSQL and Task, installs what is missing
//!
//! Installation goes through Chocolatey and only happens on Windows. On other
//! platforms missing tools are reported back as warnings. Either way the
//! service hands back the [`ToolEnv`] later subprocesses should run with.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{ToolCommand, ToolEnv};
use crate::ports::CommandRunner;

pub const DEFAULT_CHOCO_PATH: &str = r"C:\ProgramData\chocolatey\bin\choco.exe";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Platform family; decides whether installing is possible and the PATH layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    fn path_separator(&self) -> char {
        match self {
            Platform::Windows => ';',
            Platform::Unix => ':',
        }
    }
}

/// A tool the Wayra server build needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Go,
    Postgres,
    Task,
}

impl Dependency {
    pub const ALL: [Dependency; 3] = [Dependency::Go, Dependency::Postgres, Dependency::Task];

    pub fn name(&self) -> &'static str {
        match self {
            Dependency::Go => "go",
            Dependency::Postgres => "psql",
            Dependency::Task => "task",
        }
    }

    fn probe_command(&self) -> ToolCommand {
        match self {
            Dependency::Go => ToolCommand::new("go").arg("version"),
            Dependency::Postgres => ToolCommand::new("psql").arg("--version"),
            Dependency::Task => ToolCommand::new("task").arg("--version"),
        }
    }

    /// Text the probe output must contain
    fn marker(&self) -> &'static str {
        match self {
            Dependency::Go => "go version",
            Dependency::Postgres => "psql",
            Dependency::Task => "Task",
        }
    }

    fn package(&self) -> &'static str {
        match self {
            Dependency::Go => "golang",
            Dependency::Postgres => "postgresql16",
            Dependency::Task => "go-task",
        }
    }
}

/// Probe result for one dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub installed: bool,
    /// First line of the probe output when installed
    pub version: Option<String>,
}

/// What an install run did
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub statuses: Vec<ToolStatus>,
    /// Chocolatey packages installed by this run
    pub installed: Vec<String>,
    pub warnings: Vec<String>,
    /// Environment for every later subprocess
    pub env: ToolEnv,
}

pub struct InstallerService {
    runner: Arc<dyn CommandRunner>,
    platform: Platform,
    choco_path: PathBuf,
    home: Option<PathBuf>,
    base_path: String,
    probe_timeout: Duration,
    install_timeout: Duration,
}

impl InstallerService {
    /// Installer for the current machine
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            platform: Platform::current(),
            choco_path: PathBuf::from(DEFAULT_CHOCO_PATH),
            home: dirs::home_dir(),
            base_path: std::env::var("PATH").unwrap_or_default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_choco_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.choco_path = path.into();
        self
    }

    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// PATH the tool environment is built on
    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn with_timeouts(mut self, probe: Duration, install: Duration) -> Self {
        self.probe_timeout = probe;
        self.install_timeout = install;
        self
    }

    /// Whether `dependency` answers its version probe
    ///
    /// A probe that cannot start, fails or times out means "not installed".
    pub fn probe(&self, dependency: Dependency) -> ToolStatus {
        let command = dependency.probe_command().timeout(self.probe_timeout);
        let version = match self.runner.run(&command) {
            Ok(output) if output.success() && output.combined().contains(dependency.marker()) => {
                output.combined().lines().next().map(|l| l.trim().to_string())
            }
            _ => None,
        };

        ToolStatus {
            name: dependency.name().to_string(),
            installed: version.is_some(),
            version,
        }
    }

    pub fn check(&self) -> Vec<ToolStatus> {
        Dependency::ALL.iter().map(|d| self.probe(*d)).collect()
    }

    /// Install every missing dependency and return the tool environment
    ///
    /// `db_password` becomes the PostgreSQL superuser password when the
    /// server is installed here.
    pub fn install_missing(&self, db_password: &str) -> Result<InstallReport> {
        let statuses = self.check();
        let missing: Vec<Dependency> = Dependency::ALL
            .iter()
            .zip(&statuses)
            .filter(|(_, status)| !status.installed)
            .map(|(d, _)| *d)
            .collect();

        let mut installed = Vec::new();
        let mut warnings = Vec::new();

        if !missing.is_empty() {
            match self.platform {
                Platform::Windows => {
                    if !self.choco_path.is_file() {
                        return Err(Error::DependencyInstall(format!(
                            "Chocolatey not found at {}; install it from https://chocolatey.org/install and re-run",
                            self.choco_path.display()
                        )));
                    }
                    for dependency in &missing {
                        self.install(*dependency, db_password)?;
                        installed.push(dependency.package().to_string());
                    }
                }
                Platform::Unix => {
                    for dependency in &missing {
                        warnings.push(format!(
                            "{} is not installed; install it with your package manager",
                            dependency.name()
                        ));
                    }
                }
            }
        }

        let (env, path_warnings) = self.tool_env();
        warnings.extend(path_warnings);

        Ok(InstallReport {
            statuses,
            installed,
            warnings,
            env,
        })
    }

    fn install(&self, dependency: Dependency, db_password: &str) -> Result<()> {
        let choco = self.choco_path.to_string_lossy().into_owned();
        let mut command = ToolCommand::new(choco)
            .args(["install", dependency.package()])
            .timeout(self.install_timeout);
        if dependency == Dependency::Postgres {
            command = command
                .arg("--params")
                .secret_arg(format!("/password:{}", db_password));
        }
        let command = command.arg("-y");

        let output = self
            .runner
            .run(&command)
            .map_err(|e| Error::DependencyInstall(format!("{}: {}", command.display_line(), e)))?;
        if !output.success() {
            return Err(Error::DependencyInstall(format!(
                "{} exited with {:?}:\n{}",
                command.display_line(),
                output.exit_code,
                output.combined().trim()
            )));
        }
        Ok(())
    }

    /// Directories the Go toolchain and Task install their binaries into
    fn extra_path_entries(&self, home: &Path) -> Vec<PathBuf> {
        match self.platform {
            Platform::Windows => vec![
                home.join("go").join("bin"),
                home.join("taskfile").join("bin"),
            ],
            Platform::Unix => vec![home.join("go").join("bin"), PathBuf::from("/usr/local/bin")],
        }
    }

    /// PATH extended with the tool directories not already on it
    pub fn tool_env(&self) -> (ToolEnv, Vec<String>) {
        let mut warnings = Vec::new();
        let separator = self.platform.path_separator();
        let mut entries: Vec<String> = self
            .base_path
            .split(separator)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();

        match &self.home {
            Some(home) => {
                for dir in self.extra_path_entries(home) {
                    let dir = dir.to_string_lossy().into_owned();
                    if !entries.contains(&dir) {
                        entries.push(dir);
                    }
                }
            }
            None => warnings.push("home directory unknown; PATH left unchanged".to_string()),
        }

        let path = entries.join(&separator.to_string());
        (ToolEnv::new().with("PATH", path), warnings)
    }
}
