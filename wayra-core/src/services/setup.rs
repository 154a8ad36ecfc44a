//! Setup pipeline - runs the stages in order and records each transition
//!
//! ```text
//! ResolveConfig -> InstallDeps -> EnsureDatabase -> LocateBackup
//!   -> Decrypt -> TruncateAndRestore -> ReEncrypt -> Done
//! ```
//!
//! The first failing stage stops the run; there are no retries and no
//! rollback. An empty migrations directory ends the run early with
//! [`SetupOutcome::NoBackup`], which is not a failure.

use std::fs;
use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{BackupFile, SetupStage, ToolEnv, UserConfig};
use crate::ports::{CommandRunner, DatabaseAdmin, UserDirectory};
use crate::services::account::{AccountService, UserAction};
use crate::services::config::ConfigService;
use crate::services::encryption::FernetCipher;
use crate::services::installer::InstallerService;
use crate::services::locator::BackupLocator;
use crate::services::logging::{RunEvent, RunLogService};
use crate::services::restore::RestoreService;
use crate::settings::Settings;

/// Credentials the operator entered
#[derive(Clone)]
pub struct SetupRequest {
    pub action: UserAction,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SetupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupRequest")
            .field("action", &self.action)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// How a run that did not fail ended
#[derive(Debug)]
pub enum SetupOutcome {
    /// Backup restored and re-encrypted
    Completed {
        config: UserConfig,
        backup: BackupFile,
        database_created: bool,
        warnings: Vec<String>,
    },
    /// Nothing in the migrations directory to restore
    NoBackup {
        config: UserConfig,
        database_created: bool,
        warnings: Vec<String>,
    },
}

impl SetupOutcome {
    pub fn warnings(&self) -> &[String] {
        match self {
            SetupOutcome::Completed { warnings, .. } | SetupOutcome::NoBackup { warnings, .. } => {
                warnings
            }
        }
    }
}

/// A failed run: the stage it stopped in and why
#[derive(thiserror::Error, Debug)]
#[error("{stage} failed: {error}")]
pub struct SetupFailure {
    pub stage: SetupStage,
    pub error: Error,
}

impl SetupFailure {
    pub fn exit_code(&self) -> u8 {
        self.error.exit_code()
    }
}

/// Drives one setup run against the given ports
pub struct SetupPipeline {
    /// Only needed by [`SetupPipeline::run`]; restore-only never asks it
    accounts: Option<AccountService>,
    config: ConfigService,
    installer: InstallerService,
    locator: BackupLocator,
    runner: Arc<dyn CommandRunner>,
    admin: Arc<dyn DatabaseAdmin>,
    settings: Settings,
    run_log: Option<Arc<RunLogService>>,
}

impl SetupPipeline {
    pub fn new(
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        admin: Arc<dyn DatabaseAdmin>,
    ) -> Self {
        let installer = InstallerService::new(runner.clone())
            .with_timeouts(settings.timeouts.probe(), settings.timeouts.install());

        Self {
            accounts: None,
            config: ConfigService::new(settings.config_path.clone()),
            installer,
            locator: BackupLocator::new(settings.migrations_dir.clone()),
            runner,
            admin,
            settings,
            run_log: None,
        }
    }

    pub fn with_user_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.accounts = Some(AccountService::new(directory));
        self
    }

    /// Replace the installer, e.g. to pin the platform
    pub fn with_installer(mut self, installer: InstallerService) -> Self {
        self.installer = installer;
        self
    }

    pub fn with_run_log(mut self, run_log: Arc<RunLogService>) -> Self {
        self.run_log = Some(run_log);
        self
    }

    /// Logging never fails a run
    fn record(&self, write: impl FnOnce(&RunLogService) -> anyhow::Result<()>) {
        if let Some(run_log) = &self.run_log {
            let _ = write(run_log);
        }
    }

    fn log(&self, event: RunEvent) {
        self.record(|run_log| run_log.log(event));
    }

    /// Run `f` as `stage`, logging entry and tagging any error with the stage
    fn stage<T>(
        &self,
        stage: SetupStage,
        f: impl FnOnce() -> Result<T>,
    ) -> std::result::Result<T, SetupFailure> {
        self.record(|run_log| run_log.log_stage(stage));
        f().map_err(|error| {
            self.record(|run_log| run_log.log_failure(stage, &error));
            SetupFailure { stage, error }
        })
    }

    /// Full setup: credentials, config, dependencies, database, backup restore
    pub fn run(&self, request: &SetupRequest) -> std::result::Result<SetupOutcome, SetupFailure> {
        self.log(RunEvent::new("setup_started").with_detail(request.action.as_str()));

        let config = self.stage(SetupStage::ResolveConfig, || {
            let accounts = self
                .accounts
                .as_ref()
                .ok_or_else(|| Error::validation("no user service configured"))?;
            let config = accounts.resolve(request.action, &request.username, &request.password)?;
            self.config.write(&config)?;
            Ok(config)
        })?;

        let report = self.stage(SetupStage::InstallDeps, || {
            self.installer.install_missing(&config.db_password)
        })?;
        for package in &report.installed {
            self.log(
                RunEvent::new("dependency_installed")
                    .with_stage(SetupStage::InstallDeps)
                    .with_detail(package.clone()),
            );
        }

        self.restore_tail(config, report.env, report.warnings)
    }

    /// Restore the newest backup using an existing config.yaml
    ///
    /// Skips the user service and the installer; the database is still
    /// created when missing.
    pub fn restore_only(&self) -> std::result::Result<SetupOutcome, SetupFailure> {
        self.record(|run_log| run_log.log_event("restore_started"));

        let config = self.stage(SetupStage::ResolveConfig, || self.config.load())?;
        let (env, warnings) = self.installer.tool_env();
        self.restore_tail(config, env, warnings)
    }

    fn restore_tail(
        &self,
        config: UserConfig,
        env: ToolEnv,
        warnings: Vec<String>,
    ) -> std::result::Result<SetupOutcome, SetupFailure> {
        let target = config.database_target(self.settings.db_host.clone(), self.settings.db_port);
        let restore = RestoreService::new(self.runner.clone(), self.admin.clone())
            .with_env(env)
            .with_timeouts(self.settings.timeouts.truncate(), self.settings.timeouts.restore());

        let database_created = self.stage(SetupStage::EnsureDatabase, || {
            restore.ensure_database_exists(&target)
        })?;
        if database_created {
            self.log(
                RunEvent::new("database_created")
                    .with_stage(SetupStage::EnsureDatabase)
                    .with_detail(target.dbname.clone()),
            );
        }

        let backup = match self.stage(SetupStage::LocateBackup, || self.locator.latest())? {
            Some(backup) => backup,
            None => {
                self.log(RunEvent::new("setup_no_backup").with_stage(SetupStage::LocateBackup));
                return Ok(SetupOutcome::NoBackup {
                    config,
                    database_created,
                    warnings,
                });
            }
        };

        // pg_restore reads from disk, so the plaintext replaces the token in place
        let (cipher, plaintext) = self.stage(SetupStage::Decrypt, || {
            let cipher = FernetCipher::new(&config.encryption_key)?;
            let plaintext = cipher.decrypt_file(backup.path())?;
            fs::write(backup.path(), &plaintext)?;
            Ok((cipher, plaintext))
        })?;

        self.stage(SetupStage::TruncateAndRestore, || {
            restore.truncate_and_restore(&target, backup.path())
        })?;

        self.stage(SetupStage::ReEncrypt, || {
            fs::write(backup.path(), cipher.encrypt_str(&plaintext))?;
            Ok(())
        })?;

        self.log(
            RunEvent::new("setup_completed")
                .with_stage(SetupStage::Done)
                .with_detail(backup.name()),
        );
        Ok(SetupOutcome::Completed {
            config,
            backup,
            database_created,
            warnings,
        })
    }
}
