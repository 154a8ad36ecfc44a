//! Restore service - prepares the target database and loads a backup into it

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::result::{Error, Result};
use crate::domain::{DatabaseTarget, ToolCommand, ToolEnv, ToolOutput};
use crate::ports::{CommandRunner, DatabaseAdmin};

pub const DEFAULT_TRUNCATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RESTORE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Tables emptied before a restore, in the order the server schema lists them
pub const TARGET_TABLES: [&str; 10] = [
    "roles",
    "users",
    "companies",
    "routes",
    "deliveries",
    "product_categories",
    "products",
    "waypoints",
    "sensor_data",
    "user_companies",
];

/// Outcome of a successful truncate + restore
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub tables_truncated: usize,
    /// Verbose log pg_restore wrote to stderr
    pub restore_log: String,
}

pub struct RestoreService {
    runner: Arc<dyn CommandRunner>,
    admin: Arc<dyn DatabaseAdmin>,
    env: ToolEnv,
    truncate_timeout: Duration,
    restore_timeout: Duration,
}

fn truncate_statement() -> String {
    format!(
        "TRUNCATE TABLE {} RESTART IDENTITY CASCADE;",
        TARGET_TABLES.join(", ")
    )
}

impl RestoreService {
    pub fn new(runner: Arc<dyn CommandRunner>, admin: Arc<dyn DatabaseAdmin>) -> Self {
        Self {
            runner,
            admin,
            env: ToolEnv::new(),
            truncate_timeout: DEFAULT_TRUNCATE_TIMEOUT,
            restore_timeout: DEFAULT_RESTORE_TIMEOUT,
        }
    }

    /// Base environment for psql and pg_restore (usually the installer's PATH)
    pub fn with_env(mut self, env: ToolEnv) -> Self {
        self.env = env;
        self
    }

    pub fn with_timeouts(mut self, truncate: Duration, restore: Duration) -> Self {
        self.truncate_timeout = truncate;
        self.restore_timeout = restore;
        self
    }

    /// Create the target database unless it already exists
    ///
    /// Returns `true` when the database was created by this call.
    pub fn ensure_database_exists(&self, target: &DatabaseTarget) -> Result<bool> {
        if target.dbname.is_empty() {
            return Err(Error::validation("database name must not be empty"));
        }
        if self.admin.database_exists(target)? {
            return Ok(false);
        }
        self.admin.create_database(target)?;
        Ok(true)
    }

    fn tool_env(&self, target: &DatabaseTarget) -> ToolEnv {
        self.env.with("PGPASSWORD", target.password.as_str())
    }

    pub fn truncate_command(&self, target: &DatabaseTarget) -> ToolCommand {
        ToolCommand::new("psql")
            .arg(format!("--dbname={}", target.dbname))
            .arg(format!("--username={}", target.user))
            .arg(format!("--host={}", target.host))
            .arg(format!("--port={}", target.port))
            .arg("-c")
            .arg(truncate_statement())
            .env(self.tool_env(target))
            .timeout(self.truncate_timeout)
    }

    pub fn restore_command(&self, target: &DatabaseTarget, backup: &Path) -> ToolCommand {
        ToolCommand::new("pg_restore")
            .args(["--no-owner", "--role=postgres"])
            .arg(format!("--dbname={}", target.dbname))
            .args(["--format=c", "-v", "--clean", "--if-exists"])
            .arg(format!("--host={}", target.host))
            .arg(format!("--port={}", target.port))
            .arg(format!("--username={}", target.user))
            .arg(backup.to_string_lossy())
            .env(self.tool_env(target))
            .timeout(self.restore_timeout)
    }

    /// Run a tool, turning a non-zero exit into [`Error::Subprocess`]
    fn run_checked(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let output = self.runner.run(command)?;
        if !output.success() {
            return Err(Error::Subprocess {
                tool: command.program.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    pub fn truncate_tables(&self, target: &DatabaseTarget) -> Result<()> {
        self.run_checked(&self.truncate_command(target))?;
        Ok(())
    }

    pub fn restore_database(&self, target: &DatabaseTarget, backup: &Path) -> Result<String> {
        Ok(self.run_checked(&self.restore_command(target, backup))?.stderr)
    }

    /// Empty the target tables, then restore `backup` (a plaintext custom-format dump)
    ///
    /// pg_restore never runs when the truncate fails.
    pub fn truncate_and_restore(&self, target: &DatabaseTarget, backup: &Path) -> Result<RestoreReport> {
        self.truncate_tables(target)?;
        let restore_log = self.restore_database(target, backup)?;
        Ok(RestoreReport {
            tables_truncated: TARGET_TABLES.len(),
            restore_log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fakes::{sample_user, FakeAdmin, FakeRunner};
    use std::path::PathBuf;

    fn target() -> DatabaseTarget {
        sample_user().database_target("localhost", 5432)
    }

    fn service(runner: Arc<FakeRunner>, admin: Arc<FakeAdmin>) -> RestoreService {
        RestoreService::new(runner, admin)
    }

    #[test]
    fn test_ensure_database_is_idempotent() {
        let admin = Arc::new(FakeAdmin::new());
        let service = service(Arc::new(FakeRunner::new()), admin.clone());

        assert!(service.ensure_database_exists(&target()).unwrap());
        assert!(!service.ensure_database_exists(&target()).unwrap());
        assert_eq!(admin.databases(), vec!["appdb"]);
        assert_eq!(admin.open_connections(), 0);
    }

    #[test]
    fn test_ensure_database_connection_failure() {
        let mut admin = FakeAdmin::new();
        admin.refuse_connections = true;
        let admin = Arc::new(admin);
        let err = service(Arc::new(FakeRunner::new()), admin.clone())
            .ensure_database_exists(&target())
            .unwrap_err();

        assert!(matches!(err, Error::DatabaseConnection(_)));
        assert_eq!(admin.open_connections(), 0);
    }

    #[test]
    fn test_truncate_command() {
        let runner = Arc::new(FakeRunner::new());
        let svc = service(runner.clone(), Arc::new(FakeAdmin::new()))
            .with_env(ToolEnv::new().with("PATH", "/opt/pg/bin"));
        svc.truncate_tables(&target()).unwrap();

        let call = &runner.calls()[0];
        assert_eq!(call.program, "psql");
        assert_eq!(
            call.args,
            vec![
                "--dbname=appdb",
                "--username=postgres",
                "--host=localhost",
                "--port=5432",
                "-c",
                "TRUNCATE TABLE roles, users, companies, routes, deliveries, product_categories, products, waypoints, sensor_data, user_companies RESTART IDENTITY CASCADE;",
            ]
        );
        assert_eq!(call.env.get("PGPASSWORD"), Some("pgpass"));
        assert_eq!(call.env.get("PATH"), Some("/opt/pg/bin"));
        assert_eq!(call.timeout, DEFAULT_TRUNCATE_TIMEOUT);
    }

    #[test]
    fn test_restore_command() {
        let svc = service(Arc::new(FakeRunner::new()), Arc::new(FakeAdmin::new()));
        let command = svc.restore_command(&target(), &PathBuf::from("server/migrations/backup.enc"));

        assert_eq!(command.program, "pg_restore");
        assert_eq!(
            command.args,
            vec![
                "--no-owner",
                "--role=postgres",
                "--dbname=appdb",
                "--format=c",
                "-v",
                "--clean",
                "--if-exists",
                "--host=localhost",
                "--port=5432",
                "--username=postgres",
                "server/migrations/backup.enc",
            ]
        );
        assert_eq!(command.env.get("PGPASSWORD"), Some("pgpass"));
        assert_eq!(command.timeout, DEFAULT_RESTORE_TIMEOUT);
    }

    #[test]
    fn test_failed_truncate_skips_restore() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("psql", 2, "", "psql: error: connection refused");
        let svc = service(runner.clone(), Arc::new(FakeAdmin::new()));

        let err = svc
            .truncate_and_restore(&target(), Path::new("backup.enc"))
            .unwrap_err();
        match err {
            Error::Subprocess { tool, exit_code, stderr } => {
                assert_eq!(tool, "psql");
                assert_eq!(exit_code, Some(2));
                assert_eq!(stderr, "psql: error: connection refused");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(runner.programs(), vec!["psql"]);
    }

    #[test]
    fn test_restore_failure_keeps_stderr() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("pg_restore", 1, "", "pg_restore: error: input file does not appear to be a valid archive");
        let svc = service(runner.clone(), Arc::new(FakeAdmin::new()));

        let err = svc
            .truncate_and_restore(&target(), Path::new("backup.enc"))
            .unwrap_err();
        assert!(err.to_string().contains("does not appear to be a valid archive"));
        assert_eq!(err.exit_code(), 7);
        assert_eq!(runner.programs(), vec!["psql", "pg_restore"]);
    }

    #[test]
    fn test_successful_restore_report() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("pg_restore", 0, "", "pg_restore: processing data for table \"public.users\"\n");
        let report = service(runner, Arc::new(FakeAdmin::new()))
            .truncate_and_restore(&target(), Path::new("backup.enc"))
            .unwrap();
        assert_eq!(report.tables_truncated, 10);
        assert!(report.restore_log.contains("public.users"));
    }
}
