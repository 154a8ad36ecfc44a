//! PostgreSQL administrative database adapter
//!
//! Uses a single sqlx connection to the `postgres` maintenance database per
//! call. The setup is synchronous, so each call drives its own short-lived
//! current-thread runtime.

use std::future::Future;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};

use crate::domain::result::{Error, Result};
use crate::domain::DatabaseTarget;
use crate::ports::DatabaseAdmin;

/// Database every PostgreSQL server ships for catalog operations
pub const ADMIN_DATABASE: &str = "postgres";

/// Default time allowed for establishing the admin connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Quote an identifier for use in DDL (`CREATE DATABASE "name"`)
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// sqlx-backed [`DatabaseAdmin`]
#[derive(Debug, Clone)]
pub struct PostgresAdmin {
    connect_timeout: Duration,
}

impl Default for PostgresAdmin {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl PostgresAdmin {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn block_on<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::DatabaseConnection(format!("Failed to start runtime: {}", e)))?;
        runtime.block_on(fut)
    }

    async fn connect(&self, target: &DatabaseTarget) -> Result<PgConnection> {
        let options = PgConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&target.user)
            .password(&target.password)
            .database(ADMIN_DATABASE);

        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options)).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(Error::DatabaseConnection(format!(
                "Failed to connect to {}:{} as {}: {}",
                target.host, target.port, target.user, e
            ))),
            Err(_) => Err(Error::DatabaseConnection(format!(
                "Connecting to {}:{} timed out after {}s",
                target.host,
                target.port,
                self.connect_timeout.as_secs()
            ))),
        }
    }
}

/// Close the connection regardless of how the query went
async fn release(conn: PgConnection) {
    let _ = conn.close().await;
}

impl DatabaseAdmin for PostgresAdmin {
    fn database_exists(&self, target: &DatabaseTarget) -> Result<bool> {
        self.block_on(async {
            let mut conn = self.connect(target).await?;

            let found = sqlx::query_scalar::<_, i32>("SELECT 1 FROM pg_database WHERE datname = $1")
                .bind(&target.dbname)
                .fetch_optional(&mut conn)
                .await;

            release(conn).await;

            found.map(|row| row.is_some()).map_err(|e| {
                Error::DatabaseConnection(format!("Failed to query pg_database: {}", e))
            })
        })
    }

    fn create_database(&self, target: &DatabaseTarget) -> Result<()> {
        self.block_on(async {
            let mut conn = self.connect(target).await?;

            // Simple-protocol statement; CREATE DATABASE cannot run in a transaction block
            let sql = format!("CREATE DATABASE {}", quote_identifier(&target.dbname));
            let created = conn.execute(sql.as_str()).await;

            release(conn).await;

            created.map(|_| ()).map_err(|e| {
                Error::DatabaseConnection(format!(
                    "Failed to create database {}: {}",
                    target.dbname, e
                ))
            })
        })
    }
}
