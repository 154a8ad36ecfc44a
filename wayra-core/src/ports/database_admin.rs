//! Administrative database port

use crate::domain::result::Result;
use crate::domain::DatabaseTarget;

/// Catalog operations run against the server's administrative database
///
/// Each call acquires its own connection and releases it before returning,
/// on success and on failure alike.
pub trait DatabaseAdmin: Send + Sync {
    /// Whether a database named `target.dbname` exists on the server
    fn database_exists(&self, target: &DatabaseTarget) -> Result<bool>;

    /// Create the database named `target.dbname`
    fn create_database(&self, target: &DatabaseTarget) -> Result<()>;
}
