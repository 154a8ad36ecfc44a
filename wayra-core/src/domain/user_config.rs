//! User configuration domain model

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// User record returned by the user service and persisted as config.yaml
///
/// Field names match the YAML keys the Wayra server reads at startup.
/// Anything else the service sends is kept in `extra` so the written file
/// never loses information.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub dbname: String,
    pub dbuser: String,
    pub db_password: String,
    /// URL-safe base64 Fernet key used for backup files
    pub encryption_key: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl UserConfig {
    /// Connection target for this user's database
    pub fn database_target(&self, host: impl Into<String>, port: u16) -> DatabaseTarget {
        DatabaseTarget {
            host: host.into(),
            port,
            dbname: self.dbname.clone(),
            user: self.dbuser.clone(),
            password: self.db_password.clone(),
        }
    }
}

impl fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("dbuser", &self.dbuser)
            .field("db_password", &"<redacted>")
            .field("encryption_key", &"<redacted>")
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// PostgreSQL server and credentials for one target database
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
