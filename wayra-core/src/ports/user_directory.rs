//! Remote user service port

use crate::domain::result::Result;
use crate::domain::UserConfig;

/// The Wayra user service that hands out per-user configuration
pub trait UserDirectory: Send + Sync {
    /// Register a new user and return its configuration
    fn create_user(&self, username: &str, password: &str) -> Result<UserConfig>;

    /// Authenticate an existing user and return its configuration
    fn find_user(&self, username: &str, password: &str) -> Result<UserConfig>;
}
