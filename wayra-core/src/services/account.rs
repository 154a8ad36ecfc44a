//! Account service - obtains the user's config from the user service

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::UserConfig;
use crate::ports::UserDirectory;

/// Whether the operator registers a new account or signs in to an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAction {
    Create,
    Login,
}

impl UserAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::Create => "create",
            UserAction::Login => "login",
        }
    }
}

/// Resolves credentials into a [`UserConfig`]
pub struct AccountService {
    directory: Arc<dyn UserDirectory>,
}

impl AccountService {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Create or look up the user, depending on `action`
    ///
    /// The returned record always carries the username that was asked for,
    /// and the password when the service leaves it out.
    pub fn resolve(&self, action: UserAction, username: &str, password: &str) -> Result<UserConfig> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::validation("username must not be empty"));
        }
        if password.is_empty() {
            return Err(Error::validation("password must not be empty"));
        }

        let mut config = match action {
            UserAction::Create => self.directory.create_user(username, password)?,
            UserAction::Login => self.directory.find_user(username, password)?,
        };

        if config.username.is_empty() {
            config.username = username.to_string();
        }
        if config.password.is_empty() {
            config.password = password.to_string();
        }
        Ok(config)
    }
}
