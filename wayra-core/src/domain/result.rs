//! Result and error types for the core library

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Core library error type
///
/// Each variant maps to one failure class of the setup pipeline. An empty
/// migrations directory has no variant: it is a normal outcome,
/// see [`crate::SetupOutcome::NoBackup`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to write config {}: {message}", .path.display())]
    ConfigWrite { path: PathBuf, message: String },

    #[error("Failed to read config {}: {message}", .path.display())]
    ConfigRead { path: PathBuf, message: String },

    #[error("User service error{}: {message}", describe_status(.status))]
    UserService { status: Option<u16>, message: String },

    #[error("Dependency installation failed: {0}")]
    DependencyInstall(String),

    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    #[error("Failed to decrypt backup: {0}")]
    Decryption(String),

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("{tool} failed ({}):\n{stderr}", describe_exit(.exit_code))]
    Subprocess {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} did not finish within {}s", .after.as_secs())]
    Timeout { tool: String, after: Duration },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "did not run to completion".to_string(),
    }
}

impl Error {
    /// Create a decryption error from any displayable cause
    pub fn decryption(cause: impl std::fmt::Display) -> Self {
        Self::Decryption(cause.to_string())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Process exit code for this failure class
    ///
    /// 0 is reserved for success and for the "no backup found" early exit.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::ConfigWrite { .. } | Error::ConfigRead { .. } => 2,
            Error::UserService { .. } => 3,
            Error::DependencyInstall(_) => 4,
            Error::DatabaseConnection(_) => 5,
            Error::Decryption(_) | Error::InvalidKey(_) => 6,
            Error::Subprocess { .. } | Error::Timeout { .. } => 7,
            Error::Validation(_) | Error::Io(_) | Error::Json(_) => 1,
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subprocess_error_keeps_stderr_verbatim() {
        let err = Error::Subprocess {
            tool: "pg_restore".to_string(),
            exit_code: Some(1),
            stderr: "pg_restore: error: could not open input file".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("pg_restore failed (exit code 1)"));
        assert!(msg.ends_with("pg_restore: error: could not open input file"));
    }

    #[test]
    fn test_user_service_error_display() {
        let err = Error::UserService {
            status: Some(401),
            message: "invalid credentials".to_string(),
        };
        assert_eq!(err.to_string(), "User service error (HTTP 401): invalid credentials");

        let err = Error::UserService {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "User service error: connection refused");
    }

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let codes = [
            Error::ConfigWrite { path: PathBuf::from("c.yaml"), message: String::new() }.exit_code(),
            Error::UserService { status: None, message: String::new() }.exit_code(),
            Error::DependencyInstall(String::new()).exit_code(),
            Error::DatabaseConnection(String::new()).exit_code(),
            Error::Decryption(String::new()).exit_code(),
            Error::Timeout { tool: "psql".into(), after: Duration::from_secs(1) }.exit_code(),
        ];
        let mut unique = codes.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
        assert!(!codes.contains(&0));
    }
}
