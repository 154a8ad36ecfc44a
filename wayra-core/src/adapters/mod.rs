//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - reqwest (blocking) for the UserDirectory port
//! - sqlx for the DatabaseAdmin port
//! - std::process for the CommandRunner port

pub mod http_user_directory;
pub mod postgres;
pub mod process;

#[cfg(test)]
pub mod fakes;
#[cfg(test)]
pub mod user_service_mock;

pub use http_user_directory::HttpUserDirectory;
pub use postgres::PostgresAdmin;
pub use process::SystemCommandRunner;
