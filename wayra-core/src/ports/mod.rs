//! Port definitions (hexagonal architecture)
//!
//! Every external system the setup talks to sits behind one of these traits,
//! so the pipeline can be driven by fakes in tests.

mod command_runner;
mod database_admin;
mod user_directory;

pub use command_runner::CommandRunner;
pub use database_admin::DatabaseAdmin;
pub use user_directory::UserDirectory;
