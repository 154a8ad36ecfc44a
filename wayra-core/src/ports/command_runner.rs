//! Subprocess port

use crate::domain::result::Result;
use crate::domain::{ToolCommand, ToolOutput};

/// Runs external tools
///
/// Implementations return `Ok` for any process that ran to completion,
/// whatever its exit code; callers decide what a non-zero code means.
/// `Err` is reserved for spawn failures and timeouts.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}
