//! External tool invocation model
//!
//! Every subprocess the setup runs (psql, pg_restore, choco, version probes)
//! is described by a [`ToolCommand`] and answered with a [`ToolOutput`].
//! The environment is an explicit value built per invocation; nothing here
//! touches the process-wide environment.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// Default time limit for a tool invocation
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Environment overrides applied on top of the inherited environment
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ToolEnv {
    vars: BTreeMap<String, String>,
}

impl ToolEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with `key` set to `value`
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut vars = self.vars.clone();
        vars.insert(key.into(), value.into());
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl fmt::Debug for ToolEnv {
    // Values may hold PGPASSWORD; only names are shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.vars.keys()).finish()
    }
}

/// A single external tool invocation
#[derive(Clone)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: ToolEnv,
    pub timeout: Duration,
    secret_args: BTreeSet<usize>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: ToolEnv::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
            secret_args: BTreeSet::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an argument that must never be shown in logs or diagnostics
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.insert(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, env: ToolEnv) -> Self {
        self.env = env;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line with secret arguments masked
    pub fn display_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        for (i, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&i) {
                parts.push("****".to_string());
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

impl fmt::Debug for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCommand")
            .field("line", &self.display_line())
            .field("env", &self.env)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Captured result of a finished tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// None when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout and stderr joined, for version probes that print to either
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}
