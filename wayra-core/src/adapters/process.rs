//! Subprocess adapter built on std::process
//!
//! Output pipes are drained on helper threads so a chatty tool
//! (`pg_restore -v`) cannot block on a full pipe while we wait for it.
//! Collecting that output is bounded by the same deadline as the process:
//! a background grandchild holding the pipes open only costs its output.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::domain::result::{Error, Result};
use crate::domain::{ToolCommand, ToolOutput};
use crate::ports::CommandRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs tools as real OS processes, killing them past their timeout
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

fn collect(output: &Receiver<String>, deadline: Instant) -> String {
    output
        .recv_timeout(deadline.saturating_duration_since(Instant::now()))
        .unwrap_or_default()
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Subprocess {
                tool: command.program.clone(),
                exit_code: None,
                stderr: format!("could not start {}: {}", command.program, e),
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + command.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    kill(&mut child);
                    return Err(e.into());
                }
            }
            if Instant::now() >= deadline {
                kill(&mut child);
                return Err(Error::Timeout {
                    tool: command.program.clone(),
                    after: command.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(ToolOutput {
            exit_code: status.code(),
            stdout: collect(&stdout, deadline),
            stderr: collect(&stderr, deadline),
        })
    }
}
