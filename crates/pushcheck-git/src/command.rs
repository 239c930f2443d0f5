//! Runner for the external git binary.
//!
//! Every git invocation in pushcheck goes through [`GitCommand`]: arguments
//! are passed to `git`, stdout and stderr are captured, and a non-zero exit
//! becomes an [`Error::Command`] carrying everything the caller needs to
//! build a diagnostic. There are no retries at this layer.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

/// Name of the git binary, resolved through `PATH`.
const GIT_BINARY: &str = "git";

/// How often a running child is polled while a deadline is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Output of a git invocation that exited successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (always 0 for values returned by [`GitCommand::run`]).
    pub code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// A single git invocation.
#[derive(Debug, Clone)]
pub struct GitCommand {
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl GitCommand {
    /// Create a command running `git <args>`.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            envs: Vec::new(),
            timeout: None,
        }
    }

    /// Run the command inside `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Kill the child and fail with [`Error::Timeout`] once `limit` elapses.
    #[must_use]
    pub const fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// The argument list as it would appear on a shell prompt.
    #[must_use]
    pub fn display_args(&self) -> String {
        self.args.join(" ")
    }

    /// Run git to completion and capture its output.
    ///
    /// # Errors
    /// Returns [`Error::Spawn`] if git cannot be started, [`Error::Timeout`]
    /// if the deadline expires, and [`Error::Command`] on a non-zero exit.
    pub fn run(&self) -> Result<CommandOutput> {
        let mut command = Command::new(GIT_BINARY);
        command
            .args(&self.args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        debug!(args = %self.display_args(), cwd = ?self.cwd, "running git");
        let mut child = command.spawn().map_err(Error::Spawn)?;

        // Pipes are drained on their own threads so a chatty child can never
        // block on a full pipe while we wait for it.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match self.timeout {
            Some(limit) => wait_with_deadline(&mut child, limit)?,
            None => Some(child.wait()?),
        };

        let Some(status) = status else {
            // Reader threads are detached: a grandchild may still hold the
            // pipes open after git itself is gone.
            return Err(Error::Timeout {
                args: self.display_args(),
                timeout: self.timeout.unwrap_or_default(),
                cwd: self.cwd.clone(),
            });
        };

        let output = CommandOutput {
            code: status.code().unwrap_or(-1),
            stdout: collect(stdout),
            stderr: collect(stderr),
        };

        if status.success() {
            return Ok(output);
        }

        debug!(
            args = %self.display_args(),
            code = output.code,
            stderr = %output.stderr.trim(),
            "git exited with failure"
        );
        Err(Error::Command {
            args: self.display_args(),
            code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
            cwd: self.cwd.clone(),
        })
    }
}

/// Wait for `child` until `limit` elapses; kill it and return `None` on expiry.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= limit {
            if let Err(e) = child.kill() {
                debug!(error = %e, "failed to kill timed-out git");
            }
            // Reap the child so it does not linger as a zombie.
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!(error = %e, "failed to read git output");
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}
