//! # External process execution.
//!
//! Every side effect of a component goes through an external executable. An
//! [`Invocation`] describes one call (program, arguments, extra environment,
//! optional stdout redirection); [`output`] runs it under a
//! [`CancellationToken`].
//!
//! ## Rules
//! - Children are spawned in their own process group: terminal signals reach
//!   only the orchestrator, which then stops children through the token.
//! - Children are killed when their handle is dropped (`kill_on_drop`), so an
//!   aborted or timed-out future never leaks a process.
//! - Whether an exit was caused by cancellation is decided from the token's
//!   state, never from the exit status or error text.
//! - Combined stdout/stderr is captured for diagnostics, keeping only the
//!   last [`OUTPUT_TAIL_LIMIT`] bytes of long-running daemons.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::error::ComponentError;

/// Maximum amount of captured output kept per process.
pub const OUTPUT_TAIL_LIMIT: usize = 64 * 1024;

/// How long captured output may keep draining after the child has exited.
const CAPTURE_DRAIN: Duration = Duration::from_secs(1);

/// One external command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    stdout: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdout: None,
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Redirects stdout into a freshly created file; only stderr is captured.
    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn stdout_path(&self) -> Option<&PathBuf> {
        self.stdout.as_ref()
    }

    fn spawn(&self) -> Result<Child, ExecError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        match &self.stdout {
            Some(path) => {
                let file = File::create(path).map_err(|source| ExecError::Redirect {
                    path: path.clone(),
                    source,
                })?;
                cmd.stdout(Stdio::from(file));
            }
            None => {
                cmd.stdout(Stdio::piped());
            }
        }

        cmd.spawn().map_err(|source| ExecError::Spawn {
            program: self.program.clone(),
            source,
        })
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Failure of one external command.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program could not be launched.
    #[error("could not launch {program}: {source}")]
    Spawn { program: String, source: io::Error },

    /// The stdout redirection target could not be created.
    #[error("could not create {path:?}: {source}")]
    Redirect { path: PathBuf, source: io::Error },

    /// Waiting for the child failed.
    #[error("{invocation}: {source}")]
    Wait { invocation: String, source: io::Error },

    /// The program exited unsuccessfully.
    #[error("{invocation}: {status}: {output}")]
    Exit {
        invocation: String,
        status: ExitStatus,
        output: String,
    },

    /// The token was cancelled; the child has been killed.
    #[error("context cancelled")]
    Canceled,
}

impl ExecError {
    /// Maps into a Configure-phase error for `step`; cancellation stays cancellation.
    pub fn into_configuration(self, step: &str) -> ComponentError {
        match self {
            ExecError::Canceled => ComponentError::Canceled,
            other => ComponentError::configuration(step, other),
        }
    }

    /// Maps into a Start-phase error; cancellation stays cancellation.
    pub fn into_start(self) -> ComponentError {
        match self {
            ExecError::Canceled => ComponentError::Canceled,
            ExecError::Exit {
                invocation,
                status,
                output,
            } => ComponentError::Start {
                reason: format!("{invocation}: {status}"),
                output,
            },
            other => ComponentError::Start {
                reason: other.to_string(),
                output: String::new(),
            },
        }
    }
}

/// Runs `inv` to completion and returns its captured output.
///
/// Returns [`ExecError::Canceled`] if `token` is cancelled while the child
/// runs, or if the child fails after cancellation was requested.
pub async fn output(inv: &Invocation, token: &CancellationToken) -> Result<String, ExecError> {
    if token.is_cancelled() {
        return Err(ExecError::Canceled);
    }

    let mut child = inv.spawn()?;
    let mut captured = capture(&mut child);

    let waited = tokio::select! {
        status = child.wait() => Some(status),
        _ = token.cancelled() => None,
    };
    let Some(status) = waited else {
        let _ = child.kill().await;
        captured.abort();
        return Err(ExecError::Canceled);
    };
    let status = status.map_err(|source| ExecError::Wait {
        invocation: inv.to_string(),
        source,
    })?;

    // A forked grandchild may keep the pipes open after the child exits.
    let output = match tokio::time::timeout(CAPTURE_DRAIN, &mut captured).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            captured.abort();
            String::new()
        }
    };
    if status.success() {
        Ok(output)
    } else if token.is_cancelled() {
        Err(ExecError::Canceled)
    } else {
        Err(ExecError::Exit {
            invocation: inv.to_string(),
            status,
            output,
        })
    }
}

/// Runs a long-lived daemon until it exits or `token` is cancelled.
///
/// A zero exit is a clean stop; cancellation yields [`ExecError::Canceled`].
pub async fn run_until_exit(inv: &Invocation, token: &CancellationToken) -> Result<(), ExecError> {
    output(inv, token).await.map(drop)
}

/// Merges the child's piped stdout and stderr into one bounded buffer.
fn capture(child: &mut Child) -> JoinHandle<String> {
    let mut sources = Vec::with_capacity(2);
    if let Some(out) = child.stdout.take() {
        sources.push(ReaderStream::new(out).boxed());
    }
    if let Some(err) = child.stderr.take() {
        sources.push(ReaderStream::new(err).boxed());
    }

    tokio::spawn(async move {
        let mut merged = stream::select_all(sources);
        let mut tail = OutputTail::default();
        while let Some(chunk) = merged.next().await {
            match chunk {
                Ok(bytes) => tail.push(&bytes),
                Err(_) => break,
            }
        }
        tail.into_string()
    })
}

/// Keeps the last [`OUTPUT_TAIL_LIMIT`] bytes written to it.
#[derive(Default)]
struct OutputTail {
    buf: Vec<u8>,
}

impl OutputTail {
    fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > OUTPUT_TAIL_LIMIT {
            let excess = self.buf.len() - OUTPUT_TAIL_LIMIT;
            self.buf.drain(..excess);
        }
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.buf).trim_end().to_string()
    }
}
