// Copyright (c) 2025 - Cowboy AI, Inc.
//! Terraform Process Runner
//!
//! Executes the terraform binary inside a stack directory in one of two modes:
//!
//! - **run**: wait for completion, fail with `ProcessFailed` on non-zero exit
//! - **spawn**: return a [`ProcessHandle`] immediately and stream output
//!
//! # Streaming
//!
//! ```text
//! child stdout ─┐
//!               ├─→ bounded mpsc ─→ ProcessHandle (Stream<Item = OutputLine>)
//! child stderr ─┘
//! child exit   ───→ oneshot     ─→ ProcessHandle::wait()
//! ```
//!
//! The channel is bounded, so a caller that stops reading applies
//! backpressure to the child. Callers own cancellation via
//! [`ProcessHandle::kill`]; no timeouts are imposed here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{TerraformError, TerraformResult};

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// A single line of process output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub line: String,
}

impl OutputLine {
    pub fn stdout(line: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            line: line.into(),
        }
    }

    pub fn stderr(line: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stderr,
            line: line.into(),
        }
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line)
    }
}

/// Captured output of a completed command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Live handle to a spawned terraform command
///
/// The caller owns the handle and must drain it: either consume the stream,
/// or call [`wait`](Self::wait) / [`collect_output`](Self::collect_output),
/// which drain remaining output before reading the exit code.
pub struct ProcessHandle {
    id: Uuid,
    command: String,
    started_at: DateTime<Utc>,
    output: mpsc::Receiver<OutputLine>,
    exit: oneshot::Receiver<Option<i32>>,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    /// Assemble a handle from its channels
    ///
    /// `exit` receives the exit code (`None` when terminated by a signal);
    /// `kill` is signalled by [`kill`](Self::kill).
    pub fn new(
        command: impl Into<String>,
        output: mpsc::Receiver<OutputLine>,
        exit: oneshot::Receiver<Option<i32>>,
        kill: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            command: command.into(),
            started_at: Utc::now(),
            output,
            exit,
            kill,
        }
    }

    /// Handle of a process that already finished with `lines` and `code`
    pub fn completed(command: impl Into<String>, lines: Vec<OutputLine>, code: Option<i32>) -> Self {
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            // capacity covers every line
            let _ = tx.try_send(line);
        }
        let (exit_tx, exit_rx) = oneshot::channel();
        let _ = exit_tx.send(code);
        Self::new(command, rx, exit_rx, None)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Command line, e.g. `terraform apply -auto-approve -no-color`
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Next output line, `None` once both pipes are closed
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.output.recv().await
    }

    /// Request termination of the process
    ///
    /// Returns `false` if the kill was already requested or the handle cannot
    /// be killed.
    pub fn kill(&mut self) -> bool {
        match self.kill.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Drain output and return the raw exit code
    pub async fn wait_for_exit(mut self) -> Option<i32> {
        while self.output.recv().await.is_some() {}
        self.exit.await.unwrap_or(None)
    }

    /// Drain output and fail with `ProcessFailed` on non-zero exit
    pub async fn wait(self) -> TerraformResult<()> {
        let command = self.command.clone();
        match self.wait_for_exit().await {
            Some(0) => Ok(()),
            code => Err(TerraformError::ProcessFailed { command, code }),
        }
    }

    /// Collect all output lines, failing with `ProcessFailed` on non-zero exit
    pub async fn collect_output(mut self) -> TerraformResult<Vec<OutputLine>> {
        let mut lines = Vec::new();
        while let Some(line) = self.output.recv().await {
            lines.push(line);
        }
        let command = self.command.clone();
        match self.exit.await.unwrap_or(None) {
            Some(0) => Ok(lines),
            code => Err(TerraformError::ProcessFailed { command, code }),
        }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl Stream for ProcessHandle {
    type Item = OutputLine;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().output.poll_recv(cx)
    }
}

/// Executes terraform commands
///
/// Implemented by [`CliExecutor`] for the real binary; tests substitute
/// recording doubles.
#[async_trait]
pub trait TerraformExecutor: Send + Sync {
    /// Run to completion in `dir`
    ///
    /// # Errors
    /// - `ToolNotFound` if the binary does not exist
    /// - `StackNotFound` if `dir` does not exist
    /// - `ProcessFailed` on non-zero exit
    async fn run(&self, dir: &Path, args: &[&str]) -> TerraformResult<ProcessOutput>;

    /// Start in `dir` and return a streaming handle
    async fn spawn(&self, dir: &Path, args: &[&str]) -> TerraformResult<ProcessHandle>;
}

/// Executor running the terraform CLI through `tokio::process`
#[derive(Debug, Clone)]
pub struct CliExecutor {
    binary: PathBuf,
    output_buffer: usize,
}

impl CliExecutor {
    pub fn new(binary: impl Into<PathBuf>, output_buffer: usize) -> Self {
        Self {
            binary: binary.into(),
            output_buffer: output_buffer.max(1),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command_line(&self, args: &[&str]) -> String {
        let mut line = self.binary.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn command(&self, dir: &Path, args: &[&str]) -> TerraformResult<Command> {
        // spawn reports a missing cwd as NotFound too, which would be
        // indistinguishable from a missing binary
        if !dir.is_dir() {
            return Err(TerraformError::StackNotFound(dir.display().to_string()));
        }

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }

    fn spawn_error(&self, err: io::Error) -> TerraformError {
        if err.kind() == io::ErrorKind::NotFound {
            TerraformError::ToolNotFound(self.binary.display().to_string())
        } else {
            TerraformError::Io(err)
        }
    }
}

impl Default for CliExecutor {
    fn default() -> Self {
        Self::new("terraform", 256)
    }
}

#[async_trait]
impl TerraformExecutor for CliExecutor {
    async fn run(&self, dir: &Path, args: &[&str]) -> TerraformResult<ProcessOutput> {
        let command = self.command_line(args);
        debug!(command = %command, dir = %dir.display(), "Running terraform command");

        let output = self
            .command(dir, args)?
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!(
                command = %command,
                code = ?output.status.code(),
                stderr = %stderr.trim(),
                "Terraform command failed"
            );
            return Err(TerraformError::ProcessFailed {
                command,
                code: output.status.code(),
            });
        }

        Ok(ProcessOutput { stdout, stderr })
    }

    async fn spawn(&self, dir: &Path, args: &[&str]) -> TerraformResult<ProcessHandle> {
        let command = self.command_line(args);
        let mut child = self
            .command(dir, args)?
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let (tx, rx) = mpsc::channel(self.output_buffer);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, OutputStream::Stderr, tx.clone()));
        }
        drop(tx);

        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let supervised = command.clone();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Ok(()) = &mut kill_rx => {
                    info!(command = %supervised, "Killing terraform process");
                    if let Err(e) = child.start_kill() {
                        warn!(command = %supervised, "Failed to kill terraform process: {}", e);
                    }
                    child.wait().await
                }
            };

            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(command = %supervised, "Failed to wait for terraform process: {}", e);
                    None
                }
            };
            debug!(command = %supervised, ?code, "Terraform process exited");
            let _ = exit_tx.send(code);
        });

        let handle = ProcessHandle::new(command, rx, exit_rx, Some(kill_tx));
        info!(
            command = %handle.command(),
            operation_id = %handle.id(),
            dir = %dir.display(),
            "Spawned terraform process"
        );
        Ok(handle)
    }
}

async fn forward_lines<R>(reader: R, stream: OutputStream, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut forwarding = true;

    // keep reading to EOF even when nobody listens; closing the pipe early
    // would kill terraform with SIGPIPE
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(?stream, "Failed to read terraform output: {}", e);
                break;
            }
        }
        if !forwarding {
            continue;
        }

        let line = String::from_utf8_lossy(trim_line_ending(&buf)).into_owned();
        if tx.send(OutputLine { stream, line }).await.is_err() {
            debug!(?stream, "Output receiver dropped, discarding remaining output");
            forwarding = false;
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
