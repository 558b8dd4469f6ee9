// Copyright (c) 2025 - Cowboy AI, Inc.
//! Streaming stack operations
//!
//! A [`StackOperation`] pairs a running terraform command with the lifecycle
//! transition it drives. The caller drains its output and then calls
//! [`StackOperation::finish`] to feed the exit code back into the lifecycle.

use chrono::Utc;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{error, info, warn};

use crate::domain::StackName;
use crate::errors::{TerraformError, TerraformResult};
use crate::process::{OutputLine, ProcessHandle};
use crate::state_machine::{StackInput, StackState, StateMachineWithHistory, Transition};

/// Terraform command driven by a [`StackOperation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Plan,
    Apply,
    Destroy,
}

impl OperationKind {
    /// Terraform argument vector
    pub fn args(&self) -> &'static [&'static str] {
        match self {
            OperationKind::Plan => &["plan"],
            OperationKind::Apply => &["apply", "-auto-approve", "-no-color"],
            OperationKind::Destroy => &["destroy", "-auto-approve", "-no-color"],
        }
    }

    pub(crate) fn input(&self) -> StackInput {
        match self {
            OperationKind::Plan => StackInput::Plan,
            OperationKind::Apply => StackInput::Apply,
            OperationKind::Destroy => StackInput::Destroy,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Plan => write!(f, "plan"),
            OperationKind::Apply => write!(f, "apply"),
            OperationKind::Destroy => write!(f, "destroy"),
        }
    }
}

/// A running plan, apply or destroy of one stack
pub struct StackOperation {
    stack: StackName,
    kind: OperationKind,
    lifecycle: StateMachineWithHistory<StackState>,
    handle: ProcessHandle,
}

impl StackOperation {
    /// Record the start of `kind` in `lifecycle` and wrap `handle`
    ///
    /// # Errors
    /// - `Transition` if the lifecycle does not allow `kind`
    pub(crate) fn start(
        stack: StackName,
        kind: OperationKind,
        mut lifecycle: StateMachineWithHistory<StackState>,
        handle: ProcessHandle,
    ) -> TerraformResult<Self> {
        lifecycle.transition_with_history(kind.input(), Utc::now())?;
        info!(
            stack = %stack,
            operation = %kind,
            state = %lifecycle.current_state(),
            operation_id = %handle.id(),
            "Stack operation started"
        );
        Ok(Self {
            stack,
            kind,
            lifecycle,
            handle,
        })
    }

    pub fn stack(&self) -> &StackName {
        &self.stack
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Lifecycle state while the command runs
    pub fn state(&self) -> StackState {
        *self.lifecycle.current_state()
    }

    pub fn history(&self) -> &[Transition<StackState, StackInput>] {
        self.lifecycle.get_history()
    }

    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.handle.next_line().await
    }

    /// Request termination of the running command
    pub fn kill(&mut self) -> bool {
        warn!(stack = %self.stack, operation = %self.kind, "Killing stack operation");
        self.handle.kill()
    }

    /// Drain remaining output, wait for exit and advance the lifecycle
    pub async fn finish(self) -> StackOutcome {
        let Self {
            stack,
            kind,
            mut lifecycle,
            handle,
        } = self;

        let command = handle.command().to_string();
        let exit_code = handle.wait_for_exit().await;
        let succeeded = exit_code == Some(0);

        let mut warnings = Vec::new();
        // plan leaves the stack Ready either way
        if kind != OperationKind::Plan {
            let input = if succeeded {
                StackInput::OperationSucceeded
            } else {
                StackInput::OperationFailed
            };
            match lifecycle.transition_with_history(input, Utc::now()) {
                Ok(output) => {
                    if output.is_critical {
                        error!(stack = %stack, operation = %kind, ?exit_code, "{}", output.warnings.join("; "));
                    }
                    warnings = output.warnings;
                }
                Err(e) => warn!(stack = %stack, "Lifecycle not advanced: {}", e),
            }
        }

        let state = *lifecycle.current_state();
        if succeeded {
            info!(stack = %stack, operation = %kind, state = %state, "Stack operation finished");
        } else {
            warn!(stack = %stack, operation = %kind, state = %state, ?exit_code, "Stack operation failed");
        }

        StackOutcome {
            stack,
            kind,
            command,
            exit_code,
            state,
            warnings,
            history: lifecycle.history,
        }
    }
}

impl fmt::Debug for StackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackOperation")
            .field("stack", &self.stack)
            .field("kind", &self.kind)
            .field("state", self.lifecycle.current_state())
            .field("handle", &self.handle)
            .finish()
    }
}

impl Stream for StackOperation {
    type Item = OutputLine;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().handle).poll_next(cx)
    }
}

/// Result of a finished [`StackOperation`]
#[derive(Debug, Clone)]
pub struct StackOutcome {
    pub stack: StackName,
    pub kind: OperationKind,
    pub command: String,
    /// `None` when the command was terminated by a signal
    pub exit_code: Option<i32>,
    /// Lifecycle state after the command
    pub state: StackState,
    pub warnings: Vec<String>,
    pub history: Vec<Transition<StackState, StackInput>>,
}

impl StackOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// `ProcessFailed` unless the command exited with 0
    pub fn into_result(self) -> TerraformResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TerraformError::ProcessFailed {
                command: self.command,
                code: self.exit_code,
            })
        }
    }
}
