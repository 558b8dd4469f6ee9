// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Lifecycle State Machine
//!
//! # States
//!
//! - Absent: no working directory, nothing provisioned
//! - Initializing: directory materialized, `terraform init` / workspace running
//! - Ready: initialized, idle
//! - Applying: `terraform apply` running
//! - Destroying: `terraform destroy` running
//! - Failed: last init, apply or destroy failed
//!
//! # Inputs
//!
//! - Initialize: Absent | Ready | Failed → Initializing
//! - InitSucceeded / InitFailed: Initializing → Ready / Failed
//! - Plan: Ready → Ready
//! - Apply: Ready → Applying
//! - Destroy: Ready → Destroying
//! - OperationSucceeded: Applying → Ready, Destroying → Absent
//! - OperationFailed: Applying | Destroying → Failed

use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};

/// Lifecycle state of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackState {
    Absent,
    Initializing,
    Ready,
    Applying,
    Destroying,
    Failed,
}

impl StackState {
    /// A terraform command is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            StackState::Initializing | StackState::Applying | StackState::Destroying
        )
    }
}

impl fmt::Display for StackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Lifecycle input (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackInput {
    Initialize,
    InitSucceeded,
    InitFailed,
    Plan,
    Apply,
    Destroy,
    OperationSucceeded,
    OperationFailed,
}

impl fmt::Display for StackInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Transition output with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutput {
    /// Warnings generated during transition
    pub warnings: Vec<String>,

    /// Whether this transition leaves provisioned resources behind unmanaged
    pub is_critical: bool,
}

impl TransitionOutput {
    pub fn ok() -> Self {
        Self {
            warnings: Vec::new(),
            is_critical: false,
        }
    }

    pub fn with_warnings(warnings: Vec<String>) -> Self {
        Self {
            warnings,
            is_critical: false,
        }
    }

    pub fn critical(warnings: Vec<String>) -> Self {
        Self {
            warnings,
            is_critical: true,
        }
    }
}

impl StateMachine for StackState {
    type Input = StackInput;
    type Output = TransitionOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use StackInput::*;
        use StackState::*;

        match (self, input) {
            (Absent, Initialize) => Ok((Initializing, TransitionOutput::ok())),
            (Ready, Initialize) => Ok((
                Initializing,
                TransitionOutput::with_warnings(vec!["Re-initializing stack".to_string()]),
            )),
            (Failed, Initialize) => Ok((
                Initializing,
                TransitionOutput::with_warnings(vec![
                    "Re-initializing previously failed stack".to_string()
                ]),
            )),

            (Initializing, InitSucceeded) => Ok((Ready, TransitionOutput::ok())),
            (Initializing, InitFailed) => Ok((
                Failed,
                TransitionOutput::with_warnings(vec!["Terraform init failed".to_string()]),
            )),

            (Ready, Plan) => Ok((Ready, TransitionOutput::ok())),
            (Ready, Apply) => Ok((Applying, TransitionOutput::ok())),
            (Ready, Destroy) => Ok((Destroying, TransitionOutput::ok())),

            (Applying, OperationSucceeded) => Ok((Ready, TransitionOutput::ok())),
            (Applying, OperationFailed) => Ok((
                Failed,
                TransitionOutput::critical(vec![
                    "Apply failed, stack may be partially provisioned".to_string()
                ]),
            )),
            (Destroying, OperationSucceeded) => Ok((Absent, TransitionOutput::ok())),
            (Destroying, OperationFailed) => Ok((
                Failed,
                TransitionOutput::critical(vec![
                    "Destroy failed, cloud resources may remain".to_string()
                ]),
            )),

            (Initializing | Applying | Destroying, Initialize) => {
                Err(TransitionError::PreconditionFailed(format!(
                    "Stack is busy ({})",
                    self
                )))
            }
            (from, input) => Err(TransitionError::InvalidTransition {
                from: from.to_string(),
                input: input.to_string(),
            }),
        }
    }

    fn valid_inputs(&self) -> Vec<Self::Input> {
        use StackInput::*;
        use StackState::*;

        match self {
            Absent => vec![Initialize],
            Initializing => vec![InitSucceeded, InitFailed],
            Ready => vec![Initialize, Plan, Apply, Destroy],
            Applying | Destroying => vec![OperationSucceeded, OperationFailed],
            Failed => vec![Initialize],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const ALL_STATES: [StackState; 6] = [
        StackState::Absent,
        StackState::Initializing,
        StackState::Ready,
        StackState::Applying,
        StackState::Destroying,
        StackState::Failed,
    ];

    const ALL_INPUTS: [StackInput; 8] = [
        StackInput::Initialize,
        StackInput::InitSucceeded,
        StackInput::InitFailed,
        StackInput::Plan,
        StackInput::Apply,
        StackInput::Destroy,
        StackInput::OperationSucceeded,
        StackInput::OperationFailed,
    ];

    #[test_case(StackState::Absent, StackInput::Initialize, StackState::Initializing)]
    #[test_case(StackState::Initializing, StackInput::InitSucceeded, StackState::Ready)]
    #[test_case(StackState::Initializing, StackInput::InitFailed, StackState::Failed)]
    #[test_case(StackState::Ready, StackInput::Plan, StackState::Ready)]
    #[test_case(StackState::Ready, StackInput::Apply, StackState::Applying)]
    #[test_case(StackState::Ready, StackInput::Destroy, StackState::Destroying)]
    #[test_case(StackState::Applying, StackInput::OperationSucceeded, StackState::Ready)]
    #[test_case(StackState::Destroying, StackInput::OperationSucceeded, StackState::Absent)]
    #[test_case(StackState::Destroying, StackInput::OperationFailed, StackState::Failed)]
    #[test_case(StackState::Failed, StackInput::Initialize, StackState::Initializing)]
    fn test_valid_transition(from: StackState, input: StackInput, to: StackState) {
        let (next, _) = from.transition(&input).unwrap();
        assert_eq!(next, to);
    }

    #[test]
    fn test_failed_apply_is_critical() {
        let (next, output) = StackState::Applying
            .transition(&StackInput::OperationFailed)
            .unwrap();
        assert_eq!(next, StackState::Failed);
        assert!(output.is_critical);
    }

    #[test]
    fn test_cannot_apply_uninitialized_stack() {
        let err = StackState::Absent.transition(&StackInput::Apply).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: "Absent".to_string(),
                input: "Apply".to_string(),
            }
        );
    }

    #[test]
    fn test_busy_stack_cannot_reinitialize() {
        let err = StackState::Applying
            .transition(&StackInput::Initialize)
            .unwrap_err();
        assert!(matches!(err, TransitionError::PreconditionFailed(_)));
        assert!(StackState::Applying.is_busy());
        assert!(!StackState::Ready.is_busy());
    }

    #[test]
    fn test_valid_inputs_match_transition_table() {
        for state in ALL_STATES {
            let valid = state.valid_inputs();
            for input in ALL_INPUTS {
                assert_eq!(
                    valid.contains(&input),
                    state.can_transition(&input),
                    "{state} on {input}"
                );
            }
        }
    }
}
