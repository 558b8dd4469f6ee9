// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for terraform stack operations

use thiserror::Error;

use crate::cloud::CloudError;
use crate::domain::StackNameError;
use crate::state_machine::TransitionError;

/// Errors that can occur while driving terraform stacks
#[derive(Debug, Error)]
pub enum TerraformError {
    /// Backend or driver configuration is missing or incomplete
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The terraform binary could not be found
    #[error("Terraform binary not found: {0}")]
    ToolNotFound(String),

    /// `terraform init` failed in the stack directory
    #[error("Terraform init failed for stack {stack}: {reason}")]
    InitFailed { stack: String, reason: String },

    /// `terraform workspace new` failed (usually because it already exists)
    #[error("Terraform workspace command failed for stack {stack}: {reason}")]
    WorkspaceFailed { stack: String, reason: String },

    /// A blocking command exited with a non-zero code
    #[error("Command `{command}` failed, return code: {}", display_code(.code))]
    ProcessFailed { command: String, code: Option<i32> },

    /// Stack directory or state does not exist
    #[error("Stack not found: {0}")]
    StackNotFound(String),

    /// Operation is not allowed in the current resource state
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Terraform state does not match the topology
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    /// Stack name cannot be used as a directory and workspace name
    #[error("Invalid stack name: {0}")]
    InvalidStackName(#[from] StackNameError),

    /// Requested stacks do not fit into the project quota
    #[error("Quota exceeded for {resource}: required {required}, available {available}")]
    QuotaExceeded {
        resource: String,
        required: f64,
        available: f64,
    },

    /// Cloud client collaborator failure
    #[error("Cloud client error: {0}")]
    Cloud(#[from] CloudError),

    /// Stack lifecycle transition rejected
    #[error("Lifecycle error: {0}")]
    Transition(#[from] TransitionError),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terraform state could not be parsed
    #[error("State parse error: {0}")]
    StateParse(#[from] serde_json::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

impl TerraformError {
    /// Whether this error means the stack does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, TerraformError::StackNotFound(_))
    }
}

/// Result type for terraform operations
pub type TerraformResult<T> = Result<T, TerraformError>;
