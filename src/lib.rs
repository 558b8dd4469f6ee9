// Copyright (c) 2025 - Cowboy AI, Inc.
//! Terraform stack driver
//!
//! Provisions and tears down cloud infrastructure ("stacks") described by a
//! topology instance, driving the `terraform` binary as a subprocess and a
//! provider-specific [`CloudClient`].
//!
//! # Architecture
//!
//! ```text
//! TerraformClient<C: CloudClient>
//!     ↓
//! TerraformManager ── StackState lifecycle
//!     ├── StackDirectory      {stacks_root}/{stack}/
//!     ├── TerraformBackend    backend.tf (local | pg)
//!     ├── TerraformExecutor   terraform init / workspace / apply / destroy
//!     └── state               terraform.tfstate → ResourceIndex → enrich
//! ```
//!
//! Each stack owns a working directory and a terraform workspace of the same
//! name; every resource of its template is named `{stack}-{logical_name}`.

pub mod backend;
pub mod client;
pub mod cloud;
pub mod config;
pub mod domain;
pub mod errors;
pub mod manager;
pub mod process;
pub mod stack_dir;
pub mod state;
pub mod state_machine;
pub mod telemetry;

pub use backend::{BackendKind, TerraformBackend};
pub use client::TerraformClient;
pub use cloud::{CloudClient, CloudError};
pub use config::{DatabaseConfig, TerraformConfig};
pub use domain::{
    HardwareUsage, Image, KeyPair, KeyPairType, Link, ProjectLimits, Quota, QuotaSet, StackName,
    TerraformInstance, TopologyInstance, TopologyNode,
};
pub use errors::{TerraformError, TerraformResult};
pub use manager::{OperationKind, StackOperation, StackOutcome, TerraformManager};
pub use process::{CliExecutor, OutputLine, OutputStream, ProcessHandle, ProcessOutput, TerraformExecutor};
pub use stack_dir::StackDirectory;
pub use state::{Resource, ResourceIndex, TerraformState};
pub use state_machine::{StackInput, StackState};
