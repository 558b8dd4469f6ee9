// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Domain Models
//!
//! Value objects and entities shared by the orchestration layers.
//!
//! # Value Objects with Invariants
//!
//! - [`StackName`] - stack identity, safe as directory, workspace and prefix
//! - [`HardwareUsage`], [`QuotaSet`] - capacity accounting
//!
//! # Entities
//!
//! - [`TopologyInstance`] - desired infrastructure, enriched after provisioning
//! - [`TerraformInstance`] - node view projected from terraform state

pub mod node;
pub mod quota;
pub mod stack_name;
pub mod topology;

pub use node::{Image, LinkAttributes, TerraformInstance};
pub use quota::{
    HardwareUsage, KeyPair, KeyPairType, ProjectLimits, Quota, QuotaResource, QuotaSet,
    QuotaViolation,
};
pub use stack_name::{StackName, StackNameError};
pub use topology::{Link, TopologyInstance, TopologyNode};
