// Copyright (c) 2025 - Cowboy AI, Inc.
//! Terraform State Reconciliation
//!
//! Parses the state terraform persists for a stack and reconciles it with the
//! topology model.
//!
//! # Architecture
//!
//! ```text
//! terraform state pull → terraform.tfstate
//!                             ↓ TerraformState::from_file
//!                      managed resources
//!                             ↓ ResourceIndex (by name)
//!          ┌──────────────────┴──────────────────┐
//!   enrich(topology)                    node_view(node, image)
//!   IPs / MACs                          TerraformInstance
//! ```
//!
//! Every lookup uses the composite key `{stack_name}-{logical_name}` and
//! reads instance 0 only; resources with several instances (`count`,
//! `for_each`) are not disambiguated.

pub mod reconcile;

pub use reconcile::{enrich, first_fixed_ip, node_image_id, node_view, ResourceIndex};

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::errors::{TerraformError, TerraformResult};

/// Resource attributes as persisted by terraform
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Whether a state entry is managed by terraform or a data lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    Managed,
    Data,
    #[serde(other)]
    Other,
}

/// One instance of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_key: Option<serde_json::Value>,

    #[serde(default)]
    pub attributes: Attributes,
}

/// A resource entry of the state file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    pub mode: ResourceMode,

    #[serde(rename = "type", default)]
    pub resource_type: String,

    pub name: String,

    #[serde(default)]
    pub provider: String,

    #[serde(default)]
    pub instances: Vec<ResourceInstance>,
}

impl Resource {
    pub fn is_managed(&self) -> bool {
        self.mode == ResourceMode::Managed
    }

    /// Attributes of instance 0
    ///
    /// # Errors
    /// - `Reconciliation` if the resource has no instances
    pub fn first_attributes(&self) -> TerraformResult<&Attributes> {
        self.instances
            .first()
            .map(|instance| &instance.attributes)
            .ok_or_else(|| {
                TerraformError::Reconciliation(format!("Resource {} has no instances", self.name))
            })
    }
}

/// Top-level terraform state document
///
/// Only the fields the driver needs are modelled; everything else in the
/// document is ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TerraformState {
    #[serde(default)]
    pub version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,

    #[serde(default)]
    pub serial: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<String>,

    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl TerraformState {
    pub fn from_json(json: &str) -> TerraformResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a state file
    ///
    /// # Errors
    /// - `StackNotFound` if the file does not exist
    /// - `StateParse` if it is not a valid state document
    pub async fn from_file(path: &Path) -> TerraformResult<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TerraformError::StackNotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        // `state pull` on an empty workspace prints nothing
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        Self::from_json(&content)
    }

    /// Resources with `mode == managed`, in state order
    pub fn managed_resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|res| res.is_managed())
    }

    pub fn into_managed_resources(self) -> Vec<Resource> {
        self.resources
            .into_iter()
            .filter(Resource::is_managed)
            .collect()
    }
}
