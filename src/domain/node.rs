// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node view projected from terraform state

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Attribute map of a network entry, without its `name`
pub type LinkAttributes = serde_json::Map<String, serde_json::Value>;

/// Cloud image metadata
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_distro: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_user: Option<String>,

    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Read-only projection of a provisioned compute instance
///
/// Built fresh from state on every query, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformInstance {
    pub name: String,
    pub instance_id: String,
    pub status: String,
    pub image: Image,
    pub flavor_name: String,

    /// Network name → link attributes (`fixed_ip_v4`, `mac`, ...)
    #[serde(default)]
    pub links: BTreeMap<String, LinkAttributes>,
}

impl TerraformInstance {
    pub fn new(
        name: impl Into<String>,
        instance_id: impl Into<String>,
        status: impl Into<String>,
        image: Image,
        flavor_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instance_id: instance_id.into(),
            status: status.into(),
            image,
            flavor_name: flavor_name.into(),
            links: BTreeMap::new(),
        }
    }

    pub fn add_link(&mut self, network: impl Into<String>, attributes: LinkAttributes) {
        self.links.insert(network.into(), attributes);
    }

    pub fn link(&self, network: &str) -> Option<&LinkAttributes> {
        self.links.get(network)
    }
}
