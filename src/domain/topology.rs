// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Instance
//!
//! Runtime model of the desired infrastructure of one stack. The topology
//! definition parser lives elsewhere; this type carries only what template
//! rendering, hardware accounting and state enrichment need.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A compute node of the topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    /// Logical node name (resource suffix in the rendered template)
    pub name: String,

    /// Image the node boots from
    pub image: String,

    /// Flavor (hardware profile) name
    pub flavor: String,
}

/// A network port connecting a node to a network
///
/// `ip` and `mac` are unknown until the stack is provisioned and the
/// topology has been enriched from terraform state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Logical port name (resource suffix in the rendered template)
    pub name: String,

    /// Node the port belongs to
    pub node: String,

    /// Network the port is attached to
    pub network: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

impl Link {
    pub fn new(
        name: impl Into<String>,
        node: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            network: network.into(),
            ip: None,
            mac: None,
        }
    }
}

/// Desired infrastructure of a stack
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopologyInstance {
    /// Stack name once enriched, topology name before
    pub name: String,

    /// Address of the management-out port, set by enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,

    #[serde(default)]
    pub nodes: Vec<TopologyNode>,

    #[serde(default)]
    pub networks: Vec<String>,

    #[serde(default)]
    pub links: Vec<Link>,
}

impl TopologyInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a node (builder style)
    pub fn with_node(
        mut self,
        name: impl Into<String>,
        image: impl Into<String>,
        flavor: impl Into<String>,
    ) -> Self {
        self.nodes.push(TopologyNode {
            name: name.into(),
            image: image.into(),
            flavor: flavor.into(),
        });
        self
    }

    /// Add a network (builder style)
    pub fn with_network(mut self, name: impl Into<String>) -> Self {
        self.networks.push(name.into());
        self
    }

    /// Add a link (builder style)
    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut [Link] {
        &mut self.links
    }

    /// Find a link by its logical name
    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.name == name)
    }

    /// Whether every link has been assigned an address
    pub fn is_enriched(&self) -> bool {
        self.ip.is_some() && self.links.iter().all(|link| link.ip.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let topology = TopologyInstance::new("demo")
            .with_node("server", "debian-12", "standard.small")
            .with_network("switch")
            .with_link(Link::new("server-switch", "server", "switch"));

        assert_eq!(topology.nodes.len(), 1);
        assert_eq!(topology.networks, vec!["switch".to_string()]);
        assert_eq!(topology.link("server-switch").unwrap().node, "server");
        assert!(topology.link("missing").is_none());
        assert!(!topology.is_enriched());
    }

    #[test]
    fn test_deserialize_without_runtime_fields() {
        let json = r#"{
            "name": "demo",
            "links": [{"name": "eth0", "node": "server", "network": "switch"}]
        }"#;
        let topology: TopologyInstance = serde_json::from_str(json).unwrap();
        assert_eq!(topology.links[0].ip, None);
        assert_eq!(topology.links[0].mac, None);
        assert!(topology.nodes.is_empty());
    }
}
