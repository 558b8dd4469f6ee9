// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource index and topology enrichment

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use tracing::{debug, warn};

use super::{Attributes, Resource};
use crate::domain::{Image, LinkAttributes, StackName, TerraformInstance, TopologyInstance};
use crate::errors::{TerraformError, TerraformResult};

/// Managed resources of one stack, keyed by resource name
#[derive(Debug, Clone, Default)]
pub struct ResourceIndex {
    resources: HashMap<String, Resource>,
}

impl ResourceIndex {
    /// Index `resources` by name; on duplicate names the later entry wins
    pub fn new(resources: impl IntoIterator<Item = Resource>) -> Self {
        Self {
            resources: resources
                .into_iter()
                .map(|res| (res.name.clone(), res))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Resource `{stack}-{logical_name}`
    ///
    /// # Errors
    /// - `Reconciliation` if the state has no such resource
    pub fn resolve(&self, stack: &StackName, logical_name: &str) -> TerraformResult<&Resource> {
        let key = stack.resource_key(logical_name);
        self.resources.get(&key).ok_or_else(|| {
            warn!(stack = %stack, key = %key, "Resource missing from terraform state");
            TerraformError::Reconciliation(format!(
                "Resource {} not found in state of stack {}",
                key, stack
            ))
        })
    }

    /// Attributes of instance 0 of `{stack}-{logical_name}`
    pub fn attributes(&self, stack: &StackName, logical_name: &str) -> TerraformResult<&Attributes> {
        self.resolve(stack, logical_name)?.first_attributes()
    }

    /// Cloud ID of `{stack}-{node_name}`
    pub fn resource_id(&self, stack: &StackName, node_name: &str) -> TerraformResult<String> {
        let key = stack.resource_key(node_name);
        let attributes = self.attributes(stack, node_name)?;
        Ok(string_attribute(attributes, "id", &key)?.to_string())
    }

    /// `power_state` of node `{stack}-{node_name}`
    pub fn node_status(&self, stack: &StackName, node_name: &str) -> TerraformResult<String> {
        let key = stack.resource_key(node_name);
        let attributes = self.attributes(stack, node_name)?;
        Ok(string_attribute(attributes, "power_state", &key)?.to_string())
    }

    /// Power state of every compute instance of the stack, by node name
    ///
    /// Compute instances are the resources carrying a `power_state`.
    pub fn node_statuses(&self, stack: &StackName) -> BTreeMap<String, String> {
        let prefix = stack.resource_key("");
        self.resources
            .iter()
            .filter_map(|(name, res)| {
                let node = name.strip_prefix(&prefix)?;
                let status = res
                    .instances
                    .first()?
                    .attributes
                    .get("power_state")?
                    .as_str()?;
                Some((node.to_string(), status.to_string()))
            })
            .collect()
    }
}

fn string_attribute<'a>(
    attributes: &'a Attributes,
    key: &str,
    resource: &str,
) -> TerraformResult<&'a str> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            TerraformError::Reconciliation(format!(
                "Resource {} has no string attribute {}",
                resource, key
            ))
        })
}

/// First entry of `all_fixed_ips`
pub fn first_fixed_ip(attributes: &Attributes, resource: &str) -> TerraformResult<IpAddr> {
    let raw = attributes
        .get("all_fixed_ips")
        .and_then(Value::as_array)
        .and_then(|ips| ips.first())
        .and_then(Value::as_str)
        .ok_or_else(|| {
            TerraformError::Reconciliation(format!("Resource {} has no fixed IP address", resource))
        })?;

    raw.parse().map_err(|_| {
        TerraformError::Reconciliation(format!(
            "Resource {} has an invalid fixed IP address: {}",
            resource, raw
        ))
    })
}

/// Enrich `topology` with the addresses terraform assigned
///
/// Sets the topology name to the stack name, the topology address to the
/// first fixed IP of the management-out port, and IP/MAC of every link.
/// Enriching an already enriched topology against unchanged state yields the
/// same values.
///
/// # Errors
/// - `Reconciliation` if a port is missing from state or lacks IP/MAC
pub fn enrich(
    stack: &StackName,
    mut topology: TopologyInstance,
    index: &ResourceIndex,
    man_out_port: &str,
) -> TerraformResult<TopologyInstance> {
    topology.name = stack.to_string();

    let man_out_key = stack.resource_key(man_out_port);
    let man_out = index.attributes(stack, man_out_port)?;
    topology.ip = Some(first_fixed_ip(man_out, &man_out_key)?);

    for link in topology.links_mut() {
        let key = stack.resource_key(&link.name);
        let attributes = index.attributes(stack, &link.name)?;

        link.ip = Some(first_fixed_ip(attributes, &key)?);
        link.mac = Some(string_attribute(attributes, "mac_address", &key)?.to_string());
    }

    debug!(
        stack = %stack,
        links = topology.links().len(),
        "Enriched topology instance from terraform state"
    );
    Ok(topology)
}

/// Project the state of node `{stack}-{node_name}` into a [`TerraformInstance`]
///
/// `image` is looked up by the caller from the node's `image_id`.
pub fn node_view(
    stack: &StackName,
    node_name: &str,
    index: &ResourceIndex,
    image: Image,
) -> TerraformResult<TerraformInstance> {
    let key = stack.resource_key(node_name);
    let attributes = index.attributes(stack, node_name)?;

    let mut instance = TerraformInstance::new(
        node_name,
        string_attribute(attributes, "id", &key)?,
        string_attribute(attributes, "power_state", &key)?,
        image,
        string_attribute(attributes, "flavor_name", &key)?,
    );

    let networks = attributes
        .get("network")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for network in networks {
        let Some(entry) = network.as_object() else {
            continue;
        };
        let name = string_attribute(entry, "name", &key)?.to_string();
        let link: LinkAttributes = entry
            .iter()
            .filter(|(k, _)| k.as_str() != "name")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        instance.add_link(name, link);
    }

    Ok(instance)
}

/// `image_id` attribute of node `{stack}-{node_name}`
pub fn node_image_id(
    stack: &StackName,
    node_name: &str,
    index: &ResourceIndex,
) -> TerraformResult<String> {
    let key = stack.resource_key(node_name);
    let attributes = index.attributes(stack, node_name)?;
    Ok(string_attribute(attributes, "image_id", &key)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Link;
    use crate::state::{ResourceInstance, ResourceMode};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn resource(name: &str, attributes: Value) -> Resource {
        Resource {
            module: None,
            mode: ResourceMode::Managed,
            resource_type: String::new(),
            name: name.to_string(),
            provider: String::new(),
            instances: vec![ResourceInstance {
                index_key: None,
                attributes: attributes.as_object().cloned().unwrap_or_default(),
            }],
        }
    }

    fn port(name: &str, ip: &str, mac: &str) -> Resource {
        resource(name, json!({"all_fixed_ips": [ip], "mac_address": mac}))
    }

    fn stack() -> StackName {
        StackName::new("s1").unwrap()
    }

    fn topology() -> TopologyInstance {
        TopologyInstance::new("demo").with_link(Link::new("eth0", "server", "switch"))
    }

    #[test]
    fn test_enrich_link_from_state() {
        let index = ResourceIndex::new(vec![
            port("s1-eth0", "10.0.0.5", "AA:BB"),
            port("s1-man-out-port", "192.168.0.10", "CC:DD"),
        ]);

        let enriched = enrich(&stack(), topology(), &index, "man-out-port").unwrap();

        assert_eq!(enriched.name, "s1");
        assert_eq!(enriched.ip, Some("192.168.0.10".parse().unwrap()));
        let link = enriched.link("eth0").unwrap();
        assert_eq!(link.ip, Some("10.0.0.5".parse().unwrap()));
        assert_eq!(link.mac.as_deref(), Some("AA:BB"));
        assert!(enriched.is_enriched());
    }

    #[test]
    fn test_enrich_uses_first_ip_only() {
        let index = ResourceIndex::new(vec![
            resource(
                "s1-eth0",
                json!({"all_fixed_ips": ["10.0.0.5", "fd00::5"], "mac_address": "AA:BB"}),
            ),
            port("s1-man-out-port", "192.168.0.10", "CC:DD"),
        ]);

        let enriched = enrich(&stack(), topology(), &index, "man-out-port").unwrap();
        assert_eq!(
            enriched.link("eth0").unwrap().ip,
            Some("10.0.0.5".parse().unwrap())
        );
    }

    #[test]
    fn test_enrich_missing_man_out_port() {
        let index = ResourceIndex::new(vec![port("s1-eth0", "10.0.0.5", "AA:BB")]);
        let err = enrich(&stack(), topology(), &index, "man-out-port").unwrap_err();
        match err {
            TerraformError::Reconciliation(msg) => assert!(msg.contains("s1-man-out-port")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_enrich_missing_link_resource() {
        let index = ResourceIndex::new(vec![port("s1-man-out-port", "192.168.0.10", "CC:DD")]);
        let err = enrich(&stack(), topology(), &index, "man-out-port").unwrap_err();
        assert!(matches!(err, TerraformError::Reconciliation(_)));
    }

    #[test]
    fn test_enrich_rejects_other_stacks_resources() {
        let index = ResourceIndex::new(vec![
            port("s2-eth0", "10.0.0.5", "AA:BB"),
            port("s1-man-out-port", "192.168.0.10", "CC:DD"),
        ]);
        assert!(enrich(&stack(), topology(), &index, "man-out-port").is_err());
    }

    #[test]
    fn test_enrich_invalid_ip() {
        let index = ResourceIndex::new(vec![port("s1-man-out-port", "not-an-ip", "CC:DD")]);
        let err = enrich(&stack(), topology(), &index, "man-out-port").unwrap_err();
        match err {
            TerraformError::Reconciliation(msg) => assert!(msg.contains("not-an-ip")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_node_view() {
        let index = ResourceIndex::new(vec![resource(
            "s1-server",
            json!({
                "id": "f3b1",
                "power_state": "active",
                "image_id": "img-1",
                "flavor_name": "standard.small",
                "network": [
                    {"name": "switch", "fixed_ip_v4": "10.0.0.5", "mac": "AA:BB"},
                    {"name": "man-net", "fixed_ip_v4": "192.168.0.3", "mac": "CC:DD"}
                ]
            }),
        )]);

        assert_eq!(node_image_id(&stack(), "server", &index).unwrap(), "img-1");

        let image = Image {
            id: "img-1".into(),
            name: "debian-12".into(),
            ..Default::default()
        };
        let node = node_view(&stack(), "server", &index, image.clone()).unwrap();

        assert_eq!(node.name, "server");
        assert_eq!(node.instance_id, "f3b1");
        assert_eq!(node.status, "active");
        assert_eq!(node.flavor_name, "standard.small");
        assert_eq!(node.image, image);
        assert_eq!(node.links.len(), 2);

        let switch = node.link("switch").unwrap();
        assert_eq!(switch.get("fixed_ip_v4"), Some(&json!("10.0.0.5")));
        assert!(!switch.contains_key("name"));
    }

    #[test]
    fn test_resource_id_and_statuses() {
        let index = ResourceIndex::new(vec![
            resource("s1-server", json!({"id": "f3b1", "power_state": "active"})),
            resource("s1-client", json!({"id": "a9c2", "power_state": "shutoff"})),
            port("s1-eth0", "10.0.0.5", "AA:BB"),
        ]);

        assert_eq!(index.resource_id(&stack(), "client").unwrap(), "a9c2");
        assert_eq!(index.node_status(&stack(), "client").unwrap(), "shutoff");
        assert!(index.node_status(&stack(), "eth0").is_err());
        let statuses = index.node_statuses(&stack());
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses["server"], "active");
        assert_eq!(statuses["client"], "shutoff");
    }

    proptest! {
        #[test]
        fn prop_enrich_is_idempotent(
            octets in proptest::collection::vec((any::<u8>(), any::<u8>()), 1..6),
            mac in "[0-9A-F]{2}(:[0-9A-F]{2}){5}",
        ) {
            let mut resources = vec![port("s1-man-out-port", "192.168.0.1", "00:00:00:00:00:01")];
            let mut topology = TopologyInstance::new("demo");
            for (i, (a, b)) in octets.iter().enumerate() {
                let name = format!("eth{}", i);
                resources.push(port(&format!("s1-{}", name), &format!("10.{}.{}.1", a, b), &mac));
                topology = topology.with_link(Link::new(name, "server", "switch"));
            }
            let index = ResourceIndex::new(resources);

            let once = enrich(&stack(), topology, &index, "man-out-port").unwrap();
            let twice = enrich(&stack(), once.clone(), &index, "man-out-port").unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
