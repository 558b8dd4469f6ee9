// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-infrastructure-terraform
//!
//! - [`RecordingExecutor`]: records terraform argument vectors instead of
//!   running terraform; failures are injected per command
//! - [`FakeCloudClient`]: in-memory cloud with fixed images and quotas
//! - [`stack_state`]: terraform state document of a provisioned `s1` stack
//!
//! Both fakes are deterministic; nothing here touches the network.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use cim_infrastructure_terraform::cloud::{CloudClient, CloudError};
use cim_infrastructure_terraform::domain::{
    HardwareUsage, Image, KeyPair, KeyPairType, Link, ProjectLimits, Quota, QuotaSet, StackName,
    TopologyInstance,
};
use cim_infrastructure_terraform::process::{
    OutputLine, ProcessHandle, ProcessOutput, TerraformExecutor,
};
use cim_infrastructure_terraform::{TerraformClient, TerraformConfig, TerraformError, TerraformResult};

pub const STACK: &str = "s1";
pub const PROVIDER: &str = "provider \"openstack\" {}\n";

pub fn stack() -> StackName {
    StackName::new(STACK).expect("Invalid stack name in test fixture")
}

/// One recorded terraform invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub dir: PathBuf,
    pub args: Vec<String>,
}

/// Executor that records argument vectors
///
/// `init` creates the `.terraform` directory like the real binary does and
/// `state pull` prints the configured state document.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<String, i32>>,
    state: Mutex<String>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_state(state: String) -> Arc<Self> {
        let executor = Self::default();
        *executor.state.lock().unwrap() = state;
        Arc::new(executor)
    }

    /// Make `command` (arguments joined by spaces) exit with `code`
    pub fn fail(&self, command: &str, code: i32) {
        self.failures
            .lock()
            .unwrap()
            .insert(command.to_string(), code);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded argument vectors joined by spaces
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| call.args.join(" "))
            .collect()
    }

    fn record(&self, dir: &Path, args: &[&str]) -> (String, Option<i32>) {
        let command = args.join(" ");
        self.calls.lock().unwrap().push(Call {
            dir: dir.to_path_buf(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        });
        let failure = self.failures.lock().unwrap().get(&command).copied();
        (command, failure)
    }
}

#[async_trait]
impl TerraformExecutor for RecordingExecutor {
    async fn run(&self, dir: &Path, args: &[&str]) -> TerraformResult<ProcessOutput> {
        let (command, failure) = self.record(dir, args);
        if !dir.is_dir() {
            return Err(TerraformError::StackNotFound(dir.display().to_string()));
        }
        if let Some(code) = failure {
            return Err(TerraformError::ProcessFailed {
                command: format!("terraform {}", command),
                code: Some(code),
            });
        }

        match command.as_str() {
            "init" => {
                std::fs::create_dir_all(dir.join(".terraform"))?;
                Ok(ProcessOutput::default())
            }
            "state pull" => Ok(ProcessOutput {
                stdout: self.state.lock().unwrap().clone(),
                stderr: String::new(),
            }),
            _ => Ok(ProcessOutput::default()),
        }
    }

    async fn spawn(&self, dir: &Path, args: &[&str]) -> TerraformResult<ProcessHandle> {
        let (command, failure) = self.record(dir, args);
        Ok(ProcessHandle::completed(
            format!("terraform {}", command),
            vec![
                OutputLine::stdout(format!("{}: started", args[0])),
                OutputLine::stdout(format!("{}: complete", args[0])),
            ],
            Some(failure.unwrap_or(0)),
        ))
    }
}

/// In-memory cloud client
#[derive(Debug)]
pub struct FakeCloudClient {
    pub quota_set: QuotaSet,
    pub usage: HardwareUsage,
    images: HashMap<String, Image>,
    keypairs: Mutex<HashMap<String, KeyPair>>,
    power_calls: Mutex<Vec<(String, String)>>,
}

impl Default for FakeCloudClient {
    fn default() -> Self {
        let image = debian_image();
        Self {
            quota_set: QuotaSet {
                vcpu: Quota::new(20.0, 4.0),
                ram: Quota::new(50.0, 8.0),
                instances: Quota::new(10.0, 2.0),
                network: Quota::unlimited(3.0),
                subnet: Quota::unlimited(3.0),
                port: Quota::new(50.0, 10.0),
            },
            usage: HardwareUsage {
                vcpu: 2.0,
                ram: 4.0,
                instances: 2.0,
                network: 2.0,
                subnet: 2.0,
                port: 4.0,
            },
            images: HashMap::from([(image.id.clone(), image)]),
            keypairs: Mutex::new(HashMap::new()),
            power_calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCloudClient {
    /// Power operations issued, as `(operation, resource_id)`
    pub fn power_calls(&self) -> Vec<(String, String)> {
        self.power_calls.lock().unwrap().clone()
    }

    fn power(&self, operation: &str, resource_id: &str) {
        self.power_calls
            .lock()
            .unwrap()
            .push((operation.to_string(), resource_id.to_string()));
    }
}

#[async_trait]
impl CloudClient for FakeCloudClient {
    async fn create_terraform_template(
        &self,
        topology: &TopologyInstance,
        key_pair_name_ssh: &str,
        key_pair_name_cert: Option<&str>,
        resource_prefix: &str,
    ) -> Result<String, CloudError> {
        if topology.nodes.is_empty() {
            return Err(CloudError::Template("topology has no nodes".to_string()));
        }

        let mut template = String::new();
        for node in &topology.nodes {
            template.push_str(&format!(
                "resource \"openstack_compute_instance_v2\" \"{}-{}\" {{\n  image_name = \"{}\"\n  key_pair = \"{}\"\n}}\n",
                resource_prefix, node.name, node.image, key_pair_name_ssh
            ));
        }
        if let Some(cert) = key_pair_name_cert {
            template.push_str(&format!("# cert: {}\n", cert));
        }
        Ok(template)
    }

    fn get_terraform_provider(&self) -> String {
        PROVIDER.to_string()
    }

    async fn get_image(&self, image_id: &str) -> Result<Image, CloudError> {
        self.images
            .get(image_id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("image {}", image_id)))
    }

    async fn create_keypair(
        &self,
        name: &str,
        public_key: Option<&str>,
        key_type: KeyPairType,
    ) -> Result<KeyPair, CloudError> {
        let keypair = KeyPair {
            name: name.to_string(),
            public_key: public_key.unwrap_or("ssh-ed25519 AAAAgenerated").to_string(),
            private_key: public_key.is_none().then(|| "generated-private-key".to_string()),
            key_type,
        };
        self.keypairs
            .lock()
            .unwrap()
            .insert(name.to_string(), keypair.clone());
        Ok(keypair)
    }

    async fn get_keypair(&self, name: &str) -> Result<KeyPair, CloudError> {
        self.keypairs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("keypair {}", name)))
    }

    async fn delete_keypair(&self, name: &str) -> Result<(), CloudError> {
        self.keypairs
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("keypair {}", name)))
    }

    async fn get_quota_set(&self) -> Result<QuotaSet, CloudError> {
        Ok(self.quota_set)
    }

    async fn get_project_name(&self) -> Result<String, CloudError> {
        Ok("sandbox-project".to_string())
    }

    async fn get_project_limits(&self) -> Result<ProjectLimits, CloudError> {
        Ok(ProjectLimits {
            vcpu: 20.0,
            ram: 50.0,
            instances: 10.0,
            network: -1.0,
            subnet: -1.0,
            port: 50.0,
        })
    }

    async fn get_hardware_usage(
        &self,
        _topology: &TopologyInstance,
    ) -> Result<HardwareUsage, CloudError> {
        Ok(self.usage)
    }

    async fn get_console_url(
        &self,
        resource_id: &str,
        console_type: &str,
    ) -> Result<String, CloudError> {
        Ok(format!(
            "https://cloud.example.com/console/{}?type={}",
            resource_id, console_type
        ))
    }

    async fn resume_node(&self, resource_id: &str) -> Result<(), CloudError> {
        self.power("resume", resource_id);
        Ok(())
    }

    async fn start_node(&self, resource_id: &str) -> Result<(), CloudError> {
        self.power("start", resource_id);
        Ok(())
    }

    async fn reboot_node(&self, resource_id: &str) -> Result<(), CloudError> {
        self.power("reboot", resource_id);
        Ok(())
    }
}

pub fn debian_image() -> Image {
    Image {
        id: "img-1".to_string(),
        name: "debian-12".to_string(),
        os_distro: Some("debian".to_string()),
        os_type: Some("linux".to_string()),
        default_user: Some("debian".to_string()),
        properties: HashMap::new(),
    }
}

/// Topology with a server and a client on one switch
pub fn topology() -> TopologyInstance {
    TopologyInstance::new("demo")
        .with_node("server", "debian-12", "standard.small")
        .with_node("client", "debian-12", "standard.small")
        .with_network("switch")
        .with_link(Link::new("eth0", "server", "switch"))
        .with_link(Link::new("eth1", "client", "switch"))
}

/// State of stack `s1` after provisioning [`topology`]
///
/// The server is running, the client is shut off, and a data source is
/// present to check that only managed resources are reported.
pub fn stack_state() -> String {
    json!({
        "version": 4,
        "terraform_version": "1.5.7",
        "serial": 3,
        "lineage": "8d5c2a1e",
        "outputs": {},
        "resources": [
            {
                "mode": "data",
                "type": "openstack_images_image_v2",
                "name": "s1-debian-12",
                "provider": "provider[\"registry.terraform.io/terraform-provider-openstack/openstack\"]",
                "instances": [{"attributes": {"id": "img-1"}}]
            },
            {
                "mode": "managed",
                "type": "openstack_compute_instance_v2",
                "name": "s1-server",
                "provider": "provider[\"registry.terraform.io/terraform-provider-openstack/openstack\"]",
                "instances": [{
                    "attributes": {
                        "id": "f3b1c2d4",
                        "power_state": "active",
                        "image_id": "img-1",
                        "flavor_name": "standard.small",
                        "network": [
                            {"name": "switch", "fixed_ip_v4": "10.0.0.5", "mac": "AA:BB"}
                        ]
                    }
                }]
            },
            {
                "mode": "managed",
                "type": "openstack_compute_instance_v2",
                "name": "s1-client",
                "provider": "provider[\"registry.terraform.io/terraform-provider-openstack/openstack\"]",
                "instances": [{
                    "attributes": {
                        "id": "a9c2e8f0",
                        "power_state": "shutoff",
                        "image_id": "img-1",
                        "flavor_name": "standard.small",
                        "network": []
                    }
                }]
            },
            {
                "mode": "managed",
                "type": "openstack_networking_port_v2",
                "name": "s1-eth0",
                "instances": [{"attributes": {"all_fixed_ips": ["10.0.0.5"], "mac_address": "AA:BB"}}]
            },
            {
                "mode": "managed",
                "type": "openstack_networking_port_v2",
                "name": "s1-eth1",
                "instances": [{"attributes": {"all_fixed_ips": ["10.0.0.6"], "mac_address": "CC:DD"}}]
            },
            {
                "mode": "managed",
                "type": "openstack_networking_port_v2",
                "name": "s1-man-out-port",
                "instances": [{"attributes": {"all_fixed_ips": ["192.168.0.10"], "mac_address": "EE:FF"}}]
            }
        ]
    })
    .to_string()
}

/// Client over a fresh stacks root
pub struct Harness {
    pub root: TempDir,
    pub executor: Arc<RecordingExecutor>,
    pub client: TerraformClient<FakeCloudClient>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_executor(RecordingExecutor::with_state(stack_state()))
    }

    pub fn with_executor(executor: Arc<RecordingExecutor>) -> Self {
        Self::with_cloud(executor, FakeCloudClient::default())
    }

    pub fn with_cloud(executor: Arc<RecordingExecutor>, cloud: FakeCloudClient) -> Self {
        let root = tempfile::tempdir().expect("Failed to create stacks root");
        let config = TerraformConfig::with_stacks_dir(root.path());
        let client = TerraformClient::with_executor(cloud, config, executor.clone())
            .expect("Invalid test configuration");
        Self {
            root,
            executor,
            client,
        }
    }

    pub fn stack_dir(&self) -> PathBuf {
        self.root.path().join(STACK)
    }

    /// Create the directory of [`STACK`] as if it had been provisioned
    pub fn provisioned(self) -> Self {
        std::fs::create_dir_all(self.stack_dir().join(".terraform"))
            .expect("Failed to create stack directory");
        self
    }
}
