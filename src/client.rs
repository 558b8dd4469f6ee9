// Copyright (c) 2025 - Cowboy AI, Inc.
//! Terraform Client
//!
//! Entry point pairing a [`TerraformManager`] with the [`CloudClient`] of one
//! provider. Stack operations go through the manager; key pairs, quotas and
//! power operations go to the cloud client, with node resource IDs resolved
//! from terraform state first.
//!
//! # Example
//!
//! ```rust,ignore
//! use cim_infrastructure_terraform::{StackName, TerraformClient, TerraformConfig};
//!
//! let client = TerraformClient::new(openstack, TerraformConfig::from_env()?)?;
//! let stack = StackName::new("sandbox-42")?;
//!
//! let mut operation = client
//!     .create_stack(&topology, false, &stack, "sandbox-ssh", None)
//!     .await?;
//! while let Some(line) = operation.next_line().await {
//!     println!("{line}");
//! }
//! let outcome = operation.finish().await.into_result()?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::cloud::CloudClient;
use crate::config::TerraformConfig;
use crate::domain::{
    HardwareUsage, KeyPair, KeyPairType, ProjectLimits, QuotaSet, StackName, TerraformInstance,
    TopologyInstance,
};
use crate::errors::{TerraformError, TerraformResult};
use crate::manager::{StackOperation, TerraformManager};
use crate::process::TerraformExecutor;
use crate::state::Resource;

/// Terraform driver bound to one cloud provider
pub struct TerraformClient<C: CloudClient> {
    cloud: C,
    manager: TerraformManager,
}

impl<C: CloudClient> TerraformClient<C> {
    /// Client running the configured terraform binary
    pub fn new(cloud: C, config: TerraformConfig) -> TerraformResult<Self> {
        Ok(Self {
            cloud,
            manager: TerraformManager::from_config(config)?,
        })
    }

    /// Client running terraform through `executor`
    pub fn with_executor(
        cloud: C,
        config: TerraformConfig,
        executor: Arc<dyn TerraformExecutor>,
    ) -> TerraformResult<Self> {
        Ok(Self {
            cloud,
            manager: TerraformManager::new(config, executor)?,
        })
    }

    pub fn cloud(&self) -> &C {
        &self.cloud
    }

    pub fn manager(&self) -> &TerraformManager {
        &self.manager
    }

    // Stacks

    pub async fn create_stack(
        &self,
        topology: &TopologyInstance,
        dry_run: bool,
        stack: &StackName,
        key_pair_name_ssh: &str,
        key_pair_name_cert: Option<&str>,
    ) -> TerraformResult<StackOperation> {
        self.manager
            .create_stack(
                &self.cloud,
                topology,
                dry_run,
                stack,
                key_pair_name_ssh,
                key_pair_name_cert,
            )
            .await
    }

    /// Provision a stack whose workspace may already exist
    pub async fn apply_stack(
        &self,
        topology: &TopologyInstance,
        dry_run: bool,
        stack: &StackName,
        key_pair_name_ssh: &str,
        key_pair_name_cert: Option<&str>,
    ) -> TerraformResult<StackOperation> {
        self.manager
            .apply_stack(
                &self.cloud,
                topology,
                dry_run,
                stack,
                key_pair_name_ssh,
                key_pair_name_cert,
            )
            .await
    }

    pub async fn switch_workspace(&self, stack: &StackName) -> TerraformResult<()> {
        self.manager.switch_workspace(stack).await
    }

    pub async fn delete_stack(&self, stack: &StackName) -> TerraformResult<Option<StackOperation>> {
        self.manager.delete_stack(&self.cloud, stack).await
    }

    pub async fn delete_stack_directory(&self, stack: &StackName) -> TerraformResult<()> {
        self.manager.delete_stack_directory(stack).await
    }

    pub async fn list_stacks(&self) -> TerraformResult<Vec<String>> {
        self.manager.list_stacks().await
    }

    pub async fn list_stack_resources(&self, stack: &StackName) -> TerraformResult<Vec<Resource>> {
        self.manager.list_stack_resources(stack).await
    }

    /// Power state of every node of the stack
    pub async fn get_stack_status(
        &self,
        stack: &StackName,
    ) -> TerraformResult<BTreeMap<String, String>> {
        Ok(self.manager.resource_index(stack).await?.node_statuses(stack))
    }

    pub async fn get_enriched_topology_instance(
        &self,
        stack: &StackName,
        topology: TopologyInstance,
    ) -> TerraformResult<TopologyInstance> {
        self.manager
            .get_enriched_topology_instance(stack, topology)
            .await
    }

    /// Render the template of `topology` without touching any stack
    pub async fn create_terraform_template(
        &self,
        topology: &TopologyInstance,
        key_pair_name_ssh: &str,
        key_pair_name_cert: Option<&str>,
        resource_prefix: &str,
    ) -> TerraformResult<String> {
        Ok(self
            .cloud
            .create_terraform_template(topology, key_pair_name_ssh, key_pair_name_cert, resource_prefix)
            .await?)
    }

    // Nodes

    pub async fn get_node(
        &self,
        stack: &StackName,
        node_name: &str,
    ) -> TerraformResult<TerraformInstance> {
        self.manager.get_node(&self.cloud, stack, node_name).await
    }

    pub async fn get_console_url(
        &self,
        stack: &StackName,
        node_name: &str,
        console_type: &str,
    ) -> TerraformResult<String> {
        self.manager
            .get_console_url(&self.cloud, stack, node_name, console_type)
            .await
    }

    #[instrument(skip(self), fields(stack = %stack))]
    pub async fn resume_node(&self, stack: &StackName, node_name: &str) -> TerraformResult<()> {
        let resource_id = self.manager.get_resource_id(stack, node_name).await?;
        self.cloud.resume_node(&resource_id).await?;
        info!(stack = %stack, node = node_name, "Node resumed");
        Ok(())
    }

    #[instrument(skip(self), fields(stack = %stack))]
    pub async fn start_node(&self, stack: &StackName, node_name: &str) -> TerraformResult<()> {
        let resource_id = self.manager.get_resource_id(stack, node_name).await?;
        self.cloud.start_node(&resource_id).await?;
        info!(stack = %stack, node = node_name, "Node started");
        Ok(())
    }

    #[instrument(skip(self), fields(stack = %stack))]
    pub async fn reboot_node(&self, stack: &StackName, node_name: &str) -> TerraformResult<()> {
        let resource_id = self.manager.get_resource_id(stack, node_name).await?;
        self.cloud.reboot_node(&resource_id).await?;
        info!(stack = %stack, node = node_name, "Node rebooted");
        Ok(())
    }

    // Key pairs

    pub async fn create_keypair(
        &self,
        name: &str,
        public_key: Option<&str>,
        key_type: KeyPairType,
    ) -> TerraformResult<KeyPair> {
        Ok(self.cloud.create_keypair(name, public_key, key_type).await?)
    }

    pub async fn get_keypair(&self, name: &str) -> TerraformResult<KeyPair> {
        Ok(self.cloud.get_keypair(name).await?)
    }

    pub async fn delete_keypair(&self, name: &str) -> TerraformResult<()> {
        Ok(self.cloud.delete_keypair(name).await?)
    }

    // Project

    pub async fn get_quota_set(&self) -> TerraformResult<QuotaSet> {
        Ok(self.cloud.get_quota_set().await?)
    }

    pub async fn get_project_name(&self) -> TerraformResult<String> {
        Ok(self.cloud.get_project_name().await?)
    }

    pub async fn get_project_limits(&self) -> TerraformResult<ProjectLimits> {
        Ok(self.cloud.get_project_limits().await?)
    }

    pub async fn get_hardware_usage(
        &self,
        topology: &TopologyInstance,
    ) -> TerraformResult<HardwareUsage> {
        Ok(self.cloud.get_hardware_usage(topology).await?)
    }

    /// Check that `count` stacks of `topology` fit into the project quota
    ///
    /// # Errors
    /// - `QuotaExceeded` naming the first resource that does not fit
    #[instrument(skip(self, topology))]
    pub async fn validate_hardware_usage_of_stacks(
        &self,
        topology: &TopologyInstance,
        count: u32,
    ) -> TerraformResult<()> {
        let required = self.cloud.get_hardware_usage(topology).await?.scaled(count);
        let quotas = self.cloud.get_quota_set().await?;

        quotas.check(&required).map_err(|violation| {
            warn!(
                resource = %violation.resource,
                required = violation.required,
                available = violation.available,
                "Stacks exceed project quota"
            );
            TerraformError::QuotaExceeded {
                resource: violation.resource.to_string(),
                required: violation.required,
                available: violation.available,
            }
        })
    }
}
