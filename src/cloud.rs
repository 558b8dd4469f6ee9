// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cloud Client Collaborator
//!
//! The driver never talks to a cloud API directly. Everything
//! provider-specific (template rendering, the terraform provider block,
//! images, key pairs, quotas, consoles, power operations) goes through
//! [`CloudClient`]. One implementation exists per provider; which one is used
//! is decided by the caller when constructing the driver.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    HardwareUsage, Image, KeyPair, KeyPairType, ProjectLimits, QuotaSet, TopologyInstance,
};

/// Status a provider reports for a running instance
pub const DEFAULT_ACTIVE_STATUS: &str = "active";

/// Errors reported by a cloud client implementation
#[derive(Debug, Error)]
pub enum CloudError {
    /// Template could not be rendered for the topology
    #[error("Template error: {0}")]
    Template(String),

    /// Requested object does not exist in the cloud
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cloud API rejected or failed the request
    #[error("Cloud API error: {0}")]
    Api(String),
}

/// Provider-specific collaborator of the driver
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Render the terraform template of `topology`
    ///
    /// Every resource in the template must be named
    /// `{resource_prefix}-{logical_name}`.
    async fn create_terraform_template(
        &self,
        topology: &TopologyInstance,
        key_pair_name_ssh: &str,
        key_pair_name_cert: Option<&str>,
        resource_prefix: &str,
    ) -> Result<String, CloudError>;

    /// Terraform provider block written next to the template
    fn get_terraform_provider(&self) -> String;

    async fn get_image(&self, image_id: &str) -> Result<Image, CloudError>;

    async fn create_keypair(
        &self,
        name: &str,
        public_key: Option<&str>,
        key_type: KeyPairType,
    ) -> Result<KeyPair, CloudError>;

    async fn get_keypair(&self, name: &str) -> Result<KeyPair, CloudError>;

    async fn delete_keypair(&self, name: &str) -> Result<(), CloudError>;

    async fn get_quota_set(&self) -> Result<QuotaSet, CloudError>;

    async fn get_project_name(&self) -> Result<String, CloudError>;

    async fn get_project_limits(&self) -> Result<ProjectLimits, CloudError>;

    /// Hardware a single stack of `topology` would consume
    async fn get_hardware_usage(
        &self,
        topology: &TopologyInstance,
    ) -> Result<HardwareUsage, CloudError>;

    /// Issue a console URL (`novnc`, `spice-html5`, `serial`, ...)
    async fn get_console_url(
        &self,
        resource_id: &str,
        console_type: &str,
    ) -> Result<String, CloudError>;

    async fn resume_node(&self, resource_id: &str) -> Result<(), CloudError>;

    async fn start_node(&self, resource_id: &str) -> Result<(), CloudError>;

    async fn reboot_node(&self, resource_id: &str) -> Result<(), CloudError>;

    /// Power state reported by terraform for a running instance
    fn active_status(&self) -> &str {
        DEFAULT_ACTIVE_STATUS
    }
}
