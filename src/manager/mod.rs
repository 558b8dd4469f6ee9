// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Lifecycle Orchestration
//!
//! [`TerraformManager`] drives terraform through the lifecycle of a stack and
//! answers introspection queries from the state terraform persists.
//!
//! # Flow
//!
//! ```text
//! create_stack
//!     ↓ CloudClient::create_terraform_template
//! {stacks_root}/{stack}/ (backend.tf, provider.tf, template)
//!     ↓ terraform init
//!     ↓ terraform workspace new {stack}
//!     ↓ terraform plan | terraform apply -auto-approve -no-color
//! StackOperation (streaming)
//! ```
//!
//! Lifecycle transitions are validated by [`StackState`]; the manager keeps
//! no state between calls, so concurrent operations on one stack must be
//! serialized by the caller.

pub mod operation;

pub use operation::{OperationKind, StackOperation, StackOutcome};

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::backend::TerraformBackend;
use crate::cloud::CloudClient;
use crate::config::TerraformConfig;
use crate::domain::{StackName, TerraformInstance, TopologyInstance};
use crate::errors::{TerraformError, TerraformResult};
use crate::process::{CliExecutor, TerraformExecutor};
use crate::stack_dir::{ensure_directory, write_file, StackDirectory};
use crate::state::{self, Resource, ResourceIndex, TerraformState};
use crate::state_machine::{StackInput, StackState, StateMachine, StateMachineWithHistory};

/// How a stack's workspace is set up after `terraform init`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkspaceMode {
    /// `workspace new`; failure is `WorkspaceFailed`
    Create,
    /// `workspace new`, falling back to `workspace select`
    CreateOrSelect,
}

/// Key pairs injected into a rendered template
#[derive(Debug, Clone, Copy)]
struct KeyPairNames<'a> {
    ssh: &'a str,
    cert: Option<&'a str>,
}

/// Orchestrates terraform for every stack under one stacks root
pub struct TerraformManager {
    config: TerraformConfig,
    stacks: StackDirectory,
    backend: TerraformBackend,
    executor: Arc<dyn TerraformExecutor>,
}

impl TerraformManager {
    /// Create a manager running terraform through `executor`
    ///
    /// # Errors
    /// - `Configuration` if the configured backend is incomplete
    pub fn new(
        config: TerraformConfig,
        executor: Arc<dyn TerraformExecutor>,
    ) -> TerraformResult<Self> {
        let backend = TerraformBackend::new(config.backend, config.database.as_ref())?;
        let stacks = StackDirectory::new(&config.stacks_dir, &config.template_file_name);
        info!(
            stacks_dir = %config.stacks_dir.display(),
            backend = %backend.kind(),
            "Terraform manager configured"
        );
        Ok(Self {
            config,
            stacks,
            backend,
            executor,
        })
    }

    /// Create a manager running the configured terraform binary
    pub fn from_config(config: TerraformConfig) -> TerraformResult<Self> {
        let executor = CliExecutor::new(&config.terraform_binary, config.output_buffer);
        Self::new(config, Arc::new(executor))
    }

    pub fn config(&self) -> &TerraformConfig {
        &self.config
    }

    pub fn stacks(&self) -> &StackDirectory {
        &self.stacks
    }

    pub fn backend(&self) -> &TerraformBackend {
        &self.backend
    }

    /// Provision a stack from `topology`
    ///
    /// Renders the template, materializes the stack directory, initializes
    /// terraform and creates the stack's workspace, then starts `plan`
    /// (`dry_run`) or `apply`.
    ///
    /// # Errors
    /// - `InitFailed` if `terraform init` fails
    /// - `WorkspaceFailed` if the workspace already exists; recover with
    ///   [`apply_stack`](Self::apply_stack)
    /// - `Cloud` if the template cannot be rendered
    #[instrument(skip(self, cloud, topology, key_pair_name_cert), fields(stack = %stack))]
    pub async fn create_stack(
        &self,
        cloud: &dyn CloudClient,
        topology: &TopologyInstance,
        dry_run: bool,
        stack: &StackName,
        key_pair_name_ssh: &str,
        key_pair_name_cert: Option<&str>,
    ) -> TerraformResult<StackOperation> {
        let keys = KeyPairNames {
            ssh: key_pair_name_ssh,
            cert: key_pair_name_cert,
        };
        self.provision(cloud, topology, dry_run, stack, keys, WorkspaceMode::Create)
            .await
    }

    /// Provision a stack, reusing its workspace if it already exists
    ///
    /// Same as [`create_stack`](Self::create_stack), but a failing
    /// `workspace new` falls back to `workspace select`. Used to re-apply a
    /// stack whose workspace outlived its directory (remote backends).
    #[instrument(skip(self, cloud, topology, key_pair_name_cert), fields(stack = %stack))]
    pub async fn apply_stack(
        &self,
        cloud: &dyn CloudClient,
        topology: &TopologyInstance,
        dry_run: bool,
        stack: &StackName,
        key_pair_name_ssh: &str,
        key_pair_name_cert: Option<&str>,
    ) -> TerraformResult<StackOperation> {
        let keys = KeyPairNames {
            ssh: key_pair_name_ssh,
            cert: key_pair_name_cert,
        };
        self.provision(cloud, topology, dry_run, stack, keys, WorkspaceMode::CreateOrSelect)
            .await
    }

    /// Start `terraform destroy` for a stack
    ///
    /// Returns `Ok(None)` without destroying anything if `terraform init`
    /// fails. The stack directory is kept; remove it with
    /// [`delete_stack_directory`](Self::delete_stack_directory).
    #[instrument(skip(self, cloud), fields(stack = %stack))]
    pub async fn delete_stack(
        &self,
        cloud: &dyn CloudClient,
        stack: &StackName,
    ) -> TerraformResult<Option<StackOperation>> {
        let mut lifecycle = self.lifecycle(stack).await;
        let dir = self.materialize(stack, cloud, None).await?;

        match self
            .initialize(stack, &dir, &mut lifecycle, WorkspaceMode::CreateOrSelect)
            .await
        {
            Ok(()) => {}
            Err(TerraformError::InitFailed { reason, .. }) => {
                warn!(stack = %stack, reason = %reason, "Skipping destroy of uninitializable stack");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        self.start(stack, &dir, OperationKind::Destroy, lifecycle)
            .await
            .map(Some)
    }

    /// Remove the stack's working directory
    ///
    /// # Errors
    /// - `StackNotFound` if the directory does not exist
    #[instrument(skip(self), fields(stack = %stack))]
    pub async fn delete_stack_directory(&self, stack: &StackName) -> TerraformResult<()> {
        self.stacks.remove(stack).await?;
        info!(stack = %stack, "Deleted stack directory");
        Ok(())
    }

    /// Names of all stacks with a working directory
    pub async fn list_stacks(&self) -> TerraformResult<Vec<String>> {
        self.stacks.list().await
    }

    /// Managed resources terraform recorded for the stack
    ///
    /// Initializes the stack directory if needed and selects the stack's
    /// workspace before pulling state.
    ///
    /// # Errors
    /// - `StackNotFound` if the stack has no working directory
    #[instrument(skip(self), fields(stack = %stack))]
    pub async fn list_stack_resources(&self, stack: &StackName) -> TerraformResult<Vec<Resource>> {
        let dir = self.existing_directory(stack).await?;

        if self.stacks.is_initialized(stack).await {
            self.select_workspace(stack, &dir).await?;
        } else {
            let mut lifecycle = StateMachineWithHistory::new(StackState::Ready);
            self.initialize(stack, &dir, &mut lifecycle, WorkspaceMode::CreateOrSelect)
                .await?;
        }

        let resources = self.pull(stack, &dir).await?.into_managed_resources();
        debug!(stack = %stack, count = resources.len(), "Listed stack resources");
        Ok(resources)
    }

    /// Select the stack's workspace
    #[instrument(skip(self), fields(stack = %stack))]
    pub async fn switch_workspace(&self, stack: &StackName) -> TerraformResult<()> {
        let dir = self.existing_directory(stack).await?;
        self.select_workspace(stack, &dir).await
    }

    /// Pull the stack's state into `{stack_dir}/terraform.tfstate` and parse it
    ///
    /// Runs against the currently selected workspace.
    #[instrument(skip(self), fields(stack = %stack))]
    pub async fn pull_state(&self, stack: &StackName) -> TerraformResult<TerraformState> {
        let dir = self.existing_directory(stack).await?;
        self.pull(stack, &dir).await
    }

    /// Index of the stack's managed resources
    pub async fn resource_index(&self, stack: &StackName) -> TerraformResult<ResourceIndex> {
        Ok(ResourceIndex::new(self.list_stack_resources(stack).await?))
    }

    /// Terraform view of node `node_name`
    ///
    /// The node's image is fetched from the cloud by its `image_id`.
    #[instrument(skip(self, cloud), fields(stack = %stack))]
    pub async fn get_node(
        &self,
        cloud: &dyn CloudClient,
        stack: &StackName,
        node_name: &str,
    ) -> TerraformResult<TerraformInstance> {
        let index = self.resource_index(stack).await?;
        let image_id = state::node_image_id(stack, node_name, &index)?;
        let image = cloud.get_image(&image_id).await?;
        state::node_view(stack, node_name, &index, image)
    }

    /// Cloud ID of node `node_name`
    pub async fn get_resource_id(
        &self,
        stack: &StackName,
        node_name: &str,
    ) -> TerraformResult<String> {
        self.resource_index(stack)
            .await?
            .resource_id(stack, node_name)
    }

    /// Console URL of a running node
    ///
    /// # Errors
    /// - `PreconditionFailed` if the node is not in the cloud's active status
    #[instrument(skip(self, cloud), fields(stack = %stack))]
    pub async fn get_console_url(
        &self,
        cloud: &dyn CloudClient,
        stack: &StackName,
        node_name: &str,
        console_type: &str,
    ) -> TerraformResult<String> {
        let index = self.resource_index(stack).await?;
        let status = index.node_status(stack, node_name)?;
        if status != cloud.active_status() {
            return Err(TerraformError::PreconditionFailed(format!(
                "Cannot get {} console from inactive machine",
                console_type
            )));
        }

        let resource_id = index.resource_id(stack, node_name)?;
        Ok(cloud.get_console_url(&resource_id, console_type).await?)
    }

    /// `topology` with addresses assigned by terraform
    #[instrument(skip(self, topology), fields(stack = %stack))]
    pub async fn get_enriched_topology_instance(
        &self,
        stack: &StackName,
        topology: TopologyInstance,
    ) -> TerraformResult<TopologyInstance> {
        let index = self.resource_index(stack).await?;
        state::enrich(stack, topology, &index, &self.config.man_out_port)
    }

    async fn provision(
        &self,
        cloud: &dyn CloudClient,
        topology: &TopologyInstance,
        dry_run: bool,
        stack: &StackName,
        keys: KeyPairNames<'_>,
        workspace: WorkspaceMode,
    ) -> TerraformResult<StackOperation> {
        let template = cloud
            .create_terraform_template(topology, keys.ssh, keys.cert, stack.as_str())
            .await?;

        let mut lifecycle = self.lifecycle(stack).await;
        let dir = self.materialize(stack, cloud, Some(&template)).await?;
        self.initialize(stack, &dir, &mut lifecycle, workspace)
            .await?;

        let kind = if dry_run {
            OperationKind::Plan
        } else {
            OperationKind::Apply
        };
        self.start(stack, &dir, kind, lifecycle).await
    }

    async fn lifecycle(&self, stack: &StackName) -> StateMachineWithHistory<StackState> {
        let initial = if self.stacks.exists(stack).await {
            StackState::Ready
        } else {
            StackState::Absent
        };
        StateMachineWithHistory::new(initial)
    }

    async fn existing_directory(&self, stack: &StackName) -> TerraformResult<std::path::PathBuf> {
        if !self.stacks.exists(stack).await {
            return Err(TerraformError::StackNotFound(stack.to_string()));
        }
        Ok(self.stacks.stack_directory(stack))
    }

    /// Write backend, provider and (if given) template files
    async fn materialize(
        &self,
        stack: &StackName,
        cloud: &dyn CloudClient,
        template: Option<&str>,
    ) -> TerraformResult<std::path::PathBuf> {
        let dir = self.stacks.stack_directory(stack);
        ensure_directory(&dir).await?;

        write_file(&self.stacks.backend_path(stack), self.backend.template()).await?;
        write_file(
            &self.stacks.provider_path(stack),
            &cloud.get_terraform_provider(),
        )
        .await?;
        if let Some(template) = template {
            write_file(&self.stacks.template_path(stack), template).await?;
        }

        debug!(stack = %stack, dir = %dir.display(), "Materialized stack directory");
        Ok(dir)
    }

    async fn initialize(
        &self,
        stack: &StackName,
        dir: &Path,
        lifecycle: &mut StateMachineWithHistory<StackState>,
        workspace: WorkspaceMode,
    ) -> TerraformResult<()> {
        lifecycle.transition_with_history(StackInput::Initialize, Utc::now())?;

        match self.init(stack, dir, workspace).await {
            Ok(()) => {
                lifecycle.transition_with_history(StackInput::InitSucceeded, Utc::now())?;
                info!(stack = %stack, "Stack initialized");
                Ok(())
            }
            Err(e) => {
                lifecycle.transition_with_history(StackInput::InitFailed, Utc::now())?;
                Err(e)
            }
        }
    }

    async fn init(&self, stack: &StackName, dir: &Path, workspace: WorkspaceMode) -> TerraformResult<()> {
        self.executor
            .run(dir, &["init"])
            .await
            .map_err(|e| match e {
                TerraformError::ProcessFailed { .. } => TerraformError::InitFailed {
                    stack: stack.to_string(),
                    reason: e.to_string(),
                },
                other => other,
            })?;

        let created = self
            .executor
            .run(dir, &["workspace", "new", stack.as_str()])
            .await;

        match (created, workspace) {
            (Ok(_), _) => Ok(()),
            (Err(e @ TerraformError::ProcessFailed { .. }), WorkspaceMode::Create) => {
                Err(TerraformError::WorkspaceFailed {
                    stack: stack.to_string(),
                    reason: e.to_string(),
                })
            }
            (Err(TerraformError::ProcessFailed { .. }), WorkspaceMode::CreateOrSelect) => {
                debug!(stack = %stack, "Workspace exists, selecting it");
                self.select_workspace(stack, dir).await
            }
            (Err(e), _) => Err(e),
        }
    }

    async fn select_workspace(&self, stack: &StackName, dir: &Path) -> TerraformResult<()> {
        self.executor
            .run(dir, &["workspace", "select", stack.as_str()])
            .await
            .map_err(|e| match e {
                TerraformError::ProcessFailed { .. } => TerraformError::WorkspaceFailed {
                    stack: stack.to_string(),
                    reason: e.to_string(),
                },
                other => other,
            })?;
        Ok(())
    }

    async fn pull(&self, stack: &StackName, dir: &Path) -> TerraformResult<TerraformState> {
        let output = self.executor.run(dir, &["state", "pull"]).await?;
        let path = self.stacks.state_path(stack);
        write_file(&path, &output.stdout).await?;
        TerraformState::from_file(&path).await
    }

    async fn start(
        &self,
        stack: &StackName,
        dir: &Path,
        kind: OperationKind,
        lifecycle: StateMachineWithHistory<StackState>,
    ) -> TerraformResult<StackOperation> {
        // reject before spawning so no child is left running unowned
        lifecycle.current_state().transition(&kind.input())?;

        let handle = self.executor.spawn(dir, kind.args()).await?;
        StackOperation::start(stack.clone(), kind, lifecycle, handle)
    }
}
