// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Directory Layout
//!
//! Every stack owns one working directory under the stacks root:
//!
//! ```text
//! {stacks_root}/{stack}/
//! ├── deploy.tf                   rendered template (name configurable)
//! ├── backend.tf                  state backend descriptor
//! ├── provider.tf                 cloud provider descriptor
//! ├── terraform.tfstate           local or pulled state
//! ├── terraform.tfstate.d/{stack}/terraform.tfstate
//! └── .terraform/                 created by `terraform init`
//! ```
//!
//! A directory under the root is what makes a stack known to `list_stacks`.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::backend::TERRAFORM_STATE_FILE_NAME;
use crate::domain::StackName;
use crate::errors::{TerraformError, TerraformResult};

pub const BACKEND_FILE_NAME: &str = "backend.tf";
pub const PROVIDER_FILE_NAME: &str = "provider.tf";
pub const WORKSPACE_STATE_DIR_NAME: &str = "terraform.tfstate.d";
pub const TERRAFORM_DATA_DIR_NAME: &str = ".terraform";

/// Owner of the stacks root and the per-stack layout
#[derive(Debug, Clone)]
pub struct StackDirectory {
    root: PathBuf,
    template_file_name: String,
}

impl StackDirectory {
    pub fn new(root: impl Into<PathBuf>, template_file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            template_file_name: template_file_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory of `stack`
    ///
    /// Deterministic and injective: stack names cannot contain separators or
    /// dots, so distinct names never resolve to the same path.
    pub fn stack_directory(&self, stack: &StackName) -> PathBuf {
        self.root.join(stack.as_str())
    }

    pub fn template_path(&self, stack: &StackName) -> PathBuf {
        self.stack_directory(stack).join(&self.template_file_name)
    }

    pub fn backend_path(&self, stack: &StackName) -> PathBuf {
        self.stack_directory(stack).join(BACKEND_FILE_NAME)
    }

    pub fn provider_path(&self, stack: &StackName) -> PathBuf {
        self.stack_directory(stack).join(PROVIDER_FILE_NAME)
    }

    /// Local state file, also the target of `terraform state pull`
    pub fn state_path(&self, stack: &StackName) -> PathBuf {
        self.stack_directory(stack).join(TERRAFORM_STATE_FILE_NAME)
    }

    /// State file terraform keeps for the stack's workspace on a local backend
    pub fn workspace_state_path(&self, stack: &StackName) -> PathBuf {
        self.stack_directory(stack)
            .join(WORKSPACE_STATE_DIR_NAME)
            .join(stack.as_str())
            .join(TERRAFORM_STATE_FILE_NAME)
    }

    pub async fn exists(&self, stack: &StackName) -> bool {
        is_dir(&self.stack_directory(stack)).await
    }

    /// Whether `terraform init` has already run in the stack directory
    pub async fn is_initialized(&self, stack: &StackName) -> bool {
        is_dir(&self.stack_directory(stack).join(TERRAFORM_DATA_DIR_NAME)).await
    }

    /// Create the stacks root if needed
    pub async fn ensure_root(&self) -> TerraformResult<()> {
        ensure_directory(&self.root).await
    }

    /// Names of the immediate child directories of the root, sorted
    pub async fn list(&self) -> TerraformResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove the stack's working directory
    ///
    /// # Errors
    /// - `StackNotFound` if the directory was never created
    pub async fn remove(&self, stack: &StackName) -> TerraformResult<()> {
        remove_directory(&self.stack_directory(stack)).await
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Create `path` and all missing parents; succeeds if it already exists
pub async fn ensure_directory(path: &Path) -> TerraformResult<()> {
    fs::create_dir_all(path).await?;
    Ok(())
}

/// Write `content` to `path`, replacing any previous content
pub async fn write_file(path: &Path, content: &str) -> TerraformResult<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;
    debug!(path = %path.display(), bytes = content.len(), "Wrote stack file");
    Ok(())
}

/// Recursively delete `path`
///
/// # Errors
/// - `StackNotFound` if `path` does not exist
/// - `Io` for any other failure
pub async fn remove_directory(path: &Path) -> TerraformResult<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(TerraformError::StackNotFound(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}
