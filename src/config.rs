// Copyright (c) 2025 - Cowboy AI, Inc.
//! Driver configuration
//!
//! All paths and file names the driver uses are threaded through
//! [`TerraformConfig`]; nothing is read from module-level defaults at runtime.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::backend::BackendKind;

/// Connection parameters of a remote state backend
///
/// Expected keys: `user`, `password`, `host`, `name`.
pub type DatabaseConfig = HashMap<String, String>;

/// Configuration for the terraform driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformConfig {
    /// Root directory holding one working directory per stack
    #[serde(default = "default_stacks_dir")]
    pub stacks_dir: PathBuf,

    /// File name of the rendered template inside a stack directory
    #[serde(default = "default_template_file_name")]
    pub template_file_name: String,

    /// Terraform executable (name on PATH or absolute path)
    #[serde(default = "default_terraform_binary")]
    pub terraform_binary: PathBuf,

    /// State backend kind
    #[serde(default)]
    pub backend: BackendKind,

    /// Remote backend connection parameters
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Logical name of the management-out port of every topology
    #[serde(default = "default_man_out_port")]
    pub man_out_port: String,

    /// Capacity of the output line buffer of streaming commands
    #[serde(default = "default_output_buffer")]
    pub output_buffer: usize,
}

fn default_stacks_dir() -> PathBuf {
    PathBuf::from("/var/tmp/terraform-stacks")
}

fn default_template_file_name() -> String {
    "deploy.tf".to_string()
}

fn default_terraform_binary() -> PathBuf {
    PathBuf::from("terraform")
}

fn default_man_out_port() -> String {
    "man-out-port".to_string()
}

fn default_output_buffer() -> usize {
    256
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            stacks_dir: default_stacks_dir(),
            template_file_name: default_template_file_name(),
            terraform_binary: default_terraform_binary(),
            backend: BackendKind::default(),
            database: None,
            man_out_port: default_man_out_port(),
            output_buffer: default_output_buffer(),
        }
    }
}

impl TerraformConfig {
    /// Configuration rooted at `stacks_dir` with defaults for everything else
    pub fn with_stacks_dir(stacks_dir: impl Into<PathBuf>) -> Self {
        Self {
            stacks_dir: stacks_dir.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults. Database variables are only
    /// collected when at least one of them is set, so a partially configured
    /// remote backend is reported by the backend configurator.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("TERRAFORM_STACKS_DIR") {
            config.stacks_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("TERRAFORM_TEMPLATE_FILE") {
            config.template_file_name = name;
        }
        if let Some(binary) = lookup("TERRAFORM_BINARY") {
            config.terraform_binary = PathBuf::from(binary);
        }
        if let Some(port) = lookup("TERRAFORM_MAN_OUT_PORT") {
            config.man_out_port = port;
        }
        if let Some(buffer) = lookup("TERRAFORM_OUTPUT_BUFFER") {
            config.output_buffer = buffer
                .parse()
                .with_context(|| format!("TERRAFORM_OUTPUT_BUFFER is not a number: {buffer}"))?;
        }
        if let Some(backend) = lookup("TERRAFORM_BACKEND") {
            config.backend = match backend.as_str() {
                "local" => BackendKind::Local,
                "pg" | "postgres" => BackendKind::Postgres,
                other => bail!("Unknown TERRAFORM_BACKEND: {other}"),
            };
        }

        let database: DatabaseConfig = [
            ("user", "TERRAFORM_DB_USER"),
            ("password", "TERRAFORM_DB_PASSWORD"),
            ("host", "TERRAFORM_DB_HOST"),
            ("name", "TERRAFORM_DB_NAME"),
        ]
        .into_iter()
        .filter_map(|(key, var)| lookup(var).map(|value| (key.to_string(), value)))
        .collect();

        if !database.is_empty() {
            config.database = Some(database);
        }

        Ok(config)
    }
}
