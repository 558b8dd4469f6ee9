// Copyright (c) 2025 - Cowboy AI, Inc.
//! Logging bootstrap
//!
//! Installs a `tracing_subscriber` formatter filtered by `RUST_LOG`.
//! `default_level` applies to everything `RUST_LOG` does not mention.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// A global level in `RUST_LOG` (e.g. `RUST_LOG=warn`) overrides
/// `default_level`.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_level: Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
