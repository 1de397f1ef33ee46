//! # genmig-cli — Genesis Migration CLI
//!
//! Provides the `genmig` command-line interface.
//!
//! ## Subcommands
//!
//! - `genmig migrate`: migrate an exported genesis file and print the
//!   canonical result.
//!
//! ```bash
//! genmig migrate exported.json \
//!     --genesis-time 2021-02-18T06:00:00Z \
//!     --chain-id cosmoshub-4 \
//!     --initial-height 5200791 > genesis.json
//! ```
//!
//! Logs go to stderr. Stdout carries nothing but the migrated genesis.

pub mod migrate;

use std::path::Path;

use anyhow::{Context, Result};

use genmig_state::MigrationConfig;

/// Load the migration configuration, falling back to defaults when no path
/// is given.
pub fn load_config(path: Option<&Path>) -> Result<MigrationConfig> {
    match path {
        Some(path) => MigrationConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(MigrationConfig::default()),
    }
}
