//! # Migrate CLI — Upgrade an exported genesis file.
//!
//! Reads a cosmoshub-3 export, runs the migration pipeline, and writes the
//! canonical cosmoshub-4 genesis to stdout followed by a newline.
//!
//! ## Usage
//!
//! ```bash
//! genmig migrate exported.json --chain-id cosmoshub-4 \
//!     --genesis-time 2021-02-18T06:00:00Z --initial-height 5200791
//!
//! # Rotate consensus keys for validators listed in keys.json:
//! genmig migrate exported.json --replacement-cons-keys keys.json
//! ```
//!
//! Nothing is written to stdout unless the whole migration succeeds.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use genmig_state::{load_replacement_keys, GenesisMigrator, MetadataOverrides, MigrationConfig};

/// Arguments for the `migrate` subcommand.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Exported genesis file to migrate.
    pub genesis_file: PathBuf,

    /// Override genesis_time with this RFC 3339 timestamp.
    #[arg(long)]
    pub genesis_time: Option<String>,

    /// Override initial_height. 0 keeps the exported value.
    #[arg(long, default_value_t = 0)]
    pub initial_height: u64,

    /// Override chain_id.
    #[arg(long)]
    pub chain_id: Option<String>,

    /// JSON keyfile of replacement validator consensus keys.
    #[arg(long, default_value = "")]
    pub replacement_cons_keys: String,

    /// Accepted for compatibility; has no effect.
    #[arg(long)]
    pub no_prop_29: bool,
}

impl MigrateArgs {
    fn overrides(&self) -> MetadataOverrides {
        MetadataOverrides {
            genesis_time: self.genesis_time.clone(),
            chain_id: self.chain_id.clone(),
            initial_height: self.initial_height,
        }
    }
}

/// Execute the migrate subcommand, writing the result to stdout.
pub fn run_migrate(args: &MigrateArgs, config: &MigrationConfig) -> Result<u8> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    migrate_to(args, config, &mut out)
}

/// Execute the migrate subcommand, writing the result to `out`.
pub fn migrate_to(args: &MigrateArgs, config: &MigrationConfig, out: &mut impl Write) -> Result<u8> {
    if args.no_prop_29 {
        tracing::debug!("--no-prop-29 has no effect");
    }

    let input = std::fs::read(&args.genesis_file)
        .with_context(|| format!("failed to read {}", args.genesis_file.display()))?;
    let keys = load_replacement_keys(&args.replacement_cons_keys)
        .with_context(|| format!("failed to load keyfile {}", args.replacement_cons_keys))?;

    let output = GenesisMigrator::with_config(config.clone())
        .run(&input, &args.overrides(), keys.as_deref())
        .with_context(|| format!("failed to migrate {}", args.genesis_file.display()))?;

    out.write_all(output.canonical.as_bytes())
        .and_then(|()| out.write_all(b"\n"))
        .and_then(|()| out.flush())
        .context("failed to write migrated genesis")?;

    tracing::info!(digest = %output.digest.to_hex(), "genesis digest");
    Ok(0)
}
