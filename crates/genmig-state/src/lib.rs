//! # genmig-state — Genesis Migration Pipeline
//!
//! Upgrades a genesis document exported by a legacy chain into a genesis
//! document the upgraded chain can start from.
//!
//! ## Stages
//!
//! - **Loader** (`loader.rs`): parses and validates the exported document.
//!
//! - **Consensus** (`consensus.rs`): rewrites legacy evidence parameters.
//!
//! - **Registry** (`registry.rs`): versioned app-state transforms, looked up
//!   by label in a caller-supplied [`MigrationRegistry`].
//!
//! - **IBC** (`ibc.rs`): upgrades IBC client state, prunes expired consensus
//!   states and records processed heights.
//!
//! - **Overrides** (`overrides.rs`): operator-supplied genesis time, chain id
//!   and initial height.
//!
//! - **Keys** (`keys.rs`): optional consensus key replacement from a keyfile.
//!
//! - **Pipeline** (`pipeline.rs`): [`GenesisMigrator`] runs the stages in
//!   order and produces canonical bytes plus their digest.
//!
//! ## Design
//!
//! Every stage is a function from document to document. Stages never write
//! to stdout; output and process exit are the caller's concern.

pub mod address;
pub mod config;
pub mod consensus;
pub mod ibc;
pub mod keys;
pub mod loader;
pub mod overrides;
pub mod pipeline;
pub mod registry;

pub use config::{
    EvidencePolicy, IbcPolicy, MigrationConfig, DEFAULT_EVIDENCE_MAX_BYTES,
    DEFAULT_MAX_AGE_DURATION_NS, DEFAULT_MAX_EXPECTED_TIME_PER_BLOCK_NS, FIRST_MIGRATION,
};
pub use consensus::normalize_consensus_params;
pub use ibc::IbcMigration;
pub use keys::{load_keyfile, parse_keyfile, replace_consensus_keys, ValidatorKeyRecord};
pub use loader::load_genesis;
pub use overrides::{apply_overrides, complete_initial_height, MetadataOverrides};
pub use pipeline::{load_replacement_keys, GenesisMigrator, MigrationOutput};
pub use registry::{
    transform_fn, FnTransform, MigrationContext, MigrationRegistry, MigrationTransform,
    PassThrough, RenameModules,
};
