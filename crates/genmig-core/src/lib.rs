//! # genmig-core — Foundational Types for Genesis Migration
//!
//! This crate is the leaf of the genesis migration workspace. It defines
//! the document model and the byte-level guarantees every other crate
//! builds on. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Validated newtypes for document metadata.** `ChainId` and
//!    `GenesisTime` validate at construction, so an invalid override can
//!    never reach the output.
//!
//! 2. **`CanonicalBytes` newtype.** The migrated genesis leaves the process
//!    only through `CanonicalBytes::new()`, which sorts keys at every level.
//!    Independent operators therefore converge on the same bytes.
//!
//! 3. **`genesis_digest()` accepts only `&CanonicalBytes`.** Genesis hashes
//!    are always taken over the canonical encoding.
//!
//! 4. **Raw module state.** `AppStateMap` keeps each module serialized until
//!    a transform that understands it decodes it. Unknown modules pass
//!    through byte-for-byte.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `genmig-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod app_state;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod genesis;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use app_state::AppStateMap;
pub use canonical::CanonicalBytes;
pub use digest::{genesis_digest, ContentDigest};
pub use error::{CanonicalizationError, GenesisError};
pub use genesis::{ConsensusParams, EvidenceParams, GenesisDocument, GenesisValidator, ValidatorPubKey};
pub use identity::{ChainId, MAX_CHAIN_ID_LEN};
pub use temporal::GenesisTime;
