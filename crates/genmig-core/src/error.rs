//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error types used throughout the genesis migration pipeline.
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Every stage either fully succeeds or aborts the whole run. There is no
//!   local recovery, so every variant here is fatal at the top level.
//! - Path-like context (`consensus_params.evidence`) is carried as a string
//!   so the operator sees exactly which part of the document was rejected.

use thiserror::Error;

/// Top-level error type for genesis migration.
#[derive(Error, Debug)]
pub enum GenesisError {
    /// The input is not a structurally valid genesis document.
    #[error("malformed genesis document: {0}")]
    MalformedDocument(String),

    /// A required JSON path is absent.
    #[error("exported json does not contain {0} field")]
    MissingField(String),

    /// No transform is registered for the requested version label.
    #[error("unknown migration function for version: {0}")]
    UnknownMigration(String),

    /// The genesis-time override could not be parsed.
    #[error("failed to parse genesis time {input:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input text.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A chain id failed validation.
    #[error("invalid chain id {0:?}: must be non-empty and at most 50 bytes")]
    InvalidChainId(String),

    /// An operator override is out of range.
    #[error("invalid override: {0}")]
    InvalidOverride(String),

    /// The replacement keyfile is unreadable or malformed.
    #[error("replacement keyfile error: {0}")]
    KeyfileError(String),

    /// The migration configuration file is unreadable or malformed.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The final document could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] CanonicalizationError),
}

impl GenesisError {
    /// Shorthand for a [`GenesisError::MalformedDocument`] scoped to a JSON path.
    pub fn malformed_at(path: &str, detail: impl std::fmt::Display) -> Self {
        Self::MalformedDocument(format!("{path}: {detail}"))
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
