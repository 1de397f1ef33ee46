//! # Migration Configuration
//!
//! Policy constants the migration writes into the upgraded genesis, with a
//! YAML override layer for operators who need to deviate from them.
//!
//! ```yaml
//! first_migration: v0.43
//! evidence:
//!   max_age_duration: 172800000000000
//!   max_bytes: 50000
//! ibc:
//!   max_expected_time_per_block: 30000000000
//! ```
//!
//! Every field is optional; omitted fields take the defaults below. Unknown
//! keys are rejected so a typo cannot silently fall back to a default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use genmig_core::GenesisError;

/// Version label of the first app-state transform.
pub const FIRST_MIGRATION: &str = "v0.43";

/// Evidence `max_age_duration` written by the normalizer: 48 hours in nanoseconds.
pub const DEFAULT_MAX_AGE_DURATION_NS: i64 = 172_800_000_000_000;

/// Evidence `max_bytes` written by the normalizer.
pub const DEFAULT_EVIDENCE_MAX_BYTES: i64 = 50_000;

/// IBC connection `max_expected_time_per_block`: 30 seconds in nanoseconds.
pub const DEFAULT_MAX_EXPECTED_TIME_PER_BLOCK_NS: u64 = 30_000_000_000;

/// Full migration configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Registry label of the transform applied before overrides.
    pub first_migration: String,
    /// Evidence parameter policy.
    pub evidence: EvidencePolicy,
    /// IBC migration policy.
    pub ibc: IbcPolicy,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            first_migration: FIRST_MIGRATION.to_string(),
            evidence: EvidencePolicy::default(),
            ibc: IbcPolicy::default(),
        }
    }
}

/// Values the consensus-parameter normalizer writes into `evidence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvidencePolicy {
    /// Maximum evidence age in nanoseconds.
    pub max_age_duration: i64,
    /// Maximum evidence bytes per block.
    pub max_bytes: i64,
}

impl Default for EvidencePolicy {
    fn default() -> Self {
        Self {
            max_age_duration: DEFAULT_MAX_AGE_DURATION_NS,
            max_bytes: DEFAULT_EVIDENCE_MAX_BYTES,
        }
    }
}

/// Values the IBC transform writes into the connection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IbcPolicy {
    /// Expected upper bound on block time in nanoseconds.
    pub max_expected_time_per_block: u64,
}

impl Default for IbcPolicy {
    fn default() -> Self {
        Self {
            max_expected_time_per_block: DEFAULT_MAX_EXPECTED_TIME_PER_BLOCK_NS,
        }
    }
}

impl MigrationConfig {
    /// Parse a YAML configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`GenesisError::ConfigError`] on invalid YAML, unknown keys,
    /// an empty `first_migration`, or negative evidence limits.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GenesisError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| GenesisError::ConfigError(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`GenesisError::ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, GenesisError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GenesisError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "loaded migration config");
        Ok(config)
    }

    fn validate(&self) -> Result<(), GenesisError> {
        if self.first_migration.trim().is_empty() {
            return Err(GenesisError::ConfigError(
                "first_migration must not be empty".into(),
            ));
        }
        if self.evidence.max_age_duration < 0 || self.evidence.max_bytes < 0 {
            return Err(GenesisError::ConfigError(
                "evidence limits must be non-negative".into(),
            ));
        }
        Ok(())
    }
}
