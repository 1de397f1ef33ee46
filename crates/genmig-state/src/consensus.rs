//! # Consensus-Parameter Normalizer
//!
//! Rewrites the legacy `consensus_params.evidence` object into the schema
//! the upgraded consensus engine reads:
//!
//! ```text
//! legacy:  { "max_age": N }
//! current: { "max_age_num_blocks": N,
//!            "max_age_duration":   "<EvidencePolicy::max_age_duration>",
//!            "max_bytes":          "<EvidencePolicy::max_bytes>" }
//! ```
//!
//! `max_age` is moved verbatim. The two new fields are policy values and
//! overwrite anything already present.
//!
//! The normalizer is not idempotent. It requires `max_age` and removes it,
//! so a second run over its own output fails with `MissingField`. It must
//! run exactly once, on legacy-shaped input.

use serde_json::Value;

use genmig_core::{ConsensusParams, GenesisError};

use crate::config::EvidencePolicy;

/// Normalize raw consensus parameters to the current evidence schema.
///
/// # Errors
///
/// - [`GenesisError::MissingField`] naming `consensus_params`,
///   `consensus_params.evidence`, or `consensus_params.evidence.max_age`.
/// - [`GenesisError::MalformedDocument`] if the result does not satisfy the
///   typed evidence view (e.g. `max_age` was not an integer).
pub fn normalize_consensus_params(
    params: Option<ConsensusParams>,
    policy: &EvidencePolicy,
) -> Result<ConsensusParams, GenesisError> {
    let mut map = params
        .ok_or_else(|| GenesisError::MissingField("consensus_params".into()))?
        .into_map();

    let evidence = map
        .get_mut("evidence")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| GenesisError::MissingField("consensus_params.evidence".into()))?;

    let max_age = evidence
        .remove("max_age")
        .ok_or_else(|| GenesisError::MissingField("consensus_params.evidence.max_age".into()))?;
    evidence.insert("max_age_num_blocks".into(), max_age);
    evidence.insert(
        "max_age_duration".into(),
        Value::String(policy.max_age_duration.to_string()),
    );
    evidence.insert("max_bytes".into(), Value::String(policy.max_bytes.to_string()));

    let params = ConsensusParams::from_map(map);
    let typed = params.evidence()?;
    tracing::debug!(
        max_age_num_blocks = typed.max_age_num_blocks,
        max_age_duration = typed.max_age_duration,
        max_bytes = typed.max_bytes,
        "normalized evidence params"
    );
    Ok(params)
}
