//! # Document Loader
//!
//! Turns the raw bytes of an exported genesis file into a
//! [`GenesisDocument`] with its `app_state` split into an [`AppStateMap`].
//!
//! The loader fails fast. Everything that later stages assume about the
//! document shape is checked here:
//!
//! - the bytes are a JSON object
//! - `app_state`, when present, is an object
//! - `chain_id` and `genesis_time` are valid
//! - `initial_height` is non-negative
//! - every validator has positive voting power and an address that matches
//!   its ed25519 key (an empty address is filled in from the key)
//!
//! `consensus_params` is deliberately left raw: the legacy evidence schema
//! is rewritten by [`crate::consensus`] before anything reads it as typed data.

use serde_json::Value;

use genmig_core::{AppStateMap, GenesisDocument, GenesisError, GenesisValidator};

use crate::address::{consensus_address, decode_ed25519_key, to_upper_hex, TM_ED25519_KEY_TYPE};

/// Parse and validate a genesis document.
///
/// # Errors
///
/// Returns [`GenesisError::MalformedDocument`] for any structural problem.
pub fn load_genesis(bytes: &[u8]) -> Result<GenesisDocument, GenesisError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| {
        GenesisError::MalformedDocument(format!("failed to parse genesis JSON: {e}"))
    })?;
    let Value::Object(mut top) = value else {
        return Err(GenesisError::MalformedDocument(
            "genesis document must be a JSON object".into(),
        ));
    };

    let app_state = match top.remove("app_state") {
        None | Some(Value::Null) => AppStateMap::new(),
        Some(raw) => AppStateMap::from_json(raw)?,
    };

    let mut doc: GenesisDocument = serde_json::from_value(Value::Object(top)).map_err(|e| {
        GenesisError::MalformedDocument(format!("failed to read genesis document: {e}"))
    })?;

    if doc.initial_height < 0 {
        return Err(GenesisError::malformed_at(
            "initial_height",
            format!("must be non-negative, got {}", doc.initial_height),
        ));
    }

    for (i, validator) in doc.validators.iter_mut().enumerate() {
        check_validator(i, validator)?;
    }

    doc.app_state = app_state;

    tracing::debug!(
        chain_id = %doc.chain_id,
        genesis_time = %doc.genesis_time,
        initial_height = doc.initial_height,
        validators = doc.validators.len(),
        modules = doc.app_state.len(),
        "loaded genesis document"
    );

    Ok(doc)
}

fn check_validator(index: usize, validator: &mut GenesisValidator) -> Result<(), GenesisError> {
    let path = format!("validators[{index}]");
    if validator.power <= 0 {
        return Err(GenesisError::malformed_at(
            &path,
            "genesis validators must have positive voting power",
        ));
    }

    // Only ed25519 keys have a derivable address here.
    if validator.pub_key.key_type != TM_ED25519_KEY_TYPE {
        return Ok(());
    }
    let key = decode_ed25519_key(&validator.pub_key.value)
        .map_err(|e| GenesisError::malformed_at(&format!("{path}.pub_key"), e))?;
    let derived = to_upper_hex(&consensus_address(&key));

    if !validator.address.is_empty() && !validator.address.eq_ignore_ascii_case(&derived) {
        return Err(GenesisError::malformed_at(
            &format!("{path}.address"),
            format!("{} does not match public key (expected {derived})", validator.address),
        ));
    }
    // Addresses are hex bytes, always written uppercase.
    validator.address = derived;
    Ok(())
}
