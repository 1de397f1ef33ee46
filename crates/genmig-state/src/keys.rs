//! # Consensus Key Replacement
//!
//! Rewrites validator consensus keys from an operator-supplied keyfile, for
//! validators that rotate their signing key across the upgrade.
//!
//! A record is matched against the staking module by operator address. The
//! key swap then follows the old consensus address everywhere it appears:
//!
//! | Location                              | Encoding                   |
//! |---------------------------------------|----------------------------|
//! | `app_state.staking.validators[]`      | protobuf `Any` or bech32   |
//! | `validators[]`                        | upper-hex address, base64  |
//! | `app_state.slashing.signing_infos[]`  | bech32 `...valcons` address|
//! | `app_state.slashing.missed_blocks[]`  | bech32 `...valcons` address|
//!
//! The staking match is the only way in. A record whose operator address
//! matches no staking validator changes nothing, even if its
//! `validator_name` equals a genesis validator's moniker, so the staking key
//! and the validator-set key can never disagree. Records that match nothing
//! are logged and skipped.

use std::collections::BTreeMap;
use std::path::Path;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use genmig_core::{AppStateMap, GenesisDocument, GenesisError};

use crate::address::{
    consensus_address, decode_ed25519_key, to_upper_hex, ADDRESS_LEN, ED25519_KEY_LEN,
    SDK_ED25519_KEY_TYPE_URL, TM_ED25519_KEY_TYPE,
};

/// Amino prefix of an ed25519 public key inside a bech32 `...valconspub` string.
const AMINO_ED25519_PREFIX: [u8; 5] = [0x16, 0x24, 0xDE, 0x64, 0x20];

type Address = [u8; ADDRESS_LEN];

/// One entry of a replacement keyfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorKeyRecord {
    /// Validator moniker.
    #[serde(default)]
    pub validator_name: String,
    /// Operator (`...valoper`) address.
    #[serde(default)]
    pub validator_address: String,
    /// Base64 ed25519 public key.
    #[serde(alias = "stargate_consensus_public_key")]
    pub consensus_public_key: String,
}

impl ValidatorKeyRecord {
    fn key_bytes(&self) -> Result<Vec<u8>, GenesisError> {
        decode_ed25519_key(&self.consensus_public_key).map_err(|e| {
            GenesisError::KeyfileError(format!("record {}: {e}", self.label()))
        })
    }

    fn label(&self) -> &str {
        if self.validator_name.is_empty() {
            &self.validator_address
        } else {
            &self.validator_name
        }
    }
}

/// Parse keyfile contents.
///
/// # Errors
///
/// Returns [`GenesisError::KeyfileError`] if the bytes are not a JSON array
/// of records, or if any key is not a 32-byte base64 ed25519 key.
pub fn parse_keyfile(bytes: &[u8]) -> Result<Vec<ValidatorKeyRecord>, GenesisError> {
    let records: Vec<ValidatorKeyRecord> = serde_json::from_slice(bytes)
        .map_err(|e| GenesisError::KeyfileError(format!("failed to parse keyfile: {e}")))?;
    for record in &records {
        record.key_bytes()?;
    }
    Ok(records)
}

/// Read and parse a keyfile from disk.
///
/// # Errors
///
/// Returns [`GenesisError::KeyfileError`] if the file cannot be read or
/// parsed.
pub fn load_keyfile(path: &Path) -> Result<Vec<ValidatorKeyRecord>, GenesisError> {
    let bytes = std::fs::read(path).map_err(|e| {
        GenesisError::KeyfileError(format!("failed to read {}: {e}", path.display()))
    })?;
    let records = parse_keyfile(&bytes)?;
    tracing::debug!(path = %path.display(), records = records.len(), "loaded keyfile");
    Ok(records)
}

struct Replacement<'a> {
    record: &'a ValidatorKeyRecord,
    new_key: Vec<u8>,
    new_address: Address,
    old_address: Option<Address>,
    matched: bool,
}

/// Replace validator consensus keys according to `records`.
///
/// # Errors
///
/// - [`GenesisError::KeyfileError`] if a record carries an invalid key.
/// - [`GenesisError::MalformedDocument`] if a matched staking validator or a
///   slashing address cannot be decoded.
pub fn replace_consensus_keys(
    mut doc: GenesisDocument,
    records: &[ValidatorKeyRecord],
) -> Result<GenesisDocument, GenesisError> {
    if records.is_empty() {
        return Ok(doc);
    }
    let mut replacements = records
        .iter()
        .map(|record| {
            let new_key = record.key_bytes()?;
            let new_address = consensus_address(&new_key);
            Ok(Replacement {
                record,
                new_key,
                new_address,
                old_address: None,
                matched: false,
            })
        })
        .collect::<Result<Vec<_>, GenesisError>>()?;

    replace_in_staking(&mut doc.app_state, &mut replacements)?;

    let moved: BTreeMap<Address, Address> = replacements
        .iter()
        .filter_map(|r| r.old_address.map(|old| (old, r.new_address)))
        .collect();
    replace_in_validator_set(&mut doc, &replacements);
    replace_in_slashing(&mut doc.app_state, &moved)?;

    for r in replacements.iter().filter(|r| !r.matched) {
        tracing::warn!(
            validator = r.record.label(),
            "replacement key matches no validator; ignored"
        );
    }
    tracing::info!(
        replaced = moved.len(),
        records = records.len(),
        "replaced validator consensus keys"
    );
    Ok(doc)
}

fn replace_in_staking(
    app_state: &mut AppStateMap,
    replacements: &mut [Replacement<'_>],
) -> Result<(), GenesisError> {
    let Some(validators) = app_state
        .get_mut("staking")
        .and_then(|s| s.get_mut("validators"))
        .and_then(Value::as_array_mut)
    else {
        return Ok(());
    };

    for (i, validator) in validators.iter_mut().enumerate() {
        let path = format!("app_state.staking.validators[{i}]");
        let Some(operator) = validator.get("operator_address").and_then(Value::as_str) else {
            continue;
        };
        let Some(r) = replacements
            .iter_mut()
            .find(|r| !r.record.validator_address.is_empty() && r.record.validator_address == operator)
        else {
            continue;
        };
        let pubkey = validator
            .get_mut("consensus_pubkey")
            .ok_or_else(|| GenesisError::malformed_at(&path, "missing consensus_pubkey"))?;
        let old_key = swap_staking_pubkey(pubkey, &r.new_key, &format!("{path}.consensus_pubkey"))?;
        r.old_address = Some(consensus_address(&old_key));
        r.matched = true;
        tracing::debug!(operator = %r.record.validator_address, "replaced staking consensus key");
    }
    Ok(())
}

/// Swap the key inside a staking `consensus_pubkey`, returning the old key.
fn swap_staking_pubkey(
    pubkey: &mut Value,
    new_key: &[u8],
    path: &str,
) -> Result<Vec<u8>, GenesisError> {
    match pubkey {
        Value::Object(any) => {
            let old = any
                .get("key")
                .and_then(Value::as_str)
                .ok_or_else(|| GenesisError::malformed_at(path, "missing key"))?;
            let old = decode_ed25519_key(old).map_err(|e| GenesisError::malformed_at(path, e))?;
            any.insert("@type".into(), Value::String(SDK_ED25519_KEY_TYPE_URL.into()));
            any.insert("key".into(), Value::String(BASE64_STANDARD.encode(new_key)));
            Ok(old)
        }
        Value::String(encoded) => {
            let (hrp, data) =
                bech32::decode(encoded).map_err(|e| GenesisError::malformed_at(path, e))?;
            let old = data
                .strip_prefix(&AMINO_ED25519_PREFIX[..])
                .filter(|key| key.len() == ED25519_KEY_LEN)
                .ok_or_else(|| GenesisError::malformed_at(path, "not an amino ed25519 key"))?
                .to_vec();
            let mut fresh = AMINO_ED25519_PREFIX.to_vec();
            fresh.extend_from_slice(new_key);
            *encoded = encode_bech32(hrp, &fresh, path)?;
            Ok(old)
        }
        _ => Err(GenesisError::malformed_at(path, "expected an object or a bech32 string")),
    }
}

fn replace_in_validator_set(doc: &mut GenesisDocument, replacements: &[Replacement<'_>]) {
    for validator in &mut doc.validators {
        let Some(old) = decode_upper_hex(&validator.address) else {
            continue;
        };
        let Some(r) = replacements.iter().find(|r| r.old_address == Some(old)) else {
            continue;
        };
        validator.pub_key.key_type = TM_ED25519_KEY_TYPE.to_string();
        validator.pub_key.value = BASE64_STANDARD.encode(&r.new_key);
        validator.address = to_upper_hex(&r.new_address);
        tracing::debug!(name = %validator.name, address = %validator.address, "replaced validator key");
    }
}

fn replace_in_slashing(
    app_state: &mut AppStateMap,
    moved: &BTreeMap<Address, Address>,
) -> Result<(), GenesisError> {
    if moved.is_empty() {
        return Ok(());
    }
    let Some(slashing) = app_state.get_mut("slashing").and_then(Value::as_object_mut) else {
        return Ok(());
    };

    if let Some(infos) = slashing.get_mut("signing_infos").and_then(Value::as_array_mut) {
        for (i, info) in infos.iter_mut().enumerate() {
            let path = format!("app_state.slashing.signing_infos[{i}]");
            rewrite_bech32_field(info, moved, &format!("{path}.address"))?;
            if let Some(inner) = info.get_mut("validator_signing_info") {
                rewrite_bech32_field(inner, moved, &format!("{path}.validator_signing_info.address"))?;
            }
        }
    }
    if let Some(missed) = slashing.get_mut("missed_blocks").and_then(Value::as_array_mut) {
        for (i, entry) in missed.iter_mut().enumerate() {
            let path = format!("app_state.slashing.missed_blocks[{i}].address");
            rewrite_bech32_field(entry, moved, &path)?;
        }
    }
    Ok(())
}

fn rewrite_bech32_field(
    obj: &mut Value,
    moved: &BTreeMap<Address, Address>,
    path: &str,
) -> Result<(), GenesisError> {
    let Some(field) = obj.get_mut("address") else {
        return Ok(());
    };
    let Some(encoded) = field.as_str().filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    let (hrp, data) = bech32::decode(encoded).map_err(|e| GenesisError::malformed_at(path, e))?;
    let Ok(old) = Address::try_from(data.as_slice()) else {
        return Ok(());
    };
    if let Some(new) = moved.get(&old) {
        *field = Value::String(encode_bech32(hrp, new, path)?);
    }
    Ok(())
}

fn encode_bech32(hrp: Hrp, data: &[u8], path: &str) -> Result<String, GenesisError> {
    bech32::encode::<Bech32>(hrp, data).map_err(|e| GenesisError::malformed_at(path, e))
}

fn decode_upper_hex(hex: &str) -> Option<Address> {
    if hex.len() != ADDRESS_LEN * 2 || !hex.is_ascii() {
        return None;
    }
    let mut out = [0u8; ADDRESS_LEN];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16).ok()?;
    }
    Some(out)
}
