//! # Genesis Document Model
//!
//! Typed view of a Tendermint/CometBFT genesis document as the upgraded node
//! expects it. Field names and encodings follow the Tendermint JSON codec:
//! 64-bit integers are decimal strings, binary values are base64 or hex
//! strings, and optional collections are omitted when empty.
//!
//! `consensus_params` stays an untyped JSON object. The legacy and current
//! evidence schemas are incompatible, so normalization works on the raw
//! object and [`ConsensusParams::evidence()`] provides the typed view once the
//! current fields are in place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::app_state::AppStateMap;
use crate::error::GenesisError;
use crate::identity::ChainId;
use crate::temporal::GenesisTime;

/// A genesis document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisDocument {
    /// Chain start time.
    pub genesis_time: GenesisTime,
    /// Chain identifier.
    pub chain_id: ChainId,
    /// First block height of the chain.
    #[serde(default, with = "int64_string")]
    pub initial_height: i64,
    /// Consensus parameters, kept as raw JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_params: Option<ConsensusParams>,
    /// Initial validator set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<GenesisValidator>,
    /// Expected application hash (hex).
    #[serde(default)]
    pub app_hash: String,
    /// Per-module application state.
    #[serde(default)]
    pub app_state: AppStateMap,
}

/// Raw consensus parameters object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsensusParams(Map<String, Value>);

impl ConsensusParams {
    /// Wrap a raw JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Borrow the raw object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Take the raw object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Typed view of the current-schema `evidence` sub-object.
    ///
    /// # Errors
    ///
    /// - [`GenesisError::MissingField`] if `evidence` is absent.
    /// - [`GenesisError::MalformedDocument`] if any current field is missing
    ///   or not a 64-bit integer.
    pub fn evidence(&self) -> Result<EvidenceParams, GenesisError> {
        let raw = self
            .0
            .get("evidence")
            .ok_or_else(|| GenesisError::MissingField("consensus_params.evidence".into()))?;
        serde_json::from_value(raw.clone())
            .map_err(|e| GenesisError::malformed_at("consensus_params.evidence", e))
    }
}

/// Current-schema evidence parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceParams {
    /// Maximum evidence age in blocks.
    #[serde(with = "int64_string")]
    pub max_age_num_blocks: i64,
    /// Maximum evidence age in nanoseconds.
    #[serde(with = "int64_string")]
    pub max_age_duration: i64,
    /// Maximum total evidence size per block in bytes.
    #[serde(with = "int64_string")]
    pub max_bytes: i64,
}

/// A validator in the genesis validator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    /// Consensus address: upper-hex SHA-256 prefix of the public key.
    pub address: String,
    /// Consensus public key.
    pub pub_key: ValidatorPubKey,
    /// Voting power.
    #[serde(with = "int64_string")]
    pub power: i64,
    /// Human-readable moniker.
    #[serde(default)]
    pub name: String,
}

/// Amino-JSON encoded public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorPubKey {
    /// Amino type name, e.g. `tendermint/PubKeyEd25519`.
    #[serde(rename = "type")]
    pub key_type: String,
    /// Base64 key bytes.
    pub value: String,
}

/// Serde adapter for `int64` fields that Tendermint writes as decimal strings.
///
/// Accepts either a string or a JSON integer on input; always writes a string.
pub mod int64_string {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    /// Write as a decimal string.
    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Read from a decimal string or a JSON integer.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => s
                .parse()
                .map_err(|e| D::Error::custom(format!("invalid int64 {s:?}: {e}"))),
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| D::Error::custom(format!("{n} is not an int64"))),
            other => Err(D::Error::custom(format!(
                "expected int64 string, found {}",
                crate::app_state::json_kind(&other)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "genesis_time": "2019-12-11T16:11:34Z",
            "chain_id": "cosmoshub-3",
            "initial_height": "1",
            "consensus_params": {
                "block": {"max_bytes": "200000", "max_gas": "2000000", "time_iota_ms": "1000"},
                "evidence": {"max_age_num_blocks": "1000000", "max_age_duration": "172800000000000", "max_bytes": "50000"},
                "validator": {"pub_key_types": ["ed25519"]}
            },
            "validators": [{
                "address": "B00A6323737F321EB0B8D59C6FD497A14B60938A",
                "pub_key": {"type": "tendermint/PubKeyEd25519", "value": "cOQZvh/h9ZioSeUMZB/1Vy1Xo5x2sjrVjlE/qHnYifM="},
                "power": "5000",
                "name": "val-a"
            }],
            "app_hash": "",
            "app_state": {"bank": {}}
        })
    }

    #[test]
    fn test_document_decodes() {
        let doc: GenesisDocument = serde_json::from_value(sample()).unwrap();
        assert_eq!(doc.chain_id.as_str(), "cosmoshub-3");
        assert_eq!(doc.initial_height, 1);
        assert_eq!(doc.validators[0].power, 5000);
        assert!(doc.app_state.contains("bank"));
    }

    #[test]
    fn test_document_encodes_int64_as_string() {
        let doc: GenesisDocument = serde_json::from_value(sample()).unwrap();
        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["initial_height"], json!("1"));
        assert_eq!(back["validators"][0]["power"], json!("5000"));
        assert_eq!(back, sample());
    }

    #[test]
    fn test_numeric_int64_accepted() {
        let mut raw = sample();
        raw["initial_height"] = json!(42);
        let doc: GenesisDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.initial_height, 42);
    }

    #[test]
    fn test_empty_validators_omitted() {
        let mut raw = sample();
        raw["validators"] = json!([]);
        let doc: GenesisDocument = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&doc).unwrap();
        assert!(back.get("validators").is_none());
    }

    #[test]
    fn test_evidence_view() {
        let doc: GenesisDocument = serde_json::from_value(sample()).unwrap();
        let evidence = doc.consensus_params.unwrap().evidence().unwrap();
        assert_eq!(evidence.max_age_num_blocks, 1_000_000);
        assert_eq!(evidence.max_age_duration, 172_800_000_000_000);
        assert_eq!(evidence.max_bytes, 50_000);
    }

    #[test]
    fn test_evidence_view_rejects_legacy_shape() {
        let params = ConsensusParams::from_map(
            json!({"evidence": {"max_age": "100000"}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(matches!(
            params.evidence(),
            Err(GenesisError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_evidence_view_missing() {
        let params = ConsensusParams::default();
        assert!(matches!(
            params.evidence(),
            Err(GenesisError::MissingField(path)) if path == "consensus_params.evidence"
        ));
    }

    #[test]
    fn test_int64_string_rejects_garbage() {
        let mut raw = sample();
        raw["initial_height"] = json!("ten");
        assert!(serde_json::from_value::<GenesisDocument>(raw).is_err());
    }
}
