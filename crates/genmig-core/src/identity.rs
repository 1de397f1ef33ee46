//! # Chain Identity
//!
//! `ChainId` wraps the chain identifier carried at the top of every genesis
//! document. It is validated at construction so that an empty or oversized
//! id can never reach the canonical output.
//!
//! The IBC revision number is derived from the id: `cosmoshub-4` is revision
//! 4 of the `cosmoshub` chain. IBC heights embedded in migrated client
//! metadata use this revision, so the chain id must be final before the IBC
//! transform runs.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::GenesisError;

/// Maximum chain id length in bytes accepted by Tendermint.
pub const MAX_CHAIN_ID_LEN: usize = 50;

/// Validated chain identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    /// Validate and wrap a chain id.
    ///
    /// # Errors
    ///
    /// Returns [`GenesisError::InvalidChainId`] if the id is empty or longer
    /// than [`MAX_CHAIN_ID_LEN`] bytes.
    pub fn new(id: impl Into<String>) -> Result<Self, GenesisError> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_CHAIN_ID_LEN {
            return Err(GenesisError::InvalidChainId(id));
        }
        Ok(Self(id))
    }

    /// Access the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The IBC revision number encoded in the id.
    ///
    /// Ids of the form `{name}-{N}`, where `N` is a positive decimal number
    /// without a leading zero and `name` is a single line not ending in `-`,
    /// have revision `N`. Every other id has revision 0.
    pub fn revision_number(&self) -> u64 {
        let Some((name, suffix)) = self.0.rsplit_once('-') else {
            return 0;
        };
        if name.is_empty() || suffix.is_empty() {
            return 0;
        }
        if name.ends_with('-') || name.contains('\n') {
            return 0;
        }
        if suffix.len() > 1 && suffix.starts_with('0') {
            return 0;
        }
        if !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return 0;
        }
        suffix.parse().unwrap_or(0)
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_chain_id() {
        let id = ChainId::new("cosmoshub-4").unwrap();
        assert_eq!(id.as_str(), "cosmoshub-4");
        assert_eq!(id.to_string(), "cosmoshub-4");
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            ChainId::new(""),
            Err(GenesisError::InvalidChainId(_))
        ));
    }

    #[test]
    fn test_too_long_rejected() {
        assert!(ChainId::new("a".repeat(MAX_CHAIN_ID_LEN)).is_ok());
        assert!(ChainId::new("a".repeat(MAX_CHAIN_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_revision_number() {
        let cases = [
            ("cosmoshub-4", 4),
            ("gaia-testnet-12", 12),
            ("cosmoshub", 0),
            ("cosmoshub-04", 0),
            ("cosmoshub-0", 0),
            ("cosmoshub-x1", 0),
            ("-7", 0),
            ("chain-", 0),
            ("a--7", 0),
            ("chain\n-3", 0),
            ("a-b-7", 7),
        ];
        for (id, expected) in cases {
            assert_eq!(ChainId::new(id).unwrap().revision_number(), expected, "{id}");
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ChainId = serde_json::from_str("\"cosmoshub-4\"").unwrap();
        assert_eq!(ok.as_str(), "cosmoshub-4");
        assert!(serde_json::from_str::<ChainId>("\"\"").is_err());
    }
}
