//! Consensus addresses and the key encodings around them.
//!
//! A Tendermint consensus address is the first 20 bytes of SHA-256 over the
//! raw ed25519 public key. Genesis validators carry it as upper-case hex;
//! the slashing module carries it bech32-encoded under a `...valcons` prefix.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use sha2::{Digest, Sha256};

/// Length of a consensus address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Length of an ed25519 public key in bytes.
pub const ED25519_KEY_LEN: usize = 32;

/// Amino type name of ed25519 keys in the genesis validator set.
pub const TM_ED25519_KEY_TYPE: &str = "tendermint/PubKeyEd25519";

/// Protobuf type URL of ed25519 keys in staking state.
pub const SDK_ED25519_KEY_TYPE_URL: &str = "/cosmos.crypto.ed25519.PubKey";

/// Consensus address of a raw public key.
pub fn consensus_address(pub_key: &[u8]) -> [u8; ADDRESS_LEN] {
    let hash = Sha256::digest(pub_key);
    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(&hash[..ADDRESS_LEN]);
    out
}

/// Upper-case hex, the encoding used by `validators[].address`.
pub fn to_upper_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Decode a base64 ed25519 public key, checking its length.
pub fn decode_ed25519_key(b64: &str) -> Result<Vec<u8>, String> {
    let bytes = BASE64_STANDARD
        .decode(b64)
        .map_err(|e| format!("invalid base64 public key: {e}"))?;
    if bytes.len() != ED25519_KEY_LEN {
        return Err(format!(
            "ed25519 public key must be {ED25519_KEY_LEN} bytes, got {}",
            bytes.len()
        ));
    }
    Ok(bytes)
}
