//! # Genesis Digest
//!
//! SHA-256 over canonical genesis bytes. Operators running the migration
//! independently compare this value to confirm they produced the same
//! genesis before launching the upgraded chain.
//!
//! `genesis_digest()` only accepts `&CanonicalBytes`, so a digest can never
//! be taken over a non-canonical encoding of the document.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

/// A SHA-256 digest of a canonical genesis document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// Compute the SHA-256 digest of canonical genesis bytes.
pub fn genesis_digest(data: &CanonicalBytes) -> ContentDigest {
    let hash = Sha256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest { bytes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_digest() {
        // sha256("{}")
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(
            genesis_digest(&cb).to_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_digest_independent_of_key_order() {
        let a = CanonicalBytes::new(&serde_json::json!({"b": 1, "a": 2})).unwrap();
        let b = CanonicalBytes::new(&serde_json::json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(genesis_digest(&a), genesis_digest(&b));
    }

    #[test]
    fn test_display_is_prefixed() {
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        let shown = genesis_digest(&cb).to_string();
        assert!(shown.starts_with("sha256:"));
        assert_eq!(shown.len(), "sha256:".len() + 64);
    }
}
