//! # Canonical Serialization — Sorted-Key JSON Bytes
//!
//! This module defines `CanonicalBytes`, the sole construction path for the
//! bytes a migration run emits and the bytes its genesis digest is computed
//! over.
//!
//! ## Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()`, which converts the value
//! to a JSON tree, sorts object keys at every nesting level, and writes the
//! tree with compact separators.
//!
//! Two operators migrating the same legacy genesis with the same overrides
//! must arrive at the same bytes, and therefore at the same genesis hash,
//! no matter in which order fields were inserted along the way.
//!
//! ## Compatibility
//!
//! The output matches what the Cosmos SDK `SortJSON` helper produces for
//! documents whose numbers are integers of magnitude at most 2^53: keys
//! sorted by byte order, no insignificant whitespace, arrays left in place.
//! Strings are escaped the way Go's `encoding/json` escapes them, so `<`,
//! `>`, `&`, U+2028 and U+2029 become `\u003c`, `\u003e`, `\u0026`,
//! `\u2028` and `\u2029`, and backspace and form feed use `\u0008` and
//! `\u000c`.

use std::io;

use serde::Serialize;
use serde_json::ser::{CharEscape, CompactFormatter, Formatter};
use serde_json::{Map, Value};

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by sorted-key JSON canonicalization.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - Every object, at every depth, has its keys in lexicographic byte order.
/// - Separators are compact (`,` and `:` with no surrounding whitespace).
/// - Array element order is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value
    /// cannot be represented as JSON (e.g. a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let sorted = sort_json_value(value);
        let mut bytes = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut bytes, GoEscapeFormatter);
        sorted.serialize(&mut ser)?;
        Ok(Self(bytes))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the wrapper, returning the owned bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Compact output with Go `encoding/json` string escaping.
struct GoEscapeFormatter;

impl Formatter for GoEscapeFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            let escaped: &[u8] = match c {
                '<' => b"\\u003c",
                '>' => b"\\u003e",
                '&' => b"\\u0026",
                '\u{2028}' => b"\\u2028",
                '\u{2029}' => b"\\u2029",
                _ => continue,
            };
            writer.write_all(&fragment.as_bytes()[start..i])?;
            writer.write_all(escaped)?;
            start = i + c.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }

    fn write_char_escape<W>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        match char_escape {
            CharEscape::Backspace => writer.write_all(b"\\u0008"),
            CharEscape::FormFeed => writer.write_all(b"\\u000c"),
            other => CompactFormatter.write_char_escape(writer, other),
        }
    }
}

/// Recursively rebuild a JSON tree with object keys in sorted order.
///
/// `serde_json::Map` is only guaranteed sorted when the `preserve_order`
/// feature is off somewhere in the dependency graph, so the order is
/// established explicitly here rather than relied upon.
fn sort_json_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_json_value(v));
            }
            Value::Object(sorted)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_json_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_str(data: &Value) -> String {
        let cb = CanonicalBytes::new(data).expect("should canonicalize");
        String::from_utf8(cb.into_bytes()).unwrap()
    }

    #[test]
    fn test_canonical_bytes_sorted_keys() {
        let data = serde_json::json!({"z": 1, "m": 2, "a": 3});
        assert_eq!(canonical_str(&data), r#"{"a":3,"m":2,"z":1}"#);
    }

    #[test]
    fn test_canonical_bytes_nested() {
        let data = serde_json::json!({
            "outer": {"b": 2, "a": 1},
            "list": [3, 2, 1]
        });
        assert_eq!(
            canonical_str(&data),
            r#"{"list":[3,2,1],"outer":{"a":1,"b":2}}"#
        );
    }

    #[test]
    fn test_objects_inside_arrays_are_sorted() {
        let data = serde_json::json!([{"y": true, "x": null}]);
        assert_eq!(canonical_str(&data), r#"[{"x":null,"y":true}]"#);
    }

    #[test]
    fn test_genesis_shaped_document() {
        let data = serde_json::json!({
            "genesis_time": "2021-02-18T06:00:00Z",
            "chain_id": "cosmoshub-4",
            "initial_height": "5200791",
            "app_hash": "",
            "app_state": {"staking": {}, "bank": {"balances": []}},
        });
        assert_eq!(
            canonical_str(&data),
            r#"{"app_hash":"","app_state":{"bank":{"balances":[]},"staking":{}},"chain_id":"cosmoshub-4","genesis_time":"2021-02-18T06:00:00Z","initial_height":"5200791"}"#
        );
    }

    #[test]
    fn test_large_unsigned_integer_exact() {
        let data = serde_json::json!({"val": u64::MAX});
        assert_eq!(canonical_str(&data), r#"{"val":18446744073709551615}"#);
    }

    #[test]
    fn test_uppercase_sorts_before_lowercase() {
        let data = serde_json::json!({"b": 1, "B": 2, "_": 3});
        assert_eq!(canonical_str(&data), r#"{"B":2,"_":3,"b":1}"#);
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(CanonicalBytes::new(&serde_json::json!({})).unwrap().as_bytes(), b"{}");
        assert_eq!(CanonicalBytes::new(&serde_json::json!([])).unwrap().as_bytes(), b"[]");
    }

    #[test]
    fn test_non_string_map_keys_rejected() {
        let mut data = std::collections::HashMap::new();
        data.insert(vec![1u8], 1u8);
        assert!(CanonicalBytes::new(&data).is_err());
    }

    #[test]
    fn test_unicode_passthrough() {
        let data = serde_json::json!({"name": "\u{00e9}\u{00e8}"});
        assert!(canonical_str(&data).contains('\u{00e9}'));
    }

    #[test]
    fn test_html_characters_escaped_like_go() {
        let data = serde_json::json!({"d": "a<b>&c"});
        assert_eq!(canonical_str(&data), r#"{"d":"a\u003cb\u003e\u0026c"}"#);
    }

    #[test]
    fn test_line_separators_escaped_like_go() {
        let data = serde_json::json!({"memo": "x\u{2028}y\u{2029}"});
        assert_eq!(canonical_str(&data), r#"{"memo":"x\u2028y\u2029"}"#);
    }

    #[test]
    fn test_keys_escaped_and_sorted_by_raw_bytes() {
        // '&' (0x26) sorts before 'a' even though its escape starts with '\'.
        let data = serde_json::json!({"a": 1, "&": 2});
        assert_eq!(canonical_str(&data), r#"{"\u0026":2,"a":1}"#);
    }

    #[test]
    fn test_control_characters_escaped_like_go() {
        let data = serde_json::json!("\u{8}\u{c}\n\t\u{1f}\"\\");
        assert_eq!(canonical_str(&data), r#""\u0008\u000c\n\t\u001f\"\\""#);
    }

    #[test]
    fn test_len_and_is_empty() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        assert!(!cb.is_empty());
        assert_eq!(cb.len(), 7);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9_ <>&\u{2028}]{0,30}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::vec(("[a-z]{1,10}", inner), 0..8).prop_map(|pairs| {
                    let map: Map<String, Value> = pairs.into_iter().collect();
                    Value::Object(map)
                }),
            ]
        })
    }

    proptest! {
        /// Same logical value, same bytes.
        #[test]
        fn canonical_bytes_deterministic(value in json_value()) {
            let a = CanonicalBytes::new(&value).unwrap();
            let b = CanonicalBytes::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        /// Canonicalizing canonical output is a fixed point.
        #[test]
        fn canonical_bytes_idempotent(value in json_value()) {
            let first = CanonicalBytes::new(&value).unwrap();
            let reparsed: Value = serde_json::from_slice(first.as_bytes()).unwrap();
            let second = CanonicalBytes::new(&reparsed).unwrap();
            prop_assert_eq!(first, second);
        }

        /// Insertion order of object keys does not affect the output.
        #[test]
        fn canonical_bytes_ignore_insertion_order(
            keys in prop::collection::btree_set("[a-z]{1,8}", 2..8)
        ) {
            let forward: Map<String, Value> = keys
                .iter()
                .map(|k| (k.clone(), Value::String(k.clone())))
                .collect();
            let reverse: Map<String, Value> = keys
                .iter()
                .rev()
                .map(|k| (k.clone(), Value::String(k.clone())))
                .collect();
            let a = CanonicalBytes::new(&Value::Object(forward)).unwrap();
            let b = CanonicalBytes::new(&Value::Object(reverse)).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
