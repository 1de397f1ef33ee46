//! # Metadata Overrides
//!
//! Operator-supplied replacements for `genesis_time`, `chain_id`, and
//! `initial_height`. Each override is optional and independent. An empty
//! string or a zero height means "not supplied", and the document value is
//! kept.
//!
//! Overrides are validated before they touch the document, so a failing
//! override never leaves a half-updated document behind.

use genmig_core::{ChainId, GenesisDocument, GenesisError, GenesisTime};

/// Overrides collected from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataOverrides {
    /// RFC 3339 timestamp. `None` or empty keeps the document value.
    pub genesis_time: Option<String>,
    /// New chain id. `None` or empty keeps the document value.
    pub chain_id: Option<String>,
    /// New initial height. `0` keeps the document value.
    pub initial_height: u64,
}

impl MetadataOverrides {
    /// True if no override would change anything.
    pub fn is_empty(&self) -> bool {
        supplied(&self.genesis_time).is_none()
            && supplied(&self.chain_id).is_none()
            && self.initial_height == 0
    }
}

fn supplied(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Apply the supplied overrides to `doc`.
///
/// # Errors
///
/// - [`GenesisError::InvalidTimestamp`] if `genesis_time` is not RFC 3339.
/// - [`GenesisError::InvalidChainId`] if `chain_id` is too long.
/// - [`GenesisError::InvalidOverride`] if `initial_height` exceeds `i64::MAX`.
pub fn apply_overrides(
    mut doc: GenesisDocument,
    overrides: &MetadataOverrides,
) -> Result<GenesisDocument, GenesisError> {
    if overrides.is_empty() {
        tracing::debug!("no metadata overrides supplied");
        return Ok(doc);
    }
    let genesis_time = supplied(&overrides.genesis_time)
        .map(GenesisTime::parse)
        .transpose()?;
    let chain_id = supplied(&overrides.chain_id).map(ChainId::new).transpose()?;
    let initial_height = match overrides.initial_height {
        0 => None,
        h => Some(i64::try_from(h).map_err(|_| {
            GenesisError::InvalidOverride(format!("initial height {h} exceeds {}", i64::MAX))
        })?),
    };

    if let Some(time) = genesis_time {
        tracing::info!(from = %doc.genesis_time, to = %time, "overriding genesis time");
        doc.genesis_time = time;
    }
    if let Some(id) = chain_id {
        tracing::info!(from = %doc.chain_id, to = %id, "overriding chain id");
        doc.chain_id = id;
    }
    if let Some(height) = initial_height {
        tracing::info!(from = doc.initial_height, to = height, "overriding initial height");
        doc.initial_height = height;
    }
    Ok(doc)
}

/// Replace an unset (`0`) initial height with `1`.
///
/// The consensus engine treats a zero initial height as one; writing it out
/// explicitly keeps the IBC processed-height metadata consistent with the
/// height the chain actually starts at.
pub fn complete_initial_height(mut doc: GenesisDocument) -> GenesisDocument {
    if doc.initial_height == 0 {
        doc.initial_height = 1;
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use genmig_core::AppStateMap;

    fn doc() -> GenesisDocument {
        GenesisDocument {
            genesis_time: GenesisTime::parse("2019-12-11T16:11:34Z").unwrap(),
            chain_id: ChainId::new("cosmoshub-3").unwrap(),
            initial_height: 0,
            consensus_params: None,
            validators: Vec::new(),
            app_hash: String::new(),
            app_state: AppStateMap::new(),
        }
    }

    #[test]
    fn empty_overrides_change_nothing() {
        let ov = MetadataOverrides {
            genesis_time: Some(String::new()),
            chain_id: Some(String::new()),
            initial_height: 0,
        };
        assert!(ov.is_empty());
        assert_eq!(apply_overrides(doc(), &ov).unwrap(), doc());
        assert_eq!(apply_overrides(doc(), &MetadataOverrides::default()).unwrap(), doc());
    }

    #[test]
    fn all_overrides_applied() {
        let ov = MetadataOverrides {
            genesis_time: Some("2021-02-18T06:00:00Z".into()),
            chain_id: Some("cosmoshub-4".into()),
            initial_height: 5_200_791,
        };
        let out = apply_overrides(doc(), &ov).unwrap();
        assert_eq!(out.genesis_time.to_rfc3339(), "2021-02-18T06:00:00Z");
        assert_eq!(out.chain_id.as_str(), "cosmoshub-4");
        assert_eq!(out.initial_height, 5_200_791);
    }

    #[test]
    fn offset_time_normalized_to_utc() {
        let ov = MetadataOverrides {
            genesis_time: Some("2021-02-18T08:00:00.500+02:00".into()),
            ..Default::default()
        };
        let out = apply_overrides(doc(), &ov).unwrap();
        assert_eq!(out.genesis_time.to_rfc3339(), "2021-02-18T06:00:00.5Z");
    }

    #[test]
    fn invalid_time_leaves_nothing_applied() {
        let ov = MetadataOverrides {
            genesis_time: Some("2021-02-18".into()),
            chain_id: Some("cosmoshub-4".into()),
            initial_height: 7,
        };
        assert!(matches!(
            apply_overrides(doc(), &ov),
            Err(GenesisError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn overlong_chain_id_rejected() {
        let ov = MetadataOverrides {
            chain_id: Some("c".repeat(51)),
            ..Default::default()
        };
        assert!(matches!(
            apply_overrides(doc(), &ov),
            Err(GenesisError::InvalidChainId(_))
        ));
    }

    #[test]
    fn oversized_height_rejected() {
        let ov = MetadataOverrides {
            initial_height: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(
            apply_overrides(doc(), &ov),
            Err(GenesisError::InvalidOverride(_))
        ));
    }

    #[test]
    fn zero_height_completed_to_one() {
        assert_eq!(complete_initial_height(doc()).initial_height, 1);
        let mut d = doc();
        d.initial_height = 42;
        assert_eq!(complete_initial_height(d).initial_height, 42);
    }
}
