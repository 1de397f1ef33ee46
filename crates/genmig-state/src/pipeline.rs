//! # Migration Pipeline
//!
//! Runs the stages in their fixed order:
//!
//! ```text
//! load ─► normalize consensus params ─► labelled app-state transform
//!      ─► metadata overrides ─► complete initial height
//!      ─► IBC transform ─► key replacement ─► canonical bytes ─► digest
//! ```
//!
//! The labelled transform sees the document metadata as exported. The IBC
//! transform sees the finalized metadata, because its expiry cut-off and
//! processed-height entries must agree with the chain that will start from
//! the output.
//!
//! Each stage consumes the document and returns a new one; a failure at any
//! stage aborts the run with nothing produced.

use std::path::Path;

use genmig_core::{genesis_digest, CanonicalBytes, ContentDigest, GenesisDocument, GenesisError};

use crate::config::MigrationConfig;
use crate::consensus::normalize_consensus_params;
use crate::ibc::IbcMigration;
use crate::keys::{load_keyfile, replace_consensus_keys, ValidatorKeyRecord};
use crate::loader::load_genesis;
use crate::overrides::{apply_overrides, complete_initial_height, MetadataOverrides};
use crate::registry::{MigrationContext, MigrationRegistry, MigrationTransform};

/// Result of a successful migration.
#[derive(Debug, Clone)]
pub struct MigrationOutput {
    /// The migrated document.
    pub document: GenesisDocument,
    /// Its canonical JSON encoding.
    pub canonical: CanonicalBytes,
    /// SHA-256 of `canonical`.
    pub digest: ContentDigest,
}

/// Drives a genesis document through every migration stage.
#[derive(Debug)]
pub struct GenesisMigrator {
    registry: MigrationRegistry,
    config: MigrationConfig,
}

impl GenesisMigrator {
    /// Build a migrator over an explicit registry.
    pub fn new(registry: MigrationRegistry, config: MigrationConfig) -> Self {
        Self { registry, config }
    }

    /// A migrator with the built-in registry.
    pub fn with_config(config: MigrationConfig) -> Self {
        Self::new(MigrationRegistry::with_builtin(), config)
    }

    /// Migrate the raw bytes of an exported genesis file.
    ///
    /// `replacement_keys` must already be loaded; `None` skips key
    /// replacement entirely.
    ///
    /// # Errors
    ///
    /// Propagates the first [`GenesisError`] raised by any stage.
    pub fn run(
        &self,
        input: &[u8],
        overrides: &MetadataOverrides,
        replacement_keys: Option<&[ValidatorKeyRecord]>,
    ) -> Result<MigrationOutput, GenesisError> {
        let mut doc = load_genesis(input)?;
        doc.consensus_params = Some(normalize_consensus_params(
            doc.consensus_params.take(),
            &self.config.evidence,
        )?);

        let exported = MigrationContext::from_document(&doc);
        let app_state = std::mem::take(&mut doc.app_state);
        doc.app_state = self
            .registry
            .apply(&self.config.first_migration, app_state, &exported)?;

        let mut doc = complete_initial_height(apply_overrides(doc, overrides)?);
        let finalized = MigrationContext::from_document(&doc);
        let app_state = std::mem::take(&mut doc.app_state);
        doc.app_state = IbcMigration::new(self.config.ibc).migrate(app_state, &finalized)?;

        let document = match replacement_keys {
            Some(records) => replace_consensus_keys(doc, records)?,
            None => doc,
        };

        let canonical = CanonicalBytes::new(&document)?;
        let digest = genesis_digest(&canonical);
        tracing::info!(
            chain_id = %document.chain_id,
            initial_height = document.initial_height,
            bytes = canonical.len(),
            %digest,
            "genesis migration complete"
        );
        Ok(MigrationOutput {
            document,
            canonical,
            digest,
        })
    }
}

/// Load replacement keys when a keyfile path is given.
///
/// An empty path means no replacement.
///
/// # Errors
///
/// Returns [`GenesisError::KeyfileError`] if the file cannot be loaded.
pub fn load_replacement_keys(path: &str) -> Result<Option<Vec<ValidatorKeyRecord>>, GenesisError> {
    if path.is_empty() {
        return Ok(None);
    }
    load_keyfile(Path::new(path)).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::transform_fn;
    use genmig_core::AppStateMap;
    use serde_json::json;

    fn input() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "genesis_time": "2019-12-11T16:11:34Z",
            "chain_id": "cosmoshub-3",
            "consensus_params": {"evidence": {"max_age": "1000000"}},
            "app_hash": "",
            "app_state": {"foo": {"b": 2, "a": 1}}
        }))
        .unwrap()
    }

    #[test]
    fn default_run_completes_height() {
        let out = GenesisMigrator::with_config(MigrationConfig::default())
            .run(&input(), &MetadataOverrides::default(), None)
            .unwrap();
        assert_eq!(out.document.initial_height, 1);
        assert_eq!(out.digest, genesis_digest(&out.canonical));
    }

    #[test]
    fn labelled_transform_sees_exported_metadata() {
        let mut registry = MigrationRegistry::new();
        registry.register(
            "v0.43",
            transform_fn(|mut s: AppStateMap, c: &MigrationContext| {
                s.insert("seen", json!([c.chain_id.as_str(), c.initial_height]));
                Ok(s)
            }),
        );
        let ov = MetadataOverrides {
            chain_id: Some("cosmoshub-4".into()),
            initial_height: 100,
            ..Default::default()
        };
        let out = GenesisMigrator::new(registry, MigrationConfig::default())
            .run(&input(), &ov, None)
            .unwrap();
        assert_eq!(out.document.app_state.get("seen"), Some(&json!(["cosmoshub-3", 0])));
        assert_eq!(out.document.chain_id.as_str(), "cosmoshub-4");
    }

    #[test]
    fn unknown_first_migration_fails() {
        let config = MigrationConfig {
            first_migration: "v9.99".into(),
            ..Default::default()
        };
        let err = GenesisMigrator::with_config(config)
            .run(&input(), &MetadataOverrides::default(), None)
            .unwrap_err();
        assert!(matches!(err, GenesisError::UnknownMigration(_)));
    }

    #[test]
    fn empty_keyfile_path_skips_loading() {
        assert_eq!(load_replacement_keys("").unwrap(), None);
        assert!(matches!(
            load_replacement_keys("/nonexistent/keys.json"),
            Err(GenesisError::KeyfileError(_))
        ));
    }
}
