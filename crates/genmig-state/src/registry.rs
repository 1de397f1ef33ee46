//! # Versioned Migration Registry
//!
//! App-state transforms are looked up by version label (e.g. `v0.43`) in a
//! [`MigrationRegistry`] that the caller builds and passes into the
//! pipeline. There is no global dispatch table.
//!
//! ## Transform contract
//!
//! A [`MigrationTransform`] consumes an [`AppStateMap`] and returns a new one.
//! It may rename modules, restructure a module's JSON, split a module into
//! several, or drop deprecated fields. It must:
//!
//! - be deterministic for a given input and context
//! - leave modules it does not recognize untouched
//! - fail only on ill-formed input, never on unknown modules

use std::collections::BTreeMap;

use genmig_core::{AppStateMap, ChainId, GenesisDocument, GenesisError, GenesisTime};

use crate::config::FIRST_MIGRATION;

/// Document metadata visible to a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationContext {
    /// Chain id at the time the transform runs.
    pub chain_id: ChainId,
    /// Genesis time at the time the transform runs.
    pub genesis_time: GenesisTime,
    /// Initial height at the time the transform runs.
    pub initial_height: i64,
}

impl MigrationContext {
    /// Snapshot the metadata of a document.
    pub fn from_document(doc: &GenesisDocument) -> Self {
        Self {
            chain_id: doc.chain_id.clone(),
            genesis_time: doc.genesis_time,
            initial_height: doc.initial_height,
        }
    }
}

/// A named, pure app-state transform.
pub trait MigrationTransform: Send + Sync {
    /// Produce the migrated app-state.
    fn migrate(
        &self,
        state: AppStateMap,
        ctx: &MigrationContext,
    ) -> Result<AppStateMap, GenesisError>;
}

/// Identity transform.
///
/// Registered for [`FIRST_MIGRATION`] by [`MigrationRegistry::with_builtin()`]
/// so the pipeline runs end to end when the embedding application has no
/// SDK-specific module upgrades of its own to register.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl MigrationTransform for PassThrough {
    fn migrate(
        &self,
        state: AppStateMap,
        _ctx: &MigrationContext,
    ) -> Result<AppStateMap, GenesisError> {
        Ok(state)
    }
}

/// Declarative module-key rename, applied in order.
#[derive(Debug, Clone, Default)]
pub struct RenameModules {
    renames: Vec<(String, String)>,
}

impl RenameModules {
    /// An empty rename list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `from → to` rename.
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.push((from.into(), to.into()));
        self
    }
}

impl MigrationTransform for RenameModules {
    fn migrate(
        &self,
        mut state: AppStateMap,
        _ctx: &MigrationContext,
    ) -> Result<AppStateMap, GenesisError> {
        for (from, to) in &self.renames {
            let Some(module) = state.remove(from) else {
                continue;
            };
            if state.contains(to) {
                return Err(GenesisError::malformed_at(
                    &format!("app_state.{to}"),
                    format!("cannot rename {from} onto an existing module"),
                ));
            }
            tracing::debug!(%from, %to, "renamed module");
            state.insert(to.clone(), module);
        }
        Ok(state)
    }
}

/// Adapter turning a closure into a [`MigrationTransform`].
pub struct FnTransform<F>(F);

/// Wrap a closure as a transform.
pub fn transform_fn<F>(f: F) -> FnTransform<F>
where
    F: Fn(AppStateMap, &MigrationContext) -> Result<AppStateMap, GenesisError> + Send + Sync,
{
    FnTransform(f)
}

impl<F> MigrationTransform for FnTransform<F>
where
    F: Fn(AppStateMap, &MigrationContext) -> Result<AppStateMap, GenesisError> + Send + Sync,
{
    fn migrate(
        &self,
        state: AppStateMap,
        ctx: &MigrationContext,
    ) -> Result<AppStateMap, GenesisError> {
        (self.0)(state, ctx)
    }
}

/// Lookup table from version label to transform.
#[derive(Default)]
pub struct MigrationRegistry {
    transforms: BTreeMap<String, Box<dyn MigrationTransform>>,
}

impl MigrationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with [`PassThrough`] registered under [`FIRST_MIGRATION`].
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FIRST_MIGRATION, PassThrough);
        registry
    }

    /// Register `transform` under `label`, replacing any previous entry.
    pub fn register(
        &mut self,
        label: impl Into<String>,
        transform: impl MigrationTransform + 'static,
    ) -> &mut Self {
        self.transforms.insert(label.into(), Box::new(transform));
        self
    }

    /// Look up the transform for `label`.
    pub fn lookup(&self, label: &str) -> Option<&dyn MigrationTransform> {
        self.transforms.get(label).map(|t| t.as_ref())
    }

    /// Registered labels in sorted order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(String::as_str)
    }

    /// Look up and run the transform for `label`.
    ///
    /// # Errors
    ///
    /// Returns [`GenesisError::UnknownMigration`] if nothing is registered
    /// under `label`, or whatever the transform itself returns.
    pub fn apply(
        &self,
        label: &str,
        state: AppStateMap,
        ctx: &MigrationContext,
    ) -> Result<AppStateMap, GenesisError> {
        let transform = self
            .lookup(label)
            .ok_or_else(|| GenesisError::UnknownMigration(label.to_string()))?;
        let before = state.len();
        let migrated = transform.migrate(state, ctx)?;
        tracing::info!(
            version = label,
            modules_before = before,
            modules_after = migrated.len(),
            "applied app-state migration"
        );
        Ok(migrated)
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("labels", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}
