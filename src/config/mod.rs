//! Configuration module
//!
//! This module handles configuration management and the application state
//! shared by the REPL: the engine registry, the orchestrator and the
//! database handles opened during the session.

pub mod storage;

pub use storage::ForgeConfig;

use crate::database::{ConnectionResolver, DatabaseHandle, EngineRegistry};
use crate::error::{ForgeError, Result};
use crate::lifecycle::LifecycleOrchestrator;
use crate::provider::{EngineKind, ProviderDescriptor, ProviderId, ProviderMechanism};
use crate::schema::SchemaTranslator;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state
pub struct AppState {
    pub config: ForgeConfig,
    pub registry: Arc<EngineRegistry>,
    pub orchestrator: Arc<LifecycleOrchestrator>,
    /// Provider used for each engine when the caller names none
    default_providers: BTreeMap<EngineKind, ProviderId>,
    /// Handles opened in this session, by alias
    handles: BTreeMap<String, DatabaseHandle>,
}

impl AppState {
    /// Build the state from a configuration
    ///
    /// Every engine gets a native provider; configured providers take
    /// precedence as the default for their engine, first one wins.
    pub fn from_config(config: ForgeConfig) -> Result<Self> {
        let mut resolver = ConnectionResolver::new();
        let mut default_providers = BTreeMap::new();

        for descriptor in &config.providers {
            let engine = descriptor.engine()?;
            let id = resolver.register_provider(descriptor.clone())?;
            default_providers.entry(engine).or_insert(id);
        }
        for engine in EngineKind::ALL {
            let id = resolver.register_provider(ProviderDescriptor::new(engine, ProviderMechanism::Native))?;
            default_providers.entry(engine).or_insert(id);
        }

        let translator = SchemaTranslator::new(config.translator.identifier_mode);
        let registry = Arc::new(
            EngineRegistry::new(Arc::new(resolver), translator)
                .with_disabled(config.engines.disabled.iter().copied()),
        );
        let orchestrator = Arc::new(LifecycleOrchestrator::new(registry.clone()));

        Ok(Self {
            config,
            registry,
            orchestrator,
            default_providers,
            handles: BTreeMap::new(),
        })
    }

    /// Load the configuration from disk and build the state
    pub fn load() -> Result<Self> {
        Self::from_config(ForgeConfig::load()?)
    }

    pub fn translator(&self) -> SchemaTranslator {
        self.registry.translator()
    }

    /// Default provider of an engine
    pub fn default_provider(&self, engine: EngineKind) -> Result<ProviderId> {
        self.default_providers
            .get(&engine)
            .copied()
            .ok_or_else(|| ForgeError::Config(format!("no provider configured for {}", engine)))
    }

    /// Directory for new server-hosted database files
    pub fn data_directory(&self) -> PathBuf {
        self.config
            .data_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Remember a handle under an alias, replacing any previous one
    pub fn insert_handle(&mut self, alias: impl Into<String>, handle: DatabaseHandle) {
        self.handles.insert(alias.into(), handle);
    }

    pub fn handle(&self, alias: &str) -> Result<&DatabaseHandle> {
        self.handles
            .get(alias)
            .ok_or_else(|| ForgeError::NotFound(format!("no database opened as '{}'", alias)))
    }

    pub fn handle_mut(&mut self, alias: &str) -> Result<&mut DatabaseHandle> {
        self.handles
            .get_mut(alias)
            .ok_or_else(|| ForgeError::NotFound(format!("no database opened as '{}'", alias)))
    }

    pub fn handles(&self) -> impl Iterator<Item = (&String, &DatabaseHandle)> {
        self.handles.iter()
    }
}

/// Shared application state
pub type SharedState = Arc<RwLock<AppState>>;

/// Wrap application state for sharing
pub fn create_shared_state(state: AppState) -> SharedState {
    Arc::new(RwLock::new(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_provider_is_default() {
        let mut config = ForgeConfig::new();
        let configured = ProviderDescriptor::new(EngineKind::Access, ProviderMechanism::OleDb)
            .with_class_id("Microsoft.Jet.OLEDB.4.0");
        config.providers.push(configured.clone());

        let state = AppState::from_config(config).unwrap();
        assert_eq!(
            state.default_provider(EngineKind::Access).unwrap(),
            configured.identity().unwrap()
        );
        assert_eq!(
            state.default_provider(EngineKind::Sqlite).unwrap(),
            ProviderDescriptor::new(EngineKind::Sqlite, ProviderMechanism::Native)
                .identity()
                .unwrap()
        );
    }

    #[test]
    fn test_disabled_engines_follow_config() {
        let mut config = ForgeConfig::new();
        config.engines.disabled.push(EngineKind::SqlCompact);
        let state = AppState::from_config(config).unwrap();
        assert!(!state.registry.is_enabled(EngineKind::SqlCompact));
        assert!(state.registry.is_enabled(EngineKind::Sqlite));
    }

    #[test]
    fn test_missing_handle_is_not_found() {
        let state = AppState::from_config(ForgeConfig::new()).unwrap();
        assert!(matches!(state.handle("nope"), Err(ForgeError::NotFound(_))));
    }
}
