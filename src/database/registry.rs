//! Engine registry
//!
//! One registry is built at startup and shared by reference for the life of
//! the process. Engines are stateless apart from memoized builders, so the
//! registry needs no teardown.

use crate::database::connection::ConnectionResolver;
use crate::database::engine::DatabaseEngine;
use crate::database::engines::{FileEngine, ServerEngine};
use crate::error::{ForgeError, Result};
use crate::provider::{EngineKind, Hosting};
use crate::schema::SchemaTranslator;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Engines available to the lifecycle orchestrator
pub struct EngineRegistry {
    resolver: Arc<ConnectionResolver>,
    translator: SchemaTranslator,
    engines: BTreeMap<EngineKind, Arc<dyn DatabaseEngine>>,
    disabled: BTreeSet<EngineKind>,
}

impl EngineRegistry {
    /// Registry holding every built-in engine
    pub fn new(resolver: Arc<ConnectionResolver>, translator: SchemaTranslator) -> Self {
        let mut registry = Self {
            resolver,
            translator,
            engines: BTreeMap::new(),
            disabled: BTreeSet::new(),
        };
        for kind in EngineKind::ALL {
            let engine: Arc<dyn DatabaseEngine> = match kind.descriptor().hosting {
                Hosting::Server => Arc::new(ServerEngine::new(kind, registry.resolver.clone(), translator)),
                Hosting::File => Arc::new(FileEngine::new(kind, registry.resolver.clone(), translator)),
            };
            registry.engines.insert(kind, engine);
        }
        registry
    }

    /// Turn engines off at runtime
    pub fn with_disabled(mut self, kinds: impl IntoIterator<Item = EngineKind>) -> Self {
        for kind in kinds {
            self.disable(kind);
        }
        self
    }

    /// Install or replace the implementation of an engine
    pub fn register(&mut self, engine: Arc<dyn DatabaseEngine>) {
        debug!(engine = %engine.kind(), "Registered engine");
        self.engines.insert(engine.kind(), engine);
    }

    pub fn disable(&mut self, kind: EngineKind) {
        debug!(engine = %kind, "Disabled engine");
        self.disabled.insert(kind);
    }

    pub fn enable(&mut self, kind: EngineKind) {
        self.disabled.remove(&kind);
    }

    pub fn is_enabled(&self, kind: EngineKind) -> bool {
        self.engines.contains_key(&kind) && !self.disabled.contains(&kind)
    }

    /// Engine for `kind`; disabled or missing engines are unsupported
    pub fn engine(&self, kind: EngineKind) -> Result<Arc<dyn DatabaseEngine>> {
        if self.disabled.contains(&kind) {
            return Err(ForgeError::unsupported(kind, "EngineAccess"));
        }
        self.engines
            .get(&kind)
            .cloned()
            .ok_or_else(|| ForgeError::unsupported(kind, "EngineAccess"))
    }

    /// Enabled engines in declaration order
    pub fn kinds(&self) -> Vec<EngineKind> {
        self.engines.keys().copied().filter(|k| self.is_enabled(*k)).collect()
    }

    pub fn resolver(&self) -> &Arc<ConnectionResolver> {
        &self.resolver
    }

    pub fn translator(&self) -> SchemaTranslator {
        self.translator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EngineRegistry {
        EngineRegistry::new(Arc::new(ConnectionResolver::new()), SchemaTranslator::default())
    }

    #[test]
    fn test_builtins_registered() {
        let registry = registry();
        assert_eq!(registry.kinds(), EngineKind::ALL.to_vec());
        assert_eq!(registry.engine(EngineKind::Sqlite).unwrap().kind(), EngineKind::Sqlite);
    }

    #[test]
    fn test_disabled_engine_is_unsupported() {
        let mut registry = registry().with_disabled([EngineKind::Access]);
        assert!(matches!(
            registry.engine(EngineKind::Access),
            Err(ForgeError::UnsupportedOperation { .. })
        ));
        assert!(!registry.kinds().contains(&EngineKind::Access));

        registry.enable(EngineKind::Access);
        assert!(registry.engine(EngineKind::Access).is_ok());
    }
}
