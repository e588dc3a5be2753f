//! Lifecycle orchestration
//!
//! The [`LifecycleOrchestrator`] is the entry point for create, exists,
//! delete, rename and copy. It picks the engine from the registry and runs
//! the engine's state machine while holding a lock keyed by the database's
//! identity, so two operations never toggle the same database at once.

pub mod commands;
pub mod file_based;
pub mod files;
pub mod server;
pub mod state;

pub use state::{AccessMode, Availability, LifecycleOperation, LifecycleStep, ResourceState, StateMachine};

use crate::database::engine::{CopyTarget, DatabaseEngine, RenameTarget};
use crate::database::handle::DatabaseHandle;
use crate::database::registry::EngineRegistry;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

/// Runs lifecycle operations one database at a time
pub struct LifecycleOrchestrator {
    registry: Arc<EngineRegistry>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LifecycleOrchestrator {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    fn engine(&self, handle: &DatabaseHandle) -> Result<Arc<dyn DatabaseEngine>> {
        self.registry.engine(handle.engine)
    }

    async fn lock_key(&self, key: String) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        lock.lock_owned().await
    }

    /// Lock several keys in sorted order
    async fn lock_keys(&self, mut keys: Vec<String>) -> Vec<OwnedMutexGuard<()>> {
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock_key(key).await);
        }
        guards
    }

    /// Identity the database would have under a new name and directory
    fn target_key(handle: &DatabaseHandle, name: &str, directory: Option<&std::path::Path>) -> String {
        let mut target = handle.clone();
        target.set_physical_files(handle.relocated_files(name, directory));
        target.set_name(name);
        target.identity_key()
    }

    pub async fn create(&self, handle: &DatabaseHandle) -> Result<()> {
        let engine = self.engine(handle)?;
        let _guard = self.lock_key(handle.identity_key()).await;
        info!(database = %handle.name, engine = %handle.engine, "Creating database");
        engine.create_database(handle).await
    }

    /// Attach an existing set of database files under the handle's name
    pub async fn attach(&self, handle: &DatabaseHandle) -> Result<()> {
        let engine = self.engine(handle)?;
        let _guard = self.lock_key(handle.identity_key()).await;
        info!(database = %handle.name, engine = %handle.engine, "Attaching database");
        engine.attach_database(handle).await
    }

    pub async fn detach(&self, handle: &DatabaseHandle) -> Result<()> {
        let engine = self.engine(handle)?;
        let _guard = self.lock_key(handle.identity_key()).await;
        info!(database = %handle.name, engine = %handle.engine, "Detaching database");
        engine.detach_database(handle).await
    }

    pub async fn exists(&self, handle: &DatabaseHandle) -> Result<bool> {
        let engine = self.engine(handle)?;
        let _guard = self.lock_key(handle.identity_key()).await;
        engine.database_exists(handle).await
    }

    pub async fn delete(&self, handle: &DatabaseHandle) -> Result<()> {
        let engine = self.engine(handle)?;
        let _guard = self.lock_key(handle.identity_key()).await;
        info!(database = %handle.name, engine = %handle.engine, "Deleting database");
        engine.delete_database(handle).await
    }

    /// Rename a database; on success the handle carries the new name and files
    pub async fn rename(&self, handle: &mut DatabaseHandle, target: &RenameTarget) -> Result<()> {
        let engine = self.engine(handle)?;
        let keys = vec![
            handle.identity_key(),
            Self::target_key(handle, &target.name, target.directory.as_deref()),
        ];
        let _guards = self.lock_keys(keys).await;
        info!(database = %handle.name, new_name = %target.name, "Renaming database");
        engine.rename_database(handle, target).await
    }

    pub async fn rename_files(&self, handle: &mut DatabaseHandle, target: &RenameTarget) -> Result<()> {
        let engine = self.engine(handle)?;
        let _guard = self.lock_key(handle.identity_key()).await;
        info!(database = %handle.name, target = %target.name, "Renaming database files");
        engine.rename_database_files(handle, target).await
    }

    /// Copy a database; returns the handle of the copy
    pub async fn copy(&self, handle: &DatabaseHandle, target: &CopyTarget) -> Result<DatabaseHandle> {
        let engine = self.engine(handle)?;
        let keys = vec![
            handle.identity_key(),
            Self::target_key(handle, &target.name, target.directory.as_deref()),
        ];
        let _guards = self.lock_keys(keys).await;
        info!(database = %handle.name, target = %target.name, "Copying database");
        engine.copy_database(handle, target).await
    }

    pub async fn copy_files(&self, handle: &DatabaseHandle, target: &CopyTarget) -> Result<DatabaseHandle> {
        let engine = self.engine(handle)?;
        let keys = vec![
            handle.identity_key(),
            Self::target_key(handle, &target.name, target.directory.as_deref()),
        ];
        let _guards = self.lock_keys(keys).await;
        info!(database = %handle.name, target = %target.name, "Copying database files");
        engine.copy_database_files(handle, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connection::ConnectionResolver;
    use crate::provider::{EngineKind, ProviderDescriptor, ProviderMechanism};
    use crate::schema::SchemaTranslator;
    use std::time::Duration;

    fn orchestrator() -> LifecycleOrchestrator {
        let registry = EngineRegistry::new(Arc::new(ConnectionResolver::new()), SchemaTranslator::default());
        LifecycleOrchestrator::new(Arc::new(registry))
    }

    fn handle(name: &str) -> DatabaseHandle {
        let provider = ProviderDescriptor::new(EngineKind::SqlServer, ProviderMechanism::Native)
            .identity()
            .unwrap();
        DatabaseHandle::new(EngineKind::SqlServer, provider, name, "/data").with_data_source("db01")
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let orchestrator = orchestrator();
        let guard = orchestrator.lock_key(handle("Orders").identity_key()).await;

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            orchestrator.lock_key(handle("ORDERS").identity_key()),
        )
        .await;
        assert!(blocked.is_err());

        let other = tokio::time::timeout(
            Duration::from_millis(50),
            orchestrator.lock_key(handle("Customers").identity_key()),
        )
        .await;
        assert!(other.is_ok());
        drop(guard);
    }

    #[test]
    fn test_target_key_follows_name() {
        let source = handle("Orders");
        assert_eq!(
            LifecycleOrchestrator::target_key(&source, "Orders2", None),
            "sqlserver|db01|orders2"
        );
    }
}
