//! State machines for file-based databases
//!
//! The database is its files, so every operation reduces to work on the
//! physical-file manifest after the driver's pools for it are flushed.

use crate::database::connection::ConnectionResolver;
use crate::database::engine::{CopyTarget, RenameTarget};
use crate::database::handle::DatabaseHandle;
use crate::error::{ForgeError, Result};
use crate::lifecycle::files;
use crate::lifecycle::state::{LifecycleOperation, LifecycleStep, ResourceState, StateMachine};
use chrono::Utc;
use tracing::info;

pub fn exists(handle: &DatabaseHandle) -> bool {
    handle.primary_file().path.is_file()
}

fn require_primary(handle: &DatabaseHandle) -> Result<()> {
    if exists(handle) {
        Ok(())
    } else {
        Err(ForgeError::NotFound(handle.primary_file().path.display().to_string()))
    }
}

/// `Idle → FileInitialized → Done`
pub async fn create(resolver: &ConnectionResolver, handle: &DatabaseHandle) -> Result<()> {
    let path = &handle.primary_file().path;
    if path.exists() {
        return Err(ForgeError::AlreadyExists(path.display().to_string()));
    }

    let factory = resolver.driver_factory(handle.provider)?;
    let connection_string = resolver.connection_string(handle.provider, &handle.connection_params())?;

    let mut machine = StateMachine::new(LifecycleOperation::Create, ResourceState::absent(&handle.name));
    files::ensure_parent(path)?;
    machine
        .run(
            LifecycleStep::FileInitialized,
            factory.initialize_file(path, &connection_string),
        )
        .await?;
    *machine.state_mut() = ResourceState::online(&handle.name);
    machine.finish();
    Ok(())
}

/// `Idle → PoolsCleared → FilesDeleted → Done`
pub async fn delete(resolver: &ConnectionResolver, handle: &DatabaseHandle) -> Result<()> {
    let mut machine = StateMachine::new(LifecycleOperation::Delete, ResourceState::online(&handle.name));
    machine
        .run(
            LifecycleStep::PoolsCleared,
            resolver.clear_pools(handle.provider, &handle.connection_params()),
        )
        .await?;
    machine
        .run(LifecycleStep::FilesDeleted, async { files::delete_database_files(handle) })
        .await?;
    *machine.state_mut() = ResourceState::absent(&handle.name);
    machine.finish();
    Ok(())
}

/// Rename the primary file and any companion lock file
///
/// `Idle → PoolsCleared → FilesRenamed → Done`
pub async fn rename(
    resolver: &ConnectionResolver,
    handle: &mut DatabaseHandle,
    target: &RenameTarget,
    operation: LifecycleOperation,
) -> Result<()> {
    require_primary(handle)?;
    let new_files = handle.relocated_files(&target.name, target.directory.as_deref());
    info!(database = %handle.name, to = %new_files[0].path.display(), "Renaming database files");

    let mut machine = StateMachine::new(operation, ResourceState::online(&handle.name));
    machine
        .run(
            LifecycleStep::PoolsCleared,
            resolver.clear_pools(handle.provider, &handle.connection_params()),
        )
        .await?;

    let old_files = handle.physical_files().to_vec();
    machine
        .run(LifecycleStep::FilesRenamed, async {
            files::rename_files(&old_files, &new_files)
        })
        .await?;

    handle.set_name(target.name.clone());
    handle.set_physical_files(new_files);
    machine.state_mut().catalog_name = target.name.clone();
    machine.finish();
    Ok(())
}

/// Copy every file of the manifest; the returned handle names the copy
///
/// `Idle → PoolsCleared → FilesCopied → Done`
pub async fn copy(
    resolver: &ConnectionResolver,
    handle: &DatabaseHandle,
    target: &CopyTarget,
    operation: LifecycleOperation,
) -> Result<DatabaseHandle> {
    require_primary(handle)?;
    let new_files = handle.relocated_files(&target.name, target.directory.as_deref());
    files::ensure_distinct(handle.physical_files(), &new_files)?;

    let mut machine = StateMachine::new(operation, ResourceState::online(&handle.name));
    machine
        .run(
            LifecycleStep::PoolsCleared,
            resolver.clear_pools(handle.provider, &handle.connection_params()),
        )
        .await?;

    let old_files = handle.physical_files().to_vec();
    machine
        .run(LifecycleStep::FilesCopied, async { files::copy_files(&old_files, &new_files) })
        .await?;
    machine.finish();

    let mut copy = handle.clone();
    copy.set_name(target.name.clone());
    copy.set_physical_files(new_files);
    copy.created_at = Utc::now();
    Ok(copy)
}
