//! State machines for server-hosted databases
//!
//! Every administrative step opens its own connection to `master`, runs one
//! statement and closes the connection again before the next step, so no
//! connection is held across a file move.

use crate::database::connection::ConnectionResolver;
use crate::database::engine::{CopyTarget, RenameTarget};
use crate::database::handle::{DatabaseHandle, PhysicalFile};
use crate::error::{ForgeError, Result};
use crate::lifecycle::commands;
use crate::lifecycle::files;
use crate::lifecycle::state::{
    AccessMode, Availability, LifecycleOperation, LifecycleStep, ResourceState, StateMachine,
};
use std::path::PathBuf;
use tracing::{debug, info};

/// Suffix of the temporary copies made while copying a database
pub const COPY_SUFFIX: &str = "copytmp";

/// Run one administrative statement on a fresh connection
pub async fn execute_admin(resolver: &ConnectionResolver, handle: &DatabaseHandle, sql: &str) -> Result<u64> {
    let mut conn = resolver.open(handle.provider, &handle.admin_params()).await?;
    debug!(database = %handle.name, command = sql, "Executing administrative command");
    let result = conn.execute(sql).await;
    let closed = conn.close().await;
    let rows = result?;
    closed?;
    Ok(rows)
}

/// Run one administrative query on a fresh connection
pub async fn query_admin(resolver: &ConnectionResolver, handle: &DatabaseHandle, sql: &str) -> Result<Vec<String>> {
    let mut conn = resolver.open(handle.provider, &handle.admin_params()).await?;
    debug!(database = %handle.name, query = sql, "Running administrative query");
    let result = conn.query_column(sql).await;
    let closed = conn.close().await;
    let rows = result?;
    closed?;
    Ok(rows)
}

fn catalog(handle: &DatabaseHandle) -> &'static str {
    handle.descriptor().catalog.unwrap_or("sys")
}

pub async fn exists(resolver: &ConnectionResolver, handle: &DatabaseHandle) -> Result<bool> {
    let sql = commands::database_exists(catalog(handle), &handle.name);
    Ok(!query_admin(resolver, handle, &sql).await?.is_empty())
}

/// `Idle → ServerConnected → Created|AttachedFromFiles → Done`
pub async fn create(resolver: &ConnectionResolver, handle: &DatabaseHandle, for_attach: bool) -> Result<()> {
    let operation = if for_attach {
        LifecycleOperation::Attach
    } else {
        LifecycleOperation::Create
    };
    let mut machine = StateMachine::new(operation, ResourceState::absent(&handle.name));

    let mut conn = machine
        .run(
            LifecycleStep::ServerConnected,
            resolver.open(handle.provider, &handle.admin_params()),
        )
        .await?;

    if !for_attach {
        let prepared = handle
            .physical_files()
            .iter()
            .try_for_each(|file| files::ensure_parent(&file.path));
        if let Err(err) = prepared {
            let _ = conn.close().await;
            return Err(machine.fail(err));
        }
    }

    let sql = commands::create_database(&handle.name, handle.physical_files(), for_attach);
    debug!(database = %handle.name, command = %sql, "Executing administrative command");
    let result = conn.execute(&sql).await;
    let closed = conn.close().await;

    let step = if for_attach {
        LifecycleStep::AttachedFromFiles
    } else {
        LifecycleStep::Created
    };
    machine.run(step, async { result.and(closed) }).await?;
    *machine.state_mut() = ResourceState::online(&handle.name);
    machine.finish();
    Ok(())
}

/// Detach without touching the files
pub async fn detach(resolver: &ConnectionResolver, handle: &DatabaseHandle) -> Result<()> {
    let mut machine = StateMachine::new(LifecycleOperation::Detach, ResourceState::online(&handle.name));
    machine
        .run(
            LifecycleStep::PoolsCleared,
            resolver.clear_pools(handle.provider, &handle.connection_params()),
        )
        .await?;
    machine
        .run(
            LifecycleStep::SingleUserMode,
            execute_admin(resolver, handle, &commands::set_single_user(&handle.name)),
        )
        .await?;
    machine.state_mut().access = AccessMode::SingleUser;
    machine
        .run(
            LifecycleStep::Detached,
            execute_admin(resolver, handle, &commands::detach_database(&handle.name)),
        )
        .await?;
    machine.state_mut().availability = Availability::Absent;
    machine.finish();
    Ok(())
}

/// `Idle → PoolsCleared → [SingleUserMode] → Dropped → FilesDeleted → Done`
///
/// A database the server no longer knows is not an error; only its files
/// are removed.
pub async fn delete(resolver: &ConnectionResolver, handle: &DatabaseHandle) -> Result<()> {
    let mut machine = StateMachine::new(LifecycleOperation::Delete, ResourceState::online(&handle.name));
    machine
        .run(
            LifecycleStep::PoolsCleared,
            resolver.clear_pools(handle.provider, &handle.connection_params()),
        )
        .await?;

    let attached = match exists(resolver, handle).await {
        Ok(attached) => attached,
        Err(err) => return Err(machine.fail(err)),
    };

    if attached {
        machine
            .run(
                LifecycleStep::SingleUserMode,
                execute_admin(resolver, handle, &commands::set_single_user(&handle.name)),
            )
            .await?;
        machine.state_mut().access = AccessMode::SingleUser;
        machine
            .run(
                LifecycleStep::Dropped,
                execute_admin(resolver, handle, &commands::drop_database(&handle.name)),
            )
            .await?;
    } else {
        info!(database = %handle.name, "Database not attached, deleting files only");
        machine.advance(LifecycleStep::Dropped);
    }
    *machine.state_mut() = ResourceState::absent(&handle.name);

    machine
        .run(LifecycleStep::FilesDeleted, async { files::delete_database_files(handle) })
        .await?;
    machine.finish();
    Ok(())
}

/// What a rename changes
struct RenamePlan {
    operation: LifecycleOperation,
    new_name: Option<String>,
    new_files: Option<Vec<PhysicalFile>>,
}

impl RenamePlan {
    fn new(operation: LifecycleOperation, handle: &DatabaseHandle, target: &RenameTarget, rename_catalog: bool) -> Self {
        let new_name = Some(target.name.clone()).filter(|name| rename_catalog && *name != handle.name);
        let new_files = if target.relocate_files {
            let files = handle.relocated_files(&target.name, target.directory.as_deref());
            Some(files).filter(|files| files.as_slice() != handle.physical_files())
        } else {
            None
        };
        Self {
            operation,
            new_name,
            new_files,
        }
    }
}

/// Rename a database and, unless told otherwise, its physical files
///
/// `Idle → PoolsCleared → SingleUserMode → [LogicalNameChanged] →
/// [FilesModified → Offline → FilesRenamed → Online] → MultiUserMode → Done`
pub async fn rename(resolver: &ConnectionResolver, handle: &mut DatabaseHandle, target: &RenameTarget) -> Result<()> {
    let plan = RenamePlan::new(LifecycleOperation::Rename, handle, target, true);
    run_rename(resolver, handle, plan).await
}

/// Relocate the physical files, keeping the catalog name
pub async fn rename_files(
    resolver: &ConnectionResolver,
    handle: &mut DatabaseHandle,
    target: &RenameTarget,
) -> Result<()> {
    let target = RenameTarget {
        relocate_files: true,
        ..target.clone()
    };
    let plan = RenamePlan::new(LifecycleOperation::RenameFiles, handle, &target, false);
    run_rename(resolver, handle, plan).await
}

async fn run_rename(resolver: &ConnectionResolver, handle: &mut DatabaseHandle, plan: RenamePlan) -> Result<()> {
    let mut machine = StateMachine::new(plan.operation, ResourceState::online(&handle.name));
    info!(database = %handle.name, new_name = ?plan.new_name, "Renaming database");

    machine
        .run(
            LifecycleStep::PoolsCleared,
            resolver.clear_pools(handle.provider, &handle.connection_params()),
        )
        .await?;
    machine
        .run(
            LifecycleStep::SingleUserMode,
            execute_admin(resolver, handle, &commands::set_single_user(&handle.name)),
        )
        .await?;
    machine.state_mut().access = AccessMode::SingleUser;

    if let Some(new_name) = &plan.new_name {
        let sql = commands::modify_name(&handle.name, new_name);
        machine
            .run(LifecycleStep::LogicalNameChanged, execute_admin(resolver, handle, &sql))
            .await?;
        handle.set_name(new_name.clone());
        machine.state_mut().catalog_name = new_name.clone();
    }

    if let Some(new_files) = plan.new_files {
        let old_files = handle.physical_files().to_vec();

        let current: &DatabaseHandle = handle;
        let modify = async {
            for (old, new) in old_files.iter().zip(&new_files) {
                let path = Some(new.path.as_path()).filter(|p| *p != old.path);
                let sql = commands::modify_file(&current.name, &old.logical_name, &new.logical_name, path);
                execute_admin(resolver, current, &sql).await?;
            }
            Ok(())
        };
        machine.run(LifecycleStep::FilesModified, modify).await?;

        machine
            .run(
                LifecycleStep::Offline,
                execute_admin(resolver, handle, &commands::set_offline(&handle.name)),
            )
            .await?;
        machine.state_mut().availability = Availability::Offline;

        machine
            .run(LifecycleStep::FilesRenamed, async {
                files::rename_files(&old_files, &new_files)
            })
            .await?;
        handle.set_physical_files(new_files);

        machine
            .run(
                LifecycleStep::Online,
                execute_admin(resolver, handle, &commands::set_online(&handle.name)),
            )
            .await?;
        machine.state_mut().availability = Availability::Online;
    }

    machine
        .run(
            LifecycleStep::MultiUserMode,
            execute_admin(resolver, handle, &commands::set_multi_user(&handle.name)),
        )
        .await?;
    machine.state_mut().access = AccessMode::MultiUser;
    machine.finish();
    Ok(())
}

fn temporary_path(path: &std::path::Path) -> PathBuf {
    let mut text = path.as_os_str().to_os_string();
    text.push(".");
    text.push(COPY_SUFFIX);
    PathBuf::from(text)
}

/// Copy the files of an attached database while it is briefly offline
///
/// Returns a handle naming the copied files; the copy is not attached.
pub async fn copy_files(
    resolver: &ConnectionResolver,
    handle: &DatabaseHandle,
    target: &CopyTarget,
) -> Result<DatabaseHandle> {
    let new_files = handle.relocated_files(&target.name, target.directory.as_deref());
    files::ensure_distinct(handle.physical_files(), &new_files)?;
    let mut machine = StateMachine::new(LifecycleOperation::CopyFiles, ResourceState::online(&handle.name));

    machine
        .run(
            LifecycleStep::PoolsCleared,
            resolver.clear_pools(handle.provider, &handle.connection_params()),
        )
        .await?;
    machine
        .run(
            LifecycleStep::Offline,
            execute_admin(resolver, handle, &commands::set_offline(&handle.name)),
        )
        .await?;
    machine.state_mut().availability = Availability::Offline;

    let source = handle.physical_files().to_vec();
    machine
        .run(LifecycleStep::FilesCopied, async { files::copy_files(&source, &new_files) })
        .await?;

    machine
        .run(
            LifecycleStep::Online,
            execute_admin(resolver, handle, &commands::set_online(&handle.name)),
        )
        .await?;
    machine.state_mut().availability = Availability::Online;
    machine.finish();

    let mut copy = handle.clone();
    copy.set_name(target.name.clone());
    copy.set_physical_files(new_files);
    Ok(copy)
}

/// Copy a database so that both the original and the copy stay usable
///
/// The original is only offline while its files are copied: the copies are
/// taken under temporary names, the original is renamed (and its files
/// relocated) to the target, then the copies take the old file names and
/// are attached under the old catalog name.
pub async fn copy(resolver: &ConnectionResolver, handle: &DatabaseHandle, target: &CopyTarget) -> Result<DatabaseHandle> {
    if target.name.eq_ignore_ascii_case(&handle.name) {
        return Err(ForgeError::AlreadyExists(format!("database '{}'", handle.name)));
    }
    files::ensure_distinct(
        handle.physical_files(),
        &handle.relocated_files(&target.name, target.directory.as_deref()),
    )?;

    let mut machine = StateMachine::new(LifecycleOperation::Copy, ResourceState::online(&handle.name));
    info!(database = %handle.name, target = %target.name, "Copying database");

    let manifest = handle.physical_files().to_vec();
    let temporary: Vec<PhysicalFile> = manifest
        .iter()
        .map(|f| PhysicalFile::new(f.role, f.logical_name.clone(), temporary_path(&f.path)))
        .collect();
    machine.advance(LifecycleStep::ManifestSnapshot);

    machine
        .run(
            LifecycleStep::PoolsCleared,
            resolver.clear_pools(handle.provider, &handle.connection_params()),
        )
        .await?;
    machine
        .run(
            LifecycleStep::Offline,
            execute_admin(resolver, handle, &commands::set_offline(&handle.name)),
        )
        .await?;
    machine.state_mut().availability = Availability::Offline;

    machine
        .run(LifecycleStep::FilesCopied, async { files::copy_files(&manifest, &temporary) })
        .await?;

    machine
        .run(
            LifecycleStep::Online,
            execute_admin(resolver, handle, &commands::set_online(&handle.name)),
        )
        .await?;
    machine.state_mut().availability = Availability::Online;
    machine
        .run(
            LifecycleStep::MultiUserMode,
            execute_admin(resolver, handle, &commands::set_multi_user(&handle.name)),
        )
        .await?;

    let mut renamed = handle.clone();
    let rename_target = RenameTarget {
        name: target.name.clone(),
        directory: target.directory.clone(),
        relocate_files: true,
    };
    machine
        .run(LifecycleStep::OriginalRenamed, rename(resolver, &mut renamed, &rename_target))
        .await?;
    *machine.state_mut() = ResourceState::absent(&handle.name);

    machine
        .run(LifecycleStep::CopiesRestored, async {
            files::rename_files(&temporary, &manifest)
        })
        .await?;

    machine
        .run(
            LifecycleStep::AttachedFromFiles,
            execute_admin(
                resolver,
                handle,
                &commands::create_database(&handle.name, &manifest, true),
            ),
        )
        .await?;
    *machine.state_mut() = ResourceState::online(&handle.name);
    machine.finish();

    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_temporary_path() {
        assert_eq!(
            temporary_path(Path::new("/data/Orders.mdf")),
            PathBuf::from("/data/Orders.mdf.copytmp")
        );
    }
}
