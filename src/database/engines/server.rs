//! Server-hosted engine (SQL Server)

use crate::database::connection::ConnectionResolver;
use crate::database::engine::{CopyTarget, DatabaseEngine, EngineContext, RenameTarget};
use crate::database::handle::DatabaseHandle;
use crate::error::Result;
use crate::lifecycle::{commands, files, server};
use crate::provider::EngineKind;
use crate::schema::SchemaTranslator;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ServerEngine {
    context: EngineContext,
}

impl ServerEngine {
    pub fn new(kind: EngineKind, resolver: Arc<ConnectionResolver>, translator: SchemaTranslator) -> Self {
        Self {
            context: EngineContext::new(kind, resolver, translator),
        }
    }

    pub fn with_context(context: EngineContext) -> Self {
        Self { context }
    }

    fn catalog(&self) -> &'static str {
        self.descriptor().catalog.unwrap_or("sys")
    }

    async fn query_database(&self, handle: &DatabaseHandle, sql: &str) -> Result<Vec<String>> {
        let mut conn = self.create_connection(handle).await?;
        let result = conn.query_column(sql).await;
        let closed = conn.close().await;
        let rows = result?;
        closed?;
        Ok(rows)
    }
}

#[async_trait]
impl DatabaseEngine for ServerEngine {
    fn context(&self) -> &EngineContext {
        &self.context
    }

    async fn enumerate_servers(&self, handle: &DatabaseHandle) -> Result<Vec<String>> {
        self.context.require(self.descriptor().capabilities.can_enumerate_servers, "EnumerateServers")?;
        server::query_admin(self.context.resolver(), handle, &commands::list_servers(self.catalog())).await
    }

    async fn enumerate_databases(&self, handle: &DatabaseHandle) -> Result<Vec<String>> {
        self.context.require(self.descriptor().capabilities.can_enumerate_databases, "EnumerateDatabases")?;
        server::query_admin(self.context.resolver(), handle, &commands::list_databases(self.catalog())).await
    }

    /// Data files in `directory` that the server has not attached
    async fn enumerate_potential_databases(&self, handle: &DatabaseHandle, directory: &Path) -> Result<Vec<PathBuf>> {
        self.context.require(
            self.descriptor().capabilities.can_enumerate_potential_databases,
            "EnumeratePotentialDatabases",
        )?;
        let extension = self.default_file_ext(handle)?;
        let candidates = files::list_with_extension(directory, &extension)?;

        let attached: HashSet<String> = server::query_admin(
            self.context.resolver(),
            handle,
            &commands::list_attached_files(self.catalog()),
        )
        .await?
        .into_iter()
        .map(|path| path.to_lowercase())
        .collect();

        Ok(candidates
            .into_iter()
            .filter(|path| !attached.contains(&path.display().to_string().to_lowercase()))
            .collect())
    }

    async fn enumerate_tables(&self, handle: &DatabaseHandle) -> Result<Vec<String>> {
        self.context.require(self.descriptor().capabilities.can_enumerate_tables, "EnumerateTables")?;
        self.query_database(handle, commands::list_tables()).await
    }

    async fn enumerate_columns(&self, handle: &DatabaseHandle, table: &str) -> Result<Vec<String>> {
        self.context.require(self.descriptor().capabilities.can_enumerate_columns, "EnumerateColumns")?;
        self.query_database(handle, &commands::list_columns(table)).await
    }

    async fn create_database(&self, handle: &DatabaseHandle) -> Result<()> {
        server::create(self.context.resolver(), handle, false).await
    }

    async fn attach_database(&self, handle: &DatabaseHandle) -> Result<()> {
        self.context.require(self.descriptor().capabilities.can_attach, "AttachDatabase")?;
        server::create(self.context.resolver(), handle, true).await
    }

    async fn detach_database(&self, handle: &DatabaseHandle) -> Result<()> {
        self.context.require(self.descriptor().capabilities.can_attach, "DetachDatabase")?;
        server::detach(self.context.resolver(), handle).await
    }

    async fn delete_database(&self, handle: &DatabaseHandle) -> Result<()> {
        server::delete(self.context.resolver(), handle).await
    }

    async fn database_exists(&self, handle: &DatabaseHandle) -> Result<bool> {
        server::exists(self.context.resolver(), handle).await
    }

    async fn rename_database(&self, handle: &mut DatabaseHandle, target: &RenameTarget) -> Result<()> {
        server::rename(self.context.resolver(), handle, target).await
    }

    async fn copy_database(&self, handle: &DatabaseHandle, target: &CopyTarget) -> Result<DatabaseHandle> {
        server::copy(self.context.resolver(), handle, target).await
    }

    async fn rename_database_files(&self, handle: &mut DatabaseHandle, target: &RenameTarget) -> Result<()> {
        server::rename_files(self.context.resolver(), handle, target).await
    }

    async fn copy_database_files(&self, handle: &DatabaseHandle, target: &CopyTarget) -> Result<DatabaseHandle> {
        server::copy_files(self.context.resolver(), handle, target).await
    }
}
