//! File-based engines (SQL Server Compact, Access, SQLite)

use crate::database::connection::ConnectionResolver;
use crate::database::engine::{CopyTarget, DatabaseEngine, EngineContext, RenameTarget};
use crate::database::handle::DatabaseHandle;
use crate::error::Result;
use crate::lifecycle::file_based;
use crate::lifecycle::files;
use crate::lifecycle::state::LifecycleOperation;
use crate::provider::EngineKind;
use crate::schema::SchemaTranslator;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

pub struct FileEngine {
    context: EngineContext,
}

impl FileEngine {
    pub fn new(kind: EngineKind, resolver: Arc<ConnectionResolver>, translator: SchemaTranslator) -> Self {
        Self {
            context: EngineContext::new(kind, resolver, translator),
        }
    }

    pub fn with_context(context: EngineContext) -> Self {
        Self { context }
    }

    fn tables_query(&self) -> &'static str {
        match self.kind() {
            EngineKind::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            EngineKind::Access => "SELECT Name FROM MSysObjects WHERE Type = 1 AND Flags = 0 ORDER BY Name",
            _ => "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'TABLE' ORDER BY TABLE_NAME",
        }
    }

    fn columns_query(&self, table: &str) -> String {
        match self.kind() {
            EngineKind::Sqlite => format!("SELECT name FROM pragma_table_info('{}') ORDER BY cid", escape(table)),
            _ => format!(
                "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = '{}' ORDER BY ORDINAL_POSITION",
                escape(table)
            ),
        }
    }

    async fn query(&self, handle: &DatabaseHandle, sql: &str) -> Result<Vec<String>> {
        let mut conn = self.create_connection(handle).await?;
        let result = conn.query_column(sql).await;
        let closed = conn.close().await;
        let rows = result?;
        closed?;
        Ok(rows)
    }
}

#[async_trait]
impl DatabaseEngine for FileEngine {
    fn context(&self) -> &EngineContext {
        &self.context
    }

    async fn enumerate_potential_databases(&self, handle: &DatabaseHandle, directory: &Path) -> Result<Vec<PathBuf>> {
        self.context.require(
            self.descriptor().capabilities.can_enumerate_potential_databases,
            "EnumeratePotentialDatabases",
        )?;
        files::list_with_extension(directory, &self.default_file_ext(handle)?)
    }

    async fn enumerate_tables(&self, handle: &DatabaseHandle) -> Result<Vec<String>> {
        self.context.require(self.descriptor().capabilities.can_enumerate_tables, "EnumerateTables")?;
        self.query(handle, self.tables_query()).await
    }

    async fn enumerate_columns(&self, handle: &DatabaseHandle, table: &str) -> Result<Vec<String>> {
        self.context.require(self.descriptor().capabilities.can_enumerate_columns, "EnumerateColumns")?;
        self.query(handle, &self.columns_query(table)).await
    }

    async fn create_database(&self, handle: &DatabaseHandle) -> Result<()> {
        file_based::create(self.context.resolver(), handle).await
    }

    async fn delete_database(&self, handle: &DatabaseHandle) -> Result<()> {
        file_based::delete(self.context.resolver(), handle).await
    }

    async fn database_exists(&self, handle: &DatabaseHandle) -> Result<bool> {
        Ok(file_based::exists(handle))
    }

    async fn rename_database(&self, handle: &mut DatabaseHandle, target: &RenameTarget) -> Result<()> {
        file_based::rename(self.context.resolver(), handle, target, LifecycleOperation::Rename).await
    }

    async fn copy_database(&self, handle: &DatabaseHandle, target: &CopyTarget) -> Result<DatabaseHandle> {
        file_based::copy(self.context.resolver(), handle, target, LifecycleOperation::Copy).await
    }

    async fn rename_database_files(&self, handle: &mut DatabaseHandle, target: &RenameTarget) -> Result<()> {
        file_based::rename(self.context.resolver(), handle, target, LifecycleOperation::RenameFiles).await
    }

    async fn copy_database_files(&self, handle: &DatabaseHandle, target: &CopyTarget) -> Result<DatabaseHandle> {
        file_based::copy(self.context.resolver(), handle, target, LifecycleOperation::CopyFiles).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(kind: EngineKind) -> FileEngine {
        FileEngine::new(kind, Arc::new(ConnectionResolver::new()), SchemaTranslator::default())
    }

    #[test]
    fn test_catalog_queries_per_engine() {
        assert!(engine(EngineKind::Sqlite).tables_query().contains("sqlite_master"));
        assert!(engine(EngineKind::Access).tables_query().contains("MSysObjects"));
        assert!(engine(EngineKind::SqlCompact).tables_query().contains("INFORMATION_SCHEMA"));
        assert_eq!(
            engine(EngineKind::Sqlite).columns_query("it's"),
            "SELECT name FROM pragma_table_info('it''s') ORDER BY cid"
        );
    }
}
