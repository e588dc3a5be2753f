//! Engine capability surface
//!
//! [`DatabaseEngine`] is the one interface callers use for every engine.
//! Each capability has a default body returning
//! [`ForgeError::UnsupportedOperation`]; engines override only what their
//! descriptor advertises.

use crate::database::connection::{AdminConnection, ConnectionResolver};
use crate::database::handle::DatabaseHandle;
use crate::error::{ForgeError, Result};
use crate::provider::{EngineDescriptor, EngineKind};
use crate::schema::{DialectImpl, SchemaTranslator, TableSchema};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Where a rename should leave the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameTarget {
    /// New logical name
    pub name: String,
    /// New directory for the physical files; `None` keeps them in place
    pub directory: Option<PathBuf>,
    /// Rename the physical files along with the catalog name
    pub relocate_files: bool,
}

impl RenameTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: None,
            relocate_files: true,
        }
    }

    pub fn in_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Change only the catalog name, leaving physical files untouched
    pub fn keep_files(mut self) -> Self {
        self.relocate_files = false;
        self
    }
}

/// Name and location of a database copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTarget {
    pub name: String,
    pub directory: Option<PathBuf>,
}

impl CopyTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: None,
        }
    }

    pub fn in_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

/// Generates `CREATE TABLE` text for one engine
#[derive(Debug, Clone, Copy)]
pub struct TableBuilder {
    translator: SchemaTranslator,
    dialect: DialectImpl,
}

impl TableBuilder {
    pub fn new(translator: SchemaTranslator, dialect: DialectImpl) -> Self {
        Self { translator, dialect }
    }

    pub fn dialect(&self) -> DialectImpl {
        self.dialect
    }

    pub fn build(&self, schema: &TableSchema) -> Result<String> {
        self.translator.translate(schema, &self.dialect)
    }
}

enum BuilderBinding {
    Override(TableBuilder),
    Default(OnceLock<TableBuilder>),
}

/// State shared by every engine implementation
pub struct EngineContext {
    kind: EngineKind,
    resolver: Arc<ConnectionResolver>,
    translator: SchemaTranslator,
    table_builder: BuilderBinding,
}

impl EngineContext {
    pub fn new(kind: EngineKind, resolver: Arc<ConnectionResolver>, translator: SchemaTranslator) -> Self {
        Self {
            kind,
            resolver,
            translator,
            table_builder: BuilderBinding::Default(OnceLock::new()),
        }
    }

    /// Replace the engine's default table builder
    pub fn with_table_builder(mut self, builder: TableBuilder) -> Self {
        self.table_builder = BuilderBinding::Override(builder);
        self
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn descriptor(&self) -> &'static EngineDescriptor {
        self.kind.descriptor()
    }

    pub fn resolver(&self) -> &ConnectionResolver {
        &self.resolver
    }

    /// The table builder, built from the engine's dialect on first use
    pub fn table_builder(&self) -> &TableBuilder {
        match &self.table_builder {
            BuilderBinding::Override(builder) => builder,
            BuilderBinding::Default(cell) => cell
                .get_or_init(|| TableBuilder::new(self.translator, DialectImpl::for_engine(self.kind))),
        }
    }

    /// Fail unless the descriptor advertises a capability
    pub fn require(&self, advertised: bool, operation: &'static str) -> Result<()> {
        if advertised {
            Ok(())
        } else {
            Err(self.unsupported(operation))
        }
    }

    pub fn unsupported(&self, operation: &'static str) -> ForgeError {
        ForgeError::unsupported(self.descriptor().name, operation)
    }
}

/// Capability interface implemented once per engine
#[async_trait]
pub trait DatabaseEngine: Send + Sync {
    fn context(&self) -> &EngineContext;

    fn kind(&self) -> EngineKind {
        self.context().kind()
    }

    fn descriptor(&self) -> &'static EngineDescriptor {
        self.context().descriptor()
    }

    /// Open a connection to the database itself
    async fn create_connection(&self, handle: &DatabaseHandle) -> Result<Box<dyn AdminConnection>> {
        self.context()
            .resolver()
            .open(handle.provider, &handle.connection_params())
            .await
    }

    async fn enumerate_servers(&self, _handle: &DatabaseHandle) -> Result<Vec<String>> {
        Err(self.context().unsupported("EnumerateServers"))
    }

    async fn enumerate_databases(&self, _handle: &DatabaseHandle) -> Result<Vec<String>> {
        Err(self.context().unsupported("EnumerateDatabases"))
    }

    /// Database files in `directory` that could be opened or attached
    async fn enumerate_potential_databases(
        &self,
        _handle: &DatabaseHandle,
        _directory: &Path,
    ) -> Result<Vec<PathBuf>> {
        Err(self.context().unsupported("EnumeratePotentialDatabases"))
    }

    async fn enumerate_tables(&self, _handle: &DatabaseHandle) -> Result<Vec<String>> {
        Err(self.context().unsupported("EnumerateTables"))
    }

    async fn enumerate_columns(&self, _handle: &DatabaseHandle, _table: &str) -> Result<Vec<String>> {
        Err(self.context().unsupported("EnumerateColumns"))
    }

    async fn create_database(&self, _handle: &DatabaseHandle) -> Result<()> {
        Err(self.context().unsupported("CreateDatabase"))
    }

    async fn attach_database(&self, _handle: &DatabaseHandle) -> Result<()> {
        Err(self.context().unsupported("AttachDatabase"))
    }

    async fn detach_database(&self, _handle: &DatabaseHandle) -> Result<()> {
        Err(self.context().unsupported("DetachDatabase"))
    }

    async fn delete_database(&self, _handle: &DatabaseHandle) -> Result<()> {
        Err(self.context().unsupported("DeleteDatabase"))
    }

    async fn database_exists(&self, _handle: &DatabaseHandle) -> Result<bool> {
        Err(self.context().unsupported("DatabaseExists"))
    }

    async fn rename_database(&self, _handle: &mut DatabaseHandle, _target: &RenameTarget) -> Result<()> {
        Err(self.context().unsupported("RenameDatabase"))
    }

    /// Copy a database; the returned handle names the copy
    async fn copy_database(&self, _handle: &DatabaseHandle, _target: &CopyTarget) -> Result<DatabaseHandle> {
        Err(self.context().unsupported("CopyDatabase"))
    }

    /// Move the physical files without renaming the database
    async fn rename_database_files(&self, _handle: &mut DatabaseHandle, _target: &RenameTarget) -> Result<()> {
        Err(self.context().unsupported("RenameDatabaseFiles"))
    }

    /// Copy the physical files without registering the copy anywhere
    async fn copy_database_files(&self, _handle: &DatabaseHandle, _target: &CopyTarget) -> Result<DatabaseHandle> {
        Err(self.context().unsupported("CopyDatabaseFiles"))
    }

    fn default_file_ext(&self, handle: &DatabaseHandle) -> Result<String> {
        self.context().resolver().default_file_ext(handle.provider)
    }

    fn physical_filenames(&self, handle: &DatabaseHandle) -> Vec<PathBuf> {
        handle.physical_files().iter().map(|f| f.path.clone()).collect()
    }

    fn create_table_ddl(&self, schema: &TableSchema) -> Result<String> {
        self.context().table_builder().build(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderDescriptor, ProviderMechanism};
    use crate::schema::{CanonicalType, ColumnSpec, IdentifierMode};

    struct BareEngine {
        context: EngineContext,
    }

    impl DatabaseEngine for BareEngine {
        fn context(&self) -> &EngineContext {
            &self.context
        }
    }

    fn bare(kind: EngineKind) -> BareEngine {
        BareEngine {
            context: EngineContext::new(kind, Arc::new(ConnectionResolver::new()), SchemaTranslator::default()),
        }
    }

    #[tokio::test]
    async fn test_defaults_are_unsupported() {
        let engine = bare(EngineKind::Sqlite);
        let provider = ProviderDescriptor::new(EngineKind::Sqlite, ProviderMechanism::Native)
            .identity()
            .unwrap();
        let handle = DatabaseHandle::new(EngineKind::Sqlite, provider, "app", "/data");

        let err = engine.enumerate_servers(&handle).await.unwrap_err();
        assert_eq!(err.to_string(), "EnumerateServers is not supported by SQLite");
        assert!(matches!(
            engine.copy_database(&handle, &CopyTarget::new("b")).await,
            Err(ForgeError::UnsupportedOperation { operation: "CopyDatabase", .. })
        ));
        assert_eq!(engine.physical_filenames(&handle), vec![PathBuf::from("/data/app.db")]);
    }

    #[test]
    fn test_table_builder_memoized_and_overridable() {
        let engine = bare(EngineKind::Access);
        let first = engine.context().table_builder() as *const TableBuilder;
        let second = engine.context().table_builder() as *const TableBuilder;
        assert_eq!(first, second);

        let schema = TableSchema::new("Orders")
            .column(ColumnSpec::new("Order Date", CanonicalType::DateTime));
        assert!(engine.create_table_ddl(&schema).unwrap().contains("[Order Date] DATETIME"));

        let stripped = BareEngine {
            context: EngineContext::new(
                EngineKind::Access,
                Arc::new(ConnectionResolver::new()),
                SchemaTranslator::default(),
            )
            .with_table_builder(TableBuilder::new(
                SchemaTranslator::new(IdentifierMode::StripSpaces),
                DialectImpl::for_engine(EngineKind::Access),
            )),
        };
        assert!(stripped.create_table_ddl(&schema).unwrap().contains("OrderDate DATETIME"));
    }

    #[test]
    fn test_rename_target_builders() {
        let target = RenameTarget::new("Orders2").in_directory("/archive").keep_files();
        assert_eq!(target.directory.as_deref(), Some(Path::new("/archive")));
        assert!(!target.relocate_files);
    }
}
