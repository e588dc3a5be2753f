//! Database handles
//!
//! A [`DatabaseHandle`] names one logical database: the engine and provider
//! used to reach it, where it lives and which physical files make it up.
//! Only the lifecycle orchestrator changes the name and file set of a
//! handle after construction.

use crate::database::connection::ConnectionParams;
use crate::error::{ForgeError, Result};
use crate::provider::{EngineDescriptor, EngineKind, ProviderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Catalog used for server-level administrative connections
pub const MASTER_DATABASE: &str = "master";

/// Role of a physical file within a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Primary,
    Log,
    Lock,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileRole::Primary => "primary",
            FileRole::Log => "log",
            FileRole::Lock => "lock",
        };
        write!(f, "{}", name)
    }
}

/// One OS file belonging to a database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalFile {
    pub role: FileRole,
    /// Name the engine's catalog knows the file by
    pub logical_name: String,
    pub path: PathBuf,
}

impl PhysicalFile {
    pub fn new(role: FileRole, logical_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            role,
            logical_name: logical_name.into(),
            path: path.into(),
        }
    }
}

/// Login credentials; the password never appears in `Debug` output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            password: Some(password.into()),
        }
    }

    /// No explicit user: integrated/trusted authentication
    pub fn integrated() -> Self {
        Self::default()
    }

    pub fn is_integrated(&self) -> bool {
        self.user_id.as_deref().map_or(true, str::is_empty)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// One logical database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseHandle {
    pub engine: EngineKind,
    pub provider: ProviderId,
    /// Logical (catalog) name
    pub name: String,
    /// Server address for server-hosted engines
    pub data_source: Option<String>,
    physical_files: Vec<PhysicalFile>,
    pub credentials: Credentials,
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
}

impl DatabaseHandle {
    /// Create a handle whose physical files live in `directory`
    ///
    /// The file set is derived from the engine descriptor: server-hosted
    /// engines get a primary data file and a log file, desktop file engines a
    /// primary file and a lock file, other file engines just the primary.
    pub fn new(
        engine: EngineKind,
        provider: ProviderId,
        name: impl Into<String>,
        directory: impl AsRef<Path>,
    ) -> Self {
        let name = name.into();
        let physical_files = default_manifest(engine.descriptor(), &name, directory.as_ref(), None);
        Self {
            engine,
            provider,
            name,
            data_source: None,
            physical_files,
            credentials: Credentials::default(),
            encrypted: false,
            created_at: Utc::now(),
        }
    }

    /// Create a handle for a file-based database from its primary file path
    pub fn for_file(engine: EngineKind, provider: ProviderId, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ForgeError::Config(format!("{} has no file name", path.display())))?
            .to_string();
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        let extension = path.extension().and_then(|e| e.to_str()).map(|e| format!(".{}", e));

        let mut handle = Self::new(engine, provider, name, directory);
        handle.physical_files =
            default_manifest(engine.descriptor(), &handle.name, directory, extension.as_deref());
        Ok(handle)
    }

    /// Replace the derived file set with explicit files
    pub fn with_physical_files(mut self, files: Vec<PhysicalFile>) -> Result<Self> {
        validate_manifest(self.descriptor(), &files)?;
        self.physical_files = files;
        Ok(self)
    }

    pub fn with_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_encryption(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn descriptor(&self) -> &'static EngineDescriptor {
        self.engine.descriptor()
    }

    /// Physical-file manifest, primary first
    pub fn physical_files(&self) -> &[PhysicalFile] {
        &self.physical_files
    }

    pub fn primary_file(&self) -> &PhysicalFile {
        // the manifest always holds exactly one primary file
        self.physical_files
            .iter()
            .find(|f| f.role == FileRole::Primary)
            .unwrap_or(&self.physical_files[0])
    }

    pub fn files_with_role(&self, role: FileRole) -> impl Iterator<Item = &PhysicalFile> {
        self.physical_files.iter().filter(move |f| f.role == role)
    }

    /// Key used to serialize lifecycle operations on the same database
    pub fn identity_key(&self) -> String {
        if self.descriptor().is_server_hosted() {
            format!(
                "{}|{}|{}",
                self.engine.id(),
                self.data_source.as_deref().unwrap_or_default().to_lowercase(),
                self.name.to_lowercase()
            )
        } else {
            format!("{}|{}", self.engine.id(), self.primary_file().path.display())
        }
    }

    /// Runtime parameters for connecting to this database
    pub fn connection_params(&self) -> ConnectionParams {
        if self.descriptor().is_server_hosted() {
            self.params_for(Some(self.name.clone()))
        } else {
            ConnectionParams {
                data_source: Some(self.primary_file().path.display().to_string()),
                database: None,
                credentials: self.credentials.clone(),
                encrypted: self.encrypted,
            }
        }
    }

    /// Runtime parameters for server-level administrative connections
    pub fn admin_params(&self) -> ConnectionParams {
        self.params_for(Some(MASTER_DATABASE.to_string()))
    }

    fn params_for(&self, database: Option<String>) -> ConnectionParams {
        ConnectionParams {
            data_source: self.data_source.clone(),
            database,
            credentials: self.credentials.clone(),
            encrypted: self.encrypted,
        }
    }

    /// File set the database would have under a new name and directory
    ///
    /// File stems and logical names starting with the current database name
    /// get that prefix replaced, so suffixes such as `_log` survive.
    pub fn relocated_files(&self, new_name: &str, directory: Option<&Path>) -> Vec<PhysicalFile> {
        self.physical_files
            .iter()
            .map(|file| {
                let stem = file.path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                let new_stem = replace_prefix(stem, &self.name, new_name)
                    .unwrap_or_else(|| format!("{}_{}", new_name, stem));
                let file_name = match file.path.extension().and_then(|e| e.to_str()) {
                    Some(ext) => format!("{}.{}", new_stem, ext),
                    None => new_stem,
                };
                let parent = directory
                    .map(Path::to_path_buf)
                    .or_else(|| file.path.parent().map(Path::to_path_buf))
                    .unwrap_or_default();
                let logical_name = replace_prefix(&file.logical_name, &self.name, new_name)
                    .unwrap_or_else(|| file.logical_name.clone());
                PhysicalFile::new(file.role, logical_name, parent.join(file_name))
            })
            .collect()
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_physical_files(&mut self, files: Vec<PhysicalFile>) {
        self.physical_files = files;
    }
}

fn replace_prefix(text: &str, old: &str, new: &str) -> Option<String> {
    text.get(..old.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(old))
        .map(|_| format!("{}{}", new, &text[old.len()..]))
}

fn default_manifest(
    descriptor: &EngineDescriptor,
    name: &str,
    directory: &Path,
    primary_extension: Option<&str>,
) -> Vec<PhysicalFile> {
    let primary_ext = primary_extension.unwrap_or(descriptor.default_extension);
    let mut files = vec![PhysicalFile::new(
        FileRole::Primary,
        name,
        directory.join(format!("{}{}", name, primary_ext)),
    )];
    if let Some(log_ext) = descriptor.log_extension {
        files.push(PhysicalFile::new(
            FileRole::Log,
            format!("{}_LOG", name),
            directory.join(format!("{}{}", name, log_ext)),
        ));
    }
    if let Some(lock_ext) = descriptor.lock_extension {
        files.push(PhysicalFile::new(
            FileRole::Lock,
            name,
            directory.join(format!("{}{}", name, lock_ext)),
        ));
    }
    files
}

fn validate_manifest(descriptor: &EngineDescriptor, files: &[PhysicalFile]) -> Result<()> {
    let count = |role| files.iter().filter(|f| f.role == role).count();
    let (primary, logs, locks) = (count(FileRole::Primary), count(FileRole::Log), count(FileRole::Lock));

    let valid = if descriptor.is_server_hosted() {
        let max_logs = if descriptor.secondary_log_suffix.is_some() { 2 } else { 1 };
        primary == 1 && (1..=max_logs).contains(&logs) && locks == 0
    } else if descriptor.lock_extension.is_some() {
        primary == 1 && logs == 0 && locks <= 1
    } else {
        primary == 1 && logs == 0 && locks == 0
    };

    if !valid {
        return Err(ForgeError::Config(format!(
            "{} databases cannot consist of {} primary, {} log and {} lock files",
            descriptor.name, primary, logs, locks
        )));
    }
    if files[0].role != FileRole::Primary {
        return Err(ForgeError::Config("the primary file must come first".into()));
    }
    Ok(())
}
