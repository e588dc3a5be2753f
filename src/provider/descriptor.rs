//! Provider descriptors
//!
//! A provider is one reachable engine plus the mechanism used to reach it.
//! Display names are informational only; the computed identity is the key.

use crate::error::{ForgeError, Result};
use crate::provider::identity::{compute_identity, ProviderId};
use crate::provider::EngineKind;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Access mechanism used to reach an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderMechanism {
    /// Native driver speaking the engine's own protocol or file format
    Native,
    /// OLE DB style bridge (`Provider=...` connection strings)
    OleDb,
    /// ODBC style bridge (`Driver={...}` connection strings)
    Odbc,
}

impl ProviderMechanism {
    /// All mechanisms
    pub const ALL: [ProviderMechanism; 3] = [
        ProviderMechanism::Native,
        ProviderMechanism::OleDb,
        ProviderMechanism::Odbc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderMechanism::Native => "native",
            ProviderMechanism::OleDb => "oledb",
            ProviderMechanism::Odbc => "odbc",
        }
    }
}

impl FromStr for ProviderMechanism {
    type Err = ForgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" | "embedded" => Ok(ProviderMechanism::Native),
            "oledb" | "ole-db" => Ok(ProviderMechanism::OleDb),
            "odbc" => Ok(ProviderMechanism::Odbc),
            _ => Err(ForgeError::Config(format!("Unknown provider mechanism: '{}'", s))),
        }
    }
}

impl std::fmt::Display for ProviderMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Description of a reachable engine and its access mechanism
///
/// Engine and mechanism are optional so that descriptors loaded from
/// configuration can be checked; [`compute_identity`] rejects either one
/// being absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub engine: Option<EngineKind>,
    pub mechanism: Option<ProviderMechanism>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Declared file extensions, e.g. `*.mdb`
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub data_source: Option<String>,
    /// Class or driver identifier handed to bridging mechanisms
    #[serde(default)]
    pub class_id: Option<String>,
}

impl ProviderDescriptor {
    /// Create a descriptor for an engine reached through a mechanism
    pub fn new(engine: EngineKind, mechanism: ProviderMechanism) -> Self {
        Self {
            engine: Some(engine),
            mechanism: Some(mechanism),
            ..Self::default()
        }
    }

    pub fn with_short_name(mut self, name: impl Into<String>) -> Self {
        self.short_name = Some(name.into());
        self
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extensions.push(extension.into());
        self
    }

    pub fn with_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self
    }

    pub fn with_class_id(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = Some(class_id.into());
        self
    }

    /// Stable identity of this provider
    pub fn identity(&self) -> Result<ProviderId> {
        compute_identity(self)
    }

    /// Engine, failing if the descriptor is incomplete
    pub fn engine(&self) -> Result<EngineKind> {
        self.engine
            .ok_or_else(|| ForgeError::Config("provider descriptor has no engine".into()))
    }

    /// Mechanism, failing if the descriptor is incomplete
    pub fn mechanism(&self) -> Result<ProviderMechanism> {
        self.mechanism
            .ok_or_else(|| ForgeError::Config("provider descriptor has no mechanism".into()))
    }

    /// Name for display, falling back through full name, short name and engine
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .or_else(|| self.short_name.clone())
            .or_else(|| self.engine.map(|e| e.to_string()))
            .unwrap_or_else(|| "<unnamed provider>".to_string())
    }

    /// First declared extension with wildcard characters stripped
    pub fn declared_extension(&self) -> Option<String> {
        self.extensions
            .first()
            .map(|ext| ext.chars().filter(|c| *c != '*' && *c != '?').collect::<String>())
            .filter(|ext| !ext.is_empty())
    }
}
