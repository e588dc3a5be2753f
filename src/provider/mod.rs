//! Engine and provider descriptors
//!
//! This module describes the database engines dbforge can manage, the
//! access mechanisms used to reach them, and the stable identity that
//! joins a provider to everything configured against it.

pub mod descriptor;
pub mod identity;

// Re-exports
pub use descriptor::{ProviderDescriptor, ProviderMechanism};
pub use identity::{compute_identity, ProviderId};

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Microsoft SQL Server
    SqlServer,
    /// SQL Server Compact Edition
    SqlCompact,
    /// Microsoft Access (Jet)
    Access,
    /// SQLite
    Sqlite,
}

impl EngineKind {
    /// All engines known to dbforge
    pub const ALL: [EngineKind; 4] = [
        EngineKind::SqlServer,
        EngineKind::SqlCompact,
        EngineKind::Access,
        EngineKind::Sqlite,
    ];

    /// Static descriptor for this engine
    pub fn descriptor(&self) -> &'static EngineDescriptor {
        EngineDescriptor::get(*self)
    }

    /// Short identifier used in config files and the CLI
    pub fn id(&self) -> &'static str {
        match self {
            EngineKind::SqlServer => "sqlserver",
            EngineKind::SqlCompact => "sqlcompact",
            EngineKind::Access => "access",
            EngineKind::Sqlite => "sqlite",
        }
    }
}

impl FromStr for EngineKind {
    type Err = ForgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlserver" | "mssql" | "microsoft sql server" => Ok(EngineKind::SqlServer),
            "sqlcompact" | "sqlce" => Ok(EngineKind::SqlCompact),
            "access" | "jet" | "msaccess" => Ok(EngineKind::Access),
            "sqlite" | "sqlite3" => Ok(EngineKind::Sqlite),
            _ => Err(ForgeError::Config(format!("Unknown engine: '{}'", s))),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptor().name)
    }
}

/// Where an engine keeps its databases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hosting {
    /// A server process owns the files; lifecycle goes through admin commands
    Server,
    /// The database is a plain file the client opens directly
    File,
}

/// Capability flags advertised by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub can_enumerate_servers: bool,
    pub can_enumerate_databases: bool,
    pub can_enumerate_potential_databases: bool,
    pub can_enumerate_tables: bool,
    pub can_enumerate_columns: bool,
    pub can_attach: bool,
}

/// Static description of one engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDescriptor {
    pub kind: EngineKind,
    /// Human readable name
    pub name: &'static str,
    pub hosting: Hosting,
    pub capabilities: Capabilities,
    /// Extension of the primary data file, including the dot
    pub default_extension: &'static str,
    /// Extension of the primary log file (server-hosted engines)
    pub log_extension: Option<&'static str>,
    /// Stem suffix distinguishing a secondary log file
    pub secondary_log_suffix: Option<&'static str>,
    /// Extension of the companion lock file (desktop file engines)
    pub lock_extension: Option<&'static str>,
    /// Catalog schema holding the `databases` view
    pub catalog: Option<&'static str>,
}

static SQL_SERVER: EngineDescriptor = EngineDescriptor {
    kind: EngineKind::SqlServer,
    name: "Microsoft SQL Server",
    hosting: Hosting::Server,
    capabilities: Capabilities {
        can_enumerate_servers: true,
        can_enumerate_databases: true,
        can_enumerate_potential_databases: true,
        can_enumerate_tables: true,
        can_enumerate_columns: true,
        can_attach: true,
    },
    default_extension: ".mdf",
    log_extension: Some(".ldf"),
    secondary_log_suffix: Some("_1"),
    lock_extension: None,
    catalog: Some("sys"),
};

static SQL_COMPACT: EngineDescriptor = EngineDescriptor {
    kind: EngineKind::SqlCompact,
    name: "SQL Server Compact",
    hosting: Hosting::File,
    capabilities: Capabilities {
        can_enumerate_servers: false,
        can_enumerate_databases: false,
        can_enumerate_potential_databases: true,
        can_enumerate_tables: true,
        can_enumerate_columns: true,
        can_attach: false,
    },
    default_extension: ".sdf",
    log_extension: None,
    secondary_log_suffix: None,
    lock_extension: None,
    catalog: None,
};

static ACCESS: EngineDescriptor = EngineDescriptor {
    kind: EngineKind::Access,
    name: "Microsoft Access",
    hosting: Hosting::File,
    capabilities: Capabilities {
        can_enumerate_servers: false,
        can_enumerate_databases: false,
        can_enumerate_potential_databases: true,
        can_enumerate_tables: true,
        can_enumerate_columns: false,
        can_attach: false,
    },
    default_extension: ".mdb",
    log_extension: None,
    secondary_log_suffix: None,
    lock_extension: Some(".ldb"),
    catalog: None,
};

static SQLITE: EngineDescriptor = EngineDescriptor {
    kind: EngineKind::Sqlite,
    name: "SQLite",
    hosting: Hosting::File,
    capabilities: Capabilities {
        can_enumerate_servers: false,
        can_enumerate_databases: false,
        can_enumerate_potential_databases: true,
        can_enumerate_tables: true,
        can_enumerate_columns: true,
        can_attach: false,
    },
    default_extension: ".db",
    log_extension: None,
    secondary_log_suffix: None,
    lock_extension: None,
    catalog: None,
};

impl EngineDescriptor {
    /// Look up the descriptor of an engine
    pub fn get(kind: EngineKind) -> &'static EngineDescriptor {
        match kind {
            EngineKind::SqlServer => &SQL_SERVER,
            EngineKind::SqlCompact => &SQL_COMPACT,
            EngineKind::Access => &ACCESS,
            EngineKind::Sqlite => &SQLITE,
        }
    }

    /// Whether a server process hosts this engine's databases
    pub fn is_server_hosted(&self) -> bool {
        self.hosting == Hosting::Server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_str() {
        assert_eq!("mssql".parse::<EngineKind>().unwrap(), EngineKind::SqlServer);
        assert_eq!("sqlce".parse::<EngineKind>().unwrap(), EngineKind::SqlCompact);
        assert_eq!("jet".parse::<EngineKind>().unwrap(), EngineKind::Access);
        assert_eq!("sqlite3".parse::<EngineKind>().unwrap(), EngineKind::Sqlite);
        assert!("oracle".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_engine_display() {
        assert_eq!(EngineKind::SqlServer.to_string(), "Microsoft SQL Server");
        assert_eq!(EngineKind::Sqlite.to_string(), "SQLite");
    }

    #[test]
    fn test_manifest_shape_follows_hosting() {
        let server = EngineKind::SqlServer.descriptor();
        assert!(server.is_server_hosted());
        assert!(server.log_extension.is_some());
        assert!(server.lock_extension.is_none());

        let access = EngineKind::Access.descriptor();
        assert!(!access.is_server_hosted());
        assert_eq!(access.lock_extension, Some(".ldb"));

        for kind in EngineKind::ALL {
            let descriptor = kind.descriptor();
            assert_eq!(descriptor.kind, kind);
            assert!(descriptor.default_extension.starts_with('.'));
            assert_eq!(descriptor.capabilities.can_enumerate_servers, descriptor.is_server_hosted());
        }
    }
}
