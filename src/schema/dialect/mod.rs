//! DDL dialects (Strategy pattern).
//!
//! A dialect customizes table generation at four points: the maximum sized
//! string length, the type-name table, the null-constraint phrasing and the
//! identity/constraint phrasing. Everything else lives in the translator.

pub mod jet;
pub mod sqlite;
pub mod sqlserver;

pub use jet::JetDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::{SqlCompactDialect, SqlServerDialect};

use crate::provider::EngineKind;
use crate::schema::{CanonicalType, IdentitySpec};

/// Sized string limit used unless a dialect overrides it
pub const DEFAULT_MAX_STRING_LENGTH: u32 = 4000;

/// Key into a dialect's type-name table
///
/// Sized canonical types split into a bounded and an unbounded key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Byte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    DateTime,
    Boolean,
    Guid,
    Text,
    LargeText,
    Binary,
    LargeBinary,
}

impl TypeKey {
    /// Key for a canonical type with an optional length
    pub fn for_column(canonical: CanonicalType, length: Option<u32>) -> Self {
        match (canonical, length) {
            (CanonicalType::Byte, _) => TypeKey::Byte,
            (CanonicalType::Int16, _) => TypeKey::Int16,
            (CanonicalType::Int32, _) => TypeKey::Int32,
            (CanonicalType::Int64, _) => TypeKey::Int64,
            (CanonicalType::Single, _) => TypeKey::Single,
            (CanonicalType::Double, _) => TypeKey::Double,
            (CanonicalType::Decimal, _) => TypeKey::Decimal,
            (CanonicalType::DateTime, _) => TypeKey::DateTime,
            (CanonicalType::Boolean, _) => TypeKey::Boolean,
            (CanonicalType::Guid, _) => TypeKey::Guid,
            (CanonicalType::String, Some(_)) => TypeKey::Text,
            (CanonicalType::String, None) => TypeKey::LargeText,
            (CanonicalType::Binary, Some(_)) => TypeKey::Binary,
            (CanonicalType::Binary, None) => TypeKey::LargeBinary,
        }
    }
}

/// Entry of a type-name table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    /// Emitted as-is
    Plain(&'static str),
    /// Emitted with a length, e.g. `NVARCHAR(50)`
    Sized(&'static str),
    /// Emitted with precision and scale, e.g. `DECIMAL(18, 4)`
    Scaled(&'static str),
}

/// How a dialect phrases an identity column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityPhrase {
    /// Keyword placed right after the column type
    Suffix(String),
    /// Keyword used instead of the column type
    ReplaceType(String),
    /// Keyword appended after the inline constraints; requires the column
    /// to be the single-column primary key
    AfterConstraints(String),
}

/// DDL dialect of one engine
pub trait Dialect {
    /// Dialect name (e.g., "sqlserver", "jet")
    fn name(&self) -> &str;

    /// Upper bound for sized string and binary columns
    fn max_string_length(&self) -> u32 {
        DEFAULT_MAX_STRING_LENGTH
    }

    /// Type-name table; `None` means the dialect cannot store the type
    fn type_name(&self, key: TypeKey) -> Option<TypeName>;

    /// Phrase emitted for a column's nullability
    fn null_constraint(&self, nullable: bool) -> Option<&'static str> {
        if nullable {
            None
        } else {
            Some("NOT NULL")
        }
    }

    /// Phrase emitted for an identity column
    fn identity_phrase(&self, identity: &IdentitySpec) -> IdentityPhrase {
        if identity.is_default() {
            IdentityPhrase::Suffix("IDENTITY".to_string())
        } else {
            IdentityPhrase::Suffix(format!("IDENTITY({}, {})", identity.seed, identity.step))
        }
    }
}

/// Enum-based static dispatch over the built-in dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectImpl {
    SqlServer(SqlServerDialect),
    SqlCompact(SqlCompactDialect),
    Jet(JetDialect),
    Sqlite(SqliteDialect),
}

impl DialectImpl {
    /// Dialect spoken by an engine
    pub fn for_engine(engine: EngineKind) -> Self {
        match engine {
            EngineKind::SqlServer => DialectImpl::SqlServer(SqlServerDialect),
            EngineKind::SqlCompact => DialectImpl::SqlCompact(SqlCompactDialect),
            EngineKind::Access => DialectImpl::Jet(JetDialect),
            EngineKind::Sqlite => DialectImpl::Sqlite(SqliteDialect),
        }
    }
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::SqlServer(d) => d.name(),
            DialectImpl::SqlCompact(d) => d.name(),
            DialectImpl::Jet(d) => d.name(),
            DialectImpl::Sqlite(d) => d.name(),
        }
    }

    fn max_string_length(&self) -> u32 {
        match self {
            DialectImpl::SqlServer(d) => d.max_string_length(),
            DialectImpl::SqlCompact(d) => d.max_string_length(),
            DialectImpl::Jet(d) => d.max_string_length(),
            DialectImpl::Sqlite(d) => d.max_string_length(),
        }
    }

    fn type_name(&self, key: TypeKey) -> Option<TypeName> {
        match self {
            DialectImpl::SqlServer(d) => d.type_name(key),
            DialectImpl::SqlCompact(d) => d.type_name(key),
            DialectImpl::Jet(d) => d.type_name(key),
            DialectImpl::Sqlite(d) => d.type_name(key),
        }
    }

    fn null_constraint(&self, nullable: bool) -> Option<&'static str> {
        match self {
            DialectImpl::SqlServer(d) => d.null_constraint(nullable),
            DialectImpl::SqlCompact(d) => d.null_constraint(nullable),
            DialectImpl::Jet(d) => d.null_constraint(nullable),
            DialectImpl::Sqlite(d) => d.null_constraint(nullable),
        }
    }

    fn identity_phrase(&self, identity: &IdentitySpec) -> IdentityPhrase {
        match self {
            DialectImpl::SqlServer(d) => d.identity_phrase(identity),
            DialectImpl::SqlCompact(d) => d.identity_phrase(identity),
            DialectImpl::Jet(d) => d.identity_phrase(identity),
            DialectImpl::Sqlite(d) => d.identity_phrase(identity),
        }
    }
}
