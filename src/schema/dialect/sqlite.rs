//! SQLite dialect.

use super::{Dialect, IdentityPhrase, TypeKey, TypeName};
use crate::schema::IdentitySpec;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn type_name(&self, key: TypeKey) -> Option<TypeName> {
        let name = match key {
            TypeKey::Byte | TypeKey::Int16 | TypeKey::Int32 | TypeKey::Int64 => {
                TypeName::Plain("INTEGER")
            }
            TypeKey::Single | TypeKey::Double => TypeName::Plain("REAL"),
            TypeKey::Decimal => TypeName::Scaled("NUMERIC"),
            TypeKey::DateTime => TypeName::Plain("DATETIME"),
            TypeKey::Boolean => TypeName::Plain("BOOLEAN"),
            TypeKey::Guid => TypeName::Plain("GUID"),
            TypeKey::Text => TypeName::Sized("VARCHAR"),
            TypeKey::LargeText => TypeName::Plain("TEXT"),
            TypeKey::Binary | TypeKey::LargeBinary => TypeName::Plain("BLOB"),
        };
        Some(name)
    }

    /// SQLite has no seed/step syntax; rowid aliasing does the counting.
    fn identity_phrase(&self, _identity: &IdentitySpec) -> IdentityPhrase {
        IdentityPhrase::AfterConstraints("AUTOINCREMENT".to_string())
    }
}
