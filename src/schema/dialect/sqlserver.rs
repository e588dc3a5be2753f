//! SQL Server and SQL Server Compact dialects.

use super::{Dialect, TypeKey, TypeName};

/// Microsoft SQL Server dialect; the default phrasing of [`Dialect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn name(&self) -> &str {
        "sqlserver"
    }

    fn type_name(&self, key: TypeKey) -> Option<TypeName> {
        let name = match key {
            TypeKey::Byte => TypeName::Plain("TINYINT"),
            TypeKey::Int16 => TypeName::Plain("SMALLINT"),
            TypeKey::Int32 => TypeName::Plain("INT"),
            TypeKey::Int64 => TypeName::Plain("BIGINT"),
            TypeKey::Single => TypeName::Plain("REAL"),
            TypeKey::Double => TypeName::Plain("FLOAT"),
            TypeKey::Decimal => TypeName::Scaled("DECIMAL"),
            TypeKey::DateTime => TypeName::Plain("DATETIME"),
            TypeKey::Boolean => TypeName::Plain("BIT"),
            TypeKey::Guid => TypeName::Plain("UNIQUEIDENTIFIER"),
            TypeKey::Text => TypeName::Sized("NVARCHAR"),
            TypeKey::LargeText => TypeName::Plain("NVARCHAR(MAX)"),
            TypeKey::Binary => TypeName::Sized("VARBINARY"),
            TypeKey::LargeBinary => TypeName::Plain("VARBINARY(MAX)"),
        };
        Some(name)
    }
}

/// SQL Server Compact dialect: SQL Server types without the `(MAX)` forms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlCompactDialect;

impl Dialect for SqlCompactDialect {
    fn name(&self) -> &str {
        "sqlcompact"
    }

    fn type_name(&self, key: TypeKey) -> Option<TypeName> {
        match key {
            TypeKey::LargeText => Some(TypeName::Plain("NTEXT")),
            TypeKey::LargeBinary => Some(TypeName::Plain("IMAGE")),
            other => SqlServerDialect.type_name(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::dialect::IdentityPhrase;
    use crate::schema::IdentitySpec;

    #[test]
    fn test_sqlserver_identity_phrase() {
        assert_eq!(
            SqlServerDialect.identity_phrase(&IdentitySpec::default()),
            IdentityPhrase::Suffix("IDENTITY".to_string())
        );
        assert_eq!(
            SqlServerDialect.identity_phrase(&IdentitySpec::new(100, 10)),
            IdentityPhrase::Suffix("IDENTITY(100, 10)".to_string())
        );
    }

    #[test]
    fn test_compact_large_types() {
        assert_eq!(SqlCompactDialect.type_name(TypeKey::LargeText), Some(TypeName::Plain("NTEXT")));
        assert_eq!(SqlCompactDialect.type_name(TypeKey::Int32), Some(TypeName::Plain("INT")));
        assert_eq!(SqlCompactDialect.max_string_length(), 4000);
    }

    #[test]
    fn test_null_constraint_default() {
        assert_eq!(SqlServerDialect.null_constraint(false), Some("NOT NULL"));
        assert_eq!(SqlServerDialect.null_constraint(true), None);
    }
}
