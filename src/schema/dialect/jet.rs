//! Microsoft Access (Jet) dialect.

use super::{Dialect, IdentityPhrase, TypeKey, TypeName};
use crate::schema::IdentitySpec;

/// Jet text columns hold at most 255 characters; longer text is MEMO.
pub const JET_MAX_STRING_LENGTH: u32 = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JetDialect;

impl Dialect for JetDialect {
    fn name(&self) -> &str {
        "jet"
    }

    fn max_string_length(&self) -> u32 {
        JET_MAX_STRING_LENGTH
    }

    fn type_name(&self, key: TypeKey) -> Option<TypeName> {
        match key {
            TypeKey::Byte => Some(TypeName::Plain("BYTE")),
            TypeKey::Int16 => Some(TypeName::Plain("SHORT")),
            TypeKey::Int32 => Some(TypeName::Plain("LONG")),
            // Jet has no 64-bit integer
            TypeKey::Int64 => None,
            TypeKey::Single => Some(TypeName::Plain("SINGLE")),
            TypeKey::Double => Some(TypeName::Plain("DOUBLE")),
            TypeKey::Decimal => Some(TypeName::Scaled("DECIMAL")),
            TypeKey::DateTime => Some(TypeName::Plain("DATETIME")),
            TypeKey::Boolean => Some(TypeName::Plain("BIT")),
            TypeKey::Guid => Some(TypeName::Plain("GUID")),
            TypeKey::Text => Some(TypeName::Sized("TEXT")),
            TypeKey::LargeText => Some(TypeName::Plain("MEMO")),
            TypeKey::Binary => Some(TypeName::Sized("BINARY")),
            TypeKey::LargeBinary => Some(TypeName::Plain("LONGBINARY")),
        }
    }

    fn identity_phrase(&self, identity: &IdentitySpec) -> IdentityPhrase {
        if identity.is_default() {
            IdentityPhrase::ReplaceType("COUNTER".to_string())
        } else {
            IdentityPhrase::ReplaceType(format!("COUNTER({}, {})", identity.seed, identity.step))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_has_no_int64() {
        assert_eq!(JetDialect.type_name(TypeKey::Int64), None);
        assert_eq!(JetDialect.type_name(TypeKey::Int32), Some(TypeName::Plain("LONG")));
    }

    #[test]
    fn test_jet_counter_replaces_type() {
        assert_eq!(
            JetDialect.identity_phrase(&IdentitySpec::new(5, 2)),
            IdentityPhrase::ReplaceType("COUNTER(5, 2)".to_string())
        );
    }
}
