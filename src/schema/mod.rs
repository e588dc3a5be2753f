//! Table schema data structures
//!
//! This module defines the engine-neutral description of a table that the
//! translator turns into dialect DDL: columns with canonical types,
//! identity settings and table constraints.

pub mod dialect;
pub mod translator;

// Re-exports
pub use dialect::{Dialect, DialectImpl, IdentityPhrase, TypeKey};
pub use translator::{IdentifierMode, SchemaTranslator};

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Engine-neutral column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalType {
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
    String,
    Binary,
}

impl CanonicalType {
    /// Whether the type takes a length (and has an unbounded variant)
    pub fn is_sized(&self) -> bool {
        matches!(self, CanonicalType::String | CanonicalType::Binary)
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Auto-increment seed and step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySpec {
    pub seed: i64,
    pub step: i64,
}

impl IdentitySpec {
    pub fn new(seed: i64, step: i64) -> Self {
        Self { seed, step }
    }

    /// Whether this is the engine default of (1, 1)
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for IdentitySpec {
    fn default() -> Self {
        Self { seed: 1, step: 1 }
    }
}

/// A column of a table to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub canonical_type: CanonicalType,
    /// Length for strings and binaries; `None` means unbounded
    #[serde(default)]
    pub length: Option<u32>,
    /// Precision and scale for decimals
    #[serde(default)]
    pub precision: Option<(u8, u8)>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub identity: Option<IdentitySpec>,
    /// Default value literal, emitted verbatim
    #[serde(default)]
    pub default: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSpec {
    /// Create a nullable column
    pub fn new(name: impl Into<String>, canonical_type: CanonicalType) -> Self {
        Self {
            name: name.into(),
            canonical_type,
            length: None,
            precision: None,
            nullable: true,
            identity: None,
            default: None,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some((precision, scale));
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn identity(mut self, identity: IdentitySpec) -> Self {
        self.identity = Some(identity);
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Kind of table constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintKind {
    Unique,
    PrimaryKey,
    ForeignKey,
}

/// Referential action for foreign keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferentialRule {
    #[default]
    Cascade,
    NoAction,
    SetNull,
    SetDefault,
}

impl ReferentialRule {
    pub fn keyword(&self) -> &'static str {
        match self {
            ReferentialRule::Cascade => "CASCADE",
            ReferentialRule::NoAction => "NO ACTION",
            ReferentialRule::SetNull => "SET NULL",
            ReferentialRule::SetDefault => "SET DEFAULT",
        }
    }
}

/// A constraint over one or more columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    #[serde(default)]
    pub referenced_table: Option<String>,
    #[serde(default)]
    pub referenced_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: ReferentialRule,
    #[serde(default)]
    pub on_update: ReferentialRule,
}

impl ConstraintSpec {
    pub fn primary_key<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self::new(ConstraintKind::PrimaryKey, columns)
    }

    pub fn unique<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self::new(ConstraintKind::Unique, columns)
    }

    pub fn foreign_key<S: Into<String>, R: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        referenced_table: impl Into<String>,
        referenced_columns: impl IntoIterator<Item = R>,
    ) -> Self {
        let mut constraint = Self::new(ConstraintKind::ForeignKey, columns);
        constraint.referenced_table = Some(referenced_table.into());
        constraint.referenced_columns = referenced_columns.into_iter().map(Into::into).collect();
        constraint
    }

    fn new<S: Into<String>>(kind: ConstraintKind, columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            kind,
            columns: columns.into_iter().map(Into::into).collect(),
            referenced_table: None,
            referenced_columns: Vec::new(),
            on_delete: ReferentialRule::default(),
            on_update: ReferentialRule::default(),
        }
    }

    pub fn on_delete(mut self, rule: ReferentialRule) -> Self {
        self.on_delete = rule;
        self
    }

    pub fn on_update(mut self, rule: ReferentialRule) -> Self {
        self.on_update = rule;
        self
    }

    /// Single-column constraints are emitted inline on their column
    pub fn is_inline(&self) -> bool {
        self.columns.len() == 1
    }
}

/// A table to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
}

impl TableSchema {
    /// Create an empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn constraint(mut self, constraint: ConstraintSpec) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Get a column by name
    pub fn get_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Inline (single-column) constraints attached to a column, in input order
    pub fn inline_constraints<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a ConstraintSpec> {
        self.constraints
            .iter()
            .filter(move |c| c.is_inline() && c.columns[0] == column)
    }

    /// Check the structural invariants of the table
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ForgeError::Schema("table name is empty".into()));
        }
        if self.columns.is_empty() {
            return Err(ForgeError::Schema(format!("table {} has no columns", self.name)));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(ForgeError::Schema(format!("table {} has an unnamed column", self.name)));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(ForgeError::Schema(format!(
                    "column {} appears more than once in table {}",
                    column.name, self.name
                )));
            }
        }

        let identities = self.columns.iter().filter(|c| c.identity.is_some()).count();
        if identities > 1 {
            return Err(ForgeError::Schema(format!(
                "table {} has {} identity columns; at most one is allowed",
                self.name, identities
            )));
        }

        let primary_keys = self
            .constraints
            .iter()
            .filter(|c| c.kind == ConstraintKind::PrimaryKey)
            .count();
        if primary_keys > 1 {
            return Err(ForgeError::Schema(format!(
                "table {} declares more than one primary key",
                self.name
            )));
        }

        for constraint in &self.constraints {
            if constraint.columns.is_empty() {
                return Err(ForgeError::Schema(format!(
                    "{:?} constraint on table {} lists no columns",
                    constraint.kind, self.name
                )));
            }
            for column in &constraint.columns {
                if self.get_column(column).is_none() {
                    return Err(ForgeError::Schema(format!(
                        "{:?} constraint references unknown column {} in table {}",
                        constraint.kind, column, self.name
                    )));
                }
            }
            if constraint.kind == ConstraintKind::ForeignKey {
                match &constraint.referenced_table {
                    Some(table) if !table.trim().is_empty() => {}
                    _ => {
                        return Err(ForgeError::Schema(format!(
                            "foreign key ({}) on table {} has no referenced table",
                            constraint.columns.join(", "),
                            self.name
                        )))
                    }
                }
                if constraint.referenced_columns.len() != constraint.columns.len() {
                    return Err(ForgeError::Schema(format!(
                        "foreign key ({}) on table {} references {} columns",
                        constraint.columns.join(", "),
                        self.name,
                        constraint.referenced_columns.len()
                    )));
                }
            }
        }

        Ok(())
    }
}
