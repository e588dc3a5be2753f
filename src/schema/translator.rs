//! Schema translator
//!
//! Turns a [`TableSchema`] into a single `CREATE TABLE` statement in the
//! vocabulary of a [`Dialect`]. The translator itself is stateless apart
//! from its identifier mode and can be shared freely.

use crate::error::{ForgeError, Result};
use crate::schema::dialect::{Dialect, IdentityPhrase, TypeKey, TypeName};
use crate::schema::{ColumnSpec, ConstraintKind, ConstraintSpec, ReferentialRule, TableSchema};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Precision and scale used for decimals declared without them
pub const DEFAULT_DECIMAL_PRECISION: (u8, u8) = (18, 4);

/// How identifiers containing spaces are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierMode {
    /// `Order Date` becomes `[Order Date]`
    #[default]
    Bracket,
    /// `Order Date` becomes `OrderDate`
    StripSpaces,
}

/// Stateless generator of `CREATE TABLE` statements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaTranslator {
    mode: IdentifierMode,
}

impl SchemaTranslator {
    pub fn new(mode: IdentifierMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> IdentifierMode {
        self.mode
    }

    /// Render an identifier; only names containing spaces are altered
    pub fn quote_ident(&self, name: &str) -> String {
        if !name.contains(' ') {
            return name.to_string();
        }
        match self.mode {
            IdentifierMode::Bracket => format!("[{}]", name.replace(']', "]]")),
            IdentifierMode::StripSpaces => name.replace(' ', ""),
        }
    }

    /// Generate the `CREATE TABLE` statement for a table
    pub fn translate<D: Dialect + ?Sized>(&self, schema: &TableSchema, dialect: &D) -> Result<String> {
        schema.validate()?;

        let mut items = Vec::with_capacity(schema.columns.len() + schema.constraints.len());
        for column in &schema.columns {
            items.push(self.column_clause(schema, column, dialect)?);
        }
        for constraint in schema.constraints.iter().filter(|c| !c.is_inline()) {
            items.push(self.table_constraint(constraint));
        }

        debug!(
            table = %schema.name,
            dialect = dialect.name(),
            columns = schema.columns.len(),
            "Generated CREATE TABLE"
        );

        Ok(format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.quote_ident(&schema.name),
            items.join(",\n    ")
        ))
    }

    fn column_clause<D: Dialect + ?Sized>(
        &self,
        schema: &TableSchema,
        column: &ColumnSpec,
        dialect: &D,
    ) -> Result<String> {
        let type_text = self.column_type(schema, column, dialect)?;
        let identity = column.identity.map(|spec| dialect.identity_phrase(&spec));

        let mut parts = vec![self.quote_ident(&column.name)];
        match &identity {
            Some(IdentityPhrase::ReplaceType(keyword)) => parts.push(keyword.clone()),
            Some(IdentityPhrase::Suffix(keyword)) => {
                parts.push(type_text);
                parts.push(keyword.clone());
            }
            _ => parts.push(type_text),
        }

        if let Some(null_clause) = dialect.null_constraint(column.nullable) {
            parts.push(null_clause.to_string());
        }
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default));
        }

        let mut inline_primary_key = false;
        for constraint in schema.inline_constraints(&column.name) {
            match constraint.kind {
                ConstraintKind::PrimaryKey => {
                    inline_primary_key = true;
                    parts.push("PRIMARY KEY".to_string());
                }
                ConstraintKind::Unique => parts.push("UNIQUE".to_string()),
                ConstraintKind::ForeignKey => parts.push(self.references_clause(constraint)),
            }
        }

        if let Some(IdentityPhrase::AfterConstraints(keyword)) = &identity {
            if !inline_primary_key {
                return Err(ForgeError::Schema(format!(
                    "{} requires identity column {} to be the single-column primary key",
                    dialect.name(),
                    column.name
                )));
            }
            parts.push(keyword.clone());
        }

        Ok(parts.join(" "))
    }

    fn column_type<D: Dialect + ?Sized>(
        &self,
        schema: &TableSchema,
        column: &ColumnSpec,
        dialect: &D,
    ) -> Result<String> {
        let key = TypeKey::for_column(column.canonical_type, column.length);
        let type_name = dialect.type_name(key).ok_or_else(|| {
            ForgeError::Schema(format!(
                "column {}.{}: type {} has no mapping in the {} dialect",
                schema.name,
                column.name,
                column.canonical_type,
                dialect.name()
            ))
        })?;

        match type_name {
            TypeName::Plain(token) => Ok(token.to_string()),
            TypeName::Sized(token) => {
                let length = column.length.unwrap_or_else(|| dialect.max_string_length());
                if length == 0 {
                    return Err(ForgeError::Schema(format!(
                        "column {}.{} has length 0",
                        schema.name, column.name
                    )));
                }
                Ok(format!("{}({})", token, length.min(dialect.max_string_length())))
            }
            TypeName::Scaled(token) => {
                let (precision, scale) = column.precision.unwrap_or(DEFAULT_DECIMAL_PRECISION);
                Ok(format!("{}({}, {})", token, precision, scale))
            }
        }
    }

    fn table_constraint(&self, constraint: &ConstraintSpec) -> String {
        let columns = self.ident_list(&constraint.columns);
        match constraint.kind {
            ConstraintKind::PrimaryKey => format!("PRIMARY KEY ({})", columns),
            ConstraintKind::Unique => format!("UNIQUE ({})", columns),
            ConstraintKind::ForeignKey => {
                format!("FOREIGN KEY ({}) {}", columns, self.references_clause(constraint))
            }
        }
    }

    fn references_clause(&self, constraint: &ConstraintSpec) -> String {
        let table = constraint.referenced_table.as_deref().unwrap_or_default();
        let mut clause = format!(
            "REFERENCES {}({})",
            self.quote_ident(table),
            self.ident_list(&constraint.referenced_columns)
        );
        if constraint.on_delete != ReferentialRule::Cascade {
            clause.push_str(&format!(" ON DELETE {}", constraint.on_delete.keyword()));
        }
        if constraint.on_update != ReferentialRule::Cascade {
            clause.push_str(&format!(" ON UPDATE {}", constraint.on_update.keyword()));
        }
        clause
    }

    fn ident_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|name| self.quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
