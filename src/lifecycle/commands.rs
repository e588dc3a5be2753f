//! Administrative command text for server-hosted engines
//!
//! Other tools parse and replay these statements, so their shape is fixed.

use crate::database::handle::{FileRole, PhysicalFile};
use std::path::Path;

/// Quote an identifier in brackets
fn bracket(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Escape a value placed inside single quotes
fn literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn file_spec(file: &PhysicalFile) -> String {
    format!(
        "(NAME='{}', FILENAME='{}')",
        literal(&file.logical_name),
        literal(&file.path.display().to_string())
    )
}

/// `CREATE DATABASE` over an explicit file manifest, optionally `FOR ATTACH`
pub fn create_database(name: &str, files: &[PhysicalFile], for_attach: bool) -> String {
    let data: Vec<String> = files
        .iter()
        .filter(|f| f.role == FileRole::Primary)
        .map(file_spec)
        .collect();
    let logs: Vec<String> = files
        .iter()
        .filter(|f| f.role == FileRole::Log)
        .map(file_spec)
        .collect();

    let mut sql = format!("CREATE DATABASE {} ON {}", bracket(name), data.join(", "));
    if !logs.is_empty() {
        sql.push_str(&format!(" LOG ON {}", logs.join(", ")));
    }
    if for_attach {
        sql.push_str(" FOR ATTACH");
    }
    sql
}

pub fn set_single_user(name: &str) -> String {
    format!("ALTER DATABASE {} SET SINGLE_USER WITH ROLLBACK IMMEDIATE", bracket(name))
}

pub fn set_multi_user(name: &str) -> String {
    format!("ALTER DATABASE {} SET MULTI_USER WITH ROLLBACK IMMEDIATE", bracket(name))
}

pub fn modify_name(name: &str, new_name: &str) -> String {
    format!("ALTER DATABASE {} MODIFY NAME = {}", bracket(name), bracket(new_name))
}

/// Record a file's new logical name and, when it moves, its new path
///
/// `NEWNAME` is left out when the logical name does not change, since the
/// server rejects renaming a file to its current name.
pub fn modify_file(name: &str, logical: &str, new_logical: &str, path: Option<&Path>) -> String {
    let mut spec = format!("NAME = {}", bracket(logical));
    if logical != new_logical {
        spec.push_str(&format!(", NEWNAME = {}", bracket(new_logical)));
    }
    if let Some(path) = path {
        spec.push_str(&format!(", FILENAME = N'{}'", literal(&path.display().to_string())));
    }
    format!("ALTER DATABASE {} MODIFY FILE ({})", bracket(name), spec)
}

pub fn set_offline(name: &str) -> String {
    format!("ALTER DATABASE {} SET OFFLINE", bracket(name))
}

pub fn set_online(name: &str) -> String {
    format!("ALTER DATABASE {} SET ONLINE", bracket(name))
}

pub fn drop_database(name: &str) -> String {
    format!("DROP DATABASE {}", bracket(name))
}

pub fn detach_database(name: &str) -> String {
    format!("EXEC master.dbo.sp_detach_db @dbname = N'{}'", literal(name))
}

/// Existence check against the engine's catalog schema
pub fn database_exists(catalog: &str, name: &str) -> String {
    format!("SELECT * FROM {}.databases WHERE Name='{}'", catalog, literal(name))
}

pub fn list_servers(catalog: &str) -> String {
    format!("SELECT name FROM {}.servers ORDER BY name", catalog)
}

pub fn list_databases(catalog: &str) -> String {
    format!("SELECT name FROM {}.databases ORDER BY name", catalog)
}

pub fn list_attached_files(catalog: &str) -> String {
    format!("SELECT physical_name FROM {}.master_files", catalog)
}

pub fn list_tables() -> &'static str {
    "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME"
}

pub fn list_columns(table: &str) -> String {
    format!(
        "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = '{}' ORDER BY ORDINAL_POSITION",
        literal(table)
    )
}
