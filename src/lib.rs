//! dbforge library
//!
//! Lifecycle management and schema translation for SQL Server, SQL Server
//! Compact, Access (Jet) and SQLite databases. The main binary is in
//! src/main.rs.

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod lifecycle;
pub mod provider;
pub mod schema;

pub use error::{ForgeError, Result};
