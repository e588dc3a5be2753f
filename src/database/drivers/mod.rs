//! Built-in driver factories.
//!
//! - [`sqlite`]: SQLite through sqlx, with a per-file pool cache
//! - [`mssql`]: SQL Server through tiberius, one connection per call
//!
//! Any other (engine, mechanism) pair needs a factory registered with
//! [`ConnectionResolver::register_factory`](crate::database::ConnectionResolver::register_factory).

pub mod mssql;
pub mod sqlite;

pub use mssql::TiberiusDriver;
pub use sqlite::SqliteDriver;
