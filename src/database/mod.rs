//! Database module
//!
//! This module provides database handles, connection resolution, the
//! per-engine capability surface and the registry that holds the engines.

pub mod connection;
pub mod drivers;
pub mod engine;
pub mod engines;
pub mod handle;
pub mod registry;

// Re-exports
pub use connection::{AdminConnection, ConnectionParams, ConnectionResolver, ConnectionString, DriverFactory};
pub use engine::{CopyTarget, DatabaseEngine, EngineContext, RenameTarget, TableBuilder};
pub use handle::{Credentials, DatabaseHandle, FileRole, PhysicalFile, MASTER_DATABASE};
pub use registry::EngineRegistry;
