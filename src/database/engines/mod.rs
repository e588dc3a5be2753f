//! Built-in engine implementations

pub mod file;
pub mod server;

pub use file::FileEngine;
pub use server::ServerEngine;
