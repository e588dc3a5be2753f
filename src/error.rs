//! Error types for dbforge
//!
//! This module defines the error types used throughout the crate.

use crate::lifecycle::state::{LifecycleOperation, LifecycleStep, ResourceState};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dbforge
pub type Result<T> = std::result::Result<T, ForgeError>;

/// OS-level file operation that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Copy,
    Rename,
    Delete,
    CreateDirectory,
    List,
}

impl std::fmt::Display for FileOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileOp::Copy => "copy",
            FileOp::Rename => "rename",
            FileOp::Delete => "delete",
            FileOp::CreateDirectory => "create directory",
            FileOp::List => "list directory",
        };
        write!(f, "{}", name)
    }
}

/// Main error type for dbforge
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Malformed descriptor or configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Capability not implemented (or disabled) for an engine
    #[error("{operation} is not supported by {engine}")]
    UnsupportedOperation {
        engine: String,
        operation: &'static str,
    },

    /// Unmappable type or invalid constraint reference during DDL generation
    #[error("Schema error: {0}")]
    Schema(String),

    /// Failure opening or using an administrative connection
    #[error("Connection error ({context}): {message}")]
    Connection { context: String, message: String },

    /// A multi-step lifecycle operation failed partway
    #[error(
        "{operation} failed after step {last_completed:?}; database believed {state}: {source}"
    )]
    StateTransition {
        operation: LifecycleOperation,
        last_completed: LifecycleStep,
        state: ResourceState,
        #[source]
        source: Box<ForgeError>,
    },

    /// OS-level file failure
    #[error("Failed to {operation} {}: {source}", path.display())]
    FileOperation {
        operation: FileOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target of a create/copy already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Command parsing errors
    #[error("Command parsing error: {0}")]
    CommandParse(String),

    /// Command was recognized but its arguments were not
    #[error("Invalid syntax for {command}. Expected: {expected}")]
    InvalidCommandSyntax { command: String, expected: String },

    /// Unknown slash command
    #[error("Unknown command: {0}. Type /help for available commands")]
    UnknownCommand(String),
}

impl ForgeError {
    /// Create an UnsupportedOperation error
    pub fn unsupported(engine: impl std::fmt::Display, operation: &'static str) -> Self {
        ForgeError::UnsupportedOperation {
            engine: engine.to_string(),
            operation,
        }
    }

    /// Create a Connection error with context about where it occurred
    pub fn connection(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ForgeError::Connection {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a FileOperation error
    pub fn file_operation(operation: FileOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ForgeError::FileOperation {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Last completed step of a failed lifecycle operation
    pub fn last_completed_step(&self) -> Option<LifecycleStep> {
        match self {
            ForgeError::StateTransition { last_completed, .. } => Some(*last_completed),
            _ => None,
        }
    }

    /// Believed state of the resource after a failed lifecycle operation
    pub fn believed_state(&self) -> Option<&ResourceState> {
        match self {
            ForgeError::StateTransition { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

impl From<sqlx::Error> for ForgeError {
    fn from(err: sqlx::Error) -> Self {
        ForgeError::connection("sqlite", err)
    }
}

impl From<tiberius::error::Error> for ForgeError {
    fn from(err: tiberius::error::Error) -> Self {
        ForgeError::connection("sqlserver", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message() {
        let err = ForgeError::unsupported("SQLite", "EnumerateServers");
        assert_eq!(err.to_string(), "EnumerateServers is not supported by SQLite");
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let err = ForgeError::file_operation(
            FileOp::Delete,
            "/tmp/x.mdf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let detailed = err.format_detailed();
        assert!(detailed.contains("Failed to delete /tmp/x.mdf"));
        assert!(detailed.contains("Caused by"));
        assert!(err.last_completed_step().is_none());
    }
}
