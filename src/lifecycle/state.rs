//! Lifecycle state tracking
//!
//! Every multi-step operation walks a [`StateMachine`]: each completed step
//! is recorded together with what we believe the database looks like, so a
//! failure can report exactly where the sequence stopped.

use crate::error::{ForgeError, Result};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use tracing::{info, warn};

/// Lifecycle operation being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleOperation {
    Create,
    Attach,
    Detach,
    Delete,
    Rename,
    RenameFiles,
    Copy,
    CopyFiles,
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleOperation::Create => "CreateDatabase",
            LifecycleOperation::Attach => "AttachDatabase",
            LifecycleOperation::Detach => "DetachDatabase",
            LifecycleOperation::Delete => "DeleteDatabase",
            LifecycleOperation::Rename => "RenameDatabase",
            LifecycleOperation::RenameFiles => "RenameDatabaseFiles",
            LifecycleOperation::Copy => "CopyDatabase",
            LifecycleOperation::CopyFiles => "CopyDatabaseFiles",
        };
        write!(f, "{}", name)
    }
}

/// A named point in a lifecycle sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleStep {
    Idle,
    ServerConnected,
    Created,
    AttachedFromFiles,
    FileInitialized,
    PoolsCleared,
    SingleUserMode,
    Dropped,
    Detached,
    FilesDeleted,
    LogicalNameChanged,
    /// New logical and physical file names recorded by the server
    FilesModified,
    Offline,
    FilesRenamed,
    Online,
    MultiUserMode,
    ManifestSnapshot,
    FilesCopied,
    /// The original database now carries the target name
    OriginalRenamed,
    /// Temporary copies moved back to the original file names
    CopiesRestored,
    Done,
}

/// Whether the server can open the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Availability {
    Online,
    Offline,
    Absent,
}

/// Who may connect to the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessMode {
    MultiUser,
    SingleUser,
}

/// Believed state of the managed database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceState {
    pub catalog_name: String,
    pub availability: Availability,
    pub access: AccessMode,
}

impl ResourceState {
    /// An attached database open to everyone
    pub fn online(catalog_name: impl Into<String>) -> Self {
        Self {
            catalog_name: catalog_name.into(),
            availability: Availability::Online,
            access: AccessMode::MultiUser,
        }
    }

    /// A database that does not exist yet, or no longer does
    pub fn absent(catalog_name: impl Into<String>) -> Self {
        Self {
            catalog_name: catalog_name.into(),
            availability: Availability::Absent,
            access: AccessMode::MultiUser,
        }
    }

    /// True when the database is online and open to everyone
    pub fn is_usable(&self) -> bool {
        self.availability == Availability::Online && self.access == AccessMode::MultiUser
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let availability = match self.availability {
            Availability::Online => "online",
            Availability::Offline => "offline",
            Availability::Absent => "absent",
        };
        let access = match self.access {
            AccessMode::MultiUser => "multi-user",
            AccessMode::SingleUser => "single-user",
        };
        write!(f, "'{}' {}, {}", self.catalog_name, availability, access)
    }
}

/// Records progress through one lifecycle operation
#[derive(Debug)]
pub struct StateMachine {
    operation: LifecycleOperation,
    last_completed: LifecycleStep,
    state: ResourceState,
}

impl StateMachine {
    pub fn new(operation: LifecycleOperation, state: ResourceState) -> Self {
        Self {
            operation,
            last_completed: LifecycleStep::Idle,
            state,
        }
    }

    pub fn operation(&self) -> LifecycleOperation {
        self.operation
    }

    pub fn last_completed(&self) -> LifecycleStep {
        self.last_completed
    }

    pub fn state(&self) -> &ResourceState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }

    /// Mark a step as completed
    pub fn advance(&mut self, step: LifecycleStep) {
        info!(
            operation = %self.operation,
            step = ?step,
            state = %self.state,
            "Lifecycle step completed"
        );
        self.last_completed = step;
    }

    /// Await one step; on success mark it completed, on failure wrap the error
    pub async fn run<T, F>(&mut self, step: LifecycleStep, action: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match action.await {
            Ok(value) => {
                self.advance(step);
                Ok(value)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Wrap a failure with the last completed step and believed state
    ///
    /// A failure from a nested machine brings its believed state along,
    /// since it saw the database last.
    pub fn fail(&mut self, err: ForgeError) -> ForgeError {
        if let ForgeError::StateTransition { state, .. } = &err {
            self.state = state.clone();
        }
        warn!(
            operation = %self.operation,
            last_completed = ?self.last_completed,
            state = %self.state,
            error = %err,
            "Lifecycle operation failed"
        );
        ForgeError::StateTransition {
            operation: self.operation,
            last_completed: self.last_completed,
            state: self.state.clone(),
            source: Box::new(err),
        }
    }

    /// Mark the operation done and return the final state
    pub fn finish(mut self) -> ResourceState {
        self.advance(LifecycleStep::Done);
        self.state
    }
}
