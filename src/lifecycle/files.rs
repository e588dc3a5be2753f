//! Idempotent file helpers
//!
//! - deleting or renaming a missing source does nothing
//! - copying or renaming onto an existing destination replaces it
//! - destination directories are created on demand

use crate::database::handle::{DatabaseHandle, FileRole, PhysicalFile};
use crate::error::{FileOp, ForgeError, Result};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Create the parent directory of `path` if it is missing
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| ForgeError::file_operation(FileOp::CreateDirectory, parent, e))?;
    }
    Ok(())
}

/// Copy `from` to `to`, replacing `to`
pub fn safe_copy(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Err(ForgeError::file_operation(
            FileOp::Copy,
            from,
            io::Error::new(ErrorKind::InvalidInput, "source and destination are the same file"),
        ));
    }
    ensure_parent(to)?;
    fs::copy(from, to).map_err(|e| ForgeError::file_operation(FileOp::Copy, from, e))?;
    debug!(from = %from.display(), to = %to.display(), "Copied file");
    Ok(())
}

/// Move `from` to `to`, replacing `to`; returns false when `from` is missing
pub fn safe_rename(from: &Path, to: &Path) -> Result<bool> {
    if !from.exists() {
        debug!(from = %from.display(), "Rename source missing, nothing to do");
        return Ok(false);
    }
    if from == to {
        return Ok(true);
    }
    ensure_parent(to)?;
    if to.exists() {
        safe_delete(to)?;
    }

    if let Err(err) = fs::rename(from, to) {
        // different volumes: fall back to copy and delete
        fs::copy(from, to).map_err(|_| ForgeError::file_operation(FileOp::Rename, from, err))?;
        fs::remove_file(from).map_err(|e| ForgeError::file_operation(FileOp::Delete, from, e))?;
    }
    debug!(from = %from.display(), to = %to.display(), "Renamed file");
    Ok(true)
}

/// Delete a file; returns false when it was already gone
pub fn safe_delete(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Deleted file");
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ForgeError::file_operation(FileOp::Delete, path, e)),
    }
}

/// Delete every file of a database
///
/// Failing to delete the primary file is an error. Companion files are
/// removed best-effort.
pub fn delete_database_files(handle: &DatabaseHandle) -> Result<()> {
    for file in handle.physical_files() {
        match safe_delete(&file.path) {
            Ok(_) => {}
            Err(err) if file.role == FileRole::Primary => return Err(err),
            Err(err) => warn!(path = %file.path.display(), error = %err, "Could not delete companion file"),
        }
    }
    Ok(())
}

/// Move each file to its counterpart in `to`
///
/// The primary file must exist; missing companions are skipped.
pub fn rename_files(from: &[PhysicalFile], to: &[PhysicalFile]) -> Result<()> {
    for (old, new) in from.iter().zip(to) {
        let moved = safe_rename(&old.path, &new.path)?;
        if !moved && old.role == FileRole::Primary && !new.path.exists() {
            return Err(ForgeError::NotFound(old.path.display().to_string()));
        }
    }
    Ok(())
}

/// Fail when a destination file is one of the source files
pub fn ensure_distinct(from: &[PhysicalFile], to: &[PhysicalFile]) -> Result<()> {
    match to.iter().find(|new| from.iter().any(|old| old.path == new.path)) {
        Some(clash) => Err(ForgeError::AlreadyExists(format!(
            "{} belongs to the source database",
            clash.path.display()
        ))),
        None => Ok(()),
    }
}

/// Copy each file to its counterpart in `to`
///
/// The primary file must exist; missing companions are skipped.
pub fn copy_files(from: &[PhysicalFile], to: &[PhysicalFile]) -> Result<()> {
    for (old, new) in from.iter().zip(to) {
        if !old.path.exists() {
            if old.role == FileRole::Primary {
                return Err(ForgeError::NotFound(old.path.display().to_string()));
            }
            continue;
        }
        safe_copy(&old.path, &new.path)?;
    }
    Ok(())
}

/// Files directly inside `directory` with the given extension, sorted
pub fn list_with_extension(directory: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.');
    let entries =
        fs::read_dir(directory).map_err(|e| ForgeError::file_operation(FileOp::List, directory, e))?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ForgeError::file_operation(FileOp::List, directory, e))?
            .path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case(wanted));
        if matches && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
