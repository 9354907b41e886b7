//! Error types for remote state operations.
//!
//! Lock conflicts carry the existing holder's metadata so the operator
//! can see who owns the state and decide whether to force-unlock.

use thiserror::Error;

use crate::lock::LockInfo;

/// Errors surfaced by a key/value storage engine.
///
/// A commit that loses a transactional race reports `Conflict`; every
/// other storage failure is `Transport`. The distinction matters because
/// conflicts are retried by lock acquisition while transport errors are
/// not retried by this crate at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A transactional commit observed a concurrent write
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// The storage engine failed to serve the request
    #[error("backend transport error: {0}")]
    Transport(String),
}

/// A lock could not be acquired.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct LockError {
    /// The current holder, when one was observed
    pub info: Option<LockInfo>,
    pub message: String,
}

/// Errors from the remote state client and workspace manager.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),

    /// Releasing a lock failed; reported alongside whatever error was
    /// already being handled, never swallowed
    #[error("error unlocking state (lock id {id}): {message}; the state may need a force-unlock")]
    Unlock { id: String, message: String },

    /// The payload read back does not match the last persisted digest
    #[error("state payload checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Stored lock metadata failed to deserialize
    #[error("corrupt lock info: {0}")]
    CorruptLockInfo(String),

    /// The default workspace cannot be deleted, nor can the empty name
    #[error("cannot delete the default workspace")]
    DefaultWorkspace,

    /// Deleting a workspace that is currently locked is refused
    #[error("workspace {name:?} is locked by {who}; unlock it before deleting", who = .holder.who)]
    WorkspaceLocked { name: String, holder: LockInfo },
}

impl StateError {
    /// Fold an unlock failure into the error being handled, preserving
    /// both messages.
    pub fn unlock_failed(id: &str, unlock_err: StateError, parent: Option<StateError>) -> Self {
        let message = match parent {
            Some(parent) => format!("{unlock_err} (while handling: {parent})"),
            None => unlock_err.to_string(),
        };
        StateError::Unlock {
            id: id.to_string(),
            message,
        }
    }
}

/// Result type for remote state operations.
pub type Result<T> = std::result::Result<T, StateError>;
