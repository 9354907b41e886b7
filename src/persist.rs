//! Moving snapshots between the engine and the remote backend.
//!
//! The remote side only ever sees opaque bytes; this module is where
//! the snapshot codec meets the lock discipline. Storing is refused
//! outright while the diagnostics bundle carries errors.

use statekit::{LockInfo, RemoteState, StateError};
use thiserror::Error;

use crate::diag::Diagnostics;
use crate::state::StateSnapshot;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("state snapshot encoding failed: {0}")]
    Codec(#[from] serde_json::Error),

    /// The plan produced errors, so its state must not be written
    #[error("refusing to persist state: planning produced errors")]
    Halted,
}

/// Fetch and decode the workspace's snapshot. A missing state object is
/// an empty snapshot.
pub fn load_snapshot(mgr: &mut RemoteState) -> Result<StateSnapshot, PersistError> {
    mgr.refresh()?;
    match mgr.state() {
        None => Ok(StateSnapshot::empty()),
        Some(bytes) => Ok(StateSnapshot::from_bytes(bytes)?),
    }
}

/// Encode and store a snapshot under the advisory lock.
///
/// Refuses when the diagnostics carry errors. The lock is released on
/// every path; a failure while unlocking is reported rather than
/// swallowed.
pub fn store_snapshot(
    mgr: &mut RemoteState,
    snapshot: &StateSnapshot,
    diags: &Diagnostics,
    mut info: LockInfo,
) -> Result<(), PersistError> {
    if diags.has_errors() {
        return Err(PersistError::Halted);
    }

    let bytes = snapshot.to_bytes()?;
    if info.operation.is_empty() {
        info.operation = "persist".to_string();
    }
    let lock_id = mgr.lock(info)?;

    let result = (|| -> Result<(), PersistError> {
        mgr.write(bytes);
        mgr.persist()?;
        Ok(())
    })();

    match mgr.unlock(&lock_id) {
        Ok(()) => result,
        Err(unlock_err) => {
            let parent = result.err().and_then(|e| match e {
                PersistError::State(s) => Some(s),
                other => {
                    log::debug!("persist error eclipsed by unlock failure: {other}");
                    None
                }
            });
            Err(StateError::unlock_failed(&lock_id, unlock_err, parent).into())
        }
    }
}
