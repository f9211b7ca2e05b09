//! Per-record advisory locking.
//!
//! Spec §5 permits, but does not require, serializing concurrent privileged
//! operations on the same record id. This implements it: a second
//! concurrent create/change/commit/undo/delete on an id already holding a
//! guard fails closed instead of interleaving partial writes.

use std::collections::HashSet;
use std::sync::Arc;

use oprf_oracle_types::RecordId;
use parking_lot::Mutex;

/// Tracks which record ids currently have an in-flight privileged
/// operation.
#[derive(Default, Clone)]
pub struct IdLocks(Arc<Mutex<HashSet<RecordId>>>);

/// Held for the duration of one privileged operation on a record id. On
/// drop, marks the id as available again.
#[must_use]
pub struct IdLockGuard {
    id: RecordId,
    locks: IdLocks,
}

impl Drop for IdLockGuard {
    fn drop(&mut self) {
        self.locks.release(self.id);
    }
}

/// The id already has an outstanding privileged operation in flight.
#[derive(Debug, thiserror::Error)]
#[error("record {0} has a privileged operation already in flight")]
pub struct IdLockedError(pub RecordId);

impl IdLocks {
    /// Attempts to acquire the advisory lock for `id`.
    pub fn acquire(&self, id: RecordId) -> Result<IdLockGuard, IdLockedError> {
        if self.0.lock().insert(id) {
            Ok(IdLockGuard { id, locks: self.clone() })
        } else {
            Err(IdLockedError(id))
        }
    }

    fn release(&self, id: RecordId) {
        self.0.lock().remove(&id);
    }
}
