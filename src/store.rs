//! Tower state store
//!
//! Holds the last known [`TowerState`] for one session.
//!
//! ## Concurrency
//! One `parking_lot::Mutex` guards the state. The receive path replaces it
//! with every decoded state reply (authoritative). The send path performs
//! read-modify-write merges under the same lock (optimistic), so a merge never
//! interleaves with a decode and the next decode always overwrites it.

use parking_lot::Mutex;
use tracing::Span;

use crate::error::Result;
use crate::protocol::{drum_position_bytes, Drum, RotateTargets, TowerState};

/// Last known device state
pub struct TowerStateStore {
    inner: Mutex<StoreInner>,
    span: Span,
}

struct StoreInner {
    state: TowerState,
    /// Number of authoritative updates received this session
    authoritative_updates: u64,
    /// Bumped on every change to `state`
    revision: u64,
}

/// State before an optimistic merge, for undoing it
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    previous: TowerState,
    revision: u64,
}

impl TowerStateStore {
    /// Create a store holding the default state
    pub fn new(span: Span) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                state: TowerState::default(),
                authoritative_updates: 0,
                revision: 0,
            }),
            span,
        }
    }

    /// Copy of the current state
    pub fn state(&self) -> TowerState {
        self.inner.lock().state
    }

    /// Drum bytes matching the last known drum positions, stamped into
    /// non-rotate effect commands
    pub fn drum_bytes(&self) -> [u8; 2] {
        drum_position_bytes(&self.inner.lock().state)
    }

    /// Record a state decoded from the tower
    pub fn replace_authoritative(&self, state: TowerState) {
        let mut inner = self.inner.lock();
        inner.state = state;
        inner.authoritative_updates += 1;
        inner.revision += 1;
        tracing::trace!(parent: &self.span, "Tower state updated from device");
    }

    /// Read-modify-write the state under the lock
    ///
    /// `f` works on a copy; the copy is committed only if `f` succeeds. The
    /// returned [`Checkpoint`] undoes the merge.
    pub fn merge<T>(
        &self,
        f: impl FnOnce(&mut TowerState) -> Result<T>,
    ) -> Result<(T, Checkpoint)> {
        let mut inner = self.inner.lock();
        let mut next = inner.state;
        let value = f(&mut next)?;
        let previous = std::mem::replace(&mut inner.state, next);
        inner.revision += 1;
        Ok((
            value,
            Checkpoint {
                previous,
                revision: inner.revision,
            },
        ))
    }

    /// Undo a merge
    ///
    /// Returns false, leaving the state alone, if anything changed it after
    /// the checkpoint was taken.
    pub fn rollback(&self, checkpoint: Checkpoint) -> bool {
        let mut inner = self.inner.lock();
        if inner.revision != checkpoint.revision {
            return false;
        }
        inner.state = checkpoint.previous;
        inner.revision += 1;
        true
    }

    /// Record the drum targets of an effect rotate
    pub fn record_rotation(&self, targets: &RotateTargets) {
        let mut inner = self.inner.lock();
        for drum in Drum::ALL {
            inner.state.drums[drum.index()].position = targets.side(drum).position();
        }
        inner.revision += 1;
    }

    pub fn authoritative_updates(&self) -> u64 {
        self.inner.lock().authoritative_updates
    }

    /// Back to defaults (used on disconnect)
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = TowerState::default();
        inner.authoritative_updates = 0;
        inner.revision += 1;
        tracing::debug!(parent: &self.span, "Tower state reset");
    }
}
