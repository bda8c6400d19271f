//! Lock store: the current lock of every position.
//!
//! A plain keyed table with no validation. Callers check preconditions
//! before writing.

use std::collections::BTreeMap;

use ebb_core::types::{Lock, PositionId};

#[derive(Debug, Clone, Default, bincode::Encode, bincode::Decode)]
pub struct LockStore {
    locks: BTreeMap<PositionId, Lock>,
}

impl LockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lock of `id`; the empty lock for unknown or withdrawn positions.
    pub fn get(&self, id: PositionId) -> Lock {
        self.locks.get(&id).copied().unwrap_or_default()
    }

    pub fn set(&mut self, id: PositionId, lock: Lock) {
        self.locks.insert(id, lock);
    }

    /// Reset `id` to the empty lock.
    pub fn clear(&mut self, id: PositionId) {
        self.locks.remove(&id);
    }

    /// Number of positions holding a non-empty lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PositionId, &Lock)> {
        self.locks.iter().map(|(id, lock)| (*id, lock))
    }
}
