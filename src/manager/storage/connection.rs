//! DashMap-based connection storage implementation.

use dashmap::DashMap;

use crate::manager::types::HostKey;

use super::traits::{ConnectionStorage, SessionSlot};

/// DashMap-based implementation of `ConnectionStorage`.
///
/// Slots are never removed: a closed session stays keyed so the next lookup
/// goes through the liveness probe and reconnects it.
pub struct DashMapConnectionStorage {
    slots: DashMap<HostKey, SessionSlot>,
}

impl DashMapConnectionStorage {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl Default for DashMapConnectionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStorage for DashMapConnectionStorage {
    fn slot(&self, key: &HostKey) -> SessionSlot {
        // Clone out so the shard lock is released before anyone awaits the slot.
        self.slots.entry(key.clone()).or_default().clone()
    }

    fn slots(&self) -> Vec<(HostKey, SessionSlot)> {
        let mut slots: Vec<(HostKey, SessionSlot)> = self
            .slots
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));
        slots
    }
}
