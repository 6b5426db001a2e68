//! Single-flight gates for concurrent token refreshes.
//!
//! Collapses concurrent refresh attempts for the same (user, provider)
//! into one in-flight operation: the first caller performs the refresh
//! while holders of the same gate wait, then re-check the stored
//! credential instead of issuing their own request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

type Key = (i64, String);

#[derive(Default)]
pub(crate) struct RefreshGates {
    gates: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl RefreshGates {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fetch (or create) the gate for one (user, provider) key.
    pub(crate) fn gate(&self, user_id: i64, provider: &str) -> Arc<AsyncMutex<()>> {
        let mut gates = self.gates.lock().expect("refresh gate map poisoned");
        gates.entry((user_id, provider.to_string())).or_default().clone()
    }

    /// Evict the map entry once no other caller holds the gate.
    pub(crate) fn release(&self, user_id: i64, provider: &str, gate: &Arc<AsyncMutex<()>>) {
        let mut gates = self.gates.lock().expect("refresh gate map poisoned");
        // Two strong counts remain when the caller is last out: the map's
        // clone and the caller's own.
        if Arc::strong_count(gate) <= 2 {
            gates.remove(&(user_id, provider.to_string()));
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.gates.lock().expect("refresh gate map poisoned").len()
    }
}
