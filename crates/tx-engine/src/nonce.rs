use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::Address;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-address locks serializing "fetch nonce, sign, submit" within one process.
///
/// The nonce comes from the node's pending view, so two overlapping sends
/// from the same address would otherwise read the same value.
#[derive(Debug, Clone, Default)]
pub struct NonceLocks {
    locks: Arc<Mutex<HashMap<Address, Arc<Mutex<()>>>>>,
}

impl NonceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder exists for `address`.
    ///
    /// Entries nobody holds or waits on are dropped on each call, so the map
    /// only tracks addresses with a send in flight.
    pub async fn acquire(&self, address: Address) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(address).or_default().clone()
        };
        lock.lock_owned().await
    }
}
