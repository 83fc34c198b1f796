//! Per-signer write serialization.
//!
//! Every write holds the signer's slot from nonce fetch until the broadcast returns, so two
//! concurrent writes for one signer can never pick the same nonce. Writes for different
//! signers do not contend.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use alloy_primitives::Address;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Nonce bookkeeping for one signer.
#[derive(Debug, Default)]
pub struct NonceSlot {
    last_submitted: Option<u64>,
}

impl NonceSlot {
    /// Nonce to use given the chain's `latest` transaction count.
    ///
    /// A node that has not yet indexed our previous broadcast reports a stale count, so the
    /// locally recorded nonce wins when it is ahead.
    #[must_use]
    pub fn next_nonce(&self, chain_nonce: u64) -> u64 {
        self.last_submitted
            .map_or(chain_nonce, |last| chain_nonce.max(last.saturating_add(1)))
    }

    /// Records a nonce as accepted by the node.
    pub fn record_submitted(&mut self, nonce: u64) {
        self.last_submitted = Some(self.last_submitted.map_or(nonce, |last| last.max(nonce)));
    }

    #[cfg(test)]
    pub(crate) const fn last_submitted(&self) -> Option<u64> {
        self.last_submitted
    }
}

/// Hands out one exclusive [`NonceSlot`] per signer address.
#[derive(Debug, Default)]
pub struct NonceManager {
    slots: Mutex<HashMap<Address, Arc<AsyncMutex<NonceSlot>>>>,
}

impl NonceManager {
    /// Waits for exclusive access to `signer`'s slot.
    pub async fn acquire(&self, signer: Address) -> OwnedMutexGuard<NonceSlot> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(signer).or_default())
        };
        slot.lock_owned().await
    }
}
