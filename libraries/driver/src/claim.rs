//! Exclusive bus ownership bookkeeping

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use hal::TransportError;

/// Set of bus ids currently held by a live handle
#[derive(Debug, Clone, Default)]
pub struct ClaimRegistry {
    held: Arc<Mutex<HashSet<u8>>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a bus, failing if another handle already holds it
    pub fn claim(&self, bus_id: u8) -> Result<BusClaim, TransportError> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(bus_id) {
            return Err(TransportError::Busy(bus_id));
        }
        Ok(BusClaim {
            bus_id,
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_claimed(&self, bus_id: u8) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&bus_id)
    }
}

/// Proof of ownership of a bus; released on drop
#[derive(Debug)]
pub struct BusClaim {
    bus_id: u8,
    held: Arc<Mutex<HashSet<u8>>>,
}

impl BusClaim {
    pub fn bus_id(&self) -> u8 {
        self.bus_id
    }
}

impl Drop for BusClaim {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.bus_id);
    }
}
