use crate::data_structures::{InvalidTransition, SwapId, SwapRecord, SwapState};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("swap '{0}' not found")]
    NotFound(SwapId),
    #[error("swap '{0}' already exists")]
    AlreadyExists(SwapId),
    #[error("swap '{id}' is in state {actual}, expected one of {expected:?}")]
    StateConflict {
        id: SwapId,
        actual: SwapState,
        expected: Vec<SwapState>,
    },
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Single authoritative store of swap records.
///
/// The outer map lock is held only for insert/lookup; every mutation runs
/// under that swap's own mutex, so transitions for one swap are serialized
/// (two adapters reporting locks concurrently, or a timeout racing a lock
/// report) without cross-swap contention. Records are kept after reaching
/// a terminal state; eviction is an external concern.
#[derive(Debug, Default)]
pub struct SwapRegistry {
    swaps: RwLock<HashMap<SwapId, Arc<Mutex<SwapRecord>>>>,
}

impl SwapRegistry {
    pub fn new() -> Self {
        SwapRegistry {
            swaps: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a new record, failing if the id is already taken.
    pub fn create(&self, record: SwapRecord) -> Result<(), RegistryError> {
        let mut swaps = self.swaps.write().unwrap();
        if swaps.contains_key(&record.swap_id) {
            return Err(RegistryError::AlreadyExists(record.swap_id));
        }
        debug!("[Registry] Created swap {}", record.swap_id);
        swaps.insert(record.swap_id.clone(), Arc::new(Mutex::new(record)));
        Ok(())
    }

    /// Snapshot of a swap record.
    pub fn get(&self, swap_id: &str) -> Option<SwapRecord> {
        let entry = {
            let swaps = self.swaps.read().unwrap();
            swaps.get(swap_id).cloned()
        };
        entry.map(|e| e.lock().unwrap().clone())
    }

    pub fn contains(&self, swap_id: &str) -> bool {
        self.swaps.read().unwrap().contains_key(swap_id)
    }

    /// Runs `mutation` inside the swap's critical section. The closure
    /// operates on a working copy which is committed only on `Ok`, so a
    /// rejected update leaves the record exactly as it was.
    pub fn update<T, E, F>(&self, swap_id: &str, mutation: F) -> Result<T, E>
    where
        F: FnOnce(&mut SwapRecord) -> Result<T, E>,
        E: From<RegistryError>,
    {
        let entry = {
            let swaps = self.swaps.read().unwrap();
            swaps.get(swap_id).cloned()
        }
        .ok_or_else(|| RegistryError::NotFound(swap_id.to_string()))?;

        let mut guard = entry.lock().unwrap();
        let mut working = guard.clone();
        let out = mutation(&mut working)?;
        *guard = working;
        Ok(out)
    }

    /// Compare-and-transition: moves the swap to `new_state` if its current
    /// state is one of `expected`, applying `mutate` to the record first.
    /// Returns the committed record.
    pub fn compare_and_transition<F>(
        &self,
        swap_id: &str,
        expected: &[SwapState],
        new_state: SwapState,
        mutate: F,
    ) -> Result<SwapRecord, RegistryError>
    where
        F: FnOnce(&mut SwapRecord),
    {
        self.update(swap_id, |record| {
            if !expected.contains(&record.state) {
                return Err(RegistryError::StateConflict {
                    id: record.swap_id.clone(),
                    actual: record.state,
                    expected: expected.to_vec(),
                });
            }
            mutate(record);
            record.set_state(new_state)?;
            Ok(record.clone())
        })
    }
}
