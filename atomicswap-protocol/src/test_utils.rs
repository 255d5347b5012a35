// Shared fixtures for unit and integration tests.

use crate::adapter::{AdapterError, ChainAdapter};
use crate::coordinator::InitiateRequest;
use crate::data_structures::{AssetSpec, ChainTxRef, LegRecord, SwapId, SwapRecord, SwapState};
use crate::identity::IdentityStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn test_asset(chain: &str, amount: u64) -> AssetSpec {
    AssetSpec {
        chain: chain.to_string(),
        amount,
        asset_ref: format!("TOK-{}", chain),
    }
}

/// Identity store with the fixtures used throughout the tests:
/// alice and bob, each mapped on both chains.
pub fn test_identity_store() -> IdentityStore {
    IdentityStore::from_entries(vec![
        ("alice@example".into(), "chain-a".into(), "0xA11CE".into()),
        ("alice@example".into(), "chain-b".into(), "0xA11CE-B".into()),
        ("bob@example".into(), "chain-a".into(), "0xB0B-A".into()),
        ("bob@example".into(), "chain-b".into(), "0xB0B".into()),
    ])
}

/// A 5-unit chain-a leg from alice against a 10-unit chain-b leg from bob.
pub fn test_request() -> InitiateRequest {
    InitiateRequest {
        initiator: "alice@example".to_string(),
        responder: "bob@example".to_string(),
        initiator_asset: test_asset("chain-a", 5),
        responder_asset: test_asset("chain-b", 10),
        timeout: None,
        idempotency_key: None,
    }
}

/// A freshly-initiated swap record, bypassing the coordinator.
pub fn test_swap_record(swap_id: &str) -> SwapRecord {
    let created_at = Utc::now();
    SwapRecord {
        swap_id: swap_id.to_string(),
        initiator: "alice@example".to_string(),
        responder: "bob@example".to_string(),
        initiator_leg: LegRecord::new(
            "alice@example".to_string(),
            test_asset("chain-a", 5),
            "0xA11CE".to_string(),
        ),
        responder_leg: LegRecord::new(
            "bob@example".to_string(),
            test_asset("chain-b", 10),
            "0xB0B".to_string(),
        ),
        state: SwapState::Initiated,
        failure_reason: None,
        created_at,
        expires_at: created_at + chrono::Duration::seconds(60),
    }
}

/// Scriptable in-memory chain adapter. Locks and unlocks succeed by
/// default with generated tx refs; the next lock or unlock can be made
/// to fail, and an artificial chain latency can be configured to pin
/// down orderings in concurrency tests.
pub struct MockChainAdapter {
    chain: String,
    tx_counter: AtomicU64,
    lock_delay: Mutex<Duration>,
    fail_next_lock: Mutex<Option<String>>,
    fail_next_unlock: Mutex<Option<String>>,
    locks: Mutex<Vec<(SwapId, String, AssetSpec)>>,
    unlocks: Mutex<Vec<(SwapId, ChainTxRef)>>,
}

impl MockChainAdapter {
    pub fn new(chain: &str) -> Self {
        MockChainAdapter {
            chain: chain.to_string(),
            tx_counter: AtomicU64::new(0),
            lock_delay: Mutex::new(Duration::ZERO),
            fail_next_lock: Mutex::new(None),
            fail_next_unlock: Mutex::new(None),
            locks: Mutex::new(Vec::new()),
            unlocks: Mutex::new(Vec::new()),
        }
    }

    pub fn set_lock_delay(&self, delay: Duration) {
        *self.lock_delay.lock().unwrap() = delay;
    }

    pub fn fail_next_lock(&self, reason: &str) {
        *self.fail_next_lock.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_next_unlock(&self, reason: &str) {
        *self.fail_next_unlock.lock().unwrap() = Some(reason.to_string());
    }

    pub fn locks_performed(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    pub fn unlocks_performed(&self) -> usize {
        self.unlocks.lock().unwrap().len()
    }

    fn next_tx_ref(&self, kind: &str) -> ChainTxRef {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}-{}", self.chain, kind, n)
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    fn chain(&self) -> &str {
        &self.chain
    }

    async fn lock(
        &self,
        swap_id: &SwapId,
        address: &str,
        asset: &AssetSpec,
    ) -> Result<ChainTxRef, AdapterError> {
        let delay = *self.lock_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.fail_next_lock.lock().unwrap().take() {
            return Err(AdapterError::LockRejected(reason));
        }
        self.locks
            .lock()
            .unwrap()
            .push((swap_id.clone(), address.to_string(), asset.clone()));
        Ok(self.next_tx_ref("lock"))
    }

    async fn unlock(
        &self,
        swap_id: &SwapId,
        lock_tx_ref: &ChainTxRef,
    ) -> Result<ChainTxRef, AdapterError> {
        if let Some(reason) = self.fail_next_unlock.lock().unwrap().take() {
            return Err(AdapterError::UnlockRejected(reason));
        }
        self.unlocks
            .lock()
            .unwrap()
            .push((swap_id.clone(), lock_tx_ref.clone()));
        Ok(self.next_tx_ref("unlock"))
    }
}
