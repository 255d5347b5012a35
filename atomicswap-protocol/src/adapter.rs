use crate::coordinator::{AdapterEvent, SwapCoordinator};
use crate::data_structures::{AssetSpec, ChainTxRef, SwapId};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("lock rejected: {0}")]
    LockRejected(String),
    #[error("unlock rejected: {0}")]
    UnlockRejected(String),
    #[error("chain unavailable: {0}")]
    Unavailable(String),
}

/// The per-chain collaborator contract.
///
/// `lock` must be the irreversible leg of the swap on its chain, not a
/// revocable reservation: the coordinator declares a swap completed as
/// soon as both legs report locks, so a lock that the owner could still
/// revoke would break atomicity. Adapters are expected to retry their own
/// transient submission failures before reporting an error; the
/// coordinator's callbacks are idempotent, so redelivery is safe.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// The chain this adapter serves.
    fn chain(&self) -> &str;

    /// Irreversibly commits the asset to the swap on this chain, returning
    /// the chain transaction reference of the lock.
    async fn lock(
        &self,
        swap_id: &SwapId,
        address: &str,
        asset: &AssetSpec,
    ) -> Result<ChainTxRef, AdapterError>;

    /// Reverses a previous lock, returning the unlock transaction reference.
    async fn unlock(
        &self,
        swap_id: &SwapId,
        lock_tx_ref: &ChainTxRef,
    ) -> Result<ChainTxRef, AdapterError>;
}

/// Bridges a `ChainAdapter` onto the coordinator's event channels for
/// in-process operation: consumes the chain's event stream, performs the
/// chain calls and reports outcomes back through the coordinator's
/// callbacks. Out-of-process adapters speak the HTTP control plane
/// instead and never use this type.
pub struct AdapterRunner {
    adapter: Arc<dyn ChainAdapter>,
    coordinator: Arc<SwapCoordinator>,
}

impl AdapterRunner {
    pub fn new(adapter: Arc<dyn ChainAdapter>, coordinator: Arc<SwapCoordinator>) -> Self {
        AdapterRunner {
            adapter,
            coordinator,
        }
    }

    /// Subscribes the adapter to its chain and spawns the event loop.
    /// The task ends when the coordinator drops the chain's channel.
    pub fn spawn(self) -> JoinHandle<()> {
        let events = self.coordinator.subscribe(self.adapter.chain());
        tokio::spawn(self.run(events))
    }

    async fn run(self, mut events: mpsc::Receiver<AdapterEvent>) {
        let chain = self.adapter.chain().to_string();
        info!("[AdapterRunner] Event loop started for chain {}", chain);
        while let Some(event) = events.recv().await {
            match event {
                AdapterEvent::SwapInitiated {
                    swap_id,
                    leg,
                    resolved_address,
                    asset,
                    ..
                } => {
                    debug!(
                        "[AdapterRunner:{}] Locking {} leg of swap {}",
                        chain, leg, swap_id
                    );
                    match self.adapter.lock(&swap_id, &resolved_address, &asset).await {
                        Ok(tx_ref) => {
                            if let Err(e) = self.coordinator.report_lock(&swap_id, leg, tx_ref) {
                                warn!(
                                    "[AdapterRunner:{}] Lock report rejected for swap {}: {}",
                                    chain, swap_id, e
                                );
                            }
                        }
                        Err(e) => {
                            warn!(
                                "[AdapterRunner:{}] Lock failed for swap {}: {}",
                                chain, swap_id, e
                            );
                            if let Err(e) =
                                self.coordinator
                                    .report_lock_failure(&swap_id, leg, &e.to_string())
                            {
                                warn!(
                                    "[AdapterRunner:{}] Lock-failure report rejected for swap {}: {}",
                                    chain, swap_id, e
                                );
                            }
                        }
                    }
                }
                AdapterEvent::SwapRollbackRequested {
                    swap_id,
                    legs_to_unlock,
                } => {
                    // Unlock only the leg this chain serves.
                    let leg = match self.coordinator.leg_for_chain(&swap_id, &chain) {
                        Ok(leg) if legs_to_unlock.contains(&leg) => leg,
                        Ok(_) => continue,
                        Err(e) => {
                            warn!(
                                "[AdapterRunner:{}] Rollback request for unknown swap {}: {}",
                                chain, swap_id, e
                            );
                            continue;
                        }
                    };
                    let lock_tx_ref = self
                        .coordinator
                        .get_swap(&swap_id)
                        .and_then(|r| r.leg(leg).lock_proof.clone());
                    let Some(lock_tx_ref) = lock_tx_ref else {
                        warn!(
                            "[AdapterRunner:{}] No lock proof recorded for swap {} {} leg, skipping unlock",
                            chain, swap_id, leg
                        );
                        continue;
                    };
                    match self.adapter.unlock(&swap_id, &lock_tx_ref).await {
                        Ok(tx_ref) => {
                            if let Err(e) = self.coordinator.report_unlock(&swap_id, leg, tx_ref) {
                                warn!(
                                    "[AdapterRunner:{}] Unlock report rejected for swap {}: {}",
                                    chain, swap_id, e
                                );
                            }
                        }
                        Err(e) => {
                            error!(
                                "[AdapterRunner:{}] Unlock failed for swap {}: {}",
                                chain, swap_id, e
                            );
                            if let Err(e) =
                                self.coordinator
                                    .report_unlock_failure(&swap_id, leg, &e.to_string())
                            {
                                warn!(
                                    "[AdapterRunner:{}] Unlock-failure report rejected for swap {}: {}",
                                    chain, swap_id, e
                                );
                            }
                        }
                    }
                }
                AdapterEvent::SwapCompleted { swap_id } => {
                    // Nothing left to submit; the lock itself was the
                    // irreversible transfer on this chain.
                    info!(
                        "[AdapterRunner:{}] Swap {} completed",
                        chain, swap_id
                    );
                }
            }
        }
        info!("[AdapterRunner] Event loop ended for chain {}", chain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::data_structures::SwapState;
    use crate::identity::{IdentityResolver, IdentityStore};
    use crate::test_utils::{test_identity_store, test_request, MockChainAdapter};
    use std::time::Duration;
    use tokio::time::sleep;

    fn coordinator() -> Arc<SwapCoordinator> {
        let store: Arc<IdentityStore> = Arc::new(test_identity_store());
        SwapCoordinator::new(
            CoordinatorConfig::default(),
            IdentityResolver::new(store),
        )
    }

    #[tokio::test]
    async fn runners_drive_swap_to_completion() {
        let coordinator = coordinator();
        let adapter_a = Arc::new(MockChainAdapter::new("chain-a"));
        let adapter_b = Arc::new(MockChainAdapter::new("chain-b"));
        AdapterRunner::new(adapter_a.clone(), Arc::clone(&coordinator)).spawn();
        AdapterRunner::new(adapter_b.clone(), Arc::clone(&coordinator)).spawn();

        let swap_id = coordinator.initiate(test_request()).unwrap();
        sleep(Duration::from_millis(200)).await;

        let record = coordinator.get_swap(&swap_id).unwrap();
        assert_eq!(record.state, SwapState::Completed);
        assert_eq!(adapter_a.locks_performed(), 1);
        assert_eq!(adapter_b.locks_performed(), 1);
    }

    #[tokio::test]
    async fn lock_failure_on_one_chain_unwinds_the_other() {
        let coordinator = coordinator();
        let adapter_a = Arc::new(MockChainAdapter::new("chain-a"));
        let adapter_b = Arc::new(MockChainAdapter::new("chain-b"));
        adapter_b.fail_next_lock("insufficient balance");
        // Delay chain-b so chain-a's lock lands before the failure report.
        adapter_b.set_lock_delay(Duration::from_millis(100));
        AdapterRunner::new(adapter_a.clone(), Arc::clone(&coordinator)).spawn();
        AdapterRunner::new(adapter_b.clone(), Arc::clone(&coordinator)).spawn();

        let swap_id = coordinator.initiate(test_request()).unwrap();
        sleep(Duration::from_millis(300)).await;

        let record = coordinator.get_swap(&swap_id).unwrap();
        assert_eq!(record.state, SwapState::RolledBack);
        // chain-a locked then unlocked; chain-b never held a lock.
        assert_eq!(adapter_a.unlocks_performed(), 1);
        assert_eq!(adapter_b.unlocks_performed(), 0);
        assert!(record.initiator_leg.rollback_proof.is_some());
        assert_eq!(record.responder_leg.lock_proof, None);
    }
}
