use crate::config::CoordinatorConfig;
use crate::coordinator::events::{AdapterEvent, AdapterRouter};
use crate::data_structures::{
    new_swap_id, swap_id_from_idempotency_key, AssetSpec, ChainTxRef, InvalidTransition,
    LegRecord, PortableId, SwapId, SwapLeg, SwapRecord, SwapState,
};
use crate::identity::{IdentityResolver, ResolveError};
use crate::registry::{RegistryError, SwapRegistry};
use crate::supervisor::TimeoutSupervisor;
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum SwapError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Registry(RegistryError),
    #[error("invalid swap request: {0}")]
    Validation(String),
    #[error("swap '{swap_id}' is in state {state} and not accepting lock reports")]
    NotAcceptingLocks { swap_id: SwapId, state: SwapState },
    #[error("swap '{swap_id}' is past its expiry deadline")]
    SwapExpired { swap_id: SwapId },
    #[error("{leg} leg of swap '{swap_id}' is already locked with a different tx ref")]
    ConflictingLockProof { swap_id: SwapId, leg: SwapLeg },
    #[error("{leg} leg of swap '{swap_id}' is already unlocked with a different tx ref")]
    ConflictingRollbackProof { swap_id: SwapId, leg: SwapLeg },
    #[error("{leg} leg of swap '{swap_id}' holds no lock")]
    LegNotLocked { swap_id: SwapId, leg: SwapLeg },
    #[error("swap '{swap_id}' is in state {state}, not rolling back")]
    RollbackNotInProgress { swap_id: SwapId, state: SwapState },
    #[error("chain '{chain}' serves no leg of swap '{swap_id}'")]
    UnknownChain { swap_id: SwapId, chain: String },
    #[error("idempotency key already maps to swap '{swap_id}' with a different payload")]
    IdempotencyMismatch { swap_id: SwapId },
}

impl From<RegistryError> for SwapError {
    fn from(e: RegistryError) -> Self {
        SwapError::Registry(e)
    }
}

impl From<InvalidTransition> for SwapError {
    fn from(e: InvalidTransition) -> Self {
        SwapError::Registry(RegistryError::InvalidTransition(e))
    }
}

/// A swap initiation request. `timeout` falls back to the configured
/// default and is clamped to the configured maximum; a retried request
/// carrying the same `idempotency_key` maps onto the same swap.
#[derive(Clone, Debug)]
pub struct InitiateRequest {
    pub initiator: PortableId,
    pub responder: PortableId,
    pub initiator_asset: AssetSpec,
    pub responder_asset: AssetSpec,
    pub timeout: Option<Duration>,
    pub idempotency_key: Option<String>,
}

// Outcomes of the per-swap critical sections, consumed after the registry
// lock is released to decide what to emit.
enum LockOutcome {
    Duplicate(SwapState),
    Locked(SwapState),
    Completed,
}

enum FailOutcome {
    AlreadyTerminal(SwapState),
    AlreadyExpiring,
    Failed {
        // (leg, chain) pairs still holding a lock when the swap failed
        locked: Vec<(SwapLeg, String)>,
        rolled_back: bool,
    },
}

enum UnlockOutcome {
    Duplicate(SwapState),
    Partial,
    RolledBack,
}

/// The swap state machine. Reactive: every transition is triggered by an
/// inbound adapter callback or a supervisor expiry; the only thing a
/// callback ever waits on is the registry's per-swap critical section.
pub struct SwapCoordinator {
    config: CoordinatorConfig,
    registry: Arc<SwapRegistry>,
    resolver: IdentityResolver,
    router: AdapterRouter,
    supervisor: TimeoutSupervisor,
}

impl SwapCoordinator {
    /// Builds the coordinator and spawns its expiry-listener task.
    /// Must be called from within a tokio runtime.
    pub fn new(config: CoordinatorConfig, resolver: IdentityResolver) -> Arc<Self> {
        let (supervisor, expiry_rx) = TimeoutSupervisor::new(config.expiry_channel_capacity);
        let router = AdapterRouter::new(config.adapter_channel_capacity);
        let coordinator = Arc::new(SwapCoordinator {
            config,
            registry: Arc::new(SwapRegistry::new()),
            resolver,
            router,
            supervisor,
        });
        coordinator.spawn_expiry_listener(expiry_rx);
        coordinator
    }

    fn spawn_expiry_listener(self: &Arc<Self>, mut expiry_rx: mpsc::Receiver<SwapId>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(swap_id) = expiry_rx.recv().await {
                if let Err(e) = this.expire(&swap_id) {
                    warn!("[Coordinator] Expiry handling failed for swap {}: {}", swap_id, e);
                }
            }
        });
    }

    pub fn registry(&self) -> &SwapRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Registers a chain adapter's event stream.
    pub fn subscribe(&self, chain: &str) -> mpsc::Receiver<AdapterEvent> {
        self.router.subscribe(chain)
    }

    pub fn get_swap(&self, swap_id: &str) -> Option<SwapRecord> {
        self.registry.get(swap_id)
    }

    /// Maps a chain name reported by an adapter to the leg it serves.
    pub fn leg_for_chain(&self, swap_id: &str, chain: &str) -> Result<SwapLeg, SwapError> {
        let record = self
            .registry
            .get(swap_id)
            .ok_or_else(|| RegistryError::NotFound(swap_id.to_string()))?;
        record
            .leg_for_chain(chain)
            .ok_or_else(|| SwapError::UnknownChain {
                swap_id: swap_id.to_string(),
                chain: chain.to_string(),
            })
    }

    /// Creates a swap: resolves both identities (failing fast with nothing
    /// persisted), stores the record, arms the timeout and notifies each
    /// leg's chain adapter.
    pub fn initiate(&self, request: InitiateRequest) -> Result<SwapId, SwapError> {
        Self::validate_request(&request)?;

        let swap_id = match &request.idempotency_key {
            Some(key) => swap_id_from_idempotency_key(key),
            None => new_swap_id(),
        };
        if request.idempotency_key.is_some() {
            if let Some(existing) = self.registry.get(&swap_id) {
                Self::verify_retry_payload(&existing, &request)?;
                info!(
                    "[Coordinator] Initiation retry for swap {} (state {}), returning existing id",
                    swap_id, existing.state
                );
                return Ok(swap_id);
            }
        }

        // Resolve both parties before creating any state. The results are
        // frozen on the record; later identity changes do not touch them.
        let initiator_address = self
            .resolver
            .resolve(&request.initiator, &request.initiator_asset.chain)?;
        let responder_address = self
            .resolver
            .resolve(&request.responder, &request.responder_asset.chain)?;

        let timeout = request
            .timeout
            .unwrap_or(self.config.default_swap_timeout)
            .min(self.config.max_swap_timeout);
        let created_at = Utc::now();
        let expires_at = created_at
            + chrono::Duration::from_std(timeout)
                .map_err(|e| SwapError::Validation(format!("timeout out of range: {}", e)))?;

        let record = SwapRecord {
            swap_id: swap_id.clone(),
            initiator: request.initiator.clone(),
            responder: request.responder.clone(),
            initiator_leg: LegRecord::new(
                request.initiator.clone(),
                request.initiator_asset.clone(),
                initiator_address.clone(),
            ),
            responder_leg: LegRecord::new(
                request.responder.clone(),
                request.responder_asset.clone(),
                responder_address.clone(),
            ),
            state: SwapState::Initiated,
            failure_reason: None,
            created_at,
            expires_at,
        };

        match self.registry.create(record) {
            Ok(()) => {}
            // Lost a race against a concurrent retry with the same key.
            Err(RegistryError::AlreadyExists(_)) if request.idempotency_key.is_some() => {
                if let Some(existing) = self.registry.get(&swap_id) {
                    Self::verify_retry_payload(&existing, &request)?;
                }
                return Ok(swap_id);
            }
            Err(e) => return Err(e.into()),
        }

        self.supervisor.arm(&swap_id, expires_at);
        info!(
            "[Coordinator] Initiated swap {} ({} <-> {}), expires at {}",
            swap_id, request.initiator, request.responder, expires_at
        );

        let initiator_chain = request.initiator_asset.chain.clone();
        let responder_chain = request.responder_asset.chain.clone();
        self.router.route(
            &initiator_chain,
            AdapterEvent::SwapInitiated {
                swap_id: swap_id.clone(),
                leg: SwapLeg::Initiator,
                resolved_address: initiator_address,
                asset: request.initiator_asset,
                expires_at,
            },
        );
        self.router.route(
            &responder_chain,
            AdapterEvent::SwapInitiated {
                swap_id: swap_id.clone(),
                leg: SwapLeg::Responder,
                resolved_address: responder_address,
                asset: request.responder_asset,
                expires_at,
            },
        );

        Ok(swap_id)
    }

    /// A retried initiation must carry the same parties and assets as the
    /// swap its key maps to; otherwise two distinct requests would silently
    /// alias onto one record.
    fn verify_retry_payload(
        existing: &SwapRecord,
        request: &InitiateRequest,
    ) -> Result<(), SwapError> {
        if existing.initiator != request.initiator
            || existing.responder != request.responder
            || existing.initiator_leg.asset != request.initiator_asset
            || existing.responder_leg.asset != request.responder_asset
        {
            return Err(SwapError::IdempotencyMismatch {
                swap_id: existing.swap_id.clone(),
            });
        }
        Ok(())
    }

    fn validate_request(request: &InitiateRequest) -> Result<(), SwapError> {
        if request.initiator.trim().is_empty() || request.responder.trim().is_empty() {
            return Err(SwapError::Validation(
                "initiator and responder identifiers must be non-empty".to_string(),
            ));
        }
        if request.initiator_asset.amount == 0 || request.responder_asset.amount == 0 {
            return Err(SwapError::Validation(
                "asset amounts must be greater than zero".to_string(),
            ));
        }
        if request.initiator_asset.chain == request.responder_asset.chain {
            return Err(SwapError::Validation(
                "both legs name the same chain; atomic swaps span two ledgers".to_string(),
            ));
        }
        if let Some(timeout) = request.timeout {
            if timeout.is_zero() {
                return Err(SwapError::Validation(
                    "timeout must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Adapter callback: a leg's lock is confirmed on its chain.
    ///
    /// Idempotent for duplicate deliveries (same leg, same tx ref); a
    /// conflicting ref for an already-locked leg is rejected. Locking the
    /// second leg traverses BothLocked and lands on Completed inside the
    /// same critical section, so a racing timer can never observe the
    /// intermediate state.
    pub fn report_lock(
        &self,
        swap_id: &str,
        leg: SwapLeg,
        tx_ref: ChainTxRef,
    ) -> Result<SwapState, SwapError> {
        let outcome = self.registry.update(swap_id, |record| {
            if let Some(existing) = &record.leg(leg).lock_proof {
                if *existing == tx_ref {
                    return Ok(LockOutcome::Duplicate(record.state));
                }
                return Err(SwapError::ConflictingLockProof {
                    swap_id: record.swap_id.clone(),
                    leg,
                });
            }
            match record.state {
                SwapState::Initiated | SwapState::InitiatorLocked | SwapState::ResponderLocked => {}
                state => {
                    return Err(SwapError::NotAcceptingLocks {
                        swap_id: record.swap_id.clone(),
                        state,
                    })
                }
            }
            if record.is_expired_at(Utc::now()) {
                // The timer will (or already did) drive the rollback path.
                return Err(SwapError::SwapExpired {
                    swap_id: record.swap_id.clone(),
                });
            }

            record.leg_mut(leg).lock_proof = Some(tx_ref);
            if record.leg(leg.other()).is_locked() {
                record.set_state(SwapState::BothLocked)?;
                record.set_state(SwapState::Completed)?;
                Ok(LockOutcome::Completed)
            } else {
                let next = match leg {
                    SwapLeg::Initiator => SwapState::InitiatorLocked,
                    SwapLeg::Responder => SwapState::ResponderLocked,
                };
                record.set_state(next)?;
                Ok(LockOutcome::Locked(next))
            }
        })?;

        match outcome {
            LockOutcome::Duplicate(state) => Ok(state),
            LockOutcome::Locked(state) => {
                info!("[Coordinator] Swap {} {} leg locked ({})", swap_id, leg, state);
                Ok(state)
            }
            LockOutcome::Completed => {
                self.supervisor.cancel(swap_id);
                info!("[Coordinator] Swap {} completed: both legs locked", swap_id);
                self.emit_to_both_chains(swap_id, AdapterEvent::SwapCompleted {
                    swap_id: swap_id.to_string(),
                });
                Ok(SwapState::Completed)
            }
        }
    }

    /// Adapter callback: a leg's lock attempt failed. Triggers the
    /// rollback path immediately instead of waiting for the timeout.
    pub fn report_lock_failure(
        &self,
        swap_id: &str,
        leg: SwapLeg,
        reason: &str,
    ) -> Result<SwapState, SwapError> {
        self.fail_swap(swap_id, format!("lock failed on {} leg: {}", leg, reason))
    }

    /// Supervisor-driven expiry. A silent no-op when the swap already
    /// reached a terminal state, so whichever of completion and expiry
    /// loses the race does nothing.
    pub fn expire(&self, swap_id: &str) -> Result<SwapState, SwapError> {
        self.fail_swap(
            swap_id,
            "timed out waiting for lock confirmations".to_string(),
        )
    }

    /// Operator abort: equivalent to forcing the expiry path.
    pub fn abort(&self, swap_id: &str, reason: &str) -> Result<SwapState, SwapError> {
        self.fail_swap(swap_id, format!("operator abort: {}", reason))
    }

    fn fail_swap(&self, swap_id: &str, reason: String) -> Result<SwapState, SwapError> {
        let outcome = self.registry.update(swap_id, |record| -> Result<FailOutcome, SwapError> {
            if record.state.is_terminal() {
                return Ok(FailOutcome::AlreadyTerminal(record.state));
            }
            if record.state == SwapState::Expired {
                return Ok(FailOutcome::AlreadyExpiring);
            }
            record.failure_reason = Some(reason.clone());
            record.set_state(SwapState::Expired)?;
            let locked: Vec<(SwapLeg, String)> = record
                .locked_legs()
                .into_iter()
                .map(|l| (l, record.leg(l).asset.chain.clone()))
                .collect();
            if locked.is_empty() {
                // Nothing was locked, so there is nothing to compensate.
                record.set_state(SwapState::RolledBack)?;
                return Ok(FailOutcome::Failed {
                    locked,
                    rolled_back: true,
                });
            }
            Ok(FailOutcome::Failed {
                locked,
                rolled_back: false,
            })
        })?;

        match outcome {
            FailOutcome::AlreadyTerminal(state) => Ok(state),
            FailOutcome::AlreadyExpiring => Ok(SwapState::Expired),
            FailOutcome::Failed {
                locked,
                rolled_back,
            } => {
                self.supervisor.cancel(swap_id);
                if rolled_back {
                    info!(
                        "[Coordinator] Swap {} expired with no locked legs, rolled back",
                        swap_id
                    );
                    return Ok(SwapState::RolledBack);
                }
                let legs_to_unlock: Vec<SwapLeg> = locked.iter().map(|(l, _)| *l).collect();
                info!(
                    "[Coordinator] Swap {} expired, requesting unlock of {:?}",
                    swap_id, legs_to_unlock
                );
                for (_, chain) in &locked {
                    self.router.route(
                        chain,
                        AdapterEvent::SwapRollbackRequested {
                            swap_id: swap_id.to_string(),
                            legs_to_unlock: legs_to_unlock.clone(),
                        },
                    );
                }
                Ok(SwapState::Expired)
            }
        }
    }

    /// Adapter callback: a previously-locked leg was unlocked. When every
    /// locked leg has its rollback proof the swap becomes RolledBack.
    pub fn report_unlock(
        &self,
        swap_id: &str,
        leg: SwapLeg,
        tx_ref: ChainTxRef,
    ) -> Result<SwapState, SwapError> {
        let outcome = self.registry.update(swap_id, |record| {
            if let Some(existing) = &record.leg(leg).rollback_proof {
                if *existing == tx_ref {
                    return Ok(UnlockOutcome::Duplicate(record.state));
                }
                return Err(SwapError::ConflictingRollbackProof {
                    swap_id: record.swap_id.clone(),
                    leg,
                });
            }
            if record.state != SwapState::Expired {
                return Err(SwapError::RollbackNotInProgress {
                    swap_id: record.swap_id.clone(),
                    state: record.state,
                });
            }
            if !record.leg(leg).is_locked() {
                return Err(SwapError::LegNotLocked {
                    swap_id: record.swap_id.clone(),
                    leg,
                });
            }
            record.leg_mut(leg).rollback_proof = Some(tx_ref);
            let all_unlocked = record
                .locked_legs()
                .iter()
                .all(|l| record.leg(*l).rollback_proof.is_some());
            if all_unlocked {
                record.set_state(SwapState::RolledBack)?;
                Ok(UnlockOutcome::RolledBack)
            } else {
                Ok(UnlockOutcome::Partial)
            }
        })?;

        match outcome {
            UnlockOutcome::Duplicate(state) => Ok(state),
            UnlockOutcome::Partial => Ok(SwapState::Expired),
            UnlockOutcome::RolledBack => {
                info!("[Coordinator] Swap {} fully rolled back", swap_id);
                Ok(SwapState::RolledBack)
            }
        }
    }

    /// Adapter callback: an unlock attempt failed. The swap is parked in
    /// RollbackFailed for operator resolution; the coordinator never
    /// retries unlocks on its own, since a blind retry is unsafe without
    /// ledger-side idempotency guarantees.
    pub fn report_unlock_failure(
        &self,
        swap_id: &str,
        leg: SwapLeg,
        reason: &str,
    ) -> Result<SwapState, SwapError> {
        let state = self.registry.update(swap_id, |record| {
            if record.state == SwapState::RollbackFailed {
                return Ok(SwapState::RollbackFailed);
            }
            if record.state != SwapState::Expired {
                return Err(SwapError::RollbackNotInProgress {
                    swap_id: record.swap_id.clone(),
                    state: record.state,
                });
            }
            record.failure_reason = Some(format!("unlock failed on {} leg: {}", leg, reason));
            record.set_state(SwapState::RollbackFailed)?;
            Ok(SwapState::RollbackFailed)
        })?;
        warn!(
            "[Coordinator] Swap {} marked ROLLBACK_FAILED ({} leg): operator intervention required",
            swap_id, leg
        );
        Ok(state)
    }

    fn emit_to_both_chains(&self, swap_id: &str, event: AdapterEvent) {
        if let Some(record) = self.registry.get(swap_id) {
            self.router
                .route(&record.initiator_leg.asset.chain, event.clone());
            self.router.route(&record.responder_leg.asset.chain, event);
        }
    }
}
