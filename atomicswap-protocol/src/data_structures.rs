use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// Unique swap identifier: 32 bytes, hex-encoded.
pub type SwapId = String;

// Chain-agnostic participant identifier, e.g. "alice@ledgers.example".
pub type PortableId = String;

// Chain-native transaction reference reported by an adapter.
pub type ChainTxRef = String;

/// Generates a fresh random swap id.
pub fn new_swap_id() -> SwapId {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derives a deterministic swap id from a client idempotency key, so a
/// retried initiation maps onto the same swap record.
pub fn swap_id_from_idempotency_key(key: &str) -> SwapId {
    let mut hasher = Sha256::new();
    hasher.update(b"atomic-swap-id");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

// One asset position on one chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSpec {
    pub chain: String,
    pub amount: u64,
    /// Chain-specific asset reference (token symbol, contract address, ...).
    pub asset_ref: String,
}

// Which side of the swap a leg belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapLeg {
    Initiator,
    Responder,
}

impl SwapLeg {
    pub fn other(&self) -> SwapLeg {
        match self {
            SwapLeg::Initiator => SwapLeg::Responder,
            SwapLeg::Responder => SwapLeg::Initiator,
        }
    }
}

impl std::fmt::Display for SwapLeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapLeg::Initiator => write!(f, "initiator"),
            SwapLeg::Responder => write!(f, "responder"),
        }
    }
}

/// Swap lifecycle states. Transitions are monotonic along
/// `Initiated -> {InitiatorLocked, ResponderLocked} -> BothLocked -> Completed`,
/// with `Expired -> {RolledBack, RollbackFailed}` reachable from any
/// non-terminal state before `BothLocked`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapState {
    Initiated,
    InitiatorLocked,
    ResponderLocked,
    BothLocked,
    Completed,
    Expired,
    RolledBack,
    RollbackFailed,
}

impl SwapState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapState::Completed | SwapState::RolledBack | SwapState::RollbackFailed
        )
    }

    /// Whether the monotonic lattice permits `self -> to`.
    pub fn allows_transition_to(&self, to: SwapState) -> bool {
        use SwapState::*;
        match (self, to) {
            (Initiated, InitiatorLocked)
            | (Initiated, ResponderLocked)
            | (InitiatorLocked, BothLocked)
            | (ResponderLocked, BothLocked)
            | (BothLocked, Completed) => true,
            // Expiry is reachable from every pre-commit state.
            (Initiated, Expired)
            | (InitiatorLocked, Expired)
            | (ResponderLocked, Expired) => true,
            (Expired, RolledBack) | (Expired, RollbackFailed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SwapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SwapState::Initiated => "INITIATED",
            SwapState::InitiatorLocked => "INITIATOR_LOCKED",
            SwapState::ResponderLocked => "RESPONDER_LOCKED",
            SwapState::BothLocked => "BOTH_LOCKED",
            SwapState::Completed => "COMPLETED",
            SwapState::Expired => "EXPIRED",
            SwapState::RolledBack => "ROLLED_BACK",
            SwapState::RollbackFailed => "ROLLBACK_FAILED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid swap state transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SwapState,
    pub to: SwapState,
}

// Per-leg bookkeeping. The resolved address is frozen at initiation and
// never re-resolved, so identity remapping cannot affect in-flight swaps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegRecord {
    pub owner: PortableId,
    pub asset: AssetSpec,
    pub resolved_address: String,
    pub lock_proof: Option<ChainTxRef>,
    pub rollback_proof: Option<ChainTxRef>,
}

impl LegRecord {
    pub fn new(owner: PortableId, asset: AssetSpec, resolved_address: String) -> Self {
        LegRecord {
            owner,
            asset,
            resolved_address,
            lock_proof: None,
            rollback_proof: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock_proof.is_some()
    }
}

// The central swap entity. Mutated only through the registry's per-swap
// critical section; retained after reaching a terminal state for audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRecord {
    pub swap_id: SwapId,
    pub initiator: PortableId,
    pub responder: PortableId,
    pub initiator_leg: LegRecord,
    pub responder_leg: LegRecord,
    pub state: SwapState,
    /// Populated on the failure paths (lock failure, timeout, unlock failure).
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SwapRecord {
    pub fn leg(&self, leg: SwapLeg) -> &LegRecord {
        match leg {
            SwapLeg::Initiator => &self.initiator_leg,
            SwapLeg::Responder => &self.responder_leg,
        }
    }

    pub fn leg_mut(&mut self, leg: SwapLeg) -> &mut LegRecord {
        match leg {
            SwapLeg::Initiator => &mut self.initiator_leg,
            SwapLeg::Responder => &mut self.responder_leg,
        }
    }

    /// Maps an adapter-reported chain name back to the leg it serves.
    pub fn leg_for_chain(&self, chain: &str) -> Option<SwapLeg> {
        if self.initiator_leg.asset.chain == chain {
            Some(SwapLeg::Initiator)
        } else if self.responder_leg.asset.chain == chain {
            Some(SwapLeg::Responder)
        } else {
            None
        }
    }

    /// Legs currently holding a confirmed lock.
    pub fn locked_legs(&self) -> Vec<SwapLeg> {
        let mut legs = Vec::new();
        if self.initiator_leg.is_locked() {
            legs.push(SwapLeg::Initiator);
        }
        if self.responder_leg.is_locked() {
            legs.push(SwapLeg::Responder);
        }
        legs
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Applies a state transition, rejecting anything outside the lattice.
    /// All registry mutations go through this, so a record can never hold
    /// an out-of-order state.
    pub fn set_state(&mut self, to: SwapState) -> Result<(), InvalidTransition> {
        if !self.state.allows_transition_to(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}
