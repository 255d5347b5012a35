use crate::data_structures::{AssetSpec, SwapId, SwapLeg};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Instructions the coordinator emits to chain adapters. A closed set of
/// tagged variants so adapter loops can match exhaustively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterEvent {
    /// A swap was created; the receiving adapter should lock this leg's
    /// asset at the resolved address and report back before `expires_at`.
    SwapInitiated {
        swap_id: SwapId,
        leg: SwapLeg,
        resolved_address: String,
        asset: AssetSpec,
        expires_at: DateTime<Utc>,
    },
    /// The swap cannot complete; adapters holding one of `legs_to_unlock`
    /// must reverse their lock and report the unlock.
    SwapRollbackRequested {
        swap_id: SwapId,
        legs_to_unlock: Vec<SwapLeg>,
    },
    /// Both legs locked; the swap is final on both ledgers.
    SwapCompleted { swap_id: SwapId },
}

/// Routes coordinator events onto per-chain channels.
///
/// Adapters subscribe by chain name and receive only the events for legs
/// on their chain. Sends never block the coordinator: a full or closed
/// channel logs a warning and drops the event (the adapter can recover
/// state through the control-plane query endpoints).
pub struct AdapterRouter {
    capacity: usize,
    channels: Mutex<HashMap<String, mpsc::Sender<AdapterEvent>>>,
}

impl AdapterRouter {
    pub fn new(capacity: usize) -> Self {
        AdapterRouter {
            capacity,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an adapter for `chain`, returning its event stream.
    /// Re-subscribing replaces the previous channel.
    pub fn subscribe(&self, chain: &str) -> mpsc::Receiver<AdapterEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut channels = self.channels.lock().unwrap();
        channels.insert(chain.to_string(), tx);
        debug!("[Router] Adapter subscribed for chain {}", chain);
        rx
    }

    /// Delivers an event to the adapter serving `chain`.
    pub fn route(&self, chain: &str, event: AdapterEvent) {
        let sender = {
            let channels = self.channels.lock().unwrap();
            channels.get(chain).cloned()
        };
        match sender {
            Some(tx) => {
                if let Err(e) = tx.try_send(event) {
                    warn!(
                        "[Router] Failed to deliver event to chain {}: {}. Dropping.",
                        chain, e
                    );
                }
            }
            None => {
                warn!(
                    "[Router] No adapter subscribed for chain {}. Dropping event.",
                    chain
                );
            }
        }
    }
}
