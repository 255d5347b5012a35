use crate::data_structures::SwapId;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Per-swap timeout timers.
///
/// One timer task is armed per swap at initiation and cancelled when the
/// swap completes (or fails early). When a timer fires it pushes the swap
/// id onto the expiry channel; the coordinator drains that channel and
/// drives the expiry transition. Delivering expirations over a channel
/// instead of calling into the coordinator keeps timer tasks free of any
/// registry locking.
pub struct TimeoutSupervisor {
    expiry_tx: mpsc::Sender<SwapId>,
    timers: Arc<Mutex<HashMap<SwapId, oneshot::Sender<()>>>>,
}

impl TimeoutSupervisor {
    /// Returns the supervisor and the receiving end of the expiry channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SwapId>) {
        let (expiry_tx, expiry_rx) = mpsc::channel(capacity);
        let supervisor = TimeoutSupervisor {
            expiry_tx,
            timers: Arc::new(Mutex::new(HashMap::new())),
        };
        (supervisor, expiry_rx)
    }

    /// Arms a timer that fires at `expires_at`. Re-arming a swap replaces
    /// (and thereby cancels) the previous timer.
    pub fn arm(&self, swap_id: &str, expires_at: DateTime<Utc>) {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        {
            let mut timers = self.timers.lock().unwrap();
            timers.insert(swap_id.to_string(), cancel_tx);
        }

        let expiry_tx = self.expiry_tx.clone();
        let timers = Arc::clone(&self.timers);
        let id = swap_id.to_string();
        tokio::spawn(async move {
            // An already-past deadline fires immediately.
            let remaining = (expires_at - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {
                    timers.lock().unwrap().remove(&id);
                    debug!("[Supervisor] Timer fired for swap {}", id);
                    if expiry_tx.send(id.clone()).await.is_err() {
                        warn!("[Supervisor] Expiry channel closed, dropping expiry for swap {}", id);
                    }
                }
                _ = cancel_rx => {
                    debug!("[Supervisor] Timer cancelled for swap {}", id);
                }
            }
        });
    }

    /// Cancels the timer for a swap. No-op if the timer already fired or
    /// was never armed.
    pub fn cancel(&self, swap_id: &str) {
        let cancel_tx = {
            let mut timers = self.timers.lock().unwrap();
            timers.remove(swap_id)
        };
        if let Some(tx) = cancel_tx {
            let _ = tx.send(());
        }
    }
}
