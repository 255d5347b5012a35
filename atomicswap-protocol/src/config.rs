use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    // Swap lifecycle
    /// Timeout applied when an initiation request does not carry one.
    #[serde(with = "humantime_serde")]
    pub default_swap_timeout: Duration,
    /// Upper bound on client-supplied timeouts; longer requests are clamped.
    #[serde(with = "humantime_serde")]
    pub max_swap_timeout: Duration,

    // Channel capacities
    pub adapter_channel_capacity: usize,
    pub expiry_channel_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            default_swap_timeout: Duration::from_secs(60),
            max_swap_timeout: Duration::from_secs(3600),
            adapter_channel_capacity: 64,
            expiry_channel_capacity: 64,
        }
    }
}
