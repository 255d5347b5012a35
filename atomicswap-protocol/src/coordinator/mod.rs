// Swap coordination: the state machine and its outbound event plumbing.

pub mod events;
pub mod swap_coordinator;

pub use events::{AdapterEvent, AdapterRouter};
pub use swap_coordinator::{InitiateRequest, SwapCoordinator, SwapError};
