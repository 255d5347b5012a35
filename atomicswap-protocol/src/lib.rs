// Coordination engine for atomic asset swaps across independent ledgers.
//
// Participants are addressed by portable identifiers which the identity
// layer resolves to chain-native addresses. The coordinator drives each
// swap through a monotonic state machine; per-chain adapters perform the
// actual lock/unlock operations and report outcomes back through the
// control-plane API (or directly, when run in-process).

pub mod adapter;
pub mod api;
pub mod config;
pub mod coordinator;
pub mod data_structures;
pub mod identity;
pub mod registry;
pub mod supervisor;

pub mod test_utils; // Shared fixtures and the mock chain adapter
