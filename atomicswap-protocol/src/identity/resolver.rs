use crate::identity::store::IdentityStore;
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no address for identifier '{identifier}' on chain '{chain}'")]
    NotFound { identifier: String, chain: String },
}

/// Pure lookup from portable identifier to chain-native address.
/// Deterministic and side-effect-free; the coordinator queries it once
/// per (identifier, chain) per swap and freezes the result on the record.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<IdentityStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<IdentityStore>) -> Self {
        IdentityResolver { store }
    }

    pub fn resolve(&self, identifier: &str, chain: &str) -> Result<String, ResolveError> {
        self.store
            .lookup(identifier, chain)
            .ok_or_else(|| ResolveError::NotFound {
                identifier: identifier.to_string(),
                chain: chain.to_string(),
            })
    }
}
