use crate::data_structures::PortableId;
use log::debug;
use std::collections::HashMap;
use std::sync::RwLock;

/// Injected identity mapping store, populated at startup (configuration)
/// and extendable at runtime through registration. Changes never affect
/// in-flight swaps: the coordinator freezes resolved addresses on the
/// swap record at initiation.
#[derive(Debug, Default)]
pub struct IdentityStore {
    // identifier -> (chain -> address)
    mappings: RwLock<HashMap<PortableId, HashMap<String, String>>>,
}

impl IdentityStore {
    pub fn new() -> Self {
        IdentityStore {
            mappings: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a store from `(identifier, chain, address)` entries.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String, String)>,
    {
        let store = IdentityStore::new();
        for (identifier, chain, address) in entries {
            store.register(&identifier, &chain, &address);
        }
        store
    }

    /// Registers (or replaces) the address for `identifier` on `chain`.
    pub fn register(&self, identifier: &str, chain: &str, address: &str) {
        let mut mappings = self.mappings.write().unwrap();
        mappings
            .entry(identifier.to_string())
            .or_default()
            .insert(chain.to_string(), address.to_string());
        debug!(
            "[IdentityStore] Registered {} on chain {} -> {}",
            identifier, chain, address
        );
    }

    pub fn lookup(&self, identifier: &str, chain: &str) -> Option<String> {
        let mappings = self.mappings.read().unwrap();
        mappings
            .get(identifier)
            .and_then(|chains| chains.get(chain))
            .cloned()
    }

    /// All chain mappings known for an identifier.
    pub fn chains_for(&self, identifier: &str) -> Option<HashMap<String, String>> {
        let mappings = self.mappings.read().unwrap();
        mappings.get(identifier).cloned()
    }
}
