// Identity layer: portable identifier -> chain-native address.

pub mod resolver;
pub mod store;

pub use resolver::{IdentityResolver, ResolveError};
pub use store::IdentityStore;
