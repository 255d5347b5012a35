// HTTP control plane: the surface chain adapters and operators use to
// submit callbacks and query swap/identity state.

pub mod error;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use routes::router;
pub use state::AppState;
