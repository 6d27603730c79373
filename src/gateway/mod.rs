//! Gateway server implementation

pub mod cors;
mod router;
mod server;
pub mod students;

pub use cors::{CorsPolicy, origin_guard};
pub use router::{AppState, create_router};
pub use server::Gateway;
