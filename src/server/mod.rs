//! HTTP surface of the login bridge

mod handlers;
mod router;
mod server;

pub use router::{AppState, create_router};
pub use server::Bridge;
