//! HTTP API for the console

pub mod handlers;
pub mod routes;

pub use handlers::{ConsoleState, ServerState};
pub use routes::create_router;
