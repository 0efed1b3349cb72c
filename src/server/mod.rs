//! Server module
//!
//! Inbound HTTP surface: signature gate, webhook dispatch, health.

pub mod http;
pub mod startup;

// Re-export key types
pub use http::{create_router, AppState, MAX_BODY_BYTES};
pub use startup::{run_server_with_config, serve, ServerConfig, ServerHandle};
