//! Webhook handler routing
//!
//! Handlers are registered per `(event, version)` and receive the parsed
//! payload plus a [`HandlerContext`] built for the request.

pub mod context;
pub mod registry;

pub use context::HandlerContext;
pub use registry::{
    create_registry, DispatchError, HandlerError, HandlerRegistration, HandlerRegistry,
    HandlerResult, WebhookHandler,
};
