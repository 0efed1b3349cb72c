//! Kiket extension SDK
//!
//! Receives signed webhooks from the Kiket platform, verifies them, and
//! dispatches each one to the handler registered for its event and version.
//! Configuration is layered from explicit options, the extension manifest,
//! and the environment.
//!
//! ```no_run
//! use kiket_sdk::{HandlerContext, KiketSdk, SdkOptions};
//! use serde_json::{json, Value};
//!
//! # async fn run() -> std::io::Result<()> {
//! let sdk = KiketSdk::new(SdkOptions::default());
//! sdk.register("issue.created", "v1", |payload: Value, ctx: HandlerContext| async move {
//!     Ok(json!({ "ok": true, "issue": payload["id"], "event": ctx.event() }))
//! });
//! sdk.run(([0, 0, 0, 0], 8080).into()).await
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod sdk;
pub mod server;
pub mod telemetry;

pub use auth::{verify_signature, AuthError, VerificationOutcome};
pub use client::{ClientError, ExtensionEndpoints, KiketClient, SecretManager};
pub use config::manifest::Manifest;
pub use config::{resolve_config, ResolvedConfig, SdkOptions, Settings};
pub use handlers::{
    DispatchError, HandlerContext, HandlerError, HandlerRegistry, HandlerResult, WebhookHandler,
};
pub use sdk::KiketSdk;
pub use telemetry::{TelemetryRecord, TelemetryReporter, TelemetryStatus};
