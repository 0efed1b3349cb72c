//! Extension entry point
//!
//! [`KiketSdk`] ties the pieces together: it loads the manifest, resolves the
//! effective configuration once, owns the handler registry and telemetry
//! reporter, and serves the webhook router.

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::manifest::{load_manifest_from_cwd, Manifest};
use crate::config::{resolve_config, EnvSource, ProcessEnv, ResolvedConfig, SdkOptions};
use crate::handlers::{HandlerRegistry, WebhookHandler};
use crate::server::{self, AppState};
use crate::telemetry::TelemetryReporter;

pub struct KiketSdk {
    config: Arc<ResolvedConfig>,
    manifest: Option<Manifest>,
    registry: Arc<HandlerRegistry>,
    telemetry: Arc<TelemetryReporter>,
}

impl KiketSdk {
    /// Build from explicit options, the manifest in the working directory
    /// (or `options.manifest_path`), and the process environment.
    pub fn new(options: SdkOptions) -> Self {
        let manifest = load_manifest_from_cwd(options.manifest_path.as_deref());
        Self::from_parts(options, manifest, &ProcessEnv)
    }

    /// Build from already-loaded inputs.
    pub fn from_parts(options: SdkOptions, manifest: Option<Manifest>, env: &dyn EnvSource) -> Self {
        let config = resolve_config(&options, manifest.as_ref(), env);
        let telemetry = TelemetryReporter::new(
            config.telemetry_enabled,
            Some(config.telemetry_url.as_str()),
            options.feedback_hook.clone(),
            config.extension_id.clone(),
            config.extension_version.clone(),
            config.extension_api_key.clone(),
        );

        Self {
            config: Arc::new(config),
            manifest,
            registry: Arc::new(HandlerRegistry::new()),
            telemetry: Arc::new(telemetry),
        }
    }

    /// Register a handler for `(event, version)`. Re-registering replaces.
    pub fn register<H>(
        &self,
        event: impl Into<String>,
        version: impl Into<String>,
        handler: H,
    ) -> &Self
    where
        H: WebhookHandler + 'static,
    {
        self.registry.register(event, version, handler);
        self
    }

    pub fn event_names(&self) -> Vec<String> {
        self.registry.event_names()
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn telemetry(&self) -> &Arc<TelemetryReporter> {
        &self.telemetry
    }

    /// Shared server state; handlers registered later are still visible.
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.config.clone(),
            self.registry.clone(),
            self.telemetry.clone(),
        )
    }

    pub fn router(&self) -> Router {
        server::create_router(self.app_state())
    }

    /// Serve webhooks on `addr` until Ctrl-C / SIGTERM.
    pub async fn run(&self, addr: SocketAddr) -> Result<(), std::io::Error> {
        info!(
            target: "sdk",
            extension_id = ?self.config.extension_id,
            extension_version = ?self.config.extension_version,
            events = ?self.event_names(),
            "starting extension server"
        );
        if self.config.webhook_secret.is_none() {
            warn!(target: "sdk", "no webhook secret configured; all webhook requests will fail");
        }
        server::serve(self.app_state(), addr).await
    }
}
