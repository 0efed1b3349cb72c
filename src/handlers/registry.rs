//! Handler registry
//!
//! Maps `(event, version)` to a handler and dispatches payloads to it.
//! Registration normally happens before serving, but the map is guarded by a
//! read/write lock so late registrations are safe too.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::context::HandlerContext;

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a handler produces: a JSON response body or an error.
pub type HandlerResult = Result<Value, HandlerError>;

/// A webhook handler: one operation taking the payload and request context.
///
/// Implemented for any `Fn(Value, HandlerContext) -> impl Future<Output = HandlerResult>`,
/// so async closures register directly.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(&self, payload: Value, ctx: HandlerContext) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> WebhookHandler for F
where
    F: Fn(Value, HandlerContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, payload: Value, ctx: HandlerContext) -> HandlerResult {
        (self)(payload, ctx).await
    }
}

/// Dispatch errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No handler registered for event '{event}' version '{version}'")]
    HandlerNotFound { event: String, version: String },

    #[error("Handler for event '{event}' version '{version}' failed: {source}")]
    HandlerThrew {
        event: String,
        version: String,
        #[source]
        source: HandlerError,
    },
}

/// A registered handler together with the key it was registered under.
pub struct HandlerRegistration {
    pub event: String,
    pub version: String,
    handler: Arc<dyn WebhookHandler>,
}

impl std::fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("event", &self.event)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl HandlerRegistration {
    pub fn handler(&self) -> &Arc<dyn WebhookHandler> {
        &self.handler
    }
}

/// Registry of webhook handlers keyed by `(event, version)`.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<(String, String), Arc<HandlerRegistration>>>,
}

impl HandlerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same key.
    pub fn register<H>(&self, event: impl Into<String>, version: impl Into<String>, handler: H)
    where
        H: WebhookHandler + 'static,
    {
        self.register_arc(event, version, Arc::new(handler));
    }

    /// Register an already shared handler.
    pub fn register_arc(
        &self,
        event: impl Into<String>,
        version: impl Into<String>,
        handler: Arc<dyn WebhookHandler>,
    ) {
        let event = event.into();
        let version = version.into();
        let registration = Arc::new(HandlerRegistration {
            event: event.clone(),
            version: version.clone(),
            handler,
        });
        let previous = self
            .handlers
            .write()
            .insert((event.clone(), version.clone()), registration);
        if previous.is_some() {
            debug!(target: "dispatch", %event, %version, "replaced existing handler");
        }
    }

    /// Look up the handler for an exact `(event, version)`.
    pub fn get(&self, event: &str, version: &str) -> Option<Arc<HandlerRegistration>> {
        self.handlers
            .read()
            .get(&(event.to_string(), version.to_string()))
            .cloned()
    }

    /// Distinct event names across all versions, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .handlers
            .read()
            .keys()
            .map(|(event, _)| event.clone())
            .collect();
        names.into_iter().collect()
    }

    /// Every registration, in no particular order.
    pub fn all(&self) -> Vec<Arc<HandlerRegistration>> {
        self.handlers.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Route a payload to its handler.
    ///
    /// The registry lock is released before the handler runs. Handler errors
    /// are returned wrapped, never swallowed.
    pub async fn dispatch(
        &self,
        event: &str,
        version: &str,
        payload: Value,
        ctx: HandlerContext,
    ) -> Result<Value, DispatchError> {
        let registration =
            self.get(event, version)
                .ok_or_else(|| DispatchError::HandlerNotFound {
                    event: event.to_string(),
                    version: version.to_string(),
                })?;

        registration
            .handler
            .handle(payload, ctx)
            .await
            .map_err(|source| DispatchError::HandlerThrew {
                event: event.to_string(),
                version: version.to_string(),
                source,
            })
    }
}

/// Create a shared handler registry
pub fn create_registry() -> Arc<HandlerRegistry> {
    Arc::new(HandlerRegistry::new())
}
