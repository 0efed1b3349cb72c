//! Handler telemetry
//!
//! Each dispatch produces one [`TelemetryRecord`]. Records go to an optional
//! in-process feedback hook and, when an endpoint is configured, are POSTed
//! to `{telemetry_url}/telemetry` in the background. Delivery is best-effort:
//! failures are logged and never reach the request path.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Header carrying the extension API key on telemetry requests.
pub const API_KEY_HEADER: &str = "X-Kiket-API-Key";

/// In-process observer invoked synchronously for every record. A panic in
/// the hook is caught and logged.
pub type FeedbackHook = Arc<dyn Fn(&TelemetryRecord) + Send + Sync>;

/// Outcome of one handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub event: String,
    pub version: String,
    pub status: TelemetryStatus,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub extension_id: Option<String>,
    pub extension_version: Option<String>,
    pub timestamp: String,
}

pub struct TelemetryReporter {
    enabled: bool,
    endpoint: Option<String>,
    http: reqwest::Client,
    feedback_hook: Option<FeedbackHook>,
    extension_id: Option<String>,
    extension_version: Option<String>,
    api_key: Option<String>,
}

impl TelemetryReporter {
    pub fn new(
        enabled: bool,
        telemetry_url: Option<&str>,
        feedback_hook: Option<FeedbackHook>,
        extension_id: Option<String>,
        extension_version: Option<String>,
        api_key: Option<String>,
    ) -> Self {
        let endpoint = telemetry_url
            .filter(|u| !u.is_empty())
            .map(|u| format!("{}/telemetry", u.trim_end_matches('/')));

        Self {
            enabled,
            endpoint,
            http: reqwest::Client::new(),
            feedback_hook,
            extension_id,
            extension_version,
            api_key,
        }
    }

    /// A reporter that drops everything.
    pub fn disabled() -> Self {
        Self::new(false, None, None, None, None, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Build a record stamped with the current time and this extension's identity.
    pub fn build_record(
        &self,
        event: &str,
        version: &str,
        status: TelemetryStatus,
        duration_ms: f64,
        message: Option<String>,
    ) -> TelemetryRecord {
        TelemetryRecord {
            event: event.to_string(),
            version: version.to_string(),
            status,
            duration_ms,
            message,
            extension_id: self.extension_id.clone(),
            extension_version: self.extension_version.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Report one handler invocation. No-op when disabled.
    ///
    /// Sending requires a tokio runtime; outside one the record only reaches
    /// the feedback hook.
    pub fn record(
        &self,
        event: &str,
        version: &str,
        status: TelemetryStatus,
        duration_ms: f64,
        message: Option<String>,
    ) {
        if !self.enabled {
            return;
        }

        let record = self.build_record(event, version, status, duration_ms, message);

        if let Some(hook) = &self.feedback_hook {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| hook(&record)));
            if outcome.is_err() {
                warn!(target: "telemetry", event, version, "feedback hook panicked; record dropped by hook");
            }
        }

        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(target: "telemetry", "no runtime available; telemetry not sent");
            return;
        };

        let mut req = self.http.post(endpoint).json(&record);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }
        runtime.spawn(async move {
            match req.send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!(target: "telemetry", status = %resp.status(), "telemetry endpoint rejected record");
                }
                Ok(_) => {}
                Err(e) => warn!(target: "telemetry", error = %e, "failed to send telemetry"),
            }
        });
    }
}
