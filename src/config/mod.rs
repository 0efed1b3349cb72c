//! Configuration resolution
//!
//! Produces one immutable [`ResolvedConfig`] at startup by layering, per
//! field, explicit [`SdkOptions`] over the extension manifest over the
//! environment. Resolution never fails: anything missing resolves to `None`
//! or a documented default.

pub mod manifest;
pub mod secrets;

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::telemetry::FeedbackHook;
use manifest::Manifest;

/// Platform URL used when neither options nor environment provide one.
pub const DEFAULT_BASE_URL: &str = "https://kiket.dev";

/// Path appended to the base URL to derive the telemetry endpoint.
pub const TELEMETRY_PATH: &str = "/api/v1/ext";

pub const ENV_BASE_URL: &str = "KIKET_BASE_URL";
pub const ENV_WORKSPACE_TOKEN: &str = "KIKET_WORKSPACE_TOKEN";
pub const ENV_WEBHOOK_SECRET: &str = "KIKET_WEBHOOK_SECRET";
pub const ENV_TELEMETRY_URL: &str = "KIKET_SDK_TELEMETRY_URL";
pub const ENV_EXTENSION_API_KEY: &str = "KIKET_EXTENSION_API_KEY";
pub const ENV_TELEMETRY_OPTOUT: &str = "KIKET_SDK_TELEMETRY_OPTOUT";

/// Extension settings, keyed by setting name.
pub type Settings = Map<String, Value>;

/// Source of environment-style key/value lookups.
///
/// Injected into resolution so tests never touch the process environment.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Explicit caller-supplied configuration.
///
/// Every `Some` field wins over the manifest and the environment.
#[derive(Clone)]
pub struct SdkOptions {
    pub webhook_secret: Option<String>,
    pub workspace_token: Option<String>,
    pub base_url: Option<String>,
    pub settings: Option<Settings>,
    pub extension_id: Option<String>,
    pub extension_version: Option<String>,
    /// Manifest to load instead of searching the working directory.
    pub manifest_path: Option<PathBuf>,
    /// Overlay `KIKET_SECRET_<KEY>` values onto secret settings.
    pub auto_env_secrets: bool,
    pub telemetry_enabled: bool,
    pub telemetry_url: Option<String>,
    pub extension_api_key: Option<String>,
    pub feedback_hook: Option<FeedbackHook>,
}

impl Default for SdkOptions {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            workspace_token: None,
            base_url: None,
            settings: None,
            extension_id: None,
            extension_version: None,
            manifest_path: None,
            auto_env_secrets: true,
            telemetry_enabled: true,
            telemetry_url: None,
            extension_api_key: None,
            feedback_hook: None,
        }
    }
}

impl fmt::Debug for SdkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkOptions")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("workspace_token", &self.workspace_token.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("settings", &self.settings.as_ref().map(|s| s.len()))
            .field("extension_id", &self.extension_id)
            .field("extension_version", &self.extension_version)
            .field("manifest_path", &self.manifest_path)
            .field("auto_env_secrets", &self.auto_env_secrets)
            .field("telemetry_enabled", &self.telemetry_enabled)
            .field("telemetry_url", &self.telemetry_url)
            .field("extension_api_key", &self.extension_api_key.as_ref().map(|_| "<redacted>"))
            .field("feedback_hook", &self.feedback_hook.is_some())
            .finish()
    }
}

/// Effective configuration, computed once and shared read-only.
#[derive(Clone, PartialEq)]
pub struct ResolvedConfig {
    pub webhook_secret: Option<String>,
    pub workspace_token: Option<String>,
    pub base_url: String,
    /// Shared with every handler context; never mutated after resolution.
    pub settings: Arc<Settings>,
    pub extension_id: Option<String>,
    pub extension_version: Option<String>,
    pub telemetry_enabled: bool,
    pub telemetry_url: String,
    pub extension_api_key: Option<String>,
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolvedConfig {}", self.redacted(&[]))
    }
}

const REDACTED: &str = "<redacted>";

fn mask(value: &Option<String>) -> Value {
    match value {
        Some(_) => Value::String(REDACTED.to_string()),
        None => Value::Null,
    }
}

impl ResolvedConfig {
    /// JSON view with credentials and the named secret settings masked.
    pub fn redacted(&self, secret_keys: &[&str]) -> Value {
        let settings: Map<String, Value> = self
            .settings
            .iter()
            .map(|(k, v)| {
                if secret_keys.contains(&k.as_str()) {
                    (k.clone(), Value::String(REDACTED.to_string()))
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();

        json!({
            "baseUrl": self.base_url,
            "workspaceToken": mask(&self.workspace_token),
            "webhookSecret": mask(&self.webhook_secret),
            "extensionId": self.extension_id,
            "extensionVersion": self.extension_version,
            "telemetryEnabled": self.telemetry_enabled,
            "telemetryUrl": self.telemetry_url,
            "extensionApiKey": mask(&self.extension_api_key),
            "settings": settings,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// First candidate that is present and non-empty.
fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates.into_iter().find_map(non_empty)
}

/// Derive the telemetry endpoint from the platform base URL.
pub fn derive_telemetry_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), TELEMETRY_PATH)
}

/// Merge settings: manifest defaults, then secret overlay, then explicit.
pub fn merge_settings(
    manifest: Option<&Manifest>,
    explicit: Option<&Settings>,
    auto_env_secrets: bool,
    env: &dyn EnvSource,
) -> Settings {
    let mut settings = Settings::new();
    if let Some(manifest) = manifest {
        settings.extend(manifest.settings_defaults());
        if auto_env_secrets {
            settings.extend(secrets::secret_overlay(manifest, env));
        }
    }
    if let Some(explicit) = explicit {
        settings.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    settings
}

/// Resolve the effective configuration.
pub fn resolve_config(
    options: &SdkOptions,
    manifest: Option<&Manifest>,
    env: &dyn EnvSource,
) -> ResolvedConfig {
    let base_url = first_non_empty([options.base_url.clone(), env.get(ENV_BASE_URL)])
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let workspace_token =
        first_non_empty([options.workspace_token.clone(), env.get(ENV_WORKSPACE_TOKEN)]);

    let webhook_secret = first_non_empty([
        options.webhook_secret.clone(),
        manifest.and_then(|m| m.delivery_secret.clone()),
        env.get(ENV_WEBHOOK_SECRET),
    ]);

    let extension_id = first_non_empty([
        options.extension_id.clone(),
        manifest.and_then(|m| m.id.clone()),
    ]);

    let extension_version = first_non_empty([
        options.extension_version.clone(),
        manifest.and_then(|m| m.version.clone()),
    ]);

    let telemetry_url = first_non_empty([options.telemetry_url.clone(), env.get(ENV_TELEMETRY_URL)])
        .unwrap_or_else(|| derive_telemetry_url(&base_url));

    let extension_api_key = first_non_empty([
        options.extension_api_key.clone(),
        env.get(ENV_EXTENSION_API_KEY),
    ]);

    let telemetry_enabled =
        options.telemetry_enabled && env.get(ENV_TELEMETRY_OPTOUT).as_deref() != Some("1");

    let settings = merge_settings(
        manifest,
        options.settings.as_ref(),
        options.auto_env_secrets,
        env,
    );

    ResolvedConfig {
        webhook_secret,
        workspace_token,
        base_url,
        settings: Arc::new(settings),
        extension_id,
        extension_version,
        telemetry_enabled,
        telemetry_url,
        extension_api_key,
    }
}
