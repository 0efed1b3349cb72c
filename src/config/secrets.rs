//! Environment overrides for secret settings
//!
//! A manifest setting flagged `secret: true` can be supplied at deploy time
//! through `KIKET_SECRET_<KEY>` instead of being committed as a default.

use serde_json::{Map, Value};

use super::manifest::Manifest;
use super::EnvSource;

/// Prefix of the environment variable carrying a secret setting.
pub const SECRET_ENV_PREFIX: &str = "KIKET_SECRET_";

/// Environment variable name for a secret setting key.
pub fn secret_env_name(key: &str) -> String {
    format!("{}{}", SECRET_ENV_PREFIX, key.to_uppercase())
}

/// Collect environment-provided values for every secret setting.
///
/// Only settings declared secret are looked up. The manifest is not modified.
pub fn secret_overlay(manifest: &Manifest, env: &dyn EnvSource) -> Map<String, Value> {
    let mut overlay = Map::new();
    for key in manifest.secret_keys() {
        if let Some(value) = env.get(&secret_env_name(key)) {
            overlay.insert(key.to_string(), Value::String(value));
        }
    }
    overlay
}
