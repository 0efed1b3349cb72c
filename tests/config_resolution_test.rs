//! Configuration resolution integration tests
//!
//! Manifest files on disk, environment maps, and explicit options combined
//! through the public API.

use kiket_sdk::config::manifest::{find_manifest, load_manifest};
use kiket_sdk::config::{resolve_config, SdkOptions, Settings};
use kiket_sdk::KiketSdk;
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

const MANIFEST: &str = r#"
id: com.example.sync
version: 2.1.0
delivery_secret: m
settings:
  - key: a
    default: 1
  - key: b
    default: 2
  - key: a_token
    secret: true
"#;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn manifest_dir(file_name: &str, content: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(file_name), content).unwrap();
    dir
}

// ============================================================================
// Manifest discovery
// ============================================================================

#[test]
fn test_extension_yaml_preferred_over_manifest_yml() {
    let dir = manifest_dir("manifest.yml", "id: from-manifest-yml\n");
    fs::write(dir.path().join("extension.yaml"), "id: from-extension-yaml\n").unwrap();

    let found = find_manifest(None, dir.path()).unwrap();
    assert!(found.ends_with("extension.yaml"));

    let manifest = load_manifest(None, dir.path()).unwrap();
    assert_eq!(manifest.id.as_deref(), Some("from-extension-yaml"));
}

#[test]
fn test_unparsable_manifest_degrades_to_none() {
    let dir = manifest_dir("extension.yaml", "id: [unterminated\n");
    assert!(load_manifest(None, dir.path()).is_none());

    let config = resolve_config(&SdkOptions::default(), None, &env(&[]));
    assert_eq!(config.base_url, "https://kiket.dev");
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
fn test_webhook_secret_layers() {
    let dir = manifest_dir("extension.yaml", MANIFEST);
    let manifest = load_manifest(None, dir.path()).unwrap();
    let env = env(&[("KIKET_WEBHOOK_SECRET", "e")]);

    let config = resolve_config(&SdkOptions::default(), Some(&manifest), &env);
    assert_eq!(config.webhook_secret.as_deref(), Some("m"));

    let options = SdkOptions {
        webhook_secret: Some("x".to_string()),
        ..Default::default()
    };
    let config = resolve_config(&options, Some(&manifest), &env);
    assert_eq!(config.webhook_secret.as_deref(), Some("x"));

    let config = resolve_config(&SdkOptions::default(), None, &env);
    assert_eq!(config.webhook_secret.as_deref(), Some("e"));
}

#[test]
fn test_settings_layers() {
    let dir = manifest_dir("extension.yaml", MANIFEST);
    let manifest = load_manifest(None, dir.path()).unwrap();

    let mut explicit = Settings::new();
    explicit.insert("b".to_string(), json!(5));
    let options = SdkOptions {
        settings: Some(explicit),
        ..Default::default()
    };
    // Only secret settings are overlaid from the environment.
    let env = env(&[("KIKET_SECRET_A", "9"), ("KIKET_SECRET_A_TOKEN", "tok")]);

    let config = resolve_config(&options, Some(&manifest), &env);
    assert_eq!(config.settings.get("a"), Some(&json!(1)));
    assert_eq!(config.settings.get("b"), Some(&json!(5)));
    assert_eq!(config.settings.get("a_token"), Some(&json!("tok")));
}

#[test]
fn test_base_url_and_telemetry_url() {
    let config = resolve_config(
        &SdkOptions::default(),
        None,
        &env(&[("KIKET_BASE_URL", "https://staging.kiket.dev//")]),
    );
    assert_eq!(config.base_url, "https://staging.kiket.dev//");
    assert_eq!(config.telemetry_url, "https://staging.kiket.dev/api/v1/ext");
}

#[test]
fn test_resolution_is_deterministic() {
    let dir = manifest_dir("extension.yaml", MANIFEST);
    let manifest = load_manifest(None, dir.path()).unwrap();
    let env = env(&[("KIKET_WORKSPACE_TOKEN", "wst"), ("KIKET_SECRET_A_TOKEN", "t")]);

    let first = resolve_config(&SdkOptions::default(), Some(&manifest), &env);
    let second = resolve_config(&SdkOptions::default(), Some(&manifest), &env);
    assert_eq!(first, second);
}

// ============================================================================
// SDK facade
// ============================================================================

#[test]
fn test_sdk_uses_explicit_manifest_path() {
    let dir = manifest_dir("custom-name.yaml", MANIFEST);
    let manifest = load_manifest(Some(&dir.path().join("custom-name.yaml")), dir.path());
    assert!(manifest.is_some());

    let sdk = KiketSdk::from_parts(SdkOptions::default(), manifest, &env(&[]));
    assert_eq!(sdk.config().extension_id.as_deref(), Some("com.example.sync"));
    assert_eq!(sdk.config().extension_version.as_deref(), Some("2.1.0"));
    assert!(sdk.event_names().is_empty());
}
