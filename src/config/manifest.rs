//! Extension manifest loading
//!
//! The manifest describes the extension's identity and its configurable
//! settings. YAML is parsed into a generic JSON tree first; field extraction
//! is lenient and ignores keys it does not know.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// File names searched, in order, when no explicit manifest path is given.
pub const MANIFEST_CANDIDATES: &[&str] = &[
    "extension.yaml",
    "manifest.yaml",
    "extension.yml",
    "manifest.yml",
];

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to parse manifest {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Manifest {path} must be a mapping at the top level")]
    NotAMapping { path: String },
}

/// One configurable setting declared by the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingDefinition {
    pub key: String,
    pub default_value: Option<Value>,
    pub secret: bool,
}

/// Parsed extension manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub id: Option<String>,
    pub version: Option<String>,
    pub delivery_secret: Option<String>,
    pub settings: Vec<SettingDefinition>,
}

impl Manifest {
    /// Build a manifest from a generic key/value tree.
    ///
    /// Returns `None` when the tree is not a mapping.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let settings = obj
            .get("settings")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(setting_from_value).collect())
            .unwrap_or_default();

        Some(Manifest {
            id: string_field(obj, "id"),
            version: string_field(obj, "version"),
            delivery_secret: string_field(obj, "delivery_secret"),
            settings,
        })
    }

    /// Parse manifest YAML text.
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ManifestError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Manifest::from_value(&value).ok_or_else(|| ManifestError::NotAMapping {
            path: path.display().to_string(),
        })
    }

    /// Read and parse a manifest file.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|e| ManifestError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Manifest::from_yaml_str(&content, path)
    }

    /// Declared defaults. Settings without a default are omitted.
    pub fn settings_defaults(&self) -> Map<String, Value> {
        self.settings
            .iter()
            .filter_map(|s| s.default_value.clone().map(|v| (s.key.clone(), v)))
            .collect()
    }

    /// Keys of settings flagged secret, in declaration order.
    pub fn secret_keys(&self) -> Vec<&str> {
        self.settings
            .iter()
            .filter(|s| s.secret)
            .map(|s| s.key.as_str())
            .collect()
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        // YAML happily types `version: 1.0` as a number
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn setting_from_value(value: &Value) -> Option<SettingDefinition> {
    let obj = value.as_object()?;
    let key = obj.get("key")?.as_str()?.to_string();
    let default_value = obj.get("default").filter(|v| !v.is_null()).cloned();
    let secret = obj.get("secret").and_then(|v| v.as_bool()) == Some(true);
    Some(SettingDefinition {
        key,
        default_value,
        secret,
    })
}

/// Resolve which manifest file would be loaded.
///
/// An explicit path is used as-is (relative paths are joined onto `base_dir`);
/// otherwise the first existing candidate in `base_dir` wins.
pub fn find_manifest(explicit: Option<&Path>, base_dir: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => {
            let full = base_dir.join(path);
            full.exists().then_some(full)
        }
        None => MANIFEST_CANDIDATES
            .iter()
            .map(|name| base_dir.join(name))
            .find(|p| p.exists()),
    }
}

/// Load the manifest, degrading to `None` on any failure.
pub fn load_manifest(explicit: Option<&Path>, base_dir: &Path) -> Option<Manifest> {
    let path = match find_manifest(explicit, base_dir) {
        Some(path) => path,
        None => {
            debug!(target: "config", dir = %base_dir.display(), "no extension manifest found");
            return None;
        }
    };

    match Manifest::from_file(&path) {
        Ok(manifest) => {
            debug!(target: "config", path = %path.display(), id = ?manifest.id, "loaded extension manifest");
            Some(manifest)
        }
        Err(e) => {
            warn!(target: "config", error = %e, "ignoring unusable extension manifest");
            None
        }
    }
}

/// Load the manifest relative to the process working directory.
pub fn load_manifest_from_cwd(explicit: Option<&Path>) -> Option<Manifest> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    load_manifest(explicit, &cwd)
}
