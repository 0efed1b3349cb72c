//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `config show|path` -- inspect the configuration an extension would run with
//! - `sign` -- produce signature headers for a body, for local testing
//! - `version` -- print version info

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::auth;
use crate::config::manifest::{find_manifest, load_manifest, Manifest};
use crate::config::{resolve_config, EnvSource, ProcessEnv, SdkOptions};

/// Developer tooling for Kiket extensions.
#[derive(Parser, Debug)]
#[command(
    name = "kiket-ext",
    version = env!("CARGO_PKG_VERSION"),
    about = "Developer tooling for Kiket extensions"
)]
pub struct Cli {
    /// Manifest file to use instead of searching the working directory.
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Emit JSON logs.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect the resolved configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Sign a webhook body and print the headers a platform delivery would carry.
    Sign {
        /// Webhook secret (default: the manifest `delivery_secret`, then
        /// `KIKET_WEBHOOK_SECRET`).
        #[arg(long)]
        secret: Option<String>,

        /// Body to sign.
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the body to sign from a file.
        #[arg(long)]
        body_file: Option<PathBuf>,

        /// Unix timestamp to sign with (default: now).
        #[arg(long, allow_negative_numbers = true)]
        timestamp: Option<i64>,
    },

    /// Print version information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the resolved configuration (secrets redacted) as JSON.
    Show,

    /// Print which manifest file would be loaded.
    Path,
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Resolve configuration and render it with secrets masked.
pub fn render_config(manifest: Option<&Manifest>, env: &dyn EnvSource) -> Value {
    let resolved = resolve_config(&SdkOptions::default(), manifest, env);
    let secret_keys = manifest.map(Manifest::secret_keys).unwrap_or_default();
    resolved.redacted(&secret_keys)
}

/// Run the `config show` subcommand.
pub fn handle_config_show(manifest_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = load_manifest(manifest_path, &current_dir());
    let rendered = render_config(manifest.as_ref(), &ProcessEnv);
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path(manifest_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = current_dir();
    match find_manifest(manifest_path, &cwd) {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err(format!("no extension manifest found in {}", cwd.display()).into()),
    }
}

/// Signature headers for one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub signature: String,
    pub timestamp: String,
}

/// Sign `body` as the platform would at `timestamp`.
pub fn sign_body(
    secret: &str,
    body: &[u8],
    timestamp: i64,
) -> Result<SignedHeaders, Box<dyn std::error::Error>> {
    let timestamp = timestamp.to_string();
    let signature = auth::compute_signature(secret, &timestamp, body)
        .ok_or("webhook secret must not be empty")?;
    Ok(SignedHeaders {
        signature,
        timestamp,
    })
}

/// Pick the signing secret the extension server would verify with.
pub fn resolve_sign_secret(
    explicit: Option<&str>,
    manifest: Option<&Manifest>,
    env: &dyn EnvSource,
) -> Result<String, Box<dyn std::error::Error>> {
    let options = SdkOptions {
        webhook_secret: explicit.map(str::to_string),
        ..Default::default()
    };
    resolve_config(&options, manifest, env)
        .webhook_secret
        .ok_or_else(|| "no webhook secret: pass --secret or configure one".into())
}

/// Run the `sign` subcommand.
pub fn handle_sign(
    manifest_path: Option<&Path>,
    secret: Option<&str>,
    body: Option<&str>,
    body_file: Option<&Path>,
    timestamp: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = load_manifest(manifest_path, &current_dir());
    let secret = resolve_sign_secret(secret, manifest.as_ref(), &ProcessEnv)?;

    let body = match (body, body_file) {
        (Some(body), _) => body.as_bytes().to_vec(),
        (None, Some(path)) => std::fs::read(path)?,
        (None, None) => Vec::new(),
    };

    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let headers = sign_body(&secret, &body, timestamp)?;
    println!("X-Kiket-Signature: {}", headers.signature);
    println!("X-Kiket-Timestamp: {}", headers.timestamp);
    Ok(())
}

/// Run the `version` subcommand.
pub fn handle_version() {
    println!("kiket-ext {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Platform:   {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_cli_no_args_defaults_to_none() {
        let cli = Cli::try_parse_from(["kiket-ext"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.manifest.is_none());
    }

    #[test]
    fn test_cli_config_subcommands() {
        let cli = Cli::try_parse_from(["kiket-ext", "config", "show"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Show))));

        let cli =
            Cli::try_parse_from(["kiket-ext", "config", "path", "--manifest", "ext.yaml"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Path))));
        assert_eq!(cli.manifest, Some(PathBuf::from("ext.yaml")));
    }

    #[test]
    fn test_cli_sign_args() {
        let cli = Cli::try_parse_from([
            "kiket-ext",
            "sign",
            "--secret",
            "s",
            "--body",
            "{}",
            "--timestamp",
            "1700000000",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Sign {
                ref secret,
                ref body,
                timestamp,
                ..
            }) => {
                assert_eq!(secret.as_deref(), Some("s"));
                assert_eq!(body.as_deref(), Some("{}"));
                assert_eq!(timestamp, Some(1_700_000_000));
            }
            other => panic!("Expected Sign, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_sign_body_conflicts_with_file() {
        let result = Cli::try_parse_from([
            "kiket-ext",
            "sign",
            "--body",
            "{}",
            "--body-file",
            "payload.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sign_body_verifies() {
        let headers = sign_body("whsec", br#"{"id":1}"#, 1_700_000_000).unwrap();
        assert_eq!(headers.timestamp, "1700000000");
        assert_eq!(headers.signature.len(), 64);

        let outcome = auth::verify_signature_at(
            Some("whsec"),
            Some(&headers.signature),
            Some(&headers.timestamp),
            br#"{"id":1}"#,
            1_700_000_010,
        );
        assert!(outcome.is_valid());
    }

    #[test]
    fn test_sign_secret_prefers_manifest_over_env() {
        let manifest = Manifest::from_value(&json!({"delivery_secret": "m"})).unwrap();
        let env: HashMap<String, String> =
            [("KIKET_WEBHOOK_SECRET".to_string(), "e".to_string())]
                .into_iter()
                .collect();

        assert_eq!(resolve_sign_secret(None, Some(&manifest), &env).unwrap(), "m");
        assert_eq!(resolve_sign_secret(Some("x"), Some(&manifest), &env).unwrap(), "x");
        assert_eq!(resolve_sign_secret(Some(""), Some(&manifest), &env).unwrap(), "m");
        assert_eq!(resolve_sign_secret(None, None, &env).unwrap(), "e");
        assert!(resolve_sign_secret(None, None, &HashMap::<String, String>::new()).is_err());
    }

    #[test]
    fn test_cli_sign_secret_is_flag_only() {
        let cli = Cli::try_parse_from(["kiket-ext", "sign", "--body", "{}"]).unwrap();
        match cli.command {
            Some(Command::Sign { ref secret, .. }) => assert!(secret.is_none()),
            other => panic!("Expected Sign, got {:?}", other),
        }
    }

    #[test]
    fn test_sign_body_rejects_empty_secret() {
        assert!(sign_body("", b"{}", 0).is_err());
    }

    #[test]
    fn test_render_config_masks_secrets() {
        let manifest = Manifest::from_value(&json!({
            "id": "com.example.ext",
            "delivery_secret": "whsec",
            "settings": [
                {"key": "API_TOKEN", "secret": true, "default": "dflt"},
                {"key": "region", "default": "us"},
            ],
        }))
        .unwrap();
        let env: HashMap<String, String> =
            [("KIKET_WORKSPACE_TOKEN".to_string(), "wst".to_string())]
                .into_iter()
                .collect();

        let rendered = render_config(Some(&manifest), &env);
        assert_eq!(rendered["webhookSecret"], "<redacted>");
        assert_eq!(rendered["workspaceToken"], "<redacted>");
        assert_eq!(rendered["settings"]["API_TOKEN"], "<redacted>");
        assert_eq!(rendered["settings"]["region"], "us");
        assert_eq!(rendered["extensionId"], "com.example.ext");
        assert!(!rendered.to_string().contains("whsec"));
    }
}
