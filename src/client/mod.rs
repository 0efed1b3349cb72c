//! Outbound client for the Kiket REST API
//!
//! A thin JSON wrapper over `reqwest`: it attaches the workspace token and
//! the event version of the request being handled, and nothing more. Retry
//! policy is left to callers.

pub mod endpoints;

use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub use endpoints::{ExtensionEndpoints, SecretManager};

/// Header telling the platform which event version the caller speaks.
pub const EVENT_VERSION_HEADER: &str = "X-Kiket-Event-Version";

const USER_AGENT: &str = concat!("kiket-sdk-rust/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned HTTP {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("invalid JSON from {path}: {message}")]
    Decode { path: String, message: String },
}

/// HTTP client bound to one platform base URL.
#[derive(Debug, Clone)]
pub struct KiketClient {
    http: reqwest::Client,
    base_url: String,
    workspace_token: Option<String>,
    event_version: Option<String>,
}

impl KiketClient {
    pub fn new(
        base_url: impl Into<String>,
        workspace_token: Option<String>,
        event_version: Option<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: base_url.into(),
            workspace_token,
            event_version,
        }
    }

    /// Same connection pool and credentials, different event version header.
    pub fn with_event_version(&self, version: impl Into<String>) -> Self {
        Self {
            event_version: Some(version.into()),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn event_version(&self) -> Option<&str> {
        self.event_version.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.http.request(method, self.url(path));
        if let Some(token) = &self.workspace_token {
            req = req.bearer_auth(token);
        }
        if let Some(version) = &self.event_version {
            req = req.header(EVENT_VERSION_HEADER, version);
        }
        req
    }

    async fn send(&self, path: &str, req: RequestBuilder) -> Result<Value, ClientError> {
        let resp = req.send().await.map_err(|source| ClientError::Transport {
            path: path.to_string(),
            source,
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|source| ClientError::Transport {
            path: path.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(ClientError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.send(path, self.request(Method::GET, path)).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.send(path, self.request(Method::POST, path).json(body))
            .await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.send(path, self.request(Method::PUT, path).json(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        self.send(path, self.request(Method::DELETE, path)).await
    }
}
