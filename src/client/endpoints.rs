//! Extension-scoped helpers over [`KiketClient`]

use serde_json::{json, Value};
use tracing::debug;

use super::{ClientError, KiketClient};

/// Calls scoped to the running extension.
#[derive(Debug, Clone)]
pub struct ExtensionEndpoints {
    client: KiketClient,
    extension_id: String,
    event_version: Option<String>,
}

impl ExtensionEndpoints {
    pub fn new(
        client: KiketClient,
        extension_id: impl Into<String>,
        event_version: Option<String>,
    ) -> Self {
        Self {
            client,
            extension_id: extension_id.into(),
            event_version,
        }
    }

    pub fn secrets(&self) -> SecretManager {
        SecretManager::new(self.client.clone(), self.extension_id.clone())
    }

    /// Record a custom event against the extension.
    pub async fn log_event(&self, event: &str, data: Value) -> Result<Value, ClientError> {
        let payload = json!({
            "event": event,
            "version": self.event_version,
            "data": data,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.client
            .post(&format!("/extensions/{}/events", self.extension_id), &payload)
            .await
    }

    pub async fn metadata(&self) -> Result<Value, ClientError> {
        self.client
            .get(&format!("/extensions/{}", self.extension_id))
            .await
    }
}

/// Platform-side secret storage for the extension.
#[derive(Debug, Clone)]
pub struct SecretManager {
    client: KiketClient,
    extension_id: String,
}

impl SecretManager {
    pub fn new(client: KiketClient, extension_id: impl Into<String>) -> Self {
        Self {
            client,
            extension_id: extension_id.into(),
        }
    }

    fn path(&self, key: Option<&str>) -> String {
        match key {
            Some(key) => format!("/extensions/{}/secrets/{}", self.extension_id, key),
            None => format!("/extensions/{}/secrets", self.extension_id),
        }
    }

    /// Fetch a secret value. Any failure reads as "not set".
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.client.get(&self.path(Some(key))).await {
            Ok(resp) => resp.get("value").and_then(|v| v.as_str()).map(str::to_string),
            Err(e) => {
                debug!(key, error = %e, "secret lookup failed");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.client
            .post(&self.path(Some(key)), &json!({ "value": value }))
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, key: &str) -> Result<(), ClientError> {
        self.client.delete(&self.path(Some(key))).await.map(|_| ())
    }

    pub async fn list(&self) -> Result<Vec<String>, ClientError> {
        let resp = self.client.get(&self.path(None)).await?;
        Ok(resp
            .get("keys")
            .and_then(|v| v.as_array())
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| k.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Replace a secret: delete, then set.
    pub async fn rotate(&self, key: &str, new_value: &str) -> Result<(), ClientError> {
        self.delete(key).await?;
        self.set(key, new_value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::MockPlatform;
    use axum::http::{Method, StatusCode};

    async fn endpoints(mock: &MockPlatform) -> ExtensionEndpoints {
        let base = mock.start().await;
        let client = KiketClient::new(base, Some("tok".into()), Some("v1".into()));
        ExtensionEndpoints::new(client, "com.example.ext", Some("v1".into()))
    }

    #[tokio::test]
    async fn test_log_event_payload() {
        let mock = MockPlatform::default();
        let endpoints = endpoints(&mock).await;

        endpoints
            .log_event("issue.synced", json!({"count": 2}))
            .await
            .unwrap();

        let req = &mock.recorded()[0];
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.path, "/extensions/com.example.ext/events");
        let body = req.body.as_ref().unwrap();
        assert_eq!(body["event"], "issue.synced");
        assert_eq!(body["version"], "v1");
        assert_eq!(body["data"]["count"], 2);
        assert!(body["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_metadata() {
        let mock = MockPlatform::default();
        mock.respond(StatusCode::OK, r#"{"id":"com.example.ext"}"#);
        let endpoints = endpoints(&mock).await;

        let meta = endpoints.metadata().await.unwrap();
        assert_eq!(meta["id"], "com.example.ext");
        assert_eq!(mock.recorded()[0].path, "/extensions/com.example.ext");
    }

    #[tokio::test]
    async fn test_secret_get_and_failure_is_none() {
        let mock = MockPlatform::default();
        mock.respond(StatusCode::OK, r#"{"value":"s3cr3t"}"#);
        mock.respond(StatusCode::NOT_FOUND, "{}");
        let secrets = endpoints(&mock).await.secrets();

        assert_eq!(secrets.get("API_KEY").await.as_deref(), Some("s3cr3t"));
        assert_eq!(secrets.get("MISSING").await, None);
        assert_eq!(
            mock.recorded()[0].path,
            "/extensions/com.example.ext/secrets/API_KEY"
        );
    }

    #[tokio::test]
    async fn test_secret_list() {
        let mock = MockPlatform::default();
        mock.respond(StatusCode::OK, r#"{"keys":["A","B"]}"#);
        let secrets = endpoints(&mock).await.secrets();

        assert_eq!(secrets.list().await.unwrap(), vec!["A", "B"]);
        assert_eq!(mock.recorded()[0].path, "/extensions/com.example.ext/secrets");
    }

    #[tokio::test]
    async fn test_secret_rotate_deletes_then_sets() {
        let mock = MockPlatform::default();
        let secrets = endpoints(&mock).await.secrets();

        secrets.rotate("TOKEN", "new").await.unwrap();

        let recorded = mock.recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].method, Method::DELETE);
        assert_eq!(recorded[1].method, Method::POST);
        assert_eq!(recorded[1].body, Some(json!({"value": "new"})));
    }

    #[tokio::test]
    async fn test_rotate_stops_when_delete_fails() {
        let mock = MockPlatform::default();
        mock.respond(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        let secrets = endpoints(&mock).await.secrets();

        assert!(secrets.rotate("TOKEN", "new").await.is_err());
        assert_eq!(mock.recorded().len(), 1);
    }
}
