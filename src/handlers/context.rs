//! Per-request handler context

use axum::http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::client::{ExtensionEndpoints, KiketClient, SecretManager};
use crate::config::{ResolvedConfig, Settings};

/// Everything a handler knows about the request it is serving.
///
/// Built fresh for every dispatch. `settings` is the same allocation as
/// [`ResolvedConfig::settings`]; handlers only ever get a shared reference.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    event: String,
    version: String,
    headers: HashMap<String, String>,
    client: KiketClient,
    endpoints: Option<ExtensionEndpoints>,
    settings: Arc<Settings>,
    extension_id: Option<String>,
    extension_version: Option<String>,
}

impl HandlerContext {
    /// Assemble the context for one dispatched request.
    ///
    /// Header names are lower-cased; headers whose values are not visible
    /// ASCII are dropped. The client is re-targeted at the request's event
    /// version.
    pub fn build(
        config: &ResolvedConfig,
        client: &KiketClient,
        event: &str,
        version: &str,
        headers: &HeaderMap,
    ) -> Self {
        let mut header_map = HashMap::with_capacity(headers.len());
        for (key, value) in headers.iter() {
            if let Ok(v) = value.to_str() {
                header_map.insert(key.as_str().to_lowercase(), v.to_string());
            }
        }

        let client = client.with_event_version(version);
        let endpoints = config.extension_id.as_ref().map(|id| {
            ExtensionEndpoints::new(client.clone(), id.clone(), Some(version.to_string()))
        });

        Self {
            event: event.to_string(),
            version: version.to_string(),
            headers: header_map,
            client,
            endpoints,
            settings: Arc::clone(&config.settings),
            extension_id: config.extension_id.clone(),
            extension_version: config.extension_version.clone(),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn client(&self) -> &KiketClient {
        &self.client
    }

    /// Extension-scoped API helpers; `None` when the extension id is unknown.
    pub fn endpoints(&self) -> Option<&ExtensionEndpoints> {
        self.endpoints.as_ref()
    }

    pub fn secrets(&self) -> Option<SecretManager> {
        self.endpoints.as_ref().map(ExtensionEndpoints::secrets)
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn extension_id(&self) -> Option<&str> {
        self.extension_id.as_deref()
    }

    pub fn extension_version(&self) -> Option<&str> {
        self.extension_version.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_config, SdkOptions};
    use axum::http::HeaderValue;
    use serde_json::json;

    fn config(extension_id: Option<&str>) -> ResolvedConfig {
        let mut settings = Settings::new();
        settings.insert("region".to_string(), json!("eu"));
        let options = SdkOptions {
            extension_id: extension_id.map(str::to_string),
            extension_version: Some("2.0.0".to_string()),
            settings: Some(settings),
            ..Default::default()
        };
        resolve_config(&options, None, &HashMap::<String, String>::new())
    }

    #[test]
    fn test_build_context() {
        let cfg = config(Some("com.example.ext"));
        let client = KiketClient::new(&cfg.base_url, None, None);
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-Id", HeaderValue::from_static("req-1"));
        headers.insert("X-Binary", HeaderValue::from_bytes(b"\xfa\xfb").unwrap());

        let ctx = HandlerContext::build(&cfg, &client, "issue.created", "v2", &headers);

        assert_eq!(ctx.event(), "issue.created");
        assert_eq!(ctx.version(), "v2");
        assert_eq!(ctx.header("x-request-id"), Some("req-1"));
        assert_eq!(ctx.header("X-REQUEST-ID"), Some("req-1"));
        assert!(ctx.headers().contains_key("x-request-id"));
        assert!(ctx.header("x-binary").is_none());
        assert_eq!(ctx.client().event_version(), Some("v2"));
        assert_eq!(ctx.extension_id(), Some("com.example.ext"));
        assert_eq!(ctx.extension_version(), Some("2.0.0"));
        assert!(ctx.endpoints().is_some());
        assert!(ctx.secrets().is_some());
    }

    #[test]
    fn test_settings_are_shared_not_copied() {
        let cfg = config(None);
        let client = KiketClient::new(&cfg.base_url, None, None);
        let ctx = HandlerContext::build(&cfg, &client, "e", "v1", &HeaderMap::new());

        assert!(Arc::ptr_eq(ctx.settings(), &cfg.settings));
        assert_eq!(ctx.setting("region"), Some(&json!("eu")));
        assert!(ctx.endpoints().is_none());
    }
}
