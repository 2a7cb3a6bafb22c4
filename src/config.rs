use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Connection settings for an [`ApiClient`](crate::ApiClient).
///
/// `base_url` is the full API prefix, origin plus `/api`, e.g.
/// `https://backend.example.com/api`. Extra headers are attached to every
/// outgoing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal() {
        let json = r#"{"baseUrl": "https://backend.example.com/api"}"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_url, "https://backend.example.com/api");
        assert!(config.headers.is_empty());
    }

    #[test]
    fn deserialize_with_headers() {
        let json = r#"{
            "baseUrl": "https://backend.example.com/api",
            "headers": {"X-Client": "kiosk-4"}
        }"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.headers.get("X-Client").unwrap(), "kiosk-4");
    }

    #[test]
    fn builder_style_headers() {
        let config = ClientConfig::new("https://backend.example.com/api")
            .header("X-Client", "kiosk-4");
        assert_eq!(config.headers.len(), 1);
    }

    #[test]
    fn serialize_roundtrip() {
        let config = ClientConfig::new("http://192.168.55.61:8000/api");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("baseUrl"));
        let parsed: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.base_url, config.base_url);
    }
}
