use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{AdapterError, SearchAdapter, http_client};
use crate::config::MapressConfig;

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max: usize,
}

/// Client for an external search service exposing `POST /search`.
///
/// Without a configured base URL every search returns no results.
#[derive(Clone)]
pub struct HttpSearchAdapter {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpSearchAdapter {
    pub fn new(base_url: Option<String>) -> Result<Self, AdapterError> {
        Ok(Self {
            client: http_client(None)?,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    pub fn from_config(config: &MapressConfig) -> Result<Self, AdapterError> {
        Self::new(config.search_url.clone())
    }
}

#[async_trait]
impl SearchAdapter for HttpSearchAdapter {
    async fn search(&self, query: &str, max: usize) -> Result<Vec<String>, AdapterError> {
        let Some(base_url) = &self.base_url else {
            debug!("search service not configured, returning no urls");
            return Ok(Vec::new());
        };

        let response = self
            .client
            .post(format!("{base_url}/search"))
            .json(&SearchRequest { query, max })
            .send()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                operation: "search",
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        let urls = urls_from_response(&body, max);
        debug!(query, count = urls.len(), "search completed");
        Ok(urls)
    }
}

/// String entries of the `urls` array, capped at `max`; anything else yields none.
fn urls_from_response(body: &Value, max: usize) -> Vec<String> {
    body.get("urls")
        .and_then(Value::as_array)
        .map(|urls| {
            urls.iter()
                .filter_map(Value::as_str)
                .take(max)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_and_caps_urls() {
        let body = json!({"urls": ["https://a.com", "https://b.com", "https://c.com"]});
        assert_eq!(
            urls_from_response(&body, 2),
            vec!["https://a.com".to_string(), "https://b.com".to_string()]
        );
    }

    #[test]
    fn non_array_urls_yield_nothing() {
        assert!(urls_from_response(&json!({"urls": "https://a.com"}), 8).is_empty());
        assert!(urls_from_response(&json!({}), 8).is_empty());
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(SearchRequest {
            query: "ai",
            max: 3,
        })
        .unwrap();
        assert_eq!(body, json!({"query": "ai", "max": 3}));
    }

    #[tokio::test]
    async fn unconfigured_search_returns_empty() {
        let adapter = HttpSearchAdapter::new(None).unwrap();
        assert!(adapter.search("ai", 8).await.unwrap().is_empty());
    }
}
