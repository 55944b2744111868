use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AdapterError, FetchAdapter, http_client};
use crate::config::MapressConfig;
use crate::parser::{FetchedDocument, extract_document, fetch_html};
use crate::url_utils::safe_http_url;

/// Markdown kept per page by [`DirectFetchAdapter`].
pub const DIRECT_FETCH_MAX_CHARS: usize = 5000;

#[derive(Serialize)]
struct FetchRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct FetchResponse {
    title: Option<String>,
    markdown: Option<String>,
    text: Option<String>,
}

impl FetchResponse {
    fn into_document(self, url: &str) -> FetchedDocument {
        FetchedDocument {
            url: url.to_string(),
            title: self.title.unwrap_or_else(|| url.to_string()),
            markdown: self.markdown.or(self.text).unwrap_or_default(),
        }
    }
}

/// Client for an external fetch service exposing `POST /fetch`.
#[derive(Clone)]
pub struct HttpFetchAdapter {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpFetchAdapter {
    pub fn new(base_url: Option<String>) -> Result<Self, AdapterError> {
        Ok(Self {
            client: http_client(None)?,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    pub fn from_config(config: &MapressConfig) -> Result<Self, AdapterError> {
        Self::new(config.fetch_url.clone())
    }
}

#[async_trait]
impl FetchAdapter for HttpFetchAdapter {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, AdapterError> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or(AdapterError::NotConfigured("fetch service"))?;

        let response = self
            .client
            .post(format!("{base_url}/fetch"))
            .json(&FetchRequest { url })
            .send()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                operation: "fetch",
                status: status.as_u16(),
            });
        }

        let body: FetchResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(body.into_document(url))
    }
}

/// Fetches pages directly and extracts them locally.
///
/// Private and loopback addresses are refused before any request is made.
#[derive(Clone)]
pub struct DirectFetchAdapter {
    client: reqwest::Client,
    max_bytes: usize,
    max_chars: usize,
}

impl DirectFetchAdapter {
    pub fn new(timeout_ms: u64, max_bytes: usize) -> Result<Self, AdapterError> {
        Ok(Self {
            client: http_client(Some(timeout_ms))?,
            max_bytes,
            max_chars: DIRECT_FETCH_MAX_CHARS,
        })
    }

    pub fn from_config(config: &MapressConfig) -> Result<Self, AdapterError> {
        Self::new(config.fetch_timeout_ms, config.fetch_max_bytes)
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

#[async_trait]
impl FetchAdapter for DirectFetchAdapter {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, AdapterError> {
        let safe = safe_http_url(url).ok_or_else(|| AdapterError::UnsafeUrl(url.to_string()))?;

        let html = fetch_html(&self.client, &safe, self.max_bytes)
            .await
            .map_err(|e| AdapterError::Network(format!("{e:#}")))?;

        debug!(url, bytes = html.len(), "fetched page");
        Ok(extract_document(url, &html, self.max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_defaults_title_and_markdown() {
        let body: FetchResponse = serde_json::from_str(r#"{"text": "plain"}"#).unwrap();
        let doc = body.into_document("https://a.com/x");
        assert_eq!(doc.title, "https://a.com/x");
        assert_eq!(doc.markdown, "plain");

        let doc = FetchResponse::default().into_document("https://a.com/x");
        assert_eq!(doc.markdown, "");
    }

    #[test]
    fn response_prefers_markdown_over_text() {
        let body: FetchResponse =
            serde_json::from_str(r##"{"title": "T", "markdown": "# md", "text": "plain"}"##)
                .unwrap();
        let doc = body.into_document("https://a.com/x");
        assert_eq!(doc.title, "T");
        assert_eq!(doc.markdown, "# md");
    }

    #[tokio::test]
    async fn unconfigured_fetch_is_an_error() {
        let adapter = HttpFetchAdapter::new(None).unwrap();
        let err = adapter.fetch("https://a.com").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn direct_fetch_refuses_private_addresses() {
        let adapter = DirectFetchAdapter::new(1000, 1024).unwrap();
        for url in ["http://127.0.0.1/admin", "http://192.168.1.1/", "file:///etc/passwd"] {
            let err = adapter.fetch(url).await.unwrap_err();
            assert!(matches!(err, AdapterError::UnsafeUrl(_)), "{url}");
        }
    }
}
