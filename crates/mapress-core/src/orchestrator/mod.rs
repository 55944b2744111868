//! Network-facing orchestration: search, fetch, LLM calls and the two
//! generation flows built on them
//!
//! Every collaborator sits behind a trait so the flows can run against the
//! in-process mocks in [`mock`].

pub mod agent;
pub mod fetch;
pub mod llm;
pub mod mock;
pub mod pipeline;
pub mod search;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::MapressConfig;
use crate::parser::FetchedDocument;

pub use agent::{AgentError, TopicMapAgent};
pub use fetch::{DirectFetchAdapter, HttpFetchAdapter};
pub use llm::{ChatCompletion, ChatMessage, CompletionClient, LlmError, OpenRouterClient};
pub use mock::{MockCompletion, MockFetch, MockSearch};
pub use pipeline::{MapPipeline, PipelineError, ProgressEvent, Step, StreamRequest};
pub use search::HttpSearchAdapter;

/// Search or fetch adapter failure.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{operation} failed with status {status}")]
    Status { operation: &'static str, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("refusing to fetch unsafe url {0:?}")]
    UnsafeUrl(String),
}

/// Finds article URLs for a query.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    /// Up to `max` URLs, most relevant first.
    async fn search(&self, query: &str, max: usize) -> Result<Vec<String>, AdapterError>;
}

/// Retrieves the readable content of one article.
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, AdapterError>;
}

/// The three collaborators shared by both generation flows.
#[derive(Clone)]
pub struct Adapters {
    pub search: Arc<dyn SearchAdapter>,
    pub fetch: Arc<dyn FetchAdapter>,
    pub llm: Arc<dyn CompletionClient>,
}

impl Adapters {
    /// Real services from configuration.
    ///
    /// Pages are fetched through the external fetch service when one is
    /// configured, and directly otherwise.
    pub fn live(config: &MapressConfig) -> Result<Self, AdapterError> {
        let fetch: Arc<dyn FetchAdapter> = if config.fetch_url.is_some() {
            Arc::new(HttpFetchAdapter::from_config(config)?)
        } else {
            info!("no fetch service configured, fetching pages directly");
            Arc::new(DirectFetchAdapter::from_config(config)?)
        };

        Ok(Self {
            search: Arc::new(HttpSearchAdapter::from_config(config)?),
            fetch,
            llm: Arc::new(OpenRouterClient::from_config(config)),
        })
    }

    /// Sample fixtures only; no network access.
    pub fn mock() -> Self {
        Self {
            search: Arc::new(MockSearch),
            fetch: Arc::new(MockFetch::default()),
            llm: Arc::new(MockCompletion::new()),
        }
    }

    pub fn pipeline(&self, config: &MapressConfig) -> MapPipeline {
        MapPipeline::new(
            self.search.clone(),
            self.fetch.clone(),
            self.llm.clone(),
            config.clone(),
        )
    }

    pub fn agent(&self, config: &MapressConfig) -> TopicMapAgent {
        TopicMapAgent::new(
            self.search.clone(),
            self.fetch.clone(),
            self.llm.clone(),
            config,
        )
    }
}

pub(crate) fn http_client(timeout_ms: Option<u64>) -> Result<reqwest::Client, AdapterError> {
    let mut builder = reqwest::Client::builder().user_agent(format!(
        "Mozilla/5.0 (compatible; Mapress/{})",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(ms) = timeout_ms {
        builder = builder.timeout(std::time::Duration::from_millis(ms));
    }
    builder
        .build()
        .map_err(|e| AdapterError::Network(format!("failed to build HTTP client: {e}")))
}
