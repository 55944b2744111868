//! The streaming outline pipeline: search, fetch, cluster, prune, layout
//!
//! Progress is reported as [`ProgressEvent`]s over a bounded channel. When the
//! receiving side goes away the pipeline stops at the next event.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::llm::{ChatMessage, CompletionClient, LlmError, SYSTEM_OUTLINE_PROMPT};
use super::{AdapterError, FetchAdapter, SearchAdapter};
use crate::config::MapressConfig;
use crate::errors::OutlineError;
use crate::export::now_timestamp;
use crate::graph::outline_to_graph;
use crate::parser::FetchedDocument;
use crate::prune::prune_outline;
use crate::types::{GraphEdge, GraphNode, MindMap};
use crate::url_utils::dedupe_by_key;
use crate::validate::parse_outline;

/// Characters of article markdown handed to the model per document.
pub const ARTICLE_EXCERPT_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Search,
    Fetch,
    Cluster,
    Layout,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTitle {
    pub title: String,
}

/// One progress notification, serialized as `{"type": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressEvent {
    Status { step: Step },
    Sources { urls: Vec<String> },
    PartialOutline { categories: Vec<CategoryTitle> },
    Graph {
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
    },
    Error { message: String },
}

/// Body of a streaming request; unset limits fall back to configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub query: String,
    #[serde(default)]
    pub max_urls: Option<usize>,
    #[serde(default)]
    pub max_nodes: Option<usize>,
    #[serde(default)]
    pub mock: bool,
}

impl StreamRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_urls: None,
            max_nodes: None,
            mock: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("search failed: {0}")]
    Search(#[from] AdapterError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Outline(#[from] OutlineError),

    #[error("progress receiver dropped")]
    Cancelled,
}

/// Drives one outline generation from query to graph.
#[derive(Clone)]
pub struct MapPipeline {
    search: Arc<dyn SearchAdapter>,
    fetch: Arc<dyn FetchAdapter>,
    llm: Arc<dyn CompletionClient>,
    config: MapressConfig,
}

impl MapPipeline {
    pub fn new(
        search: Arc<dyn SearchAdapter>,
        fetch: Arc<dyn FetchAdapter>,
        llm: Arc<dyn CompletionClient>,
        config: MapressConfig,
    ) -> Self {
        Self {
            search,
            fetch,
            llm,
            config,
        }
    }

    /// Run the pipeline, reporting progress on `events`.
    ///
    /// Failures other than cancellation are also reported as a final
    /// [`ProgressEvent::Error`].
    pub async fn run(
        &self,
        request: &StreamRequest,
        events: &mpsc::Sender<ProgressEvent>,
    ) -> Result<MindMap, PipelineError> {
        match self.execute(request, events).await {
            Ok(graph) => Ok(graph),
            Err(PipelineError::Cancelled) => {
                debug!(query = %request.query, "pipeline cancelled");
                Err(PipelineError::Cancelled)
            }
            Err(err) => {
                warn!(query = %request.query, error = %err, "pipeline failed");
                let _ = events
                    .send(ProgressEvent::Error {
                        message: err.to_string(),
                    })
                    .await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        request: &StreamRequest,
        events: &mpsc::Sender<ProgressEvent>,
    ) -> Result<MindMap, PipelineError> {
        let max_urls = request.max_urls.unwrap_or(self.config.max_urls);
        let max_nodes = request.max_nodes.unwrap_or(self.config.max_nodes);
        info!(query = %request.query, max_urls, max_nodes, "pipeline started");

        emit(events, ProgressEvent::Status { step: Step::Search }).await?;
        let urls = self.search.search(&request.query, max_urls).await?;
        let urls = dedupe_by_key(urls, |url| url.clone());
        info!(count = urls.len(), "search returned urls");
        emit(events, ProgressEvent::Sources { urls: urls.clone() }).await?;

        emit(events, ProgressEvent::Status { step: Step::Fetch }).await?;
        let docs = self.fetch_all(&urls).await;

        emit(events, ProgressEvent::Status { step: Step::Cluster }).await?;
        let user_content = articles_prompt(&request.query, &docs);
        debug!(chars = user_content.len(), "clustering with LLM");
        let raw = self
            .llm
            .complete_json(SYSTEM_OUTLINE_PROMPT, &[ChatMessage::user(user_content)])
            .await?;

        let mut outline = parse_outline(&raw)?;
        outline.query = request.query.clone();
        outline.generated_at = now_timestamp();
        info!(
            categories = outline.categories.len(),
            facts = outline.fact_count(),
            "parsed outline"
        );

        let pruned = prune_outline(&outline, max_nodes);
        info!(
            categories = pruned.categories.len(),
            facts = pruned.fact_count(),
            "pruned outline"
        );
        emit(
            events,
            ProgressEvent::PartialOutline {
                categories: pruned
                    .categories
                    .iter()
                    .map(|c| CategoryTitle {
                        title: c.title.clone(),
                    })
                    .collect(),
            },
        )
        .await?;

        emit(events, ProgressEvent::Status { step: Step::Layout }).await?;
        let graph = outline_to_graph(&pruned);
        info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "built graph");
        emit(
            events,
            ProgressEvent::Graph {
                nodes: graph.nodes.clone(),
                edges: graph.edges.clone(),
            },
        )
        .await?;

        emit(events, ProgressEvent::Status { step: Step::Done }).await?;
        Ok(graph)
    }

    /// Fetch every URL concurrently; failures become empty stand-ins.
    async fn fetch_all(&self, urls: &[String]) -> Vec<FetchedDocument> {
        let tasks = urls.iter().map(|url| async move {
            match self.fetch.fetch(url).await {
                Ok(doc) => doc,
                Err(err) => {
                    warn!(url = %url, error = %err, "fetch failed, continuing without content");
                    FetchedDocument::unavailable(url)
                }
            }
        });

        join_all(tasks)
            .await
            .into_iter()
            .zip(urls)
            .map(|(doc, url)| FetchedDocument {
                url: url.clone(),
                title: doc.title,
                markdown: doc.markdown.chars().take(ARTICLE_EXCERPT_CHARS).collect(),
            })
            .collect()
    }
}

async fn emit(
    events: &mpsc::Sender<ProgressEvent>,
    event: ProgressEvent,
) -> Result<(), PipelineError> {
    events
        .send(event)
        .await
        .map_err(|_| PipelineError::Cancelled)
}

/// User message for the clustering call: the query followed by numbered articles.
pub fn articles_prompt(query: &str, docs: &[FetchedDocument]) -> String {
    let articles = docs
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[#{}] ({})\n{}", i + 1, doc.url, doc.markdown))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("QUERY: {query}\n\nARTICLES:\n{articles}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::Adapters;
    use crate::orchestrator::mock::{MockCompletion, MockFetch, MockSearch};
    use async_trait::async_trait;

    fn drain(mut rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn kinds(events: &[ProgressEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                ProgressEvent::Status { step } => format!("status:{step:?}"),
                ProgressEvent::Sources { .. } => "sources".to_string(),
                ProgressEvent::PartialOutline { .. } => "partialOutline".to_string(),
                ProgressEvent::Graph { .. } => "graph".to_string(),
                ProgressEvent::Error { .. } => "error".to_string(),
            })
            .collect()
    }

    struct LongFetch;

    #[async_trait]
    impl FetchAdapter for LongFetch {
        async fn fetch(&self, url: &str) -> Result<FetchedDocument, AdapterError> {
            Ok(FetchedDocument {
                url: url.to_string(),
                title: "Long".to_string(),
                markdown: "é".repeat(5000),
            })
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let status = serde_json::to_value(ProgressEvent::Status { step: Step::Cluster }).unwrap();
        assert_eq!(status, serde_json::json!({"type": "status", "step": "cluster"}));

        let partial = serde_json::to_value(ProgressEvent::PartialOutline {
            categories: vec![CategoryTitle {
                title: "EU".to_string(),
            }],
        })
        .unwrap();
        assert_eq!(
            partial,
            serde_json::json!({"type": "partialOutline", "categories": [{"title": "EU"}]})
        );

        let error = serde_json::to_value(ProgressEvent::Error {
            message: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(error, serde_json::json!({"type": "error", "message": "boom"}));
    }

    #[test]
    fn stream_request_defaults() {
        let request: StreamRequest = serde_json::from_str(r#"{"query": "ai"}"#).unwrap();
        assert_eq!(request, StreamRequest::new("ai"));

        let request: StreamRequest =
            serde_json::from_str(r#"{"query": "ai", "maxUrls": 3, "maxNodes": 9, "mock": true}"#)
                .unwrap();
        assert_eq!(request.max_urls, Some(3));
        assert_eq!(request.max_nodes, Some(9));
        assert!(request.mock);
    }

    #[test]
    fn articles_prompt_numbers_documents() {
        let docs = vec![
            FetchedDocument {
                url: "https://a.com/1".to_string(),
                title: "A".to_string(),
                markdown: "alpha".to_string(),
            },
            FetchedDocument::unavailable("https://b.com/2"),
        ];
        assert_eq!(
            articles_prompt("ai", &docs),
            "QUERY: ai\n\nARTICLES:\n[#1] (https://a.com/1)\nalpha\n\n[#2] (https://b.com/2)\n"
        );
    }

    #[tokio::test]
    async fn mock_run_emits_full_event_sequence() {
        let pipeline = Adapters::mock().pipeline(&MapressConfig::default());
        let (tx, rx) = mpsc::channel(32);

        let graph = pipeline
            .run(&StreamRequest::new("ai regulation"), &tx)
            .await
            .unwrap();
        drop(tx);
        let events = drain(rx);

        assert_eq!(
            kinds(&events),
            vec![
                "status:Search",
                "sources",
                "status:Fetch",
                "status:Cluster",
                "partialOutline",
                "status:Layout",
                "graph",
                "status:Done",
            ]
        );

        match &events[1] {
            ProgressEvent::Sources { urls } => assert_eq!(urls.len(), 8),
            other => panic!("unexpected event {other:?}"),
        }
        match &events[4] {
            ProgressEvent::PartialOutline { categories } => assert_eq!(categories.len(), 5),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(graph.nodes.len(), 16);
        match &events[6] {
            ProgressEvent::Graph { nodes, edges } => {
                assert_eq!(nodes, &graph.nodes);
                assert_eq!(edges, &graph.edges);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_limits_override_config() {
        let llm = Arc::new(MockCompletion::new());
        let pipeline = MapPipeline::new(
            Arc::new(MockSearch),
            Arc::new(MockFetch::default()),
            llm.clone(),
            MapressConfig::default(),
        );
        let (tx, rx) = mpsc::channel(32);
        let request = StreamRequest {
            max_urls: Some(2),
            max_nodes: Some(10),
            ..StreamRequest::new("ai regulation")
        };

        let graph = pipeline.run(&request, &tx).await.unwrap();
        assert!(graph.nodes.len() <= 10);

        let events = drain(rx);
        match &events[1] {
            ProgressEvent::Sources { urls } => assert_eq!(urls.len(), 2),
            other => panic!("unexpected event {other:?}"),
        }

        let calls = llm.recorded_calls();
        let prompt = calls[0][0].content.clone().unwrap_or_default();
        assert!(prompt.starts_with("QUERY: ai regulation\n\nARTICLES:\n[#1] (https://www.reuters.com/"));
        assert!(prompt.contains("[#2] (https://www.ft.com/"));
        assert!(!prompt.contains("[#3]"));
    }

    #[tokio::test]
    async fn failed_fetch_degrades_to_empty_article() {
        let failing = "https://www.reuters.com/technology/ai-regulation-eu-act-2024";
        let llm = Arc::new(MockCompletion::new());
        let pipeline = MapPipeline::new(
            Arc::new(MockSearch),
            Arc::new(MockFetch::default().failing_on(failing)),
            llm.clone(),
            MapressConfig::default(),
        );
        let (tx, _rx) = mpsc::channel(32);

        pipeline
            .run(&StreamRequest::new("ai regulation"), &tx)
            .await
            .unwrap();

        let prompt = llm.recorded_calls()[0][0].content.clone().unwrap_or_default();
        assert!(prompt.contains(&format!("[#1] ({failing})\n\n\n[#2]")));
    }

    #[tokio::test]
    async fn article_markdown_is_cut_to_excerpt_length() {
        let llm = Arc::new(MockCompletion::new());
        let pipeline = MapPipeline::new(
            Arc::new(MockSearch),
            Arc::new(LongFetch),
            llm.clone(),
            MapressConfig::default(),
        );
        let (tx, _rx) = mpsc::channel(32);
        let request = StreamRequest {
            max_urls: Some(1),
            ..StreamRequest::new("q")
        };

        pipeline.run(&request, &tx).await.unwrap();

        let prompt = llm.recorded_calls()[0][0].content.clone().unwrap_or_default();
        assert_eq!(prompt.matches('é').count(), ARTICLE_EXCERPT_CHARS);
    }

    #[tokio::test]
    async fn invalid_outline_reports_error_event() {
        let pipeline = MapPipeline::new(
            Arc::new(MockSearch),
            Arc::new(MockFetch::default()),
            Arc::new(MockCompletion::new().with_json_reply(r#"{"categories": []}"#)),
            MapressConfig::default(),
        );
        let (tx, rx) = mpsc::channel(32);

        let err = pipeline
            .run(&StreamRequest::new("q"), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Outline(OutlineError::Invalid(_))));

        drop(tx);
        let events = drain(rx);
        match events.last() {
            Some(ProgressEvent::Error { message }) => assert!(message.contains("categories")),
            other => panic!("expected error event, got {other:?}"),
        }
        assert!(!kinds(&events).contains(&"graph".to_string()));
    }

    #[tokio::test]
    async fn llm_failure_reports_error_event() {
        let pipeline = MapPipeline::new(
            Arc::new(MockSearch),
            Arc::new(MockFetch::default()),
            Arc::new(MockCompletion::new().with_json_failure(429)),
            MapressConfig::default(),
        );
        let (tx, rx) = mpsc::channel(32);

        let err = pipeline
            .run(&StreamRequest::new("q"), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Llm(LlmError::Api { status: 429, .. })));

        drop(tx);
        match drain(rx).last() {
            Some(ProgressEvent::Error { message }) => assert!(message.starts_with("LLM 429")),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_receiver_cancels() {
        let llm = Arc::new(MockCompletion::new());
        let pipeline = MapPipeline::new(
            Arc::new(MockSearch),
            Arc::new(MockFetch::default()),
            llm.clone(),
            MapressConfig::default(),
        );
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = pipeline
            .run(&StreamRequest::new("q"), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(llm.recorded_calls().is_empty());
    }
}
