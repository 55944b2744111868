//! Tool-calling topic-map generation
//!
//! The model drives its own research through two tools, `searchNews` and
//! `fetchAndParse`, until it answers with a JSON topic map.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info, warn};

use super::llm::{
    ChatMessage, CompletionClient, LlmError, SYSTEM_MAP_PROMPT, ToolCall, map_tools,
};
use super::{AdapterError, FetchAdapter, SearchAdapter};
use crate::config::MapressConfig;
use crate::export::now_timestamp;
use crate::parser::truncate_chars;
use crate::topic_map::{MAX_SOURCES_RANGE, MapRequest, TopicMap, TopicMapBody};

/// URLs fetched by the fallback path.
pub const FALLBACK_MAX_DOCS: usize = 5;
/// Characters of each article handed to the model by the fallback path.
pub const FALLBACK_EXCERPT_CHARS: usize = 2000;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("No content in final LLM response")]
    EmptyResponse,

    #[error("LLM response is not valid JSON: {0}")]
    Malformed(String),

    #[error("Max tool iterations ({0}) reached without completion")]
    MaxIterations(usize),
}

#[derive(Clone)]
pub struct TopicMapAgent {
    search: Arc<dyn SearchAdapter>,
    fetch: Arc<dyn FetchAdapter>,
    llm: Arc<dyn CompletionClient>,
    max_iterations: usize,
}

impl TopicMapAgent {
    pub fn new(
        search: Arc<dyn SearchAdapter>,
        fetch: Arc<dyn FetchAdapter>,
        llm: Arc<dyn CompletionClient>,
        config: &MapressConfig,
    ) -> Self {
        Self {
            search,
            fetch,
            llm,
            max_iterations: config.max_tool_iterations,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run the tool-calling loop until the model returns a map.
    pub async fn generate(&self, request: &MapRequest) -> Result<TopicMap, AgentError> {
        let tools = map_tools();
        let mut messages = vec![ChatMessage::user(format!(
            "Create a topic map for: \"{}\". Use searchNews to find sources, then fetchAndParse to get content. Return JSON with nodes and edges.",
            request.prompt
        ))];

        for iteration in 0..self.max_iterations {
            let completion = self
                .llm
                .complete_with_tools(SYSTEM_MAP_PROMPT, &messages, &tools)
                .await?;

            if completion.tool_calls.is_empty() {
                let content = completion
                    .content
                    .filter(|content| !content.trim().is_empty())
                    .ok_or(AgentError::EmptyResponse)?;
                info!(iterations = iteration, "topic map generated");
                return parse_map(&content, request);
            }

            let results = join_all(
                completion
                    .tool_calls
                    .iter()
                    .map(|call| self.execute_tool(call, request)),
            )
            .await;

            messages.push(ChatMessage::assistant_tool_calls(
                completion.content,
                completion.tool_calls,
            ));
            messages.extend(results);
        }

        Err(AgentError::MaxIterations(self.max_iterations))
    }

    /// Single JSON-mode call over a handful of pre-fetched articles.
    pub async fn generate_fallback(&self, request: &MapRequest) -> Result<TopicMap, AgentError> {
        let urls = self
            .search
            .search(&request.prompt, request.max_sources)
            .await?;

        let mut sources = Vec::new();
        for url in urls.iter().take(FALLBACK_MAX_DOCS) {
            match self.fetch.fetch(url).await {
                Ok(doc) => sources.push(format!(
                    "[{}] {} ({})\n{}",
                    sources.len() + 1,
                    doc.title,
                    url,
                    truncate_chars(&doc.markdown, FALLBACK_EXCERPT_CHARS)
                )),
                Err(err) => warn!(url = %url, error = %err, "skipping source in fallback"),
            }
        }

        let user = format!(
            "Create a topic map for: \"{}\"\n\nSources:\n{}",
            request.prompt,
            sources.join("\n\n")
        );
        let raw = self
            .llm
            .complete_json(SYSTEM_MAP_PROMPT, &[ChatMessage::user(user)])
            .await?;
        parse_map(&raw, request)
    }

    /// Tool loop, then fallback, then a placeholder map. Never fails.
    pub async fn generate_or_placeholder(&self, request: &MapRequest) -> TopicMap {
        let map = match self.generate(request).await {
            Ok(map) => map,
            Err(err) => {
                warn!(error = %err, "tool calling failed, trying fallback");
                match self.generate_fallback(request).await {
                    Ok(map) => map,
                    Err(err) => {
                        error!(error = %err, "fallback generation failed");
                        TopicMap::generation_failed(&request.prompt, request.depth, now_timestamp())
                    }
                }
            }
        };

        if map.nodes.is_empty() {
            return TopicMap::no_content(&request.prompt, request.depth, now_timestamp());
        }
        map
    }

    async fn execute_tool(&self, call: &ToolCall, request: &MapRequest) -> ChatMessage {
        let start = Instant::now();
        let name = call.function.name.as_str();

        let outcome = match serde_json::from_str::<Value>(&call.function.arguments) {
            Ok(args) => self.run_tool(name, &args, request).await,
            Err(err) => Err(format!("invalid tool arguments: {err}")),
        };

        let ok = outcome.is_ok();
        let content = match outcome {
            Ok(data) => data.to_string(),
            Err(message) => json!({ "error": message }).to_string(),
        };

        info!(
            tool = name,
            duration_ms = start.elapsed().as_millis() as u64,
            ok,
            bytes = content.len(),
            "tool call"
        );
        ChatMessage::tool_result(call.id.clone(), content)
    }

    async fn run_tool(&self, name: &str, args: &Value, request: &MapRequest) -> Result<Value, String> {
        match name {
            "searchNews" => {
                let query = args
                    .get("query")
                    .and_then(Value::as_str)
                    .ok_or("missing query")?;
                let max = args
                    .get("maxSources")
                    .and_then(Value::as_u64)
                    .map(|n| n as usize)
                    .unwrap_or(request.max_sources)
                    .clamp(*MAX_SOURCES_RANGE.start(), *MAX_SOURCES_RANGE.end());
                let urls = self
                    .search
                    .search(query, max)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(json!(urls))
            }
            "fetchAndParse" => {
                let url = args
                    .get("url")
                    .and_then(Value::as_str)
                    .ok_or("missing url")?;
                let doc = self.fetch.fetch(url).await.map_err(|e| e.to_string())?;
                Ok(json!({ "title": doc.title, "content": doc.markdown, "url": url }))
            }
            other => Err(format!("Unknown tool: {other}")),
        }
    }
}

fn parse_map(content: &str, request: &MapRequest) -> Result<TopicMap, AgentError> {
    let body: TopicMapBody =
        serde_json::from_str(content).map_err(|e| AgentError::Malformed(e.to_string()))?;
    let map = body.into_map(request, now_timestamp());
    if let Err(err) = map.validate() {
        warn!(error = %err, "topic map does not meet content limits");
    }
    Ok(map)
}
