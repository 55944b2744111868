//! In-process adapters backed by the bundled sample fixtures

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::llm::{ChatCompletion, ChatMessage, CompletionClient, LlmError, ToolCall};
use super::{AdapterError, FetchAdapter, SearchAdapter};
use crate::parser::{FetchedDocument, parse_document_bundle};
use crate::url_utils::display_host;
use crate::{SAMPLE_DOCS_JSON, SAMPLE_OUTLINE_JSON};

fn sample_documents() -> Result<Vec<FetchedDocument>, AdapterError> {
    parse_document_bundle(SAMPLE_DOCS_JSON).map_err(|e| AdapterError::Parse(e.to_string()))
}

/// Returns the URLs of the sample documents.
#[derive(Debug, Clone, Default)]
pub struct MockSearch;

#[async_trait]
impl SearchAdapter for MockSearch {
    async fn search(&self, _query: &str, max: usize) -> Result<Vec<String>, AdapterError> {
        Ok(sample_documents()?
            .into_iter()
            .map(|doc| doc.url)
            .take(max)
            .collect())
    }
}

/// Serves the sample documents; other URLs get a generated stand-in article.
#[derive(Debug, Clone, Default)]
pub struct MockFetch {
    failing: Vec<String>,
}

impl MockFetch {
    /// Make fetches of `url` fail with a 502.
    pub fn failing_on(mut self, url: impl Into<String>) -> Self {
        self.failing.push(url.into());
        self
    }
}

#[async_trait]
impl FetchAdapter for MockFetch {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, AdapterError> {
        if self.failing.iter().any(|u| u == url) {
            return Err(AdapterError::Status {
                operation: "fetch",
                status: 502,
            });
        }

        let known = sample_documents()?.into_iter().find(|doc| doc.url == url);
        Ok(known.unwrap_or_else(|| FetchedDocument {
            url: url.to_string(),
            title: format!("Article from {}", display_host(url)),
            markdown: format!("# Mock Article Content\n\nThis is a mock article fetched from {url}."),
        }))
    }
}

/// Scripted completion client.
///
/// JSON mode always answers with the configured reply (the sample outline by
/// default). Tool mode plays back queued completions in order and fails once
/// the queue is empty. Every call's messages are recorded.
pub struct MockCompletion {
    json_reply: Result<String, u16>,
    tool_script: Mutex<VecDeque<ChatCompletion>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCompletion {
    pub fn new() -> Self {
        Self {
            json_reply: Ok(SAMPLE_OUTLINE_JSON.to_string()),
            tool_script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_json_reply(mut self, reply: impl Into<String>) -> Self {
        self.json_reply = Ok(reply.into());
        self
    }

    /// Make JSON-mode calls fail with an API error of the given status.
    pub fn with_json_failure(mut self, status: u16) -> Self {
        self.json_reply = Err(status);
        self
    }

    pub fn then_tool_calls(self, tool_calls: Vec<ToolCall>) -> Self {
        self.push(ChatCompletion {
            content: None,
            tool_calls,
            usage: None,
        })
    }

    pub fn then_content(self, content: impl Into<String>) -> Self {
        self.push(ChatCompletion {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            usage: None,
        })
    }

    fn push(self, completion: ChatCompletion) -> Self {
        if let Ok(mut script) = self.tool_script.lock() {
            script.push_back(completion);
        }
        self
    }

    /// Messages sent on each call so far, system prompt excluded.
    pub fn recorded_calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, messages: &[ChatMessage]) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete_json(
        &self,
        _system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        self.record(messages);
        match &self.json_reply {
            Ok(reply) => Ok(reply.clone()),
            Err(status) => Err(LlmError::Api {
                status: *status,
                body: "mock failure".to_string(),
            }),
        }
    }

    async fn complete_with_tools(
        &self,
        _system: &str,
        messages: &[ChatMessage],
        _tools: &[Value],
    ) -> Result<ChatCompletion, LlmError> {
        self.record(messages);
        self.tool_script
            .lock()
            .map_err(|_| LlmError::Parse("mock script poisoned".into()))?
            .pop_front()
            .ok_or_else(|| LlmError::Parse("mock completion script exhausted".into()))
    }
}
