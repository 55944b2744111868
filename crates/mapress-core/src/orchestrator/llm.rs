//! OpenRouter chat-completions client, message types and prompts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::MapressConfig;

pub const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const REFERER: &str = "https://mapress.local/";
const APP_TITLE: &str = "Mapress";
const TEMPERATURE: f32 = 0.1;

pub const SYSTEM_OUTLINE_PROMPT: &str = r#"
You create a citation-backed news outline from multiple articles.

OUTPUT RULES
- Produce 4-7 top-level CATEGORIES about the user's query (node = category).
- Under each category, list 1-4 FACTS with very short titles (<= 6 words).
- Each FACT must have 1-2 bullet points and EVERY bullet must be supported by at least one source URL from the provided set.
- Prefer facts corroborated by >=2 distinct sources; if conflicting information appears, keep separate facts with distinct citations.
- Keep depth <= 2 (category -> facts). Total nodes (categories + facts) <= MAX_NODES.
- Return VALID JSON matching the provided schema exactly. If data is insufficient, return fewer categories/facts; never invent URLs.

SCHEMA:
{
  "query": string,
  "generatedAt": string,
  "categories": [
    {
      "title": string,
      "facts": [
        {
          "title": string,
          "bullets": string[],
          "sources": [{ "url": string, "outlet"?: string, "quote"?: string }]
        }
      ],
      "sources"?: [{ "url": string, "outlet"?: string }]
    }
  ]
}"#;

pub const SYSTEM_MAP_PROMPT: &str = r#"
You create comprehensive topic maps from news sources. Use searchNews to find sources, then fetchAndParse to get content.

Return JSON with this structure:
{
  "nodes": {
    "id1": {
      "id": "id1",
      "title": "Category Name",
      "summary": "Detailed summary with comprehensive analysis and context (up to 2000 characters)",
      "citations": [{"url": "https://example.com", "title": "Article Title", "publishedAt": "2024-01-15"}],
      "keyPoints": ["Key point 1", "Key point 2", "Key point 3"],
      "context": "Historical context and background information",
      "implications": "What this means for the future and broader implications",
      "relatedTopics": ["Technology", "Politics"]
    }
  },
  "edges": [{"from": "id1", "to": "id2", "label": "Relationship description"}]
}

Requirements:
- 3-5 main categories with comprehensive analysis
- Each category needs multiple citations from diverse sources
- Summaries should be detailed, analytical, and provide context
- Include key points, context, implications, and related topics
- relatedTopics should name one of: Technology, Politics, Economy, International, Society, Science
- Use the tools to gather real content first
- Make connections between topics explicit with labeled edges"#;

/// LLM call failure.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing API key or model
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("LLM {status} {body}")]
    Api { status: u16, body: String },

    /// Unexpected response shape
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments as produced by the model.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.to_string(),
            },
        }
    }
}

/// One message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    /// Assistant turn that requested tool calls.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The first choice of a completion response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

impl CompletionResponse {
    fn into_completion(self) -> Result<ChatCompletion, LlmError> {
        let message = self
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::Parse("No message in LLM response".into()))?;

        Ok(ChatCompletion {
            content: message.content,
            tool_calls: message.tool_calls.unwrap_or_default(),
            usage: self.usage,
        })
    }
}

/// Tool definitions offered to the topic-map agent.
pub fn map_tools() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": "searchNews",
                "description": "Search for fresh, diverse news sources on a topic",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Search query for news articles"},
                        "maxSources": {
                            "type": "number",
                            "description": "Maximum number of sources to return (default: 8)",
                            "default": 8
                        },
                        "recencyDays": {
                            "type": "number",
                            "description": "Maximum age of articles in days (default: 7)",
                            "default": 7
                        }
                    },
                    "required": ["query"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "fetchAndParse",
                "description": "Fetch and parse content from a URL",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "URL to fetch and parse"}
                    },
                    "required": ["url"]
                }
            }
        }),
    ]
}

/// A chat-completions backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// JSON-mode completion; returns the raw content of the first choice.
    async fn complete_json(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError>;

    /// Completion with tools offered under `tool_choice: auto`.
    async fn complete_with_tools(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<ChatCompletion, LlmError>;
}

/// OpenRouter chat-completions client.
///
/// Key and model are optional at construction and checked on every call.
#[derive(Clone)]
pub struct OpenRouterClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    model: Option<String>,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(api_key: Option<String>, model: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key,
            model,
            endpoint: OPENROUTER_ENDPOINT.to_string(),
        }
    }

    pub fn from_config(config: &MapressConfig) -> Self {
        Self::new(config.openrouter_api_key.clone(), config.model.clone())
    }

    /// Point at a different chat-completions URL (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn credentials(&self) -> Result<(&str, &str), LlmError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Config("Missing OPENROUTER_API_KEY".into()))?;
        let model = self
            .model
            .as_deref()
            .ok_or_else(|| LlmError::Config("Missing MODEL".into()))?;
        Ok((key, model))
    }

    async fn send(&self, key: &str, body: &Value) -> Result<ChatCompletion, LlmError> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {key}"))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", REFERER)
            .header("X-Title", APP_TITLE)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "LLM request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "LLM API error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let completion = parsed.into_completion()?;
        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            tool_calls = completion.tool_calls.len(),
            total_tokens = completion.usage.as_ref().map(|u| u.total_tokens),
            "LLM completion"
        );
        Ok(completion)
    }
}

fn with_system(system: &str, messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut all = Vec::with_capacity(messages.len() + 1);
    all.push(ChatMessage::system(system));
    all.extend_from_slice(messages);
    all
}

fn json_mode_body(model: &str, system: &str, messages: &[ChatMessage]) -> Value {
    json!({
        "model": model,
        "messages": with_system(system, messages),
        "response_format": {"type": "json_object"},
        "temperature": TEMPERATURE,
    })
}

fn tool_mode_body(model: &str, system: &str, messages: &[ChatMessage], tools: &[Value]) -> Value {
    json!({
        "model": model,
        "messages": with_system(system, messages),
        "tools": tools,
        "tool_choice": "auto",
        "temperature": TEMPERATURE,
    })
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete_json(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let (key, model) = self.credentials()?;
        let body = json_mode_body(model, system, messages);
        self.send(key, &body)
            .await?
            .content
            .ok_or_else(|| LlmError::Parse("No content in LLM response".into()))
    }

    async fn complete_with_tools(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<ChatCompletion, LlmError> {
        let (key, model) = self.credentials()?;
        let body = tool_mode_body(model, system, messages, tools);
        self.send(key, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_mode_body_prepends_system_prompt() {
        let body = json_mode_body("x-ai/grok-4", "SYS", &[ChatMessage::user("hello")]);

        assert_eq!(body["model"], "x-ai/grok-4");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "SYS");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body["messages"][1].get("tool_calls").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn tool_mode_body_offers_tools() {
        let body = tool_mode_body("m", "SYS", &[ChatMessage::user("hi")], &map_tools());

        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "searchNews");
        assert_eq!(body["tools"][1]["function"]["name"], "fetchAndParse");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn tool_messages_serialize_with_call_ids() {
        let call = ToolCall::new("call_1", "searchNews", json!({"query": "ai"}));
        let assistant = serde_json::to_value(ChatMessage::assistant_tool_calls(
            None,
            vec![call],
        ))
        .unwrap();
        assert_eq!(assistant["tool_calls"][0]["type"], "function");
        assert_eq!(
            assistant["tool_calls"][0]["function"]["arguments"],
            r#"{"query":"ai"}"#
        );
        assert!(assistant["content"].is_null());

        let result = serde_json::to_value(ChatMessage::tool_result("call_1", "[]")).unwrap();
        assert_eq!(result["role"], "tool");
        assert_eq!(result["tool_call_id"], "call_1");
    }

    #[test]
    fn parses_tool_call_response() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "fetchAndParse", "arguments": "{\"url\":\"https://a.com\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });

        let parsed: CompletionResponse = serde_json::from_value(raw).unwrap();
        let completion = parsed.into_completion().unwrap();
        assert!(completion.content.is_none());
        assert_eq!(completion.tool_calls[0].function.name, "fetchAndParse");
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn empty_choices_is_a_parse_error() {
        let parsed: CompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            parsed.into_completion(),
            Err(LlmError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let client = OpenRouterClient::new(None, Some("m".into()));
        let err = client
            .complete_json("SYS", &[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Config(ref msg) if msg.contains("OPENROUTER_API_KEY")));

        let client = OpenRouterClient::new(Some("sk".into()), None);
        let err = client
            .complete_with_tools("SYS", &[], &map_tools())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Config(ref msg) if msg.contains("MODEL")));
    }
}
