//! Anthropic Messages adapter.
//!
//! Translates the session history into the Messages API wire format and
//! maps the streaming SSE protocol (`message_start`, `content_block_*`,
//! `message_stop`) onto the provider-agnostic [`StreamEvent`] alphabet.

use crate::sse::sse_response_stream;
use crate::traits::{ChatRequest, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use cl_domain::config::LlmConfig;
use cl_domain::error::{Error, Result};
use cl_domain::history::{ContentBlock, HistoryEntry};
use cl_domain::stream::{BlockKind, BoxStream, StreamEvent};
use cl_domain::tool::ToolSpec;
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Streaming provider backed by the Anthropic Messages API.
pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a provider from the LLM config section; the API key is read
    /// from the configured environment variable.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.api_key_env)?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "anthropic".into(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_messages_body(req: &ChatRequest) -> Value {
    let messages: Vec<Value> = req.history.iter().map(entry_to_anthropic).collect();

    let mut body = serde_json::json!({
        "model": req.model,
        "max_tokens": req.max_tokens,
        "messages": messages,
        "stream": true,
    });

    if !req.system.is_empty() {
        body["system"] = Value::String(req.system.clone());
    }

    if !req.tools.is_empty() {
        let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
        body["tools"] = Value::Array(tools);
    }

    body
}

fn entry_to_anthropic(entry: &HistoryEntry) -> Value {
    match entry {
        HistoryEntry::User { content } => serde_json::json!({
            "role": "user",
            "content": content,
        }),
        HistoryEntry::Assistant { blocks } => {
            // Reasoning blocks are opaque to us and are not replayed:
            // the API rejects unsigned thinking blocks on resubmission.
            let content: Vec<Value> = blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(serde_json::json!({
                        "type": "text",
                        "text": text,
                    })),
                    ContentBlock::ToolUse { id, name, input } => Some(serde_json::json!({
                        "type": "tool_use",
                        "id": id,
                        "name": name,
                        "input": input,
                    })),
                    ContentBlock::Reasoning { .. } => None,
                })
                .collect();
            serde_json::json!({
                "role": "assistant",
                "content": content,
            })
        }
        HistoryEntry::ToolResults { results } => {
            // Tool results travel as user messages with tool_result blocks.
            let content: Vec<Value> = results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": r.tool_use_id,
                        "content": r.content,
                        "is_error": r.is_error,
                    })
                })
                .collect();
            serde_json::json!({
                "role": "user",
                "content": content,
            })
        }
    }
}

fn tool_to_anthropic(tool: &ToolSpec) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming SSE parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse one Anthropic SSE data payload into zero or more stream events.
///
/// The mapping is direct; block accumulation happens downstream in the
/// agent loop, keyed on the index carried by every block event.
fn parse_anthropic_sse(data: &str) -> Vec<Result<StreamEvent>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let event_type = v.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let index = || v.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;

    match event_type {
        "message_start" => vec![Ok(StreamEvent::MessageStart)],

        "content_block_start" => {
            let block = match v.get("content_block") {
                Some(b) => b,
                None => return Vec::new(),
            };
            let kind = match block.get("type").and_then(|v| v.as_str()).unwrap_or("") {
                "text" => BlockKind::Text,
                "thinking" => BlockKind::Reasoning,
                "tool_use" => BlockKind::ToolUse {
                    id: block
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    name: block
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                },
                other => {
                    tracing::debug!(block_type = other, "ignoring unknown content block type");
                    return Vec::new();
                }
            };
            vec![Ok(StreamEvent::BlockStart {
                index: index(),
                kind,
            })]
        }

        "content_block_delta" => {
            let delta = match v.get("delta") {
                Some(d) => d,
                None => return Vec::new(),
            };
            let fragment = match delta.get("type").and_then(|v| v.as_str()).unwrap_or("") {
                "text_delta" => delta.get("text").and_then(|v| v.as_str()),
                "thinking_delta" => delta.get("thinking").and_then(|v| v.as_str()),
                "input_json_delta" => delta.get("partial_json").and_then(|v| v.as_str()),
                _ => None,
            };
            match fragment {
                Some(f) if !f.is_empty() => vec![Ok(StreamEvent::Delta {
                    index: index(),
                    fragment: f.to_string(),
                })],
                _ => Vec::new(),
            }
        }

        "content_block_stop" => vec![Ok(StreamEvent::BlockStop { index: index() })],

        "message_stop" => vec![Ok(StreamEvent::MessageStop)],

        "error" => {
            let msg = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            vec![Ok(StreamEvent::Error {
                message: msg.to_string(),
            })]
        }

        // ping, message_delta, and unknown event types carry nothing the
        // loop needs.
        _ => Vec::new(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = build_messages_body(req);

        tracing::debug!(provider = %self.id, model = %req.model, "anthropic stream request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        Ok(sse_response_stream(resp, parse_anthropic_sse))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
