//! The agent loop.
//!
//! One prompt is one run of [`AgentRuntime::prompt`]: stream a model
//! response, execute any requested tools sequentially under fail-fast
//! rules, feed the results back, and repeat until the model stops asking
//! for tools or the turn cap is reached.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;

use cl_domain::cancel::CancelToken;
use cl_domain::config::Config;
use cl_domain::error::{Error, Result};
use cl_domain::history::{ContentBlock, HistoryEntry, ToolResultBlock};
use cl_domain::stream::StreamEvent;
use cl_providers::{ChatRequest, LlmProvider};
use cl_tools::{ToolOutcome, ToolRegistry};

use crate::broker::EventBroker;

use super::accumulator::BlockAccumulator;
use super::events::{AgentEvent, StatusState};
use super::session::Session;

pub struct AgentRuntime {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    broker: Arc<EventBroker>,
    session: Arc<Session>,
    system_prompt: String,
    model: String,
    max_tokens: u32,
    max_turns: usize,
}

impl AgentRuntime {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        broker: Arc<EventBroker>,
        session: Arc<Session>,
        config: &Config,
    ) -> Self {
        Self {
            provider,
            tools,
            broker,
            session,
            system_prompt: config.agent.system_prompt.clone(),
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            max_turns: config.agent.max_turns,
        }
    }

    /// Run one prompt to completion.
    ///
    /// Completes normally when the model stops asking for tools or the
    /// turn cap is hit; errors on transport failure, cancellation, or a
    /// prompt already in flight. A rejected prompt touches neither the
    /// history nor the event stream beyond the busy status.
    pub async fn prompt(&self, text: String) -> Result<()> {
        let _permit = match self.session.try_begin() {
            Ok(p) => p,
            Err(e) => {
                self.broker.publish(AgentEvent::status_message(
                    StatusState::Error,
                    e.to_string(),
                ));
                return Err(e);
            }
        };
        let cancel = self.session.arm_cancel();

        self.broker.publish(AgentEvent::User {
            content: text.clone(),
        });
        self.session.append(HistoryEntry::User { content: text });

        let result = self.run_turns(&cancel).await;
        match &result {
            Ok(()) => self.broker.publish(AgentEvent::status(StatusState::Idle)),
            Err(e) => self.broker.publish(AgentEvent::status_message(
                StatusState::Error,
                e.to_string(),
            )),
        }

        self.session.clear_cancel();
        result
    }

    // ── Turn loop ──────────────────────────────────────────────────

    async fn run_turns(&self, cancel: &CancelToken) -> Result<()> {
        for turn in 1..=self.max_turns {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            tracing::debug!(turn, "turn started");
            self.broker.publish(AgentEvent::status(StatusState::Thinking));

            let blocks = self.stream_assistant_turn(cancel).await?;
            self.session.append(HistoryEntry::Assistant {
                blocks: blocks.clone(),
            });

            let tool_uses: Vec<(String, String, Value)> = blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.clone(), name.clone(), input.clone()))
                    }
                    _ => None,
                })
                .collect();

            if tool_uses.is_empty() {
                return Ok(());
            }

            let results = self.execute_tools(&tool_uses, cancel).await;
            if !results.is_empty() {
                self.session.append(HistoryEntry::ToolResults { results });
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }

        tracing::debug!(max_turns = self.max_turns, "turn cap reached");
        Ok(())
    }

    // ── Streaming ──────────────────────────────────────────────────

    /// Consume one model response, emitting complete text and reasoning
    /// blocks as they close. Tool-use blocks are recorded for execution;
    /// their events are emitted when (and only if) they run.
    async fn stream_assistant_turn(&self, cancel: &CancelToken) -> Result<Vec<ContentBlock>> {
        let req = ChatRequest {
            history: self.session.snapshot(),
            tools: self.tools.specs(),
            system: self.system_prompt.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        };

        let mut stream = self.provider.chat_stream(&req).await?;
        let mut acc = BlockAccumulator::new();

        while let Some(item) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match item? {
                StreamEvent::MessageStart => {}
                StreamEvent::BlockStart { index, kind } => acc.start(index, kind),
                StreamEvent::Delta { index, fragment } => acc.delta(index, &fragment),
                StreamEvent::BlockStop { index } => {
                    match acc.stop(index) {
                        Some(ContentBlock::Text { text }) => {
                            self.broker.publish(AgentEvent::Text { content: text });
                        }
                        Some(ContentBlock::Reasoning { text }) => {
                            self.broker
                                .publish(AgentEvent::Reasoning { content: text });
                        }
                        Some(ContentBlock::ToolUse { .. }) | None => {}
                    }
                }
                StreamEvent::MessageStop => break,
                StreamEvent::Error { message } => return Err(Error::Stream(message)),
            }
        }

        Ok(acc.into_blocks())
    }

    // ── Tool execution ─────────────────────────────────────────────

    /// Run the turn's tool calls sequentially, in response order.
    ///
    /// Fail-fast: the first error result (including an unknown tool name)
    /// stops the batch; later calls run no code and emit no events. The
    /// returned results answer exactly the calls that were reached.
    async fn execute_tools(
        &self,
        uses: &[(String, String, Value)],
        cancel: &CancelToken,
    ) -> Vec<ToolResultBlock> {
        let mut results = Vec::new();

        for (id, name, input) in uses {
            if cancel.is_cancelled() {
                break;
            }

            self.broker.publish(AgentEvent::ToolCall {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            });

            let outcome = match self.tools.get(name) {
                // No running_tool status for a synthesised failure: nothing runs.
                None => ToolOutcome::error(format!("unknown tool {name}")),
                Some(tool) => {
                    self.broker.publish(AgentEvent::status_message(
                        StatusState::RunningTool,
                        name.clone(),
                    ));
                    let input = input.clone();
                    let token = cancel.clone();
                    let handle =
                        tokio::spawn(async move { tool.run(input, &token).await });
                    match handle.await {
                        Ok(outcome) => outcome,
                        // A panicking tool is folded into an error result
                        // so the model can react.
                        Err(e) => {
                            tracing::warn!(tool = %name, error = %e, "tool task aborted");
                            ToolOutcome::error(format!("tool '{name}' aborted: {e}"))
                        }
                    }
                }
            };

            self.broker.publish(AgentEvent::ToolResult {
                id: id.clone(),
                result: outcome.content.clone(),
                is_error: outcome.is_error,
            });
            results.push(ToolResultBlock {
                tool_use_id: id.clone(),
                content: outcome.content,
                is_error: outcome.is_error,
            });

            if results.last().is_some_and(|r| r.is_error) {
                break;
            }
        }

        results
    }
}
