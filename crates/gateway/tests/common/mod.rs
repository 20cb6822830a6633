//! Shared test harness: a scripted in-memory provider and helpers for
//! driving the runtime and inspecting the event stream.
#![allow(dead_code)] // each test binary uses a different subset

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use cl_domain::error::{Error, Result};
use cl_domain::stream::{BlockKind, BoxStream, StreamEvent};
use cl_gateway::broker::{EventBroker, Subscription};
use cl_gateway::runtime::{AgentRuntime, Session};
use cl_providers::{ChatRequest, LlmProvider};
use cl_tools::ToolRegistry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Replays a fixed script of per-turn event streams. Each call to
/// `chat_stream` pops the next turn; running out of script is an error
/// so an unexpected extra LLM request fails the test loudly.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Vec<Result<StreamEvent>>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Vec<StreamEvent>>) -> Self {
        Self::with_results(turns.into_iter().map(|t| t.into_iter().map(Ok).collect()).collect())
    }

    pub fn with_results(turns: Vec<Vec<Result<StreamEvent>>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of LLM requests the runtime issued.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The history snapshot sent with request `idx`.
    pub fn request(&self, idx: usize) -> ChatRequest {
        self.requests.lock()[idx].clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(req.clone());
        let turn = self
            .turns
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Other("scripted provider exhausted".into()))?;
        Ok(Box::pin(futures_util::stream::iter(turn)))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

// ── Script builders ─────────────────────────────────────────────────

/// A turn containing a single text block.
pub fn text_turn(text: &str) -> Vec<StreamEvent> {
    vec![
        StreamEvent::MessageStart,
        StreamEvent::BlockStart {
            index: 0,
            kind: BlockKind::Text,
        },
        StreamEvent::Delta {
            index: 0,
            fragment: text.to_string(),
        },
        StreamEvent::BlockStop { index: 0 },
        StreamEvent::MessageStop,
    ]
}

/// A turn requesting the given tool calls, input streamed as JSON deltas.
pub fn tool_turn(calls: &[(&str, &str, Value)]) -> Vec<StreamEvent> {
    let mut events = vec![StreamEvent::MessageStart];
    for (index, (id, name, input)) in calls.iter().enumerate() {
        events.push(StreamEvent::BlockStart {
            index,
            kind: BlockKind::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
            },
        });
        events.push(StreamEvent::Delta {
            index,
            fragment: input.to_string(),
        });
        events.push(StreamEvent::BlockStop { index });
    }
    events.push(StreamEvent::MessageStop);
    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Harness {
    pub runtime: Arc<AgentRuntime>,
    pub session: Arc<Session>,
    pub broker: Arc<EventBroker>,
    pub provider: Arc<ScriptedProvider>,
}

impl Harness {
    pub fn new(provider: ScriptedProvider) -> Self {
        Self::with_max_turns(provider, 10)
    }

    pub fn with_max_turns(provider: ScriptedProvider, max_turns: usize) -> Self {
        let mut config = cl_domain::config::Config::default();
        config.agent.max_turns = max_turns;

        let provider = Arc::new(provider);
        let broker = Arc::new(EventBroker::new());
        let session = Arc::new(Session::new());
        let runtime = Arc::new(AgentRuntime::new(
            provider.clone(),
            Arc::new(ToolRegistry::builtin()),
            broker.clone(),
            session.clone(),
            &config,
        ));

        Self {
            runtime,
            session,
            broker,
            provider,
        }
    }

    pub fn subscribe(&self) -> Subscription {
        self.broker.subscribe()
    }
}

/// Drain everything currently buffered in a subscription.
pub fn drain(sub: &mut Subscription) -> Vec<Value> {
    let mut events = Vec::new();
    while let Some(frame) = sub.try_recv() {
        events.push(serde_json::from_str(&frame).expect("frame is JSON"));
    }
    events
}

/// Compact signature of an event sequence for order assertions:
/// `status` events render as `status:<state>`, others as their type.
pub fn signature(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| {
            let kind = e["type"].as_str().unwrap();
            if kind == "status" {
                format!("status:{}", e["state"].as_str().unwrap())
            } else {
                kind.to_string()
            }
        })
        .collect()
}
