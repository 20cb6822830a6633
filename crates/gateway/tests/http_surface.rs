//! HTTP surface tests against a real listener: prompt validation, SSE
//! framing, CORS preflight, and cancel semantics.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;

use cl_gateway::api;
use cl_gateway::broker::EventBroker;
use cl_gateway::runtime::{AgentRuntime, Session};
use cl_gateway::state::AppState;
use cl_tools::ToolRegistry;
use common::{text_turn, ScriptedProvider};

/// Bind the app on an ephemeral port and return its base URL.
async fn serve(provider: ScriptedProvider) -> String {
    let config = Arc::new(cl_domain::config::Config::default());
    let broker = Arc::new(EventBroker::new());
    let session = Arc::new(Session::new());
    let runtime = Arc::new(AgentRuntime::new(
        Arc::new(provider),
        Arc::new(ToolRegistry::builtin()),
        broker.clone(),
        session.clone(),
        &config,
    ));
    let state = AppState {
        config,
        broker,
        session,
        runtime,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

/// Read SSE frames (data payloads and comments) until `until` matches a
/// data frame or the deadline passes.
async fn read_sse_until(
    response: reqwest::Response,
    until: impl Fn(&Value) -> bool,
    deadline: Duration,
) -> (Vec<String>, Vec<Value>) {
    let mut comments = Vec::new();
    let mut events = Vec::new();
    let mut buffer = String::new();
    let mut body = response.bytes_stream();

    let read = async {
        while let Some(chunk) = body.next().await {
            buffer.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            while let Some(pos) = buffer.find("\n\n") {
                let frame: String = buffer.drain(..pos + 2).collect();
                for line in frame.lines() {
                    if let Some(data) = line.strip_prefix("data: ") {
                        let event: Value = serde_json::from_str(data).unwrap();
                        let done = until(&event);
                        events.push(event);
                        if done {
                            return;
                        }
                    } else if let Some(comment) = line.strip_prefix(": ") {
                        comments.push(comment.to_string());
                    }
                }
            }
        }
    };
    tokio::time::timeout(deadline, read).await.ok();

    (comments, events)
}

#[tokio::test]
async fn prompt_flows_through_the_event_stream() {
    let base = serve(ScriptedProvider::new(vec![text_turn("hello")])).await;
    let client = reqwest::Client::new();

    // Subscribe first; only events after subscription are delivered.
    let events_resp = client.get(format!("{base}/events")).send().await.unwrap();
    assert_eq!(events_resp.status(), 200);
    assert!(events_resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let reader = tokio::spawn(read_sse_until(
        events_resp,
        |e| e["type"] == "status" && e["state"] == "idle",
        Duration::from_secs(5),
    ));

    // Give the subscription a beat to register.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = client
        .post(format!("{base}/prompt"))
        .json(&serde_json::json!({ "content": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "accepted");

    let (comments, events) = reader.await.unwrap();
    assert_eq!(comments.first().map(String::as_str), Some("connected"));

    let kinds: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["user", "status", "text", "status"]);
    assert_eq!(events[0]["content"], "hi");
    assert_eq!(events[2]["content"], "hello");
    assert!(events.iter().all(|e| e["timestamp"].is_i64()));
}

#[tokio::test]
async fn empty_and_malformed_prompts_are_rejected() {
    let base = serve(ScriptedProvider::new(vec![])).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/prompt"))
        .json(&serde_json::json!({ "content": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("must not be empty"));

    let resp = client
        .post(format!("{base}/prompt"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{base}/prompt"))
        .json(&serde_json::json!({ "wrong_key": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn cancel_is_always_ok() {
    let base = serve(ScriptedProvider::new(vec![])).await;
    let client = reqwest::Client::new();

    // Nothing in flight: still 200, flagged as a no-op.
    let resp = client.post(format!("{base}/cancel")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn preflight_gets_permissive_cors() {
    let base = serve(ScriptedProvider::new(vec![])).await;
    let client = reqwest::Client::new();

    let resp = client
        .request(reqwest::Method::OPTIONS, format!("{base}/prompt"))
        .header("origin", "http://example.com")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .unwrap()
            .to_str()
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn health_probe_answers() {
    let base = serve(ScriptedProvider::new(vec![])).await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
