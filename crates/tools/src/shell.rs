//! Bash tool: run one command under `sh -c` with a wall-clock timeout.
//!
//! Non-zero exit is data, not an error. stdout and stderr are captured
//! separately and each capped at 1 MiB with a trailing marker.

use std::process::Stdio;
use std::time::Duration;

use cl_domain::cancel::CancelToken;
use cl_domain::tool::ToolSpec;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::registry::{parse_input, Tool, ToolOutcome};

/// Per-stream capture cap.
const MAX_STREAM_BYTES: usize = 1024 * 1024;
/// Appended when a stream hit the cap.
const TRUNCATION_MARKER: &str = "\n[truncated]";
/// How often the cancellation token is polled while the child runs.
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Deserialize)]
struct BashRequest {
    command: String,
}

pub struct BashTool {
    timeout: Duration,
    max_stream_bytes: usize,
}

impl Default for BashTool {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_stream_bytes: MAX_STREAM_BYTES,
        }
    }
}

impl BashTool {
    /// Shrunken limits for tests.
    pub fn with_limits(timeout: Duration, max_stream_bytes: usize) -> Self {
        Self {
            timeout,
            max_stream_bytes,
        }
    }
}

#[async_trait::async_trait]
impl Tool for BashTool {
    fn name(&self) -> &'static str {
        "bash"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().into(),
            description: "Run a shell command and return its stdout, stderr, and exit \
                          code. Commands are killed after 30 seconds; each output \
                          stream is capped at 1 MiB."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Command line for sh -c" }
                },
                "required": ["command"]
            }),
        }
    }

    async fn run(&self, input: Value, cancel: &CancelToken) -> ToolOutcome {
        let req: BashRequest = match parse_input(input) {
            Ok(r) => r,
            Err(e) => return e,
        };
        if req.command.trim().is_empty() {
            return ToolOutcome::error("command must not be empty");
        }
        if cancel.is_cancelled() {
            return ToolOutcome::error("cancelled");
        }

        let mut child = match Command::new("sh")
            .arg("-c")
            .arg(&req.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => return ToolOutcome::error(format!("failed to spawn: {e}")),
        };

        let stdout_task = capture_stream(child.stdout.take(), self.max_stream_bytes);
        let stderr_task = capture_stream(child.stderr.take(), self.max_stream_bytes);

        enum Exit {
            Done(Option<i32>),
            TimedOut,
            Cancelled,
        }

        let exit = tokio::select! {
            result = child.wait() => match result {
                Ok(status) => Exit::Done(status.code()),
                Err(e) => {
                    return ToolOutcome::error(format!("failed to wait for child: {e}"));
                }
            },
            _ = tokio::time::sleep(self.timeout) => Exit::TimedOut,
            _ = wait_cancelled(cancel) => Exit::Cancelled,
        };

        if !matches!(exit, Exit::Done(_)) {
            let _ = child.kill().await;
        }

        // Readers finish once the child's pipes close.
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        match exit {
            Exit::Done(code) => ToolOutcome::success(serde_json::json!({
                "stdout": stdout,
                "stderr": stderr,
                // None means the child died to a signal.
                "exit_code": code.unwrap_or(-1),
            })),
            Exit::TimedOut => ToolOutcome::error(format!(
                "command timed out after {} seconds",
                self.timeout.as_secs()
            )),
            Exit::Cancelled => ToolOutcome::error("cancelled"),
        }
    }
}

/// Read a child stream to completion, capped at `max_bytes`.
fn capture_stream<R>(
    stream: Option<R>,
    max_bytes: usize,
) -> tokio::task::JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = match stream {
            Some(r) => r,
            None => return String::new(),
        };
        let mut captured: Vec<u8> = Vec::new();
        let mut truncated = false;
        let mut buf = [0u8; 8192];

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if captured.len() < max_bytes {
                        let take = n.min(max_bytes - captured.len());
                        captured.extend_from_slice(&buf[..take]);
                        if take < n {
                            truncated = true;
                        }
                    } else {
                        truncated = true;
                    }
                    // Past the cap we keep draining so the child never
                    // blocks on a full pipe.
                }
                Err(_) => break,
            }
        }

        let mut text = String::from_utf8_lossy(&captured).into_owned();
        if truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    })
}

async fn wait_cancelled(cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        tokio::time::sleep(CANCEL_POLL).await;
    }
}
