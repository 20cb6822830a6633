//! SSE transport decoding shared by provider adapters.
//!
//! An adapter hands [`sse_response_stream`] its HTTP response plus a
//! parser closure mapping each `data:` payload to [`StreamEvent`]s; the
//! decoder below handles the framing, including payloads split across
//! TCP chunks and events whose body closes mid-frame.

use crate::util::from_reqwest;
use cl_domain::error::Result;
use cl_domain::stream::{BoxStream, StreamEvent};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Decoder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Incremental decoder for an SSE byte stream.
///
/// Feed transport chunks in with [`push`](Self::push), take completed
/// `data:` payloads out with [`next_payload`](Self::next_payload). An
/// event is complete at its blank-line terminator; until then its bytes
/// stay buffered. [`finish`](Self::finish) salvages an unterminated
/// trailing event once the transport closes.
pub(crate) struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
    }

    /// The next complete payload, if a whole event is buffered. Events
    /// without a data field (comments, `id:`/`retry:` housekeeping) are
    /// consumed and skipped.
    pub fn next_payload(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.find("\n\n")?;
            let event: String = self.buffer.drain(..end + 2).collect();
            if let Some(payload) = extract_data(&event) {
                return Some(payload);
            }
        }
    }

    /// Consume the decoder, yielding a payload from any unterminated
    /// tail the server sent before closing.
    pub fn finish(self) -> Option<String> {
        extract_data(&self.buffer)
    }
}

/// The payload of one event: its `data:` field values, trimmed, with
/// multi-line data joined by newlines. `None` when the event carries no
/// non-empty data.
fn extract_data(event: &str) -> Option<String> {
    let mut payload: Option<String> = None;
    for line in event.lines() {
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.trim();
        match payload.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => payload = Some(value.to_owned()),
        }
    }
    payload.filter(|p| !p.is_empty())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Turn an SSE `reqwest::Response` into a [`StreamEvent`] stream.
///
/// `parse_data` maps one payload to zero or more events; it is `FnMut`
/// so a parser may keep state across payloads. Guarantees on top of the
/// raw transport:
///
/// - a transport read error is yielded as the final item, with no
///   synthesized stop after it (the consumer aborts on `Err`);
/// - a connection that closes cleanly without the provider ever saying
///   `message_stop` still yields one, so the turn always terminates.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut response = response;
        let mut decoder = SseDecoder::new();
        let mut saw_stop = false;

        loop {
            let chunk = match response.chunk().await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => break,
                Err(e) => {
                    yield Err(from_reqwest(e));
                    return;
                }
            };
            decoder.push(&chunk);
            while let Some(payload) = decoder.next_payload() {
                for event in parse_data(&payload) {
                    saw_stop |= matches!(&event, Ok(StreamEvent::MessageStop));
                    yield event;
                }
            }
        }

        if let Some(tail) = decoder.finish() {
            for event in parse_data(&tail) {
                saw_stop |= matches!(&event, Ok(StreamEvent::MessageStop));
                yield event;
            }
        }

        if !saw_stop {
            yield Ok(StreamEvent::MessageStop);
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
