//! `GET /events` — the SSE subscription endpoint.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;

use crate::state::AppState;

/// Comment-line heartbeat cadence; defeats intermediary idle timeouts.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Open a long-lived event stream.
///
/// Emits one `: connected` comment to flush the connection, then every
/// event published after the subscription as a `data:` frame. The
/// subscription is released when the client disconnects: axum drops the
/// stream, which drops the `Subscription`.
pub async fn subscribe_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.broker.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().comment("connected"));

        let mut subscription = subscription;
        while let Some(frame) = subscription.recv().await {
            yield Ok(Event::default().data(frame));
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
