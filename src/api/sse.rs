//! Server-Sent Events support

use crate::reveal::{reveal_prefix, REVEAL_INTERVAL};
use crate::runtime::SessionEvent;
use crate::session::SessionView;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a session's broadcast stream to SSE, starting with its current view
pub fn session_stream(
    init: SessionView,
    broadcast_rx: tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move {
        Ok::<_, Infallible>(Event::default()
            .event("init")
            .data(json!({ "type": "init", "session": init }).to_string()))
    });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(session_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn session_event_to_axum(event: SessionEvent) -> Event {
    let (event_type, data) = match event {
        SessionEvent::StateChange { view } => (
            "state_change",
            json!({
                "type": "state_change",
                "session": view
            }),
        ),
        SessionEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
        SessionEvent::Complete => (
            "complete",
            json!({
                "type": "complete"
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}

/// Typewriter stream: one growing prefix of `text` per reveal interval
pub fn reveal_stream(text: String) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let total = text.chars().count();

    // Empty text still yields one final frame
    let frames = futures::stream::unfold(Some((text, 0usize)), move |state| async move {
        let (text, shown) = state?;
        if shown > 0 {
            tokio::time::sleep(REVEAL_INTERVAL).await;
        }
        let next = (shown + 1).min(total);
        let frame = reveal_frame(&text, next, total);
        let rest = (next < total).then_some((text, next));
        Some((Ok::<_, Infallible>(frame), rest))
    });

    Sse::new(frames)
}

fn reveal_frame(text: &str, shown: usize, total: usize) -> Event {
    Event::default().event("frame").data(
        json!({
            "text": reveal_prefix(text, shown),
            "shown": shown,
            "total": total,
            "done": shown >= total
        })
        .to_string(),
    )
}
