//! Server-Sent Events support

use crate::chat::{ChatView, ViewEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    view: Arc<ChatView>,
    init_event: ViewEvent,
    broadcast_rx: broadcast::Receiver<ViewEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { init_event });
    let combined = init
        .chain(live_events(view, broadcast_rx))
        .map(|event| Ok(view_event_to_axum(event)));

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Broadcast events for one subscriber. A lagged subscriber gets a fresh
/// init event in place of whatever it missed.
fn live_events(
    view: Arc<ChatView>,
    broadcast_rx: broadcast::Receiver<ViewEvent>,
) -> impl Stream<Item = ViewEvent> {
    BroadcastStream::new(broadcast_rx).then(move |result| {
        let view = Arc::clone(&view);
        async move {
            match result {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    tracing::debug!(view = %view.id(), missed, "Subscriber lagged, resending snapshot");
                    view.init_event().await
                }
            }
        }
    })
}

fn view_event_to_axum(event: ViewEvent) -> Event {
    let (event_type, data) = event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}

fn event_payload(event: ViewEvent) -> (&'static str, serde_json::Value) {
    match event {
        ViewEvent::Init {
            state,
            history,
            authenticated,
        } => (
            "init",
            json!({
                "type": "init",
                "state": state,
                "history": history,
                "authenticated": authenticated
            }),
        ),
        ViewEvent::State { state } => (
            "state",
            json!({
                "type": "state",
                "state": state
            }),
        ),
        ViewEvent::Update { generation, text } => (
            "update",
            json!({
                "type": "update",
                "generation": generation,
                "text": text
            }),
        ),
        ViewEvent::History { turns } => (
            "history",
            json!({
                "type": "history",
                "turns": turns
            }),
        ),
    }
}
