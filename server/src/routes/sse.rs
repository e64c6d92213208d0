use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use bytes::Bytes;
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::config::SSE_KEEPALIVE_SECS;
use crate::state::AppState;

const VIEW_EVENT: &str = "view";

pub async fn view_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        // Subscribe before reading the current view so no publish slips between the two.
        let rx = state.store.event_tx.subscribe();
        let mut updates = BroadcastStream::new(rx);

        let (cycle, data) = {
            let published = state.store.published.read().await;
            (published.view.cycle, published.json.clone())
        };
        if let Some(payload) = event_payload(data.as_ref()) {
            yield Ok(view_event(cycle, payload));
        }

        while let Some(result) = updates.next().await {
            match result {
                Ok(update) => {
                    let Some(payload) = event_payload(update.json.as_ref()) else {
                        warn!(cycle = update.cycle, "view payload is not valid utf-8; dropping SSE event");
                        continue;
                    };
                    yield Ok(view_event(update.cycle, payload));
                }
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(
                        skipped_events = skipped,
                        "SSE client lagged behind broadcast buffer; resending current view"
                    );
                    let (cycle, data) = {
                        let published = state.store.published.read().await;
                        (published.view.cycle, published.json.clone())
                    };
                    if let Some(payload) = event_payload(data.as_ref()) {
                        yield Ok(view_event(cycle, payload));
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keep-alive"),
    )
}

fn view_event(cycle: u64, payload: &str) -> Event {
    Event::default()
        .id(cycle.to_string())
        .event(VIEW_EVENT)
        .data(payload)
}

fn event_payload(bytes: &Bytes) -> Option<&str> {
    std::str::from_utf8(bytes.as_ref()).ok()
}
