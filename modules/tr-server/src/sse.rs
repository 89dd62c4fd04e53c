//! Real-time event push (spec.md §6, §4.8). A subscriber connects with an
//! optional filter and an optional `Last-Event-ID` to replay anything it
//! missed, then receives live `BusEvent`s as they're published.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Deserialize;
use tr_events::Filter;
use uuid::Uuid;

use crate::auth::ReadAuth;
use crate::state::ServerState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    systems: Option<String>,
    #[serde(default)]
    sites: Option<String>,
    #[serde(default)]
    tgids: Option<String>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    types: Option<String>,
    #[serde(default)]
    emergency_only: bool,
    #[serde(default)]
    last_event_id: Option<String>,
}

fn split_csv(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn parse_uuids(value: &Option<String>) -> Vec<Uuid> {
    split_csv(value).iter().filter_map(|s| Uuid::parse_str(s).ok()).collect()
}

fn parse_ints(value: &Option<String>) -> Vec<i64> {
    split_csv(value).iter().filter_map(|s| s.parse().ok()).collect()
}

fn build_filter(q: &StreamQuery) -> Filter {
    Filter {
        systems: parse_uuids(&q.systems),
        sites: parse_uuids(&q.sites),
        tgids: parse_ints(&q.tgids),
        units: parse_ints(&q.units),
        types: split_csv(&q.types),
        emergency_only: q.emergency_only,
    }
}

/// A query-string `last_event_id` takes precedence over the `Last-Event-ID`
/// header, since query params are easier to set from a plain EventSource
/// call; most clients use one or the other, never both.
fn resolve_last_event_id(headers: &HeaderMap, q: &StreamQuery) -> Option<String> {
    q.last_event_id.clone().or_else(|| headers.get("last-event-id").and_then(|v| v.to_str().ok()).map(str::to_string))
}

pub async fn stream(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    headers: HeaderMap,
    Query(q): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = build_filter(&q);
    let last_event_id = resolve_last_event_id(&headers, &q);
    let subscription = state.bus.subscribe(filter, last_event_id.as_deref());

    let stream = async_stream::stream! {
        let mut rx = subscription.rx;
        while let Some(event) = rx.recv().await {
            let id = event.event_id.clone();
            match Event::default().id(id).event(event.event_type.clone()).json_data(&event) {
                Ok(sse_event) => yield Ok(sse_event),
                Err(error) => tracing::warn!(%error, "failed to encode bus event as SSE"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
}
