use std::collections::HashMap;

use axum::response::IntoResponse;
use axum::{
    extract::{Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use tokio_stream::StreamExt as _;

use crate::AppState;

pub async fn events_sse(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    // Optional prefix filter (CSV)
    let prefixes: Vec<String> = q
        .get("prefix")
        .map(|s| {
            s.split(',')
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(|p| p.to_string())
                .collect()
        })
        .unwrap_or_default();

    let (tx, rx) = tokio::sync::mpsc::channel::<mess_events::Envelope>(128);
    let mut bus_rx = state.bus().subscribe();
    tokio::spawn(async move {
        while let Some(env) = mess_events::next_event(&mut bus_rx, "events.sse").await {
            if prefixes.is_empty() || prefixes.iter().any(|p| env.kind.starts_with(p)) {
                if tx.send(env).await.is_err() {
                    // client went away
                    break;
                }
            }
        }
    });

    let stream = tokio_stream::wrappers::ReceiverStream::new(rx).map(|env| {
        let data = serde_json::to_string(&env).unwrap_or_else(|_| "{}".to_string());
        let ev = SseEvent::default().event(env.kind.clone()).data(data);
        Result::<SseEvent, std::convert::Infallible>::Ok(ev)
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(10))
            .text("keep-alive"),
    )
}
