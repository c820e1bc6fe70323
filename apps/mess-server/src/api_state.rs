use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

/// Current materialized view: snapshot, metrics, insight, and whether the
/// view has gone stale.
pub async fn state_feedback(State(state): State<AppState>) -> impl IntoResponse {
    let feed = state.feed();
    let records = feed.snapshot().await;
    Json(json!({
        "version": feed.version(),
        "stale": feed.is_degraded(),
        "metrics": feed.metrics().await,
        "insight": feed.insight().await,
        "records": &*records,
    }))
}

pub async fn state_bin(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.bin())
}

/// Effective policy config, for operators checking what gates mutations.
pub async fn state_policy(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.policy().snapshot())
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({"ok": true}))
}
