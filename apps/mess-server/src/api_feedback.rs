use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use mess_policy::StaticAccess;
use mess_protocol::{FeedbackDraft, Role};
use mess_topics as topics;
use metrics::counter;
use serde_json::json;

use crate::{gateway::GatewayError, responses, AppState};

const ROLE_HEADER: &str = "x-mess-role";

/// Submission path. The store itself is lenient; the edge is where a
/// missing or fractional star rating is refused.
pub async fn feedback_submit(
    State(state): State<AppState>,
    Json(mut draft): Json<FeedbackDraft>,
) -> impl IntoResponse {
    match draft.rating {
        Some(r) if (1.0..=5.0).contains(&r) && r.fract() == 0.0 => {}
        _ => {
            return responses::problem(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid Rating",
                "rating must be a whole number of stars between 1 and 5",
            )
        }
    }
    if draft.tags.is_empty() {
        // untagged submissions still need a bucket in the views
        draft.tags.push("General".into());
    }
    match state.store().append(draft).await {
        Ok(id) => {
            counter!("mess_feedback_submitted_total").increment(1);
            state
                .bus()
                .publish(topics::TOPIC_FEEDBACK_RECORD_APPENDED, &json!({"id": id}));
            (StatusCode::CREATED, Json(json!({"id": id}))).into_response()
        }
        Err(err) => responses::problem(
            StatusCode::BAD_GATEWAY,
            "Store Append Failed",
            err.to_string(),
        ),
    }
}

/// Guarded status toggle. The acting role arrives resolved from the
/// identity layer in front of this service; a request without one is not
/// assumed to be a viewer, it is refused.
pub async fn feedback_toggle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let role = headers
        .get(ROLE_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(Role::parse);
    let Some(role) = role else {
        return responses::problem(
            StatusCode::UNAUTHORIZED,
            "Role Required",
            format!("{ROLE_HEADER} header must be set to viewer or owner"),
        );
    };

    match state
        .gateway()
        .toggle_resolution(&id, &StaticAccess(role))
        .await
    {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(GatewayError::AccessDenied { explain, .. }) => {
            let detail = explain["message"]
                .as_str()
                .unwrap_or("owner role required")
                .to_string();
            responses::problem(StatusCode::FORBIDDEN, "Access Denied", detail)
        }
        Err(GatewayError::NotFound(missing)) => responses::problem(
            StatusCode::NOT_FOUND,
            "Record Not Found",
            format!("no feedback record {missing}"),
        ),
        Err(GatewayError::WriteFailed(err)) => {
            responses::problem(StatusCode::BAD_GATEWAY, "Store Write Failed", err)
        }
    }
}
