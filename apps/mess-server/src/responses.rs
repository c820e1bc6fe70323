use axum::{http::StatusCode, response::IntoResponse, Json};
use mess_protocol::ProblemDetails;

/// RFC7807-style error body for the HTTP edge.
pub fn problem(status: StatusCode, title: &str, detail: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ProblemDetails {
            r#type: "about:blank".into(),
            title: title.into(),
            status: status.as_u16(),
            detail: Some(detail.into()),
        }),
    )
        .into_response()
}
