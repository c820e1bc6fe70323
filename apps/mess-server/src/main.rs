use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use mess_events::Bus;
use mess_policy::PolicyEngine;
use mess_store::{FeedbackStore, MemStore};
use mess_topics as topics;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api_events;
mod api_feedback;
mod api_state;
mod app_state;
mod bin_sim;
mod config;
mod feed;
mod gateway;
mod responses;

pub(crate) use app_state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let bus = Bus::new(config::bus_capacity());
    let store: Arc<dyn FeedbackStore> = Arc::new(MemStore::new(config::bus_capacity()));
    let policy = Arc::new(PolicyEngine::load_from_env());
    let feed = feed::FeedbackFeed::new(bus.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let feed_task = feed.spawn_snapshot_loop(store.as_ref(), shutdown_rx.clone());
    let (bin_rx, bin_task) = bin_sim::spawn(
        bus.clone(),
        Duration::from_millis(config::bin_tick_ms()),
        shutdown_rx,
    );
    let gateway = Arc::new(gateway::MutationGateway::new(
        store.clone(),
        policy.clone(),
        feed.clone(),
        bus.clone(),
    ));
    let state = AppState::new(bus.clone(), store, policy, feed, gateway, bin_rx);

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config::http_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind server socket");
    info!(%addr, "mess server listening");
    bus.publish(topics::TOPIC_SERVICE_START, &json!({"addr": addr.to_string()}));

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("http server exited with error: {err}");
    }

    info!("shutting down background tasks");
    bus.publish(topics::TOPIC_SERVICE_STOP, &json!({}));
    let _ = shutdown_tx.send(true);
    join_with_grace(
        vec![("feed.snapshot_loop", feed_task), ("bin.walk", bin_task)],
        Duration::from_secs(5),
    )
    .await;
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(api_state::healthz))
        .route("/state/feedback", get(api_state::state_feedback))
        .route("/state/bin", get(api_state::state_bin))
        .route("/state/policy", get(api_state::state_policy))
        .route("/events", get(api_events::events_sse))
        .route("/feedback", post(api_feedback::feedback_submit))
        .route("/feedback/{id}/toggle", post(api_feedback::feedback_toggle))
        .with_state(state)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn join_with_grace(tasks: Vec<(&'static str, JoinHandle<()>)>, grace: Duration) {
    for (name, handle) in tasks {
        let aborter = handle.abort_handle();
        match tokio::time::timeout(grace, handle).await {
            Ok(_) => {}
            Err(_) => {
                warn!(task = name, "background task did not stop in time; aborting");
                aborter.abort();
            }
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use mess_events::next_event;
    use mess_policy::PolicyConfig;
    use serde_json::Value;
    use tokio::time::timeout;
    use tower::util::ServiceExt;

    struct TestApp {
        router: Router,
        bus: Bus,
        _shutdown_tx: watch::Sender<bool>,
    }

    fn build_app() -> TestApp {
        let bus = Bus::new(64);
        let store = Arc::new(MemStore::default());
        let store_dyn: Arc<dyn FeedbackStore> = store.clone();
        let policy = Arc::new(PolicyEngine::with_config(PolicyConfig::default()));
        let feed = feed::FeedbackFeed::new(bus.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let _feed_task = feed.spawn_snapshot_loop(store.as_ref(), shutdown_rx.clone());
        let (bin_rx, _bin_task) = bin_sim::spawn(bus.clone(), Duration::from_millis(10), shutdown_rx);
        let gateway = Arc::new(gateway::MutationGateway::new(
            store_dyn.clone(),
            policy.clone(),
            feed.clone(),
            bus.clone(),
        ));
        let state = AppState::new(bus.clone(), store_dyn, policy, feed, gateway, bin_rx);
        TestApp {
            router: router(state),
            bus,
            _shutdown_tx: shutdown_tx,
        }
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = resp
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn request(router: &Router, req: Request<Body>) -> axum::response::Response {
        router.clone().oneshot(req).await.expect("request routed")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    /// Wait until a metrics read-model update satisfying `pred` arrives.
    async fn wait_metrics(
        rx: &mut tokio::sync::broadcast::Receiver<mess_events::Envelope>,
        pred: impl Fn(&Value) -> bool,
    ) {
        timeout(Duration::from_secs(5), async {
            while let Some(env) = next_event(rx, "test").await {
                if env.kind == topics::TOPIC_FEEDBACK_METRICS_UPDATED && pred(&env.payload) {
                    return;
                }
            }
            panic!("bus closed before the expected metrics update");
        })
        .await
        .expect("metrics update in time");
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let app = build_app();
        let resp = request(
            &app.router,
            Request::get("/healthz").body(Body::empty()).expect("req"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["ok"], true);
    }

    #[tokio::test]
    async fn submission_without_a_valid_rating_is_refused() {
        let app = build_app();
        let resp = request(
            &app.router,
            post_json("/feedback", json!({"meal": "lunch", "comment": "no stars"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(resp).await;
        assert_eq!(body["title"], "Invalid Rating");

        let resp = request(
            &app.router,
            post_json("/feedback", json!({"meal": "lunch", "rating": 4.5})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn submission_flows_into_metrics_and_insight() {
        let app = build_app();
        let mut rx = app.bus.subscribe();

        let resp = request(
            &app.router,
            post_json(
                "/feedback",
                json!({"meal": "dinner", "rating": 4, "comment": "solid"}),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(body_json(resp).await["id"].as_str().is_some());

        wait_metrics(&mut rx, |p| p["metrics"]["total"] == 1).await;

        let resp = request(
            &app.router,
            Request::get("/state/feedback").body(Body::empty()).expect("req"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["metrics"]["total"], 1);
        assert_eq!(body["metrics"]["average_rating"], 4.0);
        assert_eq!(body["insight"]["severity"], "optimal");
        assert_eq!(body["stale"], false);
        assert_eq!(body["records"][0]["tags"][0], "General");
    }

    #[tokio::test]
    async fn toggle_requires_an_explicit_role() {
        let app = build_app();
        let resp = request(
            &app.router,
            Request::post("/feedback/f-1/toggle")
                .body(Body::empty())
                .expect("req"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = request(
            &app.router,
            Request::post("/feedback/f-1/toggle")
                .header("x-mess-role", "admin")
                .body(Body::empty())
                .expect("req"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn viewer_toggle_is_forbidden() {
        let app = build_app();
        let mut rx = app.bus.subscribe();
        let resp = request(
            &app.router,
            post_json(
                "/feedback",
                json!({"meal": "lunch", "rating": 1, "tags": ["Taste"]}),
            ),
        )
        .await;
        let id = body_json(resp).await["id"].as_str().expect("id").to_string();
        wait_metrics(&mut rx, |p| p["metrics"]["total"] == 1).await;

        let resp = request(
            &app.router,
            Request::post(format!("/feedback/{id}/toggle"))
                .header("x-mess-role", "viewer")
                .body(Body::empty())
                .expect("req"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn owner_toggle_resolves_the_complaint_end_to_end() {
        let app = build_app();
        let mut rx = app.bus.subscribe();
        let resp = request(
            &app.router,
            post_json(
                "/feedback",
                json!({"meal": "snacks", "rating": 1, "tags": ["Hygiene"]}),
            ),
        )
        .await;
        let id = body_json(resp).await["id"].as_str().expect("id").to_string();
        wait_metrics(&mut rx, |p| p["metrics"]["pending_count"] == 1).await;

        let resp = request(
            &app.router,
            Request::get("/state/feedback").body(Body::empty()).expect("req"),
        )
        .await;
        assert_eq!(body_json(resp).await["insight"]["severity"], "critical");

        let resp = request(
            &app.router,
            Request::post(format!("/feedback/{id}/toggle"))
                .header("x-mess-role", "owner")
                .body(Body::empty())
                .expect("req"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        wait_metrics(&mut rx, |p| p["metrics"]["pending_count"] == 0).await;

        let resp = request(
            &app.router,
            Request::get("/state/feedback").body(Body::empty()).expect("req"),
        )
        .await;
        let body = body_json(resp).await;
        assert_eq!(body["records"][0]["status"], "resolved");
        assert_eq!(body["insight"]["severity"], "optimal");
    }

    #[tokio::test]
    async fn bin_state_reports_a_reading_in_range() {
        let app = build_app();
        let resp = request(
            &app.router,
            Request::get("/state/bin").body(Body::empty()).expect("req"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let weight = body["weight_kg"].as_f64().expect("weight");
        assert!((0.0..=50.0).contains(&weight));
    }
}
