use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use mess_events::Bus;
use mess_heuristics::{compute_metrics, derive_insight};
use mess_protocol::{Insight, Metrics};
use mess_store::{FeedbackStore, Snapshot};
use mess_topics as topics;
use metrics::counter;
use serde_json::json;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Live materialized view of the feedback store: the current snapshot plus
/// the metrics and insight derived from it. All three are replaced
/// wholesale per store notification, never mutated in place.
pub struct FeedbackFeed {
    snapshot: RwLock<Snapshot>,
    metrics: RwLock<Metrics>,
    insight: RwLock<Insight>,
    version: AtomicU64,
    degraded: AtomicBool,
    bus: Bus,
}

impl FeedbackFeed {
    pub fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            snapshot: RwLock::new(Arc::new(Vec::new())),
            metrics: RwLock::new(Metrics::default()),
            insight: RwLock::new(derive_insight(&[])),
            version: AtomicU64::new(0),
            degraded: AtomicBool::new(false),
            bus,
        })
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn metrics(&self) -> Metrics {
        *self.metrics.read().await
    }

    pub async fn insight(&self) -> Insight {
        self.insight.read().await.clone()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// True once the live subscription has been lost; the last snapshot
    /// stays queryable but is stale until a new loop is spawned.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Replace the view with one full snapshot and recompute the derived
    /// state. Pure in its input: identical record sets always produce
    /// identical metrics and insight.
    pub async fn apply_snapshot(&self, snapshot: Snapshot) -> Metrics {
        let derived_metrics = compute_metrics(&snapshot);
        let derived_insight = derive_insight(&snapshot);
        {
            let mut guard = self.snapshot.write().await;
            *guard = snapshot.clone();
        }
        {
            let mut guard = self.metrics.write().await;
            *guard = derived_metrics;
        }
        {
            let mut guard = self.insight.write().await;
            *guard = derived_insight.clone();
        }
        self.degraded.store(false, Ordering::Relaxed);
        let version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        counter!("mess_snapshots_applied_total").increment(1);
        self.bus.publish(
            topics::TOPIC_FEEDBACK_SNAPSHOT_APPLIED,
            &json!({"version": version, "total": snapshot.len()}),
        );
        self.bus.publish(
            topics::TOPIC_FEEDBACK_METRICS_UPDATED,
            &json!({"version": version, "metrics": derived_metrics}),
        );
        self.bus.publish(
            topics::TOPIC_INSIGHT_UPDATED,
            &json!({"version": version, "insight": derived_insight}),
        );
        derived_metrics
    }

    /// Consume the store's live subscription until shutdown or channel
    /// loss. Snapshots are processed strictly one at a time in delivery
    /// order. The subscription is opened before the task starts so nothing
    /// between spawn and first poll is missed, and its guard drops on
    /// every exit path.
    pub fn spawn_snapshot_loop(
        self: &Arc<Self>,
        store: &dyn FeedbackStore,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut sub = store.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!(target: "feed", "snapshot loop stopping");
                            break;
                        }
                    }
                    delivery = sub.recv() => match delivery {
                        Ok(snapshot) => {
                            this.apply_snapshot(snapshot).await;
                        }
                        Err(err) => {
                            this.degraded.store(true, Ordering::Relaxed);
                            this.bus.publish(
                                topics::TOPIC_FEEDBACK_SUBSCRIPTION_LOST,
                                &json!({"error": err.to_string()}),
                            );
                            warn!(target: "feed", error = %err, "snapshot subscription lost; view is stale");
                            break;
                        }
                    },
                }
            }
        })
    }
}
