//! Store seam for feedback records: a trait the engine consumes as a black
//! box, plus the in-memory reference implementation used by the default
//! service mode and by tests. The live subscription always delivers the
//! complete current result set, newest first; there is no delta format.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mess_protocol::{FeedbackDraft, FeedbackRecord, ResolutionStatus};
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

/// Complete ordered result set as of one store notification. Replaced
/// wholesale on every change; receivers never see a partial set.
pub type Snapshot = Arc<Vec<FeedbackRecord>>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("subscription lost: {0}")]
    SubscriptionLost(String),
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Creation path. The store assigns id, created_at, and Pending status.
    async fn append(&self, draft: FeedbackDraft) -> Result<String, StoreError>;

    /// The only mutation the engine issues: replace a record's status.
    async fn update_status(&self, id: &str, status: ResolutionStatus) -> Result<(), StoreError>;

    /// Open a live subscription delivering the full result set on every
    /// change. Dropping the subscription releases the store-side listener.
    fn subscribe(&self) -> SnapshotSubscription;
}

/// Live subscription handle. Holds the receiving end of the snapshot
/// channel and a registration that deregisters on drop, so teardown on any
/// exit path releases the listener.
pub struct SnapshotSubscription {
    rx: broadcast::Receiver<Snapshot>,
    _registration: Option<ListenerGuard>,
}

impl SnapshotSubscription {
    pub fn new(rx: broadcast::Receiver<Snapshot>) -> Self {
        Self {
            rx,
            _registration: None,
        }
    }

    pub fn with_listener(rx: broadcast::Receiver<Snapshot>, listeners: Arc<AtomicUsize>) -> Self {
        listeners.fetch_add(1, Ordering::Relaxed);
        Self {
            rx,
            _registration: Some(ListenerGuard(listeners)),
        }
    }

    /// Next full snapshot, in delivery order. Lag skips straight to newer
    /// full sets, which loses nothing; a closed channel surfaces as
    /// `SubscriptionLost`.
    pub async fn recv(&mut self) -> Result<Snapshot, StoreError> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(target: "store", skipped = n, "snapshot subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(StoreError::SubscriptionLost("channel closed".into()))
                }
            }
        }
    }
}

struct ListenerGuard(Arc<AtomicUsize>);

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// In-process reference store. Append order is creation order, so the
/// published snapshot is simply the reverse of insertion order; created_at
/// stays informational and monotonic per store.
pub struct MemStore {
    records: RwLock<Vec<FeedbackRecord>>,
    tx: broadcast::Sender<Snapshot>,
    listeners: Arc<AtomicUsize>,
}

impl MemStore {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            records: RwLock::new(Vec::new()),
            tx,
            listeners: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::Relaxed)
    }

    pub async fn snapshot(&self) -> Snapshot {
        let guard = self.records.read().await;
        build_snapshot(&guard)
    }

    async fn publish(&self) {
        let snapshot = self.snapshot().await;
        let _ = self.tx.send(snapshot);
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(64)
    }
}

fn build_snapshot(records: &[FeedbackRecord]) -> Snapshot {
    Arc::new(records.iter().rev().cloned().collect())
}

#[async_trait]
impl FeedbackStore for MemStore {
    async fn append(&self, draft: FeedbackDraft) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let record = FeedbackRecord {
            id: id.clone(),
            meal: draft.meal,
            rating: draft.rating,
            comment: draft.comment,
            tags: draft.tags,
            status: ResolutionStatus::Pending,
            created_at,
            author: draft.author,
            has_image: draft.has_image,
        };
        {
            let mut guard = self.records.write().await;
            guard.push(record);
        }
        self.publish().await;
        Ok(id)
    }

    async fn update_status(&self, id: &str, status: ResolutionStatus) -> Result<(), StoreError> {
        {
            let mut guard = self.records.write().await;
            let record = guard
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            record.status = status;
        }
        self.publish().await;
        Ok(())
    }

    fn subscribe(&self) -> SnapshotSubscription {
        SnapshotSubscription::with_listener(self.tx.subscribe(), self.listeners.clone())
    }
}
