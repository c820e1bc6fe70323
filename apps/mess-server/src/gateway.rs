use std::sync::Arc;

use mess_events::Bus;
use mess_policy::{AccessContext, PolicyEngine};
use mess_store::{FeedbackStore, StoreError};
use mess_topics as topics;
use metrics::counter;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::feed::FeedbackFeed;

pub const ACTION_STATUS_TOGGLE: &str = "feedback.status.toggle";

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("access denied for {role}")]
    AccessDenied { role: String, explain: Value },
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store write failed: {0}")]
    WriteFailed(String),
}

/// The single guarded mutation this service issues: flip a record between
/// Pending and Resolved. The role check runs before anything else touches
/// the store; failures come back as values, never as panics.
pub struct MutationGateway {
    store: Arc<dyn FeedbackStore>,
    policy: Arc<PolicyEngine>,
    feed: Arc<FeedbackFeed>,
    bus: Bus,
}

impl MutationGateway {
    pub fn new(
        store: Arc<dyn FeedbackStore>,
        policy: Arc<PolicyEngine>,
        feed: Arc<FeedbackFeed>,
        bus: Bus,
    ) -> Self {
        Self {
            store,
            policy,
            feed,
            bus,
        }
    }

    /// Toggle a record's resolution status. The new value is computed from
    /// the record as the live view currently shows it, not from a fresh
    /// store read; two toggles racing ahead of a snapshot refresh can both
    /// compute the same value (last-write-wins, not compare-and-swap).
    /// The write is not retried here; retry policy belongs to the caller.
    pub async fn toggle_resolution(
        &self,
        id: &str,
        access: &dyn AccessContext,
    ) -> Result<(), GatewayError> {
        let role = access.current_role();
        let decision = self.policy.evaluate_action(role, ACTION_STATUS_TOGGLE);
        if !decision.allow {
            counter!("mess_toggle_denied_total").increment(1);
            warn!(target: "gateway", role = role.as_str(), record = id, "status toggle denied");
            return Err(GatewayError::AccessDenied {
                role: role.as_str().into(),
                explain: decision.explain,
            });
        }

        let current = self
            .feed
            .snapshot()
            .await
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.status)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        let next = current.toggled();

        self.store
            .update_status(id, next)
            .await
            .map_err(|err| match err {
                StoreError::NotFound(missing) => GatewayError::NotFound(missing),
                other => {
                    counter!("mess_toggle_failed_total").increment(1);
                    GatewayError::WriteFailed(other.to_string())
                }
            })?;

        info!(target: "gateway", record = id, status = ?next, "resolution status toggled");
        self.bus.publish(
            topics::TOPIC_FEEDBACK_STATUS_CHANGED,
            &json!({"id": id, "status": next}),
        );
        Ok(())
    }
}
