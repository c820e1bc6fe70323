use std::sync::Arc;

use mess_events::Bus;
use mess_policy::PolicyEngine;
use mess_store::FeedbackStore;
use tokio::sync::watch;

use crate::{bin_sim::BinReading, feed::FeedbackFeed, gateway::MutationGateway};

#[derive(Clone)]
pub(crate) struct AppState {
    bus: Bus,
    store: Arc<dyn FeedbackStore>,
    policy: Arc<PolicyEngine>,
    feed: Arc<FeedbackFeed>,
    gateway: Arc<MutationGateway>,
    bin: watch::Receiver<BinReading>,
}

impl AppState {
    pub fn new(
        bus: Bus,
        store: Arc<dyn FeedbackStore>,
        policy: Arc<PolicyEngine>,
        feed: Arc<FeedbackFeed>,
        gateway: Arc<MutationGateway>,
        bin: watch::Receiver<BinReading>,
    ) -> Self {
        Self {
            bus,
            store,
            policy,
            feed,
            gateway,
            bin,
        }
    }

    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    pub fn store(&self) -> Arc<dyn FeedbackStore> {
        self.store.clone()
    }

    pub fn policy(&self) -> Arc<PolicyEngine> {
        self.policy.clone()
    }

    pub fn feed(&self) -> Arc<FeedbackFeed> {
        self.feed.clone()
    }

    pub fn gateway(&self) -> Arc<MutationGateway> {
        self.gateway.clone()
    }

    pub fn bin(&self) -> BinReading {
        *self.bin.borrow()
    }
}
