//! Canonical event topic constants shared across the service.
//!
//! This crate centralizes the string constants used when publishing events
//! so that producers and the SSE surface stay in sync. Keep this list
//! alphabetized within sections and favor dot.case names.

// Feedback pipeline
pub const TOPIC_FEEDBACK_METRICS_UPDATED: &str = "feedback.metrics.updated";
pub const TOPIC_FEEDBACK_RECORD_APPENDED: &str = "feedback.record.appended";
pub const TOPIC_FEEDBACK_SNAPSHOT_APPLIED: &str = "feedback.snapshot.applied";
pub const TOPIC_FEEDBACK_STATUS_CHANGED: &str = "feedback.status.changed";
pub const TOPIC_FEEDBACK_SUBSCRIPTION_LOST: &str = "feedback.subscription.lost";

// Insight engine
pub const TOPIC_INSIGHT_UPDATED: &str = "insight.updated";

// Smart bin (uncorrelated sensor feed)
pub const TOPIC_BIN_WEIGHT_UPDATED: &str = "bin.weight.updated";

// Service lifecycle
pub const TOPIC_SERVICE_START: &str = "service.start";
pub const TOPIC_SERVICE_STOP: &str = "service.stop";
