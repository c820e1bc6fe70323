use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// RFC7807-style error payload used at service edges.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: Option<String>,
}

// -------- Feedback records --------

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Meal {
    Breakfast,
    Lunch,
    Snacks,
    Dinner,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Pending,
    Resolved,
}

impl ResolutionStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Resolved,
            Self::Resolved => Self::Pending,
        }
    }
}

impl Default for ResolutionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// One submitted meal review as delivered by the store. Field-level
/// leniency is deliberate: a record with a missing or out-of-range rating
/// is still a record, it just scores 0.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct FeedbackRecord {
    pub id: String,
    pub meal: Meal,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: ResolutionStatus,
    /// Store-assigned RFC3339 timestamp; the sole ordering key.
    pub created_at: String,
    #[serde(default = "anonymous_author")]
    pub author: String,
    #[serde(default)]
    pub has_image: bool,
}

fn anonymous_author() -> String {
    "Anonymous".to_string()
}

impl FeedbackRecord {
    /// Rating coerced for arithmetic: present and in [1,5] passes through,
    /// anything else counts as 0.
    pub fn rating_score(&self) -> f64 {
        match self.rating {
            Some(r) if (1.0..=5.0).contains(&r) => r,
            _ => 0.0,
        }
    }

    /// Low-rated means an explicit rating of 2 or below. A record without
    /// a rating averages as 0 but is not treated as a complaint.
    pub fn is_low_rated(&self) -> bool {
        matches!(self.rating, Some(r) if r <= 2.0)
    }

    pub fn is_pending(&self) -> bool {
        self.status == ResolutionStatus::Pending
    }
}

/// Creation-path fields; the store assigns id, created_at, and the initial
/// Pending status.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct FeedbackDraft {
    pub meal: Meal,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "anonymous_author")]
    pub author: String,
    #[serde(default)]
    pub has_image: bool,
}

// -------- Derived views --------

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default, JsonSchema)]
pub struct Metrics {
    pub total: usize,
    pub average_rating: f64,
    pub pending_count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Optimal,
    Warning,
    Critical,
}

/// The single prioritized operational message derived from the unresolved
/// backlog. Never persisted; recomputed per snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct Insight {
    pub message: String,
    pub severity: Severity,
}

// -------- Access control --------

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Owner,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Owner => "owner",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "viewer" => Some(Self::Viewer),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}
