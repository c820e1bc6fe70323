//! Pure derivations over a feedback snapshot: summary metrics and the
//! prioritized insight rule chain. Everything here is a total function of
//! its input so it can be tested without a live store.

use mess_protocol::{FeedbackRecord, Insight, Metrics, Severity};

/// Summary statistics over the full record set. Malformed ratings count as
/// 0 rather than failing; the empty set yields all zeros.
pub fn compute_metrics(records: &[FeedbackRecord]) -> Metrics {
    if records.is_empty() {
        return Metrics::default();
    }
    let sum: f64 = records.iter().map(|r| r.rating_score()).sum();
    Metrics {
        total: records.len(),
        average_rating: round_tenth(sum / records.len() as f64),
        pending_count: records.iter().filter(|r| r.is_pending()).count(),
    }
}

/// Ordered rule chain, first match wins. Rules 2..4 look only at the
/// unresolved subset; a single hygiene flag outranks any number of taste
/// complaints.
pub fn derive_insight(records: &[FeedbackRecord]) -> Insight {
    if records.is_empty() {
        return Insight {
            severity: Severity::Info,
            message: "Awaiting feedback. No submissions recorded yet.".into(),
        };
    }

    let low_rated: Vec<&FeedbackRecord> = records
        .iter()
        .filter(|r| r.is_pending() && r.is_low_rated())
        .collect();

    if low_rated.is_empty() {
        return Insight {
            severity: Severity::Optimal,
            message: "System optimal. Menu is performing within expected parameters.".into(),
        };
    }

    let hygiene = tag_count(&low_rated, "hygiene");
    if hygiene > 0 {
        return Insight {
            severity: Severity::Critical,
            message: format!("{hygiene} hygiene reports detected. Immediate audit recommended."),
        };
    }

    let taste = tag_count(&low_rated, "taste");
    if taste > 0 {
        return Insight {
            severity: Severity::Warning,
            message: format!("{taste} taste complaints detected. Review ingredient sourcing."),
        };
    }

    Insight {
        severity: Severity::Info,
        message: "Monitoring feedback. Accumulating data for precision insights.".into(),
    }
}

// Case-insensitive substring match over every tag of the given records;
// each matching tag counts once.
fn tag_count(records: &[&FeedbackRecord], needle: &str) -> usize {
    records
        .iter()
        .flat_map(|r| r.tags.iter())
        .filter(|tag| tag.to_ascii_lowercase().contains(needle))
        .count()
}

fn round_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
