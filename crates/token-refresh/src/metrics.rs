//! Refresh counters
//!
//! - `token_refresh_total` (counter): label `outcome`
//!
//! No recorder is installed here; without one these calls are no-ops.

/// Result of one pass through the refresh path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Success,
    Failure,
    /// Another caller had already refreshed; the cached record was reused.
    Deduplicated,
}

impl RefreshOutcome {
    pub fn label(self) -> &'static str {
        match self {
            RefreshOutcome::Success => "success",
            RefreshOutcome::Failure => "failure",
            RefreshOutcome::Deduplicated => "deduplicated",
        }
    }
}

pub fn record_refresh(outcome: RefreshOutcome) {
    metrics::counter!("token_refresh_total", "outcome" => outcome.label()).increment(1);
}
