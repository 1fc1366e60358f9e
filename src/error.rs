use std::ops::Range;

/// Everything that may go wrong while building or solving a scheduling problem.
///
/// Timeouts are not errors: a search that runs out of time reports
/// [`crate::Status::Timeout`] together with its best incumbent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input in {context}: {reason}")]
    InvalidInput { context: String, reason: String },

    #[error("the flattened table is not monotonic at {at}: {previous} is followed by {next}")]
    NonMonotonic { at: usize, previous: i64, next: i64 },

    #[error("activity `{activity}` has no state that fits the site capacity at slot #{slot}")]
    Unschedulable { activity: String, slot: usize },

    #[error("{quota} cap {cap} is below the proven minimum consumption {minimum}")]
    QuotaInfeasible { quota: String, cap: i64, minimum: i64 },

    #[error("no configuration found a feasible plan for slots {}..{}", window.start, window.end)]
    Infeasible { window: Range<usize> },
}

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn invalid_input(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput { context: context.into(), reason: reason.into() }
    }
}
