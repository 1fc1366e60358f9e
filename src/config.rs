use std::time::Duration;

use bon::Builder;

use crate::quantity::Percent;

/// Tunables of every window search.
#[must_use]
#[derive(Clone, Debug, Builder)]
pub struct SearchConfig {
    /// Wall-clock budget of every window and configuration.
    #[builder(default = Duration::from_secs(10))]
    pub time_limit: Duration,

    /// Number of decisions per slot ordered by estimated impact, before switching to the
    /// smallest domain first.
    #[builder(default = 1)]
    pub warm_up: usize,

    /// Drop the states that waste power above a saturated instant objective.
    #[builder(default = true)]
    pub prune_waste: bool,

    /// A source still counts as green when its renewable share is at most this many percent
    /// points below the running site average.
    #[builder(default)]
    pub green_tolerance: Percent,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
