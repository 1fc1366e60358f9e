//! Immutable input catalog of a single solve.
//!
//! The catalog is built from power forecasts and service-level agreements. It is never mutated
//! once validated: solvers only read it.

mod activity;
mod budget;
mod horizon;
mod power_source;
mod site_objective;

use std::{collections::BTreeSet, ops::Range};

use serde::{Deserialize, Serialize};

pub use self::{
    activity::{
        Activity,
        DatacenterPart,
        ForbiddenMode,
        ForbiddenState,
        PerfLevel,
        Relocation,
        Replay,
        RevenueObjective,
        WorkingMode,
    },
    budget::{Budget, Quota},
    horizon::Horizon,
    power_source::{PowerSlot, PowerSource},
    site_objective::{EnergyHistory, SiteObjective},
};
use crate::prelude::*;

#[must_use]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    pub horizon: Horizon,

    #[serde(default, rename = "power-sources")]
    pub power_sources: Vec<PowerSource>,

    #[serde(default)]
    pub activities: Vec<Activity>,

    /// Per-owner power and energy quotas.
    #[serde(default)]
    pub budgets: Vec<Budget>,

    /// Site-wide objectives that turn into penalties.
    #[serde(default, rename = "site-objectives")]
    pub site_objectives: Vec<SiteObjective>,
}

impl Catalog {
    /// Check everything that can be checked without building the automata.
    #[instrument(skip_all, fields(n_slots = self.horizon.n_slots))]
    pub fn validate(&self) -> Result {
        let n_slots = self.horizon.n_slots;
        for source in &self.power_sources {
            source.validate(&self.horizon)?;
        }
        let mut seen = BTreeSet::new();
        for activity in &self.activities {
            if !seen.insert(activity.id()) {
                return Err(Error::invalid_input(activity.id(), "duplicate activity"));
            }
            activity.validate(n_slots)?;
        }
        for budget in &self.budgets {
            budget.validate(n_slots, &seen)?;
        }
        for objective in &self.site_objectives {
            objective.validate()?;
        }
        debug!(
            n_power_sources = self.power_sources.len(),
            n_activities = self.activities.len(),
            "validated",
        );
        Ok(())
    }

    /// All data centers mentioned by the power sources and the activities, sorted.
    #[must_use]
    pub fn datacenters(&self) -> Vec<String> {
        self.power_sources
            .iter()
            .map(|source| source.datacenter.clone())
            .chain(
                self.activities
                    .iter()
                    .flat_map(|activity| activity.parts.iter().map(|part| part.datacenter.clone())),
            )
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    #[must_use]
    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|activity| activity.id() == id)
    }

    /// Sub-catalog covering `slots`, re-indexed from zero.
    ///
    /// Carry-over from elapsed accumulation windows is kept only when the window starts at the
    /// beginning of the horizon: later windows start from zero accumulated state.
    pub fn window(&self, slots: Range<usize>) -> Self {
        let keep_history = slots.start == 0;
        Self {
            horizon: self.horizon.window(&slots),
            power_sources: self
                .power_sources
                .iter()
                .map(|source| source.window(&slots))
                .collect(),
            activities: self
                .activities
                .iter()
                .map(|activity| activity.window(&slots, keep_history))
                .collect(),
            budgets: self.budgets.iter().filter_map(|budget| budget.window(&slots)).collect(),
            site_objectives: self
                .site_objectives
                .iter()
                .filter_map(|objective| objective.window(&slots, keep_history))
                .collect(),
        }
    }
}

/// Re-index the half-open slot range `[from, to)` into the window `slots`.
///
/// Returns [`None`] when the range does not intersect the window. The start may become negative
/// when the range began before the window.
fn shift_range(from: i64, to: i64, slots: &Range<usize>) -> Option<(i64, i64)> {
    let start = i64::try_from(slots.start).ok()?;
    let end = i64::try_from(slots.end).ok()?;
    if to <= start || from >= end {
        return None;
    }
    Some((from - start, to.min(end) - start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_range() {
        assert_eq!(shift_range(2, 5, &(0..10)), Some((2, 5)));
        assert_eq!(shift_range(2, 5, &(3..10)), Some((-1, 2)));
        assert_eq!(shift_range(2, 12, &(3..10)), Some((-1, 7)));
        assert_eq!(shift_range(2, 3, &(3..10)), None);
        assert_eq!(shift_range(10, 12, &(3..10)), None);
    }
}
