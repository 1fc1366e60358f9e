//! Solve results: the plan and the search statistics.

use std::{collections::BTreeMap, ops::Range, time::Duration};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::quantity::{Mills, Watts};

/// Terminal status of a search.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// The search space was exhausted, the plan is the best one.
    #[display("ok")]
    Ok,

    /// The deadline passed, the plan (if any) is the best one found so far.
    #[display("timeout")]
    Timeout,

    /// The model is proven infeasible.
    #[display("no-solution")]
    NoSolution,
}

#[serde_as]
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Improvement {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "elapsed-millis")]
    pub elapsed: Duration,

    pub profit: Mills,
}

#[serde_as]
#[must_use]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Statistics {
    pub status: Status,

    /// Every improving solution, in the order they were found.
    pub improvements: Vec<Improvement>,

    #[serde(rename = "n-nodes")]
    pub n_nodes: u64,

    #[serde(rename = "n-failures")]
    pub n_failures: u64,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "elapsed-millis")]
    pub elapsed: Duration,
}

/// Working mode and level run by one data center part.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PartPlan {
    pub datacenter: String,
    pub mode: String,
    pub level: usize,
    pub performance: i64,
    pub power: Watts,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScheduledState {
    /// State name, as accepted by replays.
    pub state: String,

    /// State index in the activity automaton.
    pub index: usize,

    pub parts: Vec<PartPlan>,

    /// Performance net of the transition cost into the state.
    pub performance: i64,

    pub power: Watts,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RevenueOutcome {
    /// Revenue of every instant objective together.
    Instant { revenue: Mills },

    /// Performance accumulated over the slots `[from, to)`, including any carry-over.
    Cumulative { from: usize, to: usize, performance: i64, revenue: Mills },
}

impl RevenueOutcome {
    #[must_use]
    pub const fn revenue(&self) -> Mills {
        match self {
            Self::Instant { revenue } | Self::Cumulative { revenue, .. } => *revenue,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActivityPlan {
    pub id: String,

    /// Indexed by slot.
    pub slots: Vec<ScheduledState>,

    pub revenues: Vec<RevenueOutcome>,

    pub revenue: Mills,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourcePlan {
    pub id: String,
    pub datacenter: String,

    /// Allocated power, indexed by slot.
    pub power: Vec<Watts>,

    pub cost: Mills,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SitePenalty {
    pub datacenter: String,
    pub from: usize,
    pub to: usize,

    /// Renewable share in tenths of a percent, [`None`] when the window is outside the horizon.
    pub percentage: Option<i64>,

    pub penalty: Mills,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub revenue: Mills,
    pub energy: Mills,
    pub penalty: Mills,
    pub profit: Mills,
}

impl Totals {
    pub fn add(&mut self, other: Self) {
        self.revenue += other.revenue;
        self.energy += other.energy;
        self.penalty += other.penalty;
        self.profit += other.profit;
    }
}

/// Chosen states and power allocations over a horizon.
#[must_use]
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub activities: Vec<ActivityPlan>,

    #[serde(rename = "power-sources")]
    pub power_sources: Vec<SourcePlan>,

    #[serde(default, rename = "site-penalties")]
    pub site_penalties: Vec<SitePenalty>,

    pub totals: Totals,
}

impl Plan {
    #[must_use]
    pub fn n_slots(&self) -> usize {
        self.activities
            .iter()
            .map(|activity| activity.slots.len())
            .chain(self.power_sources.iter().map(|source| source.power.len()))
            .max()
            .unwrap_or_default()
    }

    /// Append the plan of the following window, which starts at the slot `offset`.
    pub fn append(&mut self, other: Self, offset: usize) {
        if self.activities.is_empty() && self.power_sources.is_empty() {
            self.activities = other
                .activities
                .iter()
                .map(|activity| ActivityPlan {
                    id: activity.id.clone(),
                    slots: Vec::new(),
                    revenues: Vec::new(),
                    revenue: Mills::ZERO,
                })
                .collect();
            self.power_sources = other
                .power_sources
                .iter()
                .map(|source| SourcePlan {
                    id: source.id.clone(),
                    datacenter: source.datacenter.clone(),
                    power: Vec::new(),
                    cost: Mills::ZERO,
                })
                .collect();
        }
        for (activity, other) in self.activities.iter_mut().zip(other.activities) {
            activity.slots.extend(other.slots);
            activity.revenues.extend(other.revenues.into_iter().map(|outcome| match outcome {
                RevenueOutcome::Cumulative { from, to, performance, revenue } => {
                    RevenueOutcome::Cumulative {
                        from: from + offset,
                        to: to + offset,
                        performance,
                        revenue,
                    }
                }
                instant @ RevenueOutcome::Instant { .. } => instant,
            }));
            activity.revenue += other.revenue;
        }
        for (source, other) in self.power_sources.iter_mut().zip(other.power_sources) {
            source.power.extend(other.power);
            source.cost += other.cost;
        }
        self.site_penalties.extend(other.site_penalties.into_iter().map(|penalty| SitePenalty {
            from: penalty.from + offset,
            to: penalty.to + offset,
            ..penalty
        }));
        self.totals.add(other.totals);
    }

    /// State index of every activity at the last slot.
    #[must_use]
    pub fn last_states(&self) -> BTreeMap<String, usize> {
        self.activities
            .iter()
            .filter_map(|activity| Some((activity.id.clone(), activity.slots.last()?.index)))
            .collect()
    }

    /// State names of every activity over the slots, to seed a new search with.
    ///
    /// Slots the plan does not cover are left out.
    #[must_use]
    pub fn pattern(&self, slots: Range<usize>) -> Pattern {
        self.activities
            .iter()
            .map(|activity| {
                let states = slots
                    .clone()
                    .map(|slot| activity.slots.get(slot).map(|state| state.state.clone()))
                    .collect();
                (activity.id.clone(), states)
            })
            .collect()
    }
}

/// Per-activity state names, indexed by window slot.
pub type Pattern = BTreeMap<String, Vec<Option<String>>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn state(name: &str, index: usize) -> ScheduledState {
        ScheduledState {
            state: name.into(),
            index,
            parts: Vec::new(),
            performance: 1,
            power: Watts(1),
        }
    }

    fn window_plan(states: &[(&str, usize)], profit: i64) -> Plan {
        Plan {
            activities: vec![ActivityPlan {
                id: "acme/web".into(),
                slots: states.iter().map(|(name, index)| state(name, *index)).collect(),
                revenues: vec![RevenueOutcome::Cumulative {
                    from: 0,
                    to: states.len(),
                    performance: 2,
                    revenue: Mills(profit),
                }],
                revenue: Mills(profit),
            }],
            power_sources: vec![SourcePlan {
                id: "grid".into(),
                datacenter: "dc1".into(),
                power: vec![Watts(1); states.len()],
                cost: Mills::ZERO,
            }],
            site_penalties: Vec::new(),
            totals: Totals {
                revenue: Mills(profit),
                energy: Mills::ZERO,
                penalty: Mills::ZERO,
                profit: Mills(profit),
            },
        }
    }

    #[test]
    fn test_append() {
        let mut plan = Plan::default();
        plan.append(window_plan(&[("S", 0), ("M", 1)], 10), 0);
        plan.append(window_plan(&[("F", 2)], 5), 2);
        assert_eq!(plan.n_slots(), 3);
        assert_eq!(plan.totals.profit, Mills(15));
        assert_eq!(plan.activities[0].revenue, Mills(15));
        assert_eq!(
            plan.activities[0].revenues[1],
            RevenueOutcome::Cumulative { from: 2, to: 3, performance: 2, revenue: Mills(5) },
        );
        assert_eq!(plan.last_states()["acme/web"], 2);
    }

    #[test]
    fn test_pattern() {
        let plan = window_plan(&[("S", 0), ("M", 1)], 10);
        let pattern = plan.pattern(1..3);
        assert_eq!(pattern["acme/web"], [Some("M".to_string()), None]);
    }

    #[test]
    fn test_json_round_trip() -> serde_json::Result<()> {
        let plan = window_plan(&[("S", 0)], 10);
        let plan_json = serde_json::to_string(&plan)?;
        assert!(plan_json.contains("\"kind\":\"cumulative\""));
        assert_eq!(serde_json::from_str::<Plan>(&plan_json)?, plan);
        Ok(())
    }
}
