use std::ops::Range;

use crate::{
    automaton::Automaton,
    catalog::{Activity, RevenueObjective},
};

/// Quantity accumulated along the walk of an activity through its automaton.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resource {
    /// Money from every instant objective, stored directly at the anchored slots.
    Instant,

    /// Realized performance accumulated over the slots of one cumulative objective.
    Cumulative {
        /// Index of the objective in [`Activity::revenues`].
        objective: usize,

        slots: Range<usize>,

        /// Performance accumulated before the horizon.
        achieved: i64,
    },
}

/// Per-slot, per-transition, per-resource values, indexed by `[slot][to][resource][from]`.
#[must_use]
pub struct CostTensor {
    n_slots: usize,
    n_states: usize,
    resources: Vec<Resource>,
    values: Vec<i64>,
}

impl CostTensor {
    pub fn build(automaton: &Automaton, activity: &Activity, n_slots: usize) -> Self {
        let has_instant = activity
            .revenues
            .iter()
            .any(|objective| matches!(objective, RevenueObjective::Instant { .. }));
        let resources: Vec<Resource> = has_instant
            .then_some(Resource::Instant)
            .into_iter()
            .chain(activity.revenues.iter().enumerate().filter_map(|(objective, revenue)| {
                match revenue {
                    RevenueObjective::Instant { .. } => None,
                    RevenueObjective::Cumulative { achieved, .. } => Some(Resource::Cumulative {
                        objective,
                        slots: revenue.cumulative_slots(n_slots)?,
                        achieved: *achieved,
                    }),
                }
            }))
            .collect();

        let n_states = automaton.len();
        let n_resources = resources.len();
        let mut values = vec![0; n_slots * n_states * n_resources * n_states];
        for slot in 0..n_slots {
            let instant_objectives = activity
                .revenues
                .iter()
                .filter_map(|objective| match objective {
                    RevenueObjective::Instant { slot: anchor, revenue } if *anchor == slot => {
                        Some(revenue)
                    }
                    _ => None,
                })
                .collect::<Vec<_>>();
            for to in 0..n_states {
                for (resource_index, resource) in resources.iter().enumerate() {
                    for from in 0..n_states {
                        let realized = automaton.realized_performance(from, to);
                        let value = match resource {
                            Resource::Instant => instant_objectives
                                .iter()
                                .map(|revenue| revenue.revenue(realized).0)
                                .sum(),
                            Resource::Cumulative { slots, .. } if slots.contains(&slot) => realized,
                            Resource::Cumulative { .. } => 0,
                        };
                        values[((slot * n_states + to) * n_resources + resource_index) * n_states
                            + from] = value;
                    }
                }
            }
        }
        Self { n_slots, n_states, resources, values }
    }

    #[must_use]
    pub const fn n_slots(&self) -> usize {
        self.n_slots
    }

    #[must_use]
    pub const fn n_states(&self) -> usize {
        self.n_states
    }

    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    #[must_use]
    pub fn get(&self, slot: usize, to: usize, resource: usize, from: usize) -> i64 {
        let n_resources = self.resources.len();
        self.values[((slot * self.n_states + to) * n_resources + resource) * self.n_states + from]
    }

    /// Lower and upper bounds of the total accumulated over any walk.
    #[must_use]
    pub fn bounds(&self, resource: usize) -> (i64, i64) {
        (0..self.n_slots).fold((0, 0), |(min, max), slot| {
            let values = (0..self.n_states).flat_map(|to| {
                (0..self.n_states).map(move |from| self.get(slot, to, resource, from))
            });
            let (slot_min, slot_max) = values
                .fold((i64::MAX, i64::MIN), |(min, max), value| (min.min(value), max.max(value)));
            (min + slot_min, max + slot_max)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{DatacenterPart, PerfLevel, Relocation, WorkingMode},
        prelude::*,
        quantity::{Mills, Watts},
        revenue::Revenue,
    };

    fn activity() -> Activity {
        let level = |performance, power| PerfLevel { performance, power: Watts(power) };
        Activity {
            owner: "acme".into(),
            name: "batch".into(),
            relocation: Relocation::Fixed,
            parts: vec![DatacenterPart {
                datacenter: "dc1".into(),
                modes: vec![
                    WorkingMode::new("S", [level(2, 2)]).with_transition("M", 1),
                    WorkingMode::new("M", [level(4, 4)]),
                ],
                default_mode: "S".into(),
                current_mode: None,
            }],
            migration_penalty: 0,
            forbidden: Vec::new(),
            revenues: vec![
                RevenueObjective::Instant { slot: 1, revenue: Revenue::threshold(Mills(7), 4) },
                RevenueObjective::Cumulative {
                    from: -1,
                    to: 2,
                    revenue: Revenue::threshold(Mills(100), 6),
                    achieved: 1,
                },
            ],
            replay: Vec::new(),
        }
    }

    #[test]
    fn test_tensor_values() -> Result {
        let activity = activity();
        let automaton = Automaton::build(&activity)?;
        let tensor = CostTensor::build(&automaton, &activity, 3);
        assert_eq!(
            tensor.resources(),
            &[Resource::Instant, Resource::Cumulative { objective: 1, slots: 0..2, achieved: 1 }],
        );

        // Instant revenue only at its anchor, with the transition cost deducted:
        assert_eq!(tensor.get(0, 1, 0, 1), 0);
        assert_eq!(tensor.get(1, 1, 0, 1), 7);
        assert_eq!(tensor.get(1, 1, 0, 0), 0);

        // Realized performance inside the window only:
        assert_eq!(tensor.get(0, 1, 1, 0), 3);
        assert_eq!(tensor.get(1, 0, 1, 1), 2);
        assert_eq!(tensor.get(2, 1, 1, 1), 0);

        assert_eq!(tensor.bounds(1), (2 + 2, 4 + 4));
        Ok(())
    }
}
