use std::collections::BTreeMap;

use bon::Builder;

use crate::{
    automaton::{Automaton, State},
    catalog::{Activity, Catalog, Replay, RevenueObjective},
    prelude::*,
    quantity::Watts,
};

/// Allowed state indices of every activity at every slot, before any search.
#[derive(Builder)]
pub struct StateDomains<'a> {
    catalog: &'a Catalog,
    automata: &'a [Automaton],

    /// Sorted data center names.
    datacenters: &'a [String],

    prune_waste: bool,
}

impl StateDomains<'_> {
    /// Indexed by activity, slot, and then sorted state indices.
    ///
    /// Fails with [`Error::Unschedulable`] when no state of an activity fits the site capacity
    /// at some slot, and with [`Error::InvalidInput`] on unknown replayed states.
    pub fn resolve(&self) -> Result<Vec<Vec<Vec<usize>>>> {
        let capacity = self.site_capacity();
        self.catalog
            .activities
            .iter()
            .zip(self.automata)
            .map(|(activity, automaton)| self.activity_domains(activity, automaton, &capacity))
            .collect()
    }

    /// Total peak power per data center and slot.
    fn site_capacity(&self) -> Vec<Vec<Watts>> {
        self.datacenters
            .iter()
            .map(|datacenter| {
                self.catalog
                    .horizon
                    .slots()
                    .map(|slot| {
                        self.catalog
                            .power_sources
                            .iter()
                            .filter(|source| source.datacenter == *datacenter)
                            .map(|source| source.at(slot).peak)
                            .sum()
                    })
                    .collect()
            })
            .collect()
    }

    fn activity_domains(
        &self,
        activity: &Activity,
        automaton: &Automaton,
        capacity: &[Vec<Watts>],
    ) -> Result<Vec<Vec<usize>>> {
        let sites: Vec<usize> = activity
            .parts
            .iter()
            .map(|part| self.site_index(&part.datacenter))
            .collect();
        let replay = activity
            .replay
            .iter()
            .map(|replay| {
                let state = automaton.state_index(activity, &replay.state).ok_or_else(|| {
                    let Replay { slot, state } = replay;
                    Error::invalid_input(
                        activity.id(),
                        format!("unknown state `{state}` replayed at slot #{slot}"),
                    )
                })?;
                Ok((replay.slot, state))
            })
            .collect::<Result<BTreeMap<usize, usize>>>()?;

        self.catalog
            .horizon
            .slots()
            .map(|slot| {
                let fits = |state: &State| {
                    state
                        .part_power
                        .iter()
                        .zip(&sites)
                        .all(|(power, site)| *power <= capacity[*site][slot])
                };
                let mut domain: Vec<usize> =
                    (0..automaton.len()).filter(|index| fits(automaton.state(*index))).collect();
                if let Some(forced) = replay.get(&slot) {
                    domain.retain(|index| index == forced);
                } else if self.prune_waste
                    && let Some(target) = self.saturation_target(activity, slot)
                {
                    let n_states = domain.len();
                    domain = Self::prune_waste(automaton, &domain, target);
                    let n_pruned = n_states - domain.len();
                    if n_pruned != 0 {
                        trace!(activity = activity.id(), slot, n_pruned, "pruned");
                    }
                }
                if domain.is_empty() {
                    return Err(Error::Unschedulable { activity: activity.id(), slot });
                }
                Ok(domain)
            })
            .collect()
    }

    fn site_index(&self, datacenter: &str) -> usize {
        self.datacenters
            .binary_search_by(|name| name.as_str().cmp(datacenter))
            .expect("every part data center should be listed")
    }

    /// Performance above which nothing more is earned at the slot.
    ///
    /// Only defined when instant objectives alone depend on the slot: no cumulative window and
    /// no site objective on any of the activity data centers covers it.
    fn saturation_target(&self, activity: &Activity, slot: usize) -> Option<i64> {
        #[expect(clippy::cast_possible_wrap)]
        let signed_slot = slot as i64;
        let n_slots = self.catalog.horizon.n_slots;
        let is_covered = activity.revenues.iter().any(|objective| {
            objective.cumulative_slots(n_slots).is_some_and(|slots| slots.contains(&slot))
        }) || self.catalog.site_objectives.iter().any(|objective| {
            let (from, to) = objective.declared_window();
            activity.part_index(objective.datacenter()).is_some()
                && (from..to).contains(&signed_slot)
        });
        if is_covered {
            return None;
        }
        activity
            .revenues
            .iter()
            .filter_map(|objective| match objective {
                RevenueObjective::Instant { slot: anchor, revenue } if *anchor == slot => {
                    Some(revenue.base_performance())
                }
                _ => None,
            })
            .max()
    }

    /// Drop the saturated states dominated by another saturated state running the same modes
    /// with no more power on any site.
    ///
    /// Saturated states earn the base price whatever the preceding state, so the dominated
    /// ones are never strictly better.
    fn prune_waste(automaton: &Automaton, domain: &[usize], target: i64) -> Vec<usize> {
        let is_saturated = |index: usize| {
            automaton.state(index).perf() - automaton.worst_case_cost(index) >= target
        };
        let dominates = |lhs: usize, rhs: usize| {
            let (lhs_state, rhs_state) = (automaton.state(lhs), automaton.state(rhs));
            lhs_state.same_modes(rhs_state)
                && lhs_state
                    .part_power
                    .iter()
                    .zip(&rhs_state.part_power)
                    .all(|(lhs_power, rhs_power)| lhs_power <= rhs_power)
                && (lhs_state.part_power != rhs_state.part_power || lhs < rhs)
        };
        domain
            .iter()
            .copied()
            .filter(|&index| {
                !is_saturated(index)
                    || !domain.iter().any(|&other| {
                        other != index && is_saturated(other) && dominates(other, index)
                    })
            })
            .collect()
    }
}
