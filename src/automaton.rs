//! Per-activity state automaton.
//!
//! Every state is reachable from every other state in one step, so the automaton is a dense
//! `n × n` transition cost matrix over the enumerated states rather than a sparse graph.

mod cost_tensor;
mod state;

use itertools::Itertools;

pub use self::{
    cost_tensor::{CostTensor, Resource},
    state::{PartChoice, State},
};
use crate::{
    catalog::{Activity, DatacenterPart, ForbiddenState, Relocation},
    prelude::*,
};

#[must_use]
pub struct Automaton {
    states: Vec<State>,

    /// Flattened `from × to` matrix of performance penalties.
    costs: Vec<i64>,

    /// State the activity is running in right now, if it could be resolved.
    incoming: Option<usize>,
}

impl Automaton {
    #[instrument(skip_all, fields(activity = activity.id(), relocation = %activity.relocation))]
    pub fn build(activity: &Activity) -> Result<Self> {
        let states: Vec<State> = Self::enumerate(activity)
            .into_iter()
            .filter(|state| {
                !activity.forbidden.iter().any(|rule| Self::matches(activity, rule, state))
            })
            .collect();
        if states.is_empty() {
            return Err(Error::invalid_input(activity.id(), "every state is forbidden"));
        }

        let n_states = states.len();
        let mut costs = vec![0; n_states * n_states];
        for (from_index, from) in states.iter().enumerate() {
            for (to_index, to) in states.iter().enumerate() {
                costs[from_index * n_states + to_index] = Self::transition(activity, from, to);
            }
        }

        let incoming = Self::resolve_incoming(activity, &states);
        trace!(n_states, ?incoming, "built");
        Ok(Self { states, costs, incoming })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    #[must_use]
    pub fn state(&self, index: usize) -> &State {
        &self.states[index]
    }

    #[must_use]
    pub const fn incoming(&self) -> Option<usize> {
        self.incoming
    }

    /// Override the incoming state, for example with the last state of a preceding window.
    pub const fn set_incoming(&mut self, incoming: Option<usize>) {
        self.incoming = incoming;
    }

    #[must_use]
    pub fn transition_cost(&self, from: usize, to: usize) -> i64 {
        self.costs[from * self.states.len() + to]
    }

    /// Highest cost of entering the state from any state.
    #[must_use]
    pub fn worst_case_cost(&self, to: usize) -> i64 {
        (0..self.states.len()).map(|from| self.transition_cost(from, to)).max().unwrap_or_default()
    }

    /// Performance realized when entering `to` from `from`, never below zero.
    #[must_use]
    pub fn realized_performance(&self, from: usize, to: usize) -> i64 {
        (self.states[to].perf() - self.transition_cost(from, to)).max(0)
    }

    #[must_use]
    pub fn state_index(&self, activity: &Activity, name: &str) -> Option<usize> {
        self.states.iter().position(|state| state.name(activity) == name)
    }

    fn enumerate(activity: &Activity) -> Vec<State> {
        let part_choices = |part_index: usize| {
            activity.parts[part_index]
                .modes
                .iter()
                .enumerate()
                .flat_map(|(mode, working_mode)| {
                    (0..working_mode.levels.len()).map(move |level| PartChoice { mode, level })
                })
                .collect_vec()
        };
        let pinned = |active: usize, choice: PartChoice| {
            activity
                .parts
                .iter()
                .enumerate()
                .map(|(index, part)| {
                    if index == active {
                        choice
                    } else {
                        PartChoice { mode: part.default_mode_index(), level: 0 }
                    }
                })
                .collect_vec()
        };
        match activity.relocation {
            Relocation::Fixed | Relocation::Migratable => (0..activity.parts.len())
                .flat_map(|active| {
                    part_choices(active)
                        .into_iter()
                        .map(move |choice| (active, choice))
                })
                .map(|(active, choice)| State::new(activity, pinned(active, choice), Some(active)))
                .collect(),
            Relocation::Spreadable => (0..activity.parts.len())
                .map(part_choices)
                .multi_cartesian_product()
                .map(|choices| State::new(activity, choices, None))
                .collect(),
        }
    }

    /// A rule matches when the state runs every mode it lists.
    fn matches(activity: &Activity, rule: &ForbiddenState, state: &State) -> bool {
        !rule.modes.is_empty()
            && rule.modes.iter().all(|forbidden| {
                activity.part_index(&forbidden.datacenter).is_some_and(|part_index| {
                    activity.parts[part_index].mode_index(&forbidden.mode)
                        == Some(state.choices[part_index].mode)
                })
            })
    }

    fn transition(activity: &Activity, from: &State, to: &State) -> i64 {
        let parts_cost: i64 = activity
            .parts
            .iter()
            .zip(from.choices.iter().zip(&to.choices))
            .map(|(part, (from, to))| part.transition_cost(from.mode, to.mode))
            .sum();
        let is_migration =
            activity.relocation == Relocation::Migratable && from.active != to.active;
        let migration_cost = if is_migration { activity.migration_penalty } else { 0 };
        parts_cost + migration_cost
    }

    fn resolve_incoming(activity: &Activity, states: &[State]) -> Option<usize> {
        if activity.parts.iter().all(|part| part.current_mode.is_none()) {
            return None;
        }
        let current_modes =
            activity.parts.iter().map(DatacenterPart::current_mode_index).collect_vec();
        let active = match activity.relocation {
            Relocation::Spreadable => None,
            Relocation::Fixed | Relocation::Migratable => Some(
                activity
                    .parts
                    .iter()
                    .position(|part| {
                        part.current_mode.is_some()
                            && part.current_mode_index() != part.default_mode_index()
                    })
                    .or_else(|| {
                        activity.parts.iter().position(|part| part.current_mode.is_some())
                    })?,
            ),
        };
        states.iter().position(|state| {
            state.active == active
                && match active {
                    Some(active) => state.choices[active].mode == current_modes[active],
                    None => state
                        .choices
                        .iter()
                        .zip(&current_modes)
                        .all(|(choice, mode)| choice.mode == *mode),
                }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{DatacenterPart, ForbiddenMode, PerfLevel, WorkingMode},
        quantity::Watts,
    };

    fn level(performance: i64, power: i64) -> PerfLevel {
        PerfLevel { performance, power: Watts(power) }
    }

    fn part(datacenter: &str, modes: Vec<WorkingMode>) -> DatacenterPart {
        DatacenterPart {
            datacenter: datacenter.into(),
            default_mode: modes[0].name.clone(),
            modes,
            current_mode: None,
        }
    }

    fn activity(relocation: Relocation, parts: Vec<DatacenterPart>) -> Activity {
        Activity {
            owner: "acme".into(),
            name: "web".into(),
            relocation,
            parts,
            migration_penalty: 5,
            forbidden: Vec::new(),
            revenues: Vec::new(),
            replay: Vec::new(),
        }
    }

    fn two_parts() -> Vec<DatacenterPart> {
        vec![
            part(
                "dc1",
                vec![
                    WorkingMode::new("off", [level(0, 0)]),
                    WorkingMode::new("on", [level(2, 1), level(3, 2)]).with_transition("off", 1),
                ],
            ),
            part(
                "dc2",
                vec![
                    WorkingMode::new("off", [level(0, 0)]),
                    WorkingMode::new("on", [level(2, 2), level(4, 3)]),
                ],
            ),
        ]
    }

    #[test]
    fn test_fixed_state_count() -> Result {
        let activity = activity(Relocation::Fixed, vec![two_parts().remove(0)]);
        let automaton = Automaton::build(&activity)?;
        assert_eq!(automaton.len(), 3);
        Ok(())
    }

    #[test]
    fn test_migratable_state_count() -> Result {
        let automaton = Automaton::build(&activity(Relocation::Migratable, two_parts()))?;
        assert_eq!(automaton.len(), 3 + 3);
        Ok(())
    }

    #[test]
    fn test_spreadable_state_count() -> Result {
        let automaton = Automaton::build(&activity(Relocation::Spreadable, two_parts()))?;
        assert_eq!(automaton.len(), 3 * 3);
        Ok(())
    }

    #[test]
    fn test_forbidden_states() -> Result {
        let mut activity = activity(Relocation::Spreadable, two_parts());
        activity.forbidden.push(ForbiddenState {
            modes: vec![
                ForbiddenMode { datacenter: "dc1".into(), mode: "on".into() },
                ForbiddenMode { datacenter: "dc2".into(), mode: "on".into() },
            ],
        });
        let automaton = Automaton::build(&activity)?;
        assert_eq!(automaton.len(), 9 - 2 * 2);
        assert!(automaton.state_index(&activity, "dc1:on#1+dc2:on#0").is_none());
        assert!(automaton.state_index(&activity, "dc1:on#1+dc2:off").is_some());
        Ok(())
    }

    #[test]
    fn test_zero_self_transition() -> Result {
        for relocation in [Relocation::Migratable, Relocation::Spreadable] {
            let automaton = Automaton::build(&activity(relocation, two_parts()))?;
            for index in 0..automaton.len() {
                assert_eq!(automaton.transition_cost(index, index), 0);
            }
        }
        Ok(())
    }

    #[test]
    fn test_migration_penalty() -> Result {
        let activity = activity(Relocation::Migratable, two_parts());
        let automaton = Automaton::build(&activity)?;
        let dc1_on = automaton.state_index(&activity, "dc1:on#0").unwrap();
        let dc1_off = automaton.state_index(&activity, "dc1:off").unwrap();
        let dc2_on = automaton.state_index(&activity, "dc2:on#1").unwrap();
        assert_eq!(automaton.transition_cost(dc1_on, dc2_on), 1 + 5);
        assert_eq!(automaton.transition_cost(dc2_on, dc1_on), 5);
        assert_eq!(automaton.transition_cost(dc1_on, dc1_off), 1);
        assert_eq!(automaton.worst_case_cost(dc2_on), 6);
        Ok(())
    }

    #[test]
    fn test_incoming_state() -> Result {
        let mut parts = two_parts();
        parts[1].current_mode = Some("on".into());
        let activity = activity(Relocation::Migratable, parts);
        let automaton = Automaton::build(&activity)?;
        assert_eq!(automaton.incoming(), automaton.state_index(&activity, "dc2:on#0"));
        Ok(())
    }
}
