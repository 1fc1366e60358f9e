use itertools::Itertools;

use crate::{
    catalog::{Activity, Relocation},
    quantity::Watts,
};

/// Mode and performance level chosen for one data center part.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PartChoice {
    pub mode: usize,
    pub level: usize,
}

/// Composite choice of a performance level for every part of an activity, valid for one slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct State {
    /// Indexed by part.
    pub choices: Vec<PartChoice>,

    /// The part running at non-default performance, for fixed and migratable activities.
    pub active: Option<usize>,

    /// Power drawn on each part's data center, indexed by part.
    pub part_power: Vec<Watts>,

    performance: i64,
}

impl State {
    pub(super) fn new(
        activity: &Activity,
        choices: Vec<PartChoice>,
        active: Option<usize>,
    ) -> Self {
        let levels = choices.iter().zip(&activity.parts).map(|(choice, part)| {
            part.modes[choice.mode].levels[choice.level]
        });
        let (part_power, performance) = levels.fold(
            (Vec::with_capacity(choices.len()), 0),
            |(mut part_power, performance), level| {
                part_power.push(level.power);
                (part_power, performance + level.performance)
            },
        );
        Self { choices, active, part_power, performance }
    }

    /// Aggregate power across the parts.
    #[must_use]
    pub fn power(&self) -> Watts {
        self.part_power.iter().copied().sum()
    }

    /// Aggregate performance across the parts.
    #[must_use]
    pub const fn perf(&self) -> i64 {
        self.performance
    }

    /// Whether both states run the same working modes, whatever the levels.
    #[must_use]
    pub fn same_modes(&self, other: &Self) -> bool {
        self.active == other.active
            && self.choices.iter().zip(&other.choices).all(|(lhs, rhs)| lhs.mode == rhs.mode)
    }

    /// Stable human-readable name, also used to resolve replayed schedules.
    #[must_use]
    pub fn name(&self, activity: &Activity) -> String {
        let describe = |part_index: usize, with_datacenter: bool| {
            let part = &activity.parts[part_index];
            let choice = self.choices[part_index];
            let mode = &part.modes[choice.mode];
            let mut name = if with_datacenter {
                format!("{}:{}", part.datacenter, mode.name)
            } else {
                mode.name.clone()
            };
            if mode.levels.len() > 1 {
                name.push_str(&format!("#{}", choice.level));
            }
            name
        };
        match (activity.relocation, self.active) {
            (Relocation::Spreadable, _) | (_, None) => {
                (0..self.choices.len()).map(|index| describe(index, true)).join("+")
            }
            (_, Some(active)) if activity.parts.len() == 1 => describe(active, false),
            (_, Some(active)) => describe(active, true),
        }
    }
}
