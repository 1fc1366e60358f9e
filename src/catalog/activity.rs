use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter},
    ops::Range,
};

use serde::{Deserialize, Serialize};

use crate::{catalog::shift_range, prelude::*, quantity::Watts, revenue::Revenue};

/// How an activity may be placed across data centers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relocation {
    /// Runs on a single data center.
    Fixed,

    /// Runs on one data center at a time, may switch between slots.
    Migratable,

    /// Runs on several data centers simultaneously and independently.
    Spreadable,
}

impl Display for Relocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Migratable => write!(f, "migratable"),
            Self::Spreadable => write!(f, "spreadable"),
        }
    }
}

/// One discrete performance/power trade-off point of a working mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PerfLevel {
    pub performance: i64,
    pub power: Watts,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkingMode {
    pub name: String,

    pub levels: Vec<PerfLevel>,

    /// Performance lost when switching from this mode to the named one.
    #[serde(default)]
    pub transitions: BTreeMap<String, i64>,
}

impl WorkingMode {
    #[must_use]
    pub fn new(name: impl Into<String>, levels: impl IntoIterator<Item = PerfLevel>) -> Self {
        Self {
            name: name.into(),
            levels: levels.into_iter().collect(),
            transitions: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_transition(mut self, to: impl Into<String>, cost: i64) -> Self {
        self.transitions.insert(to.into(), cost);
        self
    }
}

/// Part of an activity deployed on one data center.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatacenterPart {
    pub datacenter: String,

    pub modes: Vec<WorkingMode>,

    /// Mode the part is pinned to while it is not the active part of a migratable activity.
    #[serde(rename = "default-mode")]
    pub default_mode: String,

    /// Mode the part is running right now, if known.
    #[serde(default, rename = "current-mode")]
    pub current_mode: Option<String>,
}

impl DatacenterPart {
    #[must_use]
    pub fn mode_index(&self, name: &str) -> Option<usize> {
        self.modes.iter().position(|mode| mode.name == name)
    }

    /// Index of the default mode, valid after [`Activity::validate`].
    #[must_use]
    pub fn default_mode_index(&self) -> usize {
        self.mode_index(&self.default_mode).unwrap_or_default()
    }

    /// Index of the running mode, falling back to the default mode.
    #[must_use]
    pub fn current_mode_index(&self) -> usize {
        self.current_mode
            .as_deref()
            .and_then(|name| self.mode_index(name))
            .unwrap_or_else(|| self.default_mode_index())
    }

    /// Performance penalty for switching between the two modes, zero when staying.
    #[must_use]
    pub fn transition_cost(&self, from: usize, to: usize) -> i64 {
        if from == to {
            return 0;
        }
        self.modes[from].transitions.get(&self.modes[to].name).copied().unwrap_or_default()
    }

    /// Maximum power this part may draw in any mode.
    #[must_use]
    pub fn max_power(&self) -> Watts {
        self.modes
            .iter()
            .flat_map(|mode| mode.levels.iter().map(|level| level.power))
            .max()
            .unwrap_or_default()
    }

    fn validate(&self, context: &str) -> Result {
        let context = format!("{context} on `{}`", self.datacenter);
        if self.modes.is_empty() {
            return Err(Error::invalid_input(context, "no working modes"));
        }
        let mut names = BTreeSet::new();
        for mode in &self.modes {
            if !names.insert(mode.name.as_str()) {
                return Err(Error::invalid_input(
                    context,
                    format!("duplicate mode `{}`", mode.name),
                ));
            }
            if mode.levels.is_empty() {
                return Err(Error::invalid_input(
                    context,
                    format!("mode `{}` has no performance levels", mode.name),
                ));
            }
            if mode.levels.iter().any(|level| level.performance < 0 || level.power < Watts::ZERO) {
                return Err(Error::invalid_input(
                    context,
                    format!("mode `{}` has a negative performance or power", mode.name),
                ));
            }
        }
        for mode in &self.modes {
            for (to, cost) in &mode.transitions {
                if !names.contains(to.as_str()) {
                    return Err(Error::invalid_input(
                        context,
                        format!("transition from `{}` to unknown mode `{to}`", mode.name),
                    ));
                }
                if *cost < 0 {
                    return Err(Error::invalid_input(
                        context,
                        format!("negative transition cost from `{}` to `{to}`", mode.name),
                    ));
                }
            }
        }
        if !names.contains(self.default_mode.as_str()) {
            return Err(Error::invalid_input(
                context,
                format!("unknown default mode `{}`", self.default_mode),
            ));
        }
        if let Some(current_mode) = &self.current_mode
            && !names.contains(current_mode.as_str())
        {
            return Err(Error::invalid_input(
                context,
                format!("unknown current mode `{current_mode}`"),
            ));
        }
        Ok(())
    }
}

/// Working mode that takes part in a forbidden combination.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ForbiddenMode {
    pub datacenter: String,
    pub mode: String,
}

/// A state is forbidden when it runs every listed mode at once.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ForbiddenState {
    pub modes: Vec<ForbiddenMode>,
}

/// Service-level objective of an activity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RevenueObjective {
    /// Pays for the performance reached at a single slot.
    Instant { slot: usize, revenue: Revenue },

    /// Pays for the performance accumulated over the slots `[from, to)`.
    ///
    /// The window may start before the horizon: `achieved` is the performance accumulated over
    /// the elapsed part.
    Cumulative {
        from: i64,
        to: i64,
        revenue: Revenue,
        #[serde(default)]
        achieved: i64,
    },
}

impl RevenueObjective {
    #[must_use]
    pub const fn revenue(&self) -> &Revenue {
        match self {
            Self::Instant { revenue, .. } | Self::Cumulative { revenue, .. } => revenue,
        }
    }

    /// Slots `[from, to)` of a cumulative window clipped to the horizon.
    #[must_use]
    pub fn cumulative_slots(&self, n_slots: usize) -> Option<Range<usize>> {
        match self {
            Self::Instant { .. } => None,
            Self::Cumulative { from, to, .. } => {
                let from = usize::try_from((*from).max(0)).unwrap_or_default();
                let to = usize::try_from((*to).max(0)).unwrap_or_default().min(n_slots);
                Some(from..to.max(from))
            }
        }
    }
}

/// Forced state name at a slot.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    pub slot: usize,
    pub state: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Activity {
    pub owner: String,

    pub name: String,

    pub relocation: Relocation,

    pub parts: Vec<DatacenterPart>,

    /// Extra performance penalty when a migratable activity changes its active data center.
    #[serde(default, rename = "migration-penalty")]
    pub migration_penalty: i64,

    #[serde(default)]
    pub forbidden: Vec<ForbiddenState>,

    #[serde(default)]
    pub revenues: Vec<RevenueObjective>,

    /// States pinned by an already decided schedule.
    #[serde(default)]
    pub replay: Vec<Replay>,
}

impl Activity {
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    #[must_use]
    pub fn part_index(&self, datacenter: &str) -> Option<usize> {
        self.parts.iter().position(|part| part.datacenter == datacenter)
    }

    /// Upper bound of the total power the activity may ever draw.
    #[must_use]
    pub fn max_power(&self) -> Watts {
        match self.relocation {
            Relocation::Fixed | Relocation::Migratable => {
                self.parts.iter().map(DatacenterPart::max_power).max().unwrap_or_default()
                    + self.default_power()
            }
            Relocation::Spreadable => self.parts.iter().map(DatacenterPart::max_power).sum(),
        }
    }

    /// Power drawn by all the parts pinned to their default modes at the highest level.
    fn default_power(&self) -> Watts {
        self.parts
            .iter()
            .map(|part| {
                part.modes[part.default_mode_index()]
                    .levels
                    .iter()
                    .map(|level| level.power)
                    .max()
                    .unwrap_or_default()
            })
            .sum()
    }

    pub(super) fn validate(&self, n_slots: usize) -> Result {
        let id = self.id();
        if self.parts.is_empty() {
            return Err(Error::invalid_input(id, "no data center parts"));
        }
        if self.relocation == Relocation::Fixed && self.parts.len() != 1 {
            return Err(Error::invalid_input(id, "a fixed activity must have exactly one part"));
        }
        let mut datacenters = BTreeSet::new();
        for part in &self.parts {
            if !datacenters.insert(part.datacenter.as_str()) {
                return Err(Error::invalid_input(
                    id,
                    format!("several parts on `{}`", part.datacenter),
                ));
            }
            part.validate(&id)?;
        }
        if self.migration_penalty < 0 {
            return Err(Error::invalid_input(id, "negative migration penalty"));
        }
        for rule in &self.forbidden {
            for forbidden in &rule.modes {
                let known = self
                    .part_index(&forbidden.datacenter)
                    .is_some_and(|index| self.parts[index].mode_index(&forbidden.mode).is_some());
                if !known {
                    return Err(Error::invalid_input(
                        id,
                        format!(
                            "forbidden state references unknown mode `{}` on `{}`",
                            forbidden.mode, forbidden.datacenter,
                        ),
                    ));
                }
            }
        }
        for objective in &self.revenues {
            match objective {
                RevenueObjective::Instant { slot, .. } if *slot >= n_slots => {
                    return Err(Error::invalid_input(
                        id,
                        format!("instant objective at slot #{slot} is beyond the horizon"),
                    ));
                }
                RevenueObjective::Cumulative { from, to, achieved, .. }
                    if from >= to || *achieved < 0 =>
                {
                    return Err(Error::invalid_input(
                        id,
                        format!("malformed cumulative window [{from}, {to}), {achieved} achieved"),
                    ));
                }
                _ => {}
            }
        }
        if let Some(replay) = self.replay.iter().find(|replay| replay.slot >= n_slots) {
            return Err(Error::invalid_input(
                id,
                format!("replay at slot #{} is beyond the horizon", replay.slot),
            ));
        }
        Ok(())
    }

    /// Copy of the activity re-indexed to the slots `slots`.
    #[must_use]
    pub fn window(&self, slots: &Range<usize>, keep_history: bool) -> Self {
        let revenues = self
            .revenues
            .iter()
            .filter_map(|objective| match objective {
                RevenueObjective::Instant { slot, revenue } => slots.contains(slot).then(|| {
                    RevenueObjective::Instant { slot: slot - slots.start, revenue: revenue.clone() }
                }),
                RevenueObjective::Cumulative { from, to, revenue, achieved } => {
                    shift_range(*from, *to, slots).map(|(from, to)| RevenueObjective::Cumulative {
                        from,
                        to,
                        revenue: revenue.clone(),
                        achieved: if keep_history { *achieved } else { 0 },
                    })
                }
            })
            .collect();
        let replay = self
            .replay
            .iter()
            .filter(|replay| slots.contains(&replay.slot))
            .map(|replay| Replay { slot: replay.slot - slots.start, state: replay.state.clone() })
            .collect();
        Self {
            owner: self.owner.clone(),
            name: self.name.clone(),
            relocation: self.relocation,
            parts: self.parts.clone(),
            migration_penalty: self.migration_penalty,
            forbidden: self.forbidden.clone(),
            revenues,
            replay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part() -> DatacenterPart {
        DatacenterPart {
            datacenter: "dc1".into(),
            modes: vec![
                WorkingMode::new("off", [PerfLevel { performance: 0, power: Watts(0) }]),
                WorkingMode::new("on", [PerfLevel { performance: 2, power: Watts(3) }])
                    .with_transition("off", 1),
            ],
            default_mode: "off".into(),
            current_mode: Some("on".into()),
        }
    }

    #[test]
    fn test_transition_cost() {
        let part = part();
        assert_eq!(part.transition_cost(1, 0), 1);
        assert_eq!(part.transition_cost(0, 1), 0);
        assert_eq!(part.transition_cost(1, 1), 0);
        assert_eq!(part.current_mode_index(), 1);
    }

    #[test]
    fn test_unknown_default_mode() {
        let mut part = part();
        part.default_mode = "idle".into();
        assert!(matches!(part.validate("test"), Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn test_window_drops_history() {
        let activity = Activity {
            owner: "acme".into(),
            name: "batch".into(),
            relocation: Relocation::Fixed,
            parts: vec![part()],
            migration_penalty: 0,
            forbidden: Vec::new(),
            revenues: vec![
                RevenueObjective::Cumulative {
                    from: 4,
                    to: 6,
                    revenue: Revenue::threshold(crate::quantity::Mills(10), 2),
                    achieved: 3,
                },
                RevenueObjective::Instant {
                    slot: 1,
                    revenue: Revenue::threshold(crate::quantity::Mills(10), 2),
                },
            ],
            replay: vec![Replay { slot: 5, state: "on".into() }],
        };
        let window = activity.window(&(4..8), false);
        assert_eq!(window.revenues.len(), 1);
        assert!(matches!(
            window.revenues[0],
            RevenueObjective::Cumulative { from: 0, to: 2, achieved: 0, .. }
        ));
        assert_eq!(window.replay, vec![Replay { slot: 1, state: "on".into() }]);
    }
}
