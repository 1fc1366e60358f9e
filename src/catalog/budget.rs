use std::{collections::BTreeSet, ops::Range};

use serde::{Deserialize, Serialize};

use crate::{prelude::*, quantity::Watts};

/// Cap on the consumption of a group of activities on one data center.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Quota {
    /// Total power at a single slot.
    Power { slot: usize, cap: Watts },

    /// Total energy, in watt-slots, over the slots `[from, to)`.
    Energy { from: usize, to: usize, cap: Watts },
}

impl Quota {
    /// Slots the quota spans.
    #[must_use]
    pub const fn slots(&self) -> Range<usize> {
        match *self {
            Self::Power { slot, .. } => slot..(slot + 1),
            Self::Energy { from, to, .. } => from..to,
        }
    }

    #[must_use]
    pub const fn cap(&self) -> Watts {
        match *self {
            Self::Power { cap, .. } | Self::Energy { cap, .. } => cap,
        }
    }
}

/// Quota budget granted to the activities of one owner.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub name: String,

    /// Activity identifiers, `owner/name`.
    pub activities: Vec<String>,

    pub datacenter: String,

    pub quota: Quota,
}

impl Budget {
    pub fn validate(&self, n_slots: usize, activities: &BTreeSet<String>) -> Result {
        let context = || format!("budget `{}`", self.name);
        if let Some(unknown) = self.activities.iter().find(|id| !activities.contains(*id)) {
            return Err(Error::invalid_input(context(), format!("unknown activity `{unknown}`")));
        }
        let slots = self.quota.slots();
        if slots.is_empty() || slots.end > n_slots {
            return Err(Error::invalid_input(
                context(),
                format!("slots {}..{} are outside the horizon", slots.start, slots.end),
            ));
        }
        if self.quota.cap() < Watts::ZERO {
            return Err(Error::invalid_input(context(), "negative cap"));
        }
        Ok(())
    }

    /// The budget re-indexed to the window, if it falls entirely inside.
    #[must_use]
    pub fn window(&self, window: &Range<usize>) -> Option<Self> {
        let slots = self.quota.slots();
        if slots.start < window.start || slots.end > window.end {
            return None;
        }
        let quota = match self.quota {
            Quota::Power { slot, cap } => Quota::Power { slot: slot - window.start, cap },
            Quota::Energy { from, to, cap } => {
                Quota::Energy { from: from - window.start, to: to - window.start, cap }
            }
        };
        Some(Self { quota, ..self.clone() })
    }
}
