use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{catalog::shift_range, prelude::*, quantity::Watts, revenue::Penalty};

/// Energy already consumed on a site in the elapsed part of an objective window, in watt-slots.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EnergyHistory {
    /// Renewable part of the consumed energy.
    pub renewable: Watts,

    pub total: Watts,
}

/// Site-wide objective evaluated over a slot window, turned into a penalty.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SiteObjective {
    /// Renewable share of the energy consumed on the site over `[from, to)`, in tenths of
    /// a percent, mapped through the penalty.
    RenewablePercentage {
        datacenter: String,
        from: i64,
        to: i64,
        penalty: Penalty,
        #[serde(default)]
        history: EnergyHistory,
    },
}

impl SiteObjective {
    #[must_use]
    pub fn datacenter(&self) -> &str {
        match self {
            Self::RenewablePercentage { datacenter, .. } => datacenter,
        }
    }

    /// The declared window `[from, to)`, possibly starting before the horizon.
    #[must_use]
    pub const fn declared_window(&self) -> (i64, i64) {
        match self {
            Self::RenewablePercentage { from, to, .. } => (*from, *to),
        }
    }

    pub fn validate(&self) -> Result {
        match self {
            Self::RenewablePercentage { datacenter, from, to, history, .. } => {
                if from >= to {
                    return Err(Error::invalid_input(
                        format!("renewable percentage objective on `{datacenter}`"),
                        format!("empty window [{from}, {to})"),
                    ));
                }
                if history.renewable > history.total || history.renewable < Watts::ZERO {
                    return Err(Error::invalid_input(
                        format!("renewable percentage objective on `{datacenter}`"),
                        "the renewable history must be within the total",
                    ));
                }
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn window(&self, slots: &Range<usize>, keep_history: bool) -> Option<Self> {
        match self {
            Self::RenewablePercentage { datacenter, from, to, penalty, history } => {
                shift_range(*from, *to, slots).map(|(from, to)| Self::RenewablePercentage {
                    datacenter: datacenter.clone(),
                    from,
                    to,
                    penalty: penalty.clone(),
                    history: if keep_history { *history } else { EnergyHistory::default() },
                })
            }
        }
    }
}
