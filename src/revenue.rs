//! Service-level revenues and penalties.
//!
//! A [`Revenue`] maps a performance level to money: the base price is paid once the base
//! performance is reached, and below it the price is corrected by the first applicable
//! [`Modifier`]. A [`Penalty`] is the same table read as a cost.

use serde::{Deserialize, Serialize};

use crate::{prelude::*, quantity::Mills};

/// Price correction applied below a performance threshold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Modifier {
    /// Constant delta, multiplied by the number of thresholds passed so far.
    Flat { threshold: i64, delta: Mills },

    /// Delta per `step` performance units of distance from the base performance.
    Linear { threshold: i64, delta: Mills, step: i64 },
}

impl Modifier {
    #[must_use]
    pub const fn threshold(&self) -> i64 {
        match self {
            Self::Flat { threshold, .. } | Self::Linear { threshold, .. } => *threshold,
        }
    }

    /// Delta relative to the base price for the performance `performance`.
    ///
    /// `rank` is the zero-based position of this modifier in the descending threshold order.
    #[expect(clippy::cast_possible_wrap)]
    const fn delta(&self, performance: i64, base_performance: i64, rank: usize) -> Mills {
        match *self {
            Self::Flat { delta, .. } => Mills(delta.0 * (rank as i64 + 1)),
            Self::Linear { delta, step, .. } => {
                let distance = base_performance - performance;
                Mills(delta.0 * ((distance + step - 1) / step))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Revenue {
    /// Price paid when the base performance is reached.
    base_price: Mills,

    /// Performance at and above which the base price is paid.
    base_performance: i64,

    /// Price when the performance is below every modifier threshold.
    floor: Mills,

    /// Sorted by descending threshold.
    modifiers: Vec<Modifier>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RevenueDocument {
    base_price: Mills,
    base_performance: i64,
    #[serde(default)]
    floor: Mills,
    #[serde(default)]
    modifiers: Vec<Modifier>,
}

impl<'de> Deserialize<'de> for Revenue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = RevenueDocument::deserialize(deserializer)?;
        Self::try_new(
            document.base_price,
            document.base_performance,
            document.floor,
            document.modifiers,
        )
        .map_err(serde::de::Error::custom)
    }
}

impl Revenue {
    pub fn try_new(
        base_price: Mills,
        base_performance: i64,
        floor: Mills,
        mut modifiers: Vec<Modifier>,
    ) -> Result<Self> {
        for modifier in &modifiers {
            if let Modifier::Linear { step, threshold, .. } = modifier
                && *step <= 0
            {
                return Err(Error::invalid_input(
                    format!("linear modifier at threshold {threshold}"),
                    "the step must be positive",
                ));
            }
        }
        modifiers.sort_by_key(|modifier| std::cmp::Reverse(modifier.threshold()));
        Ok(Self { base_price, base_performance, floor, modifiers })
    }

    /// All-or-nothing objective: the base price when the performance is reached, zero otherwise.
    #[must_use]
    pub const fn threshold(base_price: Mills, base_performance: i64) -> Self {
        Self { base_price, base_performance, floor: Mills::ZERO, modifiers: Vec::new() }
    }

    #[must_use]
    pub const fn base_performance(&self) -> i64 {
        self.base_performance
    }

    #[must_use]
    pub const fn base_price(&self) -> Mills {
        self.base_price
    }

    #[must_use]
    pub fn revenue(&self, performance: i64) -> Mills {
        if performance >= self.base_performance {
            // No reward for exceeding the objective:
            return self.base_price;
        }
        self.modifiers
            .iter()
            .enumerate()
            .find(|(_, modifier)| modifier.threshold() <= performance)
            .map_or(self.floor, |(rank, modifier)| {
                self.base_price + modifier.delta(performance, self.base_performance, rank)
            })
    }

    /// Materialize `revenue(0..=max_performance)` as a lookup table.
    ///
    /// Fails with [`Error::NonMonotonic`] when the table decreases anywhere.
    pub fn flatten(&self, max_performance: i64) -> Result<Vec<i64>> {
        let table: Vec<i64> =
            (0..=max_performance.max(0)).map(|performance| self.revenue(performance).0).collect();
        if let Some((at, window)) =
            table.windows(2).enumerate().find(|(_, window)| window[1] < window[0])
        {
            return Err(Error::NonMonotonic { at: at + 1, previous: window[0], next: window[1] });
        }
        Ok(table)
    }
}

/// Penalty read from a revenue-shaped table: `cost(p) = -revenue(p)`.
///
/// Penalties are normally declared with a zero base price and negative deltas, so that the cost
/// is zero once the objective is met and grows as the performance degrades.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Penalty(pub Revenue);

impl Penalty {
    #[must_use]
    pub fn cost(&self, performance: i64) -> Mills {
        -self.0.revenue(performance)
    }

    /// Non-increasing cost table over `0..=max_performance`.
    pub fn flatten(&self, max_performance: i64) -> Result<Vec<i64>> {
        Ok(self.0.flatten(max_performance)?.into_iter().map(|revenue| -revenue).collect())
    }
}
