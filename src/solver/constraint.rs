use std::sync::Arc;

use itertools::Itertools;

use crate::{
    automaton::CostTensor,
    solver::{Propagation, Store, VarId, ceil_div, floor_div},
};

#[must_use]
pub enum Constraint {
    /// `Σ coefficient × variable + constant = 0`.
    LinearEq(Linear),

    /// `Σ coefficient × variable + constant ≤ 0`.
    LinearLe(Linear),

    Element(Element),
    CostAutomaton(CostAutomaton),
    Ratio(Ratio),
}

impl Constraint {
    #[must_use]
    pub fn variables(&self) -> Vec<VarId> {
        match self {
            Self::LinearEq(linear) | Self::LinearLe(linear) => {
                linear.terms.iter().map(|(_, var)| *var).collect()
            }
            Self::Element(element) => vec![element.index, element.value],
            Self::CostAutomaton(automaton) => {
                automaton.states.iter().copied().chain([automaton.total]).collect()
            }
            Self::Ratio(ratio) => vec![ratio.numerator, ratio.denominator, ratio.ratio],
        }
    }

    /// Narrow the domains according to the constraint.
    ///
    /// Propagation is sound but not necessarily complete: it never removes a value taking part
    /// in a solution, and the constraint is checked exactly once every variable is fixed.
    pub fn propagate(&self, store: &mut Store) -> Propagation<()> {
        match self {
            Self::LinearEq(linear) => linear.propagate(store, true),
            Self::LinearLe(linear) => linear.propagate(store, false),
            Self::Element(element) => element.propagate(store),
            Self::CostAutomaton(automaton) => automaton.propagate(store),
            Self::Ratio(ratio) => ratio.propagate(store),
        }
    }
}

#[must_use]
pub struct Linear {
    terms: Vec<(i64, VarId)>,
    constant: i64,
}

impl Linear {
    pub fn new(terms: impl IntoIterator<Item = (i64, VarId)>, constant: i64) -> Self {
        Self {
            terms: terms.into_iter().filter(|(coefficient, _)| *coefficient != 0).collect(),
            constant,
        }
    }

    /// Bounds consistency on the sum.
    fn propagate(&self, store: &mut Store, is_equality: bool) -> Propagation<()> {
        let term_bounds = |store: &Store, (coefficient, var): (i64, VarId)| {
            if coefficient > 0 {
                (coefficient * store.min(var), coefficient * store.max(var))
            } else {
                (coefficient * store.max(var), coefficient * store.min(var))
            }
        };
        let (sum_min, sum_max) = self.terms.iter().fold(
            (self.constant, self.constant),
            |(sum_min, sum_max), term| {
                let (min, max) = term_bounds(store, *term);
                (sum_min + min, sum_max + max)
            },
        );
        if sum_min > 0 || (is_equality && sum_max < 0) {
            return Err(super::Inconsistency);
        }

        for &(coefficient, var) in &self.terms {
            let (term_min, term_max) = term_bounds(store, (coefficient, var));

            // The term must compensate the rest of the sum: `coefficient × var ∈ lower..=upper`.
            let upper = term_min - sum_min;
            let lower = if is_equality { term_max - sum_max } else { i64::MIN / 2 };

            if coefficient > 0 {
                store.set_bounds(var, ceil_div(lower, coefficient), floor_div(upper, coefficient))?;
            } else {
                store.set_bounds(var, ceil_div(upper, coefficient), floor_div(lower, coefficient))?;
            }
        }
        Ok(())
    }
}

/// `value = table[index]`.
#[must_use]
pub struct Element {
    pub index: VarId,
    pub table: Arc<[i64]>,
    pub value: VarId,
}

impl Element {
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    fn propagate(&self, store: &mut Store) -> Propagation<()> {
        store.set_bounds(self.index, 0, self.table.len() as i64 - 1)?;

        let (value_min, value_max) = (store.min(self.value), store.max(self.value));
        store.retain(self.index, |index| {
            (value_min..=value_max).contains(&self.table[index as usize])
        })?;

        let (min, max) = store
            .domain(self.index)
            .iter()
            .map(|index| self.table[index as usize])
            .minmax()
            .into_option()
            .ok_or(super::Inconsistency)?;
        store.set_bounds(self.value, min, max)?;
        Ok(())
    }
}

/// Walk of an activity through its automaton, accumulating one resource of a [`CostTensor`].
///
/// `total = offset + Σ tensor[slot][states[slot]][resource][states[slot - 1]]`, where the state
/// before the first slot is the incoming state. Without one, the first slot is entered from the
/// state itself.
#[must_use]
pub struct CostAutomaton {
    pub states: Vec<VarId>,
    pub incoming: Option<usize>,
    pub tensor: Arc<CostTensor>,
    pub resource: usize,
    pub offset: i64,
    pub total: VarId,
}

/// Best and worst partial sums for one candidate state.
#[derive(Copy, Clone)]
struct Partial {
    state: usize,
    min: i64,
    max: i64,
}

impl CostAutomaton {
    /// Forward and backward sweeps over the layered graph of the current state domains.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn propagate(&self, store: &mut Store) -> Propagation<()> {
        let Some(last_slot) = self.states.len().checked_sub(1) else {
            store.set_bounds(self.total, self.offset, self.offset)?;
            return Ok(());
        };
        let layers: Vec<Vec<usize>> = self
            .states
            .iter()
            .map(|var| store.domain(*var).iter().map(|state| state as usize).collect())
            .collect();
        let cost =
            |slot: usize, to: usize, from: usize| self.tensor.get(slot, to, self.resource, from);

        let mut forward: Vec<Vec<Partial>> = Vec::with_capacity(layers.len());
        forward.push(
            layers[0]
                .iter()
                .map(|&state| {
                    let value = cost(0, state, self.incoming.unwrap_or(state));
                    Partial { state, min: value, max: value }
                })
                .collect(),
        );
        for slot in 1..layers.len() {
            let layer = layers[slot]
                .iter()
                .map(|&state| {
                    Self::relax(state, &forward[slot - 1], |from| cost(slot, state, from))
                })
                .collect();
            forward.push(layer);
        }

        let mut backward: Vec<Vec<Partial>> = vec![Vec::new(); layers.len()];
        backward[last_slot] = layers[last_slot]
            .iter()
            .map(|&state| Partial { state, min: 0, max: 0 })
            .collect();
        for slot in (0..last_slot).rev() {
            backward[slot] = layers[slot]
                .iter()
                .map(|&state| {
                    Self::relax(state, &backward[slot + 1], |to| cost(slot + 1, to, state))
                })
                .collect();
        }

        let (total_min, total_max) = forward[last_slot]
            .iter()
            .fold((i64::MAX, i64::MIN), |(min, max), partial| {
                (min.min(partial.min), max.max(partial.max))
            });
        store.set_bounds(self.total, self.offset + total_min, self.offset + total_max)?;

        // Drop the states every walk through which misses the total:
        let (total_min, total_max) = (store.min(self.total), store.max(self.total));
        for (slot, var) in self.states.iter().enumerate() {
            let supported: Vec<usize> = forward[slot]
                .iter()
                .zip(&backward[slot])
                .filter(|(forward, backward)| {
                    self.offset + forward.min + backward.min <= total_max
                        && self.offset + forward.max + backward.max >= total_min
                })
                .map(|(forward, _)| forward.state)
                .collect();
            store.retain(*var, |state| supported.contains(&(state as usize)))?;
        }
        Ok(())
    }

    fn relax(state: usize, neighbours: &[Partial], cost: impl Fn(usize) -> i64) -> Partial {
        let (min, max) = neighbours.iter().fold((i64::MAX, i64::MIN), |(min, max), neighbour| {
            let value = cost(neighbour.state);
            (min.min(neighbour.min + value), max.max(neighbour.max + value))
        });
        Partial { state, min, max }
    }
}

/// `ratio = ⌊scale × (numerator + numerator_offset) / (denominator + denominator_offset)⌋`,
/// or `if_undefined` when the denominator sums to zero.
///
/// Only the ratio is narrowed.
#[must_use]
pub struct Ratio {
    pub numerator: VarId,
    pub numerator_offset: i64,
    pub denominator: VarId,
    pub denominator_offset: i64,
    pub scale: i64,
    pub if_undefined: i64,
    pub ratio: VarId,
}

impl Ratio {
    fn propagate(&self, store: &mut Store) -> Propagation<()> {
        let numerator_min = store.min(self.numerator) + self.numerator_offset;
        let numerator_max = store.max(self.numerator) + self.numerator_offset;
        let denominator_min = (store.min(self.denominator) + self.denominator_offset).max(0);
        let denominator_max = store.max(self.denominator) + self.denominator_offset;

        if denominator_max <= 0 {
            store.assign(self.ratio, self.if_undefined)?;
            return Ok(());
        }
        let mut min = floor_div(
            self.scale * numerator_min,
            if numerator_min >= 0 { denominator_max } else { denominator_min.max(1) },
        );
        let mut max = floor_div(
            self.scale * numerator_max,
            if numerator_max >= 0 { denominator_min.max(1) } else { denominator_max },
        );
        if denominator_min == 0 {
            min = min.min(self.if_undefined);
            max = max.max(self.if_undefined);
        }
        store.set_bounds(self.ratio, min, max)?;
        Ok(())
    }
}
