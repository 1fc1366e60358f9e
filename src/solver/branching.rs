//! Branching strategies: which variable to decide next, and which value to try first.

use crate::solver::{Domain, Store, VarId};

pub trait VariableSelector {
    /// Pick one of the candidates, which are never fixed and never empty.
    fn select(&mut self, store: &Store, candidates: &[VarId]) -> VarId;
}

pub trait ValueSelector {
    /// Pick a value from the variable's domain to try first.
    fn select(&mut self, store: &Store, var: VarId) -> i64;
}

/// Decision taken at a choice point.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Branch {
    /// `var = value`, refuted by `var ≠ value`.
    Assign { var: VarId, value: i64 },

    /// `var ≤ value`, refuted by `var > value`.
    ///
    /// Used for inner values of intervals, which cannot be removed.
    Split { var: VarId, value: i64 },
}

/// Group of variables decided together, before any variable of the next phase.
#[must_use]
pub struct Phase {
    vars: Vec<VarId>,
    variables: Box<dyn VariableSelector>,
    values: Box<dyn ValueSelector>,
}

impl Phase {
    pub fn new(
        vars: Vec<VarId>,
        variables: impl VariableSelector + 'static,
        values: impl ValueSelector + 'static,
    ) -> Self {
        Self { vars, variables: Box::new(variables), values: Box::new(values) }
    }
}

#[must_use]
pub struct Brancher {
    phases: Vec<Phase>,
}

impl Brancher {
    pub const fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    /// Next decision, or [`None`] when every phase variable is fixed.
    pub fn next(&mut self, store: &Store) -> Option<Branch> {
        self.phases.iter_mut().find_map(|phase| {
            let candidates: Vec<VarId> =
                phase.vars.iter().copied().filter(|var| !store.is_fixed(*var)).collect();
            if candidates.is_empty() {
                return None;
            }
            let var = phase.variables.select(store, &candidates);
            let domain = store.domain(var);
            let mut value = phase.values.select(store, var);
            if !domain.contains(value) {
                value = domain.min();
            }
            Some(match domain {
                Domain::Interval { min, max } if value != *min && value != *max => {
                    Branch::Split { var, value }
                }
                _ => Branch::Assign { var, value },
            })
        })
    }
}

/// First candidate in the phase order.
pub struct InOrder;

impl VariableSelector for InOrder {
    fn select(&mut self, _store: &Store, candidates: &[VarId]) -> VarId {
        candidates[0]
    }
}

/// Fewest remaining values first, ties broken by the phase order.
pub struct SmallestDomain;

impl VariableSelector for SmallestDomain {
    fn select(&mut self, store: &Store, candidates: &[VarId]) -> VarId {
        candidates
            .iter()
            .copied()
            .min_by_key(|var| store.domain(*var).size())
            .unwrap_or(candidates[0])
    }
}

/// Highest estimated impact first, ties broken by the smallest domain.
pub struct LargestImpact<F>(pub F);

impl<F: Fn(&Store, VarId) -> i64> VariableSelector for LargestImpact<F> {
    fn select(&mut self, store: &Store, candidates: &[VarId]) -> VarId {
        candidates
            .iter()
            .copied()
            .max_by_key(|var| (self.0(store, *var), std::cmp::Reverse(store.domain(*var).size())))
            .unwrap_or(candidates[0])
    }
}

/// Use the first selector for a number of decisions, then switch to the second one.
pub struct WarmUp<A, B> {
    pub remaining: usize,
    pub first: A,
    pub then: B,
}

impl<A: VariableSelector, B: VariableSelector> VariableSelector for WarmUp<A, B> {
    fn select(&mut self, store: &Store, candidates: &[VarId]) -> VarId {
        if self.remaining == 0 {
            self.then.select(store, candidates)
        } else {
            self.remaining -= 1;
            self.first.select(store, candidates)
        }
    }
}

pub struct MinValue;

impl ValueSelector for MinValue {
    fn select(&mut self, store: &Store, var: VarId) -> i64 {
        store.min(var)
    }
}
