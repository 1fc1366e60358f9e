use std::time::{Duration, Instant};

use bon::Builder;

use crate::{
    prelude::*,
    solver::{Branch, Brancher, Propagation, Space, VarId},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Termination {
    /// The search space is exhausted: the best solution, if any, is optimal.
    Exhausted,

    /// The deadline passed before the search space was exhausted.
    Timeout,
}

#[must_use]
pub struct Outcome {
    pub termination: Termination,

    /// Values of every variable in the best solution.
    pub best: Option<Vec<i64>>,

    /// Objective value of every improving solution, with the time it was found at.
    pub improvements: Vec<(Duration, i64)>,

    pub n_nodes: u64,
    pub n_failures: u64,
    pub elapsed: Duration,
}

struct ChoicePoint {
    mark: usize,
    branch: Branch,
}

/// Depth-first branch and bound over a [`Space`].
///
/// Once a solution is found, every subsequent one must improve the objective by at least one.
/// The deadline is checked before every decision, so the search stops promptly and keeps the
/// best solution found so far.
#[derive(Builder)]
pub struct Search<'a> {
    space: &'a mut Space,
    brancher: Brancher,

    /// Variable to maximize, or [`None`] to stop at the first solution.
    objective: Option<VarId>,

    deadline: Instant,
}

impl Search<'_> {
    #[instrument(
        skip_all,
        fields(n_vars = self.space.n_vars(), n_constraints = self.space.n_constraints()),
    )]
    pub fn run(mut self) -> Outcome {
        let start_instant = Instant::now();
        let mut outcome = Outcome {
            termination: Termination::Exhausted,
            best: None,
            improvements: Vec::new(),
            n_nodes: 0,
            n_failures: 0,
            elapsed: Duration::ZERO,
        };
        let mut lower_bound: Option<i64> = None;
        let mut stack: Vec<ChoicePoint> = Vec::new();
        let mut is_consistent = self.space.propagate().is_ok();

        'search: loop {
            if Instant::now() >= self.deadline {
                outcome.termination = Termination::Timeout;
                break;
            }
            if is_consistent {
                if let Some(branch) = self.brancher.next(self.space) {
                    outcome.n_nodes += 1;
                    stack.push(ChoicePoint { mark: self.space.mark(), branch });
                    is_consistent = self.apply(branch, lower_bound).is_ok();
                    continue;
                }

                // Every decision variable is fixed:
                let value = self.objective.map_or(0, |objective| self.space.min(objective));
                debug!(value, n_nodes = outcome.n_nodes, "found a solution");
                outcome.improvements.push((start_instant.elapsed(), value));
                outcome.best = Some(self.space.snapshot());
                if self.objective.is_none() {
                    break;
                }
                lower_bound = Some(value + 1);
            } else {
                outcome.n_failures += 1;
            }

            // Backtrack until some refutation holds:
            loop {
                let Some(choice_point) = stack.pop() else {
                    break 'search;
                };
                self.space.undo(choice_point.mark);
                if self.refute(choice_point.branch, lower_bound).is_ok() {
                    is_consistent = true;
                    break;
                }
                outcome.n_failures += 1;
            }
        }

        outcome.elapsed = start_instant.elapsed();
        info!(
            termination = ?outcome.termination,
            best = ?outcome.improvements.last().map(|(_, value)| value),
            n_nodes = outcome.n_nodes,
            n_failures = outcome.n_failures,
            elapsed = ?outcome.elapsed,
            "finished",
        );
        outcome
    }

    fn apply(&mut self, branch: Branch, lower_bound: Option<i64>) -> Propagation<()> {
        match branch {
            Branch::Assign { var, value } => self.space.assign(var, value)?,
            Branch::Split { var, value } => self.space.set_max(var, value)?,
        };
        self.bound_and_propagate(lower_bound)
    }

    fn refute(&mut self, branch: Branch, lower_bound: Option<i64>) -> Propagation<()> {
        match branch {
            Branch::Assign { var, value } => self.space.remove(var, value)?,
            Branch::Split { var, value } => self.space.set_min(var, value + 1)?,
        };
        self.bound_and_propagate(lower_bound)
    }

    fn bound_and_propagate(&mut self, lower_bound: Option<i64>) -> Propagation<()> {
        if let (Some(objective), Some(lower_bound)) = (self.objective, lower_bound) {
            self.space.set_min(objective, lower_bound)?;
        }
        self.space.propagate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{Constraint, Domain, InOrder, Linear, MinValue, Phase};

    /// `x + y ≤ 7`, maximize `profit = 2x + 3y` over `x, y ∈ 0..=4`.
    fn knapsack(space: &mut Space) -> (VarId, VarId, VarId) {
        let x = space.new_var(Domain::interval(0, 4));
        let y = space.new_var(Domain::interval(0, 4));
        let profit = space.new_var(Domain::interval(0, 100));
        space.post(Constraint::LinearLe(Linear::new([(1, x), (1, y)], -7)));
        space.post(Constraint::LinearEq(Linear::new([(2, x), (3, y), (-1, profit)], 0)));
        (x, y, profit)
    }

    #[test]
    fn test_branch_and_bound_is_optimal() {
        let mut space = Space::default();
        let (x, y, profit) = knapsack(&mut space);
        let outcome = Search::builder()
            .space(&mut space)
            .brancher(Brancher::new(vec![Phase::new(vec![x, y], InOrder, MinValue)]))
            .objective(profit)
            .deadline(Instant::now() + Duration::from_secs(60))
            .build()
            .run();
        assert_eq!(outcome.termination, Termination::Exhausted);
        let best = outcome.best.unwrap();
        assert_eq!((best[x.0], best[y.0], best[profit.0]), (3, 4, 18));
        assert!(outcome.improvements.windows(2).all(|window| window[0].1 < window[1].1));
    }

    #[test]
    fn test_satisfaction_stops_at_first_solution() {
        let mut space = Space::default();
        let (x, y, _) = knapsack(&mut space);
        let outcome = Search::builder()
            .space(&mut space)
            .brancher(Brancher::new(vec![Phase::new(vec![x, y], InOrder, MinValue)]))
            .deadline(Instant::now() + Duration::from_secs(60))
            .build()
            .run();
        assert_eq!(outcome.best.unwrap()[..2], [0, 0]);
        assert_eq!(outcome.improvements.len(), 1);
    }

    #[test]
    fn test_infeasible() {
        let mut space = Space::default();
        let (x, y, _) = knapsack(&mut space);
        space.post(Constraint::LinearLe(Linear::new([(-1, x), (-1, y)], 9)));
        let outcome = Search::builder()
            .space(&mut space)
            .brancher(Brancher::new(vec![Phase::new(vec![x, y], InOrder, MinValue)]))
            .deadline(Instant::now() + Duration::from_secs(60))
            .build()
            .run();
        assert_eq!(outcome.termination, Termination::Exhausted);
        assert!(outcome.best.is_none());
    }

    #[test]
    fn test_expired_deadline() {
        let mut space = Space::default();
        let (x, y, profit) = knapsack(&mut space);
        let outcome = Search::builder()
            .space(&mut space)
            .brancher(Brancher::new(vec![Phase::new(vec![x, y], InOrder, MinValue)]))
            .objective(profit)
            .deadline(Instant::now())
            .build()
            .run();
        assert_eq!(outcome.termination, Termination::Timeout);
        assert!(outcome.best.is_none());
    }
}
