//! Multi-window scheduling.
//!
//! The horizon is split into windows sharing no accumulation, and the windows are solved in
//! order: the last chosen states of a window become the incoming states of the next one. Every
//! window is solved by each requested heuristic concurrently, and the most profitable plan wins.

mod splitter;

use std::{collections::BTreeMap, ops::Range, thread};

use bon::Builder;
use enumset::EnumSet;
use tracing::Span;

pub use self::splitter::split;
use crate::{
    catalog::Catalog,
    config::SearchConfig,
    model::{Heuristic, Problem, Solved},
    prelude::*,
    solution::{Plan, Statistics, Status},
};

/// Search report of one solved window.
#[derive(Clone, Debug)]
pub struct WindowReport {
    pub slots: Range<usize>,

    /// Configuration that produced the kept plan.
    pub heuristic: Heuristic,

    pub statistics: Statistics,
}

#[must_use]
#[derive(Debug)]
pub struct Schedule {
    /// The plan over the whole horizon, [`None`] when some window timed out without a plan.
    pub plan: Option<Plan>,

    pub status: Status,

    pub windows: Vec<WindowReport>,
}

#[must_use]
#[derive(Builder)]
pub struct Scheduler<'a> {
    catalog: &'a Catalog,

    #[builder(default)]
    config: SearchConfig,

    /// Competing configurations of every window.
    #[builder(default = EnumSet::only(Heuristic::Green))]
    heuristics: EnumSet<Heuristic>,

    /// Plan of the previous run, seeding [`Heuristic::Incumbent`].
    previous: Option<&'a Plan>,
}

impl Scheduler<'_> {
    /// Solve every window in order.
    ///
    /// Fails when any window cannot be built, or when every configuration proves a window
    /// infeasible. No partial plan is returned then.
    #[instrument(skip_all, fields(n_slots = self.catalog.horizon.n_slots))]
    pub fn run(&self) -> Result<Schedule> {
        // Windows slice the catalog, so the whole of it is checked first:
        self.catalog.validate()?;
        let windows = split(self.catalog);
        info!(n_windows = windows.len(), heuristics = ?self.heuristics, "scheduling…");

        let mut plan = Plan::default();
        let mut status = Status::Ok;
        let mut reports = Vec::with_capacity(windows.len());
        let mut incoming: Option<BTreeMap<String, usize>> = None;

        for slots in windows {
            let catalog = self.catalog.window(slots.clone());
            let Some((heuristic, window_plan, statistics)) =
                self.solve_window(&catalog, &slots, incoming.as_ref())?
            else {
                warn!(?slots, "timed out without a plan");
                return Ok(Schedule { plan: None, status: Status::Timeout, windows: reports });
            };
            if statistics.status == Status::Timeout {
                status = Status::Timeout;
            }
            incoming = Some(window_plan.last_states());
            plan.append(window_plan, slots.start);
            reports.push(WindowReport { slots, heuristic, statistics });
        }

        info!(%status, profit = %plan.totals.profit, "scheduled");
        Ok(Schedule { plan: Some(plan), status, windows: reports })
    }

    /// Solve the window with every configuration and keep the most profitable plan.
    ///
    /// Returns [`None`] when no configuration found a plan before its deadline.
    #[instrument(skip_all, fields(slots = ?slots))]
    fn solve_window(
        &self,
        catalog: &Catalog,
        slots: &Range<usize>,
        incoming: Option<&BTreeMap<String, usize>>,
    ) -> Result<Option<(Heuristic, Plan, Statistics)>> {
        let pattern = self.previous.map(|previous| previous.pattern(slots.clone()));
        let mut heuristics = self.heuristics;
        if pattern.is_none() {
            heuristics.remove(Heuristic::Incumbent);
        }
        if heuristics.is_empty() {
            heuristics.insert(Heuristic::Green);
        }

        let span = Span::current();
        let results: Vec<(Heuristic, Result<Solved>)> = thread::scope(|scope| {
            let handles = heuristics
                .iter()
                .map(|heuristic| {
                    let span = span.clone();
                    let pattern = pattern.as_ref();
                    let handle = scope.spawn(move || {
                        let _entered = span.enter();
                        Problem::builder()
                            .catalog(catalog)
                            .config(&self.config)
                            .maybe_incoming(incoming)
                            .build()
                            .map(|problem| problem.solve(heuristic, pattern))
                    });
                    (heuristic, handle)
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|(heuristic, handle)| {
                    let result =
                        handle.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload));
                    (heuristic, result)
                })
                .collect()
        });

        let mut best: Option<(Heuristic, Plan, Statistics)> = None;
        let mut has_timed_out = false;
        for (heuristic, result) in results {
            let Solved { plan, statistics } = result?;
            debug!(
                ?heuristic,
                status = %statistics.status,
                profit = ?plan.as_ref().map(|plan| plan.totals.profit),
                "solved",
            );
            has_timed_out |= statistics.status == Status::Timeout;
            let Some(plan) = plan else {
                continue;
            };

            // Ties keep the earlier configuration:
            if best.as_ref().is_none_or(|(_, best, _)| plan.totals.profit > best.totals.profit) {
                best = Some((heuristic, plan, statistics));
            }
        }

        match best {
            Some(best) => Ok(Some(best)),
            None if has_timed_out => Ok(None),
            None => Err(Error::Infeasible { window: slots.clone() }),
        }
    }
}
