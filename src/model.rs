//! Constraint model of one scheduling window.
//!
//! A [`Problem`] goes through `built → solved`: [`Problem::solve`] consumes it, so that a model
//! is never searched twice.

mod extraction;
mod heuristic;
mod pruning;
mod site_cost;

use std::{collections::BTreeMap, sync::Arc, time::Instant};

use bon::bon;

pub use self::heuristic::Heuristic;
use self::site_cost::SiteCost;
use crate::{
    automaton::{Automaton, CostTensor, Resource},
    catalog::{Budget, Catalog},
    config::SearchConfig,
    prelude::*,
    quantity::{Mills, Watts},
    solution::{Improvement, Pattern, Plan, Statistics, Status},
    solver::{
        Constraint,
        CostAutomaton,
        Domain,
        Element,
        Linear,
        Search,
        Space,
        Termination,
        VarId,
    },
};

/// Accumulated resource of an activity, and the revenue it earns.
struct ResourceVars {
    resource: Resource,
    total: VarId,
    revenue: VarId,
}

struct Variables {
    /// Chosen state index, per activity and slot.
    states: Vec<Vec<VarId>>,

    /// Power drawn on the part's data center, per activity, part and slot.
    part_power: Vec<Vec<Vec<VarId>>>,

    /// Power drawn across the parts, per activity and slot.
    activity_power: Vec<Vec<VarId>>,

    /// Allocated power, per source and slot.
    source_power: Vec<Vec<VarId>>,

    /// Cost of the allocated power, per source and slot.
    source_cost: Vec<Vec<VarId>>,

    resources: Vec<Vec<ResourceVars>>,
    activity_revenue: Vec<VarId>,
    site_costs: Vec<SiteCost>,

    revenue: VarId,
    energy: VarId,
    penalty: VarId,
    profit: VarId,
}

/// Result of [`Problem::solve`].
#[must_use]
pub struct Solved {
    pub plan: Option<Plan>,
    pub statistics: Statistics,
}

#[must_use]
pub struct Problem<'a> {
    catalog: &'a Catalog,
    config: &'a SearchConfig,

    /// Sorted data center names.
    datacenters: Vec<String>,

    automata: Vec<Automaton>,
    space: Space,
    vars: Variables,

    /// Whether the initial propagation succeeded.
    is_consistent: bool,
}

#[bon]
impl<'a> Problem<'a> {
    /// Build the model and apply the catalog budgets.
    ///
    /// `incoming` overrides the incoming state of the activities by their identifiers, for
    /// example with the last states of a preceding window.
    #[builder]
    pub fn new(
        catalog: &'a Catalog,
        config: &'a SearchConfig,
        incoming: Option<&BTreeMap<String, usize>>,
    ) -> Result<Self> {
        let mut problem = Self::build(catalog, config, incoming)?;
        for budget in &catalog.budgets {
            problem = problem.with_budget(budget)?;
        }
        Ok(problem)
    }
}

impl<'a> Problem<'a> {
    #[instrument(
        skip_all,
        fields(n_slots = catalog.horizon.n_slots, n_activities = catalog.activities.len()),
    )]
    fn build(
        catalog: &'a Catalog,
        config: &'a SearchConfig,
        incoming: Option<&BTreeMap<String, usize>>,
    ) -> Result<Self> {
        let start_instant = Instant::now();
        catalog.validate()?;
        let n_slots = catalog.horizon.n_slots;
        let datacenters = catalog.datacenters();
        info!(n_slots, n_datacenters = datacenters.len(), "building…");

        let mut automata: Vec<Automaton> =
            catalog.activities.iter().map(Automaton::build).collect::<Result<_>>()?;
        if let Some(incoming) = incoming {
            for (activity, automaton) in catalog.activities.iter().zip(&mut automata) {
                if let Some(state) = incoming.get(&activity.id()) {
                    automaton.set_incoming(Some(*state));
                }
            }
        }
        let domains = pruning::StateDomains::builder()
            .catalog(catalog)
            .automata(&automata)
            .datacenters(&datacenters)
            .prune_waste(config.prune_waste)
            .build()
            .resolve()?;

        let mut space = Space::default();

        // Power sources, bounded by what the activities could ever draw:
        let demand_ceiling: Watts =
            catalog.activities.iter().map(|activity| activity.max_power()).sum();
        let mut source_power = Vec::with_capacity(catalog.power_sources.len());
        let mut source_cost = Vec::with_capacity(catalog.power_sources.len());
        for source in &catalog.power_sources {
            let mut powers = Vec::with_capacity(n_slots);
            let mut costs = Vec::with_capacity(n_slots);
            for forecast in &source.profile {
                let max_power = forecast.peak.min(demand_ceiling);
                let power = space.new_var(Domain::interval(0, max_power.0));
                let cost = space.new_var(Domain::interval(0, (max_power * forecast.price).0));
                space.post(Constraint::LinearEq(Linear::new(
                    [(1, cost), (-forecast.price.0, power)],
                    0,
                )));
                powers.push(power);
                costs.push(cost);
            }
            source_power.push(powers);
            source_cost.push(costs);
        }

        // Activities:
        let mut states = Vec::with_capacity(automata.len());
        let mut part_power = Vec::with_capacity(automata.len());
        let mut activity_power = Vec::with_capacity(automata.len());
        let mut resources = Vec::with_capacity(automata.len());
        let mut activity_revenue = Vec::with_capacity(automata.len());
        for ((activity, automaton), domains) in
            catalog.activities.iter().zip(&automata).zip(domains)
        {
            #[expect(clippy::cast_possible_wrap)]
            let activity_states: Vec<VarId> = domains
                .into_iter()
                .map(|domain| Domain::values(domain.into_iter().map(|state| state as i64)))
                .map(|domain| {
                    domain.map(|domain| space.new_var(domain)).ok_or_else(|| {
                        Error::invalid_input(activity.id(), "empty state domain")
                    })
                })
                .collect::<Result<_>>()?;

            let activity_part_power: Vec<Vec<VarId>> = (0..activity.parts.len())
                .map(|part_index| {
                    let table: Arc<[i64]> = automaton
                        .states()
                        .iter()
                        .map(|state| state.part_power[part_index].0)
                        .collect();
                    let (min, max) = table.iter().fold((i64::MAX, i64::MIN), |(min, max), power| {
                        (min.min(*power), max.max(*power))
                    });
                    activity_states
                        .iter()
                        .map(|state| {
                            let power = space.new_var(Domain::interval(min, max));
                            space.post(Constraint::Element(Element {
                                index: *state,
                                table: Arc::clone(&table),
                                value: power,
                            }));
                            power
                        })
                        .collect()
                })
                .collect();
            activity_power.push(
                (0..n_slots)
                    .map(|slot| {
                        post_sum(
                            &mut space,
                            activity_part_power.iter().map(|powers| (1, powers[slot])),
                        )
                    })
                    .collect(),
            );

            let tensor = Arc::new(CostTensor::build(automaton, activity, n_slots));
            let mut activity_resources = Vec::with_capacity(tensor.resources().len());
            for (resource_index, resource) in tensor.resources().iter().enumerate() {
                let (min, max) = tensor.bounds(resource_index);
                let offset = match resource {
                    Resource::Instant => 0,
                    Resource::Cumulative { achieved, .. } => *achieved,
                };
                let total = space.new_var(Domain::interval(offset + min, offset + max));
                space.post(Constraint::CostAutomaton(CostAutomaton {
                    states: activity_states.clone(),
                    incoming: automaton.incoming(),
                    tensor: Arc::clone(&tensor),
                    resource: resource_index,
                    offset,
                    total,
                }));
                let revenue = match resource {
                    // The tensor holds the money already:
                    Resource::Instant => total,
                    Resource::Cumulative { objective, .. } => {
                        let table: Arc<[i64]> =
                            activity.revenues[*objective].revenue().flatten(offset + max)?.into();
                        let (min, max) = (table[0], table[table.len() - 1]);
                        let revenue = space.new_var(Domain::interval(min, max));
                        space.post(Constraint::Element(Element {
                            index: total,
                            table,
                            value: revenue,
                        }));
                        revenue
                    }
                };
                activity_resources.push(ResourceVars {
                    resource: resource.clone(),
                    total,
                    revenue,
                });
            }
            activity_revenue.push(post_sum(
                &mut space,
                activity_resources.iter().map(|resource| (1, resource.revenue)),
            ));
            trace!(
                activity = activity.id(),
                n_states = automaton.len(),
                n_resources = activity_resources.len(),
                "modelled",
            );

            states.push(activity_states);
            part_power.push(activity_part_power);
            resources.push(activity_resources);
        }

        // Closed site balance, no slack:
        for datacenter in &datacenters {
            for slot in 0..n_slots {
                let drawn = catalog.activities.iter().enumerate().filter_map(|(index, activity)| {
                    Some((1, part_power[index][activity.part_index(datacenter)?][slot]))
                });
                let supplied = catalog
                    .power_sources
                    .iter()
                    .zip(&source_power)
                    .filter(|(source, _)| source.datacenter == *datacenter)
                    .map(|(_, powers)| (-1, powers[slot]));
                let terms: Vec<(i64, VarId)> = drawn.chain(supplied).collect();
                if !terms.is_empty() {
                    space.post(Constraint::LinearEq(Linear::new(terms, 0)));
                }
            }
        }

        let site_costs = site_cost::post_all(&mut space, catalog, &source_power)?;

        let revenue = post_sum(&mut space, activity_revenue.iter().map(|revenue| (1, *revenue)));
        let energy = post_sum(&mut space, source_cost.iter().flatten().map(|cost| (1, *cost)));
        let penalty = post_sum(&mut space, site_costs.iter().map(|cost| (1, cost.penalty)));
        let profit = post_sum(&mut space, [(1, revenue), (-1, energy), (-1, penalty)]);

        let is_consistent = space.propagate().is_ok();
        if !is_consistent {
            warn!("the initial propagation failed, the model is infeasible");
        }
        info!(
            n_vars = space.n_vars(),
            n_constraints = space.n_constraints(),
            profit_bounds = ?(space.min(profit), space.max(profit)),
            elapsed = ?start_instant.elapsed(),
            "built",
        );
        Ok(Self {
            catalog,
            config,
            datacenters,
            automata,
            space,
            vars: Variables {
                states,
                part_power,
                activity_power,
                source_power,
                source_cost,
                resources,
                activity_revenue,
                site_costs,
                revenue,
                energy,
                penalty,
                profit,
            },
            is_consistent,
        })
    }

    /// Cap the consumption of the budget activities on its data center.
    ///
    /// Fails with [`Error::QuotaInfeasible`] when the cap is below the consumption the model
    /// already proves, without starting a search. A rejected problem is dropped.
    #[instrument(skip_all, fields(budget = budget.name, cap = %budget.quota.cap()))]
    pub fn with_budget(mut self, budget: &Budget) -> Result<Self> {
        let slots = budget.quota.slots();
        if slots.end > self.catalog.horizon.n_slots {
            return Err(Error::invalid_input(
                format!("budget `{}`", budget.name),
                "the quota extends beyond the horizon",
            ));
        }
        let mut consumption = Vec::new();
        for id in &budget.activities {
            let index = self
                .catalog
                .activities
                .iter()
                .position(|activity| activity.id() == *id)
                .ok_or_else(|| {
                    Error::invalid_input(
                        format!("budget `{}`", budget.name),
                        format!("unknown activity `{id}`"),
                    )
                })?;
            let activity = &self.catalog.activities[index];
            if let Some(part_index) = activity.part_index(&budget.datacenter) {
                let powers = &self.vars.part_power[index][part_index];
                consumption.extend(slots.clone().map(|slot| powers[slot]));
            }
        }

        let cap = budget.quota.cap().0;
        let minimum: i64 = consumption.iter().map(|power| self.space.min(*power)).sum();
        let infeasible = || Error::QuotaInfeasible {
            quota: format!("budget `{}`", budget.name),
            cap,
            minimum,
        };
        if cap < minimum {
            return Err(infeasible());
        }
        self.space.post(Constraint::LinearLe(Linear::new(
            consumption.into_iter().map(|power| (1, power)),
            -cap,
        )));
        if self.is_consistent && self.space.propagate().is_err() {
            return Err(infeasible());
        }
        debug!(minimum, "applied");
        Ok(self)
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    #[must_use]
    pub fn automata(&self) -> &[Automaton] {
        &self.automata
    }

    /// Current bounds of the profit.
    #[must_use]
    pub fn profit_bounds(&self) -> (Mills, Mills) {
        (Mills(self.space.min(self.vars.profit)), Mills(self.space.max(self.vars.profit)))
    }

    /// Search for the most profitable plan within the time limit.
    ///
    /// `pattern` seeds the [`Heuristic::Incumbent`] heuristic; without one, it behaves as
    /// [`Heuristic::Green`].
    #[instrument(skip_all, fields(heuristic = ?heuristic))]
    pub fn solve(mut self, heuristic: Heuristic, pattern: Option<&Pattern>) -> Solved {
        let deadline = Instant::now() + self.config.time_limit;
        if !self.is_consistent {
            return Solved {
                plan: None,
                statistics: Statistics {
                    status: Status::NoSolution,
                    improvements: Vec::new(),
                    n_nodes: 0,
                    n_failures: 1,
                    elapsed: std::time::Duration::ZERO,
                },
            };
        }

        let brancher = heuristic::brancher(&self, heuristic, pattern);
        let outcome = Search::builder()
            .space(&mut self.space)
            .brancher(brancher)
            .objective(self.vars.profit)
            .deadline(deadline)
            .build()
            .run();

        let plan = outcome.best.as_deref().map(|values| self.extract(values));
        let status = match (outcome.termination, &plan) {
            (Termination::Timeout, _) => Status::Timeout,
            (Termination::Exhausted, Some(_)) => Status::Ok,
            (Termination::Exhausted, None) => Status::NoSolution,
        };
        Solved {
            plan,
            statistics: Statistics {
                status,
                improvements: outcome
                    .improvements
                    .into_iter()
                    .map(|(elapsed, profit)| Improvement { elapsed, profit: Mills(profit) })
                    .collect(),
                n_nodes: outcome.n_nodes,
                n_failures: outcome.n_failures,
                elapsed: outcome.elapsed,
            },
        }
    }
}

/// Post `sum = Σ coefficient × variable` and return the sum variable.
fn post_sum(space: &mut Space, terms: impl IntoIterator<Item = (i64, VarId)>) -> VarId {
    let terms: Vec<(i64, VarId)> = terms.into_iter().collect();
    let (min, max) = terms.iter().fold((0, 0), |(min, max), &(coefficient, var)| {
        if coefficient >= 0 {
            (min + coefficient * space.min(var), max + coefficient * space.max(var))
        } else {
            (min + coefficient * space.max(var), max + coefficient * space.min(var))
        }
    });
    let sum = space.new_var(Domain::interval(min, max));
    space.post(Constraint::LinearEq(Linear::new(terms.into_iter().chain([(-1, sum)]), 0)));
    sum
}
