//! Search heuristics over the scheduling model.
//!
//! Every heuristic visits the slots with the most fully renewable capacity first. At each slot it
//! decides the activity states, and then the power allocations, greenest source first. The
//! heuristics only differ in how they rank the candidate states of an activity.

use std::{cmp::Reverse, collections::HashMap, sync::Arc};

use itertools::Itertools;

use crate::{
    catalog::Relocation,
    model::Problem,
    solution::Pattern,
    solver::{
        Brancher,
        InOrder,
        LargestImpact,
        MinValue,
        Phase,
        SmallestDomain,
        Store,
        ValueSelector,
        VarId,
        WarmUp,
    },
};

#[derive(Debug, clap::ValueEnum, enumset::EnumSetType)]
pub enum Heuristic {
    /// Run fast where renewable power covers the draw, and conserve elsewhere.
    Green,

    /// Like [`Heuristic::Green`], but move relocatable activities to the sites with
    /// a renewable surplus.
    GreenSite,

    /// Follow a previous plan wherever it is still feasible.
    Incumbent,
}

type Rank = (i64, i64, i64);

/// Ranks the candidate states of an activity at a slot, the highest rank is tried first.
trait StateRanking {
    fn rank(&self, store: &Store, activity: usize, slot: usize, state: usize) -> Rank;
}

struct ActivityView {
    relocation: Relocation,

    /// Site index per part.
    sites: Vec<usize>,

    /// Per state.
    performance: Vec<i64>,

    /// Per state and part.
    part_power: Vec<Vec<i64>>,

    /// Power variable per part and slot.
    power_vars: Vec<Vec<VarId>>,
}

/// Read-only view of the model the heuristics rank against.
struct Context {
    /// Activity and slot of every state variable.
    state_vars: HashMap<VarId, (usize, usize)>,

    activities: Vec<ActivityView>,

    /// Renewable part of the peak power, per site and slot.
    green_capacity: Vec<Vec<i64>>,

    /// Activity power variables per site and slot.
    site_draws: Vec<Vec<Vec<VarId>>>,
}

impl Context {
    fn build(problem: &Problem) -> Self {
        let catalog = problem.catalog;
        let n_slots = catalog.horizon.n_slots;
        let site_index = |datacenter: &str| {
            problem.datacenters.iter().position(|name| name == datacenter).unwrap_or_default()
        };

        let activities: Vec<ActivityView> = catalog
            .activities
            .iter()
            .zip(&problem.automata)
            .zip(&problem.vars.part_power)
            .map(|((activity, automaton), power_vars)| ActivityView {
                relocation: activity.relocation,
                sites: activity.parts.iter().map(|part| site_index(&part.datacenter)).collect(),
                performance: automaton.states().iter().map(|state| state.perf()).collect(),
                part_power: automaton
                    .states()
                    .iter()
                    .map(|state| state.part_power.iter().map(|power| power.0).collect())
                    .collect(),
                power_vars: power_vars.clone(),
            })
            .collect();

        let mut green_capacity = vec![vec![0; n_slots]; problem.datacenters.len()];
        for source in &catalog.power_sources {
            let site = site_index(&source.datacenter);
            for (slot, forecast) in source.profile.iter().enumerate() {
                green_capacity[site][slot] += forecast.peak.0 * forecast.renewable.0 / 100;
            }
        }

        let mut site_draws = vec![vec![Vec::new(); n_slots]; problem.datacenters.len()];
        for view in &activities {
            for (site, power_vars) in view.sites.iter().zip(&view.power_vars) {
                for (slot, var) in power_vars.iter().enumerate() {
                    site_draws[*site][slot].push(*var);
                }
            }
        }

        let state_vars = problem
            .vars
            .states
            .iter()
            .enumerate()
            .flat_map(|(activity, vars)| {
                vars.iter().enumerate().map(move |(slot, var)| (*var, (activity, slot)))
            })
            .collect();

        Self { state_vars, activities, green_capacity, site_draws }
    }

    /// Renewable capacity left on the site at the slot, net of the least power the other
    /// activities draw there.
    fn surplus(&self, store: &Store, site: usize, slot: usize, own: VarId) -> i64 {
        let drawn: i64 = self.site_draws[site][slot]
            .iter()
            .filter(|var| **var != own)
            .map(|var| store.min(*var))
            .sum();
        self.green_capacity[site][slot] - drawn
    }
}

/// Maximum performance among the states renewable power covers, minimum performance otherwise.
struct GreenPerformance(Arc<Context>);

impl StateRanking for GreenPerformance {
    fn rank(&self, _store: &Store, activity: usize, slot: usize, state: usize) -> Rank {
        let view = &self.0.activities[activity];
        let performance = view.performance[state];
        let power: i64 = view.part_power[state].iter().sum();
        let is_green = view.part_power[state]
            .iter()
            .zip(&view.sites)
            .all(|(power, site)| *power <= self.0.green_capacity[*site][slot]);
        if is_green { (1, performance, -power) } else { (0, -performance, -power) }
    }
}

/// Prefer the states placing the power where the renewable surplus is, for relocatable
/// activities.
struct GreenSite(Arc<Context>);

impl StateRanking for GreenSite {
    fn rank(&self, store: &Store, activity: usize, slot: usize, state: usize) -> Rank {
        let view = &self.0.activities[activity];
        if view.relocation == Relocation::Fixed {
            return GreenPerformance(Arc::clone(&self.0)).rank(store, activity, slot, state);
        }
        let performance = view.performance[state];
        let brown: i64 = view.part_power[state]
            .iter()
            .zip(&view.sites)
            .zip(&view.power_vars)
            .map(|((power, site), vars)| {
                let surplus = self.0.surplus(store, *site, slot, vars[slot]).max(0);
                (power - surplus).max(0)
            })
            .sum();
        if brown == 0 { (1, performance, 0) } else { (0, -brown, -performance) }
    }
}

/// The state of the previous plan when there is one, falling back to [`GreenPerformance`].
struct Incumbent {
    /// State index per activity and slot.
    pattern: Arc<Vec<Vec<Option<usize>>>>,

    fallback: GreenPerformance,
}

impl StateRanking for Incumbent {
    fn rank(&self, store: &Store, activity: usize, slot: usize, state: usize) -> Rank {
        if self.pattern[activity].get(slot).copied().flatten() == Some(state) {
            (2, 0, 0)
        } else {
            self.fallback.rank(store, activity, slot, state)
        }
    }
}

struct RankedStates<R> {
    context: Arc<Context>,
    ranking: R,
}

impl<R: StateRanking> ValueSelector for RankedStates<R> {
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn select(&mut self, store: &Store, var: VarId) -> i64 {
        let Some(&(activity, slot)) = self.context.state_vars.get(&var) else {
            return store.min(var);
        };
        store
            .domain(var)
            .iter()
            .min_by_key(|state| Reverse(self.ranking.rank(store, activity, slot, *state as usize)))
            .unwrap_or_else(|| store.min(var))
    }
}

/// Fill a source up to its bound when it is about as green as its site, and leave it empty
/// otherwise.
struct GreenestFirst {
    /// Whether the source counts as green, per power variable.
    is_green: HashMap<VarId, bool>,
}

impl ValueSelector for GreenestFirst {
    fn select(&mut self, store: &Store, var: VarId) -> i64 {
        if self.is_green.get(&var).copied().unwrap_or_default() {
            store.max(var)
        } else {
            store.min(var)
        }
    }
}

/// Assemble the phases of the heuristic over the problem variables.
pub fn brancher(problem: &Problem, heuristic: Heuristic, pattern: Option<&Pattern>) -> Brancher {
    let context = Arc::new(Context::build(problem));
    let catalog = problem.catalog;
    let n_slots = catalog.horizon.n_slots;

    // Fully renewable capacity first:
    let slots = (0..n_slots).sorted_by_key(|slot| {
        let capacity: i64 = catalog
            .power_sources
            .iter()
            .map(|source| source.at(*slot))
            .filter(|forecast| forecast.renewable.is_fully_renewable())
            .map(|forecast| forecast.peak.0)
            .sum();
        Reverse(capacity)
    });

    let incumbent_pattern = pattern.map(|pattern| {
        let indices: Vec<Vec<Option<usize>>> = catalog
            .activities
            .iter()
            .zip(&problem.automata)
            .map(|(activity, automaton)| {
                pattern.get(&activity.id()).map_or_else(Vec::new, |names| {
                    names
                        .iter()
                        .map(|name| automaton.state_index(activity, name.as_deref()?))
                        .collect()
                })
            })
            .collect();
        Arc::new(indices)
    });

    let mut phases = Vec::with_capacity(2 * n_slots + 1);
    for slot in slots {
        let state_vars: Vec<VarId> = problem.vars.states.iter().map(|vars| vars[slot]).collect();
        let impact = {
            let context = Arc::clone(&context);
            move |store: &Store, var: VarId| -> i64 {
                let Some(&(activity, _)) = context.state_vars.get(&var) else {
                    return 0;
                };
                let performance = &context.activities[activity].performance;
                #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let (min, max) = store
                    .domain(var)
                    .iter()
                    .map(|state| performance[state as usize])
                    .minmax()
                    .into_option()
                    .unwrap_or_default();
                max - min
            }
        };
        let variables = WarmUp {
            remaining: problem.config.warm_up,
            first: LargestImpact(impact),
            then: SmallestDomain,
        };
        let context = Arc::clone(&context);
        let phase = match (heuristic, &incumbent_pattern) {
            (Heuristic::Green, _) | (Heuristic::Incumbent, None) => {
                let ranking = GreenPerformance(Arc::clone(&context));
                Phase::new(state_vars, variables, RankedStates { context, ranking })
            }
            (Heuristic::GreenSite, _) => {
                let ranking = GreenSite(Arc::clone(&context));
                Phase::new(state_vars, variables, RankedStates { context, ranking })
            }
            (Heuristic::Incumbent, Some(pattern)) => {
                let ranking = Incumbent {
                    pattern: Arc::clone(pattern),
                    fallback: GreenPerformance(Arc::clone(&context)),
                };
                Phase::new(state_vars, variables, RankedStates { context, ranking })
            }
        };
        phases.push(phase);
        phases.push(power_phase(problem, slot));
    }

    // Whatever propagation left open:
    let all_vars = (0..problem.space.n_vars()).map(VarId).collect();
    phases.push(Phase::new(all_vars, InOrder, MinValue));
    Brancher::new(phases)
}

/// Power allocations at the slot, greenest and then cheapest source first.
fn power_phase(problem: &Problem, slot: usize) -> Phase {
    let catalog = problem.catalog;
    let tolerance = problem.config.green_tolerance.0;

    // Capacity-weighted renewable share of every site:
    let site_average = |datacenter: &str| {
        let (weighted, total) = catalog
            .power_sources
            .iter()
            .filter(|source| source.datacenter == datacenter)
            .map(|source| source.at(slot))
            .fold((0, 0), |(weighted, total), forecast| {
                (weighted + forecast.peak.0 * forecast.renewable.0, total + forecast.peak.0)
            });
        if total == 0 { 0 } else { weighted / total }
    };

    let sources = catalog
        .power_sources
        .iter()
        .zip(&problem.vars.source_power)
        .sorted_by_key(|(source, _)| {
            let forecast = source.at(slot);
            (Reverse(forecast.renewable), forecast.price)
        })
        .collect_vec();
    let is_green = sources
        .iter()
        .map(|(source, powers)| {
            let renewable = source.at(slot).renewable.0;
            let is_green = renewable + tolerance >= site_average(&source.datacenter);
            (powers[slot], is_green)
        })
        .collect();
    let vars = sources.iter().map(|(_, powers)| powers[slot]).collect();
    Phase::new(vars, InOrder, GreenestFirst { is_green })
}
