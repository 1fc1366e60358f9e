//! Read the plan out of a solution.

use crate::{
    automaton::Resource,
    model::Problem,
    quantity::{Mills, Watts},
    solution::{
        ActivityPlan,
        PartPlan,
        Plan,
        RevenueOutcome,
        ScheduledState,
        SitePenalty,
        SourcePlan,
        Totals,
    },
};

impl Problem<'_> {
    /// Build the plan from the values of every variable.
    #[expect(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub(super) fn extract(&self, values: &[i64]) -> Plan {
        let activities = self
            .catalog
            .activities
            .iter()
            .zip(&self.automata)
            .zip(&self.vars.states)
            .zip(&self.vars.activity_power)
            .zip(&self.vars.resources)
            .zip(&self.vars.activity_revenue)
            .map(|(((((activity, automaton), states), powers), resources), revenue)| {
                let mut previous = automaton.incoming();
                let slots = states
                    .iter()
                    .zip(powers)
                    .map(|(var, power)| {
                        let index = values[var.0] as usize;
                        let state = automaton.state(index);
                        let performance =
                            automaton.realized_performance(previous.unwrap_or(index), index);
                        previous = Some(index);
                        let parts = activity
                            .parts
                            .iter()
                            .zip(&state.choices)
                            .map(|(part, choice)| {
                                let mode = &part.modes[choice.mode];
                                let level = mode.levels[choice.level];
                                PartPlan {
                                    datacenter: part.datacenter.clone(),
                                    mode: mode.name.clone(),
                                    level: choice.level,
                                    performance: level.performance,
                                    power: level.power,
                                }
                            })
                            .collect();
                        ScheduledState {
                            state: state.name(activity),
                            index,
                            parts,
                            performance,
                            power: Watts(values[power.0]),
                        }
                    })
                    .collect();
                let revenues = resources
                    .iter()
                    .map(|resource| match &resource.resource {
                        Resource::Instant => {
                            RevenueOutcome::Instant { revenue: Mills(values[resource.revenue.0]) }
                        }
                        Resource::Cumulative { slots, .. } => RevenueOutcome::Cumulative {
                            from: slots.start,
                            to: slots.end,
                            performance: values[resource.total.0],
                            revenue: Mills(values[resource.revenue.0]),
                        },
                    })
                    .collect();
                ActivityPlan {
                    id: activity.id(),
                    slots,
                    revenues,
                    revenue: Mills(values[revenue.0]),
                }
            })
            .collect();

        let power_sources = self
            .catalog
            .power_sources
            .iter()
            .zip(&self.vars.source_power)
            .zip(&self.vars.source_cost)
            .map(|((source, powers), costs)| SourcePlan {
                id: source.id.clone(),
                datacenter: source.datacenter.clone(),
                power: powers.iter().map(|power| Watts(values[power.0])).collect(),
                cost: costs.iter().map(|cost| Mills(values[cost.0])).sum(),
            })
            .collect();

        let site_penalties = self
            .vars
            .site_costs
            .iter()
            .map(|cost| SitePenalty {
                datacenter: self.catalog.site_objectives[cost.objective].datacenter().to_string(),
                from: cost.slots.start,
                to: cost.slots.end,
                percentage: cost.measure.map(|measure| values[measure.0]),
                penalty: Mills(values[cost.penalty.0]),
            })
            .collect();

        Plan {
            activities,
            power_sources,
            site_penalties,
            totals: Totals {
                revenue: Mills(values[self.vars.revenue.0]),
                energy: Mills(values[self.vars.energy.0]),
                penalty: Mills(values[self.vars.penalty.0]),
                profit: Mills(values[self.vars.profit.0]),
            },
        }
    }
}
