//! Site-wide objectives turned into penalty variables.

use std::{ops::Range, sync::Arc};

use crate::{
    catalog::{Catalog, SiteObjective},
    model::post_sum,
    prelude::*,
    solver::{Constraint, Domain, Element, Ratio, Space, VarId},
};

/// Renewable share of a site is measured in tenths of a percent.
pub const PERCENTAGE_SCALE: i64 = 1000;

pub struct SiteCost {
    /// Index of the objective in the catalog.
    pub objective: usize,

    /// Slots of the objective window inside the horizon.
    pub slots: Range<usize>,

    /// Measured value, [`None`] when the window is outside the horizon.
    pub measure: Option<VarId>,

    pub penalty: VarId,
}

/// Post the penalty variables of every site objective.
pub fn post_all(
    space: &mut Space,
    catalog: &Catalog,
    source_power: &[Vec<VarId>],
) -> Result<Vec<SiteCost>> {
    catalog
        .site_objectives
        .iter()
        .enumerate()
        .map(|(index, objective)| post(space, catalog, source_power, index, objective))
        .collect()
}

fn post(
    space: &mut Space,
    catalog: &Catalog,
    source_power: &[Vec<VarId>],
    index: usize,
    objective: &SiteObjective,
) -> Result<SiteCost> {
    let slots = clip(objective.declared_window(), catalog.horizon.n_slots);
    if slots.is_empty() {
        debug!(objective = index, "the window is outside the horizon");
        let penalty = space.new_var(Domain::fixed(0));
        return Ok(SiteCost { objective: index, slots, measure: None, penalty });
    }
    match objective {
        SiteObjective::RenewablePercentage { datacenter, penalty, history, .. } => {
            let powers: Vec<(i64, VarId)> = catalog
                .power_sources
                .iter()
                .zip(source_power)
                .filter(|(source, _)| source.datacenter == *datacenter)
                .flat_map(|(source, powers)| {
                    slots.clone().map(|slot| (source.at(slot).renewable.0, powers[slot]))
                })
                .collect();
            let green = post_sum(space, powers.iter().copied());
            let total = post_sum(space, powers.iter().map(|(_, power)| (1, *power)));

            // `1000 × (G / 100 + history) / (D + history)`:
            let percentage = space.new_var(Domain::interval(0, PERCENTAGE_SCALE));
            space.post(Constraint::Ratio(Ratio {
                numerator: green,
                numerator_offset: 100 * history.renewable.0,
                denominator: total,
                denominator_offset: history.total.0,
                scale: PERCENTAGE_SCALE / 100,
                if_undefined: PERCENTAGE_SCALE,
                ratio: percentage,
            }));

            let table: Arc<[i64]> = penalty.flatten(PERCENTAGE_SCALE)?.into();
            let (min, max) = (table[table.len() - 1], table[0]);
            let cost = space.new_var(Domain::interval(min, max));
            space.post(Constraint::Element(Element { index: percentage, table, value: cost }));
            Ok(SiteCost { objective: index, slots, measure: Some(percentage), penalty: cost })
        }
    }
}

fn clip((from, to): (i64, i64), n_slots: usize) -> Range<usize> {
    let clamp = |slot: i64| usize::try_from(slot.max(0)).unwrap_or_default().min(n_slots);
    let (from, to) = (clamp(from), clamp(to));
    from..to.max(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip() {
        assert_eq!(clip((-2, 3), 10), 0..3);
        assert_eq!(clip((5, 20), 10), 5..10);
        assert!(clip((12, 20), 10).is_empty());
        assert!(clip((-5, -1), 10).is_empty());
    }
}
