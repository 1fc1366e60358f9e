use std::ops::Range;

use itertools::Itertools;

use crate::catalog::{Catalog, Quota};

/// Split the horizon into windows that share no accumulation.
///
/// A slot boundary `t` is a cut unless some cumulative revenue window, site objective window or
/// energy quota spans both `t - 1` and `t`. Windows extending past the horizon are clipped.
#[must_use]
pub fn split(catalog: &Catalog) -> Vec<Range<usize>> {
    let n_slots = catalog.horizon.n_slots;
    let clamp = |slot: i64| usize::try_from(slot.max(0)).unwrap_or_default().min(n_slots);

    let cumulative = catalog.activities.iter().flat_map(|activity| {
        activity.revenues.iter().filter_map(|objective| objective.cumulative_slots(n_slots))
    });
    let site_objectives = catalog.site_objectives.iter().map(|objective| {
        let (from, to) = objective.declared_window();
        clamp(from)..clamp(to)
    });
    let quotas = catalog.budgets.iter().filter_map(|budget| match budget.quota {
        Quota::Energy { from, to, .. } => Some(from.min(n_slots)..to.min(n_slots)),
        Quota::Power { .. } => None,
    });
    let spans = cumulative.chain(site_objectives).chain(quotas).collect_vec();

    let cuts = (1..n_slots)
        .filter(|slot| !spans.iter().any(|span| span.start < *slot && *slot < span.end));
    [0].into_iter()
        .chain(cuts)
        .chain([n_slots])
        .dedup()
        .tuple_windows()
        .map(|(start, end)| start..end)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::{
        catalog::{Activity, Budget, Horizon, Relocation, RevenueObjective},
        quantity::{Mills, Watts},
        revenue::Revenue,
    };

    fn catalog(n_slots: usize, windows: &[(i64, i64)]) -> Catalog {
        Catalog {
            horizon: Horizon::new(n_slots, TimeDelta::hours(1)),
            power_sources: Vec::new(),
            activities: vec![Activity {
                owner: "acme".into(),
                name: "batch".into(),
                relocation: Relocation::Fixed,
                parts: Vec::new(),
                migration_penalty: 0,
                forbidden: Vec::new(),
                revenues: windows
                    .iter()
                    .map(|(from, to)| RevenueObjective::Cumulative {
                        from: *from,
                        to: *to,
                        revenue: Revenue::threshold(Mills(1), 1),
                        achieved: 0,
                    })
                    .collect(),
                replay: Vec::new(),
            }],
            budgets: Vec::new(),
            site_objectives: Vec::new(),
        }
    }

    #[test]
    fn test_no_windows_cuts_every_slot() {
        assert_eq!(split(&catalog(3, &[])), [0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_cumulative_windows() {
        assert_eq!(split(&catalog(6, &[(0, 2), (3, 5)])), [0..2, 2..3, 3..5, 5..6]);
    }

    #[test]
    fn test_overlapping_and_clipped_windows() {
        assert_eq!(split(&catalog(6, &[(-2, 2), (1, 4), (5, 9)])), [0..4, 4..5, 5..6]);
    }

    #[test]
    fn test_energy_quota() {
        let mut catalog = catalog(4, &[]);
        catalog.budgets.push(Budget {
            name: "acme".into(),
            activities: vec!["acme/batch".into()],
            datacenter: "dc1".into(),
            quota: Quota::Energy { from: 1, to: 3, cap: Watts(10) },
        });
        catalog.budgets.push(Budget {
            name: "peak".into(),
            activities: vec!["acme/batch".into()],
            datacenter: "dc1".into(),
            quota: Quota::Power { slot: 3, cap: Watts(2) },
        });
        assert_eq!(split(&catalog), [0..1, 1..3, 3..4]);
    }

    #[test]
    fn test_empty_horizon() {
        assert!(split(&catalog(0, &[])).is_empty());
    }
}
