use std::ops::Range;

use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    automaton::Automaton,
    catalog::{Activity, Catalog},
    quantity::{Mills, Percent},
    scheduler::WindowReport,
    solution::{Plan, RevenueOutcome, Status, Totals},
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

fn money_cell(amount: Mills) -> Cell {
    Cell::new(amount).set_alignment(CellAlignment::Right).fg(if amount >= Mills::ZERO {
        Color::Green
    } else {
        Color::Red
    })
}

const fn renewable_color(renewable: Percent) -> Color {
    if renewable.is_fully_renewable() {
        Color::Green
    } else if renewable.0 > 0 {
        Color::DarkYellow
    } else {
        Color::Red
    }
}

/// Chosen state of every activity, one row per slot.
pub fn build_schedule_table(plan: &Plan) -> Table {
    let mut table = new_table();
    table.set_header(
        ["Slot".to_string()]
            .into_iter()
            .chain(plan.activities.iter().map(|activity| activity.id.clone())),
    );
    for slot in 0..plan.n_slots() {
        let cells = plan.activities.iter().map(|activity| {
            let Some(state) = activity.slots.get(slot) else {
                return Cell::new("");
            };
            let nominal: i64 = state.parts.iter().map(|part| part.performance).sum();
            let cell =
                Cell::new(format!("{} ({}, {})", state.state, state.performance, state.power));
            if state.performance < nominal {
                // Paying a transition:
                cell.fg(Color::DarkYellow)
            } else if state.performance == 0 {
                cell.add_attribute(Attribute::Dim)
            } else {
                cell
            }
        });
        table.add_row([Cell::new(slot).add_attribute(Attribute::Dim)].into_iter().chain(cells));
    }
    table
}

/// Allocated power of every source, colored by the forecast renewable share.
pub fn build_sources_table(plan: &Plan, catalog: &Catalog) -> Table {
    let mut table = new_table();
    table.set_header(
        ["Source", "Site"]
            .into_iter()
            .map(str::to_string)
            .chain((0..plan.n_slots()).map(|slot| format!("#{slot}")))
            .chain(["Cost".to_string()]),
    );
    for source in &plan.power_sources {
        let forecast = catalog.power_sources.iter().find(|forecast| forecast.id == source.id);
        let powers = source.power.iter().enumerate().map(|(slot, power)| {
            let cell = Cell::new(power).set_alignment(CellAlignment::Right);
            match forecast.and_then(|forecast| forecast.profile.get(slot)) {
                Some(forecast) => cell.fg(renewable_color(forecast.renewable)),
                None => cell,
            }
        });
        table.add_row(
            [Cell::new(&source.id), Cell::new(&source.datacenter).add_attribute(Attribute::Dim)]
                .into_iter()
                .chain(powers)
                .chain([Cell::new(source.cost).set_alignment(CellAlignment::Right)]),
        );
    }
    table
}

pub fn build_revenue_table(plan: &Plan) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Activity", "Objective", "Performance", "Revenue"]);
    for activity in &plan.activities {
        for outcome in &activity.revenues {
            let (objective, performance) = match outcome {
                RevenueOutcome::Instant { .. } => ("instant".to_string(), String::new()),
                RevenueOutcome::Cumulative { from, to, performance, .. } => {
                    (format!("cumulative {from}..{to}"), performance.to_string())
                }
            };
            table.add_row(vec![
                Cell::new(&activity.id),
                Cell::new(objective),
                Cell::new(performance).set_alignment(CellAlignment::Right),
                money_cell(outcome.revenue()),
            ]);
        }
    }
    for penalty in &plan.site_penalties {
        table.add_row(vec![
            Cell::new(&penalty.datacenter).add_attribute(Attribute::Dim),
            Cell::new(format!("renewable {}..{}", penalty.from, penalty.to)),
            Cell::new(penalty.percentage.map_or_else(String::new, |percentage| {
                format!("{}.{}%", percentage / 10, percentage % 10)
            }))
            .set_alignment(CellAlignment::Right),
            money_cell(-penalty.penalty),
        ]);
    }
    table
}

pub fn build_summary_table(totals: &Totals, status: Status) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Status", "Revenue", "Energy", "Penalty", "Profit"]);
    table.add_row(vec![
        Cell::new(status).fg(match status {
            Status::Ok => Color::Green,
            Status::Timeout => Color::DarkYellow,
            Status::NoSolution => Color::Red,
        }),
        Cell::new(totals.revenue).set_alignment(CellAlignment::Right),
        Cell::new(totals.energy).set_alignment(CellAlignment::Right),
        Cell::new(totals.penalty).set_alignment(CellAlignment::Right),
        money_cell(totals.profit),
    ]);
    table
}

pub fn build_statistics_table(windows: &[WindowReport]) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Window",
        "Heuristic",
        "Status",
        "Nodes",
        "Failures",
        "Improvements",
        "Best",
        "Elapsed",
    ]);
    for window in windows {
        let statistics = &window.statistics;
        let best = statistics.improvements.last();
        table.add_row(vec![
            Cell::new(format!("{}..{}", window.slots.start, window.slots.end)),
            Cell::new(format!("{:?}", window.heuristic)),
            Cell::new(statistics.status),
            Cell::new(statistics.n_nodes).set_alignment(CellAlignment::Right),
            Cell::new(statistics.n_failures)
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
            Cell::new(statistics.improvements.len()).set_alignment(CellAlignment::Right),
            best.map_or_else(|| Cell::new(""), |improvement| money_cell(improvement.profit)),
            Cell::new(humantime::format_duration(statistics.elapsed))
                .add_attribute(Attribute::Dim),
        ]);
    }
    table
}

/// Windows the horizon splits into.
pub fn build_windows_table(windows: &[Range<usize>], catalog: &Catalog) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Start", "End", "Slots", "Cumulative objectives"]);
    for window in windows {
        let n_objectives = catalog
            .activities
            .iter()
            .flat_map(|activity| &activity.revenues)
            .filter_map(|objective| objective.cumulative_slots(catalog.horizon.n_slots))
            .filter(|slots| !slots.is_empty() && window.contains(&slots.start))
            .count();
        table.add_row(vec![
            Cell::new(window.start),
            Cell::new(window.end).add_attribute(Attribute::Dim),
            Cell::new(window.len()).set_alignment(CellAlignment::Right),
            Cell::new(n_objectives).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// States of the activity with their transition costs, the incoming state highlighted.
pub fn build_automaton_table(activity: &Activity, automaton: &Automaton) -> Table {
    let mut table = new_table();
    table.set_header(
        ["#", "State", "Performance", "Power"]
            .into_iter()
            .map(str::to_string)
            .chain((0..automaton.len()).map(|to| format!("→{to}"))),
    );
    for (from, state) in automaton.states().iter().enumerate() {
        let name = Cell::new(state.name(activity));
        let costs = (0..automaton.len()).map(|to| {
            let cost = automaton.transition_cost(from, to);
            let cell = Cell::new(cost).set_alignment(CellAlignment::Right);
            if cost == 0 { cell.add_attribute(Attribute::Dim) } else { cell.fg(Color::DarkYellow) }
        });
        table.add_row(
            [
                Cell::new(from).add_attribute(Attribute::Dim),
                if automaton.incoming() == Some(from) { name.fg(Color::Green) } else { name },
                Cell::new(state.perf()).set_alignment(CellAlignment::Right),
                Cell::new(state.power()).set_alignment(CellAlignment::Right),
            ]
            .into_iter()
            .chain(costs),
        );
    }
    table
}
