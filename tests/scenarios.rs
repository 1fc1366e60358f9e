use std::time::Duration;

use chrono::TimeDelta;
use enumset::EnumSet;
use greenfed::{
    Error,
    Heuristic,
    Plan,
    Problem,
    Result,
    Scheduler,
    SearchConfig,
    Status,
    catalog::{
        Activity,
        Budget,
        Catalog,
        DatacenterPart,
        ForbiddenMode,
        ForbiddenState,
        Horizon,
        PerfLevel,
        PowerSlot,
        PowerSource,
        Quota,
        Relocation,
        Replay,
        RevenueObjective,
        SiteObjective,
        WorkingMode,
    },
    quantity::{Mills, Percent, Price, Watts},
    revenue::{Penalty, Revenue},
};

fn level(performance: i64, power: i64) -> PerfLevel {
    PerfLevel { performance, power: Watts(power) }
}

fn part(datacenter: &str, modes: Vec<WorkingMode>) -> DatacenterPart {
    DatacenterPart {
        datacenter: datacenter.into(),
        default_mode: modes[0].name.clone(),
        modes,
        current_mode: None,
    }
}

fn source(id: &str, datacenter: &str, profile: &[(i64, i64, i64)]) -> PowerSource {
    PowerSource {
        id: id.into(),
        datacenter: datacenter.into(),
        slot_duration: TimeDelta::hours(1),
        profile: profile
            .iter()
            .map(|(peak, renewable, price)| PowerSlot {
                peak: Watts(*peak),
                renewable: Percent(*renewable),
                price: Price(*price),
            })
            .collect(),
    }
}

fn activity(
    name: &str,
    relocation: Relocation,
    parts: Vec<DatacenterPart>,
    revenues: Vec<RevenueObjective>,
) -> Activity {
    Activity {
        owner: "acme".into(),
        name: name.into(),
        relocation,
        parts,
        migration_penalty: 0,
        forbidden: Vec::new(),
        revenues,
        replay: Vec::new(),
    }
}

fn cumulative(from: i64, to: i64, price: i64, performance: i64) -> RevenueObjective {
    RevenueObjective::Cumulative {
        from,
        to,
        revenue: Revenue::threshold(Mills(price), performance),
        achieved: 0,
    }
}

/// One free, fully renewable source with a rising peak, and a batch activity paid for
/// performance 12 over the horizon.
fn rising_peak() -> Catalog {
    Catalog {
        horizon: Horizon::new(3, TimeDelta::hours(1)),
        power_sources: vec![source("solar", "dc1", &[(2, 100, 0), (4, 100, 0), (6, 100, 0)])],
        activities: vec![activity(
            "batch",
            Relocation::Fixed,
            vec![part(
                "dc1",
                vec![
                    WorkingMode::new("S", [level(2, 2)]),
                    WorkingMode::new("M", [level(4, 4)]),
                    WorkingMode::new("F", [level(6, 6)]),
                ],
            )],
            vec![cumulative(0, 3, 100_000, 12)],
        )],
        budgets: Vec::new(),
        site_objectives: Vec::new(),
    }
}

fn schedule(catalog: &Catalog) -> Result<Plan> {
    let schedule = Scheduler::builder().catalog(catalog).build().run()?;
    assert_eq!(schedule.status, Status::Ok);
    Ok(schedule.plan.expect("an exhausted search should return the plan"))
}

fn state_names(plan: &Plan, activity: usize) -> Vec<&str> {
    plan.activities[activity].slots.iter().map(|slot| slot.state.as_str()).collect()
}

#[test]
fn rising_peak_reaches_the_objective() -> Result {
    let plan = schedule(&rising_peak())?;
    assert_eq!(state_names(&plan, 0), ["S", "M", "F"]);
    assert_eq!(plan.totals.profit, Mills(100_000));
    assert_eq!(plan.power_sources[0].power, [Watts(2), Watts(4), Watts(6)]);
    Ok(())
}

#[test]
fn transition_cost_misses_the_objective() -> Result {
    let mut catalog = rising_peak();
    let modes = &mut catalog.activities[0].parts[0].modes;
    modes[0] = WorkingMode::new("S", [level(2, 2)]).with_transition("M", 1);
    let plan = schedule(&catalog)?;
    assert_eq!(plan.totals.revenue, Mills::ZERO);
    assert_eq!(plan.totals.profit, Mills::ZERO);
    Ok(())
}

#[test]
fn replay_pins_the_state() -> Result {
    let mut catalog = rising_peak();
    catalog.activities[0].replay.push(Replay { slot: 2, state: "M".into() });
    let plan = schedule(&catalog)?;
    assert_eq!(state_names(&plan, 0)[2], "M");
    assert_eq!(plan.totals.profit, Mills::ZERO);
    Ok(())
}

fn assert_invalid(catalog: &Catalog) {
    let result = Scheduler::builder().catalog(catalog).build().run();
    assert!(matches!(result, Err(Error::InvalidInput { .. })), "{result:?}");
}

#[test]
fn unknown_replay_state_is_invalid() {
    let mut catalog = rising_peak();
    catalog.activities[0].replay.push(Replay { slot: 1, state: "turbo".into() });
    assert_invalid(&catalog);
}

#[test]
fn replay_beyond_the_horizon_is_invalid() {
    let mut catalog = rising_peak();
    catalog.activities[0].replay.push(Replay { slot: 3, state: "M".into() });
    assert_invalid(&catalog);
}

#[test]
fn short_profile_is_invalid() {
    let mut catalog = rising_peak();
    catalog.power_sources[0].profile.pop();
    assert_invalid(&catalog);
}

#[test]
fn long_profile_is_invalid() {
    let mut catalog = rising_peak();
    let last = catalog.power_sources[0].profile[2];
    catalog.power_sources[0].profile.extend([last, last]);
    assert_invalid(&catalog);
}

#[test]
fn heterogeneous_slot_durations_are_invalid() {
    let mut catalog = rising_peak();
    catalog.power_sources[0].slot_duration = TimeDelta::minutes(15);
    assert_invalid(&catalog);
}

#[test]
fn instant_objective_beyond_the_horizon_is_invalid() {
    let mut catalog = rising_peak();
    catalog.activities[0]
        .revenues
        .push(RevenueObjective::Instant { slot: 7, revenue: Revenue::threshold(Mills(1), 1) });
    assert_invalid(&catalog);
}

#[test]
fn forbidden_state_with_an_unknown_mode_is_invalid() {
    let mut catalog = rising_peak();
    catalog.activities[0].forbidden.push(ForbiddenState {
        modes: vec![ForbiddenMode { datacenter: "dc1".into(), mode: "turbo".into() }],
    });
    assert_invalid(&catalog);
}

#[test]
fn budget_outside_the_horizon_is_invalid() {
    let mut catalog = rising_peak();
    catalog.budgets.push(Budget {
        name: "acme".into(),
        activities: vec!["acme/batch".into()],
        datacenter: "dc1".into(),
        quota: Quota::Energy { from: 1, to: 5, cap: Watts(100) },
    });
    assert_invalid(&catalog);
}

#[test]
fn quota_below_the_minimum_is_rejected() {
    let mut catalog = rising_peak();
    catalog.budgets.push(Budget {
        name: "acme".into(),
        activities: vec!["acme/batch".into()],
        datacenter: "dc1".into(),
        quota: Quota::Energy { from: 0, to: 3, cap: Watts(5) },
    });
    let config = SearchConfig::default();
    let result = Problem::builder().catalog(&catalog).config(&config).build();
    match result {
        Err(Error::QuotaInfeasible { cap, minimum, .. }) => assert_eq!((cap, minimum), (5, 6)),
        Err(error) => panic!("unexpected error: {error}"),
        Ok(_) => panic!("the quota should be rejected"),
    }
}

#[test]
fn quota_above_the_minimum_limits_the_plan() -> Result {
    let mut catalog = rising_peak();
    catalog.budgets.push(Budget {
        name: "acme".into(),
        activities: vec!["acme/batch".into()],
        datacenter: "dc1".into(),
        quota: Quota::Energy { from: 0, to: 3, cap: Watts(10) },
    });
    let plan = schedule(&catalog)?;
    let energy: Watts = plan.activities[0].slots.iter().map(|slot| slot.power).sum();
    assert!(energy <= Watts(10));
    assert_eq!(plan.totals.profit, Mills::ZERO);
    Ok(())
}

#[test]
fn spread_over_two_sites() -> Result {
    let catalog = Catalog {
        horizon: Horizon::new(2, TimeDelta::hours(1)),
        power_sources: vec![
            source("a-grid", "a", &[(1, 100, 0), (1, 100, 0)]),
            source("b-grid", "b", &[(2, 100, 0), (2, 100, 0)]),
        ],
        activities: vec![activity(
            "web",
            Relocation::Spreadable,
            vec![
                part(
                    "a",
                    vec![
                        WorkingMode::new("a1", [level(1, 1)]),
                        WorkingMode::new("a2", [level(2, 2)]),
                    ],
                ),
                part(
                    "b",
                    vec![
                        WorkingMode::new("b1", [level(2, 2)]),
                        WorkingMode::new("b2", [level(3, 3)]),
                    ],
                ),
            ],
            vec![cumulative(0, 2, 3000, 6)],
        )],
        budgets: Vec::new(),
        site_objectives: Vec::new(),
    };
    let plan = schedule(&catalog)?;
    assert_eq!(plan.totals.profit, Mills(3000));
    assert_eq!(state_names(&plan, 0), ["a:a1+b:b1", "a:a1+b:b1"]);
    for slot in &plan.activities[0].slots {
        let powers: Vec<Watts> = slot.parts.iter().map(|part| part.power).collect();
        assert_eq!(powers, [Watts(1), Watts(2)]);
        assert_eq!(slot.power, Watts(3));
    }
    assert_eq!(plan.power_sources[0].power, [Watts(1), Watts(1)]);
    assert_eq!(plan.power_sources[1].power, [Watts(2), Watts(2)]);
    Ok(())
}

#[test]
fn zero_time_limit_times_out() -> Result {
    let catalog = rising_peak();
    let schedule = Scheduler::builder()
        .catalog(&catalog)
        .config(SearchConfig::builder().time_limit(Duration::ZERO).build())
        .build()
        .run()?;
    assert_eq!(schedule.status, Status::Timeout);
    assert!(schedule.plan.is_none());

    let config = SearchConfig::builder().time_limit(Duration::ZERO).build();
    let solved = Problem::builder()
        .catalog(&catalog)
        .config(&config)
        .build()?
        .solve(Heuristic::Green, None);
    assert_eq!(solved.statistics.status, Status::Timeout);
    assert!(solved.plan.is_none());
    assert!(solved.statistics.improvements.is_empty());
    Ok(())
}

/// Two sites with mixed sources, a migratable and a fixed activity, and a renewable objective.
fn federation() -> Result<Catalog> {
    let mut migratable = activity(
        "web",
        Relocation::Migratable,
        vec![
            part(
                "north",
                vec![
                    WorkingMode::new("idle", [level(0, 1)]),
                    WorkingMode::new("run", [level(2, 2), level(4, 4)]).with_transition("idle", 1),
                ],
            ),
            part(
                "south",
                vec![
                    WorkingMode::new("idle", [level(0, 1)]),
                    WorkingMode::new("run", [level(3, 3)]),
                ],
            ),
        ],
        vec![
            cumulative(0, 3, 2000, 6),
            RevenueObjective::Instant { slot: 1, revenue: Revenue::threshold(Mills(500), 3) },
        ],
    );
    migratable.migration_penalty = 1;
    let fixed = activity(
        "batch",
        Relocation::Fixed,
        vec![part(
            "south",
            vec![WorkingMode::new("eco", [level(1, 1)]), WorkingMode::new("max", [level(3, 4)])],
        )],
        vec![RevenueObjective::Instant { slot: 2, revenue: Revenue::threshold(Mills(300), 3) }],
    );
    Ok(Catalog {
        horizon: Horizon::new(3, TimeDelta::hours(1)),
        power_sources: vec![
            source("north-solar", "north", &[(4, 100, 1), (6, 100, 1), (2, 100, 1)]),
            source("north-grid", "north", &[(10, 20, 5), (10, 20, 5), (10, 20, 5)]),
            source("south-grid", "south", &[(10, 50, 3), (10, 50, 3), (10, 50, 3)]),
        ],
        activities: vec![migratable, fixed],
        budgets: Vec::new(),
        site_objectives: vec![SiteObjective::RenewablePercentage {
            datacenter: "north".into(),
            from: 0,
            to: 3,
            penalty: Penalty(Revenue::try_new(Mills::ZERO, 500, Mills(-200), Vec::new())?),
            history: Default::default(),
        }],
    })
}

#[test]
fn power_is_conserved_on_every_site() -> Result {
    let catalog = federation()?;
    let plan = schedule(&catalog)?;
    for datacenter in ["north", "south"] {
        for slot in 0..3 {
            let drawn: Watts = plan
                .activities
                .iter()
                .flat_map(|activity| &activity.slots[slot].parts)
                .filter(|part| part.datacenter == datacenter)
                .map(|part| part.power)
                .sum();
            let supplied: Watts = plan
                .power_sources
                .iter()
                .filter(|source| source.datacenter == datacenter)
                .map(|source| source.power[slot])
                .sum();
            assert_eq!(drawn, supplied, "{datacenter} at slot #{slot}");
        }
    }
    Ok(())
}

#[test]
fn profit_decomposes() -> Result {
    let catalog = federation()?;
    let plan = schedule(&catalog)?;
    let totals = plan.totals;
    assert_eq!(totals.profit, totals.revenue - totals.energy - totals.penalty);
    assert_eq!(
        totals.revenue,
        plan.activities.iter().map(|activity| activity.revenue).sum::<Mills>(),
    );
    assert_eq!(totals.energy, plan.power_sources.iter().map(|source| source.cost).sum::<Mills>());
    assert_eq!(
        totals.penalty,
        plan.site_penalties.iter().map(|penalty| penalty.penalty).sum::<Mills>(),
    );
    for source in &plan.power_sources {
        let forecast = catalog.power_sources.iter().find(|forecast| forecast.id == source.id);
        let forecast = forecast.expect("every planned source should be in the catalog");
        let cost: Mills = source
            .power
            .iter()
            .zip(&forecast.profile)
            .map(|(power, slot)| *power * slot.price)
            .sum();
        assert_eq!(cost, source.cost, "{}", source.id);
    }
    Ok(())
}

#[test]
fn heuristics_agree_on_the_optimum() -> Result {
    let catalog = federation()?;
    let profits = [Heuristic::Green, Heuristic::GreenSite]
        .into_iter()
        .map(|heuristic| -> Result<Mills> {
            let plan = Scheduler::builder()
                .catalog(&catalog)
                .heuristics(EnumSet::only(heuristic))
                .build()
                .run()?
                .plan
                .expect("an exhausted search should return the plan");
            Ok(plan.totals.profit)
        })
        .collect::<Result<Vec<Mills>>>()?;
    assert_eq!(profits[0], profits[1]);
    Ok(())
}

#[test]
fn previous_plan_round_trips_into_the_incumbent() -> Result {
    let catalog = rising_peak();
    let plan = schedule(&catalog)?;
    let previous: Plan = serde_json::from_str(&serde_json::to_string(&plan).unwrap()).unwrap();
    let schedule = Scheduler::builder()
        .catalog(&catalog)
        .heuristics(EnumSet::only(Heuristic::Incumbent))
        .previous(&previous)
        .build()
        .run()?;
    assert!(schedule.windows.iter().all(|window| window.heuristic == Heuristic::Incumbent));
    let replanned = schedule.plan.expect("an exhausted search should return the plan");
    assert_eq!(state_names(&replanned, 0), ["S", "M", "F"]);
    assert_eq!(replanned.totals.profit, plan.totals.profit);
    Ok(())
}

#[test]
fn problem_document_parses() -> Result {
    let document = r#"
        [horizon]
        n-slots = 2
        slot-duration-secs = 3600

        [[power-sources]]
        id = "solar"
        datacenter = "dc1"
        slot-duration-secs = 3600
        profile = [
            { peak = 4, renewable = 100, price = 0 },
            { peak = 4, renewable = 100, price = 0 },
        ]

        [[activities]]
        owner = "acme"
        name = "batch"
        relocation = "fixed"

        [[activities.parts]]
        datacenter = "dc1"
        default-mode = "low"
        modes = [
            { name = "low", levels = [{ performance = 1, power = 1 }] },
            { name = "high", levels = [{ performance = 3, power = 3 }] },
        ]

        [[activities.revenues]]
        kind = "cumulative"
        from = 0
        to = 2
        revenue = { base-price = 100, base-performance = 6 }
    "#;
    let catalog: Catalog = toml::from_str(document).expect("the document should parse");
    let plan = schedule(&catalog)?;
    assert_eq!(state_names(&plan, 0), ["high", "high"]);
    assert_eq!(plan.totals.profit, Mills(100));
    Ok(())
}
