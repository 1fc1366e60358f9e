use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use enumset::EnumSet;
use greenfed::{
    Heuristic,
    Plan,
    Scheduler,
    SearchConfig,
    quantity::Percent,
    tables::{
        build_revenue_table,
        build_schedule_table,
        build_sources_table,
        build_statistics_table,
        build_summary_table,
    },
};
use tracing::{info, instrument, warn};

use crate::cli::problem::ProblemArgs;

#[derive(Parser)]
pub struct SolveArgs {
    #[clap(flatten)]
    pub problem: ProblemArgs,

    /// Wall-clock budget of every window and configuration.
    #[clap(long, env = "TIME_LIMIT", default_value = "10s")]
    pub time_limit: humantime::Duration,

    /// Competing configurations of every window.
    #[clap(
        long = "heuristics",
        env = "HEURISTICS",
        value_delimiter = ',',
        num_args = 1..,
        default_value = "green,green-site,incumbent",
    )]
    pub heuristics: Vec<Heuristic>,

    /// Plan of a previous run, to follow where it is still feasible.
    #[clap(long, env = "PREVIOUS_PLAN")]
    pub previous: Option<PathBuf>,

    /// Write the plan as JSON.
    #[clap(long, env = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Keep the states that waste power above a saturated instant objective.
    #[clap(long, env = "NO_WASTE_PRUNING")]
    pub no_waste_pruning: bool,

    /// Decisions per slot ordered by estimated impact.
    #[clap(long, env = "WARM_UP", default_value = "1")]
    pub warm_up: usize,

    /// A source still counts as green this many percent points below the site average.
    #[clap(long, env = "GREEN_TOLERANCE", default_value = "0")]
    pub green_tolerance: i64,
}

impl SolveArgs {
    #[must_use]
    pub fn heuristics(&self) -> EnumSet<Heuristic> {
        self.heuristics.iter().copied().collect()
    }

    pub fn config(&self) -> SearchConfig {
        SearchConfig::builder()
            .time_limit(Duration::from(self.time_limit))
            .warm_up(self.warm_up)
            .prune_waste(!self.no_waste_pruning)
            .green_tolerance(Percent(self.green_tolerance))
            .build()
    }

    fn previous_plan(&self) -> Result<Option<Plan>> {
        let Some(path) = &self.previous else {
            return Ok(None);
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        let plan = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse `{}`", path.display()))?;
        Ok(Some(plan))
    }
}

#[instrument(skip_all)]
pub fn solve(args: &SolveArgs) -> Result<()> {
    let catalog = args.problem.load()?;
    let previous = args.previous_plan()?;
    let schedule = Scheduler::builder()
        .catalog(&catalog)
        .config(args.config())
        .heuristics(args.heuristics())
        .maybe_previous(previous.as_ref())
        .build()
        .run()
        .context("failed to schedule")?;

    println!("{}", build_statistics_table(&schedule.windows));
    let Some(plan) = schedule.plan else {
        warn!(status = %schedule.status, "no plan found in time, try a longer time limit");
        return Ok(());
    };
    println!("{}", build_schedule_table(&plan));
    println!("{}", build_sources_table(&plan, &catalog));
    println!("{}", build_revenue_table(&plan));
    println!("{}", build_summary_table(&plan.totals, schedule.status));

    if let Some(path) = &args.output {
        let text = serde_json::to_string_pretty(&plan)?;
        fs::write(path, text).with_context(|| format!("failed to write `{}`", path.display()))?;
        info!(path = %path.display(), "written");
    }
    Ok(())
}
