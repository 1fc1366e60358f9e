use anyhow::{Context, Result};
use clap::Parser;
use greenfed::{automaton::Automaton, tables::build_automaton_table};

use crate::cli::problem::ProblemArgs;

#[derive(Parser)]
pub struct AutomatonArgs {
    #[clap(flatten)]
    pub problem: ProblemArgs,

    /// Activity identifier, `owner/name`.
    #[clap(long, env = "ACTIVITY")]
    pub activity: String,
}

pub fn automaton(args: &AutomatonArgs) -> Result<()> {
    let catalog = args.problem.load()?;
    let activity = catalog
        .activity(&args.activity)
        .with_context(|| format!("there is no activity `{}`", args.activity))?;
    let automaton = Automaton::build(activity)?;
    println!("{}", build_automaton_table(activity, &automaton));
    Ok(())
}
