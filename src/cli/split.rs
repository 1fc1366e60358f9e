use anyhow::Result;
use clap::Parser;
use greenfed::{scheduler, tables::build_windows_table};

use crate::cli::problem::ProblemArgs;

#[derive(Parser)]
pub struct SplitArgs {
    #[clap(flatten)]
    pub problem: ProblemArgs,
}

pub fn split(args: &SplitArgs) -> Result<()> {
    let catalog = args.problem.load()?;
    catalog.validate()?;
    let windows = scheduler::split(&catalog);
    println!("{}", build_windows_table(&windows, &catalog));
    Ok(())
}
