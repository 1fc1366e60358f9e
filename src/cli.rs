mod automaton;
mod problem;
mod solve;
mod split;

use clap::{Parser, Subcommand};

pub use self::{automaton::automaton, solve::solve, split::split};
use crate::cli::{automaton::AutomatonArgs, solve::SolveArgs, split::SplitArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    /// Log the search progress.
    #[clap(long, short, global = true, env = "VERBOSE")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: schedule the activities over the horizon.
    #[clap(name = "solve")]
    Solve(Box<SolveArgs>),

    /// Print the windows the horizon splits into.
    #[clap(name = "split")]
    Split(Box<SplitArgs>),

    /// Print the states and the transition costs of an activity.
    #[clap(name = "automaton")]
    Automaton(Box<AutomatonArgs>),
}
