#![allow(clippy::doc_markdown)]

mod cli;

use anyhow::Result;
use clap::{Parser, crate_version};
use tracing::{Level, info};

use crate::cli::{Args, Command, automaton, solve, split};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();
    info!(version = crate_version!(), "starting…");

    match args.command {
        Command::Solve(args) => solve(&args)?,
        Command::Split(args) => split(&args)?,
        Command::Automaton(args) => automaton(&args)?,
    }

    info!("done!");
    Ok(())
}
