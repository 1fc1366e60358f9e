#![allow(clippy::doc_markdown)]

//! Green working-mode scheduling for federations of data centers.
//!
//! Given per-slot power forecasts for every site and the working modes of every activity, the
//! engine picks a state for each activity in each time slot so that the service-level revenue
//! minus the energy cost and penalties is as high as it could be found within the time budget.

pub mod automaton;
pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod prelude;
pub mod quantity;
pub mod revenue;
pub mod scheduler;
pub mod solution;
pub mod solver;
pub mod tables;

pub use self::{
    config::SearchConfig,
    error::{Error, Result},
    model::{Heuristic, Problem, Solved},
    scheduler::{Schedule, Scheduler},
    solution::{Plan, Statistics, Status},
};
