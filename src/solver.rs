//! Finite-domain constraint solver, scoped to what the scheduling model needs.
//!
//! A [`Space`] owns the variable domains, a reversible trail and the posted constraints. It is
//! private to a single search: concurrent solves each build their own space.

mod branching;
mod constraint;
mod domain;
mod search;
mod space;
mod store;

pub use self::{
    branching::{
        Branch,
        Brancher,
        InOrder,
        LargestImpact,
        MinValue,
        Phase,
        SmallestDomain,
        ValueSelector,
        VariableSelector,
        WarmUp,
    },
    constraint::{Constraint, CostAutomaton, Element, Linear, Ratio},
    domain::Domain,
    search::{Outcome, Search, Termination},
    space::Space,
    store::{Inconsistency, Propagation, Store, VarId},
};

/// Floor division that rounds towards negative infinity.
#[must_use]
pub const fn floor_div(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    if (numerator % denominator != 0) && ((numerator < 0) != (denominator < 0)) {
        quotient - 1
    } else {
        quotient
    }
}

/// Ceiling division that rounds towards positive infinity.
#[must_use]
pub const fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    if (numerator % denominator != 0) && ((numerator < 0) == (denominator < 0)) {
        quotient + 1
    } else {
        quotient
    }
}
