//! Reduced units.
//!
//! Every quantity the engine reasons about is an integer scaled by the conversion layer, so that
//! all constraint arithmetic stays exact.

#[macro_use]
mod macros;

pub mod currency;
pub mod percent;
pub mod power;

pub use self::{
    currency::{Mills, Price},
    percent::Percent,
    power::Watts,
};
