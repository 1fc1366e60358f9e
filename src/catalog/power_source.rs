use std::ops::Range;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};

use crate::{
    catalog::Horizon,
    prelude::*,
    quantity::{Percent, Price, Watts},
};

/// Forecast of one slot of a power source.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PowerSlot {
    /// Maximum power the source may deliver during the slot.
    pub peak: Watts,

    /// Share of the delivered power that is renewable.
    pub renewable: Percent,

    pub price: Price,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PowerSource {
    pub id: String,

    /// Data center fed by the source.
    pub datacenter: String,

    /// Duration of every profile slot, must match the horizon.
    #[serde(rename = "slot-duration-secs")]
    #[serde_as(as = "DurationSeconds<i64>")]
    pub slot_duration: TimeDelta,

    pub profile: Vec<PowerSlot>,
}

impl PowerSource {
    pub fn validate(&self, horizon: &Horizon) -> Result {
        let context = || format!("power source `{}`", self.id);
        if self.slot_duration != horizon.slot_duration {
            return Err(Error::invalid_input(
                context(),
                format!(
                    "slot duration {}s differs from the horizon slot duration {}s",
                    self.slot_duration.num_seconds(),
                    horizon.slot_duration.num_seconds(),
                ),
            ));
        }
        if self.profile.len() != horizon.n_slots {
            return Err(Error::invalid_input(
                context(),
                format!(
                    "{} profile slots for a horizon of {}",
                    self.profile.len(),
                    horizon.n_slots,
                ),
            ));
        }
        for (slot, forecast) in self.profile.iter().enumerate() {
            if forecast.peak < Watts::ZERO {
                return Err(Error::invalid_input(
                    context(),
                    format!("negative peak at slot #{slot}"),
                ));
            }
            if forecast.renewable < Percent::ZERO || forecast.renewable > Percent::HUNDRED {
                return Err(Error::invalid_input(
                    context(),
                    format!(
                        "renewable share {} at slot #{slot} is out of range",
                        forecast.renewable,
                    ),
                ));
            }
            if forecast.price < Price::ZERO {
                return Err(Error::invalid_input(
                    context(),
                    format!("negative price at slot #{slot}"),
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn at(&self, slot: usize) -> &PowerSlot {
        &self.profile[slot]
    }

    #[must_use]
    pub fn window(&self, slots: &Range<usize>) -> Self {
        Self {
            id: self.id.clone(),
            datacenter: self.datacenter.clone(),
            slot_duration: self.slot_duration,
            profile: self.profile[slots.clone()].to_vec(),
        }
    }
}
