use std::ops::Range;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};

/// Planning horizon: `n_slots` slots of the same duration.
#[serde_as]
#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Horizon {
    #[serde(rename = "n-slots")]
    pub n_slots: usize,

    #[serde(rename = "slot-duration-secs")]
    #[serde_as(as = "DurationSeconds<i64>")]
    pub slot_duration: TimeDelta,
}

impl Horizon {
    pub const fn new(n_slots: usize, slot_duration: TimeDelta) -> Self {
        Self { n_slots, slot_duration }
    }

    pub const fn slots(&self) -> Range<usize> {
        0..self.n_slots
    }

    pub fn window(&self, slots: &Range<usize>) -> Self {
        Self { n_slots: slots.len(), slot_duration: self.slot_duration }
    }

    #[expect(clippy::cast_possible_wrap)]
    pub const fn end(&self) -> i64 {
        self.n_slots as i64
    }
}
