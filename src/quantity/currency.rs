use std::ops::Mul;

use crate::quantity::power::Watts;

quantity!(
    /// [Mill][1], the reduced currency unit.
    ///
    /// [1]: https://en.wikipedia.org/wiki/Mill_(currency)
    Mills, suffix: "₥"
);

quantity!(
    /// Unit energy price: mills per reduced watt drawn over one slot.
    Price, suffix: "₥/W"
);

impl Mul<Price> for Watts {
    type Output = Mills;

    fn mul(self, price: Price) -> Self::Output {
        Mills(self.0 * price.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_cost() {
        assert_eq!(Watts(4) * Price(3), Mills(12));
    }

    #[test]
    fn test_display() {
        assert_eq!(Mills(1500).to_string(), "1500 ₥");
        assert_eq!(format!("{:?}", Watts(-2)), "-2W");
    }
}
