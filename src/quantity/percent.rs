quantity!(Percent, suffix: "%");

impl Percent {
    pub const HUNDRED: Self = Self(100);

    #[must_use]
    pub const fn is_fully_renewable(self) -> bool {
        self.0 >= Self::HUNDRED.0
    }
}
