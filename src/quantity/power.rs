quantity!(
    /// Reduced watts: power drawn or supplied over one slot.
    Watts, suffix: "W"
);
