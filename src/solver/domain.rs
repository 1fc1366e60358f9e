use itertools::Either;

/// Domain of an integer variable.
///
/// Never empty: an operation that would empty a domain reports an inconsistency instead.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Domain {
    /// Every integer in `min..=max`.
    Interval { min: i64, max: i64 },

    /// Explicit values, sorted and deduplicated.
    Values(Vec<i64>),
}

impl Domain {
    #[must_use]
    pub fn interval(min: i64, max: i64) -> Self {
        debug_assert!(min <= max, "empty interval {min}..={max}");
        Self::Interval { min, max }
    }

    #[must_use]
    pub const fn fixed(value: i64) -> Self {
        Self::Interval { min: value, max: value }
    }

    /// Explicit domain, [`None`] when there are no values.
    #[must_use]
    pub fn values(values: impl IntoIterator<Item = i64>) -> Option<Self> {
        let mut values: Vec<i64> = values.into_iter().collect();
        values.sort_unstable();
        values.dedup();
        (!values.is_empty()).then_some(Self::Values(values))
    }

    #[must_use]
    pub fn min(&self) -> i64 {
        match self {
            Self::Interval { min, .. } => *min,
            Self::Values(values) => values[0],
        }
    }

    #[must_use]
    pub fn max(&self) -> i64 {
        match self {
            Self::Interval { max, .. } => *max,
            Self::Values(values) => values[values.len() - 1],
        }
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Self::Interval { min, max } => max.abs_diff(*min) + 1,
            Self::Values(values) => values.len() as u64,
        }
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.min() == self.max()
    }

    #[must_use]
    pub fn value(&self) -> Option<i64> {
        self.is_fixed().then(|| self.min())
    }

    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        match self {
            Self::Interval { min, max } => (*min..=*max).contains(&value),
            Self::Values(values) => values.binary_search(&value).is_ok(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        match self {
            Self::Interval { min, max } => Either::Left(*min..=*max),
            Self::Values(values) => Either::Right(values.iter().copied()),
        }
    }

    /// Domain restricted to `min..=max`, [`None`] if nothing is left.
    #[must_use]
    pub(super) fn restricted(&self, min: i64, max: i64) -> Option<Self> {
        match self {
            Self::Interval { min: own_min, max: own_max } => {
                let (min, max) = ((*own_min).max(min), (*own_max).min(max));
                (min <= max).then_some(Self::Interval { min, max })
            }
            Self::Values(values) => {
                let values: Vec<i64> =
                    values.iter().copied().filter(|value| (min..=max).contains(value)).collect();
                (!values.is_empty()).then_some(Self::Values(values))
            }
        }
    }

    /// Domain without `value`, [`None`] if nothing is left.
    ///
    /// Removing an inner value from an interval is not representable and leaves it as is.
    #[must_use]
    pub(super) fn without(&self, value: i64) -> Option<Self> {
        match self {
            Self::Interval { min, max } if value == *min => self.restricted(min + 1, *max),
            Self::Interval { min, max } if value == *max => self.restricted(*min, max - 1),
            Self::Interval { .. } => Some(self.clone()),
            Self::Values(values) => {
                let values: Vec<i64> = values.iter().copied().filter(|own| *own != value).collect();
                (!values.is_empty()).then_some(Self::Values(values))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_sorted() {
        let domain = Domain::values([5, 1, 3, 1]).unwrap();
        assert_eq!(domain, Domain::Values(vec![1, 3, 5]));
        assert_eq!(domain.min(), 1);
        assert_eq!(domain.max(), 5);
        assert_eq!(domain.size(), 3);
        assert!(!domain.contains(2));
    }

    #[test]
    fn test_empty_values() {
        assert!(Domain::values([]).is_none());
    }

    #[test]
    fn test_restricted() {
        assert_eq!(Domain::interval(0, 10).restricted(3, 20), Some(Domain::interval(3, 10)));
        assert_eq!(Domain::interval(0, 10).restricted(11, 20), None);
        assert_eq!(
            Domain::values([1, 3, 5]).unwrap().restricted(2, 5),
            Some(Domain::Values(vec![3, 5])),
        );
    }

    #[test]
    fn test_without() {
        assert_eq!(Domain::interval(0, 10).without(0), Some(Domain::interval(1, 10)));
        assert_eq!(Domain::interval(0, 10).without(5), Some(Domain::interval(0, 10)));
        assert_eq!(Domain::fixed(4).without(4), None);
        assert_eq!(Domain::values([1, 3]).unwrap().without(3), Some(Domain::Values(vec![1])));
    }
}
