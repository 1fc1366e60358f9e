macro_rules! quantity {
    ($(#[$attribute:meta])* $name:ident, suffix: $suffix:literal) => {
        $(#[$attribute])*
        #[repr(transparent)]
        #[derive(
            ::derive_more::Add,
            ::derive_more::AddAssign,
            ::derive_more::FromStr,
            ::derive_more::Neg,
            ::derive_more::Sub,
            ::derive_more::SubAssign,
            ::derive_more::Sum,
            ::serde::Deserialize,
            ::serde::Serialize,
            ::std::clone::Clone,
            ::std::marker::Copy,
            ::std::default::Default,
            ::std::hash::Hash,
            ::std::cmp::Eq,
            ::std::cmp::PartialEq,
            ::std::cmp::Ord,
            ::std::cmp::PartialOrd,
        )]
        pub struct $name(pub i64);

        impl $name {
            pub const ZERO: Self = Self(0);
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, formatter)?;
                write!(formatter, " {}", $suffix)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Debug::fmt(&self.0, formatter)?;
                write!(formatter, "{}", $suffix)
            }
        }

        impl ::std::ops::Mul<i64> for $name {
            type Output = Self;

            fn mul(self, rhs: i64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl ::std::convert::From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl ::std::convert::From<$name> for i64 {
            fn from(quantity: $name) -> Self {
                quantity.0
            }
        }
    };
}
