/// Shared surface of [`PhysicalAddress`](crate::PhysicalAddress) and
/// [`VirtualAddress`](crate::VirtualAddress).
///
/// `$tag` prefixes the `Debug` output; `$add` is the `u64` addition used by
/// the `+` operators.
macro_rules! address_type {
    ($name:ident, $tag:literal, $add:path) => {
        impl $name {
            #[inline]
            #[must_use]
            pub const fn new(v: u64) -> Self {
                Self(v)
            }

            #[inline]
            #[must_use]
            pub const fn zero() -> Self {
                Self(0)
            }

            #[inline]
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// Whether the address is a multiple of `S::SIZE`.
            #[inline]
            #[must_use]
            pub const fn is_aligned<S: $crate::PageSize>(self) -> bool {
                self.0 & S::MASK == 0
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, concat!($tag, "({})"), self)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{:#018X}", self.0)
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(v: u64) -> Self {
                Self(v)
            }
        }

        impl ::core::ops::Add<u64> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: u64) -> Self {
                Self($add(self.0, rhs))
            }
        }

        impl ::core::ops::AddAssign<u64> for $name {
            #[inline]
            fn add_assign(&mut self, rhs: u64) {
                *self = *self + rhs;
            }
        }
    };
}

pub(crate) use address_type;
