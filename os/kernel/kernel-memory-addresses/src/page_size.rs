mod sealed {
    pub trait Sealed {}
}

/// A page granularity the page tables can map.
///
/// Sealed: only [`Size4K`] and [`Size2M`] exist.
pub trait PageSize: sealed::Sealed + Copy + Eq + core::fmt::Debug {
    const SHIFT: u32;
    const SIZE: u64 = 1 << Self::SHIFT;
    /// Low bits that address a byte inside the page.
    const MASK: u64 = Self::SIZE - 1;
}

macro_rules! page_size {
    ($(#[$doc:meta])* $name:ident, shift = $shift:literal) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl PageSize for $name {
            const SHIFT: u32 = $shift;
        }
    };
}

page_size!(
    /// Base page, mapped by a PT entry.
    Size4K,
    shift = 12
);

page_size!(
    /// Huge page, mapped by a PD entry with `PS` set.
    Size2M,
    shift = 21
);

const _: () = assert!(Size4K::SIZE == 4096 && Size2M::SIZE == 0x20_0000);
