//! # Local APIC and I/O APIC programming
//!
//! * [`LocalApic`]: per-CPU controller; brought up with every LVT masked, a
//!   periodic timer and the error vector armed.
//! * [`IoApicSet`]: up to eight I/O APICs discovered from the MADT, each with
//!   every pin masked until a driver routes it with [`IoApicSet::set_irq`].
//! * [`Ticks`]: the timer tick counter the interrupt handler bumps.
//! * [`Stopwatch`]: elapsed seconds from TSC readings and the tick-derived rate.
//!
//! All register access goes through [`RegisterWindow`]. The kernel uses
//! [`MmioWindow`] over an uncached mapping created by [`map_mmio`]; tests use
//! an in-memory register file.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod io_apic;
mod local_apic;
mod mmio;
mod stopwatch;
mod ticks;
pub mod vectors;

pub use io_apic::{
    DeliveryMode, IoApic, IoApicError, IoApicSet, MAX_IO_APICS, RedirectionEntry,
};
pub use local_apic::{Divide, LocalApic, LocalApicError, TimerConfig, lapic_reg};
pub use mmio::{MmioWindow, UNCACHED_ALIAS_BASE, map_mmio};
pub use stopwatch::Stopwatch;
pub use ticks::{Ticks, rdtsc};

/// 32-bit registers addressed by byte offset from a window base.
pub trait RegisterWindow {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
}

impl<W: RegisterWindow + ?Sized> RegisterWindow for &W {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }
}
