use crate::{RegisterWindow, vectors};
use crate::mmio::{MmioWindow, map_mmio};
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::{AddressSpace, FrameAlloc, MapError, PhysMapper};
use log::info;

/// Local APIC register offsets (xAPIC MMIO layout).
pub mod lapic_reg {
    pub const ID: usize = 0x20;
    pub const VERSION: usize = 0x30;
    pub const TPR: usize = 0x80;
    pub const EOI: usize = 0xB0;
    pub const SVR: usize = 0xF0;
    pub const ESR: usize = 0x280;
    pub const LVT_TIMER: usize = 0x320;
    pub const LVT_THERMAL: usize = 0x330;
    pub const LVT_PERF: usize = 0x340;
    pub const LVT_LINT0: usize = 0x350;
    pub const LVT_LINT1: usize = 0x360;
    pub const LVT_ERROR: usize = 0x370;
    pub const TIMER_INIT: usize = 0x380;
    pub const TIMER_CURRENT: usize = 0x390;
    pub const TIMER_DIVIDE: usize = 0x3E0;

    /// LVT mask bit.
    pub const MASKED: u32 = 1 << 16;
    /// LVT timer mode: periodic.
    pub const PERIODIC: u32 = 1 << 17;
    /// SVR software enable.
    pub const SVR_ENABLE: u32 = 1 << 8;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LocalApicError {
    #[error("cannot map the local APIC registers: {0}")]
    Map(#[from] MapError),
}

/// Timer divide configuration (DCR encoding).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u32)]
pub enum Divide {
    By1 = 0b1011,
    By2 = 0b0000,
    By4 = 0b0001,
    By8 = 0b0010,
    By16 = 0b0011,
    By32 = 0b1000,
    By64 = 0b1001,
    By128 = 0b1010,
}

impl Divide {
    #[must_use]
    pub const fn divisor(self) -> u64 {
        match self {
            Self::By1 => 1,
            Self::By2 => 2,
            Self::By4 => 4,
            Self::By8 => 8,
            Self::By16 => 16,
            Self::By32 => 32,
            Self::By64 => 64,
            Self::By128 => 128,
        }
    }
}

/// Periodic timer setup.
#[derive(Copy, Clone, Debug)]
pub struct TimerConfig {
    pub vector: u8,
    pub divide: Divide,
    pub initial_count: u32,
}

impl TimerConfig {
    /// APIC timer input clock QEMU emulates.
    pub const QEMU_BUS_HZ: u64 = 1_000_000_000;

    /// Interrupts per second for a timer clocked at `bus_hz`.
    #[must_use]
    pub const fn frequency_hz(&self, bus_hz: u64) -> u64 {
        bus_hz / self.divide.divisor() / self.initial_count as u64
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            vector: vectors::TIMER,
            divide: Divide::By16,
            initial_count: 1_000_000,
        }
    }
}

/// The bootstrap CPU's local APIC.
pub struct LocalApic<W: RegisterWindow> {
    window: W,
}

impl<W: RegisterWindow> LocalApic<W> {
    #[must_use]
    pub const fn new(window: W) -> Self {
        Self { window }
    }

    /// Software-enables the APIC and starts the periodic timer.
    ///
    /// Every LVT is masked before anything is unmasked; the error LVT is
    /// opened last.
    pub fn init(&self, timer: TimerConfig) {
        use lapic_reg::{
            ESR, LVT_ERROR, LVT_LINT0, LVT_LINT1, LVT_PERF, LVT_THERMAL, LVT_TIMER, MASKED, PERIODIC,
            SVR, SVR_ENABLE, TIMER_DIVIDE, TIMER_INIT, TPR,
        };
        let w = &self.window;

        w.write32(ESR, 0);
        w.write32(TPR, 0);
        w.write32(SVR, SVR_ENABLE | u32::from(vectors::SPURIOUS));

        w.write32(LVT_TIMER, MASKED | u32::from(timer.vector));
        w.write32(LVT_THERMAL, MASKED);
        w.write32(LVT_PERF, MASKED);
        w.write32(LVT_LINT0, MASKED);
        w.write32(LVT_LINT1, MASKED);
        w.write32(LVT_ERROR, MASKED | u32::from(vectors::ERROR));

        w.write32(TIMER_DIVIDE, timer.divide as u32);
        w.write32(LVT_TIMER, u32::from(timer.vector) | PERIODIC);
        w.write32(TIMER_INIT, timer.initial_count);

        let error = w.read32(LVT_ERROR);
        w.write32(LVT_ERROR, error & !MASKED);

        info!(
            "LAPIC: id {}, version {:#x}, timer vector {:#x} every {} ticks (/{})",
            self.id(),
            self.version() & 0xFF,
            timer.vector,
            timer.initial_count,
            timer.divide.divisor()
        );
    }

    /// Acknowledges the interrupt in service.
    #[inline]
    pub fn eoi(&self) {
        self.window.write32(lapic_reg::EOI, 0);
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.window.read32(lapic_reg::ID) >> 24
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.window.read32(lapic_reg::VERSION)
    }

    /// Latches and returns the error status.
    #[must_use]
    pub fn error_status(&self) -> u32 {
        self.window.write32(lapic_reg::ESR, 0);
        self.window.read32(lapic_reg::ESR)
    }

    #[must_use]
    pub fn timer_current(&self) -> u32 {
        self.window.read32(lapic_reg::TIMER_CURRENT)
    }

    pub const fn window(&self) -> &W {
        &self.window
    }
}

impl LocalApic<MmioWindow> {
    /// Maps the register page at `phys` uncached and wraps it.
    ///
    /// # Errors
    /// [`LocalApicError::Map`] if the page could not be mapped.
    pub fn map<M: PhysMapper, F: FrameAlloc>(
        space: &mut AddressSpace<M>,
        alloc: &mut F,
        phys: PhysicalAddress,
        hhdm: u64,
    ) -> Result<Self, LocalApicError> {
        let virt = map_mmio(space, alloc, phys, hhdm)?;
        Ok(Self::new(unsafe { MmioWindow::new(virt) }))
    }
}
