//! # I/O APIC
//!
//! Two registers are visible through the window: `IOREGSEL` at +0x00 selects
//! an internal register, `IOWIN` at +0x10 reads or writes it. Redirection
//! entry `n` occupies internal registers `0x10 + 2n` (low) and `0x11 + 2n`
//! (high).

use crate::RegisterWindow;
use bitfield_struct::bitfield;
use kernel_acpi::madt::IoApicEntry;
use log::{info, warn};

pub const MAX_IO_APICS: usize = 8;

const IOREGSEL: usize = 0x00;
const IOWIN: usize = 0x10;

const REG_ID: u32 = 0x00;
const REG_VERSION: u32 = 0x01;
const REG_REDIRECTION: u32 = 0x10;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum IoApicError {
    #[error("no I/O APIC handles GSI {0}")]
    NoIoApicForGsi(u32),
    #[error("too many I/O APICs (>{MAX_IO_APICS})")]
    TooMany,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum DeliveryMode {
    Fixed = 0b000,
    LowestPriority = 0b001,
    Smi = 0b010,
    Nmi = 0b100,
    Init = 0b101,
    ExtInt = 0b111,
}

impl DeliveryMode {
    /// Reserved encodings read back as [`Fixed`](Self::Fixed).
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b001 => Self::LowestPriority,
            0b010 => Self::Smi,
            0b100 => Self::Nmi,
            0b101 => Self::Init,
            0b111 => Self::ExtInt,
            _ => Self::Fixed,
        }
    }

    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// A 64-bit redirection table entry.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct RedirectionEntry {
    pub vector: u8,
    #[bits(3)]
    pub delivery_mode: DeliveryMode,
    pub logical_destination: bool,
    pub delivery_pending: bool,
    pub active_low: bool,
    pub remote_irr: bool,
    pub level_triggered: bool,
    pub masked: bool,
    #[bits(39)]
    __: u64,
    pub destination: u8,
}

impl RedirectionEntry {
    #[allow(clippy::cast_possible_truncation)]
    const fn low(self) -> u32 {
        self.into_bits() as u32
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn high(self) -> u32 {
        (self.into_bits() >> 32) as u32
    }

    const fn from_halves(low: u32, high: u32) -> Self {
        Self::from_bits(((high as u64) << 32) | low as u64)
    }
}

/// One I/O APIC.
pub struct IoApic<W: RegisterWindow> {
    id: u8,
    gsi_base: u32,
    max_redirection: u8,
    window: W,
}

impl<W: RegisterWindow> IoApic<W> {
    /// Reads the version register to learn how many pins there are.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn new(id: u8, gsi_base: u32, window: W) -> Self {
        let mut this = Self {
            id,
            gsi_base,
            max_redirection: 0,
            window,
        };
        this.max_redirection = ((this.read(REG_VERSION) >> 16) & 0xFF) as u8;
        this
    }

    #[must_use]
    pub const fn id(&self) -> u8 {
        self.id
    }

    #[must_use]
    pub const fn gsi_base(&self) -> u32 {
        self.gsi_base
    }

    /// Highest valid pin index.
    #[must_use]
    pub const fn max_redirection(&self) -> u8 {
        self.max_redirection
    }

    #[must_use]
    pub const fn pin_count(&self) -> u32 {
        self.max_redirection as u32 + 1
    }

    /// The pin for `gsi`, if this I/O APIC routes it.
    #[must_use]
    pub const fn pin_for(&self, gsi: u32) -> Option<u32> {
        match gsi.checked_sub(self.gsi_base) {
            Some(pin) if pin < self.pin_count() => Some(pin),
            _ => None,
        }
    }

    #[must_use]
    pub fn read(&self, reg: u32) -> u32 {
        self.window.write32(IOREGSEL, reg);
        self.window.read32(IOWIN)
    }

    pub fn write(&self, reg: u32, value: u32) {
        self.window.write32(IOREGSEL, reg);
        self.window.write32(IOWIN, value);
    }

    /// The APIC ID as programmed in the chip (bits 24..28 of register 0).
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn hardware_id(&self) -> u8 {
        ((self.read(REG_ID) >> 24) & 0x0F) as u8
    }

    const fn redirection_reg(pin: u32) -> u32 {
        REG_REDIRECTION + pin * 2
    }

    #[must_use]
    pub fn read_redirection(&self, pin: u32) -> RedirectionEntry {
        let reg = Self::redirection_reg(pin);
        RedirectionEntry::from_halves(self.read(reg), self.read(reg + 1))
    }

    /// Low word with the mask forced on, then the high word, then the low
    /// word as given; the pin never fires half-programmed.
    pub fn write_redirection(&self, pin: u32, entry: RedirectionEntry) {
        let reg = Self::redirection_reg(pin);
        self.write(reg, entry.with_masked(true).low());
        self.write(reg + 1, entry.high());
        self.write(reg, entry.low());
    }

    /// Masks every pin with vector 0.
    pub fn mask_all(&self) {
        let masked = RedirectionEntry::new().with_masked(true);
        for pin in 0..self.pin_count() {
            let reg = Self::redirection_reg(pin);
            self.write(reg, masked.low());
            self.write(reg + 1, 0);
        }
    }

    fn set_masked(&self, pin: u32, masked: bool) {
        let reg = Self::redirection_reg(pin);
        let low = RedirectionEntry::from_halves(self.read(reg), 0).with_masked(masked);
        self.write(reg, low.low());
    }
}

/// All I/O APICs in the system, searched linearly by GSI range.
pub struct IoApicSet<W: RegisterWindow> {
    apics: [Option<IoApic<W>>; MAX_IO_APICS],
    count: usize,
}

impl<W: RegisterWindow> Default for IoApicSet<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: RegisterWindow> IoApicSet<W> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            apics: [const { None }; MAX_IO_APICS],
            count: 0,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &IoApic<W>> {
        self.apics.iter().flatten()
    }

    /// Stores `apic`, masking every pin first.
    ///
    /// # Errors
    /// [`IoApicError::TooMany`] once [`MAX_IO_APICS`] are registered.
    pub fn add(&mut self, apic: IoApic<W>) -> Result<&IoApic<W>, IoApicError> {
        if self.count >= MAX_IO_APICS {
            return Err(IoApicError::TooMany);
        }
        apic.mask_all();
        info!(
            "IOAPIC: id {} GSI {}..={} masked",
            apic.id,
            apic.gsi_base,
            apic.gsi_base + u32::from(apic.max_redirection)
        );
        let index = self.count;
        self.count += 1;
        Ok(self.apics[index].insert(apic))
    }

    /// Registers every I/O APIC the MADT announces.
    ///
    /// `open` turns an entry into a register window (typically by mapping
    /// it); entries it rejects are skipped. Entries past the capacity are
    /// logged and skipped without being opened. Returns how many were added.
    pub fn discover(
        &mut self,
        entries: impl IntoIterator<Item = IoApicEntry>,
        mut open: impl FnMut(&IoApicEntry) -> Option<W>,
    ) -> usize {
        let before = self.count;
        for entry in entries {
            if self.count >= MAX_IO_APICS {
                warn!("too many I/O APICs (>{MAX_IO_APICS}), skipping id {}", entry.id);
                continue;
            }
            let Some(window) = open(&entry) else {
                warn!("IOAPIC: cannot open window at {:#x}", entry.address);
                continue;
            };
            if let Err(e) = self.add(IoApic::new(entry.id, entry.gsi_base, window)) {
                warn!("IOAPIC {}: {e}", entry.id);
            }
        }
        self.count - before
    }

    /// The I/O APIC routing `gsi` and the pin on it.
    #[must_use]
    pub fn for_gsi(&self, gsi: u32) -> Option<(&IoApic<W>, u32)> {
        self.iter()
            .find_map(|apic| apic.pin_for(gsi).map(|pin| (apic, pin)))
    }

    fn resolve(&self, gsi: u32) -> Result<(&IoApic<W>, u32), IoApicError> {
        self.for_gsi(gsi).ok_or(IoApicError::NoIoApicForGsi(gsi))
    }

    /// Routes `irq` to `vector` on the CPU with APIC ID `destination`.
    ///
    /// # Errors
    /// [`IoApicError::NoIoApicForGsi`] if no I/O APIC covers `irq`.
    pub fn set_irq(
        &self,
        irq: u32,
        vector: u8,
        level_triggered: bool,
        active_low: bool,
        delivery_mode: DeliveryMode,
        destination: u8,
    ) -> Result<(), IoApicError> {
        let (apic, pin) = self.resolve(irq)?;
        let entry = RedirectionEntry::new()
            .with_vector(vector)
            .with_delivery_mode(delivery_mode)
            .with_level_triggered(level_triggered)
            .with_active_low(active_low)
            .with_destination(destination);
        apic.write_redirection(pin, entry);
        Ok(())
    }

    /// # Errors
    /// [`IoApicError::NoIoApicForGsi`] if no I/O APIC covers `irq`.
    pub fn mask_irq(&self, irq: u32) -> Result<(), IoApicError> {
        let (apic, pin) = self.resolve(irq)?;
        apic.set_masked(pin, true);
        Ok(())
    }

    /// # Errors
    /// [`IoApicError::NoIoApicForGsi`] if no I/O APIC covers `irq`.
    pub fn unmask_irq(&self, irq: u32) -> Result<(), IoApicError> {
        let (apic, pin) = self.resolve(irq)?;
        apic.set_masked(pin, false);
        Ok(())
    }
}
