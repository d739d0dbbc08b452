//! # Multiple APIC Description Table
//!
//! After the common 36-byte header the MADT carries the local APIC address
//! (u32 at +36) and flags (u32 at +40); interrupt-controller entries follow
//! from offset 44 to the table's length. Each entry starts with a type byte
//! and a length byte that covers the whole entry.

use crate::{AcpiError, SdtHeader, TableBytes};
use log::warn;

pub const SIGNATURE: [u8; 4] = *b"APIC";

/// Offset of the first interrupt-controller entry.
pub const ENTRIES_OFFSET: usize = 44;

/// An I/O APIC announced by the MADT (entry type 1).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IoApicEntry {
    pub id: u8,
    /// Physical base of the register window.
    pub address: u32,
    /// First global system interrupt routed by this I/O APIC.
    pub gsi_base: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MadtEntry {
    /// Type 0.
    LocalApic { processor_id: u8, apic_id: u8, flags: u32 },
    /// Type 1.
    IoApic(IoApicEntry),
    /// Type 2. Parsed, but not applied to routing.
    InterruptSourceOverride {
        bus: u8,
        source: u8,
        gsi: u32,
        flags: u16,
    },
    /// Type 5.
    LocalApicAddressOverride { address: u64 },
    Other { kind: u8, len: u8 },
}

/// A parsed MADT.
#[derive(Copy, Clone, Debug)]
pub struct Madt<'a> {
    bytes: TableBytes<'a>,
    pub local_apic_address: u32,
    pub flags: u32,
}

impl<'a> Madt<'a> {
    /// # Errors
    /// * [`AcpiError::WrongTable`] if the signature is not `"APIC"`.
    /// * [`AcpiError::Truncated`] if the fixed prefix is incomplete.
    pub fn parse(bytes: TableBytes<'a>) -> Result<Self, AcpiError> {
        let header = SdtHeader::parse(0, bytes)?;
        if header.signature != SIGNATURE {
            return Err(AcpiError::WrongTable {
                expected: SIGNATURE,
            });
        }
        // Never trust more bytes than the header claims, nor more than were mapped.
        let len = (header.length as usize).min(bytes.len());
        let bytes = bytes.slice(0, len)?;
        Ok(Self {
            local_apic_address: bytes.u32(36)?,
            flags: bytes.u32(40)?,
            bytes,
        })
    }

    #[must_use]
    pub const fn entries(&self) -> MadtEntries<'a> {
        MadtEntries {
            bytes: self.bytes,
            offset: ENTRIES_OFFSET,
        }
    }

    pub fn io_apics(&self) -> impl Iterator<Item = IoApicEntry> + 'a {
        self.entries().filter_map(|e| match e {
            MadtEntry::IoApic(io) => Some(io),
            _ => None,
        })
    }
}

/// Walks the MADT's entry list. Stops at the end of the table, on an entry
/// shorter than its 2-byte prefix, or on one running past the end.
#[derive(Clone, Debug)]
pub struct MadtEntries<'a> {
    bytes: TableBytes<'a>,
    offset: usize,
}

impl Iterator for MadtEntries<'_> {
    type Item = MadtEntry;

    fn next(&mut self) -> Option<MadtEntry> {
        if self.offset + 2 > self.bytes.len() {
            return None;
        }
        let kind = self.bytes.u8(self.offset).ok()?;
        let len = self.bytes.u8(self.offset + 1).ok()?;
        let Ok(body) = self.bytes.slice(self.offset, usize::from(len)) else {
            warn!("MADT: entry at {} overruns the table", self.offset);
            self.offset = self.bytes.len();
            return None;
        };
        if len < 2 {
            warn!("MADT: zero-length entry at {}", self.offset);
            self.offset = self.bytes.len();
            return None;
        }
        self.offset += usize::from(len);

        let entry = match kind {
            0 => body.u32(4).ok().map(|flags| MadtEntry::LocalApic {
                processor_id: body.u8(2).unwrap_or_default(),
                apic_id: body.u8(3).unwrap_or_default(),
                flags,
            }),
            1 => Self::io_apic(body),
            2 => Self::source_override(body),
            5 => body
                .u64(4)
                .ok()
                .map(|address| MadtEntry::LocalApicAddressOverride { address }),
            _ => None,
        };
        Some(entry.unwrap_or(MadtEntry::Other { kind, len }))
    }
}

impl MadtEntries<'_> {
    fn io_apic(body: TableBytes<'_>) -> Option<MadtEntry> {
        Some(MadtEntry::IoApic(IoApicEntry {
            id: body.u8(2).ok()?,
            address: body.u32(4).ok()?,
            gsi_base: body.u32(8).ok()?,
        }))
    }

    fn source_override(body: TableBytes<'_>) -> Option<MadtEntry> {
        Some(MadtEntry::InterruptSourceOverride {
            bus: body.u8(2).ok()?,
            source: body.u8(3).ok()?,
            gsi: body.u32(4).ok()?,
            flags: body.u16(8).ok()?,
        })
    }
}
