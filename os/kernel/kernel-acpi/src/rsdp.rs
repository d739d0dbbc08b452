//! # Root System Description Pointer

use crate::{AcpiError, TableBytes, sum};
use log::warn;

pub const SIGNATURE: &[u8; 8] = b"RSD PTR ";

/// Size of the ACPI 2.0+ RSDP.
pub const SIZE: usize = 36;

/// The fields of an ACPI 2.0+ RSDP the kernel uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Rsdp {
    pub revision: u8,
    pub oem_id: [u8; 6],
    pub rsdt_addr: u32,
    pub xsdt_addr: u64,
}

impl Rsdp {
    /// Parses an RSDP, rejecting revisions below 2.
    ///
    /// Checksum mismatches are logged but not fatal; firmware in the wild
    /// gets them wrong and the XSDT address is still usable.
    ///
    /// # Errors
    /// * [`AcpiError::BadSignature`] if the signature is not `"RSD PTR "`.
    /// * [`AcpiError::UnsupportedRevision`] for ACPI 1.0 roots.
    /// * [`AcpiError::Truncated`] if fewer than [`SIZE`] bytes are given.
    pub fn parse(bytes: TableBytes<'_>) -> Result<Self, AcpiError> {
        if &bytes.array::<8>(0)? != SIGNATURE {
            return Err(AcpiError::BadSignature);
        }
        let revision = bytes.u8(15)?;
        if revision < 2 {
            return Err(AcpiError::UnsupportedRevision(revision));
        }

        let v1 = bytes.slice(0, 20)?;
        if sum(v1.as_slice()) != 0 {
            warn!("ACPI: RSDP checksum mismatch");
        }
        let length = bytes.u32(20)? as usize;
        if let Ok(full) = bytes.slice(0, length.max(SIZE))
            && sum(full.as_slice()) != 0
        {
            warn!("ACPI: RSDP extended checksum mismatch");
        }

        Ok(Self {
            revision,
            oem_id: bytes.array(9)?,
            rsdt_addr: bytes.u32(16)?,
            xsdt_addr: bytes.u64(24)?,
        })
    }
}
