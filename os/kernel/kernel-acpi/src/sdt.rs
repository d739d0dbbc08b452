use crate::{AcpiError, TableBytes};
use core::fmt;

/// The 36-byte header shared by every system description table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SdtHeader {
    /// Physical address of the table.
    pub phys: u64,
    pub signature: [u8; 4],
    /// Length of the whole table, header included.
    pub length: u32,
    pub revision: u8,
    pub checksum: u8,
    pub oem_id: [u8; 6],
    pub oem_table_id: [u8; 8],
}

impl SdtHeader {
    pub const SIZE: usize = 36;

    /// # Errors
    /// [`AcpiError::Truncated`] if fewer than [`SIZE`](Self::SIZE) bytes are given.
    pub fn parse(phys: u64, bytes: TableBytes<'_>) -> Result<Self, AcpiError> {
        if bytes.len() < Self::SIZE {
            return Err(AcpiError::Truncated {
                offset: Self::SIZE,
                len: bytes.len(),
            });
        }
        Ok(Self {
            phys,
            signature: bytes.array(0)?,
            length: bytes.u32(4)?,
            revision: bytes.u8(8)?,
            checksum: bytes.u8(9)?,
            oem_id: bytes.array(10)?,
            oem_table_id: bytes.array(16)?,
        })
    }

    /// The signature as text, if it is ASCII.
    #[must_use]
    pub fn signature_str(&self) -> &str {
        core::str::from_utf8(&self.signature).unwrap_or("????")
    }
}

impl fmt::Display for SdtHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {:#x} ({} bytes, rev {})",
            self.signature_str(),
            self.phys,
            self.length,
            self.revision
        )
    }
}
