use crate::rsdp::{self, Rsdp};
use crate::{AcpiError, PhysMapRo, SdtHeader, TableBytes, sum};
use log::{debug, warn};

/// The XSDT of an ACPI 2.0+ system, ready to be searched.
pub struct AcpiTables<'m, M: PhysMapRo> {
    mapper: &'m M,
    rsdp: Rsdp,
    xsdt: SdtHeader,
}

impl<'m, M: PhysMapRo> AcpiTables<'m, M> {
    /// Follows the RSDP at `rsdp_phys` to the XSDT.
    ///
    /// # Safety
    /// `rsdp_phys` must point at an RSDP and the tables it references must be
    /// readable through `mapper`.
    ///
    /// # Errors
    /// See [`Rsdp::parse`]; additionally [`AcpiError::Truncated`] if the XSDT
    /// is shorter than its header.
    pub unsafe fn new(mapper: &'m M, rsdp_phys: u64) -> Result<Self, AcpiError> {
        let rsdp = Rsdp::parse(TableBytes::new(unsafe { mapper.map_ro(rsdp_phys, rsdp::SIZE) }))?;
        let xsdt = unsafe { Self::header_at(mapper, rsdp.xsdt_addr) }?;
        if (xsdt.length as usize) < SdtHeader::SIZE {
            return Err(AcpiError::Truncated {
                offset: SdtHeader::SIZE,
                len: xsdt.length as usize,
            });
        }
        debug!("ACPI: revision {}, XSDT {xsdt}", rsdp.revision);

        let this = Self { mapper, rsdp, xsdt };
        if sum(this.table_bytes(&xsdt).as_slice()) != 0 {
            warn!("ACPI: XSDT checksum mismatch");
        }
        Ok(this)
    }

    #[must_use]
    pub const fn rsdp(&self) -> &Rsdp {
        &self.rsdp
    }

    #[must_use]
    pub const fn xsdt(&self) -> &SdtHeader {
        &self.xsdt
    }

    /// Number of table pointers in the XSDT.
    #[must_use]
    pub const fn entry_count(&self) -> usize {
        (self.xsdt.length as usize - SdtHeader::SIZE) / 8
    }

    /// Headers of every table the XSDT points at, in order.
    pub fn headers(&self) -> impl Iterator<Item = SdtHeader> + '_ {
        let xsdt = self.table_bytes(&self.xsdt);
        (0..self.entry_count()).filter_map(move |i| {
            let phys = xsdt.u64(SdtHeader::SIZE + i * 8).ok()?;
            unsafe { Self::header_at(self.mapper, phys) }.ok()
        })
    }

    /// The first table whose signature equals `signature`.
    #[must_use]
    pub fn find_table(&self, signature: [u8; 4]) -> Option<SdtHeader> {
        self.headers().find(|h| h.signature == signature)
    }

    /// The whole table described by `header`.
    #[must_use]
    pub fn table_bytes(&self, header: &SdtHeader) -> TableBytes<'m> {
        TableBytes::new(unsafe { self.mapper.map_ro(header.phys, header.length as usize) })
    }

    unsafe fn header_at(mapper: &M, phys: u64) -> Result<SdtHeader, AcpiError> {
        SdtHeader::parse(phys, TableBytes::new(unsafe { mapper.map_ro(phys, SdtHeader::SIZE) }))
    }
}
