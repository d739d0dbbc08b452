use crate::RegisterWindow;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::{
    AddressSpace, FrameAlloc, MapError, PageFlags, PhysMapper, invalidate_tlb_page,
};
use log::{debug, warn};

/// Volatile 32-bit accesses to a mapped register page.
#[derive(Debug)]
pub struct MmioWindow {
    base: VirtualAddress,
}

impl MmioWindow {
    /// # Safety
    /// `base` must map device registers uncached for as long as the window
    /// lives, and every offset used must stay inside that mapping.
    #[must_use]
    pub const unsafe fn new(base: VirtualAddress) -> Self {
        Self { base }
    }

    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }
}

impl RegisterWindow for MmioWindow {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        let ptr = (self.base + offset as u64).as_mut_ptr::<u32>();
        unsafe { ptr.read_volatile() }
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        let ptr = (self.base + offset as u64).as_mut_ptr::<u32>();
        unsafe { ptr.write_volatile(value) }
    }
}

/// Base of the uncached alias window for registers that sit inside a
/// cacheable large-page mapping of the direct map.
pub const UNCACHED_ALIAS_BASE: u64 = 0xFFFF_E000_0000_0000;

/// Maps the register page containing `phys` uncached and returns the virtual
/// address of `phys` itself.
///
/// The page normally goes to `phys + hhdm` with [`PageFlags::MMIO`]. If a
/// large page of the direct map already covers it, that mapping is reused
/// only when it is cache-disabled; otherwise the page is mapped at
/// `UNCACHED_ALIAS_BASE + phys` instead. The TLB entry of the new mapping is
/// flushed.
///
/// # Errors
/// [`MapError::OutOfMemory`] if a page table could not be allocated.
pub fn map_mmio<M: PhysMapper, A: FrameAlloc>(
    space: &mut AddressSpace<M>,
    alloc: &mut A,
    phys: PhysicalAddress,
    hhdm: u64,
) -> Result<VirtualAddress, MapError> {
    let uncached = PageFlags::PCD | PageFlags::PWT;
    let direct = VirtualAddress::new(phys.as_u64() + hhdm);

    let virt = match space.map(alloc, direct, phys, PageFlags::MMIO) {
        Ok(()) => direct,
        Err(MapError::HugePageConflict(_))
            if space.flags(direct).is_some_and(|f| f.contains(uncached)) =>
        {
            debug!("mmio: {direct} already mapped uncached by a large page");
            return Ok(direct);
        }
        Err(MapError::HugePageConflict(_)) => {
            let alias = VirtualAddress::new(UNCACHED_ALIAS_BASE + phys.as_u64());
            warn!("mmio: {direct} lies in a cacheable large page, using {alias}");
            space.map(alloc, alias, phys, PageFlags::MMIO)?;
            alias
        }
        Err(e) => return Err(e),
    };

    unsafe { invalidate_tlb_page(virt) };
    debug!("mmio: {phys} -> {virt}");
    Ok(virt)
}
