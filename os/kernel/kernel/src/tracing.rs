//! # Kernel Tracing helpers

use kernel_info::boot::{KernelBootInfo, MemoryRegion};
use log::info;

/// The boot memory map as handed over by the loader.
///
/// # Safety
/// `boot_info.mmap` must describe a readable array of [`MemoryRegion`]s.
#[allow(clippy::cast_possible_truncation)]
pub unsafe fn memory_regions(boot_info: &KernelBootInfo) -> &'static [MemoryRegion] {
    let ptr = boot_info.mmap.regions_ptr as *const MemoryRegion;
    let len = boot_info.mmap.region_count as usize;
    if ptr.is_null() || len == 0 {
        return &[];
    }
    unsafe { core::slice::from_raw_parts(ptr, len) }
}

pub fn trace_boot_info(boot_info: &KernelBootInfo, regions: &[MemoryRegion]) {
    info!(
        concat!(
            "Boot Info in Kernel:\n",
            "  BI ptr    = {bi:#018x}\n",
            "  HHDM      = {hhdm:#018x}\n",
            "  RSDP      = {rsdp:#018x}\n",
            "  CPUs      = {cpus}\n",
            "  MMAP ptr  = {mmap_ptr:#018x}, entries = {mmap_len}"
        ),
        bi = core::ptr::from_ref(boot_info) as usize,
        hhdm = boot_info.hhdm_offset,
        rsdp = boot_info.rsdp_addr,
        cpus = boot_info.cpu_count,
        mmap_ptr = boot_info.mmap.regions_ptr,
        mmap_len = boot_info.mmap.region_count,
    );

    for region in regions {
        info!(
            "  [{:#018x} - {:#018x}) {:>10} KiB  {}",
            region.base,
            region.end(),
            region.length / 1024,
            region.kind
        );
    }
}
