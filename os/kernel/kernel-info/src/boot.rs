//! # Kernel Boot Information

use core::fmt;

/// Kernel function pointer.
pub type KernelEntryFn = extern "sysv64" fn(*const KernelBootInfo) -> !;

/// Information the kernel needs from the loader.
/// Keep this `#[repr(C)]` and stick to fixed-size integers at the ABI boundary.
#[repr(C)]
#[derive(Clone)]
pub struct KernelBootInfo {
    /// Physical memory map.
    pub mmap: MemoryMapInfo,

    /// Offset of the higher-half direct map: `virt = phys + hhdm_offset`.
    pub hhdm_offset: u64,

    /// RSDP physical address, or 0 if not provided.
    pub rsdp_addr: u64,

    /// Number of processors reported by the loader. Only the bootstrap
    /// processor is brought up.
    pub cpu_count: u32,
}

#[repr(C)]
#[derive(Clone)]
pub struct MemoryMapInfo {
    /// Address of the first [`MemoryRegion`], in the loader's identity or direct map.
    pub regions_ptr: u64,

    /// Number of [`MemoryRegion`] records.
    pub region_count: u64,
}

/// One entry of the boot memory map.
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    pub base: u64,
    pub length: u64,
    pub kind: MemoryRegionKind,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: MemoryRegionKind) -> Self {
        Self { base, length, kind }
    }

    /// Exclusive end address.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }
}

/// Memory region type, numbered like the Limine protocol.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemoryRegionKind {
    Usable = 0,
    Reserved = 1,
    AcpiReclaimable = 2,
    AcpiNvs = 3,
    BadMemory = 4,
    BootloaderReclaimable = 5,
    KernelAndModules = 6,
    Framebuffer = 7,
}

impl MemoryRegionKind {
    /// Whether the region is RAM the kernel may eventually own.
    ///
    /// Reclaimable regions count towards total RAM but are not handed to the
    /// frame allocator until they are explicitly reclaimed.
    #[must_use]
    pub const fn is_ram(self) -> bool {
        matches!(
            self,
            Self::Usable | Self::BootloaderReclaimable | Self::AcpiReclaimable
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usable => "usable",
            Self::Reserved => "reserved",
            Self::AcpiReclaimable => "ACPI reclaimable",
            Self::AcpiNvs => "ACPI NVS",
            Self::BadMemory => "bad memory",
            Self::BootloaderReclaimable => "bootloader reclaimable",
            Self::KernelAndModules => "kernel and modules",
            Self::Framebuffer => "framebuffer",
        }
    }
}

impl fmt::Display for MemoryRegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
