use crate::BitmapFrameAlloc;
use core::fmt;
use kernel_info::memory::PAGE_SIZE;
use kernel_vmem::PhysMapper;

/// Point-in-time frame counters for display.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MemoryOverview {
    pub total: u64,
    pub usable: u64,
    pub used: u64,
    pub free: u64,
}

impl MemoryOverview {
    /// Converts a frame count to whole MiB.
    #[must_use]
    pub const fn mib(frames: u64) -> u64 {
        frames * PAGE_SIZE / 1024 / 1024
    }
}

impl<M: PhysMapper> From<&BitmapFrameAlloc<'_, M>> for MemoryOverview {
    fn from(pmm: &BitmapFrameAlloc<'_, M>) -> Self {
        Self {
            total: pmm.total_frames(),
            usable: pmm.usable_frames(),
            used: pmm.used_frames(),
            free: pmm.free_frames(),
        }
    }
}

impl fmt::Display for MemoryOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total {} MiB ({} pages), usable {} MiB ({} pages), used {} MiB ({} pages), free {} MiB ({} pages)",
            Self::mib(self.total),
            self.total,
            Self::mib(self.usable),
            self.usable,
            Self::mib(self.used),
            self.used,
            Self::mib(self.free),
            self.free,
        )
    }
}
