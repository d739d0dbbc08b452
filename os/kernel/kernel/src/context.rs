//! # Kernel context
//!
//! Everything the kernel owns after early init, published once through a
//! [`SyncOnceCell`]. Interrupt handlers only read from it; the memory
//! managers are behind [`SpinLock`]s that are taken with
//! [`lock_irq`](SpinLock::lock_irq).

use kernel_alloc::{BitmapFrameAlloc, HhdmPhysMapper};
use kernel_apic::{IoApicSet, LocalApic, MmioWindow, Ticks};
use kernel_sync::{SpinLock, SyncOnceCell};
use kernel_vmem::{AddressSpace, VirtualAddress, invalidate_tlb_page};

pub type Pmm = BitmapFrameAlloc<'static, HhdmPhysMapper>;
pub type Vmm = AddressSpace<HhdmPhysMapper>;

pub struct Kernel {
    pub hhdm_offset: u64,
    pub pmm: SpinLock<Pmm>,
    pub vmm: SpinLock<Vmm>,
    pub lapic: LocalApic<MmioWindow>,
    pub io_apics: IoApicSet<MmioWindow>,
}

static KERNEL: SyncOnceCell<Kernel> = SyncOnceCell::new();

/// Timer ticks since the LAPIC timer was armed.
pub static TICKS: Ticks = Ticks::new();

impl Kernel {
    /// Publishes the context. Boot calls this exactly once.
    pub fn install(self) -> &'static Self {
        match KERNEL.set(self) {
            Ok(kernel) => kernel,
            Err(_) => panic!("kernel context installed twice"),
        }
    }

    #[inline]
    pub fn get() -> Option<&'static Self> {
        KERNEL.get()
    }

    /// Removes the 4 KiB mapping at `virt` and flushes it from this CPU's TLB.
    pub fn unmap_page(&self, virt: VirtualAddress) -> bool {
        let removed = self.vmm.lock_irq().unmap(virt);
        if removed {
            unsafe { invalidate_tlb_page(virt) };
        }
        removed
    }
}
