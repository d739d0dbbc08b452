//! # Boot self-tests
//!
//! Smoke tests against the live frame allocator and page tables. A failure
//! is logged and boot continues.

use crate::context::Kernel;
use kernel_alloc::HhdmPhysMapper;
use kernel_info::memory::PAGE_SIZE;
use kernel_vmem::{PageFlags, PhysMapper, VirtualAddress};
use log::{error, info};

/// Scratch address for the mapping test, outside the direct map and the image.
const VMM_TEST_ADDRESS: VirtualAddress = VirtualAddress::new(0xFFFF_9000_0000_0000);
const VMM_TEST_PATTERN: u64 = 0xDEAD_BEEF_CAFE_BABE;

pub fn run_pmm_tests(kernel: &Kernel) {
    if pmm_tests(kernel) {
        info!("PMM tests: OK");
    } else {
        error!("PMM tests: FAILED");
    }
}

pub fn run_vmm_tests(kernel: &Kernel) {
    if vmm_tests(kernel) {
        info!("VMM tests: OK");
    } else {
        error!("VMM tests: FAILED");
    }
}

fn pmm_tests(kernel: &Kernel) -> bool {
    let mut pmm = kernel.pmm.lock_irq();

    let Some(one) = pmm.alloc_one() else {
        return false;
    };
    pmm.free_one(one);

    let Some(run) = pmm.alloc_run(4) else {
        return false;
    };
    pmm.free_run(run, 4);

    let Some(aligned) = pmm.alloc_run_aligned(4, 4 * PAGE_SIZE) else {
        return false;
    };
    pmm.free_run(aligned, 4);
    if !aligned.base().as_u64().is_multiple_of(4 * PAGE_SIZE) {
        return false;
    }

    let Some(zeroed) = pmm.alloc_zeroed() else {
        return false;
    };
    let mapper = HhdmPhysMapper::new(kernel.hhdm_offset);
    let first = unsafe { *mapper.phys_to_mut::<u64>(zeroed.base()) };
    pmm.free_one(zeroed);
    first == 0
}

fn vmm_tests(kernel: &Kernel) -> bool {
    let Some(frame) = kernel.pmm.lock_irq().alloc_one() else {
        return false;
    };

    let mapped = {
        let mut pmm = kernel.pmm.lock_irq();
        kernel
            .vmm
            .lock_irq()
            .map(&mut *pmm, VMM_TEST_ADDRESS, frame.base(), PageFlags::KERNEL_RW_NX)
    };
    if let Err(e) = mapped {
        error!("VMM test: cannot map {VMM_TEST_ADDRESS}: {e}");
        kernel.pmm.lock_irq().free_one(frame);
        return false;
    }

    let ptr = VMM_TEST_ADDRESS.as_mut_ptr::<u64>();
    let readback = unsafe {
        ptr.write_volatile(VMM_TEST_PATTERN);
        ptr.read_volatile()
    };

    let unmapped = kernel.unmap_page(VMM_TEST_ADDRESS);
    kernel.pmm.lock_irq().free_one(frame);
    readback == VMM_TEST_PATTERN && unmapped
}
