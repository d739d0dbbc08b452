use kernel_apic::{UNCACHED_ALIAS_BASE, map_mmio};
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress};
use kernel_vmem::{AddressSpace, FrameAlloc, PageFlags, PhysMapper};

#[repr(C, align(4096))]
struct Frame([u8; 4096]);

/// Page-table frames start at `BASE` and live in a heap buffer.
struct TestPhys {
    _mem: Vec<Frame>,
    ptr: *mut u8,
}

const BASE: u64 = 0x10_0000;
const HHDM: u64 = 0xFFFF_8000_0000_0000;

impl TestPhys {
    fn new(frames: usize) -> Self {
        let mut mem: Vec<Frame> = (0..frames).map(|_| Frame([0; 4096])).collect();
        let ptr = mem.as_mut_ptr().cast::<u8>();
        Self { _mem: mem, ptr }
    }
}

impl PhysMapper for TestPhys {
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        let offset = usize::try_from(pa.as_u64() - BASE).unwrap();
        VirtualAddress::from_ptr(unsafe { self.ptr.add(offset) })
    }
}

struct BumpAlloc {
    next: u64,
    end: u64,
}

impl FrameAlloc for BumpAlloc {
    fn alloc_4k(&mut self) -> Option<PhysicalFrame> {
        (self.next < self.end).then(|| {
            self.next += 1;
            PhysicalFrame::from_index(self.next - 1)
        })
    }
}

fn fresh(frames: u64) -> (AddressSpace<TestPhys>, BumpAlloc) {
    let mut alloc = BumpAlloc {
        next: BASE / 4096,
        end: BASE / 4096 + frames,
    };
    let space =
        AddressSpace::new(TestPhys::new(usize::try_from(frames).unwrap()), &mut alloc).unwrap();
    (space, alloc)
}

#[test]
fn maps_registers_uncached_in_the_direct_map() {
    let (mut space, mut alloc) = fresh(8);
    let phys = PhysicalAddress::new(0xFEC0_0000);

    let virt = map_mmio(&mut space, &mut alloc, phys, HHDM).unwrap();

    assert_eq!(virt.as_u64(), HHDM + 0xFEC0_0000);
    assert_eq!(space.translate(virt), Some(phys));
    let flags = space.flags(virt).unwrap();
    assert!(flags.contains(PageFlags::MMIO));
}

#[test]
fn keeps_offset_within_the_page() {
    let (mut space, mut alloc) = fresh(8);
    let phys = PhysicalAddress::new(0xFEE0_0020);

    let virt = map_mmio(&mut space, &mut alloc, phys, HHDM).unwrap();

    assert_eq!(virt.as_u64(), HHDM + 0xFEE0_0020);
    assert_eq!(space.translate(virt), Some(phys));
}

#[test]
fn reuses_an_uncached_huge_mapping() {
    let (mut space, mut alloc) = fresh(8);
    let phys = PhysicalAddress::new(0xFEE0_0000);
    let huge_virt = VirtualAddress::new(HHDM + 0xFEE0_0000);
    space
        .map_huge_2mb(&mut alloc, huge_virt, phys, PageFlags::MMIO)
        .unwrap();

    let virt = map_mmio(&mut space, &mut alloc, phys, HHDM).unwrap();

    assert_eq!(virt, huge_virt);
    assert!(space.flags(virt).unwrap().contains(PageFlags::PCD | PageFlags::PWT));
}

#[test]
fn cached_huge_mapping_gets_an_uncached_alias() {
    let (mut space, mut alloc) = fresh(8);
    let phys = PhysicalAddress::new(0xFEE0_0000);
    let huge_virt = VirtualAddress::new(HHDM + 0xFEE0_0000);
    space
        .map_huge_2mb(&mut alloc, huge_virt, phys, PageFlags::KERNEL_RW_NX)
        .unwrap();

    let virt = map_mmio(&mut space, &mut alloc, PhysicalAddress::new(0xFEE0_00B0), HHDM).unwrap();

    assert_eq!(virt.as_u64(), UNCACHED_ALIAS_BASE + 0xFEE0_00B0);
    assert_eq!(space.translate(virt), Some(PhysicalAddress::new(0xFEE0_00B0)));
    assert!(space.flags(virt).unwrap().contains(PageFlags::MMIO));
    // The loader's mapping is left alone.
    assert_eq!(space.flags(huge_virt), Some(PageFlags::KERNEL_RW_NX | PageFlags::HUGE));
}

#[test]
fn out_of_frames_is_an_error() {
    // Root only; no room for the PDPT.
    let (mut space, mut alloc) = fresh(1);
    assert!(map_mmio(&mut space, &mut alloc, PhysicalAddress::new(0xFEC0_0000), HHDM).is_err());
}
