//! # Bitmap Frame Allocator
//!
//! One bit per 4 KiB frame, `1` meaning used. The bitmap itself lives in the
//! first usable region large enough to hold it and is reached through the
//! [`PhysMapper`].
//!
//! ## Initialization
//!
//! 1. Count RAM frames (usable, bootloader- and ACPI-reclaimable) and usable
//!    frames, and find the highest RAM address.
//! 2. Size the bitmap to cover every frame below that address and place it.
//! 3. Mark everything used, then clear every usable frame.
//! 4. Re-reserve frame 0 and the frames holding the bitmap.
//!
//! If no usable region can hold the bitmap, the allocator stays
//! non-functional: it reports zero free frames and every allocation fails.
//!
//! ## Double free
//!
//! Freeing a frame that is already free leaves the counters alone and is
//! logged as a warning; the bitmap has no notion of ownership beyond that.

use kernel_info::boot::{MemoryRegion, MemoryRegionKind};
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{align_down, align_up};
use kernel_vmem::{FrameAlloc, PhysMapper, PhysicalAddress, PhysicalFrame};
use log::{debug, error, info, warn};

pub struct BitmapFrameAlloc<'m, M: PhysMapper> {
    mapper: M,
    bitmap: &'m mut [u8],
    /// Physical location of the bitmap, if it was placed in RAM.
    bitmap_phys: Option<PhysicalAddress>,
    /// Number of frames the bitmap covers.
    bitmap_frames: u64,
    total: u64,
    usable: u64,
    free: u64,
    used: u64,
    /// Usable frames init kept for itself (frame 0, the bitmap).
    reserved: u64,
}

/// Page-aligned `[start, end)` of a region, shrunk inwards.
const fn frame_span(region: &MemoryRegion) -> (u64, u64) {
    (align_up(region.base, PAGE_SIZE), align_down(region.end(), PAGE_SIZE))
}

const fn span_frames((start, end): (u64, u64)) -> u64 {
    if end > start { (end - start) / PAGE_SIZE } else { 0 }
}

impl<'m, M: PhysMapper> BitmapFrameAlloc<'m, M> {
    /// Builds the allocator from the boot memory map.
    ///
    /// # Safety
    /// `regions` must describe physical memory truthfully and every usable
    /// region must be reachable through `mapper`. Usable frames must not be in
    /// use by anyone else.
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn init(regions: &[MemoryRegion], mapper: M) -> Self {
        let mut max_addr = 0;
        let mut total = 0;
        let mut usable = 0;

        for region in regions {
            let span = frame_span(region);
            if region.kind.is_ram() {
                total += span_frames(span);
                max_addr = max_addr.max(span.1);
            }
            if region.kind == MemoryRegionKind::Usable {
                usable += span_frames(span);
            }
        }

        let bitmap_frames = align_up(max_addr, PAGE_SIZE) / PAGE_SIZE;
        let bitmap_bytes = bitmap_frames.div_ceil(8);
        let bitmap_size = align_up(bitmap_bytes, PAGE_SIZE);

        let placement = regions
            .iter()
            .filter(|r| r.kind == MemoryRegionKind::Usable)
            .map(|r| (align_up(r.base, PAGE_SIZE), r.end()))
            .find(|&(start, end)| end > start && end - start >= bitmap_size)
            .map(|(start, _)| PhysicalAddress::new(start));

        let Some(bitmap_phys) = placement else {
            error!("PMM: no usable region can hold a {bitmap_size} byte bitmap");
            return Self {
                mapper,
                bitmap: &mut [],
                bitmap_phys: None,
                bitmap_frames: 0,
                total,
                usable,
                free: 0,
                used: usable,
                reserved: usable,
            };
        };

        let bitmap = unsafe { mapper.phys_to_bytes_mut(bitmap_phys, bitmap_bytes as usize) };
        bitmap.fill(0xFF);

        let mut pmm = Self {
            mapper,
            bitmap,
            bitmap_phys: Some(bitmap_phys),
            bitmap_frames,
            total,
            usable,
            free: 0,
            used: usable,
            reserved: 0,
        };

        for region in regions.iter().filter(|r| r.kind == MemoryRegionKind::Usable) {
            let (start, end) = frame_span(region);
            for frame in (start / PAGE_SIZE)..(end.max(start) / PAGE_SIZE) {
                if frame < pmm.bitmap_frames && pmm.test(frame) {
                    pmm.clear(frame);
                    pmm.free += 1;
                    pmm.used -= 1;
                }
            }
        }

        // Frame 0 is never handed out, even if the map calls it usable.
        if pmm.bitmap_frames > 0 && !pmm.test(0) {
            pmm.set(0);
            if pmm.free > 0 {
                pmm.free -= 1;
                pmm.used += 1;
            }
        }

        let first = bitmap_phys.as_u64() / PAGE_SIZE;
        for frame in first..first + bitmap_size / PAGE_SIZE {
            if frame < pmm.bitmap_frames && !pmm.test(frame) {
                pmm.set(frame);
                pmm.free -= 1;
                pmm.used += 1;
            }
        }

        pmm.reserved = pmm.used;

        info!(
            "PMM: {bitmap_frames} frames tracked by a {bitmap_bytes} byte bitmap at {bitmap_phys}, {} free",
            pmm.free
        );
        pmm
    }

    /// Builds an allocator over caller-provided bitmap storage in which the
    /// first `frames` frames are free and usable.
    ///
    /// # Panics
    /// If `bitmap` is too small for `frames` bits.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_storage(bitmap: &'m mut [u8], frames: u64, mapper: M) -> Self {
        assert!(
            bitmap.len() as u64 * 8 >= frames,
            "bitmap of {} bytes cannot track {frames} frames",
            bitmap.len()
        );
        bitmap.fill(0xFF);
        let mut pmm = Self {
            mapper,
            bitmap,
            bitmap_phys: None,
            bitmap_frames: frames,
            total: frames,
            usable: frames,
            free: frames,
            used: 0,
            reserved: 0,
        };
        for frame in 0..frames {
            pmm.clear(frame);
        }
        pmm
    }

    /// Whether a bitmap was installed at all.
    #[inline]
    #[must_use]
    pub fn is_functional(&self) -> bool {
        !self.bitmap.is_empty()
    }

    /// Where the bitmap lives in physical memory, if it was placed by [`init`](Self::init).
    #[inline]
    #[must_use]
    pub const fn bitmap_location(&self) -> Option<PhysicalAddress> {
        self.bitmap_phys
    }

    #[inline]
    #[must_use]
    pub const fn total_frames(&self) -> u64 {
        self.total
    }

    #[inline]
    #[must_use]
    pub const fn usable_frames(&self) -> u64 {
        self.usable
    }

    #[inline]
    #[must_use]
    pub const fn free_frames(&self) -> u64 {
        self.free
    }

    #[inline]
    #[must_use]
    pub const fn used_frames(&self) -> u64 {
        self.used
    }

    /// Allocates a single frame.
    #[inline]
    pub fn alloc_one(&mut self) -> Option<PhysicalFrame> {
        self.alloc_run(1)
    }

    /// Allocates a single frame and fills it with zeros.
    pub fn alloc_zeroed(&mut self) -> Option<PhysicalFrame> {
        let frame = self.alloc_one()?;
        #[allow(clippy::cast_possible_truncation)]
        let bytes = unsafe { self.mapper.phys_to_bytes_mut(frame.base(), PAGE_SIZE as usize) };
        bytes.fill(0);
        Some(frame)
    }

    /// Allocates the lowest run of `count` contiguous free frames.
    ///
    /// Returns `None` if `count` is zero or no such run exists; nothing is
    /// marked in that case.
    pub fn alloc_run(&mut self, count: u64) -> Option<PhysicalFrame> {
        if count == 0 || self.free < count {
            return None;
        }

        let mut run_start = 0;
        let mut run_length = 0;
        for frame in 0..self.bitmap_frames {
            if self.test(frame) {
                run_length = 0;
                continue;
            }
            if run_length == 0 {
                run_start = frame;
            }
            run_length += 1;
            if run_length == count {
                self.mark_used(run_start, count);
                return Some(PhysicalFrame::from_index(run_start));
            }
        }
        None
    }

    /// Allocates `count` contiguous free frames whose base address is a
    /// multiple of `alignment` bytes.
    ///
    /// `alignment` must be a power of two and at least one page; otherwise
    /// `None` is returned.
    pub fn alloc_run_aligned(&mut self, count: u64, alignment: u64) -> Option<PhysicalFrame> {
        if count == 0 || self.free < count {
            return None;
        }
        if !alignment.is_power_of_two() || alignment < PAGE_SIZE {
            return None;
        }

        let step = alignment / PAGE_SIZE;
        let mut base = 0;
        while base + count <= self.bitmap_frames {
            match (base..base + count).rev().find(|&f| self.test(f)) {
                // Every aligned base up to `used` would include it.
                Some(used) => base = align_up(used + 1, step),
                None => {
                    self.mark_used(base, count);
                    return Some(PhysicalFrame::from_index(base));
                }
            }
        }
        None
    }

    /// Frees a single frame.
    #[inline]
    pub fn free_one(&mut self, frame: PhysicalFrame) {
        self.free_run(frame, 1);
    }

    /// Returns `count` frames starting at `base` to the pool.
    ///
    /// Frames past the end of the bitmap are ignored. Frames that are already
    /// free are skipped without touching the counters.
    ///
    /// Freeing RAM that was never handed out, such as bootloader-reclaimable
    /// memory, grows the usable pool instead of shrinking `used`.
    pub fn free_run(&mut self, base: PhysicalFrame, count: u64) {
        let mut already_free = 0;
        let mut reclaimed = 0;
        for frame in base.index()..base.index().saturating_add(count) {
            if frame >= self.bitmap_frames {
                break;
            }
            if !self.test(frame) {
                already_free += 1;
                continue;
            }
            self.clear(frame);
            self.free += 1;
            if self.used > self.reserved {
                self.used -= 1;
            } else {
                self.usable += 1;
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            debug!("PMM: reclaimed {reclaimed} frame(s) from {base}");
        }
        if already_free > 0 {
            warn!("PMM: {already_free} frame(s) from {base} were already free");
        }
    }

    fn mark_used(&mut self, start: u64, count: u64) {
        for frame in start..start + count {
            self.set(frame);
        }
        self.free -= count;
        self.used += count;
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn test(&self, frame: u64) -> bool {
        self.bitmap[(frame / 8) as usize] & (1 << (frame % 8)) != 0
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn set(&mut self, frame: u64) {
        self.bitmap[(frame / 8) as usize] |= 1 << (frame % 8);
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn clear(&mut self, frame: u64) {
        self.bitmap[(frame / 8) as usize] &= !(1 << (frame % 8));
    }
}

impl<M: PhysMapper> FrameAlloc for BitmapFrameAlloc<'_, M> {
    #[inline]
    fn alloc_4k(&mut self) -> Option<PhysicalFrame> {
        self.alloc_one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_vmem::VirtualAddress;

    #[repr(C, align(4096))]
    struct Frame([u8; 4096]);

    /// Physical memory `[0, frames * 4096)` backed by a heap buffer.
    struct TestPhys {
        _mem: Vec<Frame>,
        ptr: *mut u8,
    }

    impl TestPhys {
        fn new(frames: usize) -> Self {
            let mut mem: Vec<Frame> = (0..frames).map(|_| Frame([0xAA; 4096])).collect();
            let ptr = mem.as_mut_ptr().cast::<u8>();
            Self { _mem: mem, ptr }
        }
    }

    impl PhysMapper for TestPhys {
        fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
            VirtualAddress::from_ptr(unsafe { self.ptr.add(usize::try_from(pa.as_u64()).unwrap()) })
        }
    }

    fn usable(base: u64, length: u64) -> MemoryRegion {
        MemoryRegion::new(base, length, MemoryRegionKind::Usable)
    }

    #[test]
    fn init_counts_and_reserves() {
        let phys = TestPhys::new(64);
        let map = [
            MemoryRegion::new(0, 0x1000, MemoryRegionKind::Reserved),
            usable(0x1000, 31 * 0x1000),
            MemoryRegion::new(0x2_0000, 0x8000, MemoryRegionKind::BootloaderReclaimable),
            usable(0x2_8000, 0x1_8000),
        ];
        let pmm = unsafe { BitmapFrameAlloc::init(&map, &phys) };

        assert!(pmm.is_functional());
        assert_eq!(pmm.total_frames(), 31 + 8 + 24);
        assert_eq!(pmm.usable_frames(), 31 + 24);
        // Bitmap occupies frame 1, frame 0 was never usable.
        assert_eq!(pmm.bitmap_location(), Some(PhysicalAddress::new(0x1000)));
        assert_eq!(pmm.free_frames(), 31 + 24 - 1);
        assert_eq!(pmm.used_frames(), 1);
        assert_eq!(pmm.free_frames() + pmm.used_frames(), pmm.usable_frames());
    }

    #[test]
    fn reclaiming_bootloader_memory_grows_the_pool() {
        let phys = TestPhys::new(32);
        let map = [
            usable(0, 16 * 0x1000),
            MemoryRegion::new(0x2_0000, 8 * 0x1000, MemoryRegionKind::BootloaderReclaimable),
        ];
        let mut pmm = unsafe { BitmapFrameAlloc::init(&map, &phys) };
        assert_eq!((pmm.free_frames(), pmm.used_frames()), (15, 1));

        pmm.free_run(PhysicalFrame::from_index(0x20), 8);

        assert_eq!(pmm.free_frames(), 23);
        assert_eq!(pmm.used_frames(), 1);
        assert_eq!(pmm.usable_frames(), 24);
        assert_eq!(pmm.free_frames() + pmm.used_frames(), pmm.usable_frames());
    }

    #[test]
    fn reclaim_after_allocations_keeps_counters_consistent() {
        let phys = TestPhys::new(32);
        let map = [
            usable(0, 16 * 0x1000),
            MemoryRegion::new(0x2_0000, 8 * 0x1000, MemoryRegionKind::BootloaderReclaimable),
        ];
        let mut pmm = unsafe { BitmapFrameAlloc::init(&map, &phys) };
        let run = pmm.alloc_run(2).unwrap();

        pmm.free_run(PhysicalFrame::from_index(0x20), 8);
        pmm.free_run(run, 2);

        assert_eq!(pmm.free_frames(), 23);
        assert_eq!(pmm.free_frames() + pmm.used_frames(), pmm.usable_frames());
        assert!(pmm.used_frames() <= 1);
    }

    #[test]
    fn frame_zero_is_reserved_even_if_usable() {
        let phys = TestPhys::new(16);
        let map = [usable(0, 16 * 0x1000)];
        let mut pmm = unsafe { BitmapFrameAlloc::init(&map, &phys) };

        // frame 0 reserved, bitmap in frame 0 too (placed at region start).
        assert_eq!(pmm.bitmap_location(), Some(PhysicalAddress::new(0)));
        assert_eq!(pmm.free_frames(), 15);
        let first = pmm.alloc_one().unwrap();
        assert_eq!(first.index(), 1);
    }

    #[test]
    fn unaligned_regions_are_shrunk() {
        let phys = TestPhys::new(16);
        let map = [usable(0x1800, 0x4000)];
        let pmm = unsafe { BitmapFrameAlloc::init(&map, &phys) };
        // [0x2000, 0x5000) holds three whole frames.
        assert_eq!(pmm.usable_frames(), 3);
        // the bitmap takes 0x2000
        assert_eq!(pmm.free_frames(), 2);
    }

    #[test]
    fn no_room_for_bitmap_leaves_allocator_empty() {
        let phys = TestPhys::new(1);
        // 64 GiB of reclaimable RAM needs a 2 MiB bitmap; the usable gap is tiny.
        let map = [
            usable(0x1000, 0x1000),
            MemoryRegion::new(0x10_0000, 64 << 30, MemoryRegionKind::AcpiReclaimable),
        ];
        let mut pmm = unsafe { BitmapFrameAlloc::init(&map, &phys) };

        assert!(!pmm.is_functional());
        assert_eq!(pmm.free_frames(), 0);
        assert_eq!(pmm.used_frames(), pmm.usable_frames());
        assert_eq!(pmm.alloc_one(), None);
    }

    #[test]
    fn alloc_run_is_first_fit_and_never_partial() {
        let phys = TestPhys::new(1);
        let mut storage = [0u8; 2];
        let mut pmm = BitmapFrameAlloc::from_storage(&mut storage, 16, &phys);

        let a = pmm.alloc_run(3).unwrap();
        let b = pmm.alloc_run(3).unwrap();
        assert_eq!((a.index(), b.index()), (0, 3));

        pmm.free_run(a, 3);
        // a hole of 3 at 0, then 10 free at 6
        assert_eq!(pmm.alloc_run(4).unwrap().index(), 6);
        assert_eq!(pmm.alloc_run(7), None);
        assert_eq!(pmm.free_frames(), 16 - 3 - 4);
    }

    #[test]
    fn zero_sized_requests_fail() {
        let phys = TestPhys::new(1);
        let mut storage = [0u8; 1];
        let mut pmm = BitmapFrameAlloc::from_storage(&mut storage, 8, &phys);
        assert_eq!(pmm.alloc_run(0), None);
        assert_eq!(pmm.alloc_run_aligned(0, 4096), None);
        assert_eq!(pmm.free_frames(), 8);
    }

    #[test]
    fn aligned_rejects_bad_alignment() {
        let phys = TestPhys::new(1);
        let mut storage = [0u8; 4];
        let mut pmm = BitmapFrameAlloc::from_storage(&mut storage, 32, &phys);
        assert_eq!(pmm.alloc_run_aligned(1, 3 * 4096), None);
        assert_eq!(pmm.alloc_run_aligned(1, 2048), None);
    }

    #[test]
    fn aligned_skips_past_used_frames() {
        let phys = TestPhys::new(1);
        let mut storage = [0u8; 4];
        let mut pmm = BitmapFrameAlloc::from_storage(&mut storage, 32, &phys);

        // occupy frame 1, which blocks the aligned base 0 for a run of 4
        let _ = pmm.alloc_run(2).unwrap();
        let r = pmm.alloc_run_aligned(4, 4 * 4096).unwrap();
        assert_eq!(r.index(), 4);
    }

    #[test]
    fn double_free_keeps_counters() {
        let phys = TestPhys::new(1);
        let mut storage = [0u8; 1];
        let mut pmm = BitmapFrameAlloc::from_storage(&mut storage, 8, &phys);

        let f = pmm.alloc_one().unwrap();
        pmm.free_one(f);
        pmm.free_one(f);
        assert_eq!(pmm.free_frames(), 8);
        assert_eq!(pmm.used_frames(), 0);
    }

    #[test]
    fn free_past_bitmap_is_ignored() {
        let phys = TestPhys::new(1);
        let mut storage = [0u8; 1];
        let mut pmm = BitmapFrameAlloc::from_storage(&mut storage, 8, &phys);

        let f = pmm.alloc_run(2).unwrap();
        pmm.free_run(PhysicalFrame::from_index(7), 100);
        pmm.free_run(f, 2);
        assert_eq!(pmm.free_frames(), 8);
    }

    #[test]
    fn alloc_zeroed_clears_the_frame() {
        let phys = TestPhys::new(4);
        let mut storage = [0u8; 1];
        let mut pmm = BitmapFrameAlloc::from_storage(&mut storage, 4, &phys);

        let f = pmm.alloc_zeroed().unwrap();
        let bytes = unsafe { phys.phys_to_bytes_mut(f.base(), 4096) };
        assert!(bytes.iter().all(|&b| b == 0));
    }
}
