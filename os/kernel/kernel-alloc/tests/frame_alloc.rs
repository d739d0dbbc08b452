use kernel_alloc::{BitmapFrameAlloc, HhdmPhysMapper, MemoryOverview};
use std::collections::HashSet;

const FRAMES: u64 = 1000;

/// The mapper is never dereferenced unless zeroed frames are requested.
fn pmm(storage: &mut [u8]) -> BitmapFrameAlloc<'_, HhdmPhysMapper> {
    BitmapFrameAlloc::from_storage(storage, FRAMES, HhdmPhysMapper::new(0))
}

#[test]
fn three_single_frames_round_trip() {
    let mut storage = [0u8; 125];
    let mut pmm = pmm(&mut storage);
    assert_eq!(pmm.free_frames(), 1000);

    let frames: Vec<_> = (0..3).map(|_| pmm.alloc_one().unwrap()).collect();
    let distinct: HashSet<_> = frames.iter().map(|f| f.index()).collect();
    assert_eq!(distinct.len(), 3);
    assert_eq!(pmm.free_frames(), 997);

    for f in frames {
        pmm.free_one(f);
    }
    assert_eq!(pmm.free_frames(), 1000);
    assert_eq!(pmm.used_frames(), 0);
}

#[test]
fn freed_run_is_reused_first() {
    let mut storage = [0u8; 125];
    let mut pmm = pmm(&mut storage);
    let _pinned = pmm.alloc_run(5).unwrap();

    let first = pmm.alloc_run(8).unwrap();
    pmm.free_run(first, 8);
    let second = pmm.alloc_run(8).unwrap();
    assert_eq!(first, second);
}

#[test]
fn aligned_run_honours_alignment() {
    let mut storage = [0u8; 125];
    let mut pmm = pmm(&mut storage);
    // disturb the low frames so alignment actually matters
    let _ = pmm.alloc_run(3).unwrap();

    let run = pmm.alloc_run_aligned(4, 16384).unwrap();
    assert_eq!(run.base().as_u64() % 16384, 0);
    assert_eq!(run.index(), 4);
}

#[test]
fn runs_never_overlap_without_free() {
    let mut storage = [0u8; 125];
    let mut pmm = pmm(&mut storage);

    let mut owned = HashSet::new();
    for (n, align) in [(1, 4096), (7, 4096), (4, 16384), (16, 65536), (3, 4096), (2, 8192)] {
        let base = if align == 4096 {
            pmm.alloc_run(n)
        } else {
            pmm.alloc_run_aligned(n, align)
        }
        .unwrap();
        assert_eq!(base.base().as_u64() % align, 0);
        for i in 0..n {
            assert!(owned.insert(base.index() + i), "frame handed out twice");
        }
    }
    assert_eq!(pmm.free_frames(), FRAMES - owned.len() as u64);
}

#[test]
fn net_zero_sequences_do_not_leak() {
    let mut storage = [0u8; 125];
    let mut pmm = pmm(&mut storage);
    let before = pmm.free_frames();

    let a = pmm.alloc_run(10).unwrap();
    let b = pmm.alloc_one().unwrap();
    let c = pmm.alloc_run_aligned(8, 32768).unwrap();
    pmm.free_one(b);
    let d = pmm.alloc_run(2).unwrap();
    pmm.free_run(a, 10);
    pmm.free_run(c, 8);
    pmm.free_run(d, 2);

    assert_eq!(pmm.free_frames(), before);
}

#[test]
fn exhaustion_is_none() {
    let mut storage = [0u8; 125];
    let mut pmm = pmm(&mut storage);
    assert!(pmm.alloc_run(FRAMES).is_some());
    assert_eq!(pmm.alloc_one(), None);
    assert_eq!(pmm.alloc_run_aligned(1, 4096), None);
}

#[test]
fn overview_snapshot() {
    let mut storage = [0u8; 125];
    let mut pmm = pmm(&mut storage);
    let _ = pmm.alloc_run(10).unwrap();

    let o = MemoryOverview::from(&pmm);
    assert_eq!((o.total, o.usable, o.used, o.free), (1000, 1000, 10, 990));
}
