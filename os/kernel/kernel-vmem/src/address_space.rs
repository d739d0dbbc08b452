//! # Address Space
//!
//! An [`AddressSpace`] owns the walk over one PML4 tree. It does not own
//! physical memory: intermediate tables are taken from the caller's
//! [`FrameAlloc`] and leaf frames stay the caller's responsibility.
//!
//! ## Operations
//!
//! | Operation | Granularity | Failure |
//! |-----------|-------------|---------|
//! | [`map`](AddressSpace::map) | 4 KiB | [`MapError`] |
//! | [`map_huge_2mb`](AddressSpace::map_huge_2mb) | 2 MiB | [`MapError`] |
//! | [`map_range`](AddressSpace::map_range) | n × 4 KiB, all-or-nothing | [`MapError`] |
//! | [`unmap`](AddressSpace::unmap) / [`unmap_huge_2mb`](AddressSpace::unmap_huge_2mb) | 4 KiB / 2 MiB | `false` if absent |
//! | [`get_physical`](AddressSpace::get_physical) / [`get_flags`](AddressSpace::get_flags) | any | [`NOT_MAPPED`] |
//!
//! TLB maintenance is left to the caller; the kernel wraps unmapping with
//! [`invalidate_tlb_page`](crate::invalidate_tlb_page).

use crate::{FrameAlloc, PageEntryBits, PageFlags, PageTable, PhysMapper};
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size2M, Size4K, VirtualAddress};
use log::debug;

/// Returned by [`AddressSpace::get_physical`] and [`AddressSpace::get_flags`]
/// for addresses without a mapping. No physical address or flag set uses all
/// 64 bits.
pub const NOT_MAPPED: u64 = u64::MAX;

const LEVEL_NAMES: [&str; 4] = ["PML4", "PDPT", "PD", "PT"];

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("out of physical memory while allocating a page table")]
    OutOfMemory,
    #[error("address {0:#x} is not aligned to the page size")]
    Misaligned(u64),
    #[error("{0} is covered by a 2 MiB mapping")]
    HugePageConflict(VirtualAddress),
}

/// A four-level page-table tree rooted at one PML4 frame.
pub struct AddressSpace<M: PhysMapper> {
    root: PhysicalAddress,
    mapper: M,
}

impl<M: PhysMapper> AddressSpace<M> {
    /// Adopts an existing tree, e.g. the loader's PML4 from `CR3`.
    ///
    /// # Safety
    /// `root` must be a valid PML4 reachable through `mapper`, and no other
    /// code may mutate the tree while this value exists.
    pub const unsafe fn from_root(root: PhysicalAddress, mapper: M) -> Self {
        Self { root, mapper }
    }

    /// Creates an empty address space with a freshly zeroed PML4.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] if the root frame cannot be allocated.
    pub fn new<A: FrameAlloc>(mapper: M, alloc: &mut A) -> Result<Self, MapError> {
        let root = alloc.alloc_4k().ok_or(MapError::OutOfMemory)?.base();
        unsafe { mapper.phys_to_mut::<PageTable>(root) }.zero();
        Ok(Self { root, mapper })
    }

    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalAddress {
        self.root
    }

    #[inline]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Maps the 4 KiB page at `virt` to `phys`, replacing any previous mapping.
    ///
    /// Missing tables on the way are allocated and zeroed before linking.
    /// `PRESENT` is implied.
    ///
    /// # Errors
    /// * [`MapError::OutOfMemory`] if a table could not be allocated.
    /// * [`MapError::HugePageConflict`] if a 2 MiB page already covers `virt`.
    pub fn map<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        flags: PageFlags,
    ) -> Result<(), MapError> {
        let pt = self.leaf_table_or_create(alloc, virt, flags.contains(PageFlags::USER))?;
        self.write_leaf(pt, virt, phys, flags);
        Ok(())
    }

    /// Maps a 2 MiB page at `virt` to `phys` with a PD-level `PS` entry.
    ///
    /// # Errors
    /// * [`MapError::Misaligned`] unless both addresses are 2 MiB aligned.
    /// * [`MapError::OutOfMemory`] if a table could not be allocated.
    pub fn map_huge_2mb<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        flags: PageFlags,
    ) -> Result<(), MapError> {
        if !virt.is_aligned::<Size2M>() {
            return Err(MapError::Misaligned(virt.as_u64()));
        }
        if !phys.is_aligned::<Size2M>() {
            return Err(MapError::Misaligned(phys.as_u64()));
        }

        let [l4, l3, l2, _] = virt.table_indices();
        let user = flags.contains(PageFlags::USER);

        let pdpt = self.next_table_or_create(alloc, self.root, l4, user, virt)?;
        let pd = self.next_table_or_create(alloc, pdpt, l3, user, virt)?;

        // A PT previously linked here becomes unreachable and is not freed.
        let table = unsafe { self.table_mut(pd) };
        table[l2] = PageEntryBits::from_parts(
            phys,
            flags.union(PageFlags::PRESENT).union(PageFlags::HUGE),
        );
        Ok(())
    }

    /// Maps `page_count` consecutive 4 KiB pages.
    ///
    /// All-or-nothing: every page table the range needs is created first,
    /// and leaves are written only once nothing can fail. On error no
    /// translation has changed; tables created on the way stay linked, empty.
    ///
    /// # Errors
    /// The first error returned while preparing the tables.
    pub fn map_range<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        page_count: usize,
        flags: PageFlags,
    ) -> Result<(), MapError> {
        let user = flags.contains(PageFlags::USER);
        let pages = 0..page_count as u64;

        for i in pages.clone() {
            let page = virt + i * Size4K::SIZE;
            // One walk per page table is enough.
            if i == 0 || page.offset::<Size2M>() == 0 {
                self.leaf_table_or_create(alloc, page, user)
                    .inspect_err(|e| debug!("map_range: {e} at {page}, nothing mapped"))?;
            }
        }

        for i in pages {
            let offset = i * Size4K::SIZE;
            let pt = self.leaf_table_or_create(alloc, virt + offset, user)?;
            self.write_leaf(pt, virt + offset, phys + offset, flags);
        }
        Ok(())
    }

    /// Clears the 4 KiB mapping at `virt`.
    ///
    /// Returns `false` if there was none (including when a 2 MiB page covers
    /// `virt`). Neither the leaf frame nor emptied tables are freed.
    pub fn unmap(&mut self, virt: VirtualAddress) -> bool {
        let [_, _, _, l1] = virt.table_indices();
        let Some(pt) = self.table_at(virt, 3) else {
            return false;
        };
        let table = unsafe { self.table_mut(pt) };
        if !table[l1].present() {
            return false;
        }
        table[l1] = PageEntryBits::new();
        true
    }

    /// Clears the 2 MiB mapping at `virt`; `false` if `virt` is not mapped by
    /// a huge page.
    pub fn unmap_huge_2mb(&mut self, virt: VirtualAddress) -> bool {
        let [_, _, l2, _] = virt.table_indices();
        let Some(pd) = self.table_at(virt, 2) else {
            return false;
        };
        let table = unsafe { self.table_mut(pd) };
        let entry = table[l2];
        if !(entry.present() && entry.large_page()) {
            return false;
        }
        table[l2] = PageEntryBits::new();
        true
    }

    /// Unmaps `page_count` consecutive 4 KiB pages and returns how many of
    /// them were actually mapped.
    pub fn unmap_range(&mut self, virt: VirtualAddress, page_count: usize) -> usize {
        (0..page_count as u64)
            .filter(|i| self.unmap(virt + i * Size4K::SIZE))
            .count()
    }

    /// Translates `virt`, including the in-page offset, honoring 2 MiB leaves.
    #[must_use]
    pub fn translate(&self, virt: VirtualAddress) -> Option<PhysicalAddress> {
        let (leaf, huge) = self.leaf(virt)?;
        let offset = if huge {
            virt.offset::<Size2M>()
        } else {
            virt.offset::<Size4K>()
        };
        Some(leaf.physical_address() + offset)
    }

    /// The control bits of the leaf entry mapping `virt`.
    #[must_use]
    pub fn flags(&self, virt: VirtualAddress) -> Option<PageFlags> {
        self.leaf(virt).map(|(leaf, _)| leaf.flags())
    }

    /// [`translate`](Self::translate) with [`NOT_MAPPED`] for absent mappings.
    #[must_use]
    pub fn get_physical(&self, virt: VirtualAddress) -> u64 {
        self.translate(virt).map_or(NOT_MAPPED, PhysicalAddress::as_u64)
    }

    /// [`flags`](Self::flags) with [`NOT_MAPPED`] for absent mappings.
    #[must_use]
    pub fn get_flags(&self, virt: VirtualAddress) -> u64 {
        self.flags(virt).map_or(NOT_MAPPED, |f| f.bits())
    }

    /// Logs every entry on the walk to `virt` at `debug` level.
    pub fn dump_entry(&self, virt: VirtualAddress) {
        let indices = virt.table_indices();
        let mut table = self.root;
        debug!("page walk for {virt} (root {table})");
        for (level, (&index, name)) in indices.iter().zip(LEVEL_NAMES).enumerate() {
            let entry = unsafe { self.table_ref(table) }[index];
            debug!(
                "  {name}[{index:3}] = {:#018x} -> {} {:?}",
                entry.into_bits(),
                entry.physical_address(),
                entry.flags()
            );
            if !entry.present() {
                debug!("  not present at {name}");
                return;
            }
            if entry.large_page() && level > 0 {
                debug!("  huge leaf at {name}");
                return;
            }
            table = entry.physical_address();
        }
    }

    /// The PT on the walk to `virt`, creating missing tables.
    fn leaf_table_or_create<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        virt: VirtualAddress,
        user: bool,
    ) -> Result<PhysicalAddress, MapError> {
        let [l4, l3, l2, _] = virt.table_indices();
        let pdpt = self.next_table_or_create(alloc, self.root, l4, user, virt)?;
        let pd = self.next_table_or_create(alloc, pdpt, l3, user, virt)?;
        self.next_table_or_create(alloc, pd, l2, user, virt)
    }

    fn write_leaf(
        &self,
        pt: PhysicalAddress,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        flags: PageFlags,
    ) {
        let [_, _, _, l1] = virt.table_indices();
        let table = unsafe { self.table_mut(pt) };
        table[l1] = PageEntryBits::from_parts(
            phys.align_down::<Size4K>(),
            flags.union(PageFlags::PRESENT).difference(PageFlags::HUGE),
        );
    }

    /// Returns the table at `depth` (1 = PDPT, 2 = PD, 3 = PT) on the walk to
    /// `virt`, or `None` if the walk ends early.
    fn table_at(&self, virt: VirtualAddress, depth: usize) -> Option<PhysicalAddress> {
        let indices = virt.table_indices();
        let mut table = self.root;
        for &index in &indices[..depth] {
            let entry = unsafe { self.table_ref(table) }[index];
            if !entry.present() || entry.large_page() {
                return None;
            }
            table = entry.physical_address();
        }
        Some(table)
    }

    /// The leaf entry for `virt` and whether it is a 2 MiB leaf.
    fn leaf(&self, virt: VirtualAddress) -> Option<(PageEntryBits, bool)> {
        let [l4, l3, l2, l1] = virt.table_indices();

        let e4 = unsafe { self.table_ref(self.root) }[l4];
        if !e4.present() {
            return None;
        }
        let e3 = unsafe { self.table_ref(e4.physical_address()) }[l3];
        if !e3.present() || e3.large_page() {
            // 1 GiB leaves are never created by this mapper.
            return None;
        }
        let e2 = unsafe { self.table_ref(e3.physical_address()) }[l2];
        if !e2.present() {
            return None;
        }
        if e2.large_page() {
            return Some((e2, true));
        }
        let e1 = unsafe { self.table_ref(e2.physical_address()) }[l1];
        e1.present().then_some((e1, false))
    }

    fn next_table_or_create<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        parent: PhysicalAddress,
        index: usize,
        user: bool,
        virt: VirtualAddress,
    ) -> Result<PhysicalAddress, MapError> {
        let table = unsafe { self.table_mut(parent) };
        let entry = table[index];

        if entry.present() {
            if entry.large_page() {
                return Err(MapError::HugePageConflict(virt));
            }
            if user && !entry.user_access() {
                table[index] = entry.with_user_access(true);
            }
            return Ok(entry.physical_address());
        }

        let child = alloc.alloc_4k().ok_or(MapError::OutOfMemory)?.base();
        unsafe { self.table_mut(child) }.zero();
        table[index] = PageEntryBits::table_link(child, user);
        Ok(child)
    }

    #[inline]
    unsafe fn table_mut<'a>(&self, pa: PhysicalAddress) -> &'a mut PageTable {
        unsafe { self.mapper.phys_to_mut::<PageTable>(pa) }
    }

    #[inline]
    unsafe fn table_ref<'a>(&self, pa: PhysicalAddress) -> &'a PageTable {
        unsafe { self.mapper.phys_to_mut::<PageTable>(pa) }
    }
}
