use crate::PageEntryBits;
use core::ops::{Index, IndexMut};

pub const ENTRIES_PER_TABLE: usize = 512;

/// One 4 KiB paging structure at any level.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntryBits; ENTRIES_PER_TABLE],
}

const _: () = {
    assert!(size_of::<PageTable>() == 4096);
    assert!(align_of::<PageTable>() == 4096);
};

impl PageTable {
    /// Clears every entry (not-present).
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PageEntryBits::new());
    }

    /// Whether no entry is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(PageEntryBits::is_empty)
    }

    /// Iterates `(index, entry)` over populated entries.
    pub fn present_entries(&self) -> impl Iterator<Item = (usize, PageEntryBits)> + '_ {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, e)| e.present())
    }
}

impl Index<usize> for PageTable {
    type Output = PageEntryBits;

    #[inline]
    fn index(&self, index: usize) -> &PageEntryBits {
        &self.entries[index]
    }
}

impl IndexMut<usize> for PageTable {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut PageEntryBits {
        &mut self.entries[index]
    }
}
