use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a [`SyncOnceCell`]: `EMPTY -> WRITING -> FULL`, never back.
mod phase {
    pub const EMPTY: u8 = 0;
    pub const WRITING: u8 = 1;
    pub const FULL: u8 = 2;
}

/// Write-once storage at a fixed `'static` address.
///
/// Holds the descriptor tables and the kernel context, which the CPU or the
/// interrupt handlers reference after boot.
pub struct SyncOnceCell<T> {
    phase: AtomicU8,
    slot: UnsafeCell<MaybeUninit<T>>,
}

// Safety: `slot` is written once by the claiming caller and only read once
// `phase` is FULL.
unsafe impl<T: Sync + Send> Sync for SyncOnceCell<T> {}
unsafe impl<T: Send> Send for SyncOnceCell<T> {}

impl<T> SyncOnceCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(phase::EMPTY),
            slot: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.is_full().then(|| unsafe { self.read() })
    }

    /// Fills an empty cell.
    ///
    /// # Errors
    /// Hands `value` back if the cell was already claimed.
    pub fn set(&self, value: T) -> Result<&T, T> {
        if self.claim() {
            Ok(self.fill(value))
        } else {
            Err(value)
        }
    }

    /// Returns the stored value, running `init` first if the cell is empty.
    ///
    /// A caller that loses the race spins until the winner has stored its value.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.get() {
            value
        } else if self.claim() {
            self.fill(init())
        } else {
            while !self.is_full() {
                spin_loop();
            }
            unsafe { self.read() }
        }
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.phase.load(Ordering::Acquire) == phase::FULL
    }

    fn claim(&self) -> bool {
        self.phase
            .compare_exchange(
                phase::EMPTY,
                phase::WRITING,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Only the caller that won [`claim`](Self::claim) may call this.
    fn fill(&self, value: T) -> &T {
        unsafe { (*self.slot.get()).write(value) };
        self.phase.store(phase::FULL, Ordering::Release);
        unsafe { self.read() }
    }

    /// # Safety
    /// `phase` must be FULL.
    const unsafe fn read(&self) -> &T {
        unsafe { (*self.slot.get()).assume_init_ref() }
    }
}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for SyncOnceCell<T> {
    fn drop(&mut self) {
        if *self.phase.get_mut() == phase::FULL {
            unsafe { self.slot.get_mut().assume_init_drop() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn first_writer_wins() {
        let cell = SyncOnceCell::new();
        assert!(cell.get().is_none());
        assert_eq!(*cell.get_or_init(|| 0x08_u16), 0x08);
        assert_eq!(*cell.get_or_init(|| 0x1B), 0x08);
        assert_eq!(cell.set(0x28), Err(0x28));
        assert_eq!(cell.get(), Some(&0x08));
    }

    #[test]
    fn set_publishes_the_value() {
        let cell = SyncOnceCell::new();
        assert_eq!(cell.set(String::from("gdt")).map(String::as_str), Ok("gdt"));
        assert_eq!(cell.get().map(String::len), Some(3));
    }

    #[test]
    fn racing_initializers_run_once() {
        let cell = Arc::new(SyncOnceCell::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4_u64)
            .map(|id| {
                let cell = Arc::clone(&cell);
                let runs = Arc::clone(&runs);
                thread::spawn(move || {
                    *cell.get_or_init(|| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        id
                    })
                })
            })
            .collect();
        let seen: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(seen.iter().all(|&v| v == seen[0]));
    }
}
