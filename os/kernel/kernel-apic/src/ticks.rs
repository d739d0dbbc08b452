use core::sync::atomic::{AtomicU64, Ordering};

/// Reads the time-stamp counter.
#[inline]
#[must_use]
pub fn rdtsc() -> u64 {
    let lo: u32;
    let hi: u32;
    unsafe {
        core::arch::asm!("rdtsc", out("eax") lo, out("edx") hi, options(nomem, nostack, preserves_flags));
    }
    (u64::from(hi) << 32) | u64::from(lo)
}

/// Monotonic timer tick counter shared between the timer handler and readers.
///
/// The handler calls [`tick`](Self::tick) with the current TSC; the first and
/// latest stamps give a TSC-per-tick estimate without a separate calibration
/// loop.
pub struct Ticks {
    count: AtomicU64,
    frequency_hz: AtomicU64,
    first_tsc: AtomicU64,
    last_tsc: AtomicU64,
}

impl Default for Ticks {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticks {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            frequency_hz: AtomicU64::new(0),
            first_tsc: AtomicU64::new(0),
            last_tsc: AtomicU64::new(0),
        }
    }

    /// Records one timer interrupt observed at `tsc`.
    #[inline]
    pub fn tick(&self, tsc: u64) {
        if self.count.fetch_add(1, Ordering::Relaxed) == 0 {
            self.first_tsc.store(tsc, Ordering::Relaxed);
        }
        self.last_tsc.store(tsc, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Nominal ticks per second, 0 until the timer is programmed.
    #[inline]
    #[must_use]
    pub fn frequency_hz(&self) -> u64 {
        self.frequency_hz.load(Ordering::Relaxed)
    }

    pub fn set_frequency_hz(&self, hz: u64) {
        self.frequency_hz.store(hz, Ordering::Relaxed);
    }

    /// Average TSC cycles between ticks, once at least two ticks were seen.
    #[must_use]
    pub fn tsc_per_tick(&self) -> Option<u64> {
        let n = self.count();
        if n < 2 {
            return None;
        }
        let span = self
            .last_tsc
            .load(Ordering::Acquire)
            .wrapping_sub(self.first_tsc.load(Ordering::Relaxed));
        Some(span / (n - 1))
    }

    /// Estimated TSC frequency from the tick stream and the nominal rate.
    #[must_use]
    pub fn tsc_hz(&self) -> Option<u64> {
        let hz = self.frequency_hz();
        if hz == 0 {
            return None;
        }
        self.tsc_per_tick().map(|per| per * hz)
    }

    /// Whole seconds covered by the ticks counted so far.
    #[must_use]
    pub fn uptime_seconds(&self) -> Option<u64> {
        match self.frequency_hz() {
            0 => None,
            hz => Some(self.count() / hz),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_from_ticks() {
        let t = Ticks::new();
        assert_eq!(t.tsc_per_tick(), None);
        t.set_frequency_hz(100);
        for i in 0..5u64 {
            t.tick(1_000 + i * 30_000_000);
        }
        assert_eq!(t.count(), 5);
        assert_eq!(t.tsc_per_tick(), Some(30_000_000));
        assert_eq!(t.tsc_hz(), Some(3_000_000_000));
        assert_eq!(t.uptime_seconds(), Some(0));
    }

    #[test]
    fn unknown_frequency() {
        let t = Ticks::new();
        t.tick(1);
        t.tick(2);
        assert_eq!(t.tsc_hz(), None);
        assert_eq!(t.uptime_seconds(), None);
    }
}
