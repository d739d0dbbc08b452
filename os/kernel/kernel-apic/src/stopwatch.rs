use log::info;

/// A start/stop stopwatch over TSC readings.
///
/// The caller supplies the current TSC and its rate, typically [`rdtsc`](crate::rdtsc)
/// and [`Ticks::tsc_hz`](crate::Ticks::tsc_hz), so the type itself never touches hardware.
#[derive(Debug, Default)]
pub struct Stopwatch {
    running: bool,
    start_tsc: u64,
    last_report: u64,
}

impl Stopwatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            running: false,
            start_tsc: 0,
            last_report: 0,
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self, tsc: u64) {
        self.running = true;
        self.start_tsc = tsc;
        self.last_report = tsc;
        info!("stopwatch started");
    }

    pub fn stop(&mut self) {
        self.running = false;
        info!("stopwatch stopped");
    }

    /// Starts a stopped watch from zero or stops a running one. Returns
    /// whether it is running afterwards.
    pub fn toggle(&mut self, tsc: u64) -> bool {
        if self.running {
            self.stop();
        } else {
            self.start(tsc);
        }
        self.running
    }

    /// Whole seconds since the last start; 0 while stopped or without a rate.
    #[must_use]
    pub const fn elapsed_seconds(&self, now_tsc: u64, tsc_hz: u64) -> u64 {
        if !self.running || tsc_hz == 0 {
            return 0;
        }
        now_tsc.wrapping_sub(self.start_tsc) / tsc_hz
    }

    /// Returns the elapsed seconds at most once per second of TSC time.
    pub const fn poll(&mut self, now_tsc: u64, tsc_hz: u64) -> Option<u64> {
        if !self.running || tsc_hz == 0 {
            return None;
        }
        if now_tsc.wrapping_sub(self.last_report) < tsc_hz {
            return None;
        }
        self.last_report = now_tsc;
        Some(self.elapsed_seconds(now_tsc, tsc_hz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HZ: u64 = 2_000_000_000;

    #[test]
    fn stopped_watch_reads_zero() {
        let mut sw = Stopwatch::new();
        assert_eq!(sw.elapsed_seconds(10 * HZ, HZ), 0);
        assert_eq!(sw.poll(10 * HZ, HZ), None);
    }

    #[test]
    fn toggle_restarts_from_zero() {
        let mut sw = Stopwatch::new();
        assert!(sw.toggle(5 * HZ));
        assert_eq!(sw.elapsed_seconds(8 * HZ + 1, HZ), 3);

        assert!(!sw.toggle(9 * HZ));
        assert_eq!(sw.elapsed_seconds(9 * HZ, HZ), 0);

        assert!(sw.toggle(20 * HZ));
        assert_eq!(sw.elapsed_seconds(21 * HZ, HZ), 1);
    }

    #[test]
    fn polls_once_per_second() {
        let mut sw = Stopwatch::new();
        sw.start(0);
        assert_eq!(sw.poll(HZ / 2, HZ), None);
        assert_eq!(sw.poll(HZ, HZ), Some(1));
        assert_eq!(sw.poll(HZ + 10, HZ), None);
        assert_eq!(sw.poll(2 * HZ + 10, HZ), Some(2));
    }

    #[test]
    fn unknown_rate_never_reports() {
        let mut sw = Stopwatch::new();
        sw.start(0);
        assert_eq!(sw.poll(u64::MAX, 0), None);
        assert_eq!(sw.elapsed_seconds(u64::MAX, 0), 0);
    }
}
