//! Interrupt flag control.
//!
//! On `target_os = "none"` these issue `cli`/`sti`/`pushfq`. Elsewhere the
//! flag is reported as clear and the instructions are skipped, which keeps the
//! lock types usable from host tests.

/// `RFLAGS.IF`.
pub const RFLAGS_IF: u64 = 1 << 9;

#[cfg(target_os = "none")]
mod arch {
    #[inline]
    pub fn cli() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    #[inline]
    pub fn sti() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }

    #[inline]
    pub fn rflags() -> u64 {
        let r: u64;
        unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(nomem, preserves_flags)) }
        r
    }
}

#[cfg(not(target_os = "none"))]
mod arch {
    #[inline]
    pub const fn cli() {}

    #[inline]
    pub const fn sti() {}

    #[inline]
    pub const fn rflags() -> u64 {
        0
    }
}

/// Disables maskable interrupts.
///
/// # Platform
///
/// `x86_64`, CPL 0.
#[inline]
pub fn disable() {
    arch::cli();
}

/// Enables maskable interrupts.
///
/// # Platform
///
/// `x86_64`, CPL 0. The CPU delays recognition by one instruction, so
/// `sti; hlt` cannot miss a wakeup.
#[inline]
pub fn enable() {
    arch::sti();
}

/// Current `RFLAGS`.
#[inline]
#[must_use]
pub fn rflags() -> u64 {
    arch::rflags()
}

#[inline]
#[must_use]
pub fn are_enabled() -> bool {
    rflags() & RFLAGS_IF != 0
}

/// Runs `f` with interrupts masked, restoring the previous state afterwards.
#[inline]
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    let _guard = IrqGuard::new();
    f()
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// Only re-enables on drop if they were enabled when the guard was taken, so
/// guards nest.
///
/// ```no_run
/// use kernel_sync::IrqGuard;
///
/// {
///     let _g = IrqGuard::new();
///     // no interrupt handler runs here
/// }
/// ```
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard {
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    #[inline]
    pub fn new() -> Self {
        let were_enabled = are_enabled();
        if were_enabled {
            disable();
        }
        Self { were_enabled }
    }

    /// Whether interrupts were on when the guard was taken.
    #[inline]
    #[must_use]
    pub const fn were_enabled(&self) -> bool {
        self.were_enabled
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            enable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosted_guard_is_inert() {
        assert!(!are_enabled());
        let g = IrqGuard::new();
        assert!(!g.were_enabled());
        assert_eq!(without_interrupts(|| 7), 7);
    }
}
