//! # QEMU debug console output
//!
//! Everything the kernel logs ends up as bytes written to I/O port `0x402`,
//! QEMU's debug console:
//!
//! ```text
//! info!/warn!/error!  ──►  QemuLogger (log::Log)
//!                               │
//! qemu_trace!  ─────────────────┤
//!                               ▼
//!                      QemuSink (fmt::Write) ──► out 0x402, al
//! ```
//!
//! Capture it on the host with `-debugcon stdio` or `-debugcon file:debug.log`.
//!
//! ## Features
//!
//! * `enabled` (default): port writes are compiled in on bare-metal targets.
//!   Without it, or on hosted targets, every write is a no-op.
//!
//! ```rust,no_run
//! use kernel_qemu::QemuLogger;
//! use log::{LevelFilter, info};
//!
//! QemuLogger::new(LevelFilter::Debug).init().expect("logger initialization");
//! info!("frame allocator up");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::{QemuLogger, write_record};

#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    /// Byte-wise writer for the debug console.
    pub struct QemuSink;

    impl QemuSink {
        /// QEMU's `-debugcon` port.
        pub const PORT: u16 = 0x402;

        #[cfg(all(feature = "enabled", target_os = "none"))]
        fn put(byte: u8) {
            unsafe {
                core::arch::asm!(
                    "out dx, al",
                    in("dx") Self::PORT,
                    in("al") byte,
                    options(nomem, nostack, preserves_flags)
                );
            }
        }

        #[cfg(not(all(feature = "enabled", target_os = "none")))]
        const fn put(_byte: u8) {}
    }

    impl fmt::Write for QemuSink {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for byte in s.bytes() {
                Self::put(byte);
            }
            Ok(())
        }
    }

    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // The port has no failure mode.
        let _ = fmt::Write::write_fmt(&mut QemuSink, args);
    }
}

/// `format!`-style output straight to the debug console, bypassing `log`.
///
/// Used where the logger may not be usable, such as the panic handler.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
