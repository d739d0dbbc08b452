//! # Kernel synchronization primitives
//!
//! * [`SpinLock`]: test-and-test-and-set lock with an RAII guard.
//! * [`IrqGuard`]: masks maskable interrupts for its lifetime.
//! * [`SpinLock::lock_irq`]: both at once, so a handler can never spin on a
//!   lock held by the code it interrupted.
//! * [`SyncOnceCell`]: one-time initialization for `'static` kernel state.
//!
//! Interrupt control only does something on bare-metal targets; hosted builds
//! (unit tests) see a no-op guard.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;
mod sync_once_cell;

pub use irq::IrqGuard;
pub use spin_lock::{IrqSpinLockGuard, SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
