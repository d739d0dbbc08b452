//! # Fault reporting
//!
//! Every exception stub in the kernel funnels into one routine that gets a
//! [`FaultReport`]. This module holds the parts of that routine that do not
//! touch hardware: naming the vector, decoding a page-fault error code and
//! classifying the exception.

use crate::privilege::Ring;
use bitfield_struct::bitfield;
use core::fmt;

pub const PAGE_FAULT_VECTOR: u8 = 14;
pub const GENERAL_PROTECTION_VECTOR: u8 = 13;

const EXCEPTIONS: [(&str, &str); 32] = [
    ("#DE", "divide error"),
    ("#DB", "debug"),
    ("NMI", "non-maskable interrupt"),
    ("#BP", "breakpoint"),
    ("#OF", "overflow"),
    ("#BR", "bound range exceeded"),
    ("#UD", "invalid opcode"),
    ("#NM", "device not available"),
    ("#DF", "double fault"),
    ("CSO", "coprocessor segment overrun"),
    ("#TS", "invalid TSS"),
    ("#NP", "segment not present"),
    ("#SS", "stack-segment fault"),
    ("#GP", "general protection fault"),
    ("#PF", "page fault"),
    ("--", "reserved"),
    ("#MF", "x87 floating-point exception"),
    ("#AC", "alignment check"),
    ("#MC", "machine check"),
    ("#XM", "SIMD floating-point exception"),
    ("#VE", "virtualization exception"),
    ("#CP", "control protection exception"),
    ("--", "reserved"),
    ("--", "reserved"),
    ("--", "reserved"),
    ("--", "reserved"),
    ("--", "reserved"),
    ("--", "reserved"),
    ("#HV", "hypervisor injection exception"),
    ("#VC", "VMM communication exception"),
    ("#SX", "security exception"),
    ("--", "reserved"),
];

/// Mnemonic and name of an architectural exception, `None` above 31.
#[must_use]
pub const fn exception_name(vector: u8) -> Option<(&'static str, &'static str)> {
    if (vector as usize) < EXCEPTIONS.len() {
        Some(EXCEPTIONS[vector as usize])
    } else {
        None
    }
}

/// Whether the CPU pushes an error code for this vector.
#[must_use]
pub const fn has_error_code(vector: u8) -> bool {
    matches!(vector, 8 | 10..=14 | 17 | 21 | 29 | 30)
}

/// Page-fault error code (Intel SDM Vol. 3A, §4.7).
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct PageFaultError {
    /// 0 = non-present page, 1 = protection violation.
    pub present: bool,
    pub write: bool,
    pub user: bool,
    pub reserved_bit: bool,
    pub instruction_fetch: bool,
    pub protection_key: bool,
    pub shadow_stack: bool,
    #[bits(57)]
    __: u64,
}

impl PageFaultError {
    /// The human-readable cause, e.g. `page not present, write attempt`.
    #[must_use]
    pub const fn describe(self) -> PageFaultDescription {
        PageFaultDescription(self)
    }
}

/// `Display` adapter returned by [`PageFaultError::describe`].
#[derive(Copy, Clone, Debug)]
pub struct PageFaultDescription(PageFaultError);

impl fmt::Display for PageFaultDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = self.0;
        f.write_str(if e.present() {
            "page-protection violation"
        } else {
            "page not present"
        })?;
        let suffixes = [
            (e.write(), ", write attempt"),
            (e.user(), ", user mode"),
            (e.reserved_bit(), ", reserved bit set"),
            (e.instruction_fetch(), ", instruction fetch"),
        ];
        for (_, text) in suffixes.iter().filter(|(set, _)| *set) {
            f.write_str(text)?;
        }
        Ok(())
    }
}

/// The frame every exception stub builds before calling into Rust:
/// vector and error code (0 when the CPU pushes none), then the hardware
/// interrupt frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct TrapFrame {
    pub vector: u64,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

/// What the kernel should do about an exception.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ExceptionClass {
    /// Traps that leave the faulting instruction behind (`int3`, `into`).
    RecoverableRetry,
    /// A user-mode access or protection fault; would become a signal.
    UserSignal,
    FatalHalt,
}

impl ExceptionClass {
    #[must_use]
    pub const fn for_vector(vector: u8, ring: Ring) -> Self {
        match (vector, ring) {
            (3 | 4, _) => Self::RecoverableRetry,
            (PAGE_FAULT_VECTOR | GENERAL_PROTECTION_VECTOR, Ring::Ring3) => Self::UserSignal,
            _ => Self::FatalHalt,
        }
    }
}

impl fmt::Display for ExceptionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RecoverableRetry => "recoverable",
            Self::UserSignal => "user fault",
            Self::FatalHalt => "fatal",
        })
    }
}

/// Everything known about a fault at the moment it is reported.
#[derive(Copy, Clone, Debug)]
pub struct FaultReport {
    pub vector: u8,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
    /// Faulting linear address, for page faults only.
    pub cr2: Option<u64>,
}

impl FaultReport {
    /// `cr2` is kept only when the frame is a page fault.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_frame(frame: &TrapFrame, cr2: u64) -> Self {
        let vector = frame.vector as u8;
        Self {
            vector,
            error_code: frame.error_code,
            rip: frame.rip,
            cs: frame.cs,
            rflags: frame.rflags,
            rsp: frame.rsp,
            ss: frame.ss,
            cr2: if vector == PAGE_FAULT_VECTOR { Some(cr2) } else { None },
        }
    }

    /// Privilege level the CPU was at when the fault hit.
    #[must_use]
    pub const fn ring(&self) -> Ring {
        Ring::of_selector(self.cs)
    }

    #[must_use]
    pub const fn is_exception(&self) -> bool {
        (self.vector as usize) < EXCEPTIONS.len()
    }

    #[must_use]
    pub const fn class(&self) -> ExceptionClass {
        ExceptionClass::for_vector(self.vector, self.ring())
    }

    #[must_use]
    pub const fn page_fault(&self) -> Option<PageFaultError> {
        if self.cr2.is_some() {
            Some(PageFaultError::from_bits(self.error_code))
        } else {
            None
        }
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector : {}", self.vector)?;
        match exception_name(self.vector) {
            Some((mnemonic, name)) => writeln!(f, "   (exception) {mnemonic} {name}")?,
            None => writeln!(f)?,
        }
        writeln!(f, "Error  : {:#018x}", self.error_code)?;
        writeln!(f, "RIP    : {:#018x}", self.rip)?;
        writeln!(f, "CS     : {:#018x}  (ring {})", self.cs, self.ring().into_bits())?;
        writeln!(f, "RFLAGS : {:#018x}", self.rflags)?;
        writeln!(f, "RSP    : {:#018x}", self.rsp)?;
        write!(f, "SS     : {:#018x}", self.ss)?;
        if let (Some(cr2), Some(err)) = (self.cr2, self.page_fault()) {
            write!(f, "\nCR2    : {cr2:#018x}  -> {}", err.describe())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(bits: u64) -> String {
        PageFaultError::from_bits(bits).describe().to_string()
    }

    #[test]
    fn protection_violation_alone() {
        assert_eq!(describe(0b00001), "page-protection violation");
    }

    #[test]
    fn suffixes_in_fixed_order() {
        assert_eq!(describe(0), "page not present");
        assert_eq!(describe(0b00010), "page not present, write attempt");
        assert_eq!(
            describe(0b11111),
            "page-protection violation, write attempt, user mode, reserved bit set, instruction fetch"
        );
        assert_eq!(describe(0b10100), "page not present, user mode, instruction fetch");
    }

    #[test]
    fn classification() {
        assert_eq!(
            ExceptionClass::for_vector(3, Ring::Ring0),
            ExceptionClass::RecoverableRetry
        );
        assert_eq!(
            ExceptionClass::for_vector(4, Ring::Ring3),
            ExceptionClass::RecoverableRetry
        );
        assert_eq!(
            ExceptionClass::for_vector(14, Ring::Ring3),
            ExceptionClass::UserSignal
        );
        assert_eq!(
            ExceptionClass::for_vector(13, Ring::Ring3),
            ExceptionClass::UserSignal
        );
        assert_eq!(
            ExceptionClass::for_vector(14, Ring::Ring0),
            ExceptionClass::FatalHalt
        );
        assert_eq!(
            ExceptionClass::for_vector(8, Ring::Ring0),
            ExceptionClass::FatalHalt
        );
    }

    #[test]
    fn report_from_frame() {
        let frame = TrapFrame {
            vector: 14,
            error_code: 0b00111,
            rip: 0x40_1000,
            cs: 0x1B,
            rflags: 0x202,
            rsp: 0x7FFF_F000,
            ss: 0x23,
        };
        let report = FaultReport::from_frame(&frame, 0xDEAD_0000);
        assert_eq!(report.ring(), Ring::Ring3);
        assert_eq!(report.cr2, Some(0xDEAD_0000));
        assert!(report.is_exception());
        assert_eq!(report.class(), ExceptionClass::UserSignal);

        let text = report.to_string();
        assert!(text.starts_with("Vector : 14   (exception) #PF page fault\n"));
        assert!(text.contains("(ring 3)"));
        assert!(text.ends_with(
            "-> page-protection violation, write attempt, user mode"
        ));

        let gp = FaultReport::from_frame(&TrapFrame { vector: 13, cs: 0x08, ..frame }, 0xDEAD_0000);
        assert_eq!(gp.cr2, None);
        assert_eq!(gp.class(), ExceptionClass::FatalHalt);
    }

    #[test]
    fn names_and_error_codes() {
        assert_eq!(exception_name(8), Some(("#DF", "double fault")));
        assert_eq!(exception_name(32), None);
        assert!(has_error_code(14));
        assert!(has_error_code(8));
        assert!(!has_error_code(3));
        assert!(!has_error_code(32));
    }
}
