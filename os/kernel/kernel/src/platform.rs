//! # Interrupt controller bring-up
//!
//! ACPI (RSDP → XSDT → MADT) tells us where the local APIC and the I/O
//! APICs live. Both are mapped uncached at `phys + hhdm`, the local APIC is
//! initialized with its timer running and every I/O APIC pin is masked.

use crate::context::{Pmm, Vmm};
use kernel_acpi::madt::{self, Madt};
use kernel_acpi::{AcpiTables, PhysMapRo};
use kernel_alloc::HhdmPhysMapper;
use kernel_apic::{IoApicSet, LocalApic, LocalApicError, MmioWindow, TimerConfig, map_mmio};
use kernel_vmem::{PhysMapper, PhysicalAddress};
use log::{info, warn};

/// Architectural reset value of `IA32_APIC_BASE`.
const DEFAULT_LAPIC_PHYS: u64 = 0xFEE0_0000;

/// Read-only firmware table access through the direct map.
struct AcpiWindow(HhdmPhysMapper);

impl PhysMapRo for AcpiWindow {
    unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8] {
        let va = self.0.phys_to_virt(PhysicalAddress::new(paddr));
        unsafe { core::slice::from_raw_parts(va.as_mut_ptr::<u8>().cast_const(), len) }
    }
}

pub struct Controllers {
    pub lapic: LocalApic<MmioWindow>,
    pub io_apics: IoApicSet<MmioWindow>,
    pub timer: TimerConfig,
}

/// Locates, maps and initializes the local APIC and all I/O APICs.
///
/// Without usable ACPI tables the local APIC is taken from its default
/// address and no I/O APIC is registered.
///
/// # Errors
/// [`LocalApicError::Map`] if the local APIC registers could not be mapped.
pub fn bring_up(
    rsdp_phys: u64,
    hhdm_offset: u64,
    vmm: &mut Vmm,
    pmm: &mut Pmm,
) -> Result<Controllers, LocalApicError> {
    let window = AcpiWindow(HhdmPhysMapper::new(hhdm_offset));
    let tables = if rsdp_phys == 0 {
        warn!("ACPI: no RSDP from the loader");
        None
    } else {
        unsafe { AcpiTables::new(&window, rsdp_phys) }
            .inspect_err(|e| warn!("ACPI: {e}"))
            .ok()
    };

    let madt = tables.as_ref().and_then(|tables| {
        let header = tables.find_table(madt::SIGNATURE)?;
        info!("ACPI: found {header}");
        Madt::parse(tables.table_bytes(&header))
            .inspect_err(|e| warn!("ACPI: MADT unusable: {e}"))
            .ok()
    });

    let lapic_phys = madt.as_ref().map_or_else(
        || {
            warn!("no MADT, assuming the local APIC at {DEFAULT_LAPIC_PHYS:#x}");
            DEFAULT_LAPIC_PHYS
        },
        |madt| u64::from(madt.local_apic_address),
    );

    let lapic = LocalApic::map(vmm, pmm, PhysicalAddress::new(lapic_phys), hhdm_offset)?;
    let timer = TimerConfig::default();
    lapic.init(timer);

    let mut io_apics = IoApicSet::new();
    if let Some(madt) = &madt {
        let found = io_apics.discover(madt.io_apics(), |entry| {
            let phys = PhysicalAddress::new(u64::from(entry.address));
            map_mmio(vmm, pmm, phys, hhdm_offset)
                .inspect_err(|e| warn!("IOAPIC {}: {e}", entry.id))
                .ok()
                .map(|virt| unsafe { MmioWindow::new(virt) })
        });
        info!("{found} I/O APIC(s) registered");
    }

    Ok(Controllers {
        lapic,
        io_apics,
        timer,
    })
}
