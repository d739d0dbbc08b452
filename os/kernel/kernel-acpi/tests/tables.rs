use kernel_acpi::madt::{IoApicEntry, Madt, MadtEntry};
use kernel_acpi::{AcpiError, AcpiTables, PhysMapRo, SdtHeader};
use std::cell::Cell;

/// Physical memory as a byte buffer; physical address = index.
struct FakePhys {
    mem: Vec<u8>,
    maps: Cell<usize>,
}

impl FakePhys {
    fn new() -> Self {
        Self {
            mem: vec![0; 0x4000],
            maps: Cell::new(0),
        }
    }

    fn put(&mut self, at: u64, bytes: &[u8]) {
        let at = at as usize;
        self.mem[at..at + bytes.len()].copy_from_slice(bytes);
    }
}

impl PhysMapRo for FakePhys {
    unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8] {
        let start = paddr as usize;
        assert!(start + len <= self.mem.len(), "map outside fake memory");
        self.maps.set(self.maps.get() + 1);
        unsafe { std::slice::from_raw_parts(self.mem.as_ptr().add(start), len) }
    }
}

fn checksum_fix(bytes: &mut [u8], at: usize) {
    let s = bytes.iter().fold(0u8, |a, &b| a.wrapping_add(b));
    bytes[at] = 0u8.wrapping_sub(s);
}

fn rsdp(revision: u8, xsdt: u64) -> Vec<u8> {
    let mut r = vec![0u8; 36];
    r[..8].copy_from_slice(b"RSD PTR ");
    r[9..15].copy_from_slice(b"TESTID");
    r[15] = revision;
    r[20..24].copy_from_slice(&36u32.to_le_bytes());
    r[24..32].copy_from_slice(&xsdt.to_le_bytes());
    checksum_fix(&mut r[..20], 8);
    checksum_fix(&mut r, 32);
    r
}

fn sdt(signature: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut t = vec![0u8; 36];
    t[..4].copy_from_slice(signature);
    let len = (36 + body.len()) as u32;
    t[4..8].copy_from_slice(&len.to_le_bytes());
    t[8] = 1;
    t.extend_from_slice(body);
    checksum_fix(&mut t, 9);
    t
}

fn xsdt(pointers: &[u64], trailing: &[u8]) -> Vec<u8> {
    let mut body: Vec<u8> = pointers.iter().flat_map(|p| p.to_le_bytes()).collect();
    body.extend_from_slice(trailing);
    sdt(b"XSDT", &body)
}

fn madt_body(entries: &[&[u8]]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0xFEE0_0000u32.to_le_bytes());
    body.extend_from_slice(&1u32.to_le_bytes());
    for e in entries {
        body.extend_from_slice(e);
    }
    body
}

fn io_apic_entry(id: u8, address: u32, gsi_base: u32) -> Vec<u8> {
    let mut e = vec![1, 12, id, 0];
    e.extend_from_slice(&address.to_le_bytes());
    e.extend_from_slice(&gsi_base.to_le_bytes());
    e
}

#[test]
fn rejects_bad_signature_and_old_revision() {
    let mut phys = FakePhys::new();
    let mut bad = rsdp(2, 0x100);
    bad[0] = b'X';
    phys.put(0x0, &bad);
    assert_eq!(
        unsafe { AcpiTables::new(&phys, 0x0) }.err(),
        Some(AcpiError::BadSignature)
    );

    phys.put(0x0, &rsdp(0, 0x100));
    assert_eq!(
        unsafe { AcpiTables::new(&phys, 0x0) }.err(),
        Some(AcpiError::UnsupportedRevision(0))
    );
}

#[test]
fn finds_the_first_matching_table() {
    let mut phys = FakePhys::new();
    phys.put(0x0, &rsdp(2, 0x100));
    phys.put(0x100, &xsdt(&[0x200, 0x300, 0x400], &[]));
    phys.put(0x200, &sdt(b"FACP", &[0; 8]));
    phys.put(0x300, &sdt(b"APIC", &madt_body(&[])));
    phys.put(0x400, &sdt(b"APIC", &madt_body(&[])));

    let tables = unsafe { AcpiTables::new(&phys, 0x0) }.unwrap();
    assert_eq!(tables.rsdp().revision, 2);
    assert_eq!(tables.entry_count(), 3);

    let madt = tables.find_table(*b"APIC").unwrap();
    assert_eq!(madt.phys, 0x300);
    assert_eq!(madt.signature_str(), "APIC");
    assert_eq!(tables.find_table(*b"HPET"), None);
}

#[test]
fn scans_exactly_the_whole_entries() {
    let mut phys = FakePhys::new();
    phys.put(0x0, &rsdp(2, 0x100));
    // Two full pointers plus four stray bytes: the partial third slot is not an entry.
    phys.put(0x100, &xsdt(&[0x200, 0x300], &[0x00, 0x04, 0x00, 0x00]));
    phys.put(0x200, &sdt(b"FACP", &[]));
    phys.put(0x300, &sdt(b"SSDT", &[]));
    phys.put(0x400, &sdt(b"APIC", &madt_body(&[])));

    let tables = unsafe { AcpiTables::new(&phys, 0x0) }.unwrap();
    assert_eq!(tables.entry_count(), 2);

    phys.maps.set(0);
    assert_eq!(tables.find_table(*b"APIC"), None);
    // One XSDT view plus one header per entry.
    assert_eq!(phys.maps.get(), 1 + 2);
}

#[test]
fn walks_madt_io_apics() {
    let mut phys = FakePhys::new();
    let ioa = io_apic_entry(1, 0xFEC0_0000, 0);
    let iob = io_apic_entry(2, 0xFEC0_1000, 24);
    let lapic = [0u8, 8, 0, 0, 1, 0, 0, 0];
    let iso = [2u8, 10, 0, 0, 2, 0, 0, 0, 0, 0];
    phys.put(0x0, &rsdp(2, 0x100));
    phys.put(0x100, &xsdt(&[0x300], &[]));
    phys.put(
        0x300,
        &sdt(b"APIC", &madt_body(&[&lapic, &ioa, &iso, &iob])),
    );

    let tables = unsafe { AcpiTables::new(&phys, 0x0) }.unwrap();
    let header = tables.find_table(*b"APIC").unwrap();
    let madt = Madt::parse(tables.table_bytes(&header)).unwrap();
    assert_eq!(madt.local_apic_address, 0xFEE0_0000);

    let entries: Vec<_> = madt.entries().collect();
    assert_eq!(entries.len(), 4);
    assert_eq!(
        entries[0],
        MadtEntry::LocalApic {
            processor_id: 0,
            apic_id: 0,
            flags: 1
        }
    );
    assert_eq!(
        entries[2],
        MadtEntry::InterruptSourceOverride {
            bus: 0,
            source: 0,
            gsi: 2,
            flags: 0
        }
    );

    let io: Vec<_> = madt.io_apics().collect();
    assert_eq!(
        io,
        [
            IoApicEntry {
                id: 1,
                address: 0xFEC0_0000,
                gsi_base: 0
            },
            IoApicEntry {
                id: 2,
                address: 0xFEC0_1000,
                gsi_base: 24
            },
        ]
    );
}

#[test]
fn madt_walk_stops_on_malformed_entries() {
    let ioa = io_apic_entry(1, 0xFEC0_0000, 0);
    let zero = [9u8, 0];
    let table = sdt(b"APIC", &madt_body(&[&ioa, &zero, &ioa]));
    let madt = Madt::parse(kernel_acpi::TableBytes::new(&table)).unwrap();
    assert_eq!(madt.entries().count(), 1);

    let overrun = [1u8, 40, 0, 0];
    let table = sdt(b"APIC", &madt_body(&[&ioa, &overrun]));
    let madt = Madt::parse(kernel_acpi::TableBytes::new(&table)).unwrap();
    assert_eq!(madt.io_apics().count(), 1);
}

#[test]
fn madt_rejects_other_tables() {
    let table = sdt(b"FACP", &[0; 8]);
    assert!(matches!(
        Madt::parse(kernel_acpi::TableBytes::new(&table)),
        Err(AcpiError::WrongTable { .. })
    ));
    assert_eq!(SdtHeader::SIZE, 36);
}
