use kernel_acpi::madt::IoApicEntry;
use kernel_apic::{DeliveryMode, IoApicError, IoApicSet, MAX_IO_APICS, RegisterWindow};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// An I/O APIC register file behind the IOREGSEL/IOWIN pair.
struct FakeIoApic {
    select: Cell<u32>,
    regs: RefCell<HashMap<u32, u32>>,
    writes: RefCell<Vec<(u32, u32)>>,
}

impl FakeIoApic {
    fn new(max_redirection: u8) -> Self {
        let regs = HashMap::from([(0x01, (u32::from(max_redirection) << 16) | 0x20)]);
        Self {
            select: Cell::new(0),
            regs: RefCell::new(regs),
            writes: RefCell::new(Vec::new()),
        }
    }

    fn reg(&self, reg: u32) -> u32 {
        self.regs.borrow().get(&reg).copied().unwrap_or(0)
    }

    fn last_writes(&self, n: usize) -> Vec<(u32, u32)> {
        let w = self.writes.borrow();
        w[w.len() - n..].to_vec()
    }
}

impl RegisterWindow for FakeIoApic {
    fn read32(&self, offset: usize) -> u32 {
        assert_eq!(offset, 0x10, "reads go through IOWIN");
        self.reg(self.select.get())
    }

    fn write32(&self, offset: usize, value: u32) {
        match offset {
            0x00 => self.select.set(value),
            0x10 => {
                let sel = self.select.get();
                self.regs.borrow_mut().insert(sel, value);
                self.writes.borrow_mut().push((sel, value));
            }
            _ => panic!("unexpected offset {offset:#x}"),
        }
    }
}

fn entry(id: u8, gsi_base: u32) -> IoApicEntry {
    IoApicEntry {
        id,
        address: 0xFEC0_0000 + u32::from(id) * 0x1000,
        gsi_base,
    }
}

fn two_apics<'a>(a: &'a FakeIoApic, b: &'a FakeIoApic) -> IoApicSet<&'a FakeIoApic> {
    let mut set = IoApicSet::new();
    let fakes = [a, b];
    let added = set.discover([entry(0, 0), entry(1, 24)], |e| Some(fakes[usize::from(e.id)]));
    assert_eq!(added, 2);
    set
}

#[test]
fn discovery_masks_every_pin() {
    let (a, b) = (FakeIoApic::new(23), FakeIoApic::new(23));
    let set = two_apics(&a, &b);
    assert_eq!(set.len(), 2);

    for fake in [&a, &b] {
        for pin in 0..24 {
            assert_eq!(fake.reg(0x10 + pin * 2), 1 << 16, "pin {pin} low");
            assert_eq!(fake.reg(0x11 + pin * 2), 0, "pin {pin} high");
        }
        assert_eq!(fake.reg(0x10 + 24 * 2), 0, "no pin past max_redirection");
    }
    let first = set.iter().next().unwrap();
    assert_eq!(first.max_redirection(), 23);
    assert_eq!(first.pin_count(), 24);
}

#[test]
fn set_irq_resolves_owner_and_pin() {
    let (a, b) = (FakeIoApic::new(23), FakeIoApic::new(23));
    let set = two_apics(&a, &b);
    let a_writes = a.writes.borrow().len();

    let (apic, pin) = set.for_gsi(30).unwrap();
    assert_eq!((apic.id(), pin), (1, 6));

    set.set_irq(30, 0x41, false, false, DeliveryMode::Fixed, 0)
        .unwrap();

    // Pin 6 lives at registers 0x1C/0x1D.
    assert_eq!(
        b.last_writes(3),
        [(0x1C, 0x0001_0041), (0x1D, 0), (0x1C, 0x0000_0041)]
    );
    assert_eq!(a.writes.borrow().len(), a_writes, "first I/O APIC untouched");
}

#[test]
fn set_irq_encodes_polarity_trigger_and_destination() {
    let (a, b) = (FakeIoApic::new(23), FakeIoApic::new(23));
    let set = two_apics(&a, &b);

    set.set_irq(1, 0x21, true, true, DeliveryMode::LowestPriority, 3)
        .unwrap();
    let low = 0x21 | (0b001 << 8) | (1 << 13) | (1 << 15);
    assert_eq!(
        a.last_writes(3),
        [(0x12, low | (1 << 16)), (0x13, 3 << 24), (0x12, low)]
    );

    let read_back = set.iter().next().unwrap().read_redirection(1);
    assert_eq!(read_back.vector(), 0x21);
    assert_eq!(read_back.delivery_mode(), DeliveryMode::LowestPriority);
    assert!(read_back.level_triggered() && read_back.active_low());
    assert!(!read_back.masked());
    assert_eq!(read_back.destination(), 3);
}

#[test]
fn mask_and_unmask_touch_only_the_mask_bit() {
    let (a, b) = (FakeIoApic::new(23), FakeIoApic::new(23));
    let set = two_apics(&a, &b);

    set.set_irq(5, 0x31, true, true, DeliveryMode::Fixed, 2)
        .unwrap();
    let before = a.reg(0x1A);

    set.mask_irq(5).unwrap();
    assert_eq!(a.reg(0x1A), before | (1 << 16));
    assert_eq!(a.reg(0x1B), 2 << 24);

    set.unmask_irq(5).unwrap();
    assert_eq!(a.reg(0x1A), before);
}

#[test]
fn unknown_gsi_is_an_error() {
    let (a, b) = (FakeIoApic::new(23), FakeIoApic::new(23));
    let set = two_apics(&a, &b);
    assert_eq!(
        set.set_irq(48, 0x40, false, false, DeliveryMode::Fixed, 0),
        Err(IoApicError::NoIoApicForGsi(48))
    );
    assert_eq!(set.mask_irq(48), Err(IoApicError::NoIoApicForGsi(48)));
    assert!(set.for_gsi(47).is_some());
}

#[test]
fn ninth_io_apic_is_skipped() {
    let fakes: Vec<FakeIoApic> = (0..9).map(|_| FakeIoApic::new(23)).collect();
    let entries: Vec<IoApicEntry> = (0..9u8).map(|i| entry(i, u32::from(i) * 24)).collect();
    let opened = Cell::new(0);

    let mut set = IoApicSet::new();
    let added = set.discover(entries, |e| {
        opened.set(opened.get() + 1);
        Some(&fakes[usize::from(e.id)])
    });

    assert_eq!(added, MAX_IO_APICS);
    assert_eq!(opened.get(), MAX_IO_APICS, "the ninth window is never opened");
    assert!(fakes[8].writes.borrow().is_empty());
    assert!(set.for_gsi(8 * 24).is_none());
    assert_eq!(set.add(kernel_apic::IoApic::new(9, 999, &fakes[8])).err(), Some(IoApicError::TooMany));
}
