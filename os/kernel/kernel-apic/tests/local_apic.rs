use kernel_apic::{Divide, LocalApic, RegisterWindow, TimerConfig, lapic_reg, vectors};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Default)]
struct FakeLapic {
    regs: RefCell<HashMap<usize, u32>>,
    writes: RefCell<Vec<(usize, u32)>>,
}

impl RegisterWindow for FakeLapic {
    fn read32(&self, offset: usize) -> u32 {
        self.regs.borrow().get(&offset).copied().unwrap_or(0)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.regs.borrow_mut().insert(offset, value);
        self.writes.borrow_mut().push((offset, value));
    }
}

#[test]
fn init_programs_registers_in_order() {
    use lapic_reg::{
        ESR, LVT_ERROR, LVT_LINT0, LVT_LINT1, LVT_PERF, LVT_THERMAL, LVT_TIMER, MASKED, PERIODIC,
        SVR, TIMER_DIVIDE, TIMER_INIT, TPR,
    };

    let fake = FakeLapic::default();
    let lapic = LocalApic::new(&fake);
    lapic.init(TimerConfig::default());

    assert_eq!(
        *fake.writes.borrow(),
        [
            (ESR, 0),
            (TPR, 0),
            (SVR, 0x100 | 0xFF),
            (LVT_TIMER, MASKED | 0x20),
            (LVT_THERMAL, MASKED),
            (LVT_PERF, MASKED),
            (LVT_LINT0, MASKED),
            (LVT_LINT1, MASKED),
            (LVT_ERROR, MASKED | 0xFE),
            (TIMER_DIVIDE, 0b0011),
            (LVT_TIMER, 0x20 | PERIODIC),
            (TIMER_INIT, 1_000_000),
            (LVT_ERROR, 0xFE),
        ]
    );
}

#[test]
fn eoi_writes_zero() {
    let fake = FakeLapic::default();
    let lapic = LocalApic::new(&fake);
    lapic.eoi();
    assert_eq!(*fake.writes.borrow(), [(lapic_reg::EOI, 0)]);
}

#[test]
fn timer_defaults_and_frequency() {
    let cfg = TimerConfig::default();
    assert_eq!(cfg.vector, vectors::TIMER);
    assert_eq!(cfg.divide, Divide::By16);
    assert_eq!(cfg.initial_count, 1_000_000);
    assert_eq!(cfg.frequency_hz(TimerConfig::QEMU_BUS_HZ), 62);
    assert_eq!(cfg.frequency_hz(1_600_000_000), 100);
}
