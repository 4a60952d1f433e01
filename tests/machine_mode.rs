mod common;

use common::{
    boot, enter, hart, root_of, Event, Recorder, HALT_STUB, KERNEL_ENTRY, LAYOUT,
    SUPERVISOR_ENTRY,
};
use hartboot::{
    addr::PhysAddr,
    firmware::{DELEGATED_EXCEPTIONS, DELEGATED_INTERRUPTS, EXPOSED_COUNTERS},
    page::{BootPageTableSet, Entry},
};

fn blank_tables() -> Vec<Entry> {
    vec![Entry::INVALID; LAYOUT.max_harts * LAYOUT.entries_per_table]
}

#[test]
fn registers_are_written_in_order() {
    let load = 0x8000_0000;
    let mut raw = blank_tables();
    let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);
    let mut machine = Recorder::loaded_at(load);

    enter(&mut machine, hart(3), set.table(hart(3)));

    assert_eq!(
        machine.events,
        vec![
            Event::MachineTrapVector(load + HALT_STUB),
            Event::Delegate {
                exceptions: 0xb1ff,
                interrupts: 0x222,
            },
            Event::Counters(0xffff_ffff),
            Event::MachineScratch(0x8084_0000),
            Event::OpenMemory,
            Event::SupervisorReturn(load + SUPERVISOR_ENTRY),
            Event::Mret { hart: 3 },
        ]
    );
}

#[test]
fn delegation_covers_page_faults_and_supervisor_interrupts() {
    for &cause in &[12, 13, 15] {
        assert_ne!(DELEGATED_EXCEPTIONS & (1usize << cause), 0, "cause {}", cause);
    }
    // machine environment calls stay in machine mode
    assert_eq!(DELEGATED_EXCEPTIONS & (1usize << 11), 0);
    assert_eq!(DELEGATED_INTERRUPTS, (1 << 1) | (1 << 5) | (1 << 9));
    assert_eq!(EXPOSED_COUNTERS as u32, u32::MAX);
}

#[test]
fn only_the_own_table_is_provisioned() {
    let load = 0x8000_0000;
    let mut raw = blank_tables();

    {
        let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);
        let mut machine = Recorder::loaded_at(load);
        enter(&mut machine, hart(2), set.table(hart(2)));
    }

    for id in 0..LAYOUT.max_harts {
        let table = &raw[id * LAYOUT.entries_per_table..][..LAYOUT.entries_per_table];
        assert_eq!(table.iter().any(|e| e.valid()), id == 2, "hart {}", id);
    }
    assert_eq!(root_of(&raw, 2)[2].address(), PhysAddr::new(load));
}

#[test]
fn machine_entry_then_bootstrap() {
    let load = 0x1_0000_0000;
    let mut raw = blank_tables();
    let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);

    let mut firmware = Recorder::loaded_at(load);
    enter(&mut firmware, hart(0), set.table(hart(0)));

    let mut machine = Recorder::loaded_at(load);
    boot(&mut machine, hart(0), set.table(hart(0)));

    assert_eq!(
        machine.events.last(),
        Some(&Event::Jump {
            hart: 0,
            sp: 0xffff_ffff_c081_0000,
            entry: KERNEL_ENTRY,
        })
    );

    let table = set.table(hart(0));
    let entries = table.entries();
    assert!(entries[4].is_leaf());
    assert_eq!(entries[512].address(), PhysAddr::new(load));
    assert_eq!(entries[1023].address(), PhysAddr::new(load + 511 * 0x20_0000));
}
