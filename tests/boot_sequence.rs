mod common;

use common::{
    boot, hart, provisioned_tables, provisioned_tables_at, root_of, Event, Recorder,
    KERNEL_ENTRY, LAYOUT, PANIC_STUB,
};
use hartboot::{
    addr::PhysAddr,
    boot::Bootstrap,
    page::{BootPageTableSet, Entry},
};
use std::thread;

const BUILD_ADDRESS: usize = 0x8000_0000;

fn patched(raw: &[Entry], hart: usize) -> &[Entry] {
    let table = &raw[hart * LAYOUT.entries_per_table..][..LAYOUT.entries_per_table];
    &table[LAYOUT.patch_range()]
}

#[test]
fn hart_two_at_the_build_address() {
    let mut raw = provisioned_tables();
    let before = raw.clone();
    let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);
    let mut machine = Recorder::loaded_at(BUILD_ADDRESS);

    boot(&mut machine, hart(2), set.table(hart(2)));

    assert_eq!(
        machine.events,
        vec![
            Event::TrapVector(BUILD_ADDRESS + PANIC_STUB),
            Event::Root(LAYOUT.translation_root(hart(2))),
            Event::Flush,
            Event::Jump {
                hart: 2,
                sp: 0xffff_ffff_c083_0000,
                entry: KERNEL_ENTRY,
            },
        ]
    );
    assert_eq!(raw, before);
}

#[test]
fn translation_root_of_hart_zero() {
    let mut raw = provisioned_tables();
    let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);
    let mut machine = Recorder::loaded_at(BUILD_ADDRESS);

    boot(&mut machine, hart(0), set.table(hart(0)));

    let root = machine.events.iter().find_map(|e| match e {
        Event::Root(root) => Some(root.bits()),
        _ => None,
    });
    assert_eq!(root, Some(0x8000_0000_0008_0200));
}

#[test]
fn moved_image_is_relocated_once() {
    let moved_to = BUILD_ADDRESS + 0x40_0000;
    let mut raw = provisioned_tables();
    let before = raw.clone();

    {
        let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);
        let mut machine = Recorder::loaded_at(moved_to);
        boot(&mut machine, hart(5), set.table(hart(5)));

        assert_eq!(machine.events[0], Event::TrapVector(moved_to + PANIC_STUB));
    }

    for (old, new) in patched(&before, 5).iter().zip(patched(&raw, 5)) {
        assert_eq!(new.frame(), old.frame() + 0x400);
        assert_eq!(new.flags(), old.flags());
    }
    assert_eq!(patched(&raw, 5)[0].address(), PhysAddr::new(moved_to));

    // nobody else's table moved
    for id in (0..LAYOUT.max_harts).filter(|&id| id != 5) {
        assert_eq!(patched(&raw, id), patched(&before, id), "hart {}", id);
    }
}

#[test]
fn image_in_another_gigabyte_stays_reachable() {
    let moved_to = 0xc000_0000;
    let mut raw = provisioned_tables_at(moved_to);
    let mut machine = Recorder::loaded_at(moved_to);

    {
        let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);
        boot(&mut machine, hart(1), set.table(hart(1)));
    }

    // the fetch right after the root is written, and any trap, go through
    // the identity mapping of the gigabyte the image runs from
    let vector = match machine.events[0] {
        Event::TrapVector(vector) => vector,
        ref other => panic!("unexpected first step {:?}", other),
    };
    for addr in &[moved_to, vector] {
        let slot = root_of(&raw, 1)[addr >> 30];
        assert!(slot.valid() && slot.is_leaf(), "{:#x} is unmapped", addr);
        assert_eq!(slot.address(), PhysAddr::new(addr & !0x3fff_ffff));
    }

    // the stacks and tables stay where they were
    assert_eq!(root_of(&raw, 1)[2].address(), PhysAddr::new(0x8000_0000));
    // and the kernel window now ends up over the moved image
    assert_eq!(patched(&raw, 1)[0].address(), PhysAddr::new(moved_to));
}

#[test]
fn every_hart_boots_on_its_own() {
    let moved_to = BUILD_ADDRESS + 0x20_0000;
    let mut raw = provisioned_tables();
    let before = raw.clone();
    let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);

    let mut jumps = thread::scope(|s| {
        let harts = set
            .split()
            .map(|table| {
                s.spawn(move || {
                    let id = table.hart();
                    let mut machine = Recorder::loaded_at(moved_to);
                    boot(&mut machine, id, table);
                    machine.events.pop()
                })
            })
            .collect::<Vec<_>>();

        harts
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });
    jumps.sort_by_key(|jump| match jump {
        Some(Event::Jump { hart, .. }) => *hart,
        _ => usize::MAX,
    });

    for (id, jump) in jumps.into_iter().enumerate() {
        let sp = 0xffff_ffff_c081_0000 + id * 0x1_0000;
        assert_eq!(
            jump,
            Some(Event::Jump {
                hart: id,
                sp,
                entry: KERNEL_ENTRY
            })
        );
    }

    for id in 0..LAYOUT.max_harts {
        for (old, new) in patched(&before, id).iter().zip(patched(&raw, id)) {
            assert_eq!(new.frame(), old.frame() + 0x200, "hart {}", id);
        }
    }
}

#[test]
fn steps_touch_the_machine_in_order() {
    let mut raw = provisioned_tables();
    let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);
    let mut machine = Recorder::loaded_at(BUILD_ADDRESS + 0x60_0000);

    let entered = Bootstrap::enter(&machine, &LAYOUT, hart(3));
    assert_eq!(entered.shift().bytes(), 0x60_0000);
    assert!(machine.events.is_empty());

    let armed = unsafe { entered.install_trap_vector(&mut machine) };
    assert_eq!(machine.events.len(), 1);

    let relocated = armed.relocate(set.table(hart(3)));
    assert_eq!(machine.events.len(), 1);

    let translated = unsafe { relocated.enable_paging(&mut machine) };
    assert_eq!(
        &machine.events[1..],
        &[Event::Root(LAYOUT.translation_root(hart(3))), Event::Flush]
    );

    let trampoline = translated.trampoline(&machine);
    assert_eq!(trampoline.hart(), hart(3));
    assert_eq!(trampoline.sp().as_usize(), 0xffff_ffff_c084_0000);
    assert_eq!(trampoline.entry().as_usize(), KERNEL_ENTRY);
}

#[test]
#[should_panic(expected = "only relocate its own table")]
fn foreign_table_is_refused() {
    let mut raw = provisioned_tables();
    let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);
    let mut machine = Recorder::loaded_at(BUILD_ADDRESS);

    boot(&mut machine, hart(1), set.table(hart(2)));
}

#[test]
fn out_of_range_hart_has_no_slot() {
    assert!(LAYOUT.hart(LAYOUT.max_harts).is_none());
}
