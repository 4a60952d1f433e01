//! A machine that records what the bootstrap does to it.

#![allow(dead_code)]

use hartboot::{
    addr::{PhysAddr, VirtAddr},
    firmware::Firmware,
    machine::{Machine, TrapStub},
    page::{BootPageTableSet, Entry, HartTable},
    HartId, Layout,
};
use hartboot_riscv::registers::satp::Satp;
use std::panic::{self, AssertUnwindSafe};

pub const LAYOUT: Layout = Layout::QEMU_VIRT;

/// Link-time address of the kernel entry.
pub const KERNEL_ENTRY: usize = 0xffff_ffff_c000_2000;
pub const PANIC_STUB: usize = 0x100;
pub const HART_ENTRY_STUB: usize = 0x120;
pub const HALT_STUB: usize = 0x140;
pub const SUPERVISOR_ENTRY: usize = 0x200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    TrapVector(usize),
    Scratch(usize),
    Root(Satp),
    Flush,
    Jump { hart: usize, sp: usize, entry: usize },
    WakeEnabled,

    MachineTrapVector(usize),
    Delegate { exceptions: usize, interrupts: usize },
    Counters(usize),
    MachineScratch(usize),
    OpenMemory,
    SupervisorReturn(usize),
    Mret { hart: usize },
}

/// Payload of the panic that stands in for a jump that never returns.
pub struct Jumped;

pub struct Recorder {
    pub load_address: usize,
    pub events: Vec<Event>,
}

impl Recorder {
    pub fn loaded_at(load_address: usize) -> Self {
        Self {
            load_address,
            events: Vec::new(),
        }
    }
}

impl Machine for Recorder {
    fn load_address(&self) -> usize {
        self.load_address
    }

    fn stub_address(&self, stub: TrapStub) -> usize {
        match stub {
            TrapStub::Panic => self.load_address + PANIC_STUB,
            TrapStub::HartEntry => self.load_address + HART_ENTRY_STUB,
            TrapStub::Halt => self.load_address + HALT_STUB,
        }
    }

    fn kernel_entry(&self) -> VirtAddr {
        VirtAddr::new(KERNEL_ENTRY)
    }

    unsafe fn set_trap_vector(&mut self, addr: usize) {
        self.events.push(Event::TrapVector(addr));
    }

    unsafe fn set_scratch(&mut self, value: usize) {
        self.events.push(Event::Scratch(value));
    }

    unsafe fn enable_wake_interrupt(&mut self) {
        self.events.push(Event::WakeEnabled);
    }

    unsafe fn set_translation_root(&mut self, root: Satp) {
        self.events.push(Event::Root(root));
    }

    unsafe fn flush_translations(&mut self) {
        self.events.push(Event::Flush);
    }

    unsafe fn jump(&mut self, hart: HartId, sp: VirtAddr, entry: VirtAddr) -> ! {
        // the jump fetches through the new mapping
        let root = self
            .events
            .iter()
            .rposition(|e| matches!(e, Event::Root(_)))
            .expect("jumped without a translation root");
        assert!(
            self.events[root..].contains(&Event::Flush),
            "jumped before flushing stale translations"
        );

        self.events.push(Event::Jump {
            hart: hart.get(),
            sp: sp.as_usize(),
            entry: entry.as_usize(),
        });
        panic::panic_any(Jumped)
    }
}

impl Firmware for Recorder {
    fn supervisor_entry(&self) -> usize {
        self.load_address + SUPERVISOR_ENTRY
    }

    unsafe fn set_machine_trap_vector(&mut self, addr: usize) {
        self.events.push(Event::MachineTrapVector(addr));
    }

    unsafe fn delegate_traps(&mut self, exceptions: usize, interrupts: usize) {
        self.events.push(Event::Delegate {
            exceptions,
            interrupts,
        });
    }

    unsafe fn expose_counters(&mut self, mask: usize) {
        self.events.push(Event::Counters(mask));
    }

    unsafe fn set_machine_scratch(&mut self, value: usize) {
        self.events.push(Event::MachineScratch(value));
    }

    unsafe fn open_physical_memory(&mut self) {
        self.events.push(Event::OpenMemory);
    }

    unsafe fn set_supervisor_return(&mut self, entry: usize) {
        self.events.push(Event::SupervisorReturn(entry));
    }

    unsafe fn return_to_supervisor(&mut self, hart: HartId) -> ! {
        assert!(
            self.events
                .iter()
                .any(|e| matches!(e, Event::SupervisorReturn(_))),
            "mret without a supervisor return address"
        );

        self.events.push(Event::Mret { hart: hart.get() });
        panic::panic_any(Jumped)
    }
}

/// Run `f` until it jumps away for good.
pub fn until_jump(f: impl FnOnce()) {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Err(payload) if payload.is::<Jumped>() => {}
        Err(payload) => panic::resume_unwind(payload),
        Ok(()) => unreachable!("returned instead of jumping"),
    }
}

/// Run the bootstrap until it jumps into the kernel.
pub fn boot(machine: &mut Recorder, hart: HartId, table: HartTable<'_>) {
    until_jump(|| unsafe { hartboot::boot::run(machine, &LAYOUT, hart, table) })
}

/// Run the machine-mode entry until it returns to supervisor mode.
pub fn enter(machine: &mut Recorder, hart: HartId, table: HartTable<'_>) {
    until_jump(|| unsafe {
        hartboot::firmware::enter_supervisor(machine, &LAYOUT, hart, table)
    })
}

/// Boot tables of every hart, provisioned the way the loader does it for an
/// image running at its build address.
pub fn provisioned_tables() -> Vec<Entry> {
    provisioned_tables_at(LAYOUT.phys_load.as_usize())
}

/// Boot tables of every hart, for an image running at `load_address`.
pub fn provisioned_tables_at(load_address: usize) -> Vec<Entry> {
    let mut raw = vec![Entry::INVALID; LAYOUT.max_harts * LAYOUT.entries_per_table];
    let mut set = BootPageTableSet::new(&mut raw, &LAYOUT);
    for mut table in set.split() {
        hartboot::page::provision(&mut table, &LAYOUT, PhysAddr::new(load_address));
    }
    raw
}

/// The root table of `hart` inside a whole set.
pub fn root_of(raw: &[Entry], hart: usize) -> &[Entry] {
    &raw[hart * LAYOUT.entries_per_table..][..512]
}

pub fn hart(id: usize) -> HartId {
    LAYOUT.hart(id).unwrap()
}
