//! Machine-mode entry, for harts that start without SBI firmware below them.
//!
//! With the `machine-mode` feature, `_start` hands every hart to
//! `hartboot_machine_start` instead of the supervisor bootstrap. It does the
//! work the firmware would have done, then drops to supervisor mode straight
//! into `hartboot_start`, still on the same stack:
//!
//! 1. point `mtvec` at the halt stub
//! 2. provision the hart's boot page table for the running image
//! 3. delegate the supervisor traps and interrupts
//! 4. expose the counters to supervisor mode
//! 5. keep the hart's physical stack top in `mscratch`
//! 6. open physical memory to supervisor mode through the last PMP entry
//! 7. set `MPP` to supervisor and `mepc` to the supervisor entry, then `mret`

use crate::{
    addr::PhysAddr,
    layout::{HartId, Layout},
    machine::{Machine, TrapStub},
    page::{self, HartTable},
};

/// Exceptions handled in supervisor mode: everything up to the user
/// environment call, and the three page faults.
pub const DELEGATED_EXCEPTIONS: usize = 0xb1ff;

/// Supervisor software, timer and external interrupts.
pub const DELEGATED_INTERRUPTS: usize = 0x222;

/// Every counter `mcounteren` can expose.
pub const EXPOSED_COUNTERS: usize = 0xffff_ffff;

/// The machine-mode half of a hart.
pub trait Firmware: Machine {
    /// The address of `hartboot_start` in the running image.
    fn supervisor_entry(&self) -> usize;

    /// Point the machine-mode trap vector at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must hold code that is able to handle a trap.
    unsafe fn set_machine_trap_vector(&mut self, addr: usize);

    /// Hand the given exceptions and interrupts to supervisor mode.
    ///
    /// # Safety
    ///
    /// Supervisor mode has to install a trap vector before any of them fire.
    unsafe fn delegate_traps(&mut self, exceptions: usize, interrupts: usize);

    /// Let supervisor mode read the counters in `mask`.
    ///
    /// # Safety
    ///
    /// Changes what supervisor code can observe.
    unsafe fn expose_counters(&mut self, mask: usize);

    /// Store `value` in the machine scratch register.
    ///
    /// # Safety
    ///
    /// Machine-mode trap handlers have to agree on what it holds.
    unsafe fn set_machine_scratch(&mut self, value: usize);

    /// Grant supervisor mode read, write and execute access to all of
    /// physical memory.
    ///
    /// # Safety
    ///
    /// Nothing below supervisor mode may rely on memory protection anymore.
    unsafe fn open_physical_memory(&mut self);

    /// Make `mret` land in supervisor mode at `entry`.
    ///
    /// # Safety
    ///
    /// `entry` must be code that runs in supervisor mode.
    unsafe fn set_supervisor_return(&mut self, entry: usize);

    /// Execute `mret`, passing `hart` as the first argument.
    ///
    /// # Safety
    ///
    /// [`Firmware::set_supervisor_return`] has to be called first.
    unsafe fn return_to_supervisor(&mut self, hart: HartId) -> !;
}

/// Take `hart` from machine mode into the supervisor bootstrap.
///
/// # Safety
///
/// `firmware` must be the hart identified by `hart`, running in machine mode
/// on its stack, and `table` has to be its boot page table. The table must
/// not be touched until the supervisor bootstrap claims it again.
pub unsafe fn enter_supervisor<F: Firmware>(
    firmware: &mut F,
    layout: &Layout,
    hart: HartId,
    table: HartTable<'_>,
) -> ! {
    let halt = firmware.stub_address(TrapStub::Halt);
    firmware.set_machine_trap_vector(halt);

    {
        let mut table = table;
        let running_at = PhysAddr::new(firmware.load_address());
        page::provision(&mut table, layout, running_at);
    }

    firmware.delegate_traps(DELEGATED_EXCEPTIONS, DELEGATED_INTERRUPTS);
    firmware.expose_counters(EXPOSED_COUNTERS);
    firmware.set_machine_scratch(layout.stack_base(hart).as_usize());
    firmware.open_physical_memory();

    let entry = firmware.supervisor_entry();
    firmware.set_supervisor_return(entry);
    firmware.return_to_supervisor(hart)
}

/// Rust half of the entry point in machine mode, called by `_start` on the
/// hart's physical stack.
#[cfg(all(target_arch = "riscv64", feature = "virt", feature = "machine-mode"))]
#[no_mangle]
#[link_section = ".text.init"]
pub(crate) unsafe extern "C" fn hartboot_machine_start(hart_id: usize) -> ! {
    use crate::{layout, machine::Riscv, page::BootPageTableSet};

    let layout = &layout::ACTIVE;
    let hart = match layout.hart(hart_id) {
        Some(hart) => hart,
        None => hartboot_riscv::asm::wait_forever(),
    };

    let mut machine = Riscv::new();
    let table = BootPageTableSet::from_layout(layout).claim(hart);
    enter_supervisor(&mut machine, layout, hart, table)
}

#[cfg(target_arch = "riscv64")]
mod riscv {
    use super::Firmware;
    use crate::{layout::HartId, machine::Riscv};
    use core::arch::asm;
    use hartboot_riscv::{
        pc_relative,
        registers::{
            mcounteren, medeleg, mepc, mideleg, mscratch, mstatus, mtvec, pmp, pmpaddr7, pmpcfg0,
            MSTATUS_MPP, MSTATUS_MPP_SUPERVISOR,
        },
    };

    impl Firmware for Riscv {
        #[inline(always)]
        fn supervisor_entry(&self) -> usize {
            pc_relative!("hartboot_start")
        }

        #[inline(always)]
        unsafe fn set_machine_trap_vector(&mut self, addr: usize) {
            mtvec::write(addr)
        }

        #[inline(always)]
        unsafe fn delegate_traps(&mut self, exceptions: usize, interrupts: usize) {
            medeleg::write(exceptions);
            mideleg::write(interrupts);
        }

        #[inline(always)]
        unsafe fn expose_counters(&mut self, mask: usize) {
            mcounteren::write(mask)
        }

        #[inline(always)]
        unsafe fn set_machine_scratch(&mut self, value: usize) {
            mscratch::write(value)
        }

        #[inline(always)]
        unsafe fn open_physical_memory(&mut self) {
            // an all-ones NAPOT address covers the whole address space
            pmpaddr7::write(usize::MAX);
            let cfg = pmp::READ | pmp::WRITE | pmp::EXEC | pmp::NAPOT;
            pmpcfg0::set(cfg << pmp::cfg0_shift(7));
        }

        #[inline(always)]
        unsafe fn set_supervisor_return(&mut self, entry: usize) {
            mstatus::clear(MSTATUS_MPP);
            mstatus::set(MSTATUS_MPP_SUPERVISOR);
            mepc::write(entry);
        }

        #[inline(always)]
        unsafe fn return_to_supervisor(&mut self, hart: HartId) -> ! {
            asm!("mret", in("a0") hart.get(), options(noreturn))
        }
    }
}
