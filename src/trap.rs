//! Trap stubs and the state they forward.
//!
//! Two stubs live in `.text.init`, next to the entry point, so they can be
//! reached through the identity mapping before and after paging is on:
//!
//! - `__hartboot_panic_stub` tail-calls `hartboot_panic()`. It is the trap
//!   vector while a hart boots, every fault ends up there.
//! - `__hartboot_hart_entry_stub` loads `sscratch` into `a0` and tail-calls
//!   `hartboot_wake(ctx: *mut HartContext)`. It becomes the trap vector of a
//!   parked hart after [`arm_wake`].
//!
//! Both targets are provided by the kernel and never return. A third stub,
//! `__hartboot_halt_stub`, spins in `wfi` and serves as the machine-mode trap
//! vector of harts that enter without firmware.

use crate::{
    layout::{HartId, Layout},
    machine::{Machine, TrapStub},
};
use core::fmt;
use hartboot_riscv::trap::Trap;

#[cfg(target_arch = "riscv64")]
core::arch::global_asm!(
    ".pushsection .text.init, \"ax\"",
    ".balign 4",
    ".globl __hartboot_panic_stub",
    "__hartboot_panic_stub:",
    "    tail hartboot_panic",
    ".balign 4",
    ".globl __hartboot_hart_entry_stub",
    "__hartboot_hart_entry_stub:",
    "    csrr a0, sscratch",
    "    tail hartboot_wake",
    ".balign 4",
    ".globl __hartboot_halt_stub",
    "__hartboot_halt_stub:",
    "    wfi",
    "    j __hartboot_halt_stub",
    ".popsection",
);

/// The per-hart record `sscratch` points at while a hart waits to be woken.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HartContext {
    /// Raw id of the hart owning this context.
    pub hart: usize,
    /// Virtual stack pointer the hart resumes with.
    pub stack_top: usize,
    /// Opaque value for the wake-up handler.
    pub arg: usize,
}

impl HartContext {
    /// A context for `hart` that resumes on its boot stack.
    pub fn new(layout: &Layout, hart: HartId, arg: usize) -> Self {
        Self {
            hart: hart.get(),
            stack_top: layout.virtual_stack_base(hart).as_usize(),
            arg,
        }
    }
}

/// Prepare this hart to be woken by a software interrupt.
///
/// Stores `ctx` in `sscratch`, routes traps to the hart entry stub, which
/// hands `ctx` to the kernel's wake-up handler, and then unmasks supervisor
/// software interrupts. Waiting for one is up to the caller.
///
/// # Safety
///
/// Must run on the hart `ctx` belongs to, and `ctx` must stay valid until the
/// hart has been woken.
pub unsafe fn arm_wake<M: Machine>(machine: &mut M, ctx: *mut HartContext) {
    machine.set_scratch(ctx as usize);
    let stub = machine.stub_address(TrapStub::HartEntry);
    machine.set_trap_vector(stub);
    machine.enable_wake_interrupt();
}

/// The trap state a panic handler can recover on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultReport {
    /// Raw `scause`.
    pub cause: usize,
    /// The `sepc` the trap was taken at.
    pub epc: usize,
    /// The faulting address or instruction, from `stval`.
    pub tval: usize,
}

impl FaultReport {
    /// Read the trap registers of this hart.
    #[cfg(target_arch = "riscv64")]
    pub fn capture() -> Self {
        use hartboot_riscv::registers::{scause, sepc, stval};

        Self {
            cause: scause::read(),
            epc: sepc::read(),
            tval: stval::read(),
        }
    }

    /// Decode the cause, if it is a known one.
    pub fn kind(&self) -> Option<Trap> {
        Trap::from_cause(self.cause)
    }

    /// Print this report at error level.
    pub fn log(&self) {
        log::error!("{}", self);
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{}", kind)?,
            None => write!(f, "unknown trap cause {:#x}", self.cause)?,
        }
        write!(f, " at {:#x} (stval {:#x})", self.epc, self.tval)
    }
}
