//! Access to the CSRs the bootstrap and its collaborators use.
//!
//! The machine-mode registers are only touched when a hart enters without
//! firmware below it.

#[macro_use]
mod macros;

pub mod satp;

csr_mod!(rw, stvec, 0x105);
csr_mod!(rw, sscratch, 0x140);
csr_mod!(r, sepc, 0x141);
csr_mod!(r, scause, 0x142);
csr_mod!(r, stval, 0x143);
csr_mod!(rwsc, sstatus, 0x100);
csr_mod!(rwsc, sie, 0x104);

csr_mod!(rwsc, mstatus, 0x300);
csr_mod!(rw, medeleg, 0x302);
csr_mod!(rw, mideleg, 0x303);
csr_mod!(rw, mtvec, 0x305);
csr_mod!(rw, mcounteren, 0x306);
csr_mod!(rw, mscratch, 0x340);
csr_mod!(rw, mepc, 0x341);
csr_mod!(rwsc, pmpcfg0, 0x3a0);
csr_mod!(rw, pmpaddr7, 0x3b7);

/// `sstatus.SIE`, the global supervisor interrupt enable.
pub const SSTATUS_SIE: usize = 1 << 1;

/// `sie.SSIE`, enables supervisor software interrupts, which is how other
/// harts poke a parked hart.
pub const SIE_SSIE: usize = 1 << 1;

/// `mstatus.MPP`, the privilege level `mret` returns to.
pub const MSTATUS_MPP: usize = 0b11 << 11;
/// `MPP` value selecting supervisor mode.
pub const MSTATUS_MPP_SUPERVISOR: usize = 0b01 << 11;

/// Bits of a single `pmpcfg` entry.
pub mod pmp {
    pub const READ: usize = 1 << 0;
    pub const WRITE: usize = 1 << 1;
    pub const EXEC: usize = 1 << 2;
    /// Naturally aligned power-of-two region.
    pub const NAPOT: usize = 0b11 << 3;

    /// Position of entry `idx` inside `pmpcfg0`.
    pub const fn cfg0_shift(idx: usize) -> usize {
        idx * 8
    }
}
