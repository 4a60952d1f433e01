//! Early boot for every hart of a RISC-V machine.
//!
//! Each hart enters at `_start` with its id in `a0`, running from physical
//! memory in supervisor mode. The bootstrap gives it a stack, moves the
//! kernel mapping of its boot page table to wherever the image was really
//! loaded, turns on Sv39 paging and jumps to the kernel at its virtual
//! address. See [`boot`] for the exact sequence.
//!
//! The kernel linked against this crate provides three symbols:
//!
//! - `hartboot_kmain(hart_id: usize) -> !`, entered once per hart after the
//!   relocation, on the hart's stack in the virtual window.
//! - `hartboot_wake(ctx: *mut HartContext) -> !`, entered when a hart armed
//!   with [`trap::arm_wake`] takes a trap.
//! - `hartboot_panic() -> !`, entered for every trap during boot.
//!
//! The image has to be linked with `lds/virt.ld`, and is entered in
//! supervisor mode. With the `machine-mode` feature it is entered in machine
//! mode instead and takes over the firmware's duties, see [`firmware`].
//!
//! # Zeroed `.bss`
//!
//! No hart clears `.bss`: harts never wait for each other, so a hart clearing
//! it could wipe statics another hart already set in the kernel. The ELF
//! loader has to hand the image over with `.bss` (`__bss_start` to
//! `__bss_end`) zeroed, which QEMU's loader does. Until then nothing in this
//! crate reads or writes a static.
#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![cfg_attr(not(test), no_std)]

#[cfg(not(target_pointer_width = "64"))]
compile_error!("hartboot can only run on 64 bit systems");

pub mod addr;
pub mod boot;
pub mod console;
pub mod drivers;
pub mod firmware;
pub mod layout;
pub mod logger;
pub mod machine;
pub mod page;
pub mod trap;
pub mod unit;

pub use layout::{HartId, Layout};
pub use trap::HartContext;
