//! RISC-V architecture specific components used while bringing up a hart.
//!
//! Everything that touches a CSR or executes a privileged instruction only
//! exists when compiling for `riscv64`. The encodings (`satp`, trap causes,
//! bit fields) are plain data and available everywhere, which is what the
//! host-side tests rely on.
#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![cfg_attr(not(test), no_std)]

mod bitfield;
pub use bitfield::Field;

#[cfg(target_arch = "riscv64")]
pub mod asm;
pub mod registers;
pub mod trap;
