//! The `satp` CSR.

use crate::Field;

write_csr!(0x180);

const PPN: Field = Field::new(0, 44);
const ASID: Field = Field::new(44, 16);
const MODE: Field = Field::new(60, 4);

/// The paging mode to set inside the satp register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Bare,
    Sv39,
    Sv48,
}

impl Mode {
    /// The value of the `MODE` field that selects this mode.
    pub const fn tag(self) -> u64 {
        match self {
            Mode::Bare => 0,
            Mode::Sv39 => 8,
            Mode::Sv48 => 9,
        }
    }

    /// Decode the `MODE` field, returning `None` for reserved encodings.
    pub const fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(Mode::Bare),
            8 => Some(Mode::Sv39),
            9 => Some(Mode::Sv48),
            _ => None,
        }
    }
}

/// An abstraction around the bitfield of the `satp` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Satp {
    pub mode: Mode,
    pub asid: u16,
    /// Physical address of the root page table. Must be page aligned.
    pub root_table: u64,
}

impl Satp {
    /// Encode this value the way the hardware expects it.
    pub const fn bits(&self) -> u64 {
        let bits = PPN.set(0, self.root_table >> 12);
        let bits = ASID.set(bits, self.asid as u64);
        MODE.set(bits, self.mode.tag())
    }

    /// Decode raw `satp` bits.
    ///
    /// Returns `None` if the mode field holds a reserved value.
    pub const fn from_bits(bits: u64) -> Option<Self> {
        let mode = match Mode::from_tag(MODE.get(bits)) {
            Some(mode) => mode,
            None => return None,
        };

        Some(Satp {
            mode,
            asid: ASID.get(bits) as u16,
            root_table: PPN.get(bits) << 12,
        })
    }
}

/// Write to the `satp` CSR.
///
/// This does not flush any cached translation. The caller has to issue an
/// `sfence.vma` before relying on the new root.
///
/// # Safety
///
/// The root table must describe a mapping for the code that is currently
/// executing, otherwise the next instruction fetch faults.
#[cfg(target_arch = "riscv64")]
#[inline(always)]
pub unsafe fn write(satp: Satp) {
    _write(satp.bits() as usize)
}
