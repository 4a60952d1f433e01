//! The Sv39 page table entry format.

use crate::addr::PhysAddr;
use bitflags::bitflags;
use core::fmt;
use hartboot_riscv::Field;

/// log2 of the size of a page frame.
pub const FRAME_SHIFT: u32 = 12;
/// log2 of the size of a megapage leaf.
pub const MEGAPAGE_SHIFT: u32 = 21;
/// log2 of the size of a gigapage leaf.
pub const GIGAPAGE_SHIFT: u32 = 30;

/// Physical memory below this address can be identity mapped: the virtual
/// address has to be in the lower half of the 39 bit address space.
pub const IDENTITY_LIMIT: usize = 1 << 38;

/// Size of a single page, and of a single page table.
pub const PAGE_SIZE: usize = 1 << FRAME_SHIFT;
/// Size of one entry in bytes.
pub const ENTRY_SIZE: usize = core::mem::size_of::<Entry>();
/// Entries inside a single page sized table.
pub const ENTRIES_PER_PAGE: usize = PAGE_SIZE / ENTRY_SIZE;

/// The physical page number inside an entry.
pub const PPN: Field = Field::new(10, 44);

bitflags! {
    /// The low bits of an entry that describe it, rather than point somewhere.
    pub struct Flags: u64 {
        const VALID = 1 << 0;
        const READ = 1 << 1;
        const WRITE = 1 << 2;
        const EXEC = 1 << 3;
        const USER = 1 << 4;
        const GLOBAL = 1 << 5;
        const ACCESSED = 1 << 6;
        const DIRTY = 1 << 7;
        /// Reserved for software.
        const RSW = 0b11 << 8;

        /// A kernel leaf the hardware never has to update.
        const KERNEL_RWX = Self::VALID.bits | Self::READ.bits | Self::WRITE.bits
            | Self::EXEC.bits | Self::ACCESSED.bits | Self::DIRTY.bits;
    }
}

/// Number of bits the frame delta of a relocation has to be moved to the
/// left to line up with [`PPN`], when only whole leaves of
/// `1 << granule_shift` bytes are kept.
///
/// For megapages this is `19`: the shift is truncated with `>> 21` and the
/// result lands at bit `21 - 12 + 10` of the entry.
pub const fn realign_shift(granule_shift: u32) -> u32 {
    granule_shift - FRAME_SHIFT + PPN.offset
}

/// Converts a byte delta into a frame-number delta, dropping everything
/// below the leaf granule.
pub const fn relocation_frames(shift: usize, granule_shift: u32) -> u64 {
    ((shift as u64) >> granule_shift) << (granule_shift - FRAME_SHIFT)
}

/// A page-table entry.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Entry(u64);

impl Entry {
    /// An entry that maps nothing.
    pub const INVALID: Entry = Entry(0);

    /// Wrap raw entry bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw bits of this entry.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// A leaf mapping to the frame at `addr`.
    pub const fn leaf(addr: PhysAddr, flags: Flags) -> Self {
        Self(PPN.set(flags.bits(), (addr.as_usize() >> FRAME_SHIFT) as u64))
    }

    /// A pointer to the next level table at `addr`.
    pub const fn table(addr: PhysAddr) -> Self {
        Self::leaf(addr, Flags::VALID)
    }

    /// The frame number this entry refers to.
    #[inline]
    pub const fn frame(self) -> u64 {
        PPN.get(self.0)
    }

    /// The physical address this entry refers to.
    #[inline]
    pub const fn address(self) -> PhysAddr {
        PhysAddr::new((self.frame() << FRAME_SHIFT) as usize)
    }

    /// The flag bits of this entry.
    #[inline]
    pub const fn flags(self) -> Flags {
        Flags::from_bits_truncate(self.0)
    }

    /// Check the `V` bit of this PTE.
    #[inline]
    pub const fn valid(self) -> bool {
        self.flags().contains(Flags::VALID)
    }

    /// Check if this PTE is a leaf, meaning any of `R`, `W` or `X` is set.
    #[inline]
    pub const fn is_leaf(self) -> bool {
        self.flags().intersects(Flags::from_bits_truncate(
            Flags::READ.bits() | Flags::WRITE.bits() | Flags::EXEC.bits(),
        ))
    }

    /// Move the frame this entry refers to by `frames`.
    ///
    /// Only the frame number changes, and it wraps inside its field. Every
    /// other bit of the entry is kept as is.
    #[inline]
    pub const fn relocate(self, frames: u64) -> Self {
        Self(PPN.set(self.0, self.frame().wrapping_add(frames)))
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("address", &self.address())
            .field("flags", &self.flags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realign_matches_the_frame_field() {
        assert_eq!(realign_shift(MEGAPAGE_SHIFT), 19);
        assert_eq!(realign_shift(FRAME_SHIFT), PPN.offset);

        // (shift >> 21) << 19 is the same as moving whole megapages into the PPN field
        let shift = 0x4020_0000usize;
        let raw = ((shift >> 21) << realign_shift(MEGAPAGE_SHIFT)) as u64;
        assert_eq!(raw, relocation_frames(shift, MEGAPAGE_SHIFT) << PPN.offset);
    }

    #[test]
    fn frames_of_an_aligned_shift() {
        assert_eq!(relocation_frames(0x4000_0000, MEGAPAGE_SHIFT), 0x4000_0000 >> 12);
        assert_eq!(relocation_frames(0x4000_0000 + 0x1234, MEGAPAGE_SHIFT), 0x4000_0000 >> 12);
    }

    #[test]
    fn leaf_layout() {
        let entry = Entry::leaf(PhysAddr::new(0x8000_0000), Flags::KERNEL_RWX);

        assert_eq!(entry.bits(), 0x2000_0000 | 0xcf);
        assert_eq!(entry.address(), PhysAddr::new(0x8000_0000));
        assert!(entry.valid());
        assert!(entry.is_leaf());
    }

    #[test]
    fn table_pointer_is_not_a_leaf() {
        let entry = Entry::table(PhysAddr::new(0x8020_1000));
        assert!(entry.valid());
        assert!(!entry.is_leaf());
        assert_eq!(entry.bits(), (0x8020_1000 >> 2) | 0x01);
    }

    #[test]
    fn relocate_keeps_flags() {
        let flags = Flags::KERNEL_RWX | Flags::GLOBAL | Flags::RSW;
        let entry = Entry::leaf(PhysAddr::new(0x8020_0000), flags);
        let moved = entry.relocate(0x4000_0000 >> FRAME_SHIFT);

        assert_eq!(moved.address(), PhysAddr::new(0xc020_0000));
        assert_eq!(moved.flags(), flags);
        assert_eq!(moved.bits() & !PPN.mask(), entry.bits() & !PPN.mask());
    }

    #[test]
    fn negative_relocation_wraps_inside_the_field() {
        let entry = Entry::leaf(PhysAddr::new(0x8040_0000), Flags::KERNEL_RWX);
        let shift = 0usize.wrapping_sub(0x20_0000);
        let moved = entry.relocate(relocation_frames(shift, MEGAPAGE_SHIFT));

        assert_eq!(moved.address(), PhysAddr::new(0x8020_0000));
        assert_eq!(moved.flags(), Flags::KERNEL_RWX);
        assert_eq!(moved.bits() >> 54, 0);
    }
}
