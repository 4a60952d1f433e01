//! The memory layout every hart boots into.
//!
//! A [`Layout`] bundles the constants the loader used to provision memory:
//! where the per-hart stacks and boot page tables live, where the image was
//! built to be loaded, and which run of page-table entries maps the shared
//! kernel image. The bootstrap derives everything else from these values, so
//! they have to match the loader exactly.

use crate::{
    addr::{PhysAddr, VirtAddr},
    page::sv39,
    unit::ByteUnit,
};
use core::{fmt, ops::Range};
use displaydoc_lite::displaydoc;
use hartboot_riscv::registers::satp::{Mode, Satp};

/// The layout of the QEMU `virt` machine.
#[cfg(feature = "virt")]
pub const ACTIVE: Layout = Layout::QEMU_VIRT;

#[cfg(feature = "virt")]
const _: () = assert!(ACTIVE.validate().is_ok(), "the active memory layout is invalid");

/// Identifies one hart.
///
/// Can only be obtained through [`Layout::hart`], so every `HartId` is known to
/// have a stack slot and a boot page table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct HartId(usize);

impl HartId {
    pub(crate) const fn from_raw(id: usize) -> Self {
        Self(id)
    }

    /// The raw hart id, as found in `mhartid`.
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for HartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Difference between the address the image is executing from and the
/// physical address it was built for.
///
/// The value wraps, an image loaded below its build address has a "negative"
/// shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationShift(usize);

impl RelocationShift {
    /// A shift that doesn't move anything.
    pub const ZERO: RelocationShift = RelocationShift(0);

    /// The raw byte delta.
    pub const fn bytes(self) -> usize {
        self.0
    }

    /// Converts the byte delta into a delta of frame numbers, keeping only
    /// whole leaves of `1 << granule_shift` bytes.
    pub const fn frames(self, granule_shift: u32) -> u64 {
        sv39::relocation_frames(self.0, granule_shift)
    }
}

displaydoc! {
    /// Reasons a [`Layout`] can't be booted from.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LayoutError {
        /// The layout doesn't provide room for a single hart.
        NoHarts,
        /// The stack stride is zero or not 16 byte aligned.
        InvalidStackStride,
        /// The stack base is not 16 byte aligned.
        MisalignedStackBase,
        /// The page table region is not page aligned.
        MisalignedTableBase,
        /// The table stride doesn't match the number of entries per table.
        TableStrideMismatch,
        /// The patched entry range lies outside of a table.
        InvalidPatchRange,
        /// The load address or virtual offset is not aligned to the leaf granule.
        MisalignedLoadAddress,
        /// The granule is smaller than a page or bigger than a gigapage.
        InvalidGranule,
        /// The stack or table region doesn't fit into the address space.
        Overflow,
        /// The stack region and the page table region overlap.
        OverlappingRegions,
    }
}

/// Constants shared between the loader and the bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Initial stack pointer of hart `0`. Stacks grow down from here.
    pub stack_base: PhysAddr,
    /// Distance between the stacks of two neighbouring harts.
    pub stack_stride: usize,
    /// Physical address of the boot page table of hart `0`.
    pub table_base: PhysAddr,
    /// Distance between the boot page tables of two neighbouring harts.
    pub table_stride: usize,
    /// Number of entries in one hart's boot page table.
    pub entries_per_table: usize,
    /// The physical address the image was built to be loaded at.
    pub phys_load: PhysAddr,
    /// Link-time distance between the virtual and physical image.
    pub virt_offset: usize,
    /// First entry of the shared kernel mapping.
    pub patch_start: usize,
    /// One past the last entry of the shared kernel mapping.
    pub patch_end: usize,
    /// log2 of the size of the leaves inside the shared kernel mapping.
    pub granule_shift: u32,
    /// Number of harts that have a stack and a boot page table.
    pub max_harts: usize,
    /// Translation scheme the boot page tables are written for.
    pub mode: Mode,
}

impl Layout {
    /// QEMU `virt`: the image sits at `0x8000_0000` and is linked at
    /// `0xffff_ffff_c000_0000`; every hart owns a 64 KiB stack and two
    /// pages of Sv39 boot tables, the second of which maps the image with
    /// megapages.
    pub const QEMU_VIRT: Layout = Layout {
        stack_base: PhysAddr::new(0x8081_0000),
        stack_stride: 0x1_0000,
        table_base: PhysAddr::new(0x8020_0000),
        table_stride: 0x2000,
        entries_per_table: 1024,
        phys_load: PhysAddr::new(0x8000_0000),
        virt_offset: 0xffff_ffff_4000_0000,
        patch_start: 512,
        patch_end: 1024,
        granule_shift: sv39::MEGAPAGE_SHIFT,
        max_harts: 16,
        mode: Mode::Sv39,
    };

    /// Look up the hart with the given raw id.
    ///
    /// Returns `None` if this layout has no room for it.
    pub const fn hart(&self, id: usize) -> Option<HartId> {
        if id < self.max_harts {
            Some(HartId(id))
        } else {
            None
        }
    }

    /// Iterate over all harts of this layout.
    pub fn harts(&self) -> impl Iterator<Item = HartId> {
        (0..self.max_harts).map(HartId)
    }

    /// The initial, physical, stack pointer of `hart`.
    pub const fn stack_base(&self, hart: HartId) -> PhysAddr {
        self.stack_base.offset(hart.0 * self.stack_stride)
    }

    /// The bytes `hart` may use as its stack.
    pub const fn stack_region(&self, hart: HartId) -> Range<usize> {
        let top = self.stack_base(hart).as_usize();
        (top - self.stack_stride)..top
    }

    /// The stack pointer `hart` continues with once it runs translated.
    pub const fn virtual_stack_base(&self, hart: HartId) -> VirtAddr {
        self.stack_base(hart).to_virt(self.virt_offset)
    }

    /// Physical address of the boot page table owned by `hart`.
    pub const fn table_base(&self, hart: HartId) -> PhysAddr {
        self.table_base.offset(hart.0 * self.table_stride)
    }

    /// The value `hart` installs into `satp`.
    pub const fn translation_root(&self, hart: HartId) -> Satp {
        Satp {
            mode: self.mode,
            asid: 0,
            root_table: self.table_base(hart).as_usize() as u64,
        }
    }

    /// The virtual address the image was linked at.
    pub const fn virt_load(&self) -> VirtAddr {
        self.phys_load.to_virt(self.virt_offset)
    }

    /// Compute how far the image was moved away from [`Layout::phys_load`],
    /// given the address it is observed to run at.
    pub const fn relocation_shift(&self, running_at: PhysAddr) -> RelocationShift {
        RelocationShift(running_at.as_usize().wrapping_sub(self.phys_load.as_usize()))
    }

    /// The entries of each hart's table that map the shared kernel image.
    pub const fn patch_range(&self) -> Range<usize> {
        self.patch_start..self.patch_end
    }

    /// Check that this layout is self consistent.
    ///
    /// The active layout is checked at compile time.
    pub const fn validate(&self) -> Result<(), LayoutError> {
        if self.max_harts == 0 {
            return Err(LayoutError::NoHarts);
        }
        if self.stack_stride == 0 || self.stack_stride % 16 != 0 {
            return Err(LayoutError::InvalidStackStride);
        }
        if !self.stack_base.is_aligned(16) {
            return Err(LayoutError::MisalignedStackBase);
        }
        if !self.table_base.is_aligned(sv39::PAGE_SIZE) {
            return Err(LayoutError::MisalignedTableBase);
        }
        if self.entries_per_table == 0
            || self.entries_per_table % sv39::ENTRIES_PER_PAGE != 0
            || self.table_stride != self.entries_per_table * sv39::ENTRY_SIZE
        {
            return Err(LayoutError::TableStrideMismatch);
        }
        if self.patch_start > self.patch_end || self.patch_end > self.entries_per_table {
            return Err(LayoutError::InvalidPatchRange);
        }
        if self.granule_shift < sv39::FRAME_SHIFT || self.granule_shift > sv39::GIGAPAGE_SHIFT {
            return Err(LayoutError::InvalidGranule);
        }

        let granule = 1 << self.granule_shift;
        if !self.phys_load.is_aligned(granule) || self.virt_offset & (granule - 1) != 0 {
            return Err(LayoutError::MisalignedLoadAddress);
        }

        let stack_start = match self.stack_base.as_usize().checked_sub(self.stack_stride) {
            Some(start) => start,
            None => return Err(LayoutError::Overflow),
        };
        let stack_end = match (self.max_harts - 1).checked_mul(self.stack_stride) {
            Some(off) => match self.stack_base.as_usize().checked_add(off) {
                Some(end) => end,
                None => return Err(LayoutError::Overflow),
            },
            None => return Err(LayoutError::Overflow),
        };
        let table_start = self.table_base.as_usize();
        let table_end = match self.max_harts.checked_mul(self.table_stride) {
            Some(len) => match table_start.checked_add(len) {
                Some(end) => end,
                None => return Err(LayoutError::Overflow),
            },
            None => return Err(LayoutError::Overflow),
        };

        if stack_start < table_end && table_start < stack_end {
            return Err(LayoutError::OverlappingRegions);
        }

        Ok(())
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "image:  {} -> {} ({:?})",
            self.phys_load,
            self.virt_load(),
            self.mode
        )?;
        writeln!(
            f,
            "stacks: {} + hart * {} ({} harts)",
            self.stack_base,
            ByteUnit(self.stack_stride),
            self.max_harts
        )?;
        write!(
            f,
            "tables: {} + hart * {}, shared entries {}..{} of {}",
            self.table_base,
            ByteUnit(self.table_stride),
            self.patch_start,
            self.patch_end,
            self.entries_per_table
        )
    }
}
