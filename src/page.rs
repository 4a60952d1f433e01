//! The boot page tables and their relocation.
//!
//! The loader leaves one table per hart in a contiguous region. Each table
//! maps the shared kernel image with a run of leaves that point at the
//! physical address the image was *built* for. Before a hart turns on paging
//! it shifts the leaves of its own table by the distance the image was
//! actually moved, so the virtual image window ends up over the right frames.

pub mod sv39;

pub use sv39::{Entry, Flags};

use crate::{
    addr::PhysAddr,
    layout::{HartId, Layout, RelocationShift},
};
use core::{marker::PhantomData, ops::Range, ptr::NonNull, slice};

/// The boot page tables of all harts.
///
/// The set as a whole is never handed to a single hart. Access goes through
/// [`HartTable`]s, which are either split off safely or claimed by the owning
/// hart on real hardware.
pub struct BootPageTableSet<'a> {
    base: NonNull<Entry>,
    harts: usize,
    per_table: usize,
    _tables: PhantomData<&'a mut [Entry]>,
}

// SAFETY: the only shared-reference operation is `claim`, whose caller
// guarantees every table is claimed by exactly one hart.
unsafe impl Send for BootPageTableSet<'_> {}
unsafe impl Sync for BootPageTableSet<'_> {}

impl<'a> BootPageTableSet<'a> {
    /// Treat `entries` as the tables of all harts of `layout`, in hart order.
    ///
    /// # Panics
    ///
    /// If `entries` doesn't hold exactly one table per hart.
    pub fn new(entries: &'a mut [Entry], layout: &Layout) -> Self {
        assert_eq!(
            entries.len(),
            layout.max_harts * layout.entries_per_table,
            "boot page tables don't match the layout"
        );

        Self {
            base: NonNull::from(entries).cast(),
            harts: layout.max_harts,
            per_table: layout.entries_per_table,
            _tables: PhantomData,
        }
    }

    /// The tables the loader provisioned at the physical addresses of `layout`.
    ///
    /// # Safety
    ///
    /// The table region of `layout` must be mapped, writable and not used
    /// for anything else while the returned set is alive.
    pub unsafe fn from_layout(layout: &Layout) -> BootPageTableSet<'static> {
        BootPageTableSet {
            base: NonNull::new_unchecked(layout.table_base.as_ptr()),
            harts: layout.max_harts,
            per_table: layout.entries_per_table,
            _tables: PhantomData,
        }
    }

    /// Number of tables in this set.
    pub fn len(&self) -> usize {
        self.harts
    }

    /// Check if this set holds no tables at all.
    pub fn is_empty(&self) -> bool {
        self.harts == 0
    }

    /// Split the set into one table per hart.
    pub fn split(&mut self) -> impl Iterator<Item = HartTable<'_>> + '_ {
        let (base, per_table) = (self.base, self.per_table);
        (0..self.harts).map(move |id| {
            // SAFETY: every index is yielded once and the tables don't overlap
            unsafe { HartTable::from_raw(base, per_table, HartId::from_raw(id)) }
        })
    }

    /// Borrow the table of a single hart.
    pub fn table(&mut self, hart: HartId) -> HartTable<'_> {
        assert!(hart.get() < self.harts, "hart {} has no boot page table", hart);
        // SAFETY: the set is borrowed mutably for the lifetime of the table
        unsafe { HartTable::from_raw(self.base, self.per_table, hart) }
    }

    /// Take the table of `hart`, without borrowing the set.
    ///
    /// This is how a hart gets to its table while other harts are running
    /// the same code on theirs.
    ///
    /// # Safety
    ///
    /// Must be called by the hart itself, and never while another table of
    /// the same hart is alive, claimed or borrowed through the safe methods.
    pub unsafe fn claim(&self, hart: HartId) -> HartTable<'a> {
        assert!(hart.get() < self.harts, "hart {} has no boot page table", hart);
        HartTable::from_raw(self.base, self.per_table, hart)
    }
}

/// Exclusive access to the boot page table of one hart.
pub struct HartTable<'a> {
    hart: HartId,
    entries: &'a mut [Entry],
}

impl<'a> HartTable<'a> {
    unsafe fn from_raw(base: NonNull<Entry>, per_table: usize, hart: HartId) -> Self {
        let start = base.as_ptr().add(hart.get() * per_table);
        Self {
            hart,
            entries: slice::from_raw_parts_mut(start, per_table),
        }
    }

    /// The hart that owns this table.
    pub fn hart(&self) -> HartId {
        self.hart
    }

    /// All entries of this table.
    pub fn entries(&self) -> &[Entry] {
        self.entries
    }

    /// Shift the shared kernel mapping of this table by `shift`.
    ///
    /// Consumes the table: shifting the same entries twice moves the image
    /// window twice as far and breaks the mapping.
    pub fn relocate(self, layout: &Layout, shift: RelocationShift) -> RelocatedTable<'a> {
        let frames = shift.frames(layout.granule_shift);
        relocate(self.entries, layout.patch_range(), frames);

        RelocatedTable {
            hart: self.hart,
            entries: self.entries,
        }
    }
}

/// A boot page table whose shared mapping has been moved to the image's
/// real location. It can be inspected, but never relocated again.
pub struct RelocatedTable<'a> {
    hart: HartId,
    entries: &'a [Entry],
}

impl RelocatedTable<'_> {
    /// The hart that owns this table.
    pub fn hart(&self) -> HartId {
        self.hart
    }

    /// All entries of this table.
    pub fn entries(&self) -> &[Entry] {
        self.entries
    }
}

/// Add `frames` to the frame number of every entry in `range`.
///
/// Flag bits are left alone. An empty range leaves the table untouched.
pub fn relocate(entries: &mut [Entry], range: Range<usize>, frames: u64) {
    for entry in &mut entries[range] {
        *entry = entry.relocate(frames);
    }
}

/// Write the boot page table the loader hands to `table`'s hart, for an
/// image that executes from `running_at`.
///
/// - `[0, 1 GiB)` is identity mapped for MMIO.
/// - The gigabytes around the build address and around `running_at` are
///   identity mapped. The first holds the stacks and the tables, the second
///   the code and the trap vector the hart uses right after it turns on
///   paging.
/// - The root slot of the virtual image window points at the page holding the
///   shared range, and the shared range maps consecutive leaves starting at
///   the build address. The bootstrap moves them to `running_at`.
///
/// # Panics
///
/// If the shared range is not inside a single page after the root page, or
/// the image can't be identity mapped.
pub fn provision(table: &mut HartTable<'_>, layout: &Layout, running_at: PhysAddr) {
    use sv39::{ENTRIES_PER_PAGE, GIGAPAGE_SHIFT, IDENTITY_LIMIT, PAGE_SIZE};

    let page = layout.patch_start / ENTRIES_PER_PAGE;
    assert!(
        page > 0 && layout.patch_end <= (page + 1) * ENTRIES_PER_PAGE,
        "the shared range must fill a page after the root table"
    );

    let entries = &mut *table.entries;
    entries.iter_mut().for_each(|e| *e = Entry::INVALID);

    entries[0] = Entry::leaf(PhysAddr::new(0), Flags::KERNEL_RWX);

    for addr in &[layout.phys_load, running_at] {
        assert!(
            addr.as_usize() < IDENTITY_LIMIT,
            "{} can't be identity mapped",
            addr
        );

        let gigapage = addr.as_usize() >> GIGAPAGE_SHIFT;
        entries[gigapage] = Entry::leaf(PhysAddr::new(gigapage << GIGAPAGE_SHIFT), Flags::KERNEL_RWX);
    }

    let window = (layout.virt_load().as_usize() >> GIGAPAGE_SHIFT) % ENTRIES_PER_PAGE;
    let leaves = layout.table_base(table.hart).offset(page * PAGE_SIZE);
    entries[window] = Entry::table(leaves);

    let first = layout.patch_start % ENTRIES_PER_PAGE;
    for (idx, entry) in entries[layout.patch_range()].iter_mut().enumerate() {
        let offset = (first + idx) << layout.granule_shift;
        *entry = Entry::leaf(layout.phys_load.offset(offset), Flags::KERNEL_RWX);
    }
}
