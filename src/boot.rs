//! The per-hart bootstrap.
//!
//! Every hart enters `_start` with its id in `a0`, at whatever physical
//! address the firmware loaded the image to, and leaves through a jump to
//! `hartboot_kmain(hart_id)` at its link-time virtual address, running on its
//! stack in the virtual window:
//!
//! 1. pick this hart's stack (`_start`, in assembly, before Rust can run)
//! 2. measure the relocation shift
//! 3. point the trap vector at the panic stub
//! 4. move the shared mapping of this hart's boot table by the shift
//! 5. install the table and flush stale translations
//! 6. jump to the kernel through the trampoline
//!
//! [`Bootstrap`] encodes steps 2 to 6 as states, so they can only happen in
//! this order. No hart ever waits for another one.
//!
//! Nothing in here may log or panic on purpose: until the trampoline, the
//! hart runs from physical addresses while every vtable and string of the
//! image refers to virtual ones.

use crate::{
    addr::{PhysAddr, VirtAddr},
    layout::{HartId, Layout, RelocationShift},
    machine::{Machine, TrapStub},
    page::HartTable,
};
use core::marker::PhantomData;

#[cfg(all(target_arch = "riscv64", feature = "virt", not(feature = "machine-mode")))]
use self::hartboot_start as rust_entry;
#[cfg(all(target_arch = "riscv64", feature = "virt", feature = "machine-mode"))]
use crate::firmware::hartboot_machine_start as rust_entry;

#[cfg(all(target_arch = "riscv64", feature = "virt"))]
core::arch::global_asm!(
    ".pushsection .text.entry, \"ax\"",
    ".globl _start",
    "_start:",
    "    csrw sie, zero",
    // harts without a stack slot never touch memory
    "    li t0, {max_harts}",
    "    bgeu a0, t0, 2f",
    // sp = stack_base + hart_id * stack_stride
    "    li t0, {stack_stride}",
    "    mul t0, a0, t0",
    "    li sp, {stack_base}",
    "    add sp, sp, t0",
    "    mv tp, a0",
    "    call {rust_entry}",
    "2:",
    "    wfi",
    "    j 2b",
    ".popsection",
    // the link-time address of the kernel entry, read by the trampoline
    ".pushsection .rodata.hartboot, \"a\"",
    ".balign 8",
    ".globl __hartboot_kernel_entry",
    "__hartboot_kernel_entry:",
    "    .dword hartboot_kmain",
    ".popsection",
    max_harts = const crate::layout::ACTIVE.max_harts,
    stack_stride = const crate::layout::ACTIVE.stack_stride,
    stack_base = const crate::layout::ACTIVE.stack_base.as_usize(),
    rust_entry = sym rust_entry,
);

/// Rust half of the entry point, called by `_start` on the hart's physical
/// stack. With the `machine-mode` feature, `mret` lands here instead.
#[cfg(all(target_arch = "riscv64", feature = "virt"))]
#[no_mangle]
#[link_section = ".text.init"]
unsafe extern "C" fn hartboot_start(hart_id: usize) -> ! {
    use crate::{layout, machine::Riscv, page::BootPageTableSet};

    let layout = &layout::ACTIVE;
    let hart = match layout.hart(hart_id) {
        Some(hart) => hart,
        None => hartboot_riscv::asm::wait_forever(),
    };

    let mut machine = Riscv::new();
    let table = BootPageTableSet::from_layout(layout).claim(hart);
    run(&mut machine, layout, hart, table)
}

/// Run the whole bootstrap for `hart`, ending up in the kernel.
///
/// # Safety
///
/// `machine` must be the hart identified by `hart`, running on its stack,
/// and `table` has to be its boot page table as provisioned by the loader
/// and never relocated before.
pub unsafe fn run<M: Machine>(
    machine: &mut M,
    layout: &Layout,
    hart: HartId,
    table: HartTable<'_>,
) -> ! {
    Bootstrap::enter(machine, layout, hart)
        .install_trap_vector(machine)
        .relocate(table)
        .enable_paging(machine)
        .trampoline(machine)
        .jump(machine)
}

/// The hart runs untranslated and nothing has been set up yet.
#[derive(Debug)]
pub enum Entered {}

/// Faults are routed to the panic stub.
#[derive(Debug)]
pub enum Armed {}

/// The shared mapping of the hart's table points at the running image.
#[derive(Debug)]
pub enum Relocated {}

/// Address translation is active and no stale translation is cached.
#[derive(Debug)]
pub enum Translated {}

/// One hart on its way into the virtual address space.
#[derive(Debug)]
pub struct Bootstrap<'l, S> {
    layout: &'l Layout,
    hart: HartId,
    shift: RelocationShift,
    _state: PhantomData<S>,
}

impl<'l, S> Bootstrap<'l, S> {
    fn advance<T>(self) -> Bootstrap<'l, T> {
        Bootstrap {
            layout: self.layout,
            hart: self.hart,
            shift: self.shift,
            _state: PhantomData,
        }
    }

    /// The hart being booted.
    pub fn hart(&self) -> HartId {
        self.hart
    }

    /// How far the image was moved away from its build address.
    pub fn shift(&self) -> RelocationShift {
        self.shift
    }

    /// The layout this hart boots into.
    pub fn layout(&self) -> &'l Layout {
        self.layout
    }
}

impl<'l> Bootstrap<'l, Entered> {
    /// Start booting `hart`, measuring where the image runs from.
    pub fn enter<M: Machine>(machine: &M, layout: &'l Layout, hart: HartId) -> Self {
        let running_at = PhysAddr::new(machine.load_address());

        Bootstrap {
            layout,
            hart,
            shift: layout.relocation_shift(running_at),
            _state: PhantomData,
        }
    }

    /// Route every trap to the panic stub.
    ///
    /// The stub's address is taken from the running image, so it stays valid
    /// through the identity mapping once paging is on.
    ///
    /// # Safety
    ///
    /// `machine` must be the hart being booted.
    pub unsafe fn install_trap_vector<M: Machine>(self, machine: &mut M) -> Bootstrap<'l, Armed> {
        let vector = machine.stub_address(TrapStub::Panic);
        machine.set_trap_vector(vector);
        self.advance()
    }
}

impl<'l> Bootstrap<'l, Armed> {
    /// Move the shared mapping of this hart's boot table to the image.
    ///
    /// # Panics
    ///
    /// If `table` belongs to another hart.
    pub fn relocate(self, table: HartTable<'_>) -> Bootstrap<'l, Relocated> {
        assert_eq!(table.hart(), self.hart, "a hart may only relocate its own table");
        table.relocate(self.layout, self.shift);
        self.advance()
    }
}

impl<'l> Bootstrap<'l, Relocated> {
    /// Install the hart's boot table and flush the translation cache.
    ///
    /// # Safety
    ///
    /// The relocated table has to map the code that is executing and the
    /// trap vector, otherwise the hart faults into the panic stub.
    pub unsafe fn enable_paging<M: Machine>(self, machine: &mut M) -> Bootstrap<'l, Translated> {
        machine.set_translation_root(self.layout.translation_root(self.hart));
        machine.flush_translations();
        self.advance()
    }
}

impl<'l> Bootstrap<'l, Translated> {
    /// Compute the jump into the virtual address space.
    pub fn trampoline<M: Machine>(self, machine: &M) -> Trampoline {
        Trampoline {
            hart: self.hart,
            sp: self.layout.virtual_stack_base(self.hart),
            entry: machine.kernel_entry(),
        }
    }
}

/// The jump from physical into virtual execution.
///
/// Only a [`Bootstrap`] in the [`Translated`] state can produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trampoline {
    hart: HartId,
    sp: VirtAddr,
    entry: VirtAddr,
}

impl Trampoline {
    /// The hart that is going to jump.
    pub fn hart(&self) -> HartId {
        self.hart
    }

    /// The stack pointer the kernel starts with.
    pub fn sp(&self) -> VirtAddr {
        self.sp
    }

    /// The link-time address of the kernel entry.
    pub fn entry(&self) -> VirtAddr {
        self.entry
    }

    /// Cross over. Never returns.
    ///
    /// # Safety
    ///
    /// `machine` must be the hart this trampoline was computed on.
    pub unsafe fn jump<M: Machine>(self, machine: &mut M) -> ! {
        machine.jump(self.hart, self.sp, self.entry)
    }
}
