//! The hardware a hart boots on.
//!
//! The bootstrap never touches a CSR directly, it goes through [`Machine`].
//! On `riscv64` the [`Riscv`] machine issues the real instructions, the tests
//! substitute a machine that records what would have happened.

use crate::{addr::VirtAddr, layout::HartId};
use hartboot_riscv::registers::satp::Satp;

/// The forwarding stubs a trap can be delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapStub {
    /// Forwards every trap to the external panic handler.
    Panic,
    /// Hands the context pointer in `sscratch` to the external wake-up handler.
    HartEntry,
    /// Parks the hart for good. Only used as the machine-mode trap vector.
    Halt,
}

/// Operations the boot sequence needs from the hart it runs on.
pub trait Machine {
    /// The address the image is executing from, observed relative to the
    /// program counter.
    fn load_address(&self) -> usize;

    /// The address of `stub` in the image that is executing right now.
    fn stub_address(&self, stub: TrapStub) -> usize;

    /// The link-time, virtual, address of the kernel entry point.
    fn kernel_entry(&self) -> VirtAddr;

    /// Point the trap vector at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must hold code that is able to handle a trap.
    unsafe fn set_trap_vector(&mut self, addr: usize);

    /// Store `value` in the supervisor scratch register.
    ///
    /// # Safety
    ///
    /// Anything that reads the scratch register has to agree on what it holds.
    unsafe fn set_scratch(&mut self, value: usize);

    /// Let supervisor software interrupts through to the trap vector.
    ///
    /// # Safety
    ///
    /// The trap vector must be ready to take the interrupt.
    unsafe fn enable_wake_interrupt(&mut self);

    /// Install the root of address translation. Doesn't flush anything.
    ///
    /// # Safety
    ///
    /// The table `root` points at has to map the code currently executing.
    unsafe fn set_translation_root(&mut self, root: Satp);

    /// Drop every address translation this hart has cached.
    ///
    /// # Safety
    ///
    /// The page tables in effect must be completely written.
    unsafe fn flush_translations(&mut self);

    /// Switch to the stack at `sp` and jump to `entry`, passing `hart` as the
    /// first argument.
    ///
    /// # Safety
    ///
    /// Both addresses must be mapped by the active translation.
    unsafe fn jump(&mut self, hart: HartId, sp: VirtAddr, entry: VirtAddr) -> !;
}

#[cfg(target_arch = "riscv64")]
pub use self::riscv::Riscv;

#[cfg(target_arch = "riscv64")]
mod riscv {
    use super::{Machine, TrapStub};
    use crate::{addr::VirtAddr, layout::HartId};
    use core::arch::asm;
    use hartboot_riscv::{
        asm as insn, pc_relative,
        registers::{satp, sie, sscratch, sstatus, stvec, SIE_SSIE, SSTATUS_SIE},
    };

    extern "C" {
        /// A `.dword` holding the link-time address of the kernel entry.
        static __hartboot_kernel_entry: usize;
    }

    /// The hart this code executes on.
    pub struct Riscv {
        _priv: (),
    }

    impl Riscv {
        /// # Safety
        ///
        /// Only one `Riscv` may exist per hart at a time.
        pub const unsafe fn new() -> Self {
            Self { _priv: () }
        }
    }

    impl Machine for Riscv {
        #[inline(always)]
        fn load_address(&self) -> usize {
            insn::image_base()
        }

        #[inline(always)]
        fn stub_address(&self, stub: TrapStub) -> usize {
            match stub {
                TrapStub::Panic => pc_relative!("__hartboot_panic_stub"),
                TrapStub::HartEntry => pc_relative!("__hartboot_hart_entry_stub"),
                TrapStub::Halt => pc_relative!("__hartboot_halt_stub"),
            }
        }

        #[inline(always)]
        fn kernel_entry(&self) -> VirtAddr {
            // the symbol is found pc-relative, the value it holds is absolute
            VirtAddr::new(unsafe { core::ptr::read_volatile(&__hartboot_kernel_entry) })
        }

        #[inline(always)]
        unsafe fn set_trap_vector(&mut self, addr: usize) {
            stvec::write(addr)
        }

        #[inline(always)]
        unsafe fn set_scratch(&mut self, value: usize) {
            sscratch::write(value)
        }

        #[inline(always)]
        unsafe fn enable_wake_interrupt(&mut self) {
            sie::set(SIE_SSIE);
            sstatus::set(SSTATUS_SIE);
        }

        #[inline(always)]
        unsafe fn set_translation_root(&mut self, root: satp::Satp) {
            satp::write(root)
        }

        #[inline(always)]
        unsafe fn flush_translations(&mut self) {
            insn::sfence_vma_all()
        }

        #[inline(always)]
        unsafe fn jump(&mut self, hart: HartId, sp: VirtAddr, entry: VirtAddr) -> ! {
            asm!(
                "mv sp, {sp}",
                "jr {entry}",
                sp = in(reg) sp.as_usize(),
                entry = in(reg) entry.as_usize(),
                in("a0") hart.get(),
                options(noreturn)
            )
        }
    }
}
