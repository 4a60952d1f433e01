//! Safe wrappers around some assembly instructions.

use core::arch::asm;

/// Read the real time clock.
#[inline]
pub fn rdtime() -> usize {
    let x: usize;
    unsafe { asm!("rdtime {}", out(reg) x, options(nomem, nostack)) };
    x
}

/// Stall the hart until an interrupt might need servicing.
#[inline]
pub fn wfi() {
    unsafe { asm!("wfi", options(nomem, nostack)) }
}

/// Loop forever.
#[inline]
pub fn wait_forever() -> ! {
    loop {
        wfi()
    }
}

/// Flush every address translation cached by this hart.
///
/// # Safety
///
/// Must only be issued after the page tables that are now in effect have
/// been completely written.
#[inline(always)]
pub unsafe fn sfence_vma_all() {
    asm!("sfence.vma zero, zero", options(nostack));
}

/// Returns the address the image is executing from right now.
///
/// The address is computed relative to the program counter (`lla`), so before
/// paging it is the physical address the firmware loaded the image to, not the
/// address the image was linked at.
#[inline(always)]
pub fn image_base() -> usize {
    let base: usize;
    unsafe {
        asm!("lla {}, __image_start", out(reg) base, options(nomem, nostack));
    }
    base
}

/// Returns the address of `symbol`'s runtime copy, computed relative to the
/// program counter.
#[macro_export]
macro_rules! pc_relative {
    ($symbol:literal) => {{
        let addr: usize;
        #[allow(unused_unsafe)]
        unsafe {
            ::core::arch::asm!(
                ::core::concat!("lla {}, ", $symbol),
                out(reg) addr,
                options(nomem, nostack)
            );
        }
        addr
    }};
}
