//! The console harts print to once they run translated.
//!
//! This module also contains print macros.

use crate::drivers::ns16550::Uart;
use core::fmt;
use spin::{Mutex, MutexGuard};

static CONSOLE: Mutex<Console> = Mutex::new(Console(None));

/// Console device that can be used inside a static context.
///
/// Writes are dropped until [`init`] was called.
pub struct Console(Option<Uart>);

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match self.0 {
            Some(ref mut uart) => uart.write_str(s),
            None => Ok(()),
        }
    }
}

/// Initialize the global console with the ns16550a at `base`.
///
/// # Safety
///
/// `base` must be the virtual address of an ns16550a, mapped for every hart
/// that prints.
pub unsafe fn init(base: usize) {
    let mut uart = Uart::new(base as *mut u8);
    uart.init();
    CONSOLE.lock().0 = Some(uart);
}

/// Lock the console and return a guard that can write to the console.
pub fn lock() -> MutexGuard<'static, Console> {
    CONSOLE.lock()
}

/// Release the console lock, whoever holds it.
///
/// # Safety
///
/// Only meant for the panic path: the hart that held the lock must never
/// touch the console again.
pub unsafe fn force_unlock() {
    CONSOLE.force_unlock()
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::console::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    use fmt::Write;
    let _ = lock().write_fmt(args);
}
