//! Kernel logger on top of the [`console`](crate::console).
//!
//! Every line carries the time since reset, the level and the module it was
//! logged from:
//!
//! ```text
//! [  0.012] Info  hartboot::trap > hart 1 woke up
//! ```

use core::{fmt, time::Duration};
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use owo_colors::OwoColorize;

/// Frequency of the `time` CSR on QEMU `virt`.
#[cfg(feature = "virt")]
pub const TIMEBASE_HZ: u64 = 10_000_000;

struct Logger;

static LOGGER: Logger = Logger;

impl log::Log for Logger {
    #[allow(unused_variables)]
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        #[cfg(any(debug_assertions, feature = "logging"))]
        return true;
        #[cfg(all(not(debug_assertions), not(feature = "logging")))]
        return metadata.level() <= Level::Info;
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            let module = record
                .module_path_static()
                .or_else(|| record.module_path())
                .unwrap_or("<n/a>");

            let mut console = crate::console::lock();
            let _ = write_record(&mut *console, uptime(), record.level(), module, *record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the console logger.
///
/// Must only be called once the hart runs translated.
pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(LevelFilter::Trace);
    Ok(())
}

/// Time since reset.
pub fn uptime() -> Duration {
    #[cfg(all(target_arch = "riscv64", feature = "virt"))]
    {
        let ticks = hartboot_riscv::asm::rdtime() as u64;
        Duration::from_nanos(ticks * (1_000_000_000 / TIMEBASE_HZ))
    }

    #[cfg(not(all(target_arch = "riscv64", feature = "virt")))]
    Duration::from_secs(0)
}

/// Write a single log line.
pub fn write_record<W: fmt::Write>(
    out: &mut W,
    time: Duration,
    level: Level,
    module: &str,
    args: fmt::Arguments<'_>,
) -> fmt::Result {
    write!(
        out,
        "{} ",
        format_args!("[{:>3}.{:03}]", time.as_secs(), time.subsec_millis()).dimmed()
    )?;

    match level {
        Level::Error => write!(out, "{:<5}", "Error".red()),
        Level::Warn => write!(out, "{:<5}", "Warn".yellow()),
        Level::Info => write!(out, "{:<5}", "Info".cyan()),
        Level::Debug => write!(out, "{:<5}", "Debug".magenta()),
        Level::Trace => write!(out, "{:<5}", "Trace".dimmed()),
    }?;

    writeln!(out, " {} > {}", module, args)
}
