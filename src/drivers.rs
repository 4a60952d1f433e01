//! Device drivers needed before the kernel brings up its own.

pub mod ns16550;
