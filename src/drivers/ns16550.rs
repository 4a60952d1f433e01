//! Driver implementation for the ns16550a Uart circuit.

use core::fmt;
use register::{
    interfaces::{ReadWriteable, Readable, Writeable},
    register_bitfields, register_structs,
    registers::ReadWrite,
};

register_bitfields! {
    u8,

    /// FIFO Control Register
    pub FCR [
        FIFO_ENABLE 0
    ],

    /// Line Control Register
    pub LCR [
        /// Specify the length of a single word in bits.
        WORD_LENGTH OFFSET(0) NUMBITS(2) [
            FIVE = 0b00,
            SIX = 0b01,
            SEVEN = 0b10,
            EIGHT = 0b11
        ]
    ],

    /// The line-status register
    pub LSR [
        TRANSMITTER_EMPTY OFFSET(6) NUMBITS(1) []
    ]
}

register_structs! {
    #[allow(non_snake_case)]
    pub Registers {
        (0x00 => pub DATA: ReadWrite<u8>),
        (0x01 => pub IER: ReadWrite<u8>),
        (0x02 => pub FCR: ReadWrite<u8, FCR::Register>),
        (0x03 => pub LCR: ReadWrite<u8, LCR::Register>),
        (0x04 => _reserved0: ReadWrite<u8>),
        (0x05 => pub LSR: ReadWrite<u8, LSR::Register>),
        (0x06 => @END),
    }
}

/// Transmit-only Uart driver for the ns16550a chip.
///
/// Harts only ever print through it, nothing reads from the console.
pub struct Uart {
    base: *mut Registers,
}

impl Uart {
    /// Create a new Uart device that is mapped at the given address.
    ///
    /// # Safety
    ///
    /// `base` must point at the MMIO block of an ns16550a, mapped in the
    /// address space the driver is used from.
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self {
            base: base as *mut _,
        }
    }

    /// Prepares everything for this Uart driver to work properly.
    pub fn init(&mut self) {
        let registers = unsafe { &*self.base };

        // enable FIFO mode so the messages are sent in order
        registers.FCR.modify(FCR::FIFO_ENABLE::SET);

        // set the word length to 8 bits
        registers.LCR.modify(LCR::WORD_LENGTH::EIGHT);

        // no interrupts, the console is polled
        registers.IER.set(0);
    }

    /// Spins this hart until the data can be send.
    pub fn write(&mut self, x: u8) {
        let registers = unsafe { &*self.base };

        while registers.LSR.read(LSR::TRANSMITTER_EMPTY) == 0 {}
        registers.DATA.set(x);
    }
}

unsafe impl Send for Uart {}

impl fmt::Write for Uart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for x in s.bytes() {
            self.write(x);
        }
        Ok(())
    }
}
