//! Decoding of the causes a trap can be taken for.

use core::fmt;

/// The bit that is set to `1`, inside the `cause` value, if a trap is
/// an interrupt.
pub const INTERRUPT_BIT: usize = 1 << 63;

/// All different kinds of traps a supervisor can observe in `scause`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    SupervisorSoftwareInterrupt,
    SupervisorTimerInterrupt,
    SupervisorExternalInterrupt,

    InstructionAddressMisaligned,
    InstructionAccessFault,
    IllegalInstruction,
    Breakpoint,
    LoadAddressMisaligned,
    LoadAccessFault,
    StoreAddressMisaligned,
    StoreAccessFault,
    UserModeEnvironmentCall,
    SupervisorModeEnvironmentCall,
    InstructionPageFault,
    LoadPageFault,
    StorePageFault,
}

impl Trap {
    /// Converts a raw cause number coming from the `scause` register,
    /// into a [`Trap`].
    ///
    /// Returns `None` for reserved and platform specific causes.
    pub fn from_cause(cause: usize) -> Option<Self> {
        use Trap::*;

        const EXCEPTIONS: [Option<Trap>; 16] = [
            Some(InstructionAddressMisaligned),
            Some(InstructionAccessFault),
            Some(IllegalInstruction),
            Some(Breakpoint),
            Some(LoadAddressMisaligned),
            Some(LoadAccessFault),
            Some(StoreAddressMisaligned),
            Some(StoreAccessFault),
            Some(UserModeEnvironmentCall),
            Some(SupervisorModeEnvironmentCall),
            None,
            None,
            Some(InstructionPageFault),
            Some(LoadPageFault),
            None,
            Some(StorePageFault),
        ];

        if cause & INTERRUPT_BIT != 0 {
            match cause & !INTERRUPT_BIT {
                1 => Some(SupervisorSoftwareInterrupt),
                5 => Some(SupervisorTimerInterrupt),
                9 => Some(SupervisorExternalInterrupt),
                _ => None,
            }
        } else {
            EXCEPTIONS.get(cause).copied().flatten()
        }
    }

    /// Check if this trap is an asynchronous interrupt.
    pub fn is_interrupt(self) -> bool {
        matches!(
            self,
            Trap::SupervisorSoftwareInterrupt
                | Trap::SupervisorTimerInterrupt
                | Trap::SupervisorExternalInterrupt
        )
    }

    /// Check if this trap was raised by the address translation hardware.
    pub fn is_page_fault(self) -> bool {
        matches!(
            self,
            Trap::InstructionPageFault | Trap::LoadPageFault | Trap::StorePageFault
        )
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trap::SupervisorSoftwareInterrupt => "supervisor software interrupt",
            Trap::SupervisorTimerInterrupt => "supervisor timer interrupt",
            Trap::SupervisorExternalInterrupt => "supervisor external interrupt",
            Trap::InstructionAddressMisaligned => "instruction address misaligned",
            Trap::InstructionAccessFault => "instruction access fault",
            Trap::IllegalInstruction => "illegal instruction",
            Trap::Breakpoint => "breakpoint",
            Trap::LoadAddressMisaligned => "load address misaligned",
            Trap::LoadAccessFault => "load access fault",
            Trap::StoreAddressMisaligned => "store address misaligned",
            Trap::StoreAccessFault => "store access fault",
            Trap::UserModeEnvironmentCall => "environment call from U-mode",
            Trap::SupervisorModeEnvironmentCall => "environment call from S-mode",
            Trap::InstructionPageFault => "instruction page fault",
            Trap::LoadPageFault => "load page fault",
            Trap::StorePageFault => "store page fault",
        };
        f.write_str(name)
    }
}
