//! Physical and virtual machine addresses.

use core::fmt;

macro_rules! addr_type {
    ($(#[$attr:meta])* $pub:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $pub struct $name(usize);

        impl $name {
            /// Create a new address from its raw value.
            pub const fn new(addr: usize) -> Self {
                Self(addr)
            }

            /// The raw value of this address.
            pub const fn as_usize(self) -> usize {
                self.0
            }

            /// Interpret this address as a pointer to a `T`.
            pub fn as_ptr<T>(self) -> *mut T {
                self.0 as *mut T
            }

            /// Calculates the wrapping offset from this address.
            pub const fn offset(self, off: usize) -> Self {
                Self(self.0.wrapping_add(off))
            }

            /// Check if this address is a multiple of `align`, which must be a
            /// power of two.
            pub const fn is_aligned(self, align: usize) -> bool {
                self.0 & (align - 1) == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }

        impl From<usize> for $name {
            fn from(addr: usize) -> Self {
                Self(addr)
            }
        }

        impl From<$name> for usize {
            fn from(x: $name) -> usize {
                x.0
            }
        }
    };
}

addr_type! {
    /// A physical address.
    pub struct PhysAddr;
}

addr_type! {
    /// A virtual address.
    pub struct VirtAddr;
}

impl PhysAddr {
    /// Translate this address into the virtual window that starts `offset`
    /// bytes above physical memory. The addition wraps, since the window sits
    /// at the very top of the address space.
    pub const fn to_virt(self, offset: usize) -> VirtAddr {
        VirtAddr(self.0.wrapping_add(offset))
    }
}
