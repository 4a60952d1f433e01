/// A contiguous run of bits inside a 64 bit register or table entry.
///
/// All operations are `const` so register and page-table layouts can be
/// described, and checked, at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Position of the lowest bit of this field.
    pub offset: u32,
    /// Number of bits this field covers.
    pub width: u32,
}

impl Field {
    /// Create a new field, starting at bit `offset` and spanning `width` bits.
    pub const fn new(offset: u32, width: u32) -> Self {
        assert!(width > 0 && offset + width <= 64, "field does not fit into 64 bits");
        Self { offset, width }
    }

    /// The mask of this field, not shifted to its position.
    #[inline]
    pub const fn max(self) -> u64 {
        if self.width == 64 {
            u64::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// The mask of this field, shifted to its position.
    #[inline]
    pub const fn mask(self) -> u64 {
        self.max() << self.offset
    }

    /// Extract the value of this field out of `bits`.
    #[inline]
    pub const fn get(self, bits: u64) -> u64 {
        (bits >> self.offset) & self.max()
    }

    /// Replace the value of this field inside `bits`.
    ///
    /// Bits of `value` that don't fit into the field are discarded, so this
    /// behaves like a wrapping store.
    #[inline]
    pub const fn set(self, bits: u64, value: u64) -> u64 {
        (bits & !self.mask()) | ((value & self.max()) << self.offset)
    }
}
