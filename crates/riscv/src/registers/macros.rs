macro_rules! write_csr {
    ($(#[$meta:meta])* pub $number:expr) => {
        write_csr!($number);

        /// Writes the raw value into this CSR.
        ///
        /// # Safety
        ///
        /// Writing a CSR changes how this hart executes, the caller must
        /// uphold the invariants of the register.
        $(#[$meta])*
        #[cfg(target_arch = "riscv64")]
        #[inline(always)]
        pub unsafe fn write(bits: usize) {
            _write(bits)
        }
    };

    ($number:expr) => {
        /// Writes the raw value into this CSR.
        #[cfg(target_arch = "riscv64")]
        #[inline(always)]
        unsafe fn _write(bits: usize) {
            ::core::arch::asm!("csrw {}, {}", const $number, in(reg) bits, options(nostack));
        }
    };
}

macro_rules! read_csr {
    ($(#[$meta:meta])* pub $number:expr) => {
        read_csr!($number);

        /// Read the raw bits out of this CSR.
        $(#[$meta])*
        #[cfg(target_arch = "riscv64")]
        #[inline(always)]
        pub fn read() -> usize {
            unsafe { _read() }
        }
    };

    ($number:expr) => {
        /// Read the raw bits out of a CSR.
        #[cfg(target_arch = "riscv64")]
        #[inline(always)]
        unsafe fn _read() -> usize {
            let bits;
            ::core::arch::asm!("csrr {}, {}", out(reg) bits, const $number, options(nostack));
            bits
        }
    };
}

macro_rules! set_csr {
    ($(#[$meta:meta])* pub $number:expr) => {
        /// Set all bits specified by the mask to one inside this CSR.
        ///
        /// # Safety
        ///
        /// See [`write`].
        $(#[$meta])*
        #[cfg(target_arch = "riscv64")]
        #[inline(always)]
        pub unsafe fn set(mask: usize) {
            ::core::arch::asm!("csrs {}, {}", const $number, in(reg) mask, options(nostack));
        }
    };
}

macro_rules! clear_csr {
    ($(#[$meta:meta])* pub $number:expr) => {
        /// Clear all bits specified by the mask inside this CSR.
        ///
        /// # Safety
        ///
        /// See [`write`].
        $(#[$meta])*
        #[cfg(target_arch = "riscv64")]
        #[inline(always)]
        pub unsafe fn clear(mask: usize) {
            ::core::arch::asm!("csrc {}, {}", const $number, in(reg) mask, options(nostack));
        }
    };
}

macro_rules! csr_mod {
    (rw, $name:ident, $num:expr) => {
        #[doc = concat!("The `", stringify!($name), "` CSR.")]
        pub mod $name {
            read_csr!(
                #[doc = concat!("Reads the raw value from the `", stringify!($name), "` register.")]
                pub $num
            );

            write_csr!(
                #[doc = concat!("Writes the raw value into the `", stringify!($name), "` register.")]
                pub $num
            );
        }
    };

    (rwsc, $name:ident, $num:expr) => {
        #[doc = concat!("The `", stringify!($name), "` CSR.")]
        pub mod $name {
            read_csr!(
                #[doc = concat!("Reads the raw value from the `", stringify!($name), "` register.")]
                pub $num
            );

            write_csr!(
                #[doc = concat!("Writes the raw value into the `", stringify!($name), "` register.")]
                pub $num
            );

            set_csr!(pub $num);
            clear_csr!(pub $num);
        }
    };

    (r, $name:ident, $num:expr) => {
        #[doc = concat!("The `", stringify!($name), "` CSR.")]
        pub mod $name {
            read_csr!(
                #[doc = concat!("Reads the raw value from the `", stringify!($name), "` register.")]
                pub $num
            );
        }
    };
}
