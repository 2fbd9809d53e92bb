/// Verilog-style bit slicing on unsigned integers.
pub trait BitSlice: Sized + Copy {
    /// Bits `[msb:lsb]`, inclusive, shifted down to bit 0.
    fn sel(self, msb: u32, lsb: u32) -> Self;
}

macro_rules! impl_bit_slice {
    ($($t:ty),*) => {
        $(
            impl BitSlice for $t {
                fn sel(self, msb: u32, lsb: u32) -> Self {
                    assert!(msb >= lsb && msb < <$t>::BITS, "bad slice [{}:{}]", msb, lsb);
                    let width = msb - lsb + 1;
                    let shifted = self >> lsb;
                    if width == <$t>::BITS {
                        shifted
                    } else {
                        shifted & ((1 << width) - 1)
                    }
                }
            }
        )*
    };
}

impl_bit_slice!(u8, u16, u32, u64);

/// Mask with the low `width` bits set.
pub fn low_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}
