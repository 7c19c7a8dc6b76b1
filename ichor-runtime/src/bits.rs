//! Bit manipulation primitives.
//!
//! Every primitive is defined for 16, 32 and 64-bit unsigned words. Counts
//! are total functions: the leading and trailing zero count of `0` is the
//! word width. Rotations take the amount modulo the width.

/// Bit primitives over one unsigned word size.
pub trait Bits: Copy {
    /// Width of the word in bits.
    const BITS: u32;

    /// `true` for exactly one set bit; `0` is not a power of two.
    fn is_pow2(self) -> bool;
    fn rotl(self, n: u32) -> Self;
    fn rotr(self, n: u32) -> Self;
    fn clz(self) -> u32;
    fn ctz(self) -> u32;
    /// Whether any byte of the word is zero.
    fn has_zero_byte(self) -> bool;
    fn pop_count(self) -> u32;
    fn byte_swap(self) -> Self;
    /// `1` when an odd number of bits is set.
    fn parity(self) -> u32;
}

macro_rules! impl_bits {
    ($($ty:ty),* $(,)?) => {$(
        impl Bits for $ty {
            const BITS: u32 = <$ty>::BITS;

            #[inline]
            fn is_pow2(self) -> bool {
                self != 0 && self & (self - 1) == 0
            }

            #[inline]
            fn rotl(self, n: u32) -> Self {
                self.rotate_left(n % Self::BITS)
            }

            #[inline]
            fn rotr(self, n: u32) -> Self {
                self.rotate_right(n % Self::BITS)
            }

            #[inline]
            fn clz(self) -> u32 {
                self.leading_zeros()
            }

            #[inline]
            fn ctz(self) -> u32 {
                self.trailing_zeros()
            }

            #[inline]
            fn has_zero_byte(self) -> bool {
                const ONES: $ty = <$ty>::MAX / 0xFF;
                const HIGHS: $ty = ONES << 7;
                self.wrapping_sub(ONES) & !self & HIGHS != 0
            }

            #[inline]
            fn pop_count(self) -> u32 {
                self.count_ones()
            }

            #[inline]
            fn byte_swap(self) -> Self {
                self.swap_bytes()
            }

            #[inline]
            fn parity(self) -> u32 {
                self.count_ones() & 1
            }
        }
    )*};
}

impl_bits!(u16, u32, u64);

pub fn is_power_of_two<T: Bits>(x: T) -> bool {
    x.is_pow2()
}

pub fn rotate_left<T: Bits>(x: T, n: u32) -> T {
    x.rotl(n)
}

pub fn rotate_right<T: Bits>(x: T, n: u32) -> T {
    x.rotr(n)
}

pub fn count_leading_zeros<T: Bits>(x: T) -> u32 {
    x.clz()
}

pub fn count_trailing_zeros<T: Bits>(x: T) -> u32 {
    x.ctz()
}

pub fn has_zero_byte<T: Bits>(x: T) -> bool {
    x.has_zero_byte()
}

pub fn pop_count<T: Bits>(x: T) -> u32 {
    x.pop_count()
}

pub fn byte_swap<T: Bits>(x: T) -> T {
    x.byte_swap()
}

pub fn parity<T: Bits>(x: T) -> u32 {
    x.parity()
}

/// Smallest power of two `>= n`, with `0` and `1` mapping to `1`.
pub fn next_power_of_two(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    let width = usize::BITS - (n - 1).leading_zeros();
    1usize << width
}
