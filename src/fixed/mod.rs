/*!
Saturating fixed-point numbers with a configurable bit layout

A `Fixed<Q>` stores a signed raw integer of `Q::TOTAL_BITS` bits, `Q::FRAC_BITS` of which are fractional.
Every arithmetic result is computed in `i128` at full precision, truncated toward negative infinity onto the
`2^-FRAC_BITS` grid (the default quantization of hardware fixed-point types), and saturated to the representable
range. Nothing ever wraps around.
*/
use num::{Bounded, One, Zero};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::iter::Sum;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

pub mod math;

/// A fixed-point bit layout
pub trait Format: Copy + Clone + Debug + Default + Eq + Ord + Hash + Send + Sync + 'static {
    /// The total number of bits, sign included
    const TOTAL_BITS: u32;
    /// The number of fractional bits
    const FRAC_BITS: u32;
    /// The largest raw value
    const MAX_RAW: i64 = ((1i128 << (Self::TOTAL_BITS - 1)) - 1) as i64;
    /// The smallest raw value
    const MIN_RAW: i64 = (-(1i128 << (Self::TOTAL_BITS - 1))) as i64;
    /// The number of bytes a raw value occupies on disk
    const BYTES: usize = (Self::TOTAL_BITS / 8) as usize;
}

/// 64 bit values with 32 fractional bits
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct I32F32;

impl Format for I32F32 {
    const TOTAL_BITS: u32 = 64;
    const FRAC_BITS: u32 = 32;
}

/// 32 bit values with 16 fractional bits
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct I16F16;

impl Format for I16F16 {
    const TOTAL_BITS: u32 = 32;
    const FRAC_BITS: u32 = 16;
}

/// A saturating fixed-point number in format `Q`
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Fixed<Q> {
    raw: i64,
    format: PhantomData<Q>,
}

impl<Q: Format> Fixed<Q> {
    /// Zero
    pub const ZERO: Self = Fixed {
        raw: 0,
        format: PhantomData,
    };
    /// One
    pub const ONE: Self = Fixed {
        raw: 1 << Q::FRAC_BITS,
        format: PhantomData,
    };
    /// One half
    pub const HALF: Self = Fixed {
        raw: 1 << (Q::FRAC_BITS - 1),
        format: PhantomData,
    };
    /// The largest representable value
    pub const MAX: Self = Fixed {
        raw: Q::MAX_RAW,
        format: PhantomData,
    };
    /// The smallest representable value
    pub const MIN: Self = Fixed {
        raw: Q::MIN_RAW,
        format: PhantomData,
    };

    /// Build a value from a raw bit pattern, saturating anything outside the format's range
    #[inline]
    pub fn from_raw(raw: i64) -> Self {
        Self::saturate(raw as i128)
    }

    #[inline]
    fn saturate(raw: i128) -> Self {
        let raw = raw.max(Q::MIN_RAW as i128).min(Q::MAX_RAW as i128) as i64;
        Fixed {
            raw,
            format: PhantomData,
        }
    }

    /// The raw bit pattern of this value
    #[inline]
    pub fn raw(self) -> i64 {
        self.raw
    }

    /// The scale factor `2^FRAC_BITS`, which is exact in an `f64`
    #[inline]
    fn scale() -> f64 {
        (1u64 << Q::FRAC_BITS) as f64
    }

    /// Convert from a float, flooring onto the grid and saturating. NaN becomes zero.
    #[inline]
    pub fn from_f64(value: f64) -> Self {
        // `as` saturates on overflow and maps NaN to 0
        Self::saturate((value * Self::scale()).floor() as i128)
    }

    /// Convert to a float. Exact whenever `|raw| < 2^53`
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.raw as f64 / Self::scale()
    }

    /// The distance between two adjacent representable values
    #[inline]
    pub fn epsilon() -> f64 {
        1.0 / Self::scale()
    }

    /// Clip this value to `[min, max]`
    #[inline]
    pub fn clip(self, min: Self, max: Self) -> Self {
        if self < min {
            min
        } else if self > max {
            max
        } else {
            self
        }
    }

    /// The absolute value, saturating at `MAX`
    #[inline]
    pub fn abs(self) -> Self {
        Self::saturate((self.raw as i128).abs())
    }

    /// Whether this value is strictly negative
    #[inline]
    pub fn is_negative(self) -> bool {
        self.raw < 0
    }
}

impl<Q: Format> PartialOrd for Fixed<Q> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<Q: Format> Ord for Fixed<Q> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<Q: Format> Add for Fixed<Q> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::saturate(self.raw as i128 + rhs.raw as i128)
    }
}

impl<Q: Format> Sub for Fixed<Q> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::saturate(self.raw as i128 - rhs.raw as i128)
    }
}

impl<Q: Format> Mul for Fixed<Q> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        // An i64 by i64 product always fits in an i128; the arithmetic shift floors
        Self::saturate((self.raw as i128 * rhs.raw as i128) >> Q::FRAC_BITS)
    }
}

impl<Q: Format> Div for Fixed<Q> {
    type Output = Self;
    /// Division flooring like every other operation. Dividing by zero saturates toward the sign of the dividend, and
    /// `0 / 0 = 0`
    #[inline]
    fn div(self, rhs: Self) -> Self {
        match (self.raw.cmp(&0), rhs.raw) {
            (Ordering::Equal, 0) => Self::ZERO,
            (Ordering::Greater, 0) => Self::MAX,
            (Ordering::Less, 0) => Self::MIN,
            _ => {
                let n = (self.raw as i128) << Q::FRAC_BITS;
                let d = rhs.raw as i128;
                // i128 division truncates toward zero; step down when the exact quotient is negative and inexact
                let q = n / d;
                if n % d != 0 && (n < 0) != (d < 0) {
                    Self::saturate(q - 1)
                } else {
                    Self::saturate(q)
                }
            }
        }
    }
}

impl<Q: Format> Neg for Fixed<Q> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::saturate(-(self.raw as i128))
    }
}

impl<Q: Format> AddAssign for Fixed<Q> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}

impl<Q: Format> SubAssign for Fixed<Q> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs
    }
}

impl<Q: Format> MulAssign for Fixed<Q> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs
    }
}

impl<Q: Format> Sum for Fixed<Q> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<Q: Format> Zero for Fixed<Q> {
    #[inline]
    fn zero() -> Self {
        Self::ZERO
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.raw == 0
    }
}

impl<Q: Format> One for Fixed<Q> {
    #[inline]
    fn one() -> Self {
        Self::ONE
    }
}

impl<Q: Format> Bounded for Fixed<Q> {
    #[inline]
    fn min_value() -> Self {
        Self::MIN
    }
    #[inline]
    fn max_value() -> Self {
        Self::MAX
    }
}

impl<Q: Format> From<f64> for Fixed<Q> {
    #[inline]
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl<Q: Format> Display for Fixed<Q> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.to_f64(), f)
    }
}

impl<Q: Format> Debug for Fixed<Q> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}[{}.{}]",
            self.to_f64(),
            Q::TOTAL_BITS - Q::FRAC_BITS,
            Q::FRAC_BITS
        )
    }
}

/// The dot product of two equally sized slices, accumulated with saturating fixed-point arithmetic
#[inline]
pub fn dot<Q: Format>(left: &[Fixed<Q>], right: &[Fixed<Q>]) -> Fixed<Q> {
    debug_assert_eq!(left.len(), right.len(), "Dot product of mismatched slices");
    left.iter().zip(right).map(|(&l, &r)| l * r).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    type Fx = Fixed<I32F32>;
    type Fs = Fixed<I16F16>;

    #[test]
    fn format_ranges() {
        assert_eq!(I32F32::MAX_RAW, i64::MAX);
        assert_eq!(I32F32::MIN_RAW, i64::MIN);
        assert_eq!(I16F16::MAX_RAW, i32::MAX as i64);
        assert_eq!(I16F16::MIN_RAW, i32::MIN as i64);
        assert_eq!(I32F32::BYTES, 8);
        assert_eq!(I16F16::BYTES, 4);
    }

    #[test]
    fn float_conversion() {
        assert_eq!(Fx::from_f64(1.0), Fx::ONE);
        assert_eq!(Fx::from_f64(0.5), Fx::HALF);
        assert_eq!(Fx::from_f64(-2.25).to_f64(), -2.25);
        assert_eq!(Fs::from_f64(3.140625).to_f64(), 3.140625);
        // Floors onto the grid
        assert_eq!(Fs::from_f64(Fs::epsilon() * 0.75), Fs::ZERO);
        assert_eq!(Fs::from_f64(-Fs::epsilon() * 0.25).raw(), -1);
        assert_eq!(Fx::from_f64(f64::NAN), Fx::ZERO);
    }

    #[test]
    fn conversion_saturates() {
        assert_eq!(Fs::from_f64(1e9), Fs::MAX);
        assert_eq!(Fs::from_f64(-1e9), Fs::MIN);
        assert_eq!(Fx::from_f64(f64::INFINITY), Fx::MAX);
        assert_eq!(Fx::from_f64(f64::NEG_INFINITY), Fx::MIN);
        assert_eq!(Fs::from_raw(i64::MAX), Fs::MAX);
    }

    #[test]
    fn arithmetic() {
        let a = Fx::from_f64(1.5);
        let b = Fx::from_f64(-0.25);
        assert_eq!((a + b).to_f64(), 1.25);
        assert_eq!((a - b).to_f64(), 1.75);
        assert_eq!((a * b).to_f64(), -0.375);
        assert_eq!((a / b).to_f64(), -6.0);
        assert_eq!((-a).to_f64(), -1.5);
        let mut c = a;
        c += b;
        c *= Fx::from_f64(2.0);
        assert_eq!(c.to_f64(), 2.5);
    }

    #[test]
    fn division_floors_like_multiplication() {
        let tiny = Fx::from_raw(-1);
        assert_eq!((tiny / Fx::from_f64(2.0)).raw(), -1);
        assert_eq!((tiny * Fx::from_f64(0.5)).raw(), -1);
        assert_eq!((Fx::from_raw(1) / Fx::from_f64(-2.0)).raw(), -1);
        assert_eq!((Fx::from_raw(1) / Fx::from_f64(2.0)).raw(), 0);
        assert_eq!((Fx::from_raw(-1) / Fx::from_f64(-2.0)).raw(), 0);
        let third = Fs::ONE / Fs::from_f64(-3.0);
        assert_eq!(third.raw(), -21846);
        assert_eq!((Fs::from_f64(-6.0) / Fs::from_f64(3.0)).to_f64(), -2.0);
    }

    #[test]
    fn multiplication_keeps_low_bits() {
        // Both operands have bits below 2^-16: a 64 bit intermediate would lose them
        let a = Fx::from_raw(3);
        let b = Fx::from_f64(65536.0);
        assert_eq!((a * b).raw(), 3 << 16);
        let big = Fx::from_f64(40000.5);
        assert_eq!((big * big).to_f64(), 40000.5 * 40000.5);
    }

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(Fs::MAX + Fs::ONE, Fs::MAX);
        assert_eq!(Fs::MIN - Fs::ONE, Fs::MIN);
        assert_eq!(Fs::from_f64(30000.0) * Fs::from_f64(30000.0), Fs::MAX);
        assert_eq!(Fs::from_f64(30000.0) * Fs::from_f64(-30000.0), Fs::MIN);
        assert_eq!(-Fx::MIN, Fx::MAX);
        assert_eq!(Fx::ONE / Fx::ZERO, Fx::MAX);
        assert_eq!(-Fx::ONE / Fx::ZERO, Fx::MIN);
        assert_eq!(Fx::ZERO / Fx::ZERO, Fx::ZERO);
    }

    #[test]
    fn clipping() {
        let lo = Fs::from_f64(-50.0);
        let hi = Fs::from_f64(50.0);
        assert_eq!(Fs::from_f64(75.0).clip(lo, hi), hi);
        assert_eq!(Fs::from_f64(-75.0).clip(lo, hi), lo);
        assert_eq!(Fs::from_f64(12.5).clip(lo, hi).to_f64(), 12.5);
    }

    #[test]
    fn dot_product() {
        let l: Vec<Fx> = [1.0, 2.0, 3.0].iter().map(|&x| Fx::from_f64(x)).collect();
        let r: Vec<Fx> = [0.5, -1.0, 2.0].iter().map(|&x| Fx::from_f64(x)).collect();
        assert_eq!(dot(&l, &r).to_f64(), 4.5);
        assert_eq!(dot::<I32F32>(&[], &[]), Fx::zero());
    }
}
