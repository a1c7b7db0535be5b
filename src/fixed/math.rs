/*!
Transcendental functions evaluated directly on fixed-point values

Everything here is integer arithmetic, so results are bit-for-bit reproducible on any host. `exp` reduces its
argument as `x = k ln(2) + r` with `0 <= r < ln(2)`, sums the Taylor series of `e^r` at 60 fractional bits until the
terms vanish, then shifts by `k`. The logistic sigmoid and `tanh` are built on top of it and are accurate to a few
units in the last place of the target format.
*/
use super::{Fixed, Format};

/// Internal fractional precision for `exp`
const INTERNAL_FRAC: u32 = 60;

/// `ln(2) * 2^60`, rounded to nearest
const LN2_Q60: i128 = 799_144_290_325_165_979;

/// The natural exponential, saturating at `Fixed::MAX` and underflowing to zero
pub fn exp<Q: Format>(x: Fixed<Q>) -> Fixed<Q> {
    let widen = INTERNAL_FRAC - Q::FRAC_BITS;
    let arg = (x.raw() as i128) << widen;
    let k = arg.div_euclid(LN2_Q60);
    let r = arg - k * LN2_Q60;

    let one = 1i128 << INTERNAL_FRAC;
    let mut sum = one;
    let mut term = one;
    let mut n = 1;
    loop {
        term = ((term * r) >> INTERNAL_FRAC) / n;
        if term == 0 {
            break;
        }
        sum += term;
        n += 1;
    }

    // e^x = e^r * 2^k, with e^r in [1, 2) at INTERNAL_FRAC bits
    let shift = k - widen as i128;
    if shift >= 0 {
        if shift >= Q::TOTAL_BITS as i128 {
            Fixed::MAX
        } else {
            Fixed::saturate(sum << shift)
        }
    } else if -shift >= 127 {
        Fixed::ZERO
    } else {
        Fixed::saturate(sum >> -shift)
    }
}

/// The logistic sigmoid `1 / (1 + e^-x)`
pub fn sigmoid<Q: Format>(x: Fixed<Q>) -> Fixed<Q> {
    // Only ever exponentiate non-positive arguments
    if x.is_negative() {
        let e = exp(x);
        e / (Fixed::ONE + e)
    } else {
        Fixed::ONE / (Fixed::ONE + exp(-x))
    }
}

/// The hyperbolic tangent, as `2 sigmoid(2x) - 1`, odd by construction
pub fn tanh<Q: Format>(x: Fixed<Q>) -> Fixed<Q> {
    let a = x.abs();
    let s = sigmoid(a + a);
    let t = s + s - Fixed::ONE;
    if x.is_negative() {
        -t
    } else {
        t
    }
}

impl<Q: Format> Fixed<Q> {
    /// The natural exponential of this value
    #[inline]
    pub fn exp(self) -> Self {
        exp(self)
    }

    /// The logistic sigmoid of this value
    #[inline]
    pub fn sigmoid(self) -> Self {
        sigmoid(self)
    }

    /// The hyperbolic tangent of this value
    #[inline]
    pub fn tanh(self) -> Self {
        tanh(self)
    }
}
