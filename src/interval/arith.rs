//! Arithmetic operations.
//!
//! Addition and subtraction run directly on the wrapped bounds with an
//! overflow check over cardinalities. Multiplication and division first
//! cut both operands at the poles, apply the wrapped single-piece
//! algorithm to every pair, and join the pieces back together.

use tracing::warn;

use crate::bits;

use super::StridedInterval;

/// Reduce an intermediate stride to the stored width.
fn clamp_stride(stride: u128) -> u64 {
    stride.min(u128::from(u64::MAX)) as u64
}

impl StridedInterval {
    /// Abstract addition.
    pub fn add(&self, other: &Self) -> Self {
        let (a, b, rev) = self.coerce_pair(other, true);
        a.add_kernel(&b).inherit_uninit(&a, &b).rewrap_reversed(rev)
    }

    /// Abstract subtraction.
    pub fn sub(&self, other: &Self) -> Self {
        let (a, b, rev) = self.coerce_pair(other, true);
        a.sub_kernel(&b).inherit_uninit(&a, &b).rewrap_reversed(rev)
    }

    /// Abstract negation, `0 - self`.
    pub fn neg(&self) -> Self {
        let si = self.for_unary();
        StridedInterval::make(si.bits, 0, 0, 0)
            .sub_kernel(&si)
            .inherit_uninit_from(self)
    }

    /// Abstract multiplication.
    pub fn mul(&self, other: &Self) -> Self {
        let (a, b, rev) = self.coerce_pair(other, true);
        a.mul_kernel(&b).inherit_uninit(&a, &b).rewrap_reversed(rev)
    }

    /// Abstract unsigned division.
    pub fn udiv(&self, other: &Self) -> Self {
        let (a, b, rev) = self.coerce_pair(other, true);
        a.udiv_kernel(&b).inherit_uninit(&a, &b).rewrap_reversed(rev)
    }

    /// Abstract signed division, truncating toward zero.
    pub fn sdiv(&self, other: &Self) -> Self {
        let (a, b, rev) = self.coerce_pair(other, true);
        a.sdiv_kernel(&b).inherit_uninit(&a, &b).rewrap_reversed(rev)
    }

    /// Abstract remainder.
    ///
    /// Exact for a pair of singletons; any other shape degrades to
    /// `1[0, divisor_max - 1]`.
    pub fn rem(&self, other: &Self) -> Self {
        let (a, b, rev) = self.coerce_pair(other, true);
        a.rem_kernel(&b).inherit_uninit(&a, &b).rewrap_reversed(rev)
    }

    //
    // Kernels: operands share a width and carry no reverse flag.
    //

    /// Whether adding (or subtracting) the operands can step across the
    /// whole ring: the sum of bound-interval cardinalities exceeds
    /// `2^w - 1`.
    fn wrapped_overflow(a: &Self, b: &Self) -> bool {
        let card_a = if a.is_integer() && a.lower_bound == 0 {
            0
        } else {
            bits::wrapped_cardinality(a.lower_bound, a.upper_bound, a.bits)
        };
        let card_b = if b.is_integer() && b.lower_bound == 0 {
            0
        } else {
            bits::wrapped_cardinality(b.lower_bound, b.upper_bound, b.bits)
        };
        card_a + card_b > u128::from(bits::max_int(a.bits))
    }

    fn add_kernel(&self, b: &Self) -> Self {
        let w = self.bits;
        if self.is_empty() || b.is_empty() {
            return Self::empty_unchecked(w);
        }
        if Self::wrapped_overflow(self, b) {
            return Self::top_unchecked(w);
        }

        let lb = bits::madd(self.lower_bound, b.lower_bound, w);
        let ub = bits::madd(self.upper_bound, b.upper_bound, w);

        // Adding an interval to itself doubles every element; for distinct
        // operands only the gcd of the strides is sound.
        let stride = if self.name == b.name {
            clamp_stride(u128::from(self.stride) * 2)
        } else {
            bits::gcd(self.stride, b.stride)
        };

        Self::make(w, stride, lb, ub)
    }

    fn sub_kernel(&self, b: &Self) -> Self {
        let w = self.bits;
        if self.is_empty() || b.is_empty() {
            return Self::empty_unchecked(w);
        }
        if Self::wrapped_overflow(self, b) {
            return Self::top_unchecked(w);
        }

        let lb = bits::msub(self.lower_bound, b.upper_bound, w);
        let ub = bits::msub(self.upper_bound, b.lower_bound, w);
        let stride = bits::gcd(self.stride, b.stride);

        Self::make(w, stride, lb, ub)
    }

    fn mul_kernel(&self, o: &Self) -> Self {
        let w = self.bits;
        if self.is_empty() || o.is_empty() {
            return Self::empty_unchecked(w);
        }

        if self.is_integer() && o.is_integer() {
            let product = u128::from(self.lower_bound) * u128::from(o.lower_bound);
            if product > u128::from(bits::max_int(w)) {
                warn!(interval = %self, "overflow in singleton multiplication");
            }
            let masked = (product & u128::from(bits::max_int(w))) as u64;
            return Self::make(w, 0, masked, masked);
        }

        // Cut at both poles so each piece-pair has a fixed sign quadrant,
        // then meet the unsigned and signed over-approximations.
        let mut pieces = Vec::new();
        for si1 in self.psplit() {
            for si2 in o.psplit() {
                let unsigned = Self::wrapped_unsigned_mul(&si1, &si2);
                let signed = Self::wrapped_signed_mul(&si1, &si2);
                pieces.extend(unsigned.intersect_kernel(&signed));
            }
        }
        Self::least_upper_bound(w, &pieces)
    }

    /// Stride of a product where one operand may be a constant.
    fn mul_stride(a: &Self, b: &Self) -> u128 {
        if b.is_integer() {
            u128::from(a.stride) * bits::to_signed(b.lower_bound, b.bits).unsigned_abs()
        } else if a.is_integer() {
            bits::to_signed(a.lower_bound, a.bits).unsigned_abs() * u128::from(b.stride)
        } else {
            u128::from(bits::gcd(a.stride, b.stride))
        }
    }

    fn wrapped_unsigned_mul(a: &Self, b: &Self) -> Self {
        let w = a.bits;
        let lb = u128::from(a.lower_bound) * u128::from(b.lower_bound);
        let ub = u128::from(a.upper_bound) * u128::from(b.upper_bound);

        if ub - lb < (1u128 << w) {
            let stride = clamp_stride(Self::mul_stride(a, b));
            let m = u128::from(bits::max_int(w));
            Self::make(w, stride, (lb & m) as u64, (ub & m) as u64)
        } else {
            Self::top_unchecked(w)
        }
    }

    fn wrapped_signed_mul(a: &Self, b: &Self) -> Self {
        let w = a.bits;
        let a_lb_pos = bits::is_msb_zero(a.lower_bound, w);
        let a_ub_pos = bits::is_msb_zero(a.upper_bound, w);
        let b_lb_pos = bits::is_msb_zero(b.lower_bound, w);
        let b_ub_pos = bits::is_msb_zero(b.upper_bound, w);

        let stride = clamp_stride(Self::mul_stride(a, b));
        let span = 1i128 << w;

        if a_lb_pos && a_ub_pos && b_lb_pos && b_ub_pos {
            // [2, 5] * [10, 20] = [20, 100]
            let lb = i128::from(a.lower_bound) * i128::from(b.lower_bound);
            let ub = i128::from(a.upper_bound) * i128::from(b.upper_bound);
            if ub - lb < span {
                Self::make_signed(w, stride, lb, ub)
            } else {
                Self::top_unchecked(w)
            }
        } else if !a_lb_pos && !a_ub_pos && !b_lb_pos && !b_ub_pos {
            // [-5, -2] * [-20, -10] = [20, 100]
            let lb = bits::to_signed(a.upper_bound, w) * bits::to_signed(b.upper_bound, w);
            let ub = bits::to_signed(a.lower_bound, w) * bits::to_signed(b.lower_bound, w);
            if ub - lb < span {
                Self::make_signed(w, stride, lb, ub)
            } else {
                Self::top_unchecked(w)
            }
        } else if !a_lb_pos && !a_ub_pos && b_lb_pos && b_ub_pos {
            // [-10, -2] * [2, 5] = [-50, -4]
            let lb = bits::to_signed(a.lower_bound, w) * i128::from(b.upper_bound);
            let ub = bits::to_signed(a.upper_bound, w) * i128::from(b.lower_bound);
            if ub - lb < span {
                Self::make_signed(w, stride, lb, ub)
            } else {
                Self::top_unchecked(w)
            }
        } else if a_lb_pos && a_ub_pos && !b_lb_pos && !b_ub_pos {
            // [2, 10] * [-5, -2] = [-50, -4]
            let lb = i128::from(a.upper_bound) * bits::to_signed(b.lower_bound, w);
            let ub = i128::from(a.lower_bound) * bits::to_signed(b.upper_bound, w);
            if ub - lb < span {
                Self::make_signed(w, stride, lb, ub)
            } else {
                Self::top_unchecked(w)
            }
        } else {
            // A pole-split piece cannot mix sign quadrants.
            debug_assert!(false, "sign quadrants mixed after pole split");
            Self::top_unchecked(w)
        }
    }

    fn udiv_kernel(&self, o: &Self) -> Self {
        let w = self.bits;
        let mut results = Vec::new();
        for dividend in self.ssplit() {
            for divisor in o.ssplit() {
                results.push(Self::wrapped_unsigned_div(&dividend, &divisor));
            }
        }
        Self::least_upper_bound(w, &results)
    }

    fn sdiv_kernel(&self, o: &Self) -> Self {
        let w = self.bits;
        let mut results = Vec::new();
        for dividend in self.psplit() {
            for divisor in o.psplit() {
                results.push(Self::wrapped_signed_div(&dividend, &divisor));
            }
        }
        Self::least_upper_bound(w, &results)
    }

    /// Nudge a divisor interval off zero, or report that it is exactly
    /// `{0}`.
    fn nonzero_divisor(b: &Self) -> Option<(u64, u64)> {
        let w = b.bits;
        let mut lb = b.lower_bound;
        let mut ub = b.upper_bound;
        if lb == 0 {
            if ub == 0 {
                return None;
            }
            lb += 1;
        }
        if ub == 0 {
            ub = bits::msub(0, 1, w);
        }
        Some((lb, ub))
    }

    fn wrapped_unsigned_div(a: &Self, b: &Self) -> Self {
        let w = a.bits;
        let Some((divisor_lb, divisor_ub)) = Self::nonzero_divisor(b) else {
            return Self::empty_unchecked(w);
        };

        let lb = a.lower_bound / divisor_ub;
        let ub = a.upper_bound / divisor_lb;

        Self::make(w, 1, lb, ub)
    }

    fn wrapped_signed_div(a: &Self, b: &Self) -> Self {
        let w = a.bits;
        let Some((divisor_lb, divisor_ub)) = Self::nonzero_divisor(b) else {
            return Self::empty_unchecked(w);
        };

        let dividend_positive = bits::is_msb_zero(a.lower_bound, w);
        let divisor_positive = bits::is_msb_zero(b.lower_bound, w);

        let (lb, ub) = if dividend_positive && divisor_positive {
            (
                i128::from(a.lower_bound) / i128::from(divisor_ub),
                i128::from(a.upper_bound) / i128::from(divisor_lb),
            )
        } else if dividend_positive {
            // + / -
            (
                i128::from(a.upper_bound) / bits::to_signed(divisor_ub, w),
                i128::from(a.lower_bound) / bits::to_signed(divisor_lb, w),
            )
        } else if divisor_positive {
            // - / +
            (
                bits::to_signed(a.lower_bound, w) / i128::from(divisor_lb),
                bits::to_signed(a.upper_bound, w) / i128::from(divisor_ub),
            )
        } else {
            // - / -
            (
                bits::to_signed(a.upper_bound, w) / bits::to_signed(divisor_lb, w),
                bits::to_signed(a.lower_bound, w) / bits::to_signed(divisor_ub, w),
            )
        };

        Self::make_signed(w, 1, lb, ub)
    }

    fn rem_kernel(&self, o: &Self) -> Self {
        let w = self.bits;
        if self.is_empty() || o.is_empty() {
            return Self::empty_unchecked(w);
        }
        if self.is_integer() && o.is_integer() {
            if o.lower_bound == 0 {
                return Self::empty_unchecked(w);
            }
            let r = self.lower_bound % o.lower_bound;
            return Self::make(w, 0, r, r);
        }
        Self::make(w, 1, 0, bits::msub(o.upper_bound, 1, w))
    }
}
