//! Bitwise operations and shifts.
//!
//! AND, OR and XOR cut both operands at the south pole and bound each
//! piece-pair with the Warren algorithms; the stride collapses to 1.
//! Shift amounts may themselves be intervals, in which case every shift
//! in the clamped range contributes to the result bounds.

use crate::bits;
use crate::warren;

use super::StridedInterval;

/// `v >> s` that tolerates a full-width shift.
fn shr64(v: u64, s: u32) -> u64 {
    if s >= 64 {
        0
    } else {
        v >> s
    }
}

impl StridedInterval {
    /// Abstract bitwise OR.
    pub fn bitwise_or(&self, other: &Self) -> Self {
        let (a, b, rev) = self.coerce_pair(other, true);
        a.bitwise_kernel(&b, warren::min_or, warren::max_or)
            .inherit_uninit(&a, &b)
            .rewrap_reversed(rev)
    }

    /// Abstract bitwise AND.
    pub fn bitwise_and(&self, other: &Self) -> Self {
        let (a, b, rev) = self.coerce_pair(other, true);
        a.bitwise_kernel(&b, warren::min_and, warren::max_and)
            .inherit_uninit(&a, &b)
            .rewrap_reversed(rev)
    }

    /// Abstract bitwise XOR.
    pub fn bitwise_xor(&self, other: &Self) -> Self {
        let (a, b, rev) = self.coerce_pair(other, true);
        a.bitwise_kernel(&b, warren::min_xor, warren::max_xor)
            .inherit_uninit(&a, &b)
            .rewrap_reversed(rev)
    }

    /// Abstract bitwise NOT.
    ///
    /// Complementing flips the walking direction, so each south-pole
    /// piece maps to `[!upper, !lower]` with the stride preserved.
    pub fn bitwise_not(&self) -> Self {
        let si = self.for_unary();
        let w = si.bits;
        let pieces: Vec<StridedInterval> = si
            .ssplit()
            .into_iter()
            .map(|piece| {
                StridedInterval::make(w, si.stride, !piece.upper_bound, !piece.lower_bound)
            })
            .collect();
        Self::least_upper_bound(w, &pieces).inherit_uninit_from(self)
    }

    fn bitwise_kernel(
        &self,
        t: &Self,
        min_op: fn(u64, u64, u64, u64, u32) -> u64,
        max_op: fn(u64, u64, u64, u64, u32) -> u64,
    ) -> Self {
        let w = self.bits;
        let mut pieces = Vec::new();
        for u in self.ssplit() {
            for v in t.ssplit() {
                let lb = min_op(
                    u.lower_bound,
                    u.upper_bound,
                    v.lower_bound,
                    v.upper_bound,
                    w,
                );
                let ub = max_op(
                    u.lower_bound,
                    u.upper_bound,
                    v.lower_bound,
                    v.upper_bound,
                    w,
                );
                pieces.push(StridedInterval::make(w, 1, lb, ub));
            }
        }
        Self::least_upper_bound(w, &pieces)
    }

    /// The clamped `[low, high]` range of shift amounts described by
    /// `amount`.
    fn shift_range(&self, amount: &Self) -> (u32, u32) {
        let clamp = |v: u64| -> u32 {
            if v > u64::from(self.bits) {
                self.bits
            } else {
                v as u32
            }
        };

        if amount.is_integer() {
            let s = clamp(amount.lower_bound);
            (s, s)
        } else if amount.wraps() {
            (0, self.bits)
        } else {
            (clamp(amount.lower_bound), clamp(amount.upper_bound))
        }
    }

    /// Abstract left shift.
    pub fn lshift(&self, amount: &Self) -> Self {
        let si = self.for_unary();
        let w = si.bits;
        let (low, high) = si.shift_range(amount);

        let mut new_lb = u128::MAX;
        let mut new_ub = 0u128;
        for s in low..=high {
            new_lb = new_lb.min(u128::from(si.lower_bound) << s);
            new_ub = new_ub.max(u128::from(si.upper_bound) << s);
        }

        let stride = (u128::from(si.stride) << low).max(1);
        let m = u128::from(bits::max_int(w));
        StridedInterval::make(
            w,
            stride.min(u128::from(u64::MAX)) as u64,
            (new_lb & m) as u64,
            (new_ub & m) as u64,
        )
        .inherit_uninit(self, amount)
    }

    /// Abstract right shift.
    ///
    /// With `preserve_sign` set this is an arithmetic shift: a set sign
    /// bit in a bound is smeared back over the vacated top bits.
    pub fn rshift(&self, amount: &Self, preserve_sign: bool) -> Self {
        let si = self.for_unary();
        let w = si.bits;
        let (low, high) = si.shift_range(amount);

        let mut new_lb = u64::MAX;
        let mut new_ub = 0u64;
        let mut lb_shift = 0;
        let mut ub_shift = 0;
        for s in low..=high {
            let l = shr64(si.lower_bound, s);
            if l < new_lb || s == low {
                new_lb = l;
                lb_shift = s;
            }
            let u = shr64(si.upper_bound, s);
            if u > new_ub || s == low {
                new_ub = u;
                ub_shift = s;
            }
        }

        if preserve_sign {
            let sign = bits::highbit(w);
            if si.lower_bound & sign != 0 {
                let smear = ((1u128 << lb_shift) - 1) << (w - lb_shift);
                new_lb |= (smear & u128::from(bits::max_int(w))) as u64;
            }
            if si.upper_bound & sign != 0 {
                let smear = ((1u128 << ub_shift) - 1) << (w - ub_shift);
                new_ub |= (smear & u128::from(bits::max_int(w))) as u64;
            }
        }

        let stride = shr64(si.stride, high).max(1);
        StridedInterval::make(w, stride, new_lb, new_ub).inherit_uninit(self, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn si(bits: u32, stride: u64, lb: u64, ub: u64) -> StridedInterval {
        StridedInterval::new(bits, stride, lb, ub).unwrap()
    }

    fn int(bits: u32, v: u64) -> StridedInterval {
        StridedInterval::singleton(bits, v).unwrap()
    }

    #[test]
    fn test_or_singletons_collapse() {
        let a = int(8, 0x03);
        let b = int(8, 0x05);
        let r = a.bitwise_or(&b);
        assert!(r.identical(&int(8, 0x07)));
    }

    #[test]
    fn test_and_masks() {
        let x = si(8, 1, 0x10, 0x1F);
        let m = int(8, 0x0F);
        let r = x.bitwise_and(&m);
        // Low nibble of [0x10, 0x1F] is anything in [0x0, 0xF].
        assert_eq!(r.lower_bound(), 0x0);
        assert_eq!(r.upper_bound(), 0xF);
    }

    #[test]
    fn test_xor_singletons() {
        let a = int(8, 0xAA);
        let b = int(8, 0x55);
        assert!(a.bitwise_xor(&b).identical(&int(8, 0xFF)));
    }

    #[test]
    fn test_xor_with_self_contains_zero() {
        let x = si(8, 1, 0x10, 0x13);
        assert!(x.bitwise_xor(&x).wrapped_member(0));
    }

    #[test]
    fn test_not() {
        let x = si(8, 1, 0x10, 0x20);
        let r = x.bitwise_not();
        assert!(r.identical(&si(8, 1, 0xDF, 0xEF)));

        // Double complement is the identity on plain intervals.
        assert!(r.bitwise_not().identical(&x));
    }

    #[test]
    fn test_not_bottom() {
        assert!(StridedInterval::empty(8).unwrap().bitwise_not().is_bottom());
    }

    #[test]
    fn test_lshift_constant() {
        let x = si(8, 2, 0x02, 0x0A);
        let r = x.lshift(&int(8, 1));
        assert_eq!(r.lower_bound(), 0x04);
        assert_eq!(r.upper_bound(), 0x14);
        assert_eq!(r.stride(), 4);
    }

    #[test]
    fn test_lshift_range() {
        // Shift by {0, 1}: bounds cover both shifts.
        let x = si(8, 1, 0x04, 0x08);
        let amt = si(8, 1, 0, 1);
        let r = x.lshift(&amt);
        assert_eq!(r.lower_bound(), 0x04);
        assert_eq!(r.upper_bound(), 0x10);
    }

    #[test]
    fn test_rshift_logical() {
        let x = si(8, 4, 0x10, 0x20);
        let r = x.rshift(&int(8, 2), false);
        assert_eq!(r.lower_bound(), 0x04);
        assert_eq!(r.upper_bound(), 0x08);
        assert_eq!(r.stride(), 1);
    }

    #[test]
    fn test_rshift_arithmetic_smears_sign() {
        let x = int(8, 0x80);
        let r = x.rshift(&int(8, 1), true);
        // -128 >> 1 keeps the sign: 0xC0.
        assert!(r.identical(&int(8, 0xC0)));

        let r = x.rshift(&int(8, 1), false);
        assert!(r.identical(&int(8, 0x40)));
    }

    #[test]
    fn test_shift_amount_clamped() {
        let x = int(8, 0xFF);
        let r = x.rshift(&int(8, 200), false);
        assert!(r.identical(&int(8, 0)));
    }

    #[test]
    fn test_full_width_shift() {
        let x = StridedInterval::singleton(64, u64::MAX).unwrap();
        let r = x.rshift(&StridedInterval::singleton(64, 64).unwrap(), false);
        assert!(r.identical(&StridedInterval::singleton(64, 0).unwrap()));
    }
}
