//! Width-changing operations.
//!
//! Extraction composes a right shift with a low cast. Extension comes in
//! three flavors: zero (exact for non-wrapping intervals), sign (splits
//! at the north pole when the sign bit is ambiguous), and agnostic (the
//! sound over-approximation for both readings, used to harmonize operand
//! widths). The endianness flip is lazy: `reverse` only toggles a flag,
//! and the byte-slicing materialization runs when an operation actually
//! needs the flipped value.

use tracing::warn;

use crate::bits;
use crate::error::{Result, SiError};

use super::StridedInterval;

impl StridedInterval {
    /// Extract the bit range `[high:low]`, inclusive on both ends.
    pub fn extract(&self, high: u32, low: u32) -> Result<Self> {
        if high < low || high >= self.bits {
            return Err(SiError::InvalidExtract {
                high,
                low,
                bits: self.bits,
            });
        }
        let si = self.for_unary();
        Ok(si.extract_inner(high, low).inherit_uninit_from(self))
    }

    pub(crate) fn extract_inner(&self, high: u32, low: u32) -> Self {
        let n = high - low + 1;
        let mut ret = if low != 0 {
            self.rshift(&StridedInterval::make(self.bits, 0, u64::from(low), u64::from(low)), false)
        } else {
            self.clone()
        };
        if n != self.bits {
            ret = ret.cast_low_inner(n);
        }
        ret
    }

    /// Keep the low `to_bits` bits, discarding the rest.
    pub fn cast_low(&self, to_bits: u32) -> Result<Self> {
        if to_bits == 0 {
            return Err(SiError::InvalidWidth { bits: to_bits });
        }
        if to_bits > self.bits {
            return Err(SiError::InvalidCast {
                from: self.bits,
                to: to_bits,
            });
        }
        let si = self.for_unary();
        Ok(si.cast_low_inner(to_bits).inherit_uninit_from(self))
    }

    pub(crate) fn cast_low_inner(&self, tok: u32) -> Self {
        let w = self.bits;
        if self.is_empty() {
            return Self::empty_unchecked(tok);
        }

        let m = bits::mask(tok);

        if u128::from(self.stride) >= (1u128 << tok) {
            // Fewer target values than one stride step: at most the lower
            // bound survives.
            warn!(interval = %self, to_bits = tok, "low cast below the stride");
            if self.lower_bound & m == self.lower_bound {
                return Self::make(tok, 0, self.lower_bound, self.lower_bound);
            }
            return Self::empty_unchecked(tok);
        }

        if tok == w {
            return self.clone();
        }

        if self.lower_bound & m == self.lower_bound && self.upper_bound & m == self.upper_bound {
            // Already representable; nothing is cut off.
            return Self::make(tok, self.stride, self.lower_bound, self.upper_bound);
        }

        // The bound range fits in the target width even though the bounds
        // themselves wrap across it. Signed span: a wrapped source interval
        // has upper < lower and still lands here.
        if i128::from(self.upper_bound) - i128::from(self.lower_bound) <= i128::from(m) {
            return Self::make(tok, self.stride, self.lower_bound & m, self.upper_bound & m);
        }

        // Every concretization collapses to one residue.
        if self.upper_bound & m == self.lower_bound & m
            && self.upper_bound.wrapping_sub(self.lower_bound) & m == 0
        {
            let bound = self.lower_bound & m;
            return Self::make(tok, 0, bound, bound);
        }

        Self::top_unchecked(tok)
    }

    /// Widen to `new_bits` by prepending zero bits.
    pub fn zero_extend(&self, new_bits: u32) -> Result<Self> {
        self.check_extension(new_bits)?;
        let si = self.for_unary();
        Ok(si.resize_unchecked(new_bits).inherit_uninit_from(self))
    }

    /// Widen to `new_bits`, replicating the sign bit.
    pub fn sign_extend(&self, new_bits: u32) -> Result<Self> {
        self.check_extension(new_bits)?;
        let si = self.for_unary();
        Ok(si.sign_extend_inner(new_bits).inherit_uninit_from(self))
    }

    /// Widen to `new_bits` soundly for both the signed and the unsigned
    /// reading.
    pub fn agnostic_extend(&self, new_bits: u32) -> Result<Self> {
        self.check_extension(new_bits)?;
        let si = self.for_unary();
        Ok(si.agnostic_extend_inner(new_bits).inherit_uninit_from(self))
    }

    fn check_extension(&self, new_bits: u32) -> Result<()> {
        if new_bits > 64 {
            return Err(SiError::WidthOverflow { bits: new_bits });
        }
        if new_bits < self.bits {
            return Err(SiError::InvalidCast {
                from: self.bits,
                to: new_bits,
            });
        }
        Ok(())
    }

    /// Reinterpret the stored bounds at a wider width (zero extension).
    pub(crate) fn resize_unchecked(&self, new_bits: u32) -> Self {
        if self.bottom {
            return Self::empty_unchecked(new_bits);
        }
        Self::make(new_bits, self.stride, self.lower_bound, self.upper_bound)
            .with_uninitialized(self.uninitialized)
    }

    fn extension_mask(&self, new_bits: u32) -> u64 {
        bits::mask(new_bits) ^ bits::mask(self.bits)
    }

    pub(crate) fn sign_extend_inner(&self, new_bits: u32) -> Self {
        if self.bottom || new_bits == self.bits {
            return self.resize_unchecked(new_bits);
        }

        let ext = self.extension_mask(new_bits);
        let msb_values = self.extract_inner(self.bits - 1, self.bits - 1).eval(2);
        match msb_values.as_slice() {
            [0] => self.resize_unchecked(new_bits),
            [1] => Self::make(
                new_bits,
                self.stride,
                self.lower_bound | ext,
                self.upper_bound | ext,
            ),
            _ => {
                // Mixed signs: extend each north-pole piece on its own.
                let sign = bits::highbit(self.bits);
                let pieces: Vec<StridedInterval> = self
                    .nsplit()
                    .into_iter()
                    .map(|n| {
                        if n.upper_bound < sign {
                            Self::make(new_bits, n.stride, n.lower_bound, n.upper_bound)
                        } else {
                            Self::make(
                                new_bits,
                                n.stride,
                                n.lower_bound | ext,
                                n.upper_bound | ext,
                            )
                        }
                    })
                    .collect();
                Self::least_upper_bound(new_bits, &pieces)
            }
        }
    }

    pub(crate) fn agnostic_extend_inner(&self, new_bits: u32) -> Self {
        if self.bottom || new_bits == self.bits {
            return self.resize_unchecked(new_bits);
        }

        // Hemisphere table: a bound on the right hemisphere (sign bit set)
        // receives leading ones only when that keeps both readings sound.
        let lb_msb = bits::msb(self.lower_bound, self.bits);
        let ub_msb = bits::msb(self.upper_bound, self.bits);

        let mut leading_1_lb = false;
        let mut leading_1_ub = false;

        if lb_msb == 1 {
            if ub_msb == 1 && self.upper_bound > self.lower_bound {
                leading_1_ub = true;
            }
            if ub_msb == 1 && self.lower_bound >= self.upper_bound {
                leading_1_ub = true;
                leading_1_lb = true;
            }
        } else if ub_msb == 1 {
            leading_1_ub = true;
        }

        let ext = self.extension_mask(new_bits);
        let lb = if leading_1_lb {
            self.lower_bound | ext
        } else {
            self.lower_bound
        };
        let ub = if leading_1_ub {
            self.upper_bound | ext
        } else {
            self.upper_bound
        };

        Self::make(new_bits, self.stride, lb, ub).with_uninitialized(self.uninitialized)
    }

    /// Concatenate, `self` becoming the high bits and `other` the low
    /// bits of a `self.bits + other.bits` wide interval.
    pub fn concat(&self, other: &Self) -> Result<Self> {
        let new_bits = self.bits + other.bits;
        if new_bits > 64 {
            return Err(SiError::WidthOverflow { bits: new_bits });
        }
        let (a, b, rev) = self.coerce_pair(other, false);
        Ok(a.concat_kernel(&b).inherit_uninit(&a, &b).rewrap_reversed(rev))
    }

    pub(crate) fn concat_kernel(&self, b: &Self) -> Self {
        let new_bits = self.bits + b.bits;
        if self.is_empty() || b.is_empty() {
            return Self::empty_unchecked(new_bits);
        }

        let shift = u64::from(b.bits);
        let shifted = self
            .resize_unchecked(new_bits)
            .lshift(&StridedInterval::make(new_bits, 0, shift, shift));

        if shifted.is_integer() {
            // High part is concrete; the low part rides on it unchanged.
            Self::make(
                new_bits,
                b.stride,
                shifted.lower_bound.wrapping_add(b.lower_bound),
                shifted.upper_bound.wrapping_add(b.upper_bound),
            )
        } else {
            shifted.bitwise_or(&b.resize_unchecked(new_bits))
        }
    }

    /// Lazily flip endianness: only the flag changes, the expensive
    /// byte-wise materialization is deferred until an operation needs it.
    #[must_use]
    pub fn reverse(&self) -> Self {
        if self.bits == 8 {
            return self.clone();
        }
        let mut si = self.clone();
        si.reversed = !si.reversed;
        si
    }

    /// Byte-swap the value space for real, clearing the reversed flag.
    ///
    /// Exact for singletons and TOP; anything else degrades and is
    /// reported as a precision warning.
    pub(crate) fn materialize_reversed(&self) -> Self {
        let mut o = self.clone();
        o.reversed = false;

        if o.bits == 8 || o.is_bottom() || o.is_top() {
            return o;
        }

        if !o.is_integer() {
            warn!(interval = %self, "materializing the reverse of a non-singleton interval");
        }

        let rounded_bits = (o.bits + 7) / 8 * 8;
        let mut acc: Option<StridedInterval> = None;
        let mut i = 0;
        while i < rounded_bits {
            let high = (i + 7).min(o.bits - 1);
            let byte = o.extract_inner(high, i);
            acc = Some(match acc {
                None => byte,
                Some(acc) => acc.concat_kernel(&byte),
            });
            i += 8;
        }

        match acc {
            Some(si) => si.with_uninitialized(self.uninitialized),
            None => o,
        }
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
    fn test_extract_low_nibble_of_top() {
        let top = StridedInterval::top(8).unwrap();
        let r = top.extract(3, 0).unwrap();
        assert_eq!(r.bits(), 4);
        assert!(r.is_top());
    }

    #[test]
    fn test_extract_identity() {
        let x = si(8, 2, 0x02, 0x0A);
        let r = x.extract(7, 0).unwrap();
        assert!(r.identical(&x));
    }

    #[test]
    fn test_extract_validation() {
        let x = si(8, 1, 0, 5);
        assert!(x.extract(8, 0).is_err());
        assert!(x.extract(2, 4).is_err());
    }

    #[test]
    fn test_extract_high_byte() {
        let x = StridedInterval::singleton(16, 0xBEEF).unwrap();
        let hi = x.extract(15, 8).unwrap();
        assert!(hi.identical(&int(8, 0xBE)));
        let lo = x.extract(7, 0).unwrap();
        assert!(lo.identical(&int(8, 0xEF)));
    }

    #[test]
    fn test_cast_low_keeps_representable() {
        let x = si(16, 2, 0x10, 0x20);
        let r = x.cast_low(8).unwrap();
        assert!(r.identical(&si(8, 2, 0x10, 0x20)));
    }

    #[test]
    fn test_cast_low_wrapping_bounds() {
        // [0xFE, 0x102]: a span of 5 that crosses the 8-bit boundary.
        let x = si(16, 1, 0xFE, 0x102);
        let r = x.cast_low(8).unwrap();
        assert!(r.identical(&si(8, 1, 0xFE, 0x02)));
    }

    #[test]
    fn test_cast_low_below_stride() {
        // Stride at least 2^t: only an already-reduced lower bound
        // survives, as a singleton.
        let x = si(16, 0x100, 0x80, 0x180);
        let r = x.cast_low(8).unwrap();
        assert!(r.identical(&int(8, 0x80)));

        let x = si(16, 0x100, 0x100, 0x200);
        assert!(x.cast_low(8).unwrap().is_bottom());
    }

    #[test]
    fn test_cast_low_collapsing_residues() {
        // Bounds congruent modulo the mask with a 2^t-multiple span
        // collapse to a single residue.
        let x = si(16, 0x80, 0x100, 0x200);
        let r = x.cast_low(8).unwrap();
        assert!(r.identical(&int(8, 0)));
    }

    #[test]
    fn test_cast_low_degrades_to_top() {
        let x = si(16, 1, 0x00, 0x1FF);
        let r = x.cast_low(8).unwrap();
        assert!(r.is_top());
    }

    #[test]
    fn test_cast_low_validation() {
        let x = si(8, 1, 0, 5);
        assert!(x.cast_low(0).is_err());
        assert!(x.cast_low(9).is_err());
    }

    #[test]
    fn test_zero_extend_is_exact() {
        let x = si(8, 2, 0x02, 0x0A);
        let r = x.zero_extend(16).unwrap();
        assert_eq!(r.bits(), 16);
        assert_eq!(r.eval(16), x.eval(16));
    }

    #[test]
    fn test_sign_extend_negative_singleton() {
        let x = int(8, 0x80);
        let r = x.sign_extend(16).unwrap();
        assert!(r.identical(&StridedInterval::singleton(16, 0xFF80).unwrap()));
    }

    #[test]
    fn test_sign_extend_positive() {
        let x = si(8, 1, 0x01, 0x7F);
        let r = x.sign_extend(16).unwrap();
        assert!(r.identical(&si(16, 1, 0x01, 0x7F)));
    }

    #[test]
    fn test_sign_extend_mixed() {
        // {0x7F, 0x80} extends to {0x007F, 0xFF80}.
        let x = si(8, 1, 0x7F, 0x80);
        let r = x.sign_extend(16).unwrap();
        assert!(r.wrapped_member(0x007F));
        assert!(r.wrapped_member(0xFF80));
    }

    #[test]
    fn test_sign_extend_then_cast_back() {
        let x = int(8, 0x80);
        let r = x.sign_extend(16).unwrap().cast_low(8).unwrap();
        assert!(r.identical(&x));

        let y = si(8, 1, 0x10, 0x20);
        let r = y.sign_extend(16).unwrap().cast_low(8).unwrap();
        assert!(r.identical(&y));
    }

    #[test]
    fn test_agnostic_extend_left_hemisphere() {
        let x = si(8, 1, 0x10, 0x70);
        let r = x.agnostic_extend(16).unwrap();
        assert!(r.identical(&si(16, 1, 0x10, 0x70)));
    }

    #[test]
    fn test_agnostic_extend_right_hemisphere() {
        // Both bounds negative-capable, no wrap: only the upper bound
        // gets leading ones.
        let x = si(8, 1, 0x90, 0xA0);
        let r = x.agnostic_extend(16).unwrap();
        assert_eq!(r.lower_bound(), 0x90);
        assert_eq!(r.upper_bound(), 0xFFA0);
    }

    #[test]
    fn test_agnostic_extend_wrapped() {
        // Wrapping right-hemisphere interval: both bounds extended.
        let x = si(8, 1, 0xA0, 0x90);
        let r = x.agnostic_extend(16).unwrap();
        assert_eq!(r.lower_bound(), 0xFFA0);
        assert_eq!(r.upper_bound(), 0xFF90);
    }

    #[test]
    fn test_agnostic_extend_straddling() {
        // Lower on the left, upper on the right: upper only.
        let x = si(8, 1, 0x10, 0x90);
        let r = x.agnostic_extend(16).unwrap();
        assert_eq!(r.lower_bound(), 0x10);
        assert_eq!(r.upper_bound(), 0xFF90);
    }

    #[test]
    fn test_concat_singletons() {
        let hi = int(8, 0xBE);
        let lo = int(8, 0xEF);
        let r = hi.concat(&lo).unwrap();
        assert!(r.identical(&StridedInterval::singleton(16, 0xBEEF).unwrap()));
    }

    #[test]
    fn test_concat_constant_high_strided_low() {
        let hi = int(8, 0x01);
        let lo = si(8, 4, 0x00, 0x0C);
        let r = hi.concat(&lo).unwrap();
        assert!(r.identical(&si(16, 4, 0x100, 0x10C)));
    }

    #[test]
    fn test_concat_width_overflow() {
        let a = StridedInterval::top(40).unwrap();
        let b = StridedInterval::top(32).unwrap();
        assert!(matches!(
            a.concat(&b),
            Err(SiError::WidthOverflow { bits: 72 })
        ));
    }

    #[test]
    fn test_extract_concat_round_trip() {
        let x = si(16, 1, 0x1200, 0x12FF);
        let hi = x.extract(15, 8).unwrap();
        let lo = x.extract(7, 0).unwrap();
        let back = hi.concat(&lo).unwrap();
        // Recomposition may over-approximate but never lose values.
        assert!(x.wrapped_lte(&back));
    }

    #[test]
    fn test_reverse_toggles_lazily() {
        let x = StridedInterval::singleton(32, 0x11223344).unwrap();
        let r = x.reverse();
        assert!(r.is_reversed());
        assert!(r.reverse().identical(&x));
        assert!(!r.reverse().is_reversed());
    }

    #[test]
    fn test_reverse_single_byte_is_identity() {
        let x = int(8, 0x42);
        assert!(!x.reverse().is_reversed());
    }

    #[test]
    fn test_materialize_reversed_singleton() {
        let x = StridedInterval::singleton(32, 0x11223344).unwrap();
        let r = x.materialize_reversed();
        assert!(r.identical(&StridedInterval::singleton(32, 0x44332211).unwrap()));

        // Round trip through materialization is exact for singletons.
        assert!(r.materialize_reversed().identical(&x));
    }

    #[test]
    fn test_materialize_reversed_top() {
        let x = StridedInterval::top(32).unwrap();
        assert!(x.reverse().materialize_reversed().is_top());
    }

    #[test]
    fn test_reversed_operand_alignment() {
        // A reversed non-singleton meeting a concrete operand: the
        // constant is byte-swapped into the reversed space and the result
        // carries the flag.
        let x = si(32, 1, 0x1000, 0x2000).reverse();
        let k = StridedInterval::singleton(32, 0x01000000).unwrap();
        let sum = x.add(&k);
        assert!(sum.is_reversed());
        // In reversed space the constant reads 0x00000001, so the raw
        // bounds move by one.
        assert_eq!(sum.lower_bound(), 0x1001);
        assert_eq!(sum.upper_bound(), 0x2001);
    }
}
