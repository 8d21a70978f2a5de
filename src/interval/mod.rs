//! The strided-interval datum and its lifecycle.
//!
//! A strided interval `<bits>stride[lower, upper]` describes an arithmetic
//! progression on the ring of `bits`-wide machine integers. The interval
//! *wraps* when the stored (unsigned) lower bound exceeds the upper bound,
//! in which case it walks through the south pole `2^bits - 1 -> 0`. The
//! representation is signedness-agnostic: every operation is sound whether
//! callers read the values as signed or unsigned.
//!
//! Intervals are immutable value objects. Every operation returns a fresh,
//! normalized interval; the only process-wide state is the counter that
//! synthesizes default names.

mod arith;
mod bitwise;
mod compare;
mod lattice;
mod member;
mod split;
mod width;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bits;
use crate::error::{Result, SiError};
use crate::types::BitVec;

/// Process-wide counter backing the default `SI_<n>` names.
static SI_ID_CTR: AtomicU64 = AtomicU64::new(0);

fn next_name() -> String {
    format!("SI_{}", SI_ID_CTR.fetch_add(1, Ordering::Relaxed))
}

/// A signedness-agnostic wrapped strided interval over `bits`-wide
/// machine integers.
///
/// # Invariants
///
/// After every public operation:
///
/// - bounds are stored unsigned and reduced modulo `2^bits`;
/// - a singleton (`lower == upper`) has stride 0;
/// - the universal interval is canonicalized to `1[0, 2^bits - 1]`;
/// - an 8-bit interval is never flagged reversed;
/// - a BOTTOM interval represents the empty set and only its width is
///   meaningful.
///
/// # Example
///
/// ```rust
/// use strided_interval::StridedInterval;
///
/// let x = StridedInterval::new(8, 2, 0x02, 0x0a)?; // {2, 4, 6, 8, 10}
/// assert_eq!(x.cardinality(), 5);
/// assert!(!x.is_top());
/// # Ok::<(), strided_interval::SiError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StridedInterval {
    name: String,
    bits: u32,
    stride: u64,
    lower_bound: u64,
    upper_bound: u64,
    reversed: bool,
    uninitialized: bool,
    bottom: bool,
}

fn check_width(bits: u32) -> Result<()> {
    if bits == 0 || bits > 64 {
        return Err(SiError::InvalidWidth { bits });
    }
    Ok(())
}

impl StridedInterval {
    //
    // Factories
    //

    /// Create an interval from explicit stride and bounds.
    ///
    /// Bounds are reduced modulo `2^bits`; the result is normalized.
    pub fn new(bits: u32, stride: u64, lower_bound: u64, upper_bound: u64) -> Result<Self> {
        check_width(bits)?;
        Ok(Self::make(bits, stride, lower_bound, upper_bound))
    }

    /// The universal interval `1[0, 2^bits - 1]`.
    pub fn top(bits: u32) -> Result<Self> {
        check_width(bits)?;
        Ok(Self::top_unchecked(bits))
    }

    /// The empty interval (BOTTOM).
    pub fn empty(bits: u32) -> Result<Self> {
        check_width(bits)?;
        Ok(Self::empty_unchecked(bits))
    }

    /// A singleton interval holding exactly `value`.
    pub fn singleton(bits: u32, value: u64) -> Result<Self> {
        check_width(bits)?;
        Ok(Self::make(bits, 0, value, value))
    }

    /// A singleton interval from a concrete bit-vector value.
    pub fn from_bitvec(bv: &BitVec) -> Self {
        Self::make(bv.bits(), 0, bv.value(), bv.value())
    }

    /// Internal constructor; width must already be validated.
    pub(crate) fn make(bits: u32, stride: u64, lower_bound: u64, upper_bound: u64) -> Self {
        debug_assert!(bits >= 1 && bits <= 64);
        let m = bits::mask(bits);
        StridedInterval {
            name: next_name(),
            bits,
            stride,
            lower_bound: lower_bound & m,
            upper_bound: upper_bound & m,
            reversed: false,
            uninitialized: false,
            bottom: false,
        }
        .normalized()
    }

    /// Internal constructor from signed intermediate bounds.
    pub(crate) fn make_signed(bits: u32, stride: u64, lower_bound: i128, upper_bound: i128) -> Self {
        Self::make(
            bits,
            stride,
            bits::mask_i128(lower_bound, bits),
            bits::mask_i128(upper_bound, bits),
        )
    }

    pub(crate) fn top_unchecked(bits: u32) -> Self {
        Self::make(bits, 1, 0, bits::max_int(bits))
    }

    pub(crate) fn empty_unchecked(bits: u32) -> Self {
        debug_assert!(bits >= 1 && bits <= 64);
        StridedInterval {
            name: next_name(),
            bits,
            stride: 1,
            lower_bound: 0,
            upper_bound: bits::max_int(bits),
            reversed: false,
            uninitialized: false,
            bottom: true,
        }
    }

    /// Replace the synthesized name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the uninitialized marker.
    #[must_use]
    pub fn with_uninitialized(mut self, uninitialized: bool) -> Self {
        self.uninitialized = uninitialized;
        self
    }

    /// A copy with a fresh name, same value.
    pub fn fresh_copy(&self) -> Self {
        let mut si = self.clone();
        si.name = next_name();
        si
    }

    /// Restore the canonical form.
    fn normalized(mut self) -> Self {
        if self.bits == 8 {
            // A single byte is its own endianness flip.
            self.reversed = false;
        }
        if self.bottom {
            return self;
        }
        if self.lower_bound == self.upper_bound {
            self.stride = 0;
        } else if self.stride == 0 {
            self.stride = 1;
        }
        if self.stride == 1 && self.lower_bound == bits::madd(self.upper_bound, 1, self.bits) {
            // Canonical TOP.
            self.lower_bound = 0;
            self.upper_bound = bits::max_int(self.bits);
        }
        self
    }

    /// Propagate the uninitialized marker from the operands of a binary op.
    pub(crate) fn inherit_uninit(mut self, a: &Self, b: &Self) -> Self {
        self.uninitialized = a.uninitialized || b.uninitialized;
        self
    }

    pub(crate) fn inherit_uninit_from(mut self, a: &Self) -> Self {
        self.uninitialized = a.uninitialized;
        self
    }

    //
    // Accessors
    //

    /// The interval's name, used for identity-aware equality.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bit width.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Common difference of the progression; 0 for singletons.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Stored (unsigned) lower bound.
    pub fn lower_bound(&self) -> u64 {
        self.lower_bound
    }

    /// Stored (unsigned) upper bound.
    pub fn upper_bound(&self) -> u64 {
        self.upper_bound
    }

    /// Whether the endianness-flip flag is set.
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Whether this value was derived from uninitialized state.
    pub fn is_uninitialized(&self) -> bool {
        self.uninitialized
    }

    //
    // Predicates
    //

    /// Whether this interval is BOTTOM (the empty set).
    pub fn is_bottom(&self) -> bool {
        self.bottom
    }

    /// Alias for [`StridedInterval::is_bottom`].
    pub fn is_empty(&self) -> bool {
        self.bottom
    }

    /// Whether this interval is TOP (the whole ring).
    pub fn is_top(&self) -> bool {
        !self.bottom
            && self.stride == 1
            && self.lower_bound == bits::madd(self.upper_bound, 1, self.bits)
    }

    /// Whether this interval holds exactly one value.
    pub fn is_integer(&self) -> bool {
        !self.bottom && self.lower_bound == self.upper_bound
    }

    /// Whether the stored bounds wrap through the south pole.
    pub(crate) fn wraps(&self) -> bool {
        self.upper_bound < self.lower_bound
    }

    /// Number of concrete values described.
    pub fn cardinality(&self) -> u128 {
        if self.bottom {
            0
        } else if self.is_integer() {
            1
        } else {
            let span = u128::from(bits::msub(self.upper_bound, self.lower_bound, self.bits));
            (span + u128::from(self.stride)) / u128::from(self.stride)
        }
    }

    /// Smallest stored bound, materializing a pending reverse first.
    pub fn min(&self) -> Option<u64> {
        let si = self.for_unary();
        if si.bottom {
            None
        } else {
            Some(si.lower_bound)
        }
    }

    /// Largest stored bound, materializing a pending reverse first.
    pub fn max(&self) -> Option<u64> {
        let si = self.for_unary();
        if si.bottom {
            None
        } else {
            Some(si.upper_bound)
        }
    }

    /// Whether the interval is a single concrete value.
    pub fn unique(&self) -> bool {
        match (self.min(), self.max()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Structural equality on `(bits, stride, lower, upper)`.
    ///
    /// This is exact representation equality, not abstract equality; it is
    /// primarily useful in tests.
    pub fn identical(&self, other: &Self) -> bool {
        self.bottom == other.bottom
            && self.bits == other.bits
            && (self.bottom
                || (self.stride == other.stride
                    && self.lower_bound == other.lower_bound
                    && self.upper_bound == other.upper_bound))
    }

    //
    // Concretization
    //

    /// Concretize up to `n` values in unsigned order, walking from the
    /// lower bound in the modular direction.
    pub fn eval(&self, n: usize) -> Vec<u64> {
        let si = self.for_unary();
        let mut results = Vec::new();
        if si.bottom || n == 0 {
            return results;
        }
        if si.stride == 0 {
            results.push(si.lower_bound);
            return results;
        }
        for (lb, ub) in si.unsigned_bounds() {
            let mut v = lb;
            while results.len() < n && v <= ub {
                results.push(v);
                match v.checked_add(si.stride) {
                    Some(next) => v = next,
                    None => break,
                }
            }
        }
        results
    }

    /// Concretize up to `n` values in signed order.
    pub fn eval_signed(&self, n: usize) -> Vec<i128> {
        let si = self.for_unary();
        let mut results = Vec::new();
        if si.bottom || n == 0 {
            return results;
        }
        if si.stride == 0 {
            results.push(bits::to_signed(si.lower_bound, si.bits));
            return results;
        }
        for (lb, ub) in si.signed_bounds() {
            let mut v = lb;
            while results.len() < n && v <= ub {
                results.push(v);
                v += i128::from(si.stride);
            }
        }
        results
    }

    //
    // Operand normalization
    //
    // The public binary operations accept operands of any width and any
    // endianness-flag state. Before a kernel runs, the pair is coerced:
    // widths are harmonized by agnostic extension and the reverse flags
    // are aligned. The boolean returned alongside tells the caller the
    // kernel ran in byte-swapped space, so the result must carry the flag.
    //

    pub(crate) fn for_unary(&self) -> Self {
        if self.reversed {
            self.materialize_reversed()
        } else {
            self.clone()
        }
    }

    pub(crate) fn coerce_pair(&self, other: &Self, harmonize_width: bool) -> (Self, Self, bool) {
        let mut a = self.clone();
        let mut b = other.clone();

        if harmonize_width && a.bits != b.bits {
            let common = a.bits.max(b.bits);
            if a.bits < common {
                // Extension works on the value space, so a pending
                // reverse is materialized first.
                a = a.for_unary().agnostic_extend_inner(common);
            }
            if b.bits < common {
                b = b.for_unary().agnostic_extend_inner(common);
            }
        }

        let mut reversed_space = false;
        match (a.reversed, b.reversed) {
            (true, true) => {
                // Both operands already live in byte-swapped space.
                a.reversed = false;
                b.reversed = false;
                reversed_space = true;
            }
            (true, false) => {
                if b.is_integer() {
                    // Swapping a concrete value is exact; join it in
                    // byte-swapped space instead of degrading `a`.
                    b = b.materialize_reversed();
                    b.reversed = false;
                    a.reversed = false;
                    reversed_space = true;
                } else {
                    a = a.materialize_reversed();
                }
            }
            (false, true) => {
                if a.is_integer() {
                    a = a.materialize_reversed();
                    a.reversed = false;
                    b.reversed = false;
                    reversed_space = true;
                } else {
                    b = b.materialize_reversed();
                }
            }
            (false, false) => {}
        }

        (a, b, reversed_space)
    }

    /// Re-apply the reverse flag to a kernel result when the computation
    /// happened in byte-swapped space.
    pub(crate) fn rewrap_reversed(self, reversed_space: bool) -> Self {
        if reversed_space {
            self.reverse()
        } else {
            self
        }
    }
}

impl fmt::Display for StridedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bottom {
            write!(f, "<{}>[EmptySI]", self.bits)?;
        } else {
            write!(
                f,
                "<{}>0x{:x}[{:#x}, {:#x}]{}",
                self.bits,
                self.stride,
                self.lower_bound,
                self.upper_bound,
                if self.reversed { "R" } else { "" }
            )?;
        }
        if self.uninitialized {
            write!(f, "(uninit)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_singleton_normalizes_stride() {
        let si = StridedInterval::new(8, 5, 7, 7).unwrap();
        assert_eq!(si.stride(), 0);
        assert!(si.is_integer());
        assert_eq!(si.cardinality(), 1);
    }

    #[test]
    fn test_top_canonical_form() {
        // stride 1 with lower == upper + 1 is TOP in disguise.
        let si = StridedInterval::new(8, 1, 0x10, 0x0F).unwrap();
        assert!(si.is_top());
        assert_eq!(si.lower_bound(), 0);
        assert_eq!(si.upper_bound(), 0xFF);
        assert_eq!(si.cardinality(), 256);
    }

    #[test]
    fn test_bounds_are_masked() {
        let si = StridedInterval::new(8, 1, 0x102, 0x1F0).unwrap();
        assert_eq!(si.lower_bound(), 0x02);
        assert_eq!(si.upper_bound(), 0xF0);
    }

    #[test]
    fn test_width_validation() {
        assert!(StridedInterval::new(0, 1, 0, 0).is_err());
        assert!(StridedInterval::new(65, 1, 0, 0).is_err());
        assert!(StridedInterval::new(64, 1, 0, u64::MAX).is_ok());
    }

    #[test]
    fn test_bottom_cardinality() {
        let si = StridedInterval::empty(16).unwrap();
        assert!(si.is_bottom());
        assert!(si.is_empty());
        assert!(!si.is_top());
        assert_eq!(si.cardinality(), 0);
        assert_eq!(si.min(), None);
        assert_eq!(si.max(), None);
    }

    #[test]
    fn test_top_cardinality_at_full_width() {
        let si = StridedInterval::top(64).unwrap();
        assert_eq!(si.cardinality(), 1u128 << 64);
    }

    #[test]
    fn test_wrapped_cardinality() {
        // <4>1[0xE, 0x2] walks 14, 15, 0, 1, 2.
        let si = StridedInterval::new(4, 1, 0xE, 0x2).unwrap();
        assert_eq!(si.cardinality(), 5);
        assert_eq!(si.eval(10), vec![0xE, 0xF, 0x0, 0x1, 0x2]);
    }

    #[test]
    fn test_eval_stride() {
        let si = StridedInterval::new(8, 2, 0x02, 0x0A).unwrap();
        assert_eq!(si.eval(16), vec![2, 4, 6, 8, 10]);
        assert_eq!(si.eval(2), vec![2, 4]);
    }

    #[test]
    fn test_eval_signed_order() {
        // {0x7E, 0x7F, 0x80, 0x81}: signed view is {126, 127, -128, -127}.
        let si = StridedInterval::new(8, 1, 0x7E, 0x81).unwrap();
        assert_eq!(si.eval_signed(8), vec![126, 127, -128, -127]);
    }

    #[test]
    fn test_display_format() {
        let si = StridedInterval::new(8, 2, 0x02, 0x0A).unwrap();
        assert_eq!(si.to_string(), "<8>0x2[0x2, 0xa]");

        let empty = StridedInterval::empty(8).unwrap();
        assert_eq!(empty.to_string(), "<8>[EmptySI]");

        let uninit = StridedInterval::singleton(8, 3)
            .unwrap()
            .with_uninitialized(true);
        assert_eq!(uninit.to_string(), "<8>0x0[0x3, 0x3](uninit)");
    }

    #[test]
    fn test_names_are_unique() {
        let a = StridedInterval::singleton(8, 1).unwrap();
        let b = StridedInterval::singleton(8, 1).unwrap();
        assert_ne!(a.name(), b.name());
        assert_eq!(a.name(), a.clone().name());
        assert_ne!(a.fresh_copy().name(), a.name());
    }

    #[test]
    fn test_identical() {
        let a = StridedInterval::new(8, 2, 0, 10).unwrap();
        let b = StridedInterval::new(8, 2, 0, 10).unwrap();
        let c = StridedInterval::new(8, 2, 0, 12).unwrap();
        assert!(a.identical(&b));
        assert!(!a.identical(&c));
        assert!(StridedInterval::empty(8)
            .unwrap()
            .identical(&StridedInterval::empty(8).unwrap()));
    }

    #[test]
    fn test_serde_round_trip() {
        let si = StridedInterval::new(16, 4, 0x10, 0x20).unwrap();
        let json = serde_json::to_string(&si).unwrap();
        let back: StridedInterval = serde_json::from_str(&json).unwrap();
        assert!(si.identical(&back));
    }

    #[test]
    fn test_unique() {
        assert!(StridedInterval::singleton(8, 3).unwrap().unique());
        assert!(!StridedInterval::top(8).unwrap().unique());
        assert!(!StridedInterval::empty(8).unwrap().unique());
    }
}
