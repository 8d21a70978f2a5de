//! Wrapped membership and the abstract-domain poset.

use crate::bits;

use super::StridedInterval;

impl StridedInterval {
    /// Whether the concrete value `v` falls inside the wrapped interval
    /// spanned by the stored bounds.
    ///
    /// This is the pure bound test from the wrapped-interval papers: the
    /// stride is deliberately ignored, which is what the lattice helpers
    /// (`gap`, `interval_extend`, `intersection`) require.
    pub fn wrapped_member(&self, v: u64) -> bool {
        bits::lex_lte(
            v.wrapping_sub(self.lower_bound),
            self.upper_bound.wrapping_sub(self.lower_bound),
            self.bits,
        )
    }

    /// Poset ordering: whether `self` is included in `other`.
    ///
    /// BOTTOM is below everything, TOP is above everything, and otherwise
    /// both endpoints of `self` must be members of `other` while `other`
    /// is not in turn swallowed by `self`.
    pub fn wrapped_lte(&self, other: &Self) -> bool {
        if self.is_empty() {
            return true;
        }
        if other.is_empty() {
            return false;
        }
        if self.is_top() && other.is_top() {
            return true;
        }
        if self.is_top() {
            return false;
        }
        if other.is_top() {
            return true;
        }

        if other.wrapped_member(self.lower_bound) && other.wrapped_member(self.upper_bound) {
            if (other.lower_bound == self.lower_bound && other.upper_bound == self.upper_bound)
                || !self.wrapped_member(other.lower_bound)
                || !self.wrapped_member(other.upper_bound)
            {
                return true;
            }
        }
        false
    }
}
