//! Lattice operations: join, meet, widening and complement.
//!
//! The pseudo least-upper-bound follows the signedness-agnostic interval
//! analysis literature: sort the operands, accumulate wrap-heavy pieces
//! first, track the largest gap between consecutive pieces, and take
//! whichever of "gap" and "complement of the hull" is larger, then
//! complement back. Intersection is a case analysis over which bounds
//! fall inside the other operand and may legitimately produce two
//! intervals.

use crate::bits;
use crate::error::{Result, SiError};

use super::StridedInterval;

impl StridedInterval {
    /// Complement on the ring: everything this interval does not cover.
    pub fn complement(&self) -> Self {
        let w = self.bits;
        if self.is_empty() {
            return Self::top_unchecked(w);
        }
        if self.is_top() {
            return Self::empty_unchecked(w);
        }

        let y_plus_1 = bits::madd(self.upper_bound, 1, w);
        let x_minus_1 = bits::msub(self.lower_bound, 1, w);

        // The stride must keep both new bounds reachable, so it is the
        // gcd of the old stride and the new bound distance.
        let dist = bits::wrapped_cardinality(y_plus_1, x_minus_1, w) - 1;
        let new_stride = if self.stride == 0 {
            1
        } else {
            bits::gcd_u128(u128::from(self.stride), dist) as u64
        };

        Self::make(w, new_stride, y_plus_1, x_minus_1)
    }

    /// The interval of values strictly between `s` and `t`, or BOTTOM
    /// when the two touch or overlap.
    fn gap(s: &Self, t: &Self) -> Self {
        let w = s.bits;
        let b = s.upper_bound;
        let c = t.lower_bound;

        if !t.wrapped_member(b) && !s.wrapped_member(c) {
            Self::make(w, 1, c, b).complement()
        } else {
            Self::empty_unchecked(w)
        }
    }

    /// The operand with the larger cardinality; ties pick the first.
    fn bigger(interval_1: &Self, interval_2: &Self) -> Self {
        if interval_2.cardinality() > interval_1.cardinality() {
            interval_2.clone()
        } else {
            interval_1.clone()
        }
    }

    /// Extend `self` so that it also covers `t`, growing from `self`'s
    /// lower bound to `t`'s upper bound when neither contains the other.
    fn interval_extend(&self, t: &Self) -> Self {
        let w = self.bits;

        if self.wrapped_lte(t) {
            return t.clone();
        }
        if t.wrapped_lte(self) {
            return self.clone();
        }
        if self.complement().wrapped_lte(t) {
            return Self::top_unchecked(w);
        }

        let (a, b) = (self.lower_bound, self.upper_bound);
        let c = t.lower_bound;
        let d = t.upper_bound;

        // The new stride has to keep every value of both operands on the
        // grid, in particular `t`'s lower bound measured from `a`.
        let new_stride: u128 = if self.is_integer() && t.is_integer() {
            bits::wrapped_cardinality(a, c, w) - 1
        } else if self.is_integer() {
            bits::gcd_u128(bits::wrapped_cardinality(a, c, w) - 1, u128::from(t.stride))
        } else if t.is_integer() {
            bits::gcd_u128(bits::wrapped_cardinality(b, c, w) - 1, u128::from(self.stride))
        } else {
            bits::gcd_u128(
                u128::from(bits::gcd(self.stride, t.stride)),
                bits::wrapped_cardinality(a, c, w) - 1,
            )
        };

        Self::make(w, new_stride.min(u128::from(u64::MAX)) as u64, a, d)
    }

    /// Pseudo least-upper-bound of a family of same-width intervals.
    ///
    /// An empty (or all-BOTTOM) family joins to BOTTOM of width `bits`.
    pub fn least_upper_bound(bits: u32, intervals: &[Self]) -> Self {
        let live: Vec<&Self> = intervals.iter().filter(|si| !si.is_bottom()).collect();
        if live.is_empty() {
            return Self::empty_unchecked(bits);
        }
        if live.len() == 1 {
            return live[0].clone();
        }

        let mut sorted: Vec<Self> = live.into_iter().cloned().collect();
        sorted.sort_by_key(|si| si.lower_bound);

        let w = bits;
        let mut f = Self::empty_unchecked(w);

        // Wrap-heavy pieces first, so the hull grows around the pole
        // before the gap scan runs.
        for s in &sorted {
            if s.is_top() || bits::lex_lte(s.upper_bound, s.lower_bound, w) {
                f = f.interval_extend(s);
            }
        }

        let mut g = Self::empty_unchecked(w);
        for s in &sorted {
            g = Self::bigger(&g, &Self::gap(&f, s));
            f = f.interval_extend(s);
        }

        let mut si = Self::bigger(&g, &f.complement()).complement();

        si.stride = if si.is_integer() {
            0
        } else if si.is_top() {
            1
        } else {
            sorted
                .iter()
                .fold(sorted[0].stride, |acc, i| bits::gcd(acc, i.stride))
        };
        si.normalized()
    }

    /// Join with another interval, collapsing to a single interval.
    pub fn union(&self, other: &Self) -> Self {
        let (a, b, rev) = self.coerce_pair(other, true);
        Self::least_upper_bound(a.bits, &[a.clone(), b.clone()])
            .inherit_uninit(&a, &b)
            .rewrap_reversed(rev)
    }

    /// Meet with another interval.
    ///
    /// The exact intersection of two wrapped intervals can be two disjoint
    /// intervals, so the result is a set; a single BOTTOM element encodes
    /// disjoint operands.
    pub fn intersection(&self, other: &Self) -> Vec<Self> {
        let (a, b, rev) = self.coerce_pair(other, true);
        a.intersect_kernel(&b)
            .into_iter()
            .map(|si| si.inherit_uninit(&a, &b).rewrap_reversed(rev))
            .collect()
    }

    pub(crate) fn intersect_kernel(&self, t: &Self) -> Vec<Self> {
        let s = self;
        let w = s.bits;

        if s.is_empty() || t.is_empty() {
            return vec![Self::empty_unchecked(w)];
        }

        if s.is_integer() && t.is_integer() {
            return if s.lower_bound == t.lower_bound {
                vec![Self::make(w, 0, s.lower_bound, s.lower_bound)]
            } else {
                vec![Self::empty_unchecked(w)]
            };
        }

        if s.is_integer() {
            return Self::intersect_integer(s.lower_bound, t, w);
        }
        if t.is_integer() {
            return Self::intersect_integer(t.lower_bound, s, w);
        }

        let new_stride = bits::gcd(s.stride, t.stride);

        if (s.lower_bound == t.lower_bound && s.upper_bound == t.upper_bound) || s.is_top() {
            return vec![Self::make(w, new_stride, t.lower_bound, t.upper_bound)];
        }
        if t.is_top() {
            return vec![s.clone()];
        }

        let (a, b) = (s.lower_bound, s.upper_bound);
        let (c, d) = (t.lower_bound, t.upper_bound);

        let t_has_a = t.wrapped_member(a);
        let t_has_b = t.wrapped_member(b);
        let s_has_c = s.wrapped_member(c);
        let s_has_d = s.wrapped_member(d);

        if t_has_a && t_has_b && s_has_c && s_has_d {
            // Mutual straddle: two disjoint overlap regions.
            return vec![
                Self::make(w, new_stride, a, d),
                Self::make(w, new_stride, c, b),
            ];
        }
        if t_has_a && t_has_b {
            return vec![Self::make(w, new_stride, a, b)];
        }
        if s_has_c && s_has_d {
            return vec![Self::make(w, new_stride, c, d)];
        }
        if t_has_a && s_has_d && !t_has_b && !s_has_c {
            return vec![Self::make(w, new_stride, a, d)];
        }
        if t_has_b && s_has_c && !t_has_a && !s_has_d {
            return vec![Self::make(w, new_stride, c, b)];
        }

        vec![Self::empty_unchecked(w)]
    }

    /// Meet of a single value against an interval: the value survives
    /// when it lies inside the bounds and on the stride grid.
    fn intersect_integer(integer: u64, t: &Self, w: u32) -> Vec<Self> {
        let on_grid = t.stride == 0
            || (i128::from(t.lower_bound) - i128::from(integer))
                .rem_euclid(i128::from(t.stride))
                == 0;
        if on_grid && t.wrapped_member(integer) {
            vec![Self::make(w, 0, integer, integer)]
        } else {
            vec![Self::empty_unchecked(w)]
        }
    }

    /// Widening: jump the moving bounds to the stride-aligned extremes so
    /// fixed-point iteration terminates.
    pub fn widen(&self, other: &Self) -> Result<Self> {
        let (a, b, rev) = self.coerce_pair(other, true);
        let w = a.bits;

        let ret = if a.is_empty() && !b.is_empty() {
            Self::top_unchecked(w)
        } else if a.is_empty() {
            b.clone()
        } else if b.is_empty() {
            a.clone()
        } else {
            let new_stride = bits::gcd(a.stride, b.stride);
            let l: i128 = if b.lower_bound < a.lower_bound {
                bits::stride_lower(w, a.lower_bound, new_stride)
            } else {
                i128::from(a.lower_bound)
            };
            let u: i128 = if b.upper_bound > a.upper_bound {
                i128::from(bits::stride_upper(w, a.upper_bound, new_stride))
            } else {
                i128::from(a.upper_bound)
            };

            if new_stride == 0 {
                if a.is_integer() && b.is_integer() {
                    Self::make_signed(w, 1, l, u)
                } else {
                    return Err(SiError::OperandsNotReduced);
                }
            } else {
                Self::make_signed(w, new_stride, l, u)
            }
        };

        Ok(ret.inherit_uninit(&a, &b).rewrap_reversed(rev))
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
    fn test_complement_wrapped() {
        let x = si(4, 1, 0xE, 0x2);
        let c = x.complement();
        assert!(c.identical(&si(4, 1, 0x3, 0xD)));
    }

    #[test]
    fn test_complement_edges() {
        let top = StridedInterval::top(8).unwrap();
        let bottom = StridedInterval::empty(8).unwrap();
        assert!(top.complement().is_bottom());
        assert!(bottom.complement().is_top());
        assert!(top.complement().complement().is_top());
        assert!(bottom.complement().complement().is_bottom());
    }

    #[test]
    fn test_complement_singleton_round_trip() {
        let x = int(8, 0x42);
        let c = x.complement();
        assert_eq!(c.cardinality(), 255);
        assert!(!c.wrapped_member(0x42));
        assert!(c.complement().identical(&x));
    }

    #[test]
    fn test_union_disjoint_hull() {
        let x = si(8, 1, 0x10, 0x20);
        let y = si(8, 1, 0x30, 0x40);
        let u = x.union(&y);
        assert!(x.wrapped_lte(&u));
        assert!(y.wrapped_lte(&u));
        assert!(u.wrapped_member(0x10));
        assert!(u.wrapped_member(0x40));
    }

    #[test]
    fn test_union_wrap_heavy_piece() {
        let wrapped = si(8, 1, 0xF0, 0x10);
        let mid = si(8, 1, 0x20, 0x30);
        let u = wrapped.union(&mid);
        assert!(wrapped.wrapped_lte(&u));
        assert!(mid.wrapped_lte(&u));
    }

    #[test]
    fn test_union_with_bottom() {
        let x = si(8, 2, 0x02, 0x0A);
        let bottom = StridedInterval::empty(8).unwrap();
        assert!(x.union(&bottom).identical(&x));
        assert!(bottom.union(&x).identical(&x));
    }

    #[test]
    fn test_union_stride_gcd() {
        let x = si(8, 4, 0x00, 0x10);
        let y = si(8, 6, 0x20, 0x38);
        let u = x.union(&y);
        assert!(u.stride() == bits::gcd(4, 6) || u.is_top());
        assert!(x.wrapped_lte(&u));
        assert!(y.wrapped_lte(&u));
    }

    #[test]
    fn test_least_upper_bound_empty_family() {
        let joined = StridedInterval::least_upper_bound(8, &[]);
        assert!(joined.is_bottom());
        assert_eq!(joined.bits(), 8);
    }

    #[test]
    fn test_intersection_overlap() {
        let x = si(8, 1, 0x10, 0x30);
        let y = si(8, 1, 0x20, 0x40);
        let meet = x.intersection(&y);
        assert_eq!(meet.len(), 1);
        assert!(meet[0].identical(&si(8, 1, 0x20, 0x30)));
    }

    #[test]
    fn test_intersection_disjoint() {
        let x = si(8, 1, 0x10, 0x20);
        let y = si(8, 1, 0x30, 0x40);
        let meet = x.intersection(&y);
        assert_eq!(meet.len(), 1);
        assert!(meet[0].is_bottom());
    }

    #[test]
    fn test_intersection_contained() {
        let inner = si(8, 1, 0x18, 0x28);
        let outer = si(8, 1, 0x10, 0x30);
        let meet = outer.intersection(&inner);
        assert_eq!(meet.len(), 1);
        assert_eq!(meet[0].lower_bound(), 0x18);
        assert_eq!(meet[0].upper_bound(), 0x28);
    }

    #[test]
    fn test_intersection_mutual_straddle() {
        // Two wrapped intervals overlapping on both sides of the pole.
        let s = si(8, 1, 0xE0, 0x40);
        let t = si(8, 1, 0x20, 0xF0);
        let meet = s.intersection(&t);
        assert_eq!(meet.len(), 2);
        for piece in &meet {
            assert!(!piece.is_bottom());
        }
    }

    #[test]
    fn test_intersection_integer_on_grid() {
        let grid = si(8, 3, 0x02, 0x0B); // {2, 5, 8, 11}
        let hit = int(8, 0x08);
        let miss = int(8, 0x07);
        let outside = int(8, 0x20);

        let meet = grid.intersection(&hit);
        assert!(meet[0].identical(&int(8, 0x08)));
        assert!(grid.intersection(&miss)[0].is_bottom());
        assert!(grid.intersection(&outside)[0].is_bottom());
    }

    #[test]
    fn test_intersection_singletons_by_value() {
        // Equal values with different names still meet.
        let a = int(8, 7);
        let b = int(8, 7);
        let meet = a.intersection(&b);
        assert!(meet[0].identical(&int(8, 7)));
    }

    #[test]
    fn test_intersection_with_top() {
        let x = si(8, 2, 0x02, 0x0A);
        let top = StridedInterval::top(8).unwrap();
        let meet = x.intersection(&top);
        assert_eq!(meet.len(), 1);
        assert_eq!(meet[0].lower_bound(), 0x02);
        assert_eq!(meet[0].upper_bound(), 0x0A);
    }

    #[test]
    fn test_meet_is_below_operands() {
        let x = si(8, 1, 0x10, 0x30);
        let y = si(8, 1, 0x20, 0x40);
        for piece in x.intersection(&y) {
            assert!(piece.wrapped_lte(&x));
            assert!(piece.wrapped_lte(&y));
        }
    }

    #[test]
    fn test_widen_growing_upper_bound() {
        let a = si(8, 2, 0x02, 0x0A);
        let b = si(8, 2, 0x02, 0x0C);
        let w = a.widen(&b).unwrap();
        assert_eq!(w.lower_bound(), 0x02);
        // Upper bound jumps to the stride-aligned maximum.
        assert_eq!(w.upper_bound() % 2, 0);
        assert!(w.upper_bound() >= 0xFC);
    }

    #[test]
    fn test_widen_growing_lower_bound() {
        let a = si(8, 1, 0x10, 0x20);
        let b = si(8, 1, 0x08, 0x20);
        let w = a.widen(&b).unwrap();
        // Lower bound jumps toward the signed minimum, stored unsigned.
        assert_eq!(w.lower_bound(), 0x80);
        assert_eq!(w.upper_bound(), 0x20);
    }

    #[test]
    fn test_widen_stable_operand_is_identity() {
        let a = si(8, 2, 0x02, 0x0A);
        let b = si(8, 2, 0x02, 0x0A);
        let w = a.widen(&b).unwrap();
        assert!(w.identical(&a));
    }

    #[test]
    fn test_widen_empty_cases() {
        let bottom = StridedInterval::empty(8).unwrap();
        let x = si(8, 1, 0x10, 0x20);
        assert!(bottom.widen(&x).unwrap().is_top());
        assert!(x.widen(&bottom).unwrap().identical(&x));
        assert!(bottom.widen(&bottom.clone()).unwrap().is_bottom());
    }

    #[test]
    fn test_widen_two_integers() {
        let a = int(8, 4);
        let b = int(8, 8);
        let w = a.widen(&b).unwrap();
        // gcd of two singleton strides is 0: re-seeded with stride 1.
        assert_eq!(w.stride(), 1);
        assert_eq!(w.lower_bound(), 4);
    }

    #[test]
    fn test_double_complement_over_approximates() {
        let x = si(8, 3, 0x06, 0x0F); // {6, 9, 12, 15}
        let cc = x.complement().complement();
        assert!(x.wrapped_lte(&cc));
    }
}
