//! Three-valued comparisons.
//!
//! Each comparison splits both operands at the relevant pole, classifies
//! every piece-pair as definitely-true, definitely-false, or overlapping,
//! and folds the classifications: unanimously true pairs prove the
//! property, unanimously false pairs refute it, anything else is `Maybe`.

use crate::types::BoolResult;

use super::StridedInterval;

fn classify<T: Copy + Ord>(
    bounds_1: &[(T, T)],
    bounds_2: &[(T, T)],
    true_case: fn(T, T, T, T) -> bool,
    false_case: fn(T, T, T, T) -> bool,
) -> BoolResult {
    let mut results = Vec::with_capacity(bounds_1.len() * bounds_2.len());
    for &(lb_1, ub_1) in bounds_1 {
        for &(lb_2, ub_2) in bounds_2 {
            results.push(if true_case(lb_1, ub_1, lb_2, ub_2) {
                BoolResult::True
            } else if false_case(lb_1, ub_1, lb_2, ub_2) {
                BoolResult::False
            } else {
                BoolResult::Maybe
            });
        }
    }
    BoolResult::fold_all(results)
}

impl StridedInterval {
    /// Signed less-than.
    pub fn slt(&self, other: &Self) -> BoolResult {
        let (a, b, _) = self.coerce_pair(other, true);
        classify(
            &a.signed_bounds(),
            &b.signed_bounds(),
            |_, ub_1, lb_2, _| ub_1 < lb_2,
            |lb_1, _, _, ub_2| lb_1 >= ub_2,
        )
    }

    /// Signed less-than-or-equal.
    pub fn sle(&self, other: &Self) -> BoolResult {
        let (a, b, _) = self.coerce_pair(other, true);
        classify(
            &a.signed_bounds(),
            &b.signed_bounds(),
            |_, ub_1, lb_2, _| ub_1 <= lb_2,
            |lb_1, _, _, ub_2| lb_1 > ub_2,
        )
    }

    /// Signed greater-than.
    pub fn sgt(&self, other: &Self) -> BoolResult {
        let (a, b, _) = self.coerce_pair(other, true);
        classify(
            &a.signed_bounds(),
            &b.signed_bounds(),
            |lb_1, _, _, ub_2| lb_1 > ub_2,
            |_, ub_1, lb_2, _| ub_1 <= lb_2,
        )
    }

    /// Signed greater-than-or-equal.
    pub fn sge(&self, other: &Self) -> BoolResult {
        let (a, b, _) = self.coerce_pair(other, true);
        classify(
            &a.signed_bounds(),
            &b.signed_bounds(),
            |lb_1, _, _, ub_2| lb_1 >= ub_2,
            |_, ub_1, lb_2, _| ub_1 < lb_2,
        )
    }

    /// Unsigned less-than.
    pub fn ult(&self, other: &Self) -> BoolResult {
        let (a, b, _) = self.coerce_pair(other, true);
        classify(
            &a.unsigned_bounds(),
            &b.unsigned_bounds(),
            |_, ub_1, lb_2, _| ub_1 < lb_2,
            |lb_1, _, _, ub_2| lb_1 >= ub_2,
        )
    }

    /// Unsigned less-than-or-equal.
    pub fn ule(&self, other: &Self) -> BoolResult {
        let (a, b, _) = self.coerce_pair(other, true);
        classify(
            &a.unsigned_bounds(),
            &b.unsigned_bounds(),
            |_, ub_1, lb_2, _| ub_1 <= lb_2,
            |lb_1, _, _, ub_2| lb_1 > ub_2,
        )
    }

    /// Unsigned greater-than.
    pub fn ugt(&self, other: &Self) -> BoolResult {
        let (a, b, _) = self.coerce_pair(other, true);
        classify(
            &a.unsigned_bounds(),
            &b.unsigned_bounds(),
            |lb_1, _, _, ub_2| lb_1 > ub_2,
            |_, ub_1, lb_2, _| ub_1 <= lb_2,
        )
    }

    /// Unsigned greater-than-or-equal.
    pub fn uge(&self, other: &Self) -> BoolResult {
        let (a, b, _) = self.coerce_pair(other, true);
        classify(
            &a.unsigned_bounds(),
            &b.unsigned_bounds(),
            |lb_1, _, _, ub_2| lb_1 >= ub_2,
            |_, ub_1, lb_2, _| ub_1 < lb_2,
        )
    }

    /// Abstract equality.
    ///
    /// Singletons compare by value; intervals carrying the same name are
    /// the same abstract object and compare equal; anything else falls
    /// back to intersection emptiness.
    pub fn eq(&self, other: &Self) -> BoolResult {
        let (a, b, _) = self.coerce_pair(other, true);

        if a.is_integer() && b.is_integer() {
            return BoolResult::from(a.lower_bound == b.lower_bound);
        }

        if a.name == b.name {
            return BoolResult::True;
        }

        let meet = a.intersect_kernel(&b);
        if meet.iter().all(StridedInterval::is_empty) {
            BoolResult::False
        } else {
            BoolResult::Maybe
        }
    }

    /// Abstract inequality: the negation of [`StridedInterval::eq`].
    pub fn ne(&self, other: &Self) -> BoolResult {
        !self.eq(other)
    }
}
