//! The outer dispatch layer.
//!
//! Analyses rarely hold a bare interval: a conditional with an undecided
//! guard produces one value per branch, and the discrete-set refinement
//! produces a family of intervals. [`Value`] is the tagged union over
//! those shapes. Every operation peels the structure down to plain
//! intervals, runs the interval kernel, and rebuilds the same structure
//! around the results, so the interval engine itself never sees a proxy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dsis::{dsis_enabled, DiscreteStridedIntervalSet, MAX_CARDINALITY_WITHOUT_COLLAPSING};
use crate::error::{Result, SiError};
use crate::interval::StridedInterval;
use crate::types::{BitVec, BoolResult};

/// An if-then-else value whose guard could not be decided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfProxy {
    condition: BoolResult,
    when_true: Value,
    when_false: Value,
}

impl IfProxy {
    /// The three-valued guard.
    pub fn condition(&self) -> BoolResult {
        self.condition
    }

    /// The value of the true branch.
    pub fn when_true(&self) -> &Value {
        &self.when_true
    }

    /// The value of the false branch.
    pub fn when_false(&self) -> &Value {
        &self.when_false
    }
}

/// An abstract bit-vector value: a single interval, a discrete set of
/// intervals, or a branch proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// A single strided interval.
    Interval(StridedInterval),
    /// A discrete family of intervals below the collapse cap.
    Set(DiscreteStridedIntervalSet),
    /// Both outcomes of an undecided conditional.
    If(Box<IfProxy>),
}

impl Value {
    /// Build the value of an if-then-else with a three-valued guard.
    ///
    /// A decided guard selects a branch outright; only `Maybe` produces a
    /// proxy.
    pub fn ite(condition: BoolResult, when_true: Value, when_false: Value) -> Value {
        match condition {
            BoolResult::True => when_true,
            BoolResult::False => when_false,
            BoolResult::Maybe => Value::If(Box::new(IfProxy {
                condition,
                when_true,
                when_false,
            })),
        }
    }

    fn from_set(set: DiscreteStridedIntervalSet) -> Value {
        if set.intervals().is_empty() || set.should_collapse() {
            Value::Interval(set.collapse())
        } else {
            Value::Set(set)
        }
    }

    /// Bit width of the carried value.
    pub fn bits(&self) -> u32 {
        match self {
            Value::Interval(si) => si.bits(),
            Value::Set(set) => set.bits(),
            Value::If(proxy) => proxy.when_true.bits(),
        }
    }

    /// Number of concrete values this abstract value may take.
    pub fn cardinality(&self) -> u128 {
        match self {
            Value::Interval(si) => si.cardinality(),
            Value::Set(set) => set.number_of_values(),
            Value::If(proxy) => proxy.when_true.cardinality() + proxy.when_false.cardinality(),
        }
    }

    /// Concretize up to `n` values, true branch first for proxies.
    pub fn eval(&self, n: usize) -> Vec<u64> {
        match self {
            Value::Interval(si) => si.eval(n),
            Value::Set(set) => {
                let mut out = Vec::new();
                for si in set.intervals() {
                    if out.len() >= n {
                        break;
                    }
                    for v in si.eval(n - out.len()) {
                        if !out.contains(&v) {
                            out.push(v);
                        }
                    }
                }
                out.truncate(n);
                out
            }
            Value::If(proxy) => {
                let mut out = proxy.when_true.eval(n);
                if out.len() < n {
                    for v in proxy.when_false.eval(n - out.len()) {
                        if !out.contains(&v) {
                            out.push(v);
                        }
                    }
                }
                out.truncate(n);
                out
            }
        }
    }

    //
    // Structural dispatch
    //

    fn map_unary(&self, f: &dyn Fn(&StridedInterval) -> StridedInterval) -> Value {
        match self {
            Value::Interval(si) => Value::Interval(f(si)),
            Value::Set(set) => Value::from_set(set.map_unary(f)),
            Value::If(proxy) => Value::If(Box::new(IfProxy {
                condition: proxy.condition,
                when_true: proxy.when_true.map_unary(f),
                when_false: proxy.when_false.map_unary(f),
            })),
        }
    }

    fn map_binary(
        &self,
        other: &Value,
        f: &dyn Fn(&StridedInterval, &StridedInterval) -> StridedInterval,
    ) -> Value {
        match (self, other) {
            // Correlated branches: both proxies are assumed to take the
            // same side of the condition.
            (Value::If(p), Value::If(q)) => Value::If(Box::new(IfProxy {
                condition: p.condition,
                when_true: p.when_true.map_binary(&q.when_true, f),
                when_false: p.when_false.map_binary(&q.when_false, f),
            })),
            (Value::If(p), o) => Value::If(Box::new(IfProxy {
                condition: p.condition,
                when_true: p.when_true.map_binary(o, f),
                when_false: p.when_false.map_binary(o, f),
            })),
            (s, Value::If(q)) => Value::If(Box::new(IfProxy {
                condition: q.condition,
                when_true: s.map_binary(&q.when_true, f),
                when_false: s.map_binary(&q.when_false, f),
            })),
            (Value::Set(s), Value::Set(t)) => Value::from_set(s.map_binary(t, f)),
            (Value::Set(s), Value::Interval(i)) => {
                let singleton = DiscreteStridedIntervalSet::from_interval(i.clone());
                Value::from_set(s.map_binary(&singleton, f))
            }
            (Value::Interval(i), Value::Set(t)) => {
                let singleton = DiscreteStridedIntervalSet::from_interval(i.clone());
                Value::from_set(singleton.map_binary(t, f))
            }
            (Value::Interval(a), Value::Interval(b)) => Value::Interval(f(a, b)),
        }
    }

    fn compare_with(
        &self,
        other: &Value,
        f: &dyn Fn(&StridedInterval, &StridedInterval) -> BoolResult,
    ) -> BoolResult {
        match (self, other) {
            (Value::If(p), o) => {
                let t = p.when_true.compare_with(o, f);
                let e = p.when_false.compare_with(o, f);
                if t == e {
                    t
                } else {
                    BoolResult::Maybe
                }
            }
            (s, Value::If(q)) => {
                let t = s.compare_with(&q.when_true, f);
                let e = s.compare_with(&q.when_false, f);
                if t == e {
                    t
                } else {
                    BoolResult::Maybe
                }
            }
            (Value::Set(s), o) => BoolResult::fold_all(
                s.intervals()
                    .iter()
                    .map(|si| Value::Interval(si.clone()).compare_with(o, f)),
            ),
            (s, Value::Set(t)) => BoolResult::fold_all(
                t.intervals()
                    .iter()
                    .map(|si| s.compare_with(&Value::Interval(si.clone()), f)),
            ),
            (Value::Interval(a), Value::Interval(b)) => f(a, b),
        }
    }

    //
    // Arithmetic
    //

    /// Abstract addition.
    pub fn add(&self, other: &Value) -> Value {
        self.map_binary(other, &|a, b| a.add(b))
    }

    /// Abstract subtraction.
    pub fn sub(&self, other: &Value) -> Value {
        self.map_binary(other, &|a, b| a.sub(b))
    }

    /// Abstract negation.
    pub fn neg(&self) -> Value {
        self.map_unary(&StridedInterval::neg)
    }

    /// Abstract multiplication.
    pub fn mul(&self, other: &Value) -> Value {
        self.map_binary(other, &|a, b| a.mul(b))
    }

    /// Abstract unsigned division.
    pub fn udiv(&self, other: &Value) -> Value {
        self.map_binary(other, &|a, b| a.udiv(b))
    }

    /// Abstract signed division.
    pub fn sdiv(&self, other: &Value) -> Value {
        self.map_binary(other, &|a, b| a.sdiv(b))
    }

    /// Abstract remainder.
    pub fn rem(&self, other: &Value) -> Value {
        self.map_binary(other, &|a, b| a.rem(b))
    }

    //
    // Bitwise
    //

    /// Abstract bitwise AND.
    pub fn bitwise_and(&self, other: &Value) -> Value {
        self.map_binary(other, &|a, b| a.bitwise_and(b))
    }

    /// Abstract bitwise OR.
    pub fn bitwise_or(&self, other: &Value) -> Value {
        self.map_binary(other, &|a, b| a.bitwise_or(b))
    }

    /// Abstract bitwise XOR.
    pub fn bitwise_xor(&self, other: &Value) -> Value {
        self.map_binary(other, &|a, b| a.bitwise_xor(b))
    }

    /// Abstract bitwise NOT.
    pub fn bitwise_not(&self) -> Value {
        self.map_unary(&StridedInterval::bitwise_not)
    }

    /// Abstract left shift.
    pub fn lshift(&self, amount: &Value) -> Value {
        self.map_binary(amount, &|a, b| a.lshift(b))
    }

    /// Abstract right shift.
    pub fn rshift(&self, amount: &Value, preserve_sign: bool) -> Value {
        self.map_binary(amount, &|a, b| a.rshift(b, preserve_sign))
    }

    //
    // Width operations
    //

    /// Extract the bit range `[high:low]`.
    pub fn extract(&self, high: u32, low: u32) -> Result<Value> {
        let bits = self.bits();
        if high < low || high >= bits {
            return Err(SiError::InvalidExtract { high, low, bits });
        }
        Ok(self.map_unary(&|si| si.for_unary().extract_inner(high, low).inherit_uninit_from(si)))
    }

    /// Keep the low `to_bits` bits.
    pub fn cast_low(&self, to_bits: u32) -> Result<Value> {
        let bits = self.bits();
        if to_bits == 0 {
            return Err(SiError::InvalidWidth { bits: to_bits });
        }
        if to_bits > bits {
            return Err(SiError::InvalidCast {
                from: bits,
                to: to_bits,
            });
        }
        Ok(self.map_unary(&|si| si.for_unary().cast_low_inner(to_bits).inherit_uninit_from(si)))
    }

    /// Zero-extend to `new_bits`.
    pub fn zero_extend(&self, new_bits: u32) -> Result<Value> {
        self.check_extension(new_bits)?;
        Ok(self.map_unary(&|si| si.for_unary().resize_unchecked(new_bits)))
    }

    /// Sign-extend to `new_bits`.
    ///
    /// This dispatches to the real sign extension; a sign-extension
    /// request never degrades to a zero extension.
    pub fn sign_extend(&self, new_bits: u32) -> Result<Value> {
        self.check_extension(new_bits)?;
        Ok(self.map_unary(&|si| si.for_unary().sign_extend_inner(new_bits).inherit_uninit_from(si)))
    }

    /// Extend to `new_bits` soundly for both signedness readings.
    pub fn agnostic_extend(&self, new_bits: u32) -> Result<Value> {
        self.check_extension(new_bits)?;
        Ok(self.map_unary(&|si| {
            si.for_unary()
                .agnostic_extend_inner(new_bits)
                .inherit_uninit_from(si)
        }))
    }

    fn check_extension(&self, new_bits: u32) -> Result<()> {
        if new_bits > 64 {
            return Err(SiError::WidthOverflow { bits: new_bits });
        }
        if new_bits < self.bits() {
            return Err(SiError::InvalidCast {
                from: self.bits(),
                to: new_bits,
            });
        }
        Ok(())
    }

    /// Concatenate, `self` high and `other` low.
    pub fn concat(&self, other: &Value) -> Result<Value> {
        let new_bits = self.bits() + other.bits();
        if new_bits > 64 {
            return Err(SiError::WidthOverflow { bits: new_bits });
        }
        Ok(self.map_binary(other, &|a, b| {
            let (x, y, rev) = a.coerce_pair(b, false);
            x.concat_kernel(&y).inherit_uninit(&x, &y).rewrap_reversed(rev)
        }))
    }

    /// Concatenate a sequence of values, first element highest.
    pub fn concat_all(values: &[Value]) -> Result<Value> {
        let mut iter = values.iter();
        let Some(first) = iter.next() else {
            return Err(SiError::InvalidWidth { bits: 0 });
        };
        let mut acc = first.clone();
        for v in iter {
            acc = acc.concat(v)?;
        }
        Ok(acc)
    }

    /// Lazily flip endianness.
    pub fn reverse(&self) -> Value {
        self.map_unary(&StridedInterval::reverse)
    }

    //
    // Lattice
    //

    /// Join. With the discrete-set refinement enabled, small interval
    /// operands stay discrete instead of collapsing into a hull.
    pub fn union(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Interval(a), Value::Interval(b)) => {
                if dsis_enabled()
                    && a.cardinality() <= MAX_CARDINALITY_WITHOUT_COLLAPSING
                    && b.cardinality() <= MAX_CARDINALITY_WITHOUT_COLLAPSING
                {
                    let mut set = DiscreteStridedIntervalSet::from_interval(a.clone());
                    set.push(b.clone());
                    Value::from_set(set)
                } else {
                    Value::Interval(a.union(b))
                }
            }
            (Value::Set(s), Value::Set(t)) => Value::from_set(s.union_set(t)),
            (Value::Set(s), Value::Interval(i)) | (Value::Interval(i), Value::Set(s)) => {
                Value::from_set(s.union_interval(i))
            }
            _ => self.map_binary(other, &|a, b| a.union(b)),
        }
    }

    /// Meet, collapsed to a single value per structural slot.
    pub fn intersection(&self, other: &Value) -> Value {
        self.map_binary(other, &|a, b| {
            let pieces = a.intersection(b);
            let bits = pieces.first().map_or(a.bits(), StridedInterval::bits);
            StridedInterval::least_upper_bound(bits, &pieces)
        })
    }

    /// Widening.
    pub fn widen(&self, other: &Value) -> Result<Value> {
        let error = std::cell::RefCell::new(None);
        let widened = self.map_binary(other, &|a, b| match a.widen(b) {
            Ok(si) => si,
            Err(e) => {
                *error.borrow_mut() = Some(e);
                StridedInterval::top_unchecked(a.bits())
            }
        });
        match error.into_inner() {
            Some(e) => Err(e),
            None => Ok(widened),
        }
    }

    //
    // Comparisons
    //

    /// Signed less-than.
    pub fn slt(&self, other: &Value) -> BoolResult {
        self.compare_with(other, &|a, b| a.slt(b))
    }

    /// Signed less-than-or-equal.
    pub fn sle(&self, other: &Value) -> BoolResult {
        self.compare_with(other, &|a, b| a.sle(b))
    }

    /// Signed greater-than.
    pub fn sgt(&self, other: &Value) -> BoolResult {
        self.compare_with(other, &|a, b| a.sgt(b))
    }

    /// Signed greater-than-or-equal.
    pub fn sge(&self, other: &Value) -> BoolResult {
        self.compare_with(other, &|a, b| a.sge(b))
    }

    /// Unsigned less-than.
    pub fn ult(&self, other: &Value) -> BoolResult {
        self.compare_with(other, &|a, b| a.ult(b))
    }

    /// Unsigned less-than-or-equal.
    pub fn ule(&self, other: &Value) -> BoolResult {
        self.compare_with(other, &|a, b| a.ule(b))
    }

    /// Unsigned greater-than.
    pub fn ugt(&self, other: &Value) -> BoolResult {
        self.compare_with(other, &|a, b| a.ugt(b))
    }

    /// Unsigned greater-than-or-equal.
    pub fn uge(&self, other: &Value) -> BoolResult {
        self.compare_with(other, &|a, b| a.uge(b))
    }

    /// Abstract equality.
    pub fn eq(&self, other: &Value) -> BoolResult {
        self.compare_with(other, &|a, b| a.eq(b))
    }

    /// Abstract inequality.
    pub fn ne(&self, other: &Value) -> BoolResult {
        !self.eq(other)
    }
}

impl From<StridedInterval> for Value {
    fn from(si: StridedInterval) -> Value {
        Value::Interval(si)
    }
}

impl From<BitVec> for Value {
    fn from(bv: BitVec) -> Value {
        Value::Interval(StridedInterval::from_bitvec(&bv))
    }
}

impl From<DiscreteStridedIntervalSet> for Value {
    fn from(set: DiscreteStridedIntervalSet) -> Value {
        Value::from_set(set)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Interval(si) => write!(f, "{si}"),
            Value::Set(set) => {
                write!(f, "{{")?;
                for (i, si) in set.intervals().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{si}")?;
                }
                write!(f, "}}")
            }
            Value::If(proxy) => write!(
                f,
                "If({}, {}, {})",
                proxy.condition, proxy.when_true, proxy.when_false
            ),
        }
    }
}
