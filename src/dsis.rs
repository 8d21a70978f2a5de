//! Discrete strided-interval sets.
//!
//! An opt-in refinement of the join: instead of collapsing two intervals
//! into one hull immediately, a `DiscreteStridedIntervalSet` keeps them
//! side by side until the total number of described values crosses
//! [`MAX_CARDINALITY_WITHOUT_COLLAPSING`], at which point the set folds
//! back into a single interval via the least upper bound.
//!
//! The refinement is disabled by default; [`set_dsis_enabled`] flips the
//! process-wide switch consulted by the [`crate::value::Value`] layer.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiError};
use crate::interval::StridedInterval;

/// Total-cardinality cap above which a set collapses to one interval.
pub const MAX_CARDINALITY_WITHOUT_COLLAPSING: u128 = 256;

static DSIS_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable or disable the discrete-set refinement process-wide.
pub fn set_dsis_enabled(enabled: bool) {
    DSIS_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether the discrete-set refinement is currently enabled.
pub fn dsis_enabled() -> bool {
    DSIS_ENABLED.load(Ordering::Relaxed)
}

/// A set of same-width strided intervals kept discrete up to a
/// cardinality cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscreteStridedIntervalSet {
    bits: u32,
    intervals: Vec<StridedInterval>,
}

impl DiscreteStridedIntervalSet {
    /// Create a set holding a single interval.
    pub fn from_interval(si: StridedInterval) -> Self {
        DiscreteStridedIntervalSet {
            bits: si.bits(),
            intervals: vec![si],
        }
    }

    /// Create a set from a family of same-width intervals.
    pub fn new(bits: u32, intervals: Vec<StridedInterval>) -> Result<Self> {
        if bits == 0 || bits > 64 {
            return Err(SiError::InvalidWidth { bits });
        }
        let mut set = DiscreteStridedIntervalSet {
            bits,
            intervals: Vec::new(),
        };
        for si in intervals {
            set.push(si);
        }
        Ok(set)
    }

    /// Bit width of every member.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// The member intervals.
    pub fn intervals(&self) -> &[StridedInterval] {
        &self.intervals
    }

    /// Total number of concrete values described across all members.
    pub fn number_of_values(&self) -> u128 {
        self.intervals.iter().map(StridedInterval::cardinality).sum()
    }

    /// Whether the set has outgrown the discrete representation.
    pub fn should_collapse(&self) -> bool {
        self.number_of_values() > MAX_CARDINALITY_WITHOUT_COLLAPSING
    }

    /// Fold the set into a single interval.
    pub fn collapse(&self) -> StridedInterval {
        StridedInterval::least_upper_bound(self.bits, &self.intervals)
    }

    /// Add one interval, dropping structural duplicates and BOTTOMs.
    pub fn push(&mut self, si: StridedInterval) {
        if si.is_bottom() {
            return;
        }
        if self.intervals.iter().any(|existing| existing.identical(&si)) {
            return;
        }
        self.intervals.push(si);
    }

    /// Union with a single interval.
    pub fn union_interval(&self, si: &StridedInterval) -> Self {
        let mut out = self.clone();
        out.push(si.clone());
        out
    }

    /// Union with another set.
    pub fn union_set(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for si in &other.intervals {
            out.push(si.clone());
        }
        out
    }

    /// Apply a unary interval operation member-wise. The result width
    /// follows the mapped intervals, so width-changing operations work.
    pub fn map_unary<F>(&self, f: F) -> Self
    where
        F: Fn(&StridedInterval) -> StridedInterval,
    {
        let mapped: Vec<StridedInterval> = self.intervals.iter().map(&f).collect();
        Self::from_mapped(self.bits, mapped)
    }

    /// Apply a binary interval operation against every member of
    /// another set, cross-product style.
    pub fn map_binary<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(&StridedInterval, &StridedInterval) -> StridedInterval,
    {
        let mut mapped = Vec::with_capacity(self.intervals.len() * other.intervals.len());
        for a in &self.intervals {
            for b in &other.intervals {
                mapped.push(f(a, b));
            }
        }
        Self::from_mapped(self.bits, mapped)
    }

    fn from_mapped(fallback_bits: u32, mapped: Vec<StridedInterval>) -> Self {
        let bits = mapped
            .first()
            .map_or(fallback_bits, StridedInterval::bits);
        let mut out = DiscreteStridedIntervalSet {
            bits,
            intervals: Vec::new(),
        };
        for si in mapped {
            out.push(si);
        }
        out
    }
}
