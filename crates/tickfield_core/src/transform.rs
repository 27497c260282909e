// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rational time transforms between nested sequence spaces.

use crate::range::{tick, RangeBound, TickTime, TimeRange};
use num_rational::Ratio;
use serde::{Deserialize, Serialize};

/// An invertible linear mapping of the tick domain: `t -> t * scale + offset`.
///
/// Scale and offset are exact rationals, so composition and inversion are
/// closed and lossless; transforming a range through a transform and back
/// through its inverse is the identity for every input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeTransform {
    scale: TickTime,
    offset: TickTime,
}

impl TimeTransform {
    /// Build a transform from a nonzero scale and an offset.
    ///
    /// # Panics
    ///
    /// Panics when `scale` is zero; a degenerate transform is a programming
    /// error, not a runtime condition.
    pub fn new(scale: TickTime, offset: TickTime) -> Self {
        assert!(scale != Ratio::from_integer(0), "transform scale must be nonzero");
        Self { scale, offset }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            scale: tick(1),
            offset: tick(0),
        }
    }

    /// Pure translation by an integer tick count.
    pub fn from_offset(offset: i64) -> Self {
        Self::new(tick(1), tick(offset))
    }

    /// The scale factor.
    pub fn scale(&self) -> TickTime {
        self.scale
    }

    /// The offset term.
    pub fn offset(&self) -> TickTime {
        self.offset
    }

    /// Map a single position.
    pub fn apply_time(&self, time: TickTime) -> TickTime {
        time * self.scale + self.offset
    }

    fn apply_bound(&self, bound: RangeBound) -> RangeBound {
        match bound {
            RangeBound::Unbounded => RangeBound::Unbounded,
            RangeBound::Closed(v) => RangeBound::Closed(self.apply_time(v)),
            RangeBound::Open(v) => RangeBound::Open(self.apply_time(v)),
        }
    }

    /// Map a range, preserving bound openness. Unbounded ends stay unbounded.
    ///
    /// A negative scale reverses the direction of time, so the mapped bounds
    /// swap roles.
    pub fn apply(&self, range: TimeRange) -> TimeRange {
        let lower = self.apply_bound(range.lower);
        let upper = self.apply_bound(range.upper);
        if self.scale < tick(0) {
            TimeRange::new(upper, lower)
        } else {
            TimeRange::new(lower, upper)
        }
    }

    /// Compose: the result applies `self` first, then `next`.
    pub fn then(&self, next: &TimeTransform) -> TimeTransform {
        TimeTransform {
            scale: self.scale * next.scale,
            offset: self.offset * next.scale + next.offset,
        }
    }

    /// The exact inverse transform.
    pub fn invert(&self) -> TimeTransform {
        let scale = self.scale.recip();
        TimeTransform {
            scale,
            offset: -self.offset * scale,
        }
    }
}

impl Default for TimeTransform {
    fn default() -> Self {
        Self::identity()
    }
}
