// SPDX-License-Identifier: MIT OR Apache-2.0
//! Time ranges over the tick domain, with open, closed and unbounded ends.

use num_rational::Ratio;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Exact position in a sequence's tick domain.
///
/// Authored content sits on integer ticks; rational positions appear only as
/// images of ticks under a [`TimeTransform`](crate::transform::TimeTransform),
/// which keeps transform round-trips exact.
pub type TickTime = Ratio<i64>;

/// Convert an integer tick to an exact time position.
pub fn tick(value: i64) -> TickTime {
    TickTime::from_integer(value)
}

/// One end of a [`TimeRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeBound {
    /// Extends indefinitely.
    Unbounded,
    /// Includes its position.
    Closed(TickTime),
    /// Excludes its position.
    Open(TickTime),
}

impl RangeBound {
    /// Closed bound at an integer tick.
    pub fn closed(value: i64) -> Self {
        Self::Closed(tick(value))
    }

    /// Open bound at an integer tick.
    pub fn open(value: i64) -> Self {
        Self::Open(tick(value))
    }

    /// The bound's position, if finite.
    pub fn value(&self) -> Option<TickTime> {
        match self {
            Self::Unbounded => None,
            Self::Closed(v) | Self::Open(v) => Some(*v),
        }
    }
}

/// Total order of two bounds interpreted as range *lower* ends.
///
/// `Unbounded` starts earliest; at equal positions a closed bound starts
/// before an open one.
pub fn cmp_lower(a: RangeBound, b: RangeBound) -> Ordering {
    use RangeBound::{Closed, Open, Unbounded};
    match (a, b) {
        (Unbounded, Unbounded) => Ordering::Equal,
        (Unbounded, _) => Ordering::Less,
        (_, Unbounded) => Ordering::Greater,
        (Closed(x), Closed(y)) | (Open(x), Open(y)) => x.cmp(&y),
        (Closed(x), Open(y)) => x.cmp(&y).then(Ordering::Less),
        (Open(x), Closed(y)) => x.cmp(&y).then(Ordering::Greater),
    }
}

/// Total order of two bounds interpreted as range *upper* ends.
///
/// `Unbounded` ends latest; at equal positions an open bound ends before a
/// closed one.
pub fn cmp_upper(a: RangeBound, b: RangeBound) -> Ordering {
    use RangeBound::{Closed, Open, Unbounded};
    match (a, b) {
        (Unbounded, Unbounded) => Ordering::Equal,
        (Unbounded, _) => Ordering::Greater,
        (_, Unbounded) => Ordering::Less,
        (Closed(x), Closed(y)) | (Open(x), Open(y)) => x.cmp(&y),
        (Closed(x), Open(y)) => x.cmp(&y).then(Ordering::Greater),
        (Open(x), Closed(y)) => x.cmp(&y).then(Ordering::Less),
    }
}

/// The lower edge of the region immediately after an upper bound.
///
/// `None` for an unbounded upper end (there is nothing after it).
pub fn lower_edge_after(upper: RangeBound) -> Option<RangeBound> {
    match upper {
        RangeBound::Unbounded => None,
        RangeBound::Closed(v) => Some(RangeBound::Open(v)),
        RangeBound::Open(v) => Some(RangeBound::Closed(v)),
    }
}

/// The upper edge of the region immediately before a lower bound.
///
/// `None` for an unbounded lower end.
pub fn upper_edge_before(lower: RangeBound) -> Option<RangeBound> {
    match lower {
        RangeBound::Unbounded => None,
        RangeBound::Closed(v) => Some(RangeBound::Open(v)),
        RangeBound::Open(v) => Some(RangeBound::Closed(v)),
    }
}

/// A contiguous span of the tick domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Lower end.
    pub lower: RangeBound,
    /// Upper end.
    pub upper: RangeBound,
}

impl TimeRange {
    /// Range between two bounds.
    pub fn new(lower: RangeBound, upper: RangeBound) -> Self {
        Self { lower, upper }
    }

    /// The whole tick domain.
    pub fn all() -> Self {
        Self::new(RangeBound::Unbounded, RangeBound::Unbounded)
    }

    /// Half-open range `[lower, upper)` over integer ticks.
    pub fn from_ticks(lower: i64, upper: i64) -> Self {
        Self::new(RangeBound::closed(lower), RangeBound::open(upper))
    }

    /// A canonical range containing no position.
    pub fn empty() -> Self {
        Self::new(RangeBound::open(0), RangeBound::open(0))
    }

    /// Whether the range contains no position at all.
    pub fn is_empty(&self) -> bool {
        match (self.lower, self.upper) {
            (RangeBound::Unbounded, _) | (_, RangeBound::Unbounded) => false,
            (RangeBound::Closed(a), RangeBound::Closed(b)) => a > b,
            (RangeBound::Closed(a), RangeBound::Open(b))
            | (RangeBound::Open(a), RangeBound::Closed(b))
            | (RangeBound::Open(a), RangeBound::Open(b)) => a >= b,
        }
    }

    /// Whether the range contains the given position.
    pub fn contains(&self, time: TickTime) -> bool {
        let above_lower = match self.lower {
            RangeBound::Unbounded => true,
            RangeBound::Closed(v) => time >= v,
            RangeBound::Open(v) => time > v,
        };
        let below_upper = match self.upper {
            RangeBound::Unbounded => true,
            RangeBound::Closed(v) => time <= v,
            RangeBound::Open(v) => time < v,
        };
        above_lower && below_upper
    }

    /// Whether the region starting at `edge` (a lower edge) begins inside
    /// this range.
    pub fn contains_lower_edge(&self, edge: RangeBound) -> bool {
        cmp_lower(self.lower, edge) != Ordering::Greater
            && !Self::new(edge, self.upper).is_empty()
    }

    /// Intersection of two ranges, `None` when they do not overlap.
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let lower = if cmp_lower(self.lower, other.lower) == Ordering::Less {
            other.lower
        } else {
            self.lower
        };
        let upper = if cmp_upper(self.upper, other.upper) == Ordering::Greater {
            other.upper
        } else {
            self.upper
        };
        let range = TimeRange::new(lower, upper);
        (!range.is_empty()).then_some(range)
    }

    /// Whether two ranges share at least one position.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.intersect(other).is_some()
    }

    /// Smallest range containing both inputs.
    pub fn hull(&self, other: &TimeRange) -> TimeRange {
        let lower = if cmp_lower(self.lower, other.lower) == Ordering::Greater {
            other.lower
        } else {
            self.lower
        };
        let upper = if cmp_upper(self.upper, other.upper) == Ordering::Less {
            other.upper
        } else {
            self.upper
        };
        TimeRange::new(lower, upper)
    }

    /// Union of two overlapping or touching ranges, `None` when a gap
    /// separates them.
    pub fn union(&self, other: &TimeRange) -> Option<TimeRange> {
        let touches = self.overlaps(other)
            || lower_edge_after(self.upper) == Some(other.lower)
            || lower_edge_after(other.upper) == Some(self.lower);
        touches.then(|| self.hull(other))
    }
}
