// SPDX-License-Identifier: MIT OR Apache-2.0
//! Core time primitives for the tickfield timeline compiler.
//!
//! This crate provides the exact-arithmetic foundation the compiler is built
//! on:
//! - [`TimeRange`] over an integer tick domain, with open, closed and
//!   unbounded ends
//! - [`TimeTransform`], a rational scale + offset mapping between nested
//!   sequence time spaces, exactly composable and invertible
//! - [`IntervalTree`], a store of overlapping time ranges iterated as maximal
//!   disjoint sub-ranges

pub mod interval;
pub mod range;
pub mod transform;

pub use interval::{IntervalIter, IntervalNode, IntervalTree};
pub use range::{
    cmp_lower, cmp_upper, lower_edge_after, tick, upper_edge_before, RangeBound, TickTime,
    TimeRange,
};
pub use transform::TimeTransform;
