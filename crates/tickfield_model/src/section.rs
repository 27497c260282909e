// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sections: time-ranged pieces of content on a track.

use serde::{Deserialize, Serialize};
use tickfield_core::TimeRange;

/// A time-ranged piece of content owned by a track.
///
/// The implementation index identifies the runtime behavior attached to the
/// section; the compiler never interprets it, it only carries it through to
/// the evaluation field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Section {
    /// Active range in the owning sequence's local tick space.
    pub range: TimeRange,
    /// Index of the section implementation to evaluate.
    pub implementation_index: u32,
    /// Whether the implementation needs one-time setup before evaluation.
    pub requires_init: bool,
}

impl Section {
    /// Create a section over `range`.
    pub fn new(range: TimeRange, implementation_index: u32) -> Self {
        Self {
            range,
            implementation_index,
            requires_init: false,
        }
    }

    /// Mark the section as needing one-time setup.
    pub fn with_init(mut self) -> Self {
        self.requires_init = true;
        self
    }
}
