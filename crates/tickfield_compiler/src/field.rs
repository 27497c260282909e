// SPDX-License-Identifier: MIT OR Apache-2.0
//! The evaluation field: the compiler's output store.

use crate::group::{EvaluationGroup, FieldMetadata};
use std::cmp::Ordering;
use tickfield_core::{cmp_lower, RangeBound, TickTime, TimeRange};

/// One compiled entry: over `range`, evaluate `group` with `metadata`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    /// Root-space range the entry is valid over.
    pub range: TimeRange,
    /// What to evaluate, in order.
    pub group: EvaluationGroup,
    /// Activation bookkeeping for the player.
    pub metadata: FieldMetadata,
}

/// Ordered store of disjoint [`FieldEntry`] ranges.
///
/// Ranges where nothing is active have no entry; lookups there return `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationField {
    entries: Vec<FieldEntry>,
}

impl EvaluationField {
    /// An empty field.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in time order.
    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the field holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The entry containing a time position, if any.
    pub fn entry_at(&self, time: TickTime) -> Option<&FieldEntry> {
        let index = self.entries.partition_point(|e| match e.range.upper {
            RangeBound::Unbounded => false,
            RangeBound::Closed(v) => v < time,
            RangeBound::Open(v) => v <= time,
        });
        self.entries.get(index).filter(|e| e.range.contains(time))
    }

    /// The entry whose range contains the region starting at `edge`.
    pub(crate) fn entry_containing_edge(&self, edge: RangeBound) -> Option<&FieldEntry> {
        self.entries
            .iter()
            .find(|e| e.range.contains_lower_edge(edge))
    }

    /// The first entry starting strictly after `edge`.
    pub(crate) fn next_entry_after(&self, edge: RangeBound) -> Option<&FieldEntry> {
        self.entries
            .iter()
            .find(|e| cmp_lower(e.range.lower, edge) == Ordering::Greater)
    }

    /// Insert an entry, keeping entries ordered. The caller guarantees the
    /// new range is disjoint from every existing one.
    pub(crate) fn insert(&mut self, entry: FieldEntry) {
        debug_assert!(!entry.range.is_empty());
        debug_assert!(self
            .entries
            .iter()
            .all(|e| e.range.intersect(&entry.range).is_none()));
        let index = self
            .entries
            .partition_point(|e| cmp_lower(e.range.lower, entry.range.lower) == Ordering::Less);
        self.entries.insert(index, entry);
    }
}
