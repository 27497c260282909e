// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interval store mapping possibly-overlapping time ranges to values.

use crate::range::{
    cmp_lower, cmp_upper, lower_edge_after, upper_edge_before, RangeBound, TimeRange,
};
use std::cmp::Ordering;

/// A store of `(range, value)` associations supporting ordered iteration over
/// the maximal disjoint sub-ranges of the inserted ranges.
///
/// Multiple values may cover the same position. Iteration partitions the
/// union of all inserted ranges exactly; true gaps are simply not yielded and
/// must be detected by the caller from the cursor positions.
#[derive(Debug, Clone)]
pub struct IntervalTree<V> {
    entries: Vec<(TimeRange, V)>,
}

impl<V> Default for IntervalTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IntervalTree<V> {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Associate `value` with `range`. Empty ranges are ignored.
    pub fn add(&mut self, range: TimeRange, value: V) {
        if range.is_empty() {
            return;
        }
        self.entries.push((range, value));
    }

    /// Number of inserted associations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh iterator over the maximal disjoint covered sub-ranges starting
    /// at the given lower edge. Adjacent sub-ranges carrying an identical
    /// value set are merged.
    pub fn iter_from(&self, from: RangeBound) -> IntervalIter<'_, V> {
        let mut edges = vec![from];
        for (range, _) in &self.entries {
            if cmp_lower(range.lower, from) == Ordering::Greater {
                edges.push(range.lower);
            }
            if let Some(edge) = lower_edge_after(range.upper) {
                if cmp_lower(edge, from) == Ordering::Greater {
                    edges.push(edge);
                }
            }
        }
        edges.sort_by(|a, b| cmp_lower(*a, *b));
        edges.dedup();
        IntervalIter {
            tree: self,
            edges,
            pos: 0,
        }
    }

    /// The values attached at a node yielded by a previous iteration.
    pub fn data<'a>(&'a self, node: &'a IntervalNode) -> impl Iterator<Item = &'a V> + 'a {
        node.indices.iter().map(move |&i| &self.entries[i].1)
    }

    /// The values covering the region that starts at `edge`, together with
    /// the upper bound up to which that value set cannot change.
    pub fn query_at(&self, edge: RangeBound) -> (Vec<&V>, RangeBound) {
        let mut until = RangeBound::Unbounded;
        let mut values = Vec::new();
        for (range, value) in &self.entries {
            if range.contains_lower_edge(edge) {
                values.push(value);
                if cmp_upper(range.upper, until) == Ordering::Less {
                    until = range.upper;
                }
            } else if cmp_lower(range.lower, edge) == Ordering::Greater {
                if let Some(before) = upper_edge_before(range.lower) {
                    if cmp_upper(before, until) == Ordering::Less {
                        until = before;
                    }
                }
            }
        }
        (values, until)
    }

    fn elementary(&self, edges: &[RangeBound], pos: usize) -> Option<(TimeRange, Vec<usize>)> {
        let lower = *edges.get(pos)?;
        let upper = edges
            .get(pos + 1)
            .and_then(|e| upper_edge_before(*e))
            .unwrap_or(RangeBound::Unbounded);
        let range = TimeRange::new(lower, upper);
        if range.is_empty() {
            return Some((range, Vec::new()));
        }
        let indices = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (r, _))| r.contains_lower_edge(lower))
            .map(|(i, _)| i)
            .collect();
        Some((range, indices))
    }
}

/// One yielded node of an [`IntervalTree`] iteration: a maximal sub-range
/// with a constant set of covering values.
#[derive(Debug, Clone)]
pub struct IntervalNode {
    range: TimeRange,
    indices: Vec<usize>,
}

impl IntervalNode {
    /// The covered sub-range.
    pub fn range(&self) -> TimeRange {
        self.range
    }

    /// Number of values covering the sub-range.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether no value covers the sub-range (never true for yielded nodes).
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Iterator produced by [`IntervalTree::iter_from`].
#[derive(Debug)]
pub struct IntervalIter<'a, V> {
    tree: &'a IntervalTree<V>,
    edges: Vec<RangeBound>,
    pos: usize,
}

impl<V> Iterator for IntervalIter<'_, V> {
    type Item = IntervalNode;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (mut range, indices) = self.tree.elementary(&self.edges, self.pos)?;
            self.pos += 1;
            if range.is_empty() || indices.is_empty() {
                continue;
            }
            // Absorb following elementary ranges with the same value set.
            while let Some((next_range, next_indices)) = self.tree.elementary(&self.edges, self.pos)
            {
                if next_range.is_empty() || next_indices != indices {
                    break;
                }
                range.upper = next_range.upper;
                self.pos += 1;
            }
            return Some(IntervalNode { range, indices });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::tick;

    fn collect(tree: &IntervalTree<&'static str>) -> Vec<(TimeRange, Vec<&'static str>)> {
        tree.iter_from(RangeBound::Unbounded)
            .map(|node| {
                let values: Vec<&str> = tree.data(&node).copied().collect();
                (node.range(), values)
            })
            .collect()
    }

    #[test]
    fn test_overlapping_ranges_split_into_disjoint_nodes() {
        let mut tree = IntervalTree::new();
        tree.add(TimeRange::from_ticks(0, 10), "a");
        tree.add(TimeRange::from_ticks(5, 15), "b");

        let nodes = collect(&tree);
        assert_eq!(
            nodes,
            vec![
                (TimeRange::from_ticks(0, 5), vec!["a"]),
                (TimeRange::from_ticks(5, 10), vec!["a", "b"]),
                (TimeRange::from_ticks(10, 15), vec!["b"]),
            ]
        );
    }

    #[test]
    fn test_gaps_are_not_yielded() {
        let mut tree = IntervalTree::new();
        tree.add(TimeRange::from_ticks(0, 2), "a");
        tree.add(TimeRange::from_ticks(8, 9), "b");

        let nodes = collect(&tree);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].0, TimeRange::from_ticks(0, 2));
        assert_eq!(nodes[1].0, TimeRange::from_ticks(8, 9));
    }

    #[test]
    fn test_adjacent_equal_sets_merge() {
        let mut tree = IntervalTree::new();
        tree.add(TimeRange::from_ticks(0, 5), "a");
        tree.add(TimeRange::from_ticks(5, 10), "a");
        // "a" is a distinct entry per range, so the sets differ and the nodes
        // stay split; a single range re-added over both halves merges.
        let mut covered = IntervalTree::new();
        covered.add(TimeRange::from_ticks(0, 10), "x");
        covered.add(TimeRange::from_ticks(2, 4), "x");
        let nodes: Vec<_> = covered.iter_from(RangeBound::Unbounded).collect();
        assert_eq!(nodes.len(), 3);
        assert_eq!(tree.iter_from(RangeBound::Unbounded).count(), 2);
    }

    #[test]
    fn test_iter_from_skips_earlier_content() {
        let mut tree = IntervalTree::new();
        tree.add(TimeRange::from_ticks(0, 10), "a");
        let nodes: Vec<_> = tree.iter_from(RangeBound::closed(4)).collect();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].range(), TimeRange::from_ticks(4, 10));
    }

    #[test]
    fn test_unbounded_tail_is_preserved() {
        let mut tree = IntervalTree::new();
        tree.add(
            TimeRange::new(RangeBound::closed(3), RangeBound::Unbounded),
            "tail",
        );
        let nodes: Vec<_> = tree.iter_from(RangeBound::Unbounded).collect();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].range().upper, RangeBound::Unbounded);
    }

    #[test]
    fn test_query_at_reports_constancy_bound() {
        let mut tree = IntervalTree::new();
        tree.add(TimeRange::from_ticks(0, 10), "a");
        tree.add(TimeRange::from_ticks(5, 15), "b");

        let (values, until) = tree.query_at(RangeBound::closed(0));
        assert_eq!(values, vec![&"a"]);
        // The set changes when "b" starts at 5.
        assert_eq!(until, RangeBound::open(5));

        let (values, until) = tree.query_at(RangeBound::closed(5));
        assert_eq!(values.len(), 2);
        assert_eq!(until, RangeBound::open(10));

        let (values, until) = tree.query_at(RangeBound::closed(20));
        assert!(values.is_empty());
        assert_eq!(until, RangeBound::Unbounded);
    }

    #[test]
    fn test_partition_covers_exactly_the_union() {
        let mut tree = IntervalTree::new();
        tree.add(TimeRange::from_ticks(0, 4), 1u32);
        tree.add(TimeRange::from_ticks(2, 6), 2u32);
        tree.add(TimeRange::from_ticks(6, 8), 3u32);

        let nodes: Vec<_> = tree.iter_from(RangeBound::Unbounded).collect();
        // Disjoint and ordered.
        for pair in nodes.windows(2) {
            assert!(pair[0].range().intersect(&pair[1].range()).is_none());
            assert_eq!(
                cmp_lower(pair[0].range().lower, pair[1].range().lower),
                Ordering::Less
            );
        }
        // Every integer tick in the union is covered by exactly one node.
        for t in 0..8 {
            let covering = nodes
                .iter()
                .filter(|n| n.range().contains(tick(t)))
                .count();
            assert_eq!(covering, 1, "tick {t}");
        }
        assert!(!nodes.iter().any(|n| n.range().contains(tick(8))));
    }

    #[test]
    fn test_empty_range_is_ignored() {
        let mut tree = IntervalTree::new();
        tree.add(TimeRange::from_ticks(5, 5), "nothing");
        assert!(tree.is_empty());
    }
}
