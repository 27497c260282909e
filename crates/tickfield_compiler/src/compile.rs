// SPDX-License-Identifier: MIT OR Apache-2.0
//! Full and ranged compilation into an evaluation field.
//!
//! Both entry points share one unit walk over the gathered interval stores,
//! so a field assembled from any sequence of ranged compiles is identical,
//! entry for entry, to one full compile: entry boundaries always fall on
//! content edges, never on requested range edges.

use crate::field::{EvaluationField, FieldEntry};
use crate::gather::{GatheredData, GatheredGroupItem, Gatherer};
use crate::group::{EvaluationGroup, FieldMetadata};
use crate::hierarchy::{HierarchyCache, SequenceInstanceId};
use crate::segment::SequenceCache;
use crate::CompileError;
use indexmap::IndexMap;
use std::cmp::{Ordering, Reverse};
use tickfield_core::{
    cmp_lower, cmp_upper, lower_edge_after, upper_edge_before, RangeBound, TimeRange,
};
use tickfield_model::{SequenceId, SequenceStore};

/// Compiled state of one root sequence: the evaluation field plus the caches
/// that make recompiles incremental. Owned per root, never shared.
#[derive(Debug, Clone, Default)]
pub struct CompiledSequence {
    field: EvaluationField,
    hierarchy: HierarchyCache,
    caches: IndexMap<SequenceId, SequenceCache>,
}

impl CompiledSequence {
    /// Fresh, empty compiled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled evaluation field.
    pub fn field(&self) -> &EvaluationField {
        &self.field
    }

    /// The resolved hierarchy behind the field.
    pub fn hierarchy(&self) -> &HierarchyCache {
        &self.hierarchy
    }
}

/// Compiles sequences from a store into [`CompiledSequence`] state.
pub struct SequenceCompiler<'a> {
    store: &'a SequenceStore,
    group_priorities: IndexMap<String, i32>,
}

impl<'a> SequenceCompiler<'a> {
    /// A compiler over a store, with no group priorities configured.
    pub fn new(store: &'a SequenceStore) -> Self {
        Self {
            store,
            group_priorities: IndexMap::new(),
        }
    }

    /// Configure the priority of an evaluation group. Higher-priority groups
    /// evaluate first; unconfigured groups default to 0.
    pub fn set_group_priority(&mut self, group: impl Into<String>, priority: i32) {
        self.group_priorities.insert(group.into(), priority);
    }

    /// Compile `root` over its whole play range, replacing the field.
    pub fn compile(
        &self,
        root: SequenceId,
        compiled: &mut CompiledSequence,
    ) -> Result<(), CompileError> {
        let sequence = self
            .store
            .sequence(root)
            .ok_or_else(|| CompileError::InvalidReference(SequenceInstanceId::root_of(root)))?;
        let span = sequence.play_range;

        compiled.field.clear();
        let CompiledSequence {
            field,
            hierarchy,
            caches,
        } = compiled;
        let gathered = Gatherer::run(
            self.store,
            &self.group_priorities,
            hierarchy,
            caches,
            root,
            span,
        )?;
        tracing::debug!(
            items = gathered.tracks.len(),
            activations = gathered.sequences.len(),
            "gathered hierarchy content"
        );
        self.compile_units(field, hierarchy, &gathered, span, span.upper);
        Ok(())
    }

    /// Compile the gaps of the field that `target` touches, leaving existing
    /// entries untouched.
    ///
    /// The gather span is widened to the nearest existing entries (or the
    /// play range edges) so that new entry boundaries land exactly where a
    /// full compile would put them; the compiled region therefore covers at
    /// least `target` and possibly more.
    pub fn compile_range(
        &self,
        root: SequenceId,
        compiled: &mut CompiledSequence,
        target: TimeRange,
    ) -> Result<(), CompileError> {
        let sequence = self
            .store
            .sequence(root)
            .ok_or_else(|| CompileError::InvalidReference(SequenceInstanceId::root_of(root)))?;
        let domain = sequence.play_range;
        let Some(target) = target.intersect(&domain) else {
            return Ok(());
        };

        let span_lower = compiled
            .field
            .entries()
            .iter()
            .rev()
            .find(|e| cmp_lower(e.range.lower, target.lower) == Ordering::Less)
            .map_or(RangeBound::Unbounded, |e| e.range.lower);
        let span_upper = compiled
            .field
            .entries()
            .iter()
            .find(|e| cmp_upper(e.range.upper, target.upper) == Ordering::Greater)
            .map_or(RangeBound::Unbounded, |e| e.range.upper);
        let Some(span) = TimeRange::new(span_lower, span_upper).intersect(&domain) else {
            return Ok(());
        };

        let CompiledSequence {
            field,
            hierarchy,
            caches,
        } = compiled;
        let gathered = Gatherer::run(
            self.store,
            &self.group_priorities,
            hierarchy,
            caches,
            root,
            span,
        )?;
        self.compile_units(field, hierarchy, &gathered, span, target.upper);
        Ok(())
    }

    /// Walk `span`, carving maximal constant-content units out of the gaps in
    /// the field and inserting an entry per non-empty unit. Stops once the
    /// cursor passes `stop_after`.
    fn compile_units(
        &self,
        field: &mut EvaluationField,
        hierarchy: &HierarchyCache,
        gathered: &GatheredData,
        span: TimeRange,
        stop_after: RangeBound,
    ) {
        let mut cursor = span.lower;
        loop {
            if TimeRange::new(cursor, span.upper).is_empty()
                || TimeRange::new(cursor, stop_after).is_empty()
            {
                return;
            }

            if let Some(populated) = field.entry_containing_edge(cursor) {
                match lower_edge_after(populated.range.upper) {
                    Some(next) => {
                        cursor = next;
                        continue;
                    }
                    None => return,
                }
            }

            let gap_upper = field
                .next_entry_after(cursor)
                .and_then(|e| upper_edge_before(e.range.lower))
                .unwrap_or(RangeBound::Unbounded);
            let (items, items_until) = gathered.tracks.query_at(cursor);
            let (instances, instances_until) = gathered.sequences.query_at(cursor);
            let (_, empty_until) = gathered.empty.query_at(cursor);

            let mut upper = span.upper;
            for candidate in [items_until, instances_until, empty_until, gap_upper] {
                if cmp_upper(candidate, upper) == Ordering::Less {
                    upper = candidate;
                }
            }
            let unit = TimeRange::new(cursor, upper);
            if unit.is_empty() {
                return;
            }
            if !items.is_empty() || !instances.is_empty() {
                field.insert(self.build_entry(hierarchy, unit, items, instances));
            }

            match lower_edge_after(upper) {
                Some(next) => cursor = next,
                None => return,
            }
        }
    }

    /// Assemble one field entry: sort the gathered items into evaluation
    /// order, chunk them into a group, and record activation metadata.
    fn build_entry(
        &self,
        hierarchy: &HierarchyCache,
        range: TimeRange,
        items: Vec<&GatheredGroupItem>,
        instances: Vec<&SequenceInstanceId>,
    ) -> FieldEntry {
        let mut items: Vec<GatheredGroupItem> = items.into_iter().cloned().collect();
        items.sort_unstable_by_key(|item| {
            (
                Reverse(item.group_priority),
                item.hierarchical_bias,
                Reverse(item.evaluation_priority),
                item.order,
            )
        });

        let mut active: Vec<SequenceInstanceId> = instances.into_iter().copied().collect();
        active.sort_unstable();
        active.dedup();

        let mut serials = Vec::with_capacity(active.len());
        for instance in active {
            let Some(node) = hierarchy.node(instance) else {
                tracing::warn!(?instance, "gathered instance missing from hierarchy");
                continue;
            };
            match self.store.sequence(node.sequence) {
                Some(sequence) => serials.push((instance, sequence.signature())),
                None => {
                    tracing::warn!(sequence = ?node.sequence, "active sequence missing from store")
                }
            }
        }

        FieldEntry {
            range,
            group: EvaluationGroup::from_sorted_items(&items),
            metadata: FieldMetadata::build(&items, serials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_rational::Ratio;
    use tickfield_core::{tick, TimeTransform};
    use tickfield_model::{Section, Sequence, SubSequenceEntry, Track};

    fn compile(store: &SequenceStore, root: SequenceId) -> CompiledSequence {
        let compiler = SequenceCompiler::new(store);
        let mut compiled = CompiledSequence::new();
        compiler.compile(root, &mut compiled).unwrap();
        compiled
    }

    fn overlap_scenario() -> (SequenceStore, SequenceId) {
        let mut store = SequenceStore::new();
        let mut seq = Sequence::new("root");
        seq.set_play_range(TimeRange::from_ticks(0, 15));
        let mut track = Track::new("fx", "effects");
        track.add_section(Section::new(TimeRange::from_ticks(0, 10), 7));
        track.add_section(Section::new(TimeRange::from_ticks(5, 15), 8));
        seq.add_track(track);
        let root = store.add(seq);
        (store, root)
    }

    #[test]
    fn test_overlapping_sections_split_into_three_entries() {
        let (store, root) = overlap_scenario();
        let compiled = compile(&store, root);

        let entries = compiled.field().entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].range, TimeRange::from_ticks(0, 5));
        assert_eq!(entries[1].range, TimeRange::from_ticks(5, 10));
        assert_eq!(entries[2].range, TimeRange::from_ticks(10, 15));

        let counts: Vec<usize> = entries.iter().map(|e| e.group.eval_count()).collect();
        assert_eq!(counts, vec![1, 2, 1]);

        // Equal keys fall back to gather order: section 0 before section 1.
        let middle = &entries[1].group;
        let chunk = &middle.chunks()[0];
        let evals = middle.eval_entities(chunk);
        assert_eq!(evals[0].section, 0);
        assert_eq!(evals[1].section, 1);
    }

    #[test]
    fn test_half_speed_child_covers_twice_its_local_range() {
        let mut store = SequenceStore::new();
        let mut child = Sequence::new("child");
        child.set_play_range(TimeRange::from_ticks(0, 10));
        let mut track = Track::new("fx", "effects");
        track.add_section(Section::new(TimeRange::from_ticks(0, 10), 0));
        child.add_track(track);
        let child_id = store.add(child);

        let mut root = Sequence::new("root");
        root.set_play_range(TimeRange::from_ticks(0, 20));
        let mut entry = SubSequenceEntry::new(child_id);
        // Child time runs at half speed relative to the parent.
        entry.transform = TimeTransform::new(Ratio::new(1, 2), tick(0));
        entry.play_range = TimeRange::from_ticks(0, 10);
        root.add_sub_sequence(entry);
        let root_id = store.add(root);

        let compiled = compile(&store, root_id);
        let entries = compiled.field().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].range, TimeRange::from_ticks(0, 20));
        assert_eq!(entries[0].group.eval_count(), 1);
        assert_eq!(entries[0].metadata.active_sequences().len(), 1);
    }

    #[test]
    fn test_group_priority_orders_chunks() {
        let mut store = SequenceStore::new();
        let mut seq = Sequence::new("root");
        seq.set_play_range(TimeRange::from_ticks(0, 10));
        let mut audio = Track::new("a", "audio");
        audio.add_section(Section::new(TimeRange::from_ticks(0, 10), 0));
        seq.add_track(audio);
        let mut camera = Track::new("c", "camera");
        camera.add_section(Section::new(TimeRange::from_ticks(0, 10), 0));
        seq.add_track(camera);
        let root = store.add(seq);

        let mut compiler = SequenceCompiler::new(&store);
        compiler.set_group_priority("camera", 10);
        let mut compiled = CompiledSequence::new();
        compiler.compile(root, &mut compiled).unwrap();

        let entry = compiled.field().entry_at(tick(5)).unwrap();
        let names: Vec<&str> = entry
            .group
            .chunks()
            .iter()
            .map(|c| c.group_name.as_str())
            .collect();
        assert_eq!(names, vec!["camera", "audio"]);
    }

    #[test]
    fn test_hierarchical_bias_orders_within_a_group() {
        let mut store = SequenceStore::new();
        let mut child = Sequence::new("child");
        child.set_play_range(TimeRange::from_ticks(0, 10));
        let mut child_track = Track::new("cf", "effects");
        child_track.add_section(Section::new(TimeRange::from_ticks(0, 10), 0));
        child.add_track(child_track);
        let child_id = store.add(child);

        let mut root = Sequence::new("root");
        root.set_play_range(TimeRange::from_ticks(0, 10));
        let mut root_track = Track::new("rf", "effects");
        root_track.add_section(Section::new(TimeRange::from_ticks(0, 10), 0));
        root.add_track(root_track);
        let mut entry = SubSequenceEntry::new(child_id);
        entry.play_range = TimeRange::from_ticks(0, 10);
        entry.hierarchical_bias = -5;
        root.add_sub_sequence(entry);
        let root_id = store.add(root);

        let compiled = compile(&store, root_id);
        let root_instance = SequenceInstanceId::root_of(root_id);
        let entry = compiled.field().entry_at(tick(5)).unwrap();
        let chunk = &entry.group.chunks()[0];
        let evals = entry.group.eval_entities(chunk);
        assert_eq!(evals.len(), 2);
        // The biased child evaluates ahead of the unbiased root content.
        assert_ne!(evals[0].sequence, root_instance);
        assert_eq!(evals[1].sequence, root_instance);
    }

    fn nested_scenario() -> (SequenceStore, SequenceId) {
        let mut store = SequenceStore::new();

        let mut grandchild = Sequence::new("grandchild");
        grandchild.set_play_range(TimeRange::from_ticks(0, 4));
        let mut gtrack = Track::new("g", "effects");
        gtrack.add_section(Section::new(TimeRange::from_ticks(1, 3), 2).with_init());
        grandchild.add_track(gtrack);
        let grandchild_id = store.add(grandchild);

        let mut child = Sequence::new("child");
        child.set_play_range(TimeRange::from_ticks(0, 12));
        let mut ctrack = Track::new("c", "audio");
        ctrack.add_section(Section::new(TimeRange::from_ticks(2, 9), 1));
        child.add_track(ctrack);
        let mut gentry = SubSequenceEntry::new(grandchild_id);
        gentry.transform = TimeTransform::from_offset(-6);
        gentry.play_range = TimeRange::from_ticks(0, 4);
        child.add_sub_sequence(gentry);
        let child_id = store.add(child);

        let mut root = Sequence::new("root");
        root.set_play_range(TimeRange::from_ticks(0, 40));
        let mut rtrack = Track::new("r", "effects");
        rtrack.add_section(Section::new(TimeRange::from_ticks(0, 25), 0));
        rtrack.add_section(Section::new(TimeRange::from_ticks(30, 38), 3));
        root.add_track(rtrack);
        let mut centry = SubSequenceEntry::new(child_id);
        centry.transform = TimeTransform::new(Ratio::new(1, 2), tick(-5));
        centry.play_range = TimeRange::from_ticks(0, 12);
        centry.hierarchical_bias = 1;
        root.add_sub_sequence(centry);
        let root_id = store.add(root);
        (store, root_id)
    }

    #[test]
    fn test_ranged_compiles_rebuild_the_exact_full_field() {
        let (store, root) = nested_scenario();
        let compiler = SequenceCompiler::new(&store);

        let mut full = CompiledSequence::new();
        compiler.compile(root, &mut full).unwrap();
        assert!(full.field().len() > 3);

        let mut stepwise = CompiledSequence::new();
        for target in [
            TimeRange::from_ticks(18, 22),
            TimeRange::from_ticks(0, 3),
            TimeRange::from_ticks(33, 34),
            TimeRange::from_ticks(0, 40),
        ] {
            compiler.compile_range(root, &mut stepwise, target).unwrap();
        }
        assert_eq!(full.field(), stepwise.field());
    }

    #[test]
    fn test_field_partition_is_disjoint_and_ordered() {
        let (store, root) = nested_scenario();
        let compiled = compile(&store, root);
        let entries = compiled.field().entries();
        assert!(!entries.is_empty());
        for pair in entries.windows(2) {
            assert!(pair[0].range.intersect(&pair[1].range).is_none());
            assert_eq!(
                cmp_lower(pair[0].range.lower, pair[1].range.lower),
                Ordering::Less
            );
        }
    }

    #[test]
    fn test_recompile_is_idempotent() {
        let (store, root) = nested_scenario();
        let compiler = SequenceCompiler::new(&store);
        let mut compiled = CompiledSequence::new();
        compiler.compile(root, &mut compiled).unwrap();
        let first = compiled.field().clone();
        let nodes = compiled.hierarchy().len();

        compiler.compile(root, &mut compiled).unwrap();
        assert_eq!(compiled.field(), &first);
        assert_eq!(compiled.hierarchy().len(), nodes);
    }

    #[test]
    fn test_editing_one_branch_spares_the_sibling() {
        let mut store = SequenceStore::new();
        let mut leaf = Sequence::new("leaf");
        leaf.set_play_range(TimeRange::from_ticks(0, 10));
        let mut track = Track::new("l", "effects");
        track.add_section(Section::new(TimeRange::from_ticks(0, 10), 0));
        leaf.add_track(track);
        let leaf_id = store.add(leaf);

        let mut root = Sequence::new("root");
        root.set_play_range(TimeRange::from_ticks(0, 30));
        let entry_a = {
            let mut e = SubSequenceEntry::new(leaf_id);
            e.play_range = TimeRange::from_ticks(0, 10);
            e
        };
        let entry_b = {
            let mut e = SubSequenceEntry::new(leaf_id);
            e.transform = TimeTransform::from_offset(-15);
            e.play_range = TimeRange::from_ticks(0, 10);
            e
        };
        let a_id = root.add_sub_sequence(entry_a);
        let b_id = root.add_sub_sequence(entry_b);
        let root_id = store.add(root);

        let compiler = SequenceCompiler::new(&store);
        let mut compiled = CompiledSequence::new();
        compiler.compile(root_id, &mut compiled).unwrap();
        assert_eq!(compiled.hierarchy().len(), 3);

        // Re-author only branch A.
        let root_instance = SequenceInstanceId::root_of(root_id);
        store
            .sequence_mut(root_id)
            .unwrap()
            .sub_sequence_mut(a_id)
            .unwrap()
            .hierarchical_bias = 9;
        let compiler = SequenceCompiler::new(&store);
        compiler.compile(root_id, &mut compiled).unwrap();

        assert_eq!(compiled.hierarchy().len(), 3);
        let a_instance = root_instance.child(a_id);
        let b_instance = root_instance.child(b_id);
        assert_eq!(
            compiled.hierarchy().node(a_instance).unwrap().hierarchical_bias,
            9
        );
        assert_eq!(
            compiled.hierarchy().node(b_instance).unwrap().hierarchical_bias,
            0
        );
    }

    #[test]
    fn test_empty_sequence_compiles_to_empty_field() {
        let mut store = SequenceStore::new();
        let mut seq = Sequence::new("root");
        seq.set_play_range(TimeRange::from_ticks(0, 100));
        let root = store.add(seq);

        let compiled = compile(&store, root);
        assert!(compiled.field().is_empty());
        // The root itself is still resolved.
        assert_eq!(compiled.hierarchy().len(), 1);
    }

    #[test]
    fn test_dangling_child_reference_degrades_without_failing() {
        let mut store = SequenceStore::new();
        let mut root = Sequence::new("root");
        root.set_play_range(TimeRange::from_ticks(0, 100));
        let mut entry = SubSequenceEntry::new(SequenceId::new());
        entry.transform = TimeTransform::from_offset(-10);
        entry.play_range = TimeRange::from_ticks(0, 10);
        root.add_sub_sequence(entry);
        let root_id = store.add(root);

        let compiled = compile(&store, root_id);
        let entry = compiled.field().entry_at(tick(15)).unwrap();
        assert_eq!(entry.range, TimeRange::from_ticks(10, 20));
        assert!(entry.group.is_empty());
        assert!(entry.metadata.active_sequences().is_empty());
    }

    #[test]
    fn test_compile_range_outside_the_domain_is_a_noop() {
        let (store, root) = overlap_scenario();
        let compiler = SequenceCompiler::new(&store);
        let mut compiled = CompiledSequence::new();
        compiler
            .compile_range(root, &mut compiled, TimeRange::from_ticks(100, 200))
            .unwrap();
        assert!(compiled.field().is_empty());
    }

    #[test]
    fn test_unknown_root_fails_decisively() {
        let store = SequenceStore::new();
        let compiler = SequenceCompiler::new(&store);
        let mut compiled = CompiledSequence::new();
        assert!(matches!(
            compiler.compile(SequenceId::new(), &mut compiled),
            Err(CompileError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_init_sections_lead_their_chunk() {
        let mut store = SequenceStore::new();
        let mut seq = Sequence::new("root");
        seq.set_play_range(TimeRange::from_ticks(0, 10));
        let mut track = Track::new("fx", "effects");
        track.add_section(Section::new(TimeRange::from_ticks(0, 10), 0));
        track.add_section(Section::new(TimeRange::from_ticks(0, 10), 1).with_init());
        seq.add_track(track);
        let root = store.add(seq);

        let compiled = compile(&store, root);
        let entry = compiled.field().entry_at(tick(5)).unwrap();
        let chunk = &entry.group.chunks()[0];
        assert_eq!(chunk.init_count, 1);
        assert_eq!(chunk.eval_count, 2);
        assert_eq!(entry.group.init_entities(chunk)[0].section, 1);
    }
}
