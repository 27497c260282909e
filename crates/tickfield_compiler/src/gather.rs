// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recursive gathering of track content across the sequence hierarchy.
//!
//! The gatherer walks a root sequence and every reachable sub-sequence,
//! resolving each placement through the hierarchy cache, and records what is
//! active where in *root* space: one interval store of group items (per
//! active section implementation), one of sub-sequence activations, and one
//! of observed empty space on either side.

use crate::group::EntityRef;
use crate::hierarchy::{HierarchyCache, SequenceInstanceId};
use crate::segment::SequenceCache;
use crate::CompileError;
use indexmap::IndexMap;
use tickfield_core::{lower_edge_after, upper_edge_before, IntervalTree, TimeRange, TimeTransform};
use tickfield_model::{RollPhase, SequenceId, SequenceStore};

/// One gathered association: over some root-space range, this section
/// implementation is active with these ordering attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatheredGroupItem {
    /// Evaluation group name, taken from the owning track.
    pub group_name: String,
    /// Compiler-configured priority of that group (0 when unconfigured).
    pub group_priority: i32,
    /// Accumulated hierarchical bias of the owning instance.
    pub hierarchical_bias: i32,
    /// The owning track's priority within its group.
    pub evaluation_priority: i32,
    /// Whether the section needs one-time setup.
    pub requires_init: bool,
    /// The entity this item evaluates.
    pub entity: EntityRef,
    /// Gather order, the final tie-break; depth-first and deterministic.
    pub order: u32,
}

/// Which side of a sequence observed a range as empty. A range is genuinely
/// empty only when neither tracks nor sub-sequences cover it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptySource {
    /// A track's segment store had no segment over the range.
    Tracks,
    /// No sub-sequence entry was active over the range.
    SubSequences,
}

/// Everything one gather pass found, in root space.
#[derive(Debug, Clone, Default)]
pub struct GatheredData {
    /// Active section implementations.
    pub tracks: IntervalTree<GatheredGroupItem>,
    /// Sub-sequence activations (the root itself is not recorded).
    pub sequences: IntervalTree<SequenceInstanceId>,
    /// Observed empty space, per source; its edges bound compile units.
    pub empty: IntervalTree<EmptySource>,
}

/// Per-sequence state threaded down the recursion.
#[derive(Debug, Clone, Copy)]
struct GatherContext {
    instance: SequenceInstanceId,
    root_to_local: TimeTransform,
    hierarchical_bias: i32,
    phase: RollPhase,
    /// Portion of the compile span visible to this sequence, in local space.
    compile_range: TimeRange,
    /// Resolved local play range, clamped by every ancestor.
    clamp_range: TimeRange,
}

/// Walks the hierarchy and fills a [`GatheredData`], refreshing stale
/// per-sequence caches and hierarchy nodes along the way.
pub struct Gatherer<'a> {
    store: &'a SequenceStore,
    group_priorities: &'a IndexMap<String, i32>,
    hierarchy: &'a mut HierarchyCache,
    caches: &'a mut IndexMap<SequenceId, SequenceCache>,
    out: GatheredData,
    next_order: u32,
}

impl<'a> Gatherer<'a> {
    /// Gather everything reachable from `root` over the root-space `span`.
    pub fn run(
        store: &'a SequenceStore,
        group_priorities: &'a IndexMap<String, i32>,
        hierarchy: &'a mut HierarchyCache,
        caches: &'a mut IndexMap<SequenceId, SequenceCache>,
        root: SequenceId,
        span: TimeRange,
    ) -> Result<GatheredData, CompileError> {
        let instance = SequenceInstanceId::root_of(root);
        let sequence = store
            .sequence(root)
            .ok_or(CompileError::InvalidReference(instance))?;
        hierarchy.ensure_root(instance, root, sequence.play_range);

        let mut gatherer = Gatherer {
            store,
            group_priorities,
            hierarchy,
            caches,
            out: GatheredData::default(),
            next_order: 0,
        };
        let ctx = GatherContext {
            instance,
            root_to_local: TimeTransform::identity(),
            hierarchical_bias: 0,
            phase: RollPhase::Normal,
            compile_range: span,
            clamp_range: sequence.play_range,
        };
        gatherer.gather_sequence(root, ctx);
        Ok(gatherer.out)
    }

    fn gather_sequence(&mut self, id: SequenceId, ctx: GatherContext) {
        let Some(sequence) = self.store.sequence(id) else {
            // The parent already recorded this instance's activation, so the
            // degraded branch still occupies its range; it just evaluates
            // nothing.
            tracing::warn!(sequence = ?id, "sub-sequence entry references a missing sequence");
            return;
        };

        let stale = self
            .caches
            .get(&id)
            .map_or(true, |cache| !cache.is_current(sequence));
        if stale {
            self.caches.insert(id, SequenceCache::build(sequence));
        }

        let Some(local_range) = ctx.compile_range.intersect(&ctx.clamp_range) else {
            return;
        };
        let local_to_root = ctx.root_to_local.invert();

        // Field borrows: the cache stays immutably borrowed through the track
        // walk while the output and the hierarchy are mutated.
        let Gatherer {
            group_priorities,
            hierarchy,
            caches,
            out,
            next_order,
            ..
        } = self;
        let Some(cache) = caches.get(&id) else {
            return;
        };

        for (track_id, compiled) in &cache.tracks {
            let Some(track) = sequence.track(*track_id) else {
                continue;
            };
            if !ctx.phase.admits(track) {
                continue;
            }
            let group_priority = group_priorities
                .get(&track.evaluation_group)
                .copied()
                .unwrap_or(0);

            let mut gap_cursor = Some(local_range.lower);
            for node in compiled.tree.iter_from(local_range.lower) {
                let Some(local) = node.range().intersect(&local_range) else {
                    continue;
                };
                if let (Some(cursor), Some(gap_upper)) = (gap_cursor, upper_edge_before(local.lower))
                {
                    let gap = TimeRange::new(cursor, gap_upper);
                    if !gap.is_empty() {
                        out.empty.add(local_to_root.apply(gap), EmptySource::Tracks);
                    }
                }
                gap_cursor = lower_edge_after(local.upper);
                let root_range = local_to_root.apply(local);
                for &segment_index in compiled.tree.data(&node) {
                    let segment = &compiled.segments[segment_index as usize];
                    for section in &segment.sections {
                        let order = *next_order;
                        *next_order += 1;
                        out.tracks.add(
                            root_range,
                            GatheredGroupItem {
                                group_name: track.evaluation_group.clone(),
                                group_priority,
                                hierarchical_bias: ctx.hierarchical_bias,
                                evaluation_priority: track.evaluation_priority,
                                requires_init: section.requires_init,
                                entity: EntityRef {
                                    sequence: ctx.instance,
                                    track: *track_id,
                                    segment: segment_index,
                                    section: section.section_index,
                                },
                                order,
                            },
                        );
                    }
                }
            }
            if let Some(cursor) = gap_cursor {
                let gap = TimeRange::new(cursor, local_range.upper);
                if !gap.is_empty() {
                    out.empty.add(local_to_root.apply(gap), EmptySource::Tracks);
                }
            }
        }

        // Prune sub-sequence entries through the cached extent store and
        // record the uncovered stretches, then visit survivors in authored
        // order. Recursion is deferred until the cache borrow ends.
        let mut active_entries: Vec<u32> = Vec::new();
        let mut gap_cursor = Some(local_range.lower);
        for node in cache.sub_sequences.iter_from(local_range.lower) {
            let Some(local) = node.range().intersect(&local_range) else {
                continue;
            };
            if let (Some(cursor), Some(gap_upper)) = (gap_cursor, upper_edge_before(local.lower)) {
                let gap = TimeRange::new(cursor, gap_upper);
                if !gap.is_empty() {
                    out.empty
                        .add(local_to_root.apply(gap), EmptySource::SubSequences);
                }
            }
            gap_cursor = lower_edge_after(local.upper);
            for &index in cache.sub_sequences.data(&node) {
                if !active_entries.contains(&index) {
                    active_entries.push(index);
                }
            }
        }
        if let Some(cursor) = gap_cursor {
            let gap = TimeRange::new(cursor, local_range.upper);
            if !gap.is_empty() {
                out.empty
                    .add(local_to_root.apply(gap), EmptySource::SubSequences);
            }
        }
        active_entries.sort_unstable();

        let mut pending: Vec<(SequenceId, GatherContext)> = Vec::new();
        for &entry_index in &active_entries {
            let entry = &sequence.sub_sequences()[entry_index as usize];
            let Some(parent_overlap) = entry.parent_extent().intersect(&local_range) else {
                continue;
            };
            let child_instance = ctx.instance.child(entry.id);
            let resolved = hierarchy.get_or_create(
                child_instance,
                ctx.instance,
                entry,
                &ctx.root_to_local,
                ctx.hierarchical_bias,
                ctx.clamp_range,
            );
            out.sequences
                .add(local_to_root.apply(parent_overlap), child_instance);
            pending.push((
                resolved.sequence,
                GatherContext {
                    instance: child_instance,
                    root_to_local: resolved.root_to_local,
                    hierarchical_bias: resolved.hierarchical_bias,
                    phase: ctx.phase.inherit(resolved.phase),
                    compile_range: entry.transform.apply(parent_overlap),
                    clamp_range: resolved.play_range,
                },
            ));
        }

        for (child_sequence, child_ctx) in pending {
            self.gather_sequence(child_sequence, child_ctx);
        }
    }
}
