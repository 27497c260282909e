// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-sequence segment caches.
//!
//! A track's sections can overlap; the compiler flattens them into
//! *segments*, the maximal sub-ranges over which the set of active sections
//! is constant. Segment data is derived purely from authored content and is
//! cached per sequence, guarded by the sequence's content signature.

use indexmap::IndexMap;
use tickfield_core::{IntervalTree, RangeBound};
use tickfield_model::{Sequence, Track, TrackId};

/// Reference to one section contributing to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRef {
    /// Index of the section within its track.
    pub section_index: u32,
    /// The section's implementation index.
    pub implementation_index: u32,
    /// Whether the section needs one-time setup.
    pub requires_init: bool,
}

/// The set of sections active over one sub-range of a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Contributing sections, in track order.
    pub sections: Vec<SectionRef>,
}

/// A track's compiled segment data: the segment list plus an interval store
/// mapping sub-ranges to segment indices.
#[derive(Debug, Clone)]
pub struct CompiledTrack {
    /// All segments of the track.
    pub segments: Vec<Segment>,
    /// Sub-range -> segment index. Ranges are disjoint by construction.
    pub tree: IntervalTree<u32>,
}

impl CompiledTrack {
    /// Flatten a track's sections into segments.
    pub fn from_track(track: &Track) -> Self {
        let mut scratch = IntervalTree::new();
        for (index, section) in track.sections.iter().enumerate() {
            scratch.add(section.range, index as u32);
        }

        let mut segments = Vec::new();
        let mut tree = IntervalTree::new();
        for node in scratch.iter_from(RangeBound::Unbounded) {
            let sections = scratch
                .data(&node)
                .map(|&index| {
                    let section = &track.sections[index as usize];
                    SectionRef {
                        section_index: index,
                        implementation_index: section.implementation_index,
                        requires_init: section.requires_init,
                    }
                })
                .collect();
            let segment_index = segments.len() as u32;
            segments.push(Segment { sections });
            tree.add(node.range(), segment_index);
        }
        Self { segments, tree }
    }
}

/// Cached compile data for one authored sequence: per-track segments and the
/// sub-sequence placement store, valid for one content signature.
#[derive(Debug, Clone)]
pub struct SequenceCache {
    signature: u32,
    /// Segment data per track.
    pub tracks: IndexMap<TrackId, CompiledTrack>,
    /// Sub-sequence entry index keyed by the entry's parent-space extent.
    pub sub_sequences: IntervalTree<u32>,
}

impl SequenceCache {
    /// Build the cache from a sequence's current authored content.
    pub fn build(sequence: &Sequence) -> Self {
        let mut tracks = IndexMap::new();
        for track in sequence.tracks() {
            tracks.insert(track.id, CompiledTrack::from_track(track));
        }
        let mut sub_sequences = IntervalTree::new();
        for (index, entry) in sequence.sub_sequences().iter().enumerate() {
            sub_sequences.add(entry.parent_extent(), index as u32);
        }
        Self {
            signature: sequence.signature(),
            tracks,
            sub_sequences,
        }
    }

    /// Whether the cache still matches the sequence's authored content.
    pub fn is_current(&self, sequence: &Sequence) -> bool {
        self.signature == sequence.signature()
    }
}
