// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequences: trees of tracks and nested sub-sequences.

use crate::track::{RollPhase, Track, TrackId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use tickfield_core::{TimeRange, TimeTransform};
use uuid::Uuid;

/// Unique identifier for a sequence
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SequenceId(pub Uuid);

impl SequenceId {
    /// Create a new random sequence ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SequenceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a sub-sequence entry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SubSequenceEntryId(pub Uuid);

impl SubSequenceEntryId {
    /// Create a new random entry ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubSequenceEntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of an object binding a sub-sequence resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectBindingId(pub Uuid);

/// A reference from a parent sequence to a nested child sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSequenceEntry {
    /// Unique entry ID (distinct per placement, even of the same child).
    pub id: SubSequenceEntryId,
    /// The child sequence played by this entry.
    pub sequence: SequenceId,
    /// Mapping from the parent's local space into the child's local space.
    pub transform: TimeTransform,
    /// Additive priority bias applied to everything below this entry.
    pub hierarchical_bias: i32,
    /// Clamp on the child's local space.
    pub play_range: TimeRange,
    /// Object binding the child resolves against, if any.
    pub object_binding: Option<ObjectBindingId>,
    /// Evaluation phase the subtree is scheduled under.
    pub phase: RollPhase,
}

impl SubSequenceEntry {
    /// Create an entry playing `sequence` over its whole local domain.
    pub fn new(sequence: SequenceId) -> Self {
        Self {
            id: SubSequenceEntryId::new(),
            sequence,
            transform: TimeTransform::identity(),
            hierarchical_bias: 0,
            play_range: TimeRange::all(),
            object_binding: None,
            phase: RollPhase::Normal,
        }
    }

    /// The entry's extent in the parent's local space.
    pub fn parent_extent(&self) -> TimeRange {
        self.transform.invert().apply(self.play_range)
    }

    /// Hash of the authored fields, used by the compiler's hierarchy cache to
    /// detect that this entry was re-authored and its cached subtree must be
    /// rebuilt.
    pub fn change_signature(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.sequence.hash(&mut hasher);
        self.transform.hash(&mut hasher);
        self.hierarchical_bias.hash(&mut hasher);
        self.play_range.hash(&mut hasher);
        self.object_binding.hash(&mut hasher);
        self.phase.hash(&mut hasher);
        hasher.finish()
    }
}

/// A sequence: tracks plus nested sub-sequences, with a content signature the
/// compiler uses to detect re-authoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    /// Unique sequence ID
    pub id: SequenceId,
    /// Sequence name
    pub name: String,
    /// Playable domain of the sequence's local space.
    pub play_range: TimeRange,
    tracks: IndexMap<TrackId, Track>,
    sub_sequences: Vec<SubSequenceEntry>,
    signature: u32,
}

impl Sequence {
    /// Create a new sequence
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SequenceId::new(),
            name: name.into(),
            play_range: TimeRange::all(),
            tracks: IndexMap::new(),
            sub_sequences: Vec::new(),
            signature: 0,
        }
    }

    /// Authored-content signature; bumps on every mutation.
    pub fn signature(&self) -> u32 {
        self.signature
    }

    /// Record an authored change.
    pub fn touch(&mut self) {
        self.signature = self.signature.wrapping_add(1);
    }

    /// Add a track
    pub fn add_track(&mut self, track: Track) -> TrackId {
        let id = track.id;
        self.tracks.insert(id, track);
        self.touch();
        id
    }

    /// Remove a track
    pub fn remove_track(&mut self, track_id: TrackId) -> Option<Track> {
        let removed = self.tracks.shift_remove(&track_id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Get a track
    pub fn track(&self, track_id: TrackId) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    /// Get a mutable track. Counts as an authored change.
    pub fn track_mut(&mut self, track_id: TrackId) -> Option<&mut Track> {
        self.touch();
        self.tracks.get_mut(&track_id)
    }

    /// Get all tracks
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Get track count
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Add a sub-sequence entry
    pub fn add_sub_sequence(&mut self, entry: SubSequenceEntry) -> SubSequenceEntryId {
        let id = entry.id;
        self.sub_sequences.push(entry);
        self.touch();
        id
    }

    /// All sub-sequence entries
    pub fn sub_sequences(&self) -> &[SubSequenceEntry] {
        &self.sub_sequences
    }

    /// Get a mutable sub-sequence entry. Counts as an authored change.
    pub fn sub_sequence_mut(&mut self, id: SubSequenceEntryId) -> Option<&mut SubSequenceEntry> {
        self.touch();
        self.sub_sequences.iter_mut().find(|e| e.id == id)
    }

    /// Set the playable domain
    pub fn set_play_range(&mut self, range: TimeRange) {
        self.play_range = range;
        self.touch();
    }

    /// Hull of all authored content in local space, `None` when empty.
    pub fn content_range(&self) -> Option<TimeRange> {
        let mut hull: Option<TimeRange> = None;
        let mut extend = |range: TimeRange| {
            hull = Some(match hull {
                Some(h) => h.hull(&range),
                None => range,
            });
        };
        for track in self.tracks.values() {
            for section in &track.sections {
                extend(section.range);
            }
        }
        for entry in &self.sub_sequences {
            extend(entry.parent_extent());
        }
        hull
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new("Untitled Sequence")
    }
}

/// Insertion-ordered arena of sequences, addressed by id.
///
/// Absent ids resolve to `None`; a dangling reference is a degraded branch
/// for the compiler, never a panic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequenceStore {
    sequences: IndexMap<SequenceId, Sequence>,
}

impl SequenceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sequence
    pub fn add(&mut self, sequence: Sequence) -> SequenceId {
        let id = sequence.id;
        self.sequences.insert(id, sequence);
        id
    }

    /// Remove a sequence
    pub fn remove(&mut self, id: SequenceId) -> Option<Sequence> {
        self.sequences.shift_remove(&id)
    }

    /// Get a sequence
    pub fn sequence(&self, id: SequenceId) -> Option<&Sequence> {
        self.sequences.get(&id)
    }

    /// Get a mutable sequence
    pub fn sequence_mut(&mut self, id: SequenceId) -> Option<&mut Sequence> {
        self.sequences.get_mut(&id)
    }

    /// All sequences in insertion order
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }

    /// Number of sequences
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Whether the store holds no sequences
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Section;
    use num_rational::Ratio;
    use tickfield_core::tick;

    #[test]
    fn test_signature_bumps_on_edits() {
        let mut seq = Sequence::new("root");
        let s0 = seq.signature();

        let track_id = seq.add_track(Track::new("fx", "effects"));
        assert_ne!(seq.signature(), s0);

        let s1 = seq.signature();
        seq.track_mut(track_id)
            .unwrap()
            .add_section(Section::new(TimeRange::from_ticks(0, 10), 0));
        assert_ne!(seq.signature(), s1);
    }

    #[test]
    fn test_entry_change_signature_tracks_authored_fields() {
        let child = SequenceId::new();
        let mut entry = SubSequenceEntry::new(child);
        let before = entry.change_signature();

        entry.hierarchical_bias = 10;
        assert_ne!(entry.change_signature(), before);

        entry.hierarchical_bias = 0;
        assert_eq!(entry.change_signature(), before);
    }

    #[test]
    fn test_parent_extent_applies_inverse_transform() {
        let mut entry = SubSequenceEntry::new(SequenceId::new());
        entry.transform = TimeTransform::new(Ratio::new(1, 2), tick(0));
        entry.play_range = TimeRange::from_ticks(0, 10);
        assert_eq!(entry.parent_extent(), TimeRange::from_ticks(0, 20));
    }

    #[test]
    fn test_content_range_spans_tracks_and_children() {
        let mut seq = Sequence::new("root");
        let track_id = seq.add_track(Track::new("fx", "effects"));
        seq.track_mut(track_id)
            .unwrap()
            .add_section(Section::new(TimeRange::from_ticks(5, 10), 0));

        let mut entry = SubSequenceEntry::new(SequenceId::new());
        entry.transform = TimeTransform::from_offset(-20);
        entry.play_range = TimeRange::from_ticks(0, 4);
        seq.add_sub_sequence(entry);

        // The child occupies parent ticks [20, 24).
        assert_eq!(seq.content_range(), Some(TimeRange::from_ticks(5, 24)));
    }

    #[test]
    fn test_serialization() {
        let mut store = SequenceStore::new();
        let mut seq = Sequence::new("saved");
        seq.add_track(Track::new("audio", "audio"));
        store.add(seq);

        let ron_str = ron::ser::to_string_pretty(&store, ron::ser::PrettyConfig::default()).unwrap();
        let loaded: SequenceStore = ron::from_str(&ron_str).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.sequences().next().unwrap().name, "saved");
    }

    #[test]
    fn test_store_absent_id_is_none() {
        let store = SequenceStore::new();
        assert!(store.sequence(SequenceId::new()).is_none());
    }
}
