// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluation groups and per-entry metadata.

use crate::gather::GatheredGroupItem;
use crate::hierarchy::SequenceInstanceId;
use indexmap::IndexMap;
use tickfield_model::TrackId;

/// Reference to one evaluated entity: a section implementation reached
/// through a (sequence instance, track, segment) path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    /// The owning sequence instance.
    pub sequence: SequenceInstanceId,
    /// The owning track.
    pub track: TrackId,
    /// Segment within the track's compiled segment data.
    pub segment: u32,
    /// Section index within the track.
    pub section: u32,
}

/// Sort key for entities in [`FieldMetadata`]; `section` is `None` for the
/// track-level entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EvaluationKey {
    /// The owning sequence instance.
    pub sequence: SequenceInstanceId,
    /// The owning track.
    pub track: TrackId,
    /// Section index, `None` for the track itself.
    pub section: Option<u32>,
}

impl EvaluationKey {
    /// Track-level key for an entity.
    pub fn track_of(entity: &EntityRef) -> Self {
        Self {
            sequence: entity.sequence,
            track: entity.track,
            section: None,
        }
    }

    /// Section-level key for an entity.
    pub fn section_of(entity: &EntityRef) -> Self {
        Self {
            sequence: entity.sequence,
            track: entity.track,
            section: Some(entity.section),
        }
    }
}

/// One chunk of an [`EvaluationGroup`]'s lookup table: a run of entities
/// sharing an evaluation group name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChunk {
    /// The shared evaluation group name.
    pub group_name: String,
    /// Offset of the chunk's entities in the flattened list.
    pub offset: u32,
    /// Number of entities needing one-time setup (stored first).
    pub init_count: u32,
    /// Number of entities to evaluate (stored after the init run).
    pub eval_count: u32,
}

/// The two-phase entity list evaluated over one field entry's range.
///
/// Entities are flattened in sorted order and chunked wherever the evaluation
/// group name changes; each chunk stores its init sub-list followed by its
/// full eval list. A group with zero chunks is a valid empty state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationGroup {
    chunks: Vec<GroupChunk>,
    entities: Vec<EntityRef>,
}

impl EvaluationGroup {
    /// Assemble a group from items already in evaluation order.
    pub fn from_sorted_items(items: &[GatheredGroupItem]) -> Self {
        let mut group = EvaluationGroup::default();
        let mut init: Vec<EntityRef> = Vec::new();
        let mut eval: Vec<EntityRef> = Vec::new();
        let mut current: Option<&str> = None;

        for item in items {
            if current != Some(item.group_name.as_str()) {
                if let Some(name) = current {
                    group.flush(name, &mut init, &mut eval);
                }
                current = Some(item.group_name.as_str());
            }
            if item.requires_init {
                init.push(item.entity);
            }
            eval.push(item.entity);
        }
        if let Some(name) = current {
            group.flush(name, &mut init, &mut eval);
        }
        group
    }

    fn flush(&mut self, name: &str, init: &mut Vec<EntityRef>, eval: &mut Vec<EntityRef>) {
        self.chunks.push(GroupChunk {
            group_name: name.to_string(),
            offset: self.entities.len() as u32,
            init_count: init.len() as u32,
            eval_count: eval.len() as u32,
        });
        self.entities.append(init);
        self.entities.append(eval);
    }

    /// The group's chunks in evaluation order.
    pub fn chunks(&self) -> &[GroupChunk] {
        &self.chunks
    }

    /// Whether the group evaluates nothing.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Entities needing one-time setup in a chunk.
    pub fn init_entities(&self, chunk: &GroupChunk) -> &[EntityRef] {
        let start = chunk.offset as usize;
        &self.entities[start..start + chunk.init_count as usize]
    }

    /// Entities evaluated in a chunk, in order.
    pub fn eval_entities(&self, chunk: &GroupChunk) -> &[EntityRef] {
        let start = chunk.offset as usize + chunk.init_count as usize;
        &self.entities[start..start + chunk.eval_count as usize]
    }

    /// Total number of evaluated entities across all chunks.
    pub fn eval_count(&self) -> usize {
        self.chunks.iter().map(|c| c.eval_count as usize).sum()
    }
}

/// Per-entry metadata consumed by the runtime player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMetadata {
    active_entities: Vec<(EvaluationKey, u32)>,
    active_sequences: Vec<SequenceInstanceId>,
    sequence_serials: IndexMap<SequenceInstanceId, u32>,
}

impl FieldMetadata {
    /// Build metadata for one entry.
    ///
    /// `items` must be in evaluation order; entity keys are tagged init-first
    /// with a strictly increasing insertion order, then re-sorted by key so
    /// lookups are stable regardless of gather order.
    pub fn build(
        items: &[GatheredGroupItem],
        serials: impl IntoIterator<Item = (SequenceInstanceId, u32)>,
    ) -> Self {
        let mut entities: Vec<(EvaluationKey, u32)> = Vec::new();
        let mut order = 0u32;
        {
            let mut push = |key: EvaluationKey| {
                entities.push((key, order));
                order += 1;
            };
            for item in items.iter().filter(|i| i.requires_init) {
                push(EvaluationKey::track_of(&item.entity));
                push(EvaluationKey::section_of(&item.entity));
            }
            for item in items.iter().filter(|i| !i.requires_init) {
                push(EvaluationKey::track_of(&item.entity));
                push(EvaluationKey::section_of(&item.entity));
            }
        }
        entities.sort();
        entities.dedup_by_key(|(key, _)| *key);

        let mut sequence_serials = IndexMap::new();
        for (instance, serial) in serials {
            sequence_serials.insert(instance, serial);
        }
        let mut active_sequences: Vec<SequenceInstanceId> =
            sequence_serials.keys().copied().collect();
        active_sequences.sort();

        Self {
            active_entities: entities,
            active_sequences,
            sequence_serials,
        }
    }

    /// Keys of every entity active over the entry, sorted by key.
    pub fn active_entities(&self) -> impl Iterator<Item = &EvaluationKey> {
        self.active_entities.iter().map(|(key, _)| key)
    }

    /// Whether the entry activates the given key.
    pub fn contains_entity(&self, key: &EvaluationKey) -> bool {
        self.active_entities
            .binary_search_by(|(k, _)| k.cmp(key))
            .is_ok()
    }

    /// Sequence instances active over the entry, sorted.
    pub fn active_sequences(&self) -> &[SequenceInstanceId] {
        &self.active_sequences
    }

    /// The live template serial recorded for a sequence instance, used by the
    /// player to detect that a sub-sequence's own template changed even when
    /// this field entry did not.
    pub fn sequence_serial(&self, instance: SequenceInstanceId) -> Option<u32> {
        self.sequence_serials.get(&instance).copied()
    }
}
