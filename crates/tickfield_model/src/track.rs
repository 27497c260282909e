// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track definitions for the authoring model.

use crate::section::Section;
use serde::{Deserialize, Serialize};
use tickfield_core::TimeRange;
use uuid::Uuid;

/// Unique identifier for a track
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TrackId(pub Uuid);

impl TrackId {
    /// Create a new random track ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluation phase inherited down the sequence hierarchy.
///
/// Tracks evaluate normally by default; a sub-sequence entry may schedule its
/// subtree as pre-roll or post-roll, and only tracks that opt in participate
/// in those phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RollPhase {
    /// Regular evaluation.
    #[default]
    Normal,
    /// The subtree evaluates ahead of its actual range.
    Preroll,
    /// The subtree evaluates after its actual range.
    Postroll,
}

impl RollPhase {
    /// Whether a track participates under this inherited phase.
    pub fn admits(self, track: &Track) -> bool {
        match self {
            Self::Normal => true,
            Self::Preroll => track.allow_preroll,
            Self::Postroll => track.allow_postroll,
        }
    }

    /// Phase a child subtree inherits: an already-rolled parent wins.
    pub fn inherit(self, child: RollPhase) -> RollPhase {
        if self == Self::Normal {
            child
        } else {
            self
        }
    }
}

/// A track in a sequence: an ordered list of sections sharing one evaluation
/// group and priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    /// Evaluation group the track's entities belong to.
    pub evaluation_group: String,
    /// Priority among tracks in the same group (higher evaluates first).
    pub evaluation_priority: i32,
    /// Whether the track evaluates during pre-roll.
    pub allow_preroll: bool,
    /// Whether the track evaluates during post-roll.
    pub allow_postroll: bool,
    /// Sections on this track.
    pub sections: Vec<Section>,
}

impl Track {
    /// Create a new track in the given evaluation group.
    pub fn new(name: impl Into<String>, evaluation_group: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            evaluation_group: evaluation_group.into(),
            evaluation_priority: 0,
            allow_preroll: false,
            allow_postroll: false,
            sections: Vec::new(),
        }
    }

    /// Add a section, keeping sections ordered by lower bound.
    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
        self.sections
            .sort_by(|a, b| tickfield_core::cmp_lower(a.range.lower, b.range.lower));
    }

    /// Sections overlapping a range.
    pub fn sections_overlapping<'a>(
        &'a self,
        range: &'a TimeRange,
    ) -> impl Iterator<Item = &'a Section> + 'a {
        self.sections.iter().filter(move |s| s.range.overlaps(range))
    }

    /// Number of sections on the track.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}
