// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authoring data model for tickfield.
//!
//! This crate holds the authored side of a timeline: sequences of tracks,
//! tracks of time-ranged sections, and sub-sequence entries nesting child
//! sequences with a time transform and priority bias. The compiler in
//! `tickfield_compiler` reads this model and never mutates it.
//!
//! ## Architecture
//!
//! - [`Section`]: a time range plus an implementation reference
//! - [`Track`]: ordered sections sharing an evaluation group and priority
//! - [`Sequence`]: tracks plus [`SubSequenceEntry`] nesting, with a content
//!   signature bumped on every authored change
//! - [`SequenceStore`]: id-addressed arena of sequences

pub mod section;
pub mod sequence;
pub mod track;

pub use section::Section;
pub use sequence::{
    ObjectBindingId, Sequence, SequenceId, SequenceStore, SubSequenceEntry, SubSequenceEntryId,
};
pub use track::{RollPhase, Track, TrackId};
