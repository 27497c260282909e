// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiler from the authored tickfield model to an evaluation field.
//!
//! Compilation turns a root [`Sequence`](tickfield_model::Sequence) and
//! everything nested below it into a [`field::EvaluationField`]: an ordered
//! list of disjoint root-space ranges, each carrying the exact set of section
//! implementations to evaluate there and the order to evaluate them in.
//!
//! ## Pipeline
//!
//! - [`segment`]: per-sequence flattening of overlapping sections into
//!   segments, cached per content signature
//! - [`hierarchy`]: resolution of sub-sequence placements into stable
//!   instances with accumulated transforms, biases and clamps
//! - [`gather`]: recursive walk collecting active content into root-space
//!   interval stores
//! - [`compile`]: the unit walk carving the gathered stores into field
//!   entries, shared by full and ranged compilation so both produce
//!   identical fields
//! - [`group`] and [`field`]: the compiled output representation

pub mod compile;
pub mod error;
pub mod field;
pub mod gather;
pub mod group;
pub mod hierarchy;
pub mod segment;

pub use compile::{CompiledSequence, SequenceCompiler};
pub use error::CompileError;
pub use field::{EvaluationField, FieldEntry};
pub use gather::{EmptySource, GatheredData, GatheredGroupItem, Gatherer};
pub use group::{EntityRef, EvaluationGroup, EvaluationKey, FieldMetadata, GroupChunk};
pub use hierarchy::{HierarchyCache, HierarchyNode, ResolvedSubSequence, SequenceInstanceId};
pub use segment::{CompiledTrack, SectionRef, Segment, SequenceCache};
