// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiler errors.

use crate::hierarchy::SequenceInstanceId;

/// Errors surfaced by the compiler.
///
/// Most degraded inputs (dangling child references, empty play ranges,
/// non-intersecting compile ranges) are well-defined partial or empty results,
/// not errors; only contract violations reach this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// A sequence instance id that no hierarchy node resolves.
    #[error("sequence instance {0:?} is not present in the hierarchy")]
    InvalidReference(SequenceInstanceId),
}
