// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cached hierarchy of sub-sequence instances.
//!
//! Every placement of a child sequence in the tree gets its own stable
//! instance identity, derived from the path of sub-sequence entries leading
//! to it. The cache stores the resolved data per instance (accumulated
//! transform, bias, clamped play range) and invalidates whole subtrees when
//! the authored entry they hang off changes.

use crate::error::CompileError;
use indexmap::IndexMap;
use std::hash::{Hash, Hasher};
use tickfield_core::{TimeRange, TimeTransform};
use tickfield_model::{ObjectBindingId, RollPhase, SequenceId, SubSequenceEntry, SubSequenceEntryId};
use uuid::Uuid;

/// Namespace for deriving deterministic instance identities.
const INSTANCE_NAMESPACE: Uuid = Uuid::from_u128(0x7d1c_f1e1_9a4b_42c8_b7a3_5c0e2d9f6a11);

/// Path-qualified identity of one placement of a sequence in the hierarchy.
///
/// The same authored sequence instanced twice in different branches resolves
/// to two distinct, stable instance ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceInstanceId(pub Uuid);

impl SequenceInstanceId {
    /// Instance id of a sequence compiled as the root of a hierarchy.
    pub fn root_of(sequence: SequenceId) -> Self {
        Self(Uuid::new_v5(&INSTANCE_NAMESPACE, sequence.0.as_bytes()))
    }

    /// Instance id of the child reached through a sub-sequence entry.
    pub fn child(self, entry: SubSequenceEntryId) -> Self {
        Self(Uuid::new_v5(&self.0, entry.0.as_bytes()))
    }
}

/// Resolved data for one sub-sequence placement, returned by value so callers
/// can extend their gather context without holding a cache borrow.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSubSequence {
    /// The placement's instance id.
    pub instance: SequenceInstanceId,
    /// The authored child sequence.
    pub sequence: SequenceId,
    /// Accumulated root space -> child local space transform.
    pub root_to_local: TimeTransform,
    /// Accumulated hierarchical bias.
    pub hierarchical_bias: i32,
    /// Child-local play range, already clamped by every ancestor.
    pub play_range: TimeRange,
    /// Evaluation phase authored on the entry.
    pub phase: RollPhase,
    /// Object binding the child resolves against.
    pub object_binding: Option<ObjectBindingId>,
}

/// One cached node of the hierarchy.
#[derive(Debug, Clone)]
pub struct HierarchyNode {
    /// The authored sequence this instance plays.
    pub sequence: SequenceId,
    /// Parent instance, `None` for the root.
    pub parent: Option<SequenceInstanceId>,
    /// Accumulated root space -> local space transform.
    pub root_to_local: TimeTransform,
    /// Accumulated hierarchical bias.
    pub hierarchical_bias: i32,
    /// Local play range clamped by every ancestor.
    pub play_range: TimeRange,
    /// Object binding, if any.
    pub object_binding: Option<ObjectBindingId>,
    /// Evaluation phase authored on the entry.
    pub phase: RollPhase,
    children: Vec<SequenceInstanceId>,
    change_signature: u64,
}

impl HierarchyNode {
    /// Instances cached directly below this node.
    pub fn children(&self) -> &[SequenceInstanceId] {
        &self.children
    }

    fn resolved(&self, instance: SequenceInstanceId) -> ResolvedSubSequence {
        ResolvedSubSequence {
            instance,
            sequence: self.sequence,
            root_to_local: self.root_to_local,
            hierarchical_bias: self.hierarchical_bias,
            play_range: self.play_range,
            phase: self.phase,
            object_binding: self.object_binding,
        }
    }
}

/// Cache of resolved sub-sequence instances for one compiled root.
///
/// Owned by the root's compiled object; never shared between roots, never
/// process-global.
#[derive(Debug, Clone, Default)]
pub struct HierarchyCache {
    nodes: IndexMap<SequenceInstanceId, HierarchyNode>,
}

impl HierarchyCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether an instance is cached.
    pub fn contains(&self, instance: SequenceInstanceId) -> bool {
        self.nodes.contains_key(&instance)
    }

    /// The node for an instance, if cached.
    pub fn node(&self, instance: SequenceInstanceId) -> Option<&HierarchyNode> {
        self.nodes.get(&instance)
    }

    /// Resolve an instance id to its node, failing decisively for an id the
    /// hierarchy does not know.
    pub fn remap(&self, instance: SequenceInstanceId) -> Result<&HierarchyNode, CompileError> {
        self.nodes
            .get(&instance)
            .ok_or(CompileError::InvalidReference(instance))
    }

    /// Insert or refresh the root node. The root carries the identity
    /// transform and no bias; only its play range can change between
    /// compiles.
    pub fn ensure_root(
        &mut self,
        instance: SequenceInstanceId,
        sequence: SequenceId,
        play_range: TimeRange,
    ) {
        match self.nodes.get_mut(&instance) {
            Some(node) => node.play_range = play_range,
            None => {
                self.nodes.insert(
                    instance,
                    HierarchyNode {
                        sequence,
                        parent: None,
                        root_to_local: TimeTransform::identity(),
                        hierarchical_bias: 0,
                        play_range,
                        object_binding: None,
                        phase: RollPhase::Normal,
                        children: Vec::new(),
                        change_signature: 0,
                    },
                );
            }
        }
    }

    /// Return the cached resolution for `child`, rebuilding it (and
    /// discarding its entire cached subtree) when the authored entry or any
    /// inherited parent parameter has changed since it was cached.
    ///
    /// `parent_transform`, `parent_bias` and `parent_clamp` are the parent's
    /// accumulated root-to-local transform, accumulated bias, and resolved
    /// parent-local play range.
    pub fn get_or_create(
        &mut self,
        child: SequenceInstanceId,
        parent: SequenceInstanceId,
        entry: &SubSequenceEntry,
        parent_transform: &TimeTransform,
        parent_bias: i32,
        parent_clamp: TimeRange,
    ) -> ResolvedSubSequence {
        let signature = combined_signature(entry, parent_transform, parent_bias, parent_clamp);
        if let Some(node) = self.nodes.get(&child) {
            if node.change_signature == signature {
                return node.resolved(child);
            }
        }

        self.remove_subtree(child);

        // The child's effective play range: its authored local clamp
        // intersected with the parent's clamp re-expressed in child space.
        let inherited_clamp = entry.transform.apply(parent_clamp);
        let play_range = inherited_clamp
            .intersect(&entry.play_range)
            .unwrap_or_else(TimeRange::empty);

        let node = HierarchyNode {
            sequence: entry.sequence,
            parent: Some(parent),
            root_to_local: parent_transform.then(&entry.transform),
            hierarchical_bias: parent_bias + entry.hierarchical_bias,
            play_range,
            object_binding: entry.object_binding,
            phase: entry.phase,
            children: Vec::new(),
            change_signature: signature,
        };
        let resolved = node.resolved(child);
        self.nodes.insert(child, node);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            if !parent_node.children.contains(&child) {
                parent_node.children.push(child);
            }
        }
        resolved
    }

    /// Remove an instance and, transitively, every cached descendant.
    /// Invalidation cascades downward only.
    pub fn remove_subtree(&mut self, instance: SequenceInstanceId) {
        let mut stack = vec![instance];
        let mut removed = 0usize;
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.shift_remove(&current) else {
                continue;
            };
            removed += 1;
            stack.extend(node.children.iter().copied());
            if let Some(parent) = node.parent {
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    parent_node.children.retain(|c| *c != current);
                }
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "invalidated hierarchy subtree");
        }
    }
}

fn combined_signature(
    entry: &SubSequenceEntry,
    parent_transform: &TimeTransform,
    parent_bias: i32,
    parent_clamp: TimeRange,
) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    entry.change_signature().hash(&mut hasher);
    parent_transform.hash(&mut hasher);
    parent_bias.hash(&mut hasher);
    parent_clamp.hash(&mut hasher);
    hasher.finish()
}
