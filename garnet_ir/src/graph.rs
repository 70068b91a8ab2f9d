//! Graph structure and mutation protocol.
//!
//! The graph provides:
//! - **Arena-based storage**: Nodes are owned by the graph and addressed by
//!   stable [`NodeId`] indices; slots are never reused after deletion
//! - **Identity**: The graph is the sole writer of node ids; equality and
//!   hashing of ids is identity, never value equality
//! - **Uniqueness cache**: Value-numberable leaf kinds are hash-consed to a
//!   single canonical instance per distinct value
//! - **Mutation protocol**: The only sanctioned ways to restructure the
//!   graph, keeping input/usage/successor/predecessor edges mutually
//!   consistent across every logical mutation
//!
//! # Contract checking
//!
//! Every operation validates its preconditions when contract checks are
//! compiled in (`debug_assertions` or the `strict-checks` feature) and
//! reports defects as [`GraphError`]. Release builds without the feature
//! skip the checks; the protocol keeps the invariants by construction when
//! only sanctioned operations are used.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::arena::Arena;
use crate::error::GraphError;
use crate::external::ExternalPool;
use crate::kind::{ArithOp, CmpOp, NodeKind, ValueKey};
use crate::node::{Node, NodeId, NodeRef};
use crate::verifier::{self, Violation};

/// Whether contract checks are compiled into this build.
#[inline]
const fn checks_enabled() -> bool {
    cfg!(any(debug_assertions, feature = "strict-checks"))
}

// =============================================================================
// Listeners
// =============================================================================

/// Structural event delivered to graph listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    /// An input slot of `node` was rewritten.
    InputChanged {
        /// The node whose input changed.
        node: NodeId,
    },
    /// `node` lost its last usage while an input slot referencing it was
    /// cleared; it may now be dead.
    UsagesDroppedToZero {
        /// The node with zero usages.
        node: NodeId,
    },
}

/// Observer hook for work-list driven collaborators.
///
/// Listeners receive events synchronously during mutation; the graph borrow
/// they are handed is read-only, so reactions (opportunistic deletion of
/// dead nodes, re-canonicalization) must be queued and applied afterwards.
pub trait GraphListener {
    /// Called once per structural event.
    fn on_event(&mut self, graph: &Graph, event: NodeEvent);
}

// =============================================================================
// Graph
// =============================================================================

/// A mutable directed graph of IR nodes.
pub struct Graph {
    /// Arena owning all nodes ever registered, alive and deleted.
    nodes: Arena<Node>,

    /// Uniqueness cache for value-numberable leaf kinds.
    cache: FxHashMap<ValueKey, NodeId>,

    /// Pool of shared external canonical constants.
    externals: Arc<ExternalPool>,

    /// Registered observers.
    listeners: Vec<Box<dyn GraphListener>>,

    /// Number of alive nodes.
    live_nodes: usize,
}

impl Graph {
    /// Create an empty graph with a private external pool.
    pub fn new() -> Self {
        Self::with_externals(Arc::new(ExternalPool::new()))
    }

    /// Create an empty graph linking against a shared external pool.
    pub fn with_externals(externals: Arc<ExternalPool>) -> Self {
        Graph {
            nodes: Arena::with_capacity(64),
            cache: FxHashMap::default(),
            externals,
            listeners: Vec::new(),
            live_nodes: 0,
        }
    }

    /// The external pool this graph links against.
    #[inline]
    pub fn externals(&self) -> &Arc<ExternalPool> {
        &self.externals
    }

    /// Register an observer for structural events.
    pub fn add_listener(&mut self, listener: Box<dyn GraphListener>) {
        self.listeners.push(listener);
    }

    fn fire(&mut self, event: NodeEvent) {
        if self.listeners.is_empty() {
            return;
        }
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in &mut listeners {
            listener.on_event(self, event);
        }
        // Listeners registered during dispatch land behind the existing ones.
        listeners.extend(self.listeners.drain(..));
        self.listeners = listeners;
    }

    // =========================================================================
    // Node Access
    // =========================================================================

    /// Get a reference to a node. Panics on an id from another graph.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Get a node by id.
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Number of alive nodes.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live_nodes
    }

    /// Number of slots ever allocated, including deleted nodes.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no alive nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live_nodes == 0
    }

    /// Iterate over all alive nodes with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().filter(|(_, node)| node.is_alive())
    }

    /// Iterate over the populated input slots of a node.
    pub fn inputs(&self, id: NodeId) -> impl Iterator<Item = (usize, NodeRef)> + '_ {
        self.nodes[id].inputs()
    }

    /// Iterate over the populated successor slots of a node.
    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.nodes[id].successors()
    }

    /// The unique predecessor of a node, if any.
    #[inline]
    pub fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].predecessor()
    }

    /// Control-flow successors of a node (populated successor targets).
    pub fn cfg_successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id].successors().map(|(_, target)| target)
    }

    /// Control-flow predecessor of a node.
    #[inline]
    pub fn cfg_predecessor(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].predecessor()
    }

    /// Iterate over the usage multiset of a node.
    ///
    /// Fails with `UnsupportedOperation` for kinds that do not record
    /// usages; the multiset is undefined for them.
    pub fn usages(
        &self,
        id: NodeId,
    ) -> Result<impl Iterator<Item = NodeId> + '_, GraphError> {
        let node = &self.nodes[id];
        if checks_enabled() && !node.records_usages() {
            return Err(GraphError::UnsupportedOperation {
                node: id,
                what: "usage queries",
            });
        }
        Ok(node.usage_list().iter())
    }

    /// Number of usage entries of a node, counting duplicates.
    pub fn usage_count(&self, id: NodeId) -> Result<usize, GraphError> {
        let node = &self.nodes[id];
        if checks_enabled() && !node.records_usages() {
            return Err(GraphError::UnsupportedOperation {
                node: id,
                what: "usage queries",
            });
        }
        Ok(node.usage_list().len())
    }

    pub(crate) fn cache_lookup(&self, key: &ValueKey) -> Option<NodeId> {
        self.cache.get(key).copied()
    }

    /// Raw node access for corruption-injection tests. The mutation
    /// protocol never goes through this.
    #[cfg(test)]
    pub(crate) fn node_mut_raw(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    // =========================================================================
    // Registration and Uniqueness
    // =========================================================================

    /// Register a detached node, assign its id, and establish reverse edges
    /// for whatever inputs and successors it already carries.
    pub fn initialize(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let id = self.nodes.next_id();
        if checks_enabled() {
            if node.is_initialized() {
                return Err(GraphError::InvariantViolation {
                    node: id,
                    detail: "node is already registered with a graph",
                });
            }
            let desc = node.descriptor();
            let slots_match = node.input_count() >= desc.input_count()
                && (node.variadic_count() == 0 || desc.variadic_input.is_some())
                && node.successor_count() == desc.successor_count();
            if !slots_match {
                return Err(GraphError::InvariantViolation {
                    node: id,
                    detail: "edge slots do not match the kind's descriptor",
                });
            }
            for (_, input) in node.inputs() {
                self.check_edge_target(id, input)?;
            }
            for (_, successor) in node.successors() {
                if !self.get(successor).is_some_and(|n| n.is_alive()) {
                    return Err(GraphError::InvariantViolation {
                        node: id,
                        detail: "successor target is not alive in this graph",
                    });
                }
                if self.nodes[successor].predecessor().is_some() {
                    return Err(GraphError::InvariantViolation {
                        node: successor,
                        detail: "successor already has a predecessor",
                    });
                }
            }
        }

        let mut node = node;
        node.assign_id(id);
        let allocated = self.nodes.alloc(node);
        debug_assert_eq!(allocated, id);

        let inputs: SmallVec<[NodeRef; 4]> =
            self.nodes[id].inputs().map(|(_, target)| target).collect();
        for target in inputs {
            if let NodeRef::Owned(def) = target {
                if self.nodes[def].records_usages() {
                    self.nodes[def].usage_list_mut().add(id);
                    self.nodes[def].bump_usage_stamp();
                }
            }
        }
        let successors: SmallVec<[NodeId; 2]> =
            self.nodes[id].successors().map(|(_, target)| target).collect();
        for successor in successors {
            self.nodes[successor].set_predecessor(Some(id));
            self.nodes[successor].bump_structure_stamp();
        }

        self.live_nodes += 1;
        Ok(id)
    }

    /// Build and register a node in one step.
    pub fn add(&mut self, kind: NodeKind, inputs: &[NodeRef]) -> Result<NodeId, GraphError> {
        self.initialize(Node::with_inputs(kind, inputs))
    }

    /// Canonicalize a value-numberable leaf candidate through the
    /// uniqueness cache.
    ///
    /// On a hit the candidate is discarded and the existing canonical node
    /// returned; on a miss the candidate is registered and becomes the
    /// canonical instance. This is the one operation that compares nodes by
    /// value instead of identity.
    pub fn unique(&mut self, node: Node) -> Result<NodeId, GraphError> {
        match node.kind().value_key() {
            Some(key) => {
                if let Some(existing) = self.cache.get(&key) {
                    return Ok(*existing);
                }
                let id = self.initialize(node)?;
                self.cache.insert(key, id);
                Ok(id)
            }
            None => {
                if checks_enabled() {
                    return Err(GraphError::UnsupportedOperation {
                        node: self.nodes.next_id(),
                        what: "value numbering a kind that is not a value-numberable leaf",
                    });
                }
                self.initialize(node)
            }
        }
    }

    /// Look up the canonical node for a value-numberable kind without
    /// registering anything. A miss is an ordinary absence, not an error.
    pub fn find_in_cache(&self, kind: &NodeKind) -> Option<NodeId> {
        kind.value_key().and_then(|key| self.cache.get(&key).copied())
    }

    /// Require that an external reference held by `user` is canonical in
    /// this graph's pool.
    pub fn verify_unique_if_external(
        &self,
        user: NodeId,
        target: NodeRef,
    ) -> Result<(), GraphError> {
        match target {
            NodeRef::External(id) if !self.externals.is_canonical(id) => {
                Err(GraphError::InvariantViolation {
                    node: user,
                    detail: "external reference is not canonical in this graph's pool",
                })
            }
            _ => Ok(()),
        }
    }

    /// Validate an edge or replacement target: null, external-and-canonical,
    /// or alive in this graph.
    fn check_edge_target(&self, user: NodeId, target: NodeRef) -> Result<(), GraphError> {
        match target {
            NodeRef::Owned(id) => {
                if self.get(id).is_some_and(|n| n.is_alive()) {
                    Ok(())
                } else {
                    Err(GraphError::CrossGraphReplacement { node: user })
                }
            }
            NodeRef::External(id) => {
                if self.externals.is_canonical(id) {
                    Ok(())
                } else {
                    Err(GraphError::CrossGraphReplacement { node: user })
                }
            }
        }
    }

    fn check_alive(&self, id: NodeId, detail: &'static str) -> Result<(), GraphError> {
        if checks_enabled() && !self.get(id).is_some_and(|n| n.is_alive()) {
            return Err(GraphError::InvariantViolation { node: id, detail });
        }
        Ok(())
    }

    // =========================================================================
    // Single-Edge Mutation
    // =========================================================================

    /// Rewrite one input slot, maintaining the target's usage list.
    pub fn set_input(
        &mut self,
        node: NodeId,
        slot: usize,
        new: Option<NodeRef>,
    ) -> Result<(), GraphError> {
        self.check_alive(node, "mutating a node that is not alive")?;
        if checks_enabled() {
            if slot >= self.nodes[node].input_count() {
                return Err(GraphError::InvariantViolation {
                    node,
                    detail: "input slot out of range",
                });
            }
            if let Some(target) = new {
                self.check_edge_target(node, target)?;
            }
        }

        let old = self.nodes[node].input(slot);
        if old == new {
            return Ok(());
        }
        self.nodes[node].set_input_slot(slot, new);
        self.nodes[node].bump_structure_stamp();
        self.update_usages(node, old, new)?;
        self.fire(NodeEvent::InputChanged { node });
        Ok(())
    }

    /// Append a variadic input slot and wire it.
    pub fn add_variadic_input(
        &mut self,
        node: NodeId,
        target: Option<NodeRef>,
    ) -> Result<usize, GraphError> {
        self.check_alive(node, "mutating a node that is not alive")?;
        if checks_enabled() && self.nodes[node].descriptor().variadic_input.is_none() {
            return Err(GraphError::UnsupportedOperation {
                node,
                what: "variadic inputs",
            });
        }
        let slot = self.nodes[node].push_input_slot();
        self.nodes[node].bump_structure_stamp();
        self.set_input(node, slot, target)?;
        Ok(slot)
    }

    /// Rewrite one successor slot, maintaining predecessor back-references.
    ///
    /// Successors are exclusively owned: attaching a target that already has
    /// a predecessor is a contract violation.
    pub fn set_successor(
        &mut self,
        node: NodeId,
        slot: usize,
        new: Option<NodeId>,
    ) -> Result<(), GraphError> {
        self.check_alive(node, "mutating a node that is not alive")?;
        if checks_enabled() && slot >= self.nodes[node].successor_count() {
            return Err(GraphError::InvariantViolation {
                node,
                detail: "successor slot out of range",
            });
        }

        let old = self.nodes[node].successor(slot);
        if old == new {
            return Ok(());
        }
        if let Some(target) = new {
            if checks_enabled() {
                if !self.get(target).is_some_and(|n| n.is_alive()) {
                    return Err(GraphError::CrossGraphReplacement { node });
                }
                if self.nodes[target].predecessor().is_some() {
                    return Err(GraphError::InvariantViolation {
                        node: target,
                        detail: "successor already has a predecessor",
                    });
                }
            }
        }

        if let Some(detached) = old {
            self.nodes[detached].set_predecessor(None);
            self.nodes[detached].bump_structure_stamp();
        }
        if let Some(target) = new {
            self.nodes[target].set_predecessor(Some(node));
            self.nodes[target].bump_structure_stamp();
        }
        self.nodes[node].set_successor_slot(slot, new);
        self.nodes[node].bump_structure_stamp();
        Ok(())
    }

    /// Maintain usage lists across an input rewrite of `user` from `old` to
    /// `new`, firing the zero-usages hook when `old` loses its last usage
    /// while the slot is cleared.
    fn update_usages(
        &mut self,
        user: NodeId,
        old: Option<NodeRef>,
        new: Option<NodeRef>,
    ) -> Result<(), GraphError> {
        if let Some(NodeRef::Owned(def)) = old {
            if self.nodes[def].records_usages() {
                let removed = self.nodes[def].usage_list_mut().remove_one(user);
                self.nodes[def].bump_usage_stamp();
                if checks_enabled() && !removed {
                    return Err(GraphError::InvariantViolation {
                        node: def,
                        detail: "usage list out of sync with input edges",
                    });
                }
                if new.is_none() && self.nodes[def].usage_list().is_empty() {
                    self.fire(NodeEvent::UsagesDroppedToZero { node: def });
                }
            }
        }
        if let Some(NodeRef::Owned(def)) = new {
            if self.nodes[def].records_usages() {
                self.nodes[def].usage_list_mut().add(user);
                self.nodes[def].bump_usage_stamp();
            }
        }
        Ok(())
    }

    // =========================================================================
    // Mutation Protocol
    // =========================================================================

    /// Rewrite every usage of `this` to reference `other` instead.
    ///
    /// Each usage entry rewrites the user's first input slot still
    /// referencing `this`; a missing slot means the usage list and the edge
    /// slots disagree and fails with `EdgeNotFound`. Afterwards `this` has
    /// no usages.
    pub fn replace_at_usages(
        &mut self,
        this: NodeId,
        other: Option<NodeRef>,
    ) -> Result<(), GraphError> {
        self.check_alive(this, "replacing a node that is not alive")?;
        if checks_enabled() {
            if !self.nodes[this].records_usages() {
                return Err(GraphError::UnsupportedOperation {
                    node: this,
                    what: "usage queries",
                });
            }
            if other == Some(NodeRef::Owned(this)) {
                return Err(GraphError::InvariantViolation {
                    node: this,
                    detail: "a node cannot replace itself",
                });
            }
            if let Some(target) = other {
                self.check_edge_target(this, target)?;
            }
        }

        let users = self.nodes[this].usage_list_mut().take();
        self.nodes[this].bump_usage_stamp();
        for user in users {
            let Some(slot) = self.nodes[user].find_input(NodeRef::Owned(this)) else {
                if checks_enabled() {
                    return Err(GraphError::EdgeNotFound { user, target: this });
                }
                continue;
            };
            self.nodes[user].set_input_slot(slot, other);
            self.nodes[user].bump_structure_stamp();
            if let Some(NodeRef::Owned(def)) = other {
                if self.nodes[def].records_usages() {
                    self.nodes[def].usage_list_mut().add(user);
                    self.nodes[def].bump_usage_stamp();
                }
            }
            self.fire(NodeEvent::InputChanged { node: user });
        }
        Ok(())
    }

    /// Rewrite the successor slot owning `this` to reference `other`.
    ///
    /// A no-op when `this` has no predecessor.
    pub fn replace_at_predecessor(
        &mut self,
        this: NodeId,
        other: Option<NodeId>,
    ) -> Result<(), GraphError> {
        self.check_alive(this, "replacing a node that is not alive")?;
        let Some(pred) = self.nodes[this].predecessor() else {
            return Ok(());
        };
        let Some(slot) = self.nodes[pred].find_successor(this) else {
            return if checks_enabled() {
                Err(GraphError::EdgeNotFound {
                    user: pred,
                    target: this,
                })
            } else {
                Ok(())
            };
        };
        self.set_successor(pred, slot, other)
    }

    /// Splice `this` out of the graph, canonicalizing it to `other`.
    ///
    /// Clears successors, replaces at usages and at the predecessor, then
    /// deletes `this`. The standard operation passes use when a node has
    /// been canonicalized to an equivalent value.
    pub fn replace_and_delete(
        &mut self,
        this: NodeId,
        other: Option<NodeRef>,
    ) -> Result<(), GraphError> {
        self.clear_successors(this)?;
        self.replace_at_usages(this, other)?;
        let control_target = match other {
            Some(NodeRef::Owned(id)) => Some(id),
            Some(NodeRef::External(_)) => {
                if checks_enabled() && self.nodes[this].predecessor().is_some() {
                    return Err(GraphError::InvariantViolation {
                        node: this,
                        detail: "external node cannot take a control-flow position",
                    });
                }
                None
            }
            None => None,
        };
        self.replace_at_predecessor(this, control_target)?;
        self.safe_delete(this)
    }

    /// Clear every input slot, removing `this` from its inputs' usage sets.
    pub fn clear_inputs(&mut self, this: NodeId) -> Result<(), GraphError> {
        for slot in 0..self.nodes[this].input_count() {
            self.set_input(this, slot, None)?;
        }
        Ok(())
    }

    /// Clear every successor slot, breaking the predecessor back-links.
    pub fn clear_successors(&mut self, this: NodeId) -> Result<(), GraphError> {
        for slot in 0..self.nodes[this].successor_count() {
            self.set_successor(this, slot, None)?;
        }
        Ok(())
    }

    /// Delete a node that nothing references any more.
    ///
    /// Clears all outgoing edges, evicts the node from the uniqueness cache
    /// if it is the canonical instance, unregisters it, and flips its id
    /// into the deleted range. Deletion is permanent; the slot is never
    /// reused.
    pub fn safe_delete(&mut self, this: NodeId) -> Result<(), GraphError> {
        self.check_alive(this, "deleting a node that is not alive")?;
        if checks_enabled() {
            let node = &self.nodes[this];
            let usage_count = if node.records_usages() {
                node.usage_list().len()
            } else {
                0
            };
            let has_predecessor = node.predecessor().is_some();
            if usage_count > 0 || has_predecessor {
                return Err(GraphError::NodeStillReferenced {
                    node: this,
                    usage_count,
                    has_predecessor,
                });
            }
        }

        self.clear_inputs(this)?;
        self.clear_successors(this)?;

        if let Some(key) = self.nodes[this].kind().value_key() {
            if self.cache.get(&key) == Some(&this) {
                self.cache.remove(&key);
            }
        }
        self.nodes[this].mark_deleted();
        self.nodes[this].bump_structure_stamp();
        self.nodes[this].bump_usage_stamp();
        self.live_nodes -= 1;
        Ok(())
    }

    // =========================================================================
    // Copying and Cloning
    // =========================================================================

    /// Create a node of the same kind sharing this node's input targets.
    ///
    /// The copy records fresh usage entries on the same inputs.
    /// Value-numberable leaves consult the uniqueness cache and may return
    /// the existing canonical node instead of allocating.
    pub fn copy_with_inputs(&mut self, this: NodeId) -> Result<NodeId, GraphError> {
        self.check_alive(this, "copying a node that is not alive")?;
        let kind = *self.nodes[this].kind();
        if kind.is_value_numberable_leaf() {
            return self.unique(Node::new(kind));
        }

        let source = &self.nodes[this];
        let fixed = source.descriptor().input_count();
        let mut copy = Node::new(kind);
        for slot in 0..source.input_count() {
            let target = source.input(slot);
            if slot < fixed {
                copy.wire_input(slot, target);
            } else {
                copy.wire_variadic_input(target);
            }
        }
        self.initialize(copy)
    }

    /// Duplicate this node's kind and slot shape into another graph with
    /// all edges cleared; the caller re-links the clone.
    ///
    /// Value-numberable leaves canonicalize against the destination graph's
    /// uniqueness cache instead of allocating a fresh node.
    pub fn clone_into(&self, this: NodeId, dest: &mut Graph) -> Result<NodeId, GraphError> {
        if checks_enabled() && !self.get(this).is_some_and(|n| n.is_alive()) {
            return Err(GraphError::InvariantViolation {
                node: this,
                detail: "cloning a node that is not alive",
            });
        }
        let source = &self.nodes[this];
        let kind = *source.kind();
        if kind.is_value_numberable_leaf() {
            return dest.unique(Node::new(kind));
        }

        let mut clone = Node::new(kind);
        for _ in 0..source.variadic_count() {
            clone.wire_variadic_input(None);
        }
        dest.initialize(clone)
    }

    // =========================================================================
    // Cursors
    // =========================================================================

    /// Detached cursor over the populated input slots of a node.
    pub fn input_cursor(&self, node: NodeId) -> InputCursor {
        InputCursor {
            node,
            slot: 0,
            stamp: self.nodes[node].structure_stamp(),
        }
    }

    /// Detached cursor over the populated successor slots of a node.
    pub fn successor_cursor(&self, node: NodeId) -> SuccessorCursor {
        SuccessorCursor {
            node,
            slot: 0,
            stamp: self.nodes[node].structure_stamp(),
        }
    }

    /// Detached cursor over the usage multiset of a node.
    pub fn usage_cursor(&self, node: NodeId) -> Result<UsageCursor, GraphError> {
        if checks_enabled() && !self.nodes[node].records_usages() {
            return Err(GraphError::UnsupportedOperation {
                node,
                what: "usage queries",
            });
        }
        Ok(UsageCursor {
            node,
            index: 0,
            stamp: self.nodes[node].usage_stamp(),
        })
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Check invariants over every alive node.
    pub fn verify(&self) -> Result<(), Violation> {
        verifier::verify_graph(self)
    }

    /// Check invariants over the alive nodes reachable from `roots`.
    pub fn verify_from(&self, roots: &[NodeId]) -> Result<(), Violation> {
        verifier::verify_from(self, roots)
    }

    // =========================================================================
    // Convenience Constructors
    // =========================================================================

    /// Get or create the canonical integer constant.
    pub fn const_int(&mut self, value: i64) -> Result<NodeId, GraphError> {
        self.unique(Node::new(NodeKind::ConstInt(value)))
    }

    /// Get or create the canonical float constant.
    pub fn const_float(&mut self, value: f64) -> Result<NodeId, GraphError> {
        self.unique(Node::new(NodeKind::ConstFloat(value.to_bits())))
    }

    /// Get or create the canonical boolean constant.
    pub fn const_bool(&mut self, value: bool) -> Result<NodeId, GraphError> {
        self.unique(Node::new(NodeKind::ConstBool(value)))
    }

    /// Get or create the canonical parameter node.
    pub fn parameter(&mut self, index: u16) -> Result<NodeId, GraphError> {
        self.unique(Node::new(NodeKind::Parameter(index)))
    }

    /// Create an integer arithmetic node.
    pub fn int_op(
        &mut self,
        op: ArithOp,
        x: NodeRef,
        y: NodeRef,
    ) -> Result<NodeId, GraphError> {
        self.add(NodeKind::IntOp(op), &[x, y])
    }

    /// Create an integer comparison node.
    pub fn int_cmp(
        &mut self,
        op: CmpOp,
        x: NodeRef,
        y: NodeRef,
    ) -> Result<NodeId, GraphError> {
        self.add(NodeKind::IntCmp(op), &[x, y])
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Render a node reference without side effects on the graph.
    pub fn format_node(&self, target: NodeRef, verbosity: Verbosity) -> String {
        match target {
            NodeRef::External(id) => {
                let value = self.externals.value(id);
                match (verbosity, value) {
                    (Verbosity::Id, _) => format!("ext{id}"),
                    (_, Some(value)) => format!("{}ext{id}", value.kind()),
                    (_, None) => format!("ext{id}<foreign>"),
                }
            }
            NodeRef::Owned(id) => {
                let Some(node) = self.get(id) else {
                    return format!("{id}<foreign>");
                };
                match verbosity {
                    Verbosity::Id => format!("{id}"),
                    Verbosity::Name => node.kind().name().to_string(),
                    Verbosity::Short => format!("{}{id}", node.kind()),
                    Verbosity::Long => {
                        let mut out = format!("{}{id}(", node.kind());
                        let desc = node.descriptor();
                        let mut first = true;
                        for (slot, input) in node.inputs() {
                            if !first {
                                out.push_str(", ");
                            }
                            first = false;
                            let name = desc
                                .input_info(slot)
                                .map(|info| info.name)
                                .unwrap_or("?");
                            out.push_str(name);
                            out.push_str(": ");
                            out.push_str(&self.format_node(input, Verbosity::Id));
                        }
                        out.push(')');
                        out
                    }
                }
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Graph ({} alive nodes):", self.live_nodes)?;
        for (id, _) in self.iter() {
            writeln!(
                f,
                "  {}",
                self.format_node(NodeRef::Owned(id), Verbosity::Long)
            )?;
        }
        Ok(())
    }
}

// =============================================================================
// Verbosity
// =============================================================================

/// Detail level for node rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Id only: `#3`.
    Id,
    /// Kind name only: `IntAdd`.
    Name,
    /// Kind with payload and id: `ConstInt(5)#3`.
    Short,
    /// Short plus named input edges: `IntAdd#4(x: #2, y: #3)`.
    Long,
}

// =============================================================================
// Cursors
// =============================================================================

/// Restartable cursor over input slots, detached from the graph borrow.
///
/// Each advance re-validates the structural change stamp captured at
/// creation; any intervening edge mutation of the node fails the traversal
/// instead of yielding stale slots.
#[derive(Debug, Clone)]
pub struct InputCursor {
    node: NodeId,
    slot: usize,
    stamp: u32,
}

impl InputCursor {
    /// Advance to the next populated input slot.
    pub fn next(&mut self, graph: &Graph) -> Result<Option<(usize, NodeRef)>, GraphError> {
        let node = &graph.nodes[self.node];
        if node.structure_stamp() != self.stamp {
            return Err(GraphError::ConcurrentStructuralChange { node: self.node });
        }
        while self.slot < node.input_count() {
            let slot = self.slot;
            self.slot += 1;
            if let Some(target) = node.input(slot) {
                return Ok(Some((slot, target)));
            }
        }
        Ok(None)
    }
}

/// Restartable cursor over successor slots; see [`InputCursor`].
#[derive(Debug, Clone)]
pub struct SuccessorCursor {
    node: NodeId,
    slot: usize,
    stamp: u32,
}

impl SuccessorCursor {
    /// Advance to the next populated successor slot.
    pub fn next(&mut self, graph: &Graph) -> Result<Option<(usize, NodeId)>, GraphError> {
        let node = &graph.nodes[self.node];
        if node.structure_stamp() != self.stamp {
            return Err(GraphError::ConcurrentStructuralChange { node: self.node });
        }
        while self.slot < node.successor_count() {
            let slot = self.slot;
            self.slot += 1;
            if let Some(target) = node.successor(slot) {
                return Ok(Some((slot, target)));
            }
        }
        Ok(None)
    }
}

/// Restartable cursor over the usage multiset, validated against the
/// usage-list change stamp.
#[derive(Debug, Clone)]
pub struct UsageCursor {
    node: NodeId,
    index: usize,
    stamp: u32,
}

impl UsageCursor {
    /// Advance to the next usage entry.
    pub fn next(&mut self, graph: &Graph) -> Result<Option<NodeId>, GraphError> {
        let node = &graph.nodes[self.node];
        if node.usage_stamp() != self.stamp {
            return Err(GraphError::ConcurrentStructuralChange { node: self.node });
        }
        let entry = node.usage_list().iter().nth(self.index);
        if entry.is_some() {
            self.index += 1;
        }
        Ok(entry)
    }
}

// =============================================================================
// Tests
// =============================================================================
