//! IR node definitions.
//!
//! A node is a typed payload plus three edge families:
//! - **Inputs**: ordered optional references to nodes this node depends on,
//!   sized by the kind's [`EdgeDescriptor`]
//! - **Successors**: ordered optional control edges this node owns; every
//!   successor target stores a back-reference to its unique predecessor
//! - **Usages**: the reverse-edge multiset recording who depends on this
//!   node, one entry per using slot
//!
//! Nodes are constructed detached and become graph members through
//! `Graph::initialize`, which assigns the id and wires the reverse edges.
//! All structural mutation goes through the graph's mutation protocol; the
//! node itself only exposes read access and pre-registration wiring.

use smallvec::{smallvec, SmallVec};

use crate::arena::Id;
use crate::external::ExternalId;
use crate::kind::{EdgeDescriptor, NodeKind};

/// Unique identifier for a node within its graph.
pub type NodeId = Id<Node>;

// =============================================================================
// Node Reference
// =============================================================================

/// An edge target: either a member of the same graph or a shared external
/// canonical constant.
///
/// Equality is identity (arena index / pool index); two references are equal
/// exactly when they name the same instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// A node owned by the graph holding the edge.
    Owned(NodeId),
    /// An external canonical constant from the graph's pool.
    External(ExternalId),
}

impl NodeRef {
    /// The owned node id, if this is a graph member.
    #[inline]
    pub const fn as_owned(self) -> Option<NodeId> {
        match self {
            NodeRef::Owned(id) => Some(id),
            NodeRef::External(_) => None,
        }
    }

    /// Check if this reference points into the external pool.
    #[inline]
    pub const fn is_external(self) -> bool {
        matches!(self, NodeRef::External(_))
    }
}

impl From<NodeId> for NodeRef {
    #[inline]
    fn from(id: NodeId) -> Self {
        NodeRef::Owned(id)
    }
}

// =============================================================================
// Lifecycle Id
// =============================================================================

/// Sentinel id of a node that has not been registered with a graph.
const UNINITIALIZED_ID: i64 = -1;

/// Base of the deleted id range. A deleted node's id is
/// `DELETED_ID_START - former_id`, keeping the former id recoverable for
/// diagnostics while staying disjoint from the sentinel and alive ranges.
const DELETED_ID_START: i64 = i64::MIN / 2;

// =============================================================================
// Usage List
// =============================================================================

/// Reverse-edge multiset: the nodes holding this node as an input.
///
/// Most nodes have zero to two usages, so the first two entries live inline
/// and the rest spill to the heap. Order is not meaningful and removal is
/// `swap_remove`; duplicates are expected when one user references the same
/// target through several slots.
#[derive(Debug, Clone, Default)]
pub(crate) struct UsageList {
    entries: SmallVec<[NodeId; 2]>,
}

impl UsageList {
    /// Record a usage entry.
    #[inline]
    pub fn add(&mut self, user: NodeId) {
        self.entries.push(user);
    }

    /// Remove one entry for `user`, returning whether one existed.
    pub fn remove_one(&mut self, user: NodeId) -> bool {
        match self.entries.iter().position(|&u| u == user) {
            Some(pos) => {
                self.entries.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Number of entries, counting duplicates.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries for one specific user.
    pub fn count_of(&self, user: NodeId) -> usize {
        self.entries.iter().filter(|&&u| u == user).count()
    }

    /// Iterate over entries in storage order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().copied()
    }

    /// Take all entries, leaving the list empty.
    pub fn take(&mut self) -> SmallVec<[NodeId; 2]> {
        std::mem::take(&mut self.entries)
    }
}

// =============================================================================
// Node
// =============================================================================

/// A single IR vertex.
#[derive(Clone)]
pub struct Node {
    /// The node's concrete variant with kind-specific data.
    kind: NodeKind,

    /// Lifecycle-encoded id: `UNINITIALIZED_ID` before registration, the
    /// arena index while alive, a `DELETED_ID_START` offset after deletion.
    id: i64,

    /// Input edge slots; fixed slots first, then variadic slots.
    inputs: SmallVec<[Option<NodeRef>; 2]>,

    /// Successor edge slots.
    successors: SmallVec<[Option<NodeId>; 2]>,

    /// Inverse of the successor relation; at most one owner at a time.
    predecessor: Option<NodeId>,

    /// Reverse input edges.
    usages: UsageList,

    /// Bumped on any input/successor/predecessor change of this node.
    structure_stamp: u32,

    /// Bumped on any usage-list change of this node.
    usage_stamp: u32,
}

impl Node {
    /// Create a detached node with empty edge slots sized from the kind's
    /// descriptor.
    pub fn new(kind: NodeKind) -> Self {
        let desc = kind.descriptor();
        Node {
            kind,
            id: UNINITIALIZED_ID,
            inputs: smallvec![None; desc.input_count()],
            successors: smallvec![None; desc.successor_count()],
            predecessor: None,
            usages: UsageList::default(),
            structure_stamp: 0,
            usage_stamp: 0,
        }
    }

    /// Create a detached node with its leading input slots pre-wired.
    ///
    /// Inputs beyond the fixed slots become variadic slots, which the kind
    /// must allow.
    pub fn with_inputs(kind: NodeKind, inputs: &[NodeRef]) -> Self {
        let mut node = Node::new(kind);
        let desc = kind.descriptor();
        assert!(
            inputs.len() <= desc.input_count() || desc.variadic_input.is_some(),
            "{} accepts at most {} inputs",
            kind.name(),
            desc.input_count()
        );
        for (slot, &input) in inputs.iter().enumerate() {
            if slot < desc.input_count() {
                node.inputs[slot] = Some(input);
            } else {
                node.inputs.push(Some(input));
            }
        }
        node
    }

    // =========================================================================
    // Kind and Lifecycle
    // =========================================================================

    /// The node's kind.
    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The kind's static edge metadata.
    #[inline]
    pub fn descriptor(&self) -> &'static EdgeDescriptor {
        self.kind.descriptor()
    }

    /// Check if this node has been registered with a graph.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.id != UNINITIALIZED_ID
    }

    /// Check if this node is a live graph member.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.id >= 0
    }

    /// Check if this node has been deleted. Deletion is permanent.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.id <= DELETED_ID_START
    }

    /// The id a deleted node had while it was alive.
    pub fn former_id(&self) -> Option<NodeId> {
        if self.is_deleted() {
            Some(NodeId::new((DELETED_ID_START - self.id) as u32))
        } else {
            None
        }
    }

    /// Check if this node's kind maintains a usage list.
    #[inline]
    pub fn records_usages(&self) -> bool {
        self.kind.records_usages()
    }

    pub(crate) fn assign_id(&mut self, id: NodeId) {
        debug_assert!(!self.is_initialized());
        self.id = id.as_usize() as i64;
    }

    pub(crate) fn mark_deleted(&mut self) {
        debug_assert!(self.is_alive());
        self.id = DELETED_ID_START - self.id;
    }

    // =========================================================================
    // Input Edges
    // =========================================================================

    /// Total number of input slots, fixed plus variadic.
    #[inline]
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of variadic input slots.
    #[inline]
    pub fn variadic_count(&self) -> usize {
        self.inputs.len() - self.descriptor().input_count()
    }

    /// The target of an input slot, `None` if the slot is empty or out of
    /// range.
    #[inline]
    pub fn input(&self, slot: usize) -> Option<NodeRef> {
        self.inputs.get(slot).copied().flatten()
    }

    /// Iterate over populated input slots as `(slot, target)` pairs, in
    /// declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = (usize, NodeRef)> + '_ {
        self.inputs
            .iter()
            .enumerate()
            .filter_map(|(slot, target)| target.map(|t| (slot, t)))
    }

    /// Iterate over populated dataflow input slots, skipping structural
    /// (non-dataflow) edges.
    pub fn data_inputs(&self) -> impl Iterator<Item = (usize, NodeRef)> + '_ {
        let desc = self.descriptor();
        self.inputs()
            .filter(move |&(slot, _)| desc.input_info(slot).is_some_and(|info| info.dataflow))
    }

    /// Find the first input slot referencing `target`.
    pub fn find_input(&self, target: NodeRef) -> Option<usize> {
        self.inputs
            .iter()
            .position(|&slot| slot == Some(target))
    }

    pub(crate) fn set_input_slot(&mut self, slot: usize, target: Option<NodeRef>) {
        self.inputs[slot] = target;
    }

    pub(crate) fn push_input_slot(&mut self) -> usize {
        self.inputs.push(None);
        self.inputs.len() - 1
    }

    // =========================================================================
    // Successor Edges and Predecessor
    // =========================================================================

    /// Number of successor slots.
    #[inline]
    pub fn successor_count(&self) -> usize {
        self.successors.len()
    }

    /// The target of a successor slot, `None` if empty or out of range.
    #[inline]
    pub fn successor(&self, slot: usize) -> Option<NodeId> {
        self.successors.get(slot).copied().flatten()
    }

    /// Iterate over populated successor slots as `(slot, target)` pairs.
    pub fn successors(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.successors
            .iter()
            .enumerate()
            .filter_map(|(slot, target)| target.map(|t| (slot, t)))
    }

    /// Find the successor slot referencing `target`.
    pub fn find_successor(&self, target: NodeId) -> Option<usize> {
        self.successors
            .iter()
            .position(|&slot| slot == Some(target))
    }

    /// The unique node holding this node as a successor, if any.
    #[inline]
    pub fn predecessor(&self) -> Option<NodeId> {
        self.predecessor
    }

    pub(crate) fn set_successor_slot(&mut self, slot: usize, target: Option<NodeId>) {
        self.successors[slot] = target;
    }

    pub(crate) fn set_predecessor(&mut self, predecessor: Option<NodeId>) {
        self.predecessor = predecessor;
    }

    // =========================================================================
    // Pre-registration Wiring
    // =========================================================================

    /// Wire an input slot of a detached node. The reverse edge is recorded
    /// when the node is initialized into a graph.
    pub fn wire_input(&mut self, slot: usize, target: Option<NodeRef>) {
        assert!(!self.is_initialized(), "use the mutation protocol after initialize");
        self.inputs[slot] = target;
    }

    /// Append a wired variadic input slot to a detached node.
    pub fn wire_variadic_input(&mut self, target: Option<NodeRef>) {
        assert!(!self.is_initialized(), "use the mutation protocol after initialize");
        assert!(self.descriptor().variadic_input.is_some());
        self.inputs.push(target);
    }

    /// Wire a successor slot of a detached node.
    pub fn wire_successor(&mut self, slot: usize, target: Option<NodeId>) {
        assert!(!self.is_initialized(), "use the mutation protocol after initialize");
        self.successors[slot] = target;
    }

    // =========================================================================
    // Usages and Change Stamps
    // =========================================================================

    pub(crate) fn usage_list(&self) -> &UsageList {
        &self.usages
    }

    pub(crate) fn usage_list_mut(&mut self) -> &mut UsageList {
        &mut self.usages
    }

    #[inline]
    pub(crate) fn structure_stamp(&self) -> u32 {
        self.structure_stamp
    }

    #[inline]
    pub(crate) fn usage_stamp(&self) -> u32 {
        self.usage_stamp
    }

    #[inline]
    pub(crate) fn bump_structure_stamp(&mut self) {
        self.structure_stamp = self.structure_stamp.wrapping_add(1);
    }

    #[inline]
    pub(crate) fn bump_usage_stamp(&mut self) {
        self.usage_stamp = self.usage_stamp.wrapping_add(1);
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        let mut first = true;
        for (_, input) in self.inputs() {
            if first {
                write!(f, " [")?;
                first = false;
            } else {
                write!(f, ", ")?;
            }
            match input {
                NodeRef::Owned(id) => write!(f, "{id}")?,
                NodeRef::External(id) => write!(f, "ext{id}")?,
            }
        }
        if !first {
            write!(f, "]")?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
