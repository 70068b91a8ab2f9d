//! Contract-violation errors for graph operations.
//!
//! Every variant indicates a defect in the calling transformation, never an
//! expected runtime outcome. Callers propagate these up so the driver can
//! abort the current compilation with full context; no operation recovers
//! locally. Expected absences (an empty optional edge, an empty usage set,
//! a miss in the uniqueness cache) are ordinary `Option`/empty results and
//! never surface here.
//!
//! Checks are compiled in under `debug_assertions` or the `strict-checks`
//! feature; plain release builds skip them and the operations cannot fail.

use crate::node::NodeId;

/// A violated contract of the graph mutation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// An internal structural invariant does not hold for `node`.
    InvariantViolation {
        /// The offending node.
        node: NodeId,
        /// Human-readable description of the broken invariant.
        detail: &'static str,
    },
    /// `safe_delete` was called on a node that is still referenced.
    NodeStillReferenced {
        /// The node that cannot be deleted.
        node: NodeId,
        /// Remaining usage entries.
        usage_count: usize,
        /// Whether a predecessor still owns the node as a successor.
        has_predecessor: bool,
    },
    /// A replacement target is not alive in the same graph and not an
    /// external canonical node.
    CrossGraphReplacement {
        /// The node being replaced.
        node: NodeId,
    },
    /// A usage entry exists but no input slot of the user references the
    /// target; the usage list and the edge slots disagree.
    EdgeNotFound {
        /// The user whose slots were searched.
        user: NodeId,
        /// The input target that could not be located.
        target: NodeId,
    },
    /// The operation is not defined for this node's kind, such as querying
    /// usages of a kind that does not record them.
    UnsupportedOperation {
        /// The queried node.
        node: NodeId,
        /// What was attempted.
        what: &'static str,
    },
    /// A cursor advanced after the node it iterates was structurally
    /// modified; the traversal must be restarted.
    ConcurrentStructuralChange {
        /// The node under iteration.
        node: NodeId,
    },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::InvariantViolation { node, detail } => {
                write!(f, "graph invariant violated at node {node}: {detail}")
            }
            GraphError::NodeStillReferenced {
                node,
                usage_count,
                has_predecessor,
            } => {
                write!(
                    f,
                    "cannot delete node {node}: {usage_count} remaining usage(s), \
                     predecessor {}",
                    if *has_predecessor { "present" } else { "absent" }
                )
            }
            GraphError::CrossGraphReplacement { node } => {
                write!(
                    f,
                    "replacement for node {node} is not alive in this graph \
                     and not external-canonical"
                )
            }
            GraphError::EdgeNotFound { user, target } => {
                write!(f, "node {user} has no input slot referencing {target}")
            }
            GraphError::UnsupportedOperation { node, what } => {
                write!(f, "{what} is not supported for node {node}")
            }
            GraphError::ConcurrentStructuralChange { node } => {
                write!(f, "node {node} was modified during iteration")
            }
        }
    }
}

impl std::error::Error for GraphError {}
