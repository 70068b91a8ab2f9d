//! Consistency verification for graphs.
//!
//! The verifier is a read-only traversal that checks the structural
//! invariants the mutation protocol maintains:
//!
//! 1. Usage/input duality: a user appears in its input's usage list exactly
//!    as many times as it references that input
//! 2. Predecessor/successor duality: a successor's predecessor is its holder
//! 3. A predecessor is present iff exactly one alive node owns the node as
//!    a successor
//! 4. No deleted node appears in any edge or usage list
//! 5. Edge slots agree with the kind's descriptor
//! 6. Value-numberable leaf kinds have a single alive instance per value,
//!    and external references are canonical in the graph's pool
//!
//! Traversal starts from a root set, follows input, successor, predecessor
//! and usage edges, and visits every reachable alive node exactly once
//! (cycle-safe through a visited bit set). The first violation is reported
//! with the offending node, the related node, and a description. The
//! verifier exists to catch pass bugs in testing; production compilation
//! never requires it.

use rustc_hash::FxHashMap;

use crate::arena::BitSet;
use crate::graph::Graph;
use crate::kind::ValueKey;
use crate::node::{NodeId, NodeRef};

// =============================================================================
// Violation
// =============================================================================

/// A detected invariant violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Description of the broken invariant.
    pub invariant: &'static str,
    /// The node the check ran on.
    pub node: NodeId,
    /// The other endpoint of the inconsistent relation, if any.
    pub related: Option<NodeId>,
}

impl Violation {
    fn new(invariant: &'static str, node: NodeId) -> Self {
        Violation {
            invariant,
            node,
            related: None,
        }
    }

    fn with_related(invariant: &'static str, node: NodeId, related: NodeId) -> Self {
        Violation {
            invariant,
            node,
            related: Some(related),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invariant violated at node {}: {}", self.node, self.invariant)?;
        if let Some(related) = self.related {
            write!(f, " (related node {related})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Violation {}

// =============================================================================
// Verification
// =============================================================================

/// Check invariants over every alive node of the graph.
pub fn verify_graph(graph: &Graph) -> Result<(), Violation> {
    let roots: Vec<NodeId> = graph.iter().map(|(id, _)| id).collect();
    verify_from(graph, &roots)
}

/// Check invariants over the alive nodes reachable from `roots`.
pub fn verify_from(graph: &Graph, roots: &[NodeId]) -> Result<(), Violation> {
    let mut visited = BitSet::with_capacity(graph.slot_count());
    let mut worklist: Vec<NodeId> = Vec::with_capacity(roots.len());
    let mut canonical: FxHashMap<ValueKey, NodeId> = FxHashMap::default();

    for &root in roots {
        if !graph.get(root).is_some_and(|n| n.is_alive()) {
            return Err(Violation::new("root node is not alive", root));
        }
        if visited.insert(root.as_usize()) {
            worklist.push(root);
        }
    }

    while let Some(id) = worklist.pop() {
        verify_node(graph, id, &mut canonical)?;

        let node = graph.node(id);
        let neighbors = node
            .inputs()
            .filter_map(|(_, target)| target.as_owned())
            .chain(node.successors().map(|(_, target)| target))
            .chain(node.predecessor());
        let usage_neighbors: Vec<NodeId> = if node.records_usages() {
            node.usage_list().iter().collect()
        } else {
            Vec::new()
        };
        for neighbor in neighbors.chain(usage_neighbors) {
            if graph.get(neighbor).is_some_and(|n| n.is_alive())
                && visited.insert(neighbor.as_usize())
            {
                worklist.push(neighbor);
            }
        }
    }

    Ok(())
}

fn verify_node(
    graph: &Graph,
    id: NodeId,
    canonical: &mut FxHashMap<ValueKey, NodeId>,
) -> Result<(), Violation> {
    let node = graph.node(id);
    let desc = node.descriptor();

    // Edge slots must agree with the kind's descriptor.
    let slots_match = node.input_count() >= desc.input_count()
        && (node.variadic_count() == 0 || desc.variadic_input.is_some())
        && node.successor_count() == desc.successor_count();
    if !slots_match {
        return Err(Violation::new(
            "edge slots do not match the kind's descriptor",
            id,
        ));
    }

    // Inputs: targets alive and canonical, usage/input duality.
    for (_, target) in node.inputs() {
        match target {
            NodeRef::External(_) => {
                if graph.verify_unique_if_external(id, target).is_err() {
                    return Err(Violation::new(
                        "external input is not canonical in the graph's pool",
                        id,
                    ));
                }
            }
            NodeRef::Owned(input) => {
                let Some(def) = graph.get(input).filter(|n| !n.is_deleted()) else {
                    return Err(Violation::with_related(
                        "input references a deleted node",
                        id,
                        input,
                    ));
                };
                if def.records_usages() {
                    let held = node
                        .inputs()
                        .filter(|&(_, t)| t == NodeRef::Owned(input))
                        .count();
                    let recorded = def.usage_list().count_of(id);
                    if held != recorded {
                        return Err(Violation::with_related(
                            "usage list disagrees with input edges",
                            id,
                            input,
                        ));
                    }
                }
            }
        }
    }

    // Successors: exclusive ownership with correct back-reference.
    for (_, successor) in node.successors() {
        let Some(target) = graph.get(successor).filter(|n| !n.is_deleted()) else {
            return Err(Violation::with_related(
                "successor references a deleted node",
                id,
                successor,
            ));
        };
        if target.predecessor() != Some(id) {
            return Err(Violation::with_related(
                "successor's predecessor is not the holding node",
                id,
                successor,
            ));
        }
    }

    // Predecessor: the claimed owner must hold this node as a successor.
    if let Some(pred) = node.predecessor() {
        let Some(owner) = graph.get(pred).filter(|n| n.is_alive()) else {
            return Err(Violation::with_related(
                "predecessor is not an alive node",
                id,
                pred,
            ));
        };
        if owner.find_successor(id).is_none() {
            return Err(Violation::with_related(
                "predecessor does not hold the node as a successor",
                id,
                pred,
            ));
        }
    }

    // Usages: every user is alive and actually references this node.
    if node.records_usages() {
        for user in node.usage_list().iter() {
            let Some(holder) = graph.get(user).filter(|n| n.is_alive()) else {
                return Err(Violation::with_related(
                    "usage entry references a node that is not alive",
                    id,
                    user,
                ));
            };
            if holder.find_input(NodeRef::Owned(id)).is_none() {
                return Err(Violation::with_related(
                    "usage entry has no matching input edge",
                    id,
                    user,
                ));
            }
        }
    }

    // Value numbering: one alive instance per value, coherent with the cache.
    if let Some(key) = node.kind().value_key() {
        if let Some(&first) = canonical.get(&key) {
            if first != id {
                return Err(Violation::with_related(
                    "two alive instances of one value-numberable value",
                    id,
                    first,
                ));
            }
        } else {
            canonical.insert(key, id);
        }
        if let Some(cached) = graph.cache_lookup(&key) {
            if cached != id {
                return Err(Violation::with_related(
                    "uniqueness cache names a different canonical instance",
                    id,
                    cached,
                ));
            }
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{ArithOp, NodeKind};
    use crate::node::Node;

    fn diamond() -> (Graph, NodeId, NodeId) {
        let mut g = Graph::new();
        let start = g.add(NodeKind::Start, &[]).unwrap();
        let p = g.parameter(0).unwrap();
        let zero = g.const_int(0).unwrap();
        let cond = g
            .int_cmp(crate::kind::CmpOp::Lt, p.into(), zero.into())
            .unwrap();
        let iff = g.add(NodeKind::If, &[cond.into()]).unwrap();
        g.set_successor(start, 0, Some(iff)).unwrap();

        let end_a = g.add(NodeKind::BranchEnd, &[]).unwrap();
        let end_b = g.add(NodeKind::BranchEnd, &[]).unwrap();
        g.set_successor(iff, 0, Some(end_a)).unwrap();
        g.set_successor(iff, 1, Some(end_b)).unwrap();

        let region = g
            .add(NodeKind::Region, &[end_a.into(), end_b.into()])
            .unwrap();
        let one = g.const_int(1).unwrap();
        let phi = g
            .add(NodeKind::Phi, &[region.into(), p.into(), one.into()])
            .unwrap();
        let ret = g.add(NodeKind::Return, &[phi.into()]).unwrap();
        g.set_successor(region, 0, Some(ret)).unwrap();
        (g, start, phi)
    }

    #[test]
    fn test_valid_graph_verifies() {
        let (g, start, _) = diamond();
        g.verify().unwrap();
        g.verify_from(&[start]).unwrap();
    }

    #[test]
    fn test_detects_usage_list_desync() {
        let (mut g, _, phi) = diamond();
        let input = g.node(phi).input(1).unwrap().as_owned().unwrap();

        g.node_mut_raw(input).usage_list_mut().remove_one(phi);

        let violation = g.verify().unwrap_err();
        assert_eq!(violation.invariant, "usage list disagrees with input edges");
    }

    #[test]
    fn test_detects_broken_predecessor_backlink() {
        let (mut g, start, _) = diamond();
        let successor = g.node(start).successor(0).unwrap();

        g.node_mut_raw(successor).set_predecessor(None);

        let violation = g.verify_from(&[start]).unwrap_err();
        assert_eq!(
            violation.invariant,
            "successor's predecessor is not the holding node"
        );
    }

    #[test]
    fn test_detects_duplicate_value_numberable_instances() {
        let mut g = Graph::new();
        let a = g.const_int(5).unwrap();
        // Bypassing `unique` creates a second alive instance of the value.
        let b = g.initialize(Node::new(NodeKind::ConstInt(5))).unwrap();
        assert_ne!(a, b);

        let violation = g.verify().unwrap_err();
        assert!(
            violation.invariant == "two alive instances of one value-numberable value"
                || violation.invariant == "uniqueness cache names a different canonical instance"
        );
    }

    #[test]
    fn test_detects_deleted_input() {
        let mut g = Graph::new();
        let a = g.const_int(1).unwrap();
        let b = g.const_int(2).unwrap();
        let add = g.int_op(ArithOp::Add, a.into(), b.into()).unwrap();

        // Corrupt: delete `b` while `add` still points at it.
        g.node_mut_raw(add).set_input_slot(1, None);
        g.node_mut_raw(b).usage_list_mut().remove_one(add);
        g.safe_delete(b).unwrap();
        g.node_mut_raw(add).set_input_slot(1, Some(b.into()));

        let violation = g.verify().unwrap_err();
        assert_eq!(violation.invariant, "input references a deleted node");
        assert_eq!(violation.related, Some(b));
    }

    #[test]
    fn test_unreachable_corruption_is_not_reported() {
        let (mut g, start, _) = diamond();

        // An isolated corrupt pair, unreachable from the diamond.
        let x = g.const_int(77).unwrap();
        let y = g.int_op(ArithOp::Mul, x.into(), x.into()).unwrap();
        g.node_mut_raw(x).usage_list_mut().remove_one(y);

        g.verify_from(&[start]).unwrap();
        assert!(g.verify().is_err());
    }

    #[test]
    fn test_rejects_dead_root() {
        let mut g = Graph::new();
        let a = g.const_int(1).unwrap();
        g.safe_delete(a).unwrap();

        let violation = g.verify_from(&[a]).unwrap_err();
        assert_eq!(violation.invariant, "root node is not alive");
    }
}
