//! End-to-end mutation protocol tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use garnet_ir::{
    ArithOp, ConstantValue, ExternalPool, Graph, GraphError, GraphListener, NodeEvent, NodeId,
    NodeKind, NodeRef,
};

fn graph() -> Graph {
    Graph::new()
}

#[test]
fn test_canonicalize_add_of_equal_constants() {
    let mut g = graph();

    // C1 used twice by the same Add node, once per input slot.
    let c1 = g.const_int(1).unwrap();
    let add = g.int_op(ArithOp::Add, c1.into(), c1.into()).unwrap();
    assert_eq!(g.usage_count(c1).unwrap(), 2);

    let ret = g.add(NodeKind::Return, &[add.into()]).unwrap();
    assert_eq!(g.usage_count(add).unwrap(), 1);

    // Canonicalize Add(1, 1) to the pre-existing constant 2.
    let c2 = g.const_int(2).unwrap();
    g.replace_and_delete(add, Some(c2.into())).unwrap();

    assert!(g.node(add).is_deleted());
    assert_eq!(g.node(add).former_id(), Some(add));
    assert_eq!(g.usage_count(c1).unwrap(), 0);
    assert_eq!(g.node(ret).input(0), Some(NodeRef::Owned(c2)));
    assert_eq!(g.usage_count(c2).unwrap(), 1);
    g.verify().unwrap();
}

#[test]
fn test_splice_control_node_out_of_chain() {
    let mut g = graph();
    let start = g.add(NodeKind::Start, &[]).unwrap();
    let old_region = g.add(NodeKind::Region, &[]).unwrap();
    let c = g.const_int(0).unwrap();
    let ret = g.add(NodeKind::Return, &[c.into()]).unwrap();

    g.set_successor(start, 0, Some(old_region)).unwrap();
    g.set_successor(old_region, 0, Some(ret)).unwrap();

    let new_region = g.add(NodeKind::Region, &[]).unwrap();
    g.replace_and_delete(old_region, Some(new_region.into()))
        .unwrap();

    // The predecessor edge moved; the successor side is the caller's to
    // re-link after the splice.
    assert!(g.node(old_region).is_deleted());
    assert_eq!(g.node(start).successor(0), Some(new_region));
    assert_eq!(g.predecessor(new_region), Some(start));
    assert_eq!(g.predecessor(ret), None);

    g.set_successor(new_region, 0, Some(ret)).unwrap();
    assert_eq!(g.predecessor(ret), Some(new_region));
    assert_eq!(g.cfg_successors(start).collect::<Vec<_>>(), vec![new_region]);
    assert_eq!(g.cfg_predecessor(ret), Some(new_region));
    g.verify().unwrap();
}

#[test]
fn test_phi_grows_variadic_inputs() {
    let mut g = graph();
    let end_a = g.add(NodeKind::BranchEnd, &[]).unwrap();
    let end_b = g.add(NodeKind::BranchEnd, &[]).unwrap();
    let region = g
        .add(NodeKind::Region, &[end_a.into(), end_b.into()])
        .unwrap();

    let p = g.parameter(0).unwrap();
    let phi = g.add(NodeKind::Phi, &[region.into(), p.into()]).unwrap();

    let c = g.const_int(3).unwrap();
    let slot = g.add_variadic_input(phi, Some(c.into())).unwrap();
    assert_eq!(slot, 2);
    assert_eq!(g.node(phi).variadic_count(), 2);
    assert_eq!(g.usage_count(c).unwrap(), 1);

    // The merge anchor is structural; dataflow iteration skips it.
    let data: Vec<_> = g.node(phi).data_inputs().map(|(_, t)| t).collect();
    assert_eq!(data, vec![NodeRef::Owned(p), NodeRef::Owned(c)]);
    g.verify().unwrap();
}

#[test]
fn test_variadic_rejected_for_fixed_arity_kinds() {
    let mut g = graph();
    let a = g.const_int(1).unwrap();
    let add = g.int_op(ArithOp::Add, a.into(), a.into()).unwrap();

    let err = g.add_variadic_input(add, Some(a.into())).unwrap_err();
    assert!(matches!(err, GraphError::UnsupportedOperation { .. }));
}

// =============================================================================
// Listener Events
// =============================================================================

struct Recorder {
    events: Rc<RefCell<Vec<NodeEvent>>>,
}

impl GraphListener for Recorder {
    fn on_event(&mut self, _graph: &Graph, event: NodeEvent) {
        self.events.borrow_mut().push(event);
    }
}

fn recorded(g: &mut Graph) -> Rc<RefCell<Vec<NodeEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    g.add_listener(Box::new(Recorder {
        events: Rc::clone(&events),
    }));
    events
}

#[test]
fn test_input_changed_and_zero_usage_events() {
    let mut g = graph();
    let a = g.const_int(1).unwrap();
    let b = g.const_int(2).unwrap();
    let add = g.int_op(ArithOp::Add, a.into(), b.into()).unwrap();

    let events = recorded(&mut g);

    // Rewriting a slot reports the change; `a` still has no zero-usage
    // transition because the slot was rewritten, not cleared.
    g.set_input(add, 0, Some(b.into())).unwrap();
    assert_eq!(
        events.borrow().as_slice(),
        &[NodeEvent::InputChanged { node: add }]
    );

    // Clearing the last edge to `b`... both slots reference it now.
    events.borrow_mut().clear();
    g.set_input(add, 0, None).unwrap();
    g.set_input(add, 1, None).unwrap();
    assert_eq!(
        events.borrow().as_slice(),
        &[
            NodeEvent::InputChanged { node: add },
            NodeEvent::UsagesDroppedToZero { node: b },
            NodeEvent::InputChanged { node: add },
        ]
    );
}

#[test]
fn test_replace_at_usages_reports_each_user() {
    let mut g = graph();
    let a = g.const_int(1).unwrap();
    let b = g.const_int(2).unwrap();
    let add = g.int_op(ArithOp::Add, a.into(), a.into()).unwrap();
    let mul = g.int_op(ArithOp::Mul, a.into(), b.into()).unwrap();

    let events = recorded(&mut g);
    g.replace_at_usages(a, Some(b.into())).unwrap();

    let events = events.borrow();
    let changed: Vec<NodeId> = events
        .iter()
        .filter_map(|e| match e {
            NodeEvent::InputChanged { node } => Some(*node),
            _ => None,
        })
        .collect();
    assert_eq!(changed.len(), 3);
    assert!(changed.contains(&add));
    assert!(changed.contains(&mul));
    assert_eq!(g.usage_count(b).unwrap(), 4);
    g.verify().unwrap();
}

// =============================================================================
// Cross-Graph Cloning and Externals
// =============================================================================

#[test]
fn test_clone_into_canonicalizes_constants() {
    let mut src = graph();
    let mut dest = graph();

    let c = src.const_int(42).unwrap();
    let existing = dest.const_int(42).unwrap();

    let cloned = src.clone_into(c, &mut dest).unwrap();
    assert_eq!(cloned, existing);
    assert_eq!(dest.live_count(), 1);
}

#[test]
fn test_clone_into_clears_edges_for_relinking() {
    let mut src = graph();
    let mut dest = graph();

    let a = src.const_int(1).unwrap();
    let b = src.const_int(2).unwrap();
    let add = src.int_op(ArithOp::Add, a.into(), b.into()).unwrap();

    let cloned = src.clone_into(add, &mut dest).unwrap();
    assert_eq!(dest.node(cloned).input_count(), 2);
    assert_eq!(dest.node(cloned).input(0), None);
    assert_eq!(dest.node(cloned).input(1), None);

    let x = dest.const_int(7).unwrap();
    dest.set_input(cloned, 0, Some(x.into())).unwrap();
    dest.set_input(cloned, 1, Some(x.into())).unwrap();
    dest.verify().unwrap();
    src.verify().unwrap();
}

#[test]
fn test_shared_external_pool_across_graphs() {
    let pool = Arc::new(ExternalPool::new());
    let mut g1 = Graph::with_externals(Arc::clone(&pool));
    let mut g2 = Graph::with_externals(Arc::clone(&pool));

    let ext = pool.intern(ConstantValue::Int(9));
    assert_eq!(pool.intern(ConstantValue::Int(9)), ext);

    let p1 = g1.parameter(0).unwrap();
    let add1 = g1
        .int_op(ArithOp::Add, p1.into(), NodeRef::External(ext))
        .unwrap();
    let p2 = g2.parameter(0).unwrap();
    let add2 = g2
        .int_op(ArithOp::Add, p2.into(), NodeRef::External(ext))
        .unwrap();

    assert_eq!(g1.node(add1).input(1), g2.node(add2).input(1));
    g1.verify().unwrap();
    g2.verify().unwrap();
}

#[test]
fn test_foreign_external_reference_is_rejected() {
    let foreign_pool = ExternalPool::new();
    for i in 0..5 {
        foreign_pool.intern(ConstantValue::Int(i));
    }
    let foreign = foreign_pool.intern(ConstantValue::Int(99));

    let mut g = graph();
    let p = g.parameter(0).unwrap();
    let err = g
        .int_op(ArithOp::Add, p.into(), NodeRef::External(foreign))
        .unwrap_err();
    assert!(matches!(err, GraphError::CrossGraphReplacement { .. }));
}

// =============================================================================
// Deletion Lifecycle
// =============================================================================

#[test]
fn test_deleted_ids_are_never_reused() {
    let mut g = graph();
    let a = g.const_int(1).unwrap();
    g.safe_delete(a).unwrap();

    let b = g.const_int(1).unwrap();
    assert_ne!(a, b);
    assert!(g.node(a).is_deleted());
    assert!(g.node(b).is_alive());
    assert_eq!(g.slot_count(), 2);
    assert_eq!(g.live_count(), 1);
}

#[test]
fn test_delete_fails_while_predecessor_holds_node() {
    let mut g = graph();
    let start = g.add(NodeKind::Start, &[]).unwrap();
    let region = g.add(NodeKind::Region, &[]).unwrap();
    g.set_successor(start, 0, Some(region)).unwrap();

    let err = g.safe_delete(region).unwrap_err();
    assert!(matches!(
        err,
        GraphError::NodeStillReferenced {
            has_predecessor: true,
            ..
        }
    ));

    g.set_successor(start, 0, None).unwrap();
    g.safe_delete(region).unwrap();
    g.verify().unwrap();
}

#[test]
fn test_usage_cursor_detects_replace_during_iteration() {
    let mut g = graph();
    let a = g.const_int(1).unwrap();
    let b = g.const_int(2).unwrap();
    let _add = g.int_op(ArithOp::Add, a.into(), a.into()).unwrap();
    let _mul = g.int_op(ArithOp::Mul, a.into(), a.into()).unwrap();

    let mut cursor = g.usage_cursor(a).unwrap();
    assert!(cursor.next(&g).unwrap().is_some());

    g.replace_at_usages(a, Some(b.into())).unwrap();
    let err = cursor.next(&g).unwrap_err();
    assert!(matches!(err, GraphError::ConcurrentStructuralChange { .. }));
}
