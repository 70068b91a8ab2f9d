//! Node kind definitions and per-kind edge metadata.
//!
//! Kinds are organized by category:
//! - **Constants**: Value-numberable leaf nodes (integers, floats, booleans)
//! - **Parameters**: Function inputs, also value-numberable leaves
//! - **Arithmetic / comparison**: Pure data nodes
//! - **Phi**: SSA value merges with a variadic value list
//! - **Control**: Start, If, BranchEnd, Region, Return, End
//!
//! Every kind maps to a static [`EdgeDescriptor`] declaring its input and
//! successor slots. Generic graph algorithms (slot iteration, clearing,
//! copying, verification, rendering) dispatch through the descriptor and
//! never special-case individual kinds.

use bitflags::bitflags;

// =============================================================================
// Kind Flags
// =============================================================================

bitflags! {
    /// Per-kind capability flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct KindFlags: u8 {
        /// Nodes of this kind maintain a reverse-edge usage list.
        const RECORDS_USAGES = 0b0000_0001;
        /// Instances are deduplicated through the graph's uniqueness cache.
        const VALUE_NUMBERABLE = 0b0000_0010;
        /// The kind has no edges of its own (constants, parameters).
        const LEAF = 0b0000_0100;
        /// The node occupies a fixed control-flow position.
        const FIXED = 0b0000_1000;
    }
}

// =============================================================================
// Edge Descriptors
// =============================================================================

/// Static description of one input slot.
#[derive(Debug, Clone, Copy)]
pub struct InputInfo {
    /// Slot name, used in rendering and verifier reports.
    pub name: &'static str,
    /// Whether the edge carries a dataflow dependency. Non-dataflow inputs
    /// (a phi's merge anchor, a region's incoming branch ends) are structural
    /// and excluded from dataflow analyses.
    pub dataflow: bool,
}

/// Static description of a kind's edge slots.
///
/// Input slot order is declaration order and defines the slot indices used
/// throughout the mutation protocol. A kind with `variadic_input` accepts
/// any number of additional trailing slots sharing that description.
#[derive(Debug, Clone, Copy)]
pub struct EdgeDescriptor {
    /// Fixed input slots.
    pub inputs: &'static [InputInfo],
    /// Description shared by trailing variadic input slots, if allowed.
    pub variadic_input: Option<InputInfo>,
    /// Named successor slots.
    pub successors: &'static [&'static str],
    /// Capability flags.
    pub flags: KindFlags,
}

impl EdgeDescriptor {
    /// Number of fixed input slots.
    #[inline]
    pub const fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of successor slots.
    #[inline]
    pub const fn successor_count(&self) -> usize {
        self.successors.len()
    }

    /// Look up the description of an input slot, fixed or variadic.
    #[inline]
    pub fn input_info(&self, slot: usize) -> Option<InputInfo> {
        if slot < self.inputs.len() {
            Some(self.inputs[slot])
        } else {
            self.variadic_input
        }
    }
}

const USES: KindFlags = KindFlags::RECORDS_USAGES;
const VALUE_LEAF: KindFlags = USES
    .union(KindFlags::VALUE_NUMBERABLE)
    .union(KindFlags::LEAF);
const FIXED: KindFlags = USES.union(KindFlags::FIXED);

const LEAF_DESC: EdgeDescriptor = EdgeDescriptor {
    inputs: &[],
    variadic_input: None,
    successors: &[],
    flags: VALUE_LEAF,
};

const BINARY_DESC: EdgeDescriptor = EdgeDescriptor {
    inputs: &[
        InputInfo {
            name: "x",
            dataflow: true,
        },
        InputInfo {
            name: "y",
            dataflow: true,
        },
    ],
    variadic_input: None,
    successors: &[],
    flags: USES,
};

const PHI_DESC: EdgeDescriptor = EdgeDescriptor {
    inputs: &[InputInfo {
        name: "merge",
        dataflow: false,
    }],
    variadic_input: Some(InputInfo {
        name: "value",
        dataflow: true,
    }),
    successors: &[],
    flags: USES,
};

const START_DESC: EdgeDescriptor = EdgeDescriptor {
    inputs: &[],
    variadic_input: None,
    successors: &["next"],
    flags: FIXED,
};

const BRANCH_END_DESC: EdgeDescriptor = EdgeDescriptor {
    inputs: &[],
    variadic_input: None,
    successors: &[],
    flags: FIXED,
};

const REGION_DESC: EdgeDescriptor = EdgeDescriptor {
    inputs: &[],
    variadic_input: Some(InputInfo {
        name: "end",
        dataflow: false,
    }),
    successors: &["next"],
    flags: FIXED,
};

const IF_DESC: EdgeDescriptor = EdgeDescriptor {
    inputs: &[InputInfo {
        name: "condition",
        dataflow: true,
    }],
    variadic_input: None,
    successors: &["on_true", "on_false"],
    flags: FIXED,
};

const RETURN_DESC: EdgeDescriptor = EdgeDescriptor {
    inputs: &[InputInfo {
        name: "value",
        dataflow: true,
    }],
    variadic_input: None,
    successors: &[],
    flags: FIXED,
};

const END_DESC: EdgeDescriptor = EdgeDescriptor {
    inputs: &[],
    variadic_input: Some(InputInfo {
        name: "exit",
        dataflow: false,
    }),
    successors: &[],
    flags: FIXED,
};

// =============================================================================
// Arithmetic and Comparison Operators
// =============================================================================

/// Integer arithmetic operator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ArithOp {
    /// Addition: x + y
    Add = 0,
    /// Subtraction: x - y
    Sub = 1,
    /// Multiplication: x * y
    Mul = 2,
    /// Division: x / y
    Div = 3,
}

impl ArithOp {
    /// Check if this operation is commutative.
    #[inline]
    pub const fn is_commutative(self) -> bool {
        matches!(self, ArithOp::Add | ArithOp::Mul)
    }

    /// Operator mnemonic.
    pub const fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
        }
    }
}

/// Integer comparison operator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CmpOp {
    /// Equality: x == y
    Eq = 0,
    /// Less than: x < y
    Lt = 1,
    /// Less than or equal: x <= y
    Le = 2,
}

impl CmpOp {
    /// Operator mnemonic.
    pub const fn name(self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
        }
    }
}

// =============================================================================
// Node Kind
// =============================================================================

/// The concrete variant of a node, carrying kind-specific data fields.
///
/// Floats are stored as raw bit patterns so kind payloads stay `Eq`/`Hash`,
/// which the uniqueness cache requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Integer constant.
    ConstInt(i64),
    /// Float constant (IEEE-754 bit pattern).
    ConstFloat(u64),
    /// Boolean constant.
    ConstBool(bool),
    /// Function parameter by index.
    Parameter(u16),
    /// Integer arithmetic.
    IntOp(ArithOp),
    /// Integer comparison.
    IntCmp(CmpOp),
    /// SSA value merge; one non-dataflow merge input plus variadic values.
    Phi,
    /// Control entry.
    Start,
    /// Terminates one branch of a control split; referenced by a region.
    BranchEnd,
    /// Control merge point; collects branch ends as non-dataflow inputs.
    Region,
    /// Two-way control split on a condition.
    If,
    /// Function return with a value.
    Return,
    /// Control exit; collects return nodes as non-dataflow inputs.
    End,
}

impl NodeKind {
    /// The static edge metadata for this kind.
    pub const fn descriptor(&self) -> &'static EdgeDescriptor {
        match self {
            NodeKind::ConstInt(_)
            | NodeKind::ConstFloat(_)
            | NodeKind::ConstBool(_)
            | NodeKind::Parameter(_) => &LEAF_DESC,
            NodeKind::IntOp(_) | NodeKind::IntCmp(_) => &BINARY_DESC,
            NodeKind::Phi => &PHI_DESC,
            NodeKind::Start => &START_DESC,
            NodeKind::BranchEnd => &BRANCH_END_DESC,
            NodeKind::Region => &REGION_DESC,
            NodeKind::If => &IF_DESC,
            NodeKind::Return => &RETURN_DESC,
            NodeKind::End => &END_DESC,
        }
    }

    /// Kind name for rendering and diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            NodeKind::ConstInt(_) => "ConstInt",
            NodeKind::ConstFloat(_) => "ConstFloat",
            NodeKind::ConstBool(_) => "ConstBool",
            NodeKind::Parameter(_) => "Parameter",
            NodeKind::IntOp(op) => match op {
                ArithOp::Add => "IntAdd",
                ArithOp::Sub => "IntSub",
                ArithOp::Mul => "IntMul",
                ArithOp::Div => "IntDiv",
            },
            NodeKind::IntCmp(op) => match op {
                CmpOp::Eq => "IntEq",
                CmpOp::Lt => "IntLt",
                CmpOp::Le => "IntLe",
            },
            NodeKind::Phi => "Phi",
            NodeKind::Start => "Start",
            NodeKind::BranchEnd => "BranchEnd",
            NodeKind::Region => "Region",
            NodeKind::If => "If",
            NodeKind::Return => "Return",
            NodeKind::End => "End",
        }
    }

    /// The canonical value of a value-numberable leaf kind, or `None` for
    /// kinds with identity semantics.
    ///
    /// This is the one place in the crate where value equality applies; the
    /// key derives `Eq`/`Hash` while nodes themselves only ever compare by
    /// identity.
    pub const fn value_key(&self) -> Option<ValueKey> {
        match self {
            NodeKind::ConstInt(v) => Some(ValueKey::Int(*v)),
            NodeKind::ConstFloat(bits) => Some(ValueKey::Float(*bits)),
            NodeKind::ConstBool(v) => Some(ValueKey::Bool(*v)),
            NodeKind::Parameter(index) => Some(ValueKey::Parameter(*index)),
            _ => None,
        }
    }

    /// Check if this node kind maintains a usage list.
    #[inline]
    pub const fn records_usages(&self) -> bool {
        self.descriptor().flags.contains(KindFlags::RECORDS_USAGES)
    }

    /// Check if this kind is deduplicated through the uniqueness cache.
    #[inline]
    pub const fn is_value_numberable_leaf(&self) -> bool {
        self.descriptor()
            .flags
            .contains(KindFlags::VALUE_NUMBERABLE.union(KindFlags::LEAF))
    }

    /// Check if this is a constant kind.
    #[inline]
    pub const fn is_constant(&self) -> bool {
        matches!(
            self,
            NodeKind::ConstInt(_) | NodeKind::ConstFloat(_) | NodeKind::ConstBool(_)
        )
    }

    /// Check if this kind occupies a fixed control-flow position.
    #[inline]
    pub const fn is_fixed(&self) -> bool {
        self.descriptor().flags.contains(KindFlags::FIXED)
    }

    /// Get the integer payload if this is an integer constant.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            NodeKind::ConstInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the float payload if this is a float constant.
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            NodeKind::ConstFloat(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::ConstInt(v) => write!(f, "ConstInt({v})"),
            NodeKind::ConstFloat(bits) => write!(f, "ConstFloat({})", f64::from_bits(*bits)),
            NodeKind::ConstBool(v) => write!(f, "ConstBool({v})"),
            NodeKind::Parameter(index) => write!(f, "Parameter({index})"),
            _ => f.write_str(self.name()),
        }
    }
}

// =============================================================================
// Value Key
// =============================================================================

/// Content-addressed key for the uniqueness cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKey {
    /// Integer constant value.
    Int(i64),
    /// Float constant bit pattern.
    Float(u64),
    /// Boolean constant value.
    Bool(bool),
    /// Parameter index.
    Parameter(u16),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_descriptors() {
        for kind in [
            NodeKind::ConstInt(1),
            NodeKind::ConstFloat(1.5f64.to_bits()),
            NodeKind::ConstBool(true),
            NodeKind::Parameter(0),
        ] {
            let desc = kind.descriptor();
            assert_eq!(desc.input_count(), 0);
            assert_eq!(desc.successor_count(), 0);
            assert!(kind.is_value_numberable_leaf());
            assert!(kind.records_usages());
            assert!(kind.value_key().is_some());
        }
    }

    #[test]
    fn test_binary_descriptor() {
        let desc = NodeKind::IntOp(ArithOp::Add).descriptor();
        assert_eq!(desc.input_count(), 2);
        assert_eq!(desc.inputs[0].name, "x");
        assert_eq!(desc.inputs[1].name, "y");
        assert!(desc.inputs.iter().all(|i| i.dataflow));
        assert!(desc.variadic_input.is_none());
    }

    #[test]
    fn test_phi_descriptor_variadic() {
        let desc = NodeKind::Phi.descriptor();
        assert_eq!(desc.input_count(), 1);
        assert!(!desc.inputs[0].dataflow);

        let variadic = desc.variadic_input.expect("phi is variadic");
        assert!(variadic.dataflow);
        assert_eq!(desc.input_info(0).unwrap().name, "merge");
        assert_eq!(desc.input_info(5).unwrap().name, "value");
    }

    #[test]
    fn test_control_descriptors() {
        assert_eq!(NodeKind::If.descriptor().successors, &["on_true", "on_false"]);
        assert_eq!(NodeKind::Start.descriptor().successor_count(), 1);
        assert_eq!(NodeKind::Return.descriptor().successor_count(), 0);
        assert!(NodeKind::Region.descriptor().variadic_input.is_some());
        assert!(NodeKind::If.is_fixed());
        assert!(!NodeKind::Phi.is_fixed());
    }

    #[test]
    fn test_value_keys_distinguish_kinds() {
        assert_ne!(
            NodeKind::ConstInt(1).value_key(),
            NodeKind::ConstBool(true).value_key()
        );
        assert_eq!(
            NodeKind::ConstInt(7).value_key(),
            NodeKind::ConstInt(7).value_key()
        );
        assert!(NodeKind::IntOp(ArithOp::Add).value_key().is_none());
    }

    #[test]
    fn test_commutativity() {
        assert!(ArithOp::Add.is_commutative());
        assert!(ArithOp::Mul.is_commutative());
        assert!(!ArithOp::Sub.is_commutative());
        assert!(!ArithOp::Div.is_commutative());
    }
}
