//! Graph intermediate representation core for the Garnet compiler.
//!
//! This crate provides the mutable directed graph every optimization and
//! lowering pass operates on:
//!
//! # Core Components
//!
//! - **Arena** (`arena.rs`): Stable typed-id storage for nodes
//! - **Kinds** (`kind.rs`): Node variants with static edge descriptors
//! - **Node** (`node.rs`): Edge slots, usage multiset, lifecycle id
//! - **Externals** (`external.rs`): Shared canonical constant pool
//! - **Graph** (`graph.rs`): Identity, uniqueness cache, mutation protocol
//! - **Verifier** (`verifier.rs`): Structural invariant checking
//!
//! # Design Principles
//!
//! - **Indices, not pointers**: Edges, usages, and predecessors are arena
//!   indices, so the aliased graph stays cheap to mutate
//! - **Identity equality**: Registered nodes compare by identity; value
//!   equality exists only inside the uniqueness cache
//! - **Sanctioned mutation**: All restructuring goes through the protocol
//!   operations, which keep reverse edges consistent per logical mutation
//! - **Fail-fast iteration**: Detached cursors detect structural changes
//!   made while they are live instead of yielding stale edges

pub mod arena;
pub mod error;
pub mod external;
pub mod graph;
pub mod kind;
pub mod node;
pub mod verifier;

// Re-export commonly used types
pub use arena::{Arena, BitSet, Id};
pub use error::GraphError;
pub use external::{ConstantValue, ExternalId, ExternalPool};
pub use graph::{
    Graph, GraphListener, InputCursor, NodeEvent, SuccessorCursor, UsageCursor, Verbosity,
};
pub use kind::{ArithOp, CmpOp, EdgeDescriptor, InputInfo, KindFlags, NodeKind, ValueKey};
pub use node::{Node, NodeId, NodeRef};
pub use verifier::Violation;
