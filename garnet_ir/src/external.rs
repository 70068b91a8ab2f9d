//! Shared pool of external canonical constants.
//!
//! External nodes are not members of any graph: they carry no id, no usage
//! list, and no predecessor. They exist so unrelated graphs can share one
//! canonical instance per constant value. The pool is append-only and
//! content-addressed; interning the same value twice yields the same
//! [`ExternalId`], which makes every pool reference canonical by
//! construction.
//!
//! Graphs hold the pool behind an `Arc` and only ever read interned values;
//! the lock is uncontended in the single-writer compilation model and exists
//! so pools can be shared across compilation units.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::arena::Id;
use crate::kind::NodeKind;

/// Identifier of an interned external constant.
pub type ExternalId = Id<ConstantValue>;

// =============================================================================
// Constant Value
// =============================================================================

/// Value payload of an external constant.
///
/// Floats are stored as bit patterns so the pool index stays `Eq`/`Hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantValue {
    /// Integer constant.
    Int(i64),
    /// Float constant (IEEE-754 bit pattern).
    Float(u64),
    /// Boolean constant.
    Bool(bool),
}

impl ConstantValue {
    /// The node kind an owned copy of this constant would have.
    pub const fn kind(self) -> NodeKind {
        match self {
            ConstantValue::Int(v) => NodeKind::ConstInt(v),
            ConstantValue::Float(bits) => NodeKind::ConstFloat(bits),
            ConstantValue::Bool(v) => NodeKind::ConstBool(v),
        }
    }

    /// The constant payload of a kind, if it has one.
    pub const fn from_kind(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::ConstInt(v) => Some(ConstantValue::Int(*v)),
            NodeKind::ConstFloat(bits) => Some(ConstantValue::Float(*bits)),
            NodeKind::ConstBool(v) => Some(ConstantValue::Bool(*v)),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstantValue::Int(v) => write!(f, "{v}"),
            ConstantValue::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            ConstantValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

// =============================================================================
// External Pool
// =============================================================================

/// Append-only, content-addressed pool of canonical constants.
#[derive(Debug, Default)]
pub struct ExternalPool {
    inner: RwLock<PoolInner>,
}

#[derive(Debug, Default)]
struct PoolInner {
    values: Vec<ConstantValue>,
    index: FxHashMap<ConstantValue, ExternalId>,
}

impl ExternalPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a value, returning its canonical id.
    pub fn intern(&self, value: ConstantValue) -> ExternalId {
        if let Some(&id) = self.inner.read().index.get(&value) {
            return id;
        }
        let mut inner = self.inner.write();
        // Racing interners may have inserted between the read and the write.
        if let Some(&id) = inner.index.get(&value) {
            return id;
        }
        let id = Id::new(inner.values.len() as u32);
        inner.values.push(value);
        inner.index.insert(value, id);
        id
    }

    /// Read back an interned value.
    pub fn value(&self, id: ExternalId) -> Option<ConstantValue> {
        self.inner.read().values.get(id.as_usize()).copied()
    }

    /// Look up the canonical id of a value without interning it.
    pub fn canonical(&self, value: ConstantValue) -> Option<ExternalId> {
        self.inner.read().index.get(&value).copied()
    }

    /// Check that `id` is this pool's canonical entry for its own value.
    ///
    /// Fails only for ids minted by a different pool.
    pub fn is_canonical(&self, id: ExternalId) -> bool {
        match self.value(id) {
            Some(value) => self.canonical(value) == Some(id),
            None => false,
        }
    }

    /// Number of interned values.
    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Tests
// =============================================================================
