use core::convert::TryFrom;

use rustc_hash::FxHashMap;

use crate::error::{CodecError, Result};
use crate::graph::ObjectId;

/// Encode-side map from object identity to the slot id assigned at its
/// definition.
///
/// Slots are dense and assigned in definition order, so the decoder can
/// rebuild the same numbering with nothing but an append-only [`NodeRegistry`].
#[derive(Debug)]
pub struct SharedCache {
    kind: &'static str,
    slots: FxHashMap<ObjectId, u64>,
}

impl SharedCache {
    /// Empty cache for objects of `kind` (used in log and error messages).
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: FxHashMap::default(),
        }
    }

    /// Slot previously assigned to `id`, if any.
    pub fn lookup(&self, id: ObjectId) -> Option<u64> {
        self.slots.get(&id).copied()
    }

    /// Assigns the next slot to `id`. Callers define an identity at most once.
    pub fn define(&mut self, id: ObjectId) -> u64 {
        let slot = self.slots.len() as u64;
        let previous = self.slots.insert(id, slot);
        debug_assert!(
            previous.is_none(),
            "{} {id} defined twice in one session",
            self.kind
        );
        slot
    }

    /// Number of defined objects.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing has been defined yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Decode-side registry of materialized objects, indexed by slot id.
#[derive(Debug)]
pub struct NodeRegistry<T> {
    kind: &'static str,
    nodes: Vec<T>,
}

impl<T: Clone> NodeRegistry<T> {
    /// Empty registry for objects of `kind`.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
        }
    }

    /// Appends a freshly decoded object and returns its slot.
    pub fn register(&mut self, node: T) -> u64 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u64
    }

    /// Returns the object defined at `slot`, sharing it rather than copying it.
    pub fn resolve(&self, slot: i64) -> Result<T> {
        usize::try_from(slot)
            .ok()
            .and_then(|idx| self.nodes.get(idx))
            .cloned()
            .ok_or(CodecError::DanglingReference {
                kind: self.kind,
                slot,
                defined: self.nodes.len(),
            })
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
