//! Expression graphs: sparsity patterns, shared scalar expression nodes and
//! named function graphs.
//!
//! These are the objects the codec persists. Nodes are reference counted and
//! may be shared by any number of parents; each shared object carries an
//! [`ObjectId`] assigned at construction, which is what the encoder uses to
//! recognise a node it has already written.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

mod expr;
mod function;
mod sparsity;

pub use expr::{Expr, Op};
pub use function::{Function, Port};
pub use sparsity::Sparsity;

/// Process-unique identity of a shared graph object.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ObjectId(pub u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    pub(crate) fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
