//! Binary serialization for expression DAGs and named function graphs.
//!
//! A [`Serializer`] writes a tagged byte stream in which every distinct
//! expression node and function graph is defined exactly once; later
//! occurrences become references to the slot id of that definition. A
//! [`Deserializer`] reads the stream back and rebuilds the same sharing, so a
//! node used by two parents decodes to one object.
//!
//! ```
//! use dagcodec::{Expr, Function, Port};
//!
//! let x = Expr::symbol("x");
//! let y = Expr::symbol("y");
//! let w = y.atan2(&x);
//! let z = w.sin() + 1.0;
//! let f = Function::new(
//!     "f",
//!     vec![Port::scalar("x", x), Port::scalar("y", y)],
//!     vec![Port::scalar("w", w), Port::scalar("z", z)],
//! )?;
//!
//! let bytes = dagcodec::to_bytes(&[f.clone()])?;
//! let back = dagcodec::from_bytes(&bytes)?;
//! assert_eq!(back[0].call(&[vec![1.0], vec![2.0]])?, f.call(&[vec![1.0], vec![2.0]])?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod graph;
pub mod session;
pub mod wire;

pub use codec::{Pack, Unpack};
pub use config::SessionOptions;
pub use error::{CodecError, GraphError, Result};
pub use graph::{Expr, Function, ObjectId, Op, Port, Sparsity};
pub use session::{Deserializer, Serializer, SessionStats};

/// Encodes `functions` as one stream, in order, with sharing across all of them.
pub fn to_bytes(functions: &[Function]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut s = Serializer::new(&mut buf)?;
    for f in functions {
        s.add(f)?;
    }
    s.finish()?;
    Ok(buf)
}

/// Decodes every top-level function in `bytes`.
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<Function>> {
    let mut d = Deserializer::new(bytes)?;
    let mut out = Vec::new();
    while let Some(f) = d.next_function()? {
        out.push(f);
    }
    Ok(out)
}
