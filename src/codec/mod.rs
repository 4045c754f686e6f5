//! Tagged binary codec.
//!
//! Every value is written as a one-byte [`WireKind`](crate::wire::WireKind)
//! tag followed by its payload, and read back by a decoder that insists on the
//! same tag. Shared graph objects (expression nodes and function graphs) are
//! wrapped in a definition/reference envelope so each distinct object is
//! written once per session and every later occurrence becomes a slot id.

use std::io::{Read, Write};

use crate::error::Result;

mod container;
mod graph;
mod primitive;
mod shared;
pub(crate) mod stream;

use stream::{Decoder, Encoder};

pub use shared::{NodeRegistry, SharedCache};

/// Types that can be written to a [`Serializer`](crate::Serializer).
///
/// The codec state is only reachable through the session, so values are
/// packed with [`Serializer::pack`](crate::Serializer::pack) and a failure
/// always aborts the session:
///
/// ```compile_fail
/// use dagcodec::{Pack, Serializer};
///
/// let mut s = Serializer::new(Vec::new()).unwrap();
/// 1i32.pack(&mut s).unwrap();
/// ```
pub trait Pack {
    /// Appends the tagged encoding of `self`.
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()>;
}

/// Types that can be read back with [`Deserializer::unpack`](crate::Deserializer::unpack).
pub trait Unpack: Sized {
    /// Consumes one tagged value of this type.
    fn unpack<R: Read>(d: &mut Decoder<R>) -> Result<Self>;
}

impl<T: Pack + ?Sized> Pack for &T {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        (**self).pack(s)
    }
}

pub(crate) use primitive::{pack_len, read_bytes, unpack_len, write_bytes};
