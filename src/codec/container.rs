use std::io::{Read, Write};

use super::{pack_len, unpack_len, Pack, Unpack};
use crate::error::Result;
use super::stream::{Decoder, Encoder};
use crate::wire::WireKind;

/// Upper bound on capacity reserved from an untrusted element count.
const MAX_PREALLOC: usize = 4096;

impl<T: Pack> Pack for [T] {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        s.sink().put_tag(WireKind::Sequence)?;
        pack_len(s, self.len(), "sequence length")?;
        for item in self {
            item.pack(s)?;
        }
        Ok(())
    }
}

impl<T: Pack> Pack for Vec<T> {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        self.as_slice().pack(s)
    }
}

impl<T: Unpack> Unpack for Vec<T> {
    fn unpack<R: Read>(d: &mut Decoder<R>) -> Result<Self> {
        d.source().expect_tag(WireKind::Sequence)?;
        let len = unpack_len(d, "sequence length")?;
        let mut out = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            out.push(T::unpack(d)?);
        }
        Ok(out)
    }
}
