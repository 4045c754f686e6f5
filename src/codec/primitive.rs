use core::convert::TryFrom;
use std::io::{Read, Write};

use super::{Pack, Unpack};
use crate::error::{CodecError, Result};
use super::stream::{Decoder, Encoder};
use crate::wire::WireKind;

impl Pack for bool {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        let sink = s.sink();
        sink.put_tag(WireKind::Bool)?;
        sink.put_u8(u8::from(*self))
    }
}

impl Unpack for bool {
    fn unpack<R: Read>(d: &mut Decoder<R>) -> Result<Self> {
        let src = d.source();
        src.expect_tag(WireKind::Bool)?;
        match src.take_u8("bool")? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::corruption(format!(
                "invalid boolean encoding: {other}"
            ))),
        }
    }
}

impl Pack for i32 {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        let sink = s.sink();
        sink.put_tag(WireKind::Int32)?;
        sink.put(&self.to_le_bytes())
    }
}

impl Unpack for i32 {
    fn unpack<R: Read>(d: &mut Decoder<R>) -> Result<Self> {
        let src = d.source();
        src.expect_tag(WireKind::Int32)?;
        Ok(i32::from_le_bytes(src.take("i32")?))
    }
}

impl Pack for i64 {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        let sink = s.sink();
        sink.put_tag(WireKind::Int64)?;
        sink.put(&self.to_le_bytes())
    }
}

impl Unpack for i64 {
    fn unpack<R: Read>(d: &mut Decoder<R>) -> Result<Self> {
        let src = d.source();
        src.expect_tag(WireKind::Int64)?;
        Ok(i64::from_le_bytes(src.take("i64")?))
    }
}

impl Pack for f64 {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        let sink = s.sink();
        sink.put_tag(WireKind::Float64)?;
        sink.put(&self.to_bits().to_le_bytes())
    }
}

impl Unpack for f64 {
    fn unpack<R: Read>(d: &mut Decoder<R>) -> Result<Self> {
        let src = d.source();
        src.expect_tag(WireKind::Float64)?;
        Ok(f64::from_bits(u64::from_le_bytes(src.take("f64")?)))
    }
}

impl Pack for str {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        write_bytes(s, self.as_bytes())
    }
}

impl Pack for String {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        self.as_str().pack(s)
    }
}

impl Unpack for String {
    fn unpack<R: Read>(d: &mut Decoder<R>) -> Result<Self> {
        let bytes = read_bytes(d)?;
        String::from_utf8(bytes).map_err(|_| CodecError::corruption("invalid UTF-8 string"))
    }
}

/// Writes a length-prefixed byte string. The length is authoritative, so
/// embedded zero bytes survive.
pub(crate) fn write_bytes<W: Write>(s: &mut Encoder<W>, bytes: &[u8]) -> Result<()> {
    let len = wire_len(bytes.len(), "string length")?;
    s.sink().put_tag(WireKind::String)?;
    len.pack(s)?;
    s.sink().put(bytes)
}

pub(crate) fn read_bytes<R: Read>(d: &mut Decoder<R>) -> Result<Vec<u8>> {
    d.source().expect_tag(WireKind::String)?;
    let len = unpack_len(d, "string length")?;
    d.source().take_vec(len, "string payload")
}

fn wire_len(len: usize, what: &str) -> Result<i64> {
    i64::try_from(len).map_err(|_| CodecError::unsupported(format!("{what} {len} exceeds i64::MAX")))
}

/// Packs a count or index as the 64-bit integer primitive.
pub(crate) fn pack_len<W: Write>(s: &mut Encoder<W>, len: usize, what: &str) -> Result<()> {
    wire_len(len, what)?.pack(s)
}

/// Unpacks a count or index, rejecting negative values.
pub(crate) fn unpack_len<R: Read>(d: &mut Decoder<R>, what: &str) -> Result<usize> {
    let raw = i64::unpack(d)?;
    usize::try_from(raw).map_err(|_| CodecError::corruption(format!("negative {what}: {raw}")))
}
