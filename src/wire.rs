//! Wire-level constants shared by the encoder and the decoder.

use core::convert::TryFrom;

use crate::error::{CodecError, Result};

/// Magic bytes opening every stream.
pub const STREAM_MAGIC: [u8; 4] = *b"DAGX";
/// Current wire format revision.
pub const FORMAT_VERSION: u8 = 1;
/// Length of the stream header (magic + version byte).
pub const STREAM_HDR_LEN: usize = STREAM_MAGIC.len() + 1;

/// Discriminator opening a shared-object record that carries a full definition.
pub const DEFINITION: u8 = b'D';
/// Discriminator opening a shared-object record that points at an earlier definition.
pub const REFERENCE: u8 = b'R';

/// One-byte tag preceding every tagged value on the wire.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum WireKind {
    /// Single byte boolean.
    Bool = b'b',
    /// 32-bit signed integer.
    Int32 = b'i',
    /// 64-bit signed integer; used for every count, index, and slot id.
    Int64 = b'J',
    /// IEEE-754 double.
    Float64 = b'd',
    /// Length-prefixed byte string.
    String = b's',
    /// Length-prefixed sequence of tagged values.
    Sequence = b'V',
    /// Sparsity pattern.
    Sparsity = b'S',
    /// Shared expression node record.
    Expr = b'X',
    /// Shared function graph record.
    Function = b'F',
}

impl WireKind {
    /// Returns the raw tag byte.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human readable name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            WireKind::Bool => "bool",
            WireKind::Int32 => "i32",
            WireKind::Int64 => "i64",
            WireKind::Float64 => "f64",
            WireKind::String => "string",
            WireKind::Sequence => "sequence",
            WireKind::Sparsity => "sparsity",
            WireKind::Expr => "expr",
            WireKind::Function => "function",
        }
    }
}

impl TryFrom<u8> for WireKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            b'b' => Ok(WireKind::Bool),
            b'i' => Ok(WireKind::Int32),
            b'J' => Ok(WireKind::Int64),
            b'd' => Ok(WireKind::Float64),
            b's' => Ok(WireKind::String),
            b'V' => Ok(WireKind::Sequence),
            b'S' => Ok(WireKind::Sparsity),
            b'X' => Ok(WireKind::Expr),
            b'F' => Ok(WireKind::Function),
            other => Err(CodecError::corruption(format!(
                "unknown type tag 0x{other:02X}"
            ))),
        }
    }
}

/// Encodes the stream header into `dst`.
pub fn encode_header(dst: &mut [u8; STREAM_HDR_LEN]) {
    dst[..STREAM_MAGIC.len()].copy_from_slice(&STREAM_MAGIC);
    dst[STREAM_MAGIC.len()] = FORMAT_VERSION;
}

/// Validates a stream header read from the source.
pub fn decode_header(src: &[u8; STREAM_HDR_LEN]) -> Result<()> {
    if src[..STREAM_MAGIC.len()] != STREAM_MAGIC {
        return Err(CodecError::corruption("invalid stream magic"));
    }
    let version = src[STREAM_MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion { found: version });
    }
    Ok(())
}
