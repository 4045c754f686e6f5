use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};

use super::{NodeRegistry, SharedCache};
use crate::config::SessionOptions;
use crate::error::{CodecError, Result};
use crate::graph::{Expr, Function};
use crate::session::SessionStats;
use crate::wire::WireKind;

/// Append-only byte sink with a running byte count.
pub(crate) struct Sink<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> Sink<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub(crate) fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    pub(crate) fn put_u8(&mut self, byte: u8) -> Result<()> {
        self.put(&[byte])
    }

    pub(crate) fn put_tag(&mut self, kind: WireKind) -> Result<()> {
        self.put_u8(kind.as_u8())
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }
}

/// Forward-only byte source tracking how much has been consumed.
pub(crate) struct Source<R: Read> {
    inner: BufReader<R>,
    consumed: u64,
}

impl<R: Read> Source<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            consumed: 0,
        }
    }

    /// Reads exactly `N` bytes.
    pub(crate) fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf).map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                CodecError::truncated(format!(
                    "{what} needs {N} bytes at offset {}",
                    self.consumed
                ))
            } else {
                CodecError::Io(err)
            }
        })?;
        self.consumed += N as u64;
        Ok(buf)
    }

    pub(crate) fn take_u8(&mut self, what: &str) -> Result<u8> {
        let [byte] = self.take::<1>(what)?;
        Ok(byte)
    }

    /// Reads a `len`-byte payload without trusting `len` for preallocation.
    pub(crate) fn take_vec(&mut self, len: usize, what: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let got = self
            .inner
            .by_ref()
            .take(len as u64)
            .read_to_end(&mut buf)?;
        if got != len {
            return Err(CodecError::truncated(format!(
                "{what} needs {len} bytes at offset {}, only {got} available",
                self.consumed
            )));
        }
        self.consumed += len as u64;
        Ok(buf)
    }

    /// Consumes one tag byte and checks it against `kind`.
    pub(crate) fn expect_tag(&mut self, kind: WireKind) -> Result<()> {
        let offset = self.consumed;
        let tag = self.take_u8(kind.name())?;
        if tag == kind.as_u8() {
            return Ok(());
        }
        let found = WireKind::try_from(tag).map_or("unknown", WireKind::name);
        Err(CodecError::corruption(format!(
            "expected {} tag 0x{:02X}, found {found} tag 0x{tag:02X} at offset {offset}",
            kind.name(),
            kind.as_u8()
        )))
    }

    pub(crate) fn has_remaining(&mut self) -> Result<bool> {
        Ok(!self.inner.fill_buf()?.is_empty())
    }

    pub(crate) fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl<W: Write> fmt::Debug for Sink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("written", &self.written)
            .finish()
    }
}

impl<R: Read> fmt::Debug for Source<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("consumed", &self.consumed)
            .finish()
    }
}

/// Encode-side codec state owned by a [`Serializer`](crate::Serializer).
///
/// Only the session can hand one out, so every encode runs under the
/// session's abort guard.
pub struct Encoder<W: Write> {
    sink: Sink<W>,
    pub(crate) exprs: SharedCache,
    pub(crate) functions: SharedCache,
    pub(crate) stats: SessionStats,
    pub(crate) function_depth: usize,
    options: SessionOptions,
}

impl<W: Write> Encoder<W> {
    pub(crate) fn new(sink: Sink<W>, options: SessionOptions) -> Self {
        Self {
            sink,
            exprs: SharedCache::new("expr"),
            functions: SharedCache::new("function"),
            stats: SessionStats::default(),
            function_depth: 0,
            options,
        }
    }

    pub(crate) fn sink(&mut self) -> &mut Sink<W> {
        &mut self.sink
    }

    pub(crate) fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub(crate) fn stats(&self) -> SessionStats {
        SessionStats {
            bytes: self.sink.written(),
            ..self.stats
        }
    }
}

/// Decode-side codec state owned by a [`Deserializer`](crate::Deserializer).
pub struct Decoder<R: Read> {
    source: Source<R>,
    pub(crate) exprs: NodeRegistry<Expr>,
    pub(crate) functions: NodeRegistry<Function>,
    pub(crate) stats: SessionStats,
    pub(crate) function_depth: usize,
    options: SessionOptions,
}

impl<R: Read> Decoder<R> {
    pub(crate) fn new(source: Source<R>, options: SessionOptions) -> Self {
        Self {
            source,
            exprs: NodeRegistry::new("expr"),
            functions: NodeRegistry::new("function"),
            stats: SessionStats::default(),
            function_depth: 0,
            options,
        }
    }

    pub(crate) fn source(&mut self) -> &mut Source<R> {
        &mut self.source
    }

    pub(crate) fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub(crate) fn stats(&self) -> SessionStats {
        SessionStats {
            bytes: self.source.consumed(),
            ..self.stats
        }
    }
}

impl<W: Write> fmt::Debug for Encoder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("sink", &self.sink)
            .field("exprs", &self.exprs.len())
            .field("functions", &self.functions.len())
            .finish()
    }
}

impl<R: Read> fmt::Debug for Decoder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("source", &self.source)
            .field("exprs", &self.exprs.len())
            .field("functions", &self.functions.len())
            .finish()
    }
}
