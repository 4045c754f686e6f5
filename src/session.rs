//! Encode and decode sessions.
//!
//! A session owns one byte stream together with the shared-object caches that
//! give slot ids their meaning. Slot ids are not portable across streams, so
//! nothing here is global: two sessions never share state.
//!
//! The codec traits only see the encoder or decoder state held inside a
//! session, which callers cannot reach. Every encode and decode therefore goes through
//! a session method, and the first failure aborts the session.

use std::fmt;
use std::io::{Read, Write};

use tracing::{debug, trace, warn};

use crate::codec::stream::{Decoder, Encoder, Sink, Source};
use crate::codec::{read_bytes, write_bytes, Pack, Unpack};
use crate::config::SessionOptions;
use crate::error::{CodecError, Result};
use crate::graph::Function;
use crate::wire::{self, STREAM_HDR_LEN};

/// Record counters kept by both session kinds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Expression nodes written or read in full.
    pub expr_definitions: u64,
    /// Expression records that pointed at an earlier definition.
    pub expr_references: u64,
    /// Function graphs written or read in full.
    pub function_definitions: u64,
    /// Function records that pointed at an earlier definition.
    pub function_references: u64,
    /// Bytes produced or consumed, header included.
    pub bytes: u64,
}

/// Encoding session over a writer.
///
/// The stream header is written on construction. Any failed call aborts the
/// session and the bytes written so far must be discarded.
pub struct Serializer<W: Write> {
    enc: Encoder<W>,
    added: Vec<Function>,
    aborted: bool,
    finished: bool,
}

impl<W: Write> Serializer<W> {
    /// Opens a session with default options.
    pub fn new(inner: W) -> Result<Self> {
        Self::with_options(inner, SessionOptions::default())
    }

    /// Opens a session and writes the stream header.
    pub fn with_options(inner: W, options: SessionOptions) -> Result<Self> {
        let mut sink = Sink::new(inner);
        let mut header = [0u8; STREAM_HDR_LEN];
        wire::encode_header(&mut header);
        sink.put(&header)?;
        debug!(version = wire::FORMAT_VERSION, "serializer.open");
        Ok(Self {
            enc: Encoder::new(sink, options),
            added: Vec::new(),
            aborted: false,
            finished: false,
        })
    }

    /// Adds a top-level function graph to the stream.
    ///
    /// Adding a graph that this session already added writes nothing.
    pub fn add(&mut self, function: &Function) -> Result<()> {
        self.guarded(|s| {
            if s.added.iter().any(|f| f.ptr_eq(function)) {
                debug!(function = function.name(), "serializer.add.skip");
                return Ok(());
            }
            s.added.push(function.clone());
            debug!(
                function = function.name(),
                index = s.added.len() - 1,
                "serializer.add"
            );
            function.pack(&mut s.enc)
        })
    }

    /// Packs any encodable value.
    pub fn pack<T: Pack + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.guarded(|s| value.pack(&mut s.enc))
    }

    /// Packs `value` preceded by the descriptor string `descr`.
    pub fn pack_described<T>(&mut self, descr: &str, value: &T) -> Result<()>
    where
        T: Pack + fmt::Debug + ?Sized,
    {
        self.guarded(|s| {
            if descr.is_empty() {
                return Err(CodecError::unsupported("empty descriptor"));
            }
            if s.enc.options().trace_values {
                trace!(descr, value = ?value, "codec.described");
            } else {
                trace!(descr, "codec.described");
            }
            descr.pack(&mut s.enc)?;
            value.pack(&mut s.enc)
        })
    }

    /// Packs an arbitrary byte string under the string tag.
    pub fn pack_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.guarded(|s| write_bytes(&mut s.enc, bytes))
    }

    /// Writes one untagged byte.
    pub fn pack_raw_byte(&mut self, byte: u8) -> Result<()> {
        self.guarded(|s| s.enc.sink().put_u8(byte))
    }

    /// Counters for this session so far.
    pub fn stats(&self) -> SessionStats {
        self.enc.stats()
    }

    /// Options the session was opened with.
    pub fn options(&self) -> &SessionOptions {
        self.enc.options()
    }

    /// Whether an earlier call failed.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Flushes the writer and closes the session.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        let flushed = self.enc.sink().flush();
        if self.aborted {
            return Err(CodecError::SessionAborted);
        }
        flushed?;
        let stats = self.stats();
        debug!(
            bytes = stats.bytes,
            exprs = stats.expr_definitions,
            functions = stats.function_definitions,
            "serializer.finish"
        );
        Ok(())
    }

    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.aborted {
            return Err(CodecError::SessionAborted);
        }
        let result = op(self);
        if let Err(err) = &result {
            self.aborted = true;
            warn!(error = %err, side = "encode", "session.abort");
        }
        result
    }
}

impl<W: Write> Drop for Serializer<W> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.enc.sink().flush();
        }
    }
}

impl<W: Write> fmt::Debug for Serializer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("enc", &self.enc)
            .field("added", &self.added.len())
            .field("aborted", &self.aborted)
            .finish()
    }
}

/// Decoding session over a reader.
pub struct Deserializer<R: Read> {
    dec: Decoder<R>,
    aborted: bool,
}

impl<R: Read> Deserializer<R> {
    /// Opens a session with default options.
    pub fn new(inner: R) -> Result<Self> {
        Self::with_options(inner, SessionOptions::default())
    }

    /// Opens a session after validating the stream header.
    pub fn with_options(inner: R, options: SessionOptions) -> Result<Self> {
        let mut source = Source::new(inner);
        let header = source.take::<STREAM_HDR_LEN>("stream header")?;
        wire::decode_header(&header)?;
        debug!(version = header[STREAM_HDR_LEN - 1], "deserializer.open");
        Ok(Self {
            dec: Decoder::new(source, options),
            aborted: false,
        })
    }

    /// Unpacks one value of type `T`.
    pub fn unpack<T: Unpack>(&mut self) -> Result<T> {
        self.guarded(|d| T::unpack(&mut d.dec))
    }

    /// Unpacks a value written by [`Serializer::pack_described`] under `descr`.
    pub fn unpack_described<T: Unpack>(&mut self, descr: &str) -> Result<T> {
        self.guarded(|d| {
            let found = String::unpack(&mut d.dec)?;
            if found != descr {
                return Err(CodecError::corruption(format!(
                    "expected descriptor '{descr}', found '{found}'"
                )));
            }
            trace!(descr, "codec.described");
            T::unpack(&mut d.dec)
        })
    }

    /// Unpacks a byte string without UTF-8 validation.
    pub fn unpack_bytes(&mut self) -> Result<Vec<u8>> {
        self.guarded(|d| read_bytes(&mut d.dec))
    }

    /// Reads one untagged byte.
    pub fn unpack_raw_byte(&mut self) -> Result<u8> {
        self.guarded(|d| d.dec.source().take_u8("raw byte"))
    }

    /// Whether any bytes are left in the stream.
    pub fn has_remaining(&mut self) -> Result<bool> {
        self.guarded(|d| d.dec.source().has_remaining())
    }

    /// Reads the next top-level function, or `None` at a clean end of stream.
    pub fn next_function(&mut self) -> Result<Option<Function>> {
        self.guarded(|d| {
            if !d.dec.source().has_remaining()? {
                return Ok(None);
            }
            Function::unpack(&mut d.dec).map(Some)
        })
    }

    /// Counters for this session so far.
    pub fn stats(&self) -> SessionStats {
        self.dec.stats()
    }

    /// Options the session was opened with.
    pub fn options(&self) -> &SessionOptions {
        self.dec.options()
    }

    /// Whether an earlier call failed.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.aborted {
            return Err(CodecError::SessionAborted);
        }
        let result = op(self);
        if let Err(err) = &result {
            self.aborted = true;
            warn!(
                error = %err,
                side = "decode",
                offset = self.dec.stats().bytes,
                "session.abort"
            );
        }
        result
    }
}

impl<R: Read> fmt::Debug for Deserializer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deserializer")
            .field("dec", &self.dec)
            .field("aborted", &self.aborted)
            .finish()
    }
}
