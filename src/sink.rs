//! The `ByteSink` abstraction the wire codec is written against (spec §6).
//!
//! The storage substrate (page/WAL engine) is out of scope for this crate;
//! it is the thing that would normally implement `ByteSink` over a mapped
//! file. Here we only need the trait and the in-memory/`Cursor` impls our
//! own writer/reader/tests use, the same way the teacher's `BsonWriter`
//! impl for `std::io::Cursor<T>` stands in for a real disk-backed sink.

use std::io;

/// Random-access byte primitives a codec writes into or reads out of.
///
/// Unlike the teacher's `BsonWriter`, which is write-only, this single
/// trait covers both directions since the span reader and scanner need
/// none of it (they work directly over `&[u8]`) while the streaming
/// `Writer`/`Reader` need both halves.
pub trait ByteSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()>;
    fn seek_to(&mut self, pos: u64) -> io::Result<()>;
    fn position(&self) -> u64;
    fn len(&self) -> u64;
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> ByteSink for io::Cursor<T> {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let position = self.position() as usize;
        let end = position + bytes.len();
        let buf = self.get_mut().as_mut();
        if end > buf.len() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "sink exhausted"));
        }
        buf[position..end].copy_from_slice(bytes);
        self.set_position(end as u64);
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let position = self.position() as usize;
        let end = position + buf.len();
        let src = self.get_ref().as_ref();
        if end > src.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "sink exhausted",
            ));
        }
        buf.copy_from_slice(&src[position..end]);
        self.set_position(end as u64);
        Ok(())
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.set_position(pos);
        Ok(())
    }

    fn position(&self) -> u64 {
        io::Cursor::position(self)
    }

    fn len(&self) -> u64 {
        self.get_ref().as_ref().len() as u64
    }
}

/// Read-only counterpart for `Cursor<&[u8]>`, which has no `AsMut` impl.
/// [`Reader`](crate::bson::reader::Reader) is built against a borrowed
/// byte slice in most of our own tests; writing through it is a logic
/// error, not a recoverable condition.
impl ByteSink for io::Cursor<&[u8]> {
    fn write_bytes(&mut self, _bytes: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "Cursor<&[u8]> is read-only"))
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let position = self.position() as usize;
        let end = position + buf.len();
        let src = *self.get_ref();
        if end > src.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "sink exhausted",
            ));
        }
        buf.copy_from_slice(&src[position..end]);
        self.set_position(end as u64);
        Ok(())
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.set_position(pos);
        Ok(())
    }

    fn position(&self) -> u64 {
        io::Cursor::position(self)
    }

    fn len(&self) -> u64 {
        self.get_ref().len() as u64
    }
}

/// A growable, append-only sink backed by a `Vec<u8>`.
///
/// Used by [`crate::bson::writer::Writer`] when the caller has no
/// pre-allocated buffer; the writer still pre-sizes it via
/// [`crate::bson::size::document_size`] before writing, so there is no
/// reallocation mid-document (§9 "pooled/growable buffers").
#[derive(Debug, Default)]
pub struct GrowableBuffer {
    data: Vec<u8>,
}

impl GrowableBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSink for GrowableBuffer {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    fn read_bytes(&mut self, _buf: &mut [u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "GrowableBuffer is write-only",
        ))
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        if pos != self.data.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "GrowableBuffer only supports append",
            ));
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.data.len() as u64
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}
