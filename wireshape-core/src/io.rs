//! Buffer/capacity abstractions: codecs never touch `Vec<u8>` or `&[u8]`
//! directly, only these traits, so the same encode/decode code works over
//! a growable sink, a fixed-capacity span, or a borrowed slice.

use crate::error::{Error, ErrorKind};

/// Write destination for an encode pass.
pub trait Sink {
    /// Make sure at least `needed` more bytes can be written without
    /// failing. Growable sinks reallocate (doubling); fixed sinks fail
    /// with `insufficient_output_buffer` if they cannot satisfy it.
    fn ensure_capacity(&mut self, needed: usize) -> Result<(), Error>;

    /// Append `bytes`. Implementations must call `ensure_capacity`
    /// themselves or document that the caller already did.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Number of bytes written so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for Vec<u8> {
    fn ensure_capacity(&mut self, needed: usize) -> Result<(), Error> {
        let have = self.capacity() - self.len();
        if have < needed {
            // Grow by doubling rather than to the exact requirement.
            let mut new_cap = self.capacity().max(16);
            while new_cap - self.len() < needed {
                new_cap = new_cap.saturating_mul(2);
            }
            self.reserve(new_cap - self.capacity());
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.ensure_capacity(bytes.len())?;
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// A fixed-capacity sink over a caller-owned span. Never grows; overflow is
/// `insufficient_output_buffer`.
pub struct FixedSink<'a> {
    buf: &'a mut [u8],
    written: usize,
}

impl<'a> FixedSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, written: 0 }
    }

    pub fn finalize(self) -> usize {
        self.written
    }
}

impl Sink for FixedSink<'_> {
    fn ensure_capacity(&mut self, needed: usize) -> Result<(), Error> {
        if self.buf.len() - self.written < needed {
            return Err(Error::new(ErrorKind::InsufficientOutputBuffer));
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.ensure_capacity(bytes.len())?;
        let end = self.written + bytes.len();
        self.buf[self.written..end].copy_from_slice(bytes);
        self.written = end;
        Ok(())
    }

    fn len(&self) -> usize {
        self.written
    }
}

/// Read source for a decode pass. The only implementation in this core is a
/// borrowed byte slice; streamed/`refill`-based sources are left to an
/// I/O-adapter layer outside this crate's scope.
pub trait Source<'a> {
    /// Look at, without consuming, up to `n` bytes starting at the cursor.
    /// Returns fewer than `n` bytes (or `None` if `n == 0` is unreachable)
    /// only when the remaining input is shorter than `n`.
    fn peek(&self, n: usize) -> Option<&'a [u8]>;

    /// Advance the cursor by `n` bytes. Fails with `unexpected_end` if
    /// fewer than `n` bytes remain.
    fn advance(&mut self, n: usize) -> Result<(), Error>;

    fn position(&self) -> usize;

    fn remaining(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume and return exactly `n` bytes.
    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let bytes = self
            .peek(n)
            .filter(|b| b.len() == n)
            .ok_or_else(|| Error::at(ErrorKind::UnexpectedEnd, self.position()))?;
        self.advance(n)?;
        Ok(bytes)
    }

    fn take_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }
}

/// A borrowed byte slice with a mutable cursor.
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    pub fn all(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }
}

impl<'a> Source<'a> for SliceSource<'a> {
    fn peek(&self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        self.bytes.get(self.pos..end)
    }

    fn advance(&mut self, n: usize) -> Result<(), Error> {
        if self.pos + n > self.bytes.len() {
            return Err(Error::at(ErrorKind::UnexpectedEnd, self.pos));
        }
        self.pos += n;
        Ok(())
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}
