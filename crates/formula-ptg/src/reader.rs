//! Little-endian cursor shared by the token and constant codecs.

/// Not enough bytes remained to satisfy a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortRead {
    pub needed: usize,
    pub remaining: usize,
}

/// Forward-only reader over a byte slice.
///
/// Offsets reported by [`ByteReader::position`] are absolute within the slice the reader was
/// constructed with, so errors raised while decoding the trailing payload still point at the
/// right byte of the enclosing formula.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Start reading at `pos` (clamped to the end of `buf`).
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self {
            buf,
            pos: pos.min(buf.len()),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ShortRead> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(ShortRead {
                needed: len,
                remaining,
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ShortRead> {
        self.read_bytes(len).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ShortRead> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ShortRead> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ShortRead> {
        self.read_array::<2>().map(u16::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, ShortRead> {
        self.read_array::<8>().map(u64::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64, ShortRead> {
        self.read_array::<8>().map(f64::from_le_bytes)
    }

    /// Peek at the next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }
}
