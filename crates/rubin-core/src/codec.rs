//! Bounded byte-slice reader and the CompactSize varint.
//!
//! Every read checks bounds before advancing; an underrun is a parse
//! rejection, never a panic. CompactSize follows the Bitcoin layout
//! (1/3/5/9-byte forms) with the minimal encoding required: `0xFD 0x00
//! 0x00` is illegal because the value fits in one byte. Non-minimal
//! encodings are consensus-invalid: accepting them would make the same
//! transaction serialize two ways and fork the txid space.

use crate::error::{ConsensusError, ErrorCode};

/// Cursor over an immutable byte slice with bounds-checked reads.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, ConsensusError> {
        if self.remaining() < 1 {
            return Err(ConsensusError::parse("unexpected EOF (u8)"));
        }
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, ConsensusError> {
        let bytes: [u8; 2] = self.read_array("unexpected EOF (u16le)")?;
        Ok(u16::from_le_bytes(bytes))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, ConsensusError> {
        let bytes: [u8; 4] = self.read_array("unexpected EOF (u32le)")?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, ConsensusError> {
        let bytes: [u8; 8] = self.read_array("unexpected EOF (u64le)")?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Read exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ConsensusError> {
        if n > self.remaining() {
            return Err(ConsensusError::parse("unexpected EOF (bytes)"));
        }
        let v = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(v)
    }

    /// Read a fixed-width field into an array.
    pub fn read_array<const N: usize>(
        &mut self,
        context: &'static str,
    ) -> Result<[u8; N], ConsensusError> {
        if N > self.remaining() {
            return Err(ConsensusError::new(ErrorCode::TxParse, context));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }
}

/// Decode a CompactSize varint, returning `(value, encoded_len)`.
///
/// Rejects non-minimal encodings and values that do not fit the host's
/// signed size type (they could never index a real buffer).
pub fn read_compact_size(r: &mut Reader<'_>) -> Result<(u64, usize), ConsensusError> {
    let start = r.offset();
    let tag = r.read_u8()?;

    let (v, minimal) = match tag {
        0x00..=0xfc => (tag as u64, true),
        0xfd => {
            let v = r.read_u16_le()? as u64;
            (v, v >= 0xfd)
        }
        0xfe => {
            let v = r.read_u32_le()? as u64;
            (v, v > 0xffff)
        }
        0xff => {
            let v = r.read_u64_le()?;
            (v, v > 0xffff_ffff)
        }
    };

    if !minimal {
        return Err(ConsensusError::parse("non-minimal CompactSize"));
    }
    if v > isize::MAX as u64 {
        return Err(ConsensusError::parse("CompactSize exceeds host size type"));
    }

    Ok((v, r.offset() - start))
}

/// Append the minimal CompactSize encoding of `n`.
pub fn write_compact_size(n: u64, out: &mut Vec<u8>) {
    if n < 0xfd {
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&n.to_le_bytes());
    }
}

/// Length in bytes of the minimal CompactSize encoding of `n`.
pub const fn compact_size_len(n: u64) -> u64 {
    match n {
        0x00..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}
