//! Bounds-checked cursor over raw image bytes.
//!
//! Direct replacement for pointer casting and advancing over a
//! self-describing binary layout: every read and every advance is validated
//! against the buffer length and fails with `MalformedImage` instead of
//! producing an out-of-range access.

use crate::error::{Result, SealError};
use crate::macho::RawName;

/// Byte order for multi-byte field reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// A reader tracking the current offset within a validated byte extent.
#[derive(Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Cursor {
            data,
            pos: 0,
            endian,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Move to an absolute offset. The end of the buffer is a valid
    /// position; anything past it is a bounds violation.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(SealError::malformed(
                pos,
                format!("seek past end of {}-byte extent", self.data.len()),
            ));
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance by `n` bytes without reading them.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        let target = self.pos.checked_add(n).ok_or_else(|| {
            SealError::malformed(self.pos, format!("advance by {n} overflows"))
        })?;
        self.seek(target)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(SealError::malformed(
                self.pos,
                format!("short read: need {n} bytes, {} available", self.remaining()),
            ));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        let bytes = [b[0], b[1], b[2], b[3]];
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let bytes = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        Ok(match self.endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        })
    }

    /// Read a fixed 16-byte name field.
    pub fn read_name(&mut self) -> Result<RawName> {
        let b = self.take(RawName::LEN)?;
        let mut bytes = [0u8; RawName::LEN];
        bytes.copy_from_slice(b);
        Ok(RawName::from_bytes(bytes))
    }
}
