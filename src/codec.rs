//! Wire codec for Goldleaf frames.
//!
//! All integers are little-endian and fixed width. Strings are an i32 count of
//! UTF-16 code units followed by the UTF-16LE bytes. Frames carry no overall
//! length, so fields are consumed strictly left to right.

use crate::error::Error;
use crate::protocol::{Command, INPUT_MAGIC, OUTPUT_MAGIC};

/// Cursor over one inbound frame.
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        FrameReader { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n {
            return Err(Error::ShortRead {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_magic(&mut self) -> Result<[u8; 4], Error> {
        let magic = self.take_array::<4>()?;
        if magic != INPUT_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        Ok(magic)
    }

    pub fn read_command(&mut self) -> Result<Command, Error> {
        let id = self.read_i32()?;
        Command::from_id(id).ok_or(Error::UnknownCommand(id))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    /// Read a string, collapsing every `":/"` into `"/"`.
    pub fn read_string(&mut self) -> Result<String, Error> {
        self.read_string_with(true)
    }

    pub fn read_string_with(&mut self, cleanup: bool) -> Result<String, Error> {
        let count = self.read_i32()?;
        let count = usize::try_from(count)
            .map_err(|_| Error::InvalidString(format!("negative length {count}")))?;
        let bytes = self.take(count.checked_mul(2).ok_or_else(|| {
            Error::InvalidString(format!("length {count} overflows"))
        })?)?;

        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let s = String::from_utf16(&units).map_err(|e| Error::InvalidString(e.to_string()))?;

        Ok(if cleanup { s.replace(":/", "/") } else { s })
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

#[inline]
pub fn write_magic(buf: &mut Vec<u8>, magic: [u8; 4]) {
    buf.extend_from_slice(&magic);
}

#[inline]
pub fn write_i32(buf: &mut Vec<u8>, val: i32) {
    buf.extend_from_slice(&val.to_le_bytes());
}

#[inline]
pub fn write_i64(buf: &mut Vec<u8>, val: i64) {
    buf.extend_from_slice(&val.to_le_bytes());
}

/// Write the UTF-16 code unit count, then the UTF-16LE bytes. No cleanup.
///
/// Strings longer than the i32 count can express are cut at `i32::MAX` units
/// so the count always matches the bytes that follow.
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    let units: Vec<u16> = s.encode_utf16().collect();
    let count = wire_unit_count(units.len());
    write_i32(buf, count);
    let units = &units[..count as usize];
    buf.reserve(units.len() * 2);
    for unit in units {
        buf.extend_from_slice(&unit.to_le_bytes());
    }
}

fn wire_unit_count(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Start a response: output magic followed by the result code.
pub fn write_response_header(buf: &mut Vec<u8>, result: i32) {
    write_magic(buf, OUTPUT_MAGIC);
    write_i32(buf, result);
}
