//! Fixed-width primitive reads and writes over in-memory byte buffers.
//!
//! Both chart formats are flat tables of 32-bit fields, so the reader works on
//! a borrowed slice with an explicit cursor and the writer appends to a `Vec`.
//! Byte order is chosen per instance.

use crate::error::{ChartError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Byte order of multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Little,
    Big,
}

/// Dispatches a `byteorder` call on the runtime endianness.
macro_rules! by_endian {
    ($endian:expr, $method:ident ( $($arg:expr),* )) => {
        match $endian {
            Endian::Little => LittleEndian::$method($($arg),*),
            Endian::Big => BigEndian::$method($($arg),*),
        }
    };
}

/// Sequential reader over a borrowed byte buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data,
            pos: 0,
            endian,
        }
    }

    /// Current byte offset from the start of the buffer.
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Moves the cursor to an absolute offset.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::UnexpectedEndOfStream`] if `pos` lies past the end.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        let target = usize::try_from(pos).unwrap_or(usize::MAX);
        if target > self.data.len() {
            return Err(ChartError::UnexpectedEndOfStream {
                offset: pos,
                wanted: 0,
                available: 0,
            });
        }
        self.pos = target;
        Ok(())
    }

    /// Reads exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::UnexpectedEndOfStream`] if fewer than `n` bytes remain.
    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(ChartError::UnexpectedEndOfStream {
                offset: self.position(),
                wanted: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_exact(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_exact(2)?;
        Ok(by_endian!(self.endian, read_u16(bytes)))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_exact(4)?;
        Ok(by_endian!(self.endian, read_u32(bytes)))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_exact(4)?;
        Ok(by_endian!(self.endian, read_i32(bytes)))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.read_exact(4)?;
        Ok(by_endian!(self.endian, read_f32(bytes)))
    }
}

/// Growable writer producing one section of an encoded chart.
#[derive(Debug, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl ByteWriter {
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut bytes = [0u8; 2];
        by_endian!(self.endian, write_u16(&mut bytes, value));
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut bytes = [0u8; 4];
        by_endian!(self.endian, write_u32(&mut bytes, value));
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut bytes = [0u8; 4];
        by_endian!(self.endian, write_i32(&mut bytes, value));
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_f32(&mut self, value: f32) {
        let mut bytes = [0u8; 4];
        by_endian!(self.endian, write_f32(&mut bytes, value));
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Appends a separately buffered section.
    pub fn append(&mut self, section: &ByteWriter) {
        self.buf.extend_from_slice(&section.buf);
    }

    /// Zero-pads the buffer up to the next multiple of `alignment`.
    pub fn pad_to(&mut self, alignment: usize) {
        let rem = self.buf.len() % alignment;
        if rem != 0 {
            self.buf.resize(self.buf.len() + alignment - rem, 0);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_and_big_endian_reads() {
        let data = [0x01, 0x00, 0x00, 0x00];
        assert_eq!(ByteReader::new(&data, Endian::Little).read_i32().unwrap(), 1);
        assert_eq!(
            ByteReader::new(&data, Endian::Big).read_i32().unwrap(),
            0x0100_0000
        );
    }

    #[test]
    fn test_read_exact_past_end() {
        let data = [0u8; 6];
        let mut reader = ByteReader::new(&data, Endian::Little);
        reader.read_u32().unwrap();

        match reader.read_u32() {
            Err(ChartError::UnexpectedEndOfStream {
                offset,
                wanted,
                available,
            }) => {
                assert_eq!(offset, 4);
                assert_eq!(wanted, 4);
                assert_eq!(available, 2);
            }
            other => panic!("expected end of stream, got {other:?}"),
        }
    }

    #[test]
    fn test_seek_and_reread() {
        let mut writer = ByteWriter::new(Endian::Big);
        writer.write_f32(1.5);
        writer.write_u16(0xBEEF);
        writer.write_u8(7);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes, Endian::Big);
        reader.seek(4).unwrap();
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_u8().unwrap(), 7);
        reader.seek(0).unwrap();
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert!(reader.seek(8).is_err());
    }

    #[test]
    fn test_padding() {
        let mut writer = ByteWriter::new(Endian::Little);
        writer.write_bytes(b"abcde");
        writer.pad_to(4);
        assert_eq!(writer.len(), 8);
        assert_eq!(&writer.into_bytes()[5..], &[0, 0, 0]);

        let mut aligned = ByteWriter::new(Endian::Little);
        aligned.write_u32(9);
        aligned.pad_to(4);
        assert_eq!(aligned.len(), 4);
    }

    #[test]
    fn test_append_sections() {
        let mut head = ByteWriter::new(Endian::Little);
        head.write_i32(-1);
        let mut body = ByteWriter::new(Endian::Little);
        body.write_u8(0x42);
        head.append(&body);
        assert_eq!(head.into_bytes(), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x42]);
    }
}
