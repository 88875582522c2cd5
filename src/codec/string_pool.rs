//! Null-terminated string pool shared by both chart formats.
//!
//! Records reference text through a 32-bit pointer measured from the start of
//! the record table; the pool sits directly after the table, so a pointer
//! resolves at `pointer - table_bytes` inside the pool. A pointer of zero (or
//! below) means "no text".

use crate::error::{ChartError, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// How unresolved text pointers are treated while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Unresolved pointers abort the decode.
    #[default]
    Strict,
    /// Unresolved pointers decode to an empty string.
    Lenient,
}

/// Decoded pool: pool-relative offset to string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolIndex {
    strings: BTreeMap<u32, String>,
}

impl PoolIndex {
    /// Scans a pool buffer for terminated strings.
    ///
    /// Trailing bytes without a terminator are ignored. Invalid UTF-8 is
    /// decoded lossily rather than rejected.
    pub fn parse(blob: &[u8]) -> Self {
        let mut strings = BTreeMap::new();
        let mut start = 0usize;

        while start < blob.len() {
            let Some(len) = blob[start..].iter().position(|&b| b == 0) else {
                break;
            };
            let text = String::from_utf8_lossy(&blob[start..start + len]).into_owned();
            strings.insert(start as u32, text);
            start += len + 1;
        }

        Self { strings }
    }

    /// Returns the string starting at a pool-relative offset.
    pub fn get(&self, offset: u32) -> Option<&str> {
        self.strings.get(&offset).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Resolves a record's raw text pointer.
    ///
    /// # Arguments
    ///
    /// * `pointer` - Raw pointer as stored in the record
    /// * `table_bytes` - Size of the record table preceding the pool
    /// * `index` - Record index, for error context
    /// * `mode` - Strict or lenient handling of misses
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::UnresolvedStringOffset`] in strict mode when the
    /// pointer does not land on the start of a pooled string.
    pub fn resolve(
        &self,
        pointer: i32,
        table_bytes: u32,
        index: usize,
        mode: DecodeMode,
    ) -> Result<Option<String>> {
        if pointer <= 0 {
            return Ok(None);
        }

        let found = i64::from(pointer)
            .checked_sub(i64::from(table_bytes))
            .and_then(|rel| u32::try_from(rel).ok())
            .and_then(|rel| self.get(rel));

        match (found, mode) {
            (Some(text), _) => Ok(Some(text.to_string())),
            (None, DecodeMode::Strict) => Err(ChartError::UnresolvedStringOffset {
                index,
                offset: pointer,
            }),
            (None, DecodeMode::Lenient) => {
                warn!(index, pointer, "unresolved string offset, using empty text");
                Ok(None)
            }
        }
    }
}

/// Builds a deduplicated pool in first-referenced order.
#[derive(Debug, Clone, Default)]
pub struct StringPoolBuilder {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringPoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a string and returns its pool-relative offset.
    ///
    /// Empty strings are never pooled and return `None`. A string seen before
    /// returns the offset of its first occurrence.
    pub fn intern(&mut self, text: &str) -> Option<u32> {
        if text.is_empty() {
            return None;
        }
        if let Some(&offset) = self.offsets.get(text) {
            return Some(offset);
        }

        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(text.to_string(), offset);
        Some(offset)
    }

    /// Raw pointer to store in a record, given the size of the record table.
    pub fn pointer(&mut self, text: &str, table_bytes: u32) -> i32 {
        self.intern(text)
            .map_or(0, |offset| (offset + table_bytes) as i32)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_contiguous() {
        let mut builder = StringPoolBuilder::new();
        assert_eq!(builder.intern("intro"), Some(0));
        assert_eq!(builder.intern("verse"), Some(6));
        assert_eq!(builder.intern("intro"), Some(0));
        assert_eq!(builder.intern(""), None);
        assert_eq!(builder.finish(), b"intro\0verse\0".to_vec());
    }

    #[test]
    fn test_deterministic_pool() {
        let build = || {
            let mut builder = StringPoolBuilder::new();
            for text in ["a", "bb", "a", "", "ccc", "bb"] {
                builder.intern(text);
            }
            builder.finish()
        };
        assert_eq!(build(), build());
        assert_eq!(build(), b"a\0bb\0ccc\0".to_vec());
    }

    #[test]
    fn test_parse_blob() {
        let index = PoolIndex::parse(b"Hello\0World\0dangling");
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(0), Some("Hello"));
        assert_eq!(index.get(6), Some("World"));
        assert_eq!(index.get(3), None);
    }

    #[test]
    fn test_resolve_pointer() {
        let index = PoolIndex::parse(b"A\0B\0");
        assert_eq!(index.resolve(0, 32, 0, DecodeMode::Strict).unwrap(), None);
        assert_eq!(
            index.resolve(34, 32, 0, DecodeMode::Strict).unwrap().as_deref(),
            Some("B")
        );
        assert!(matches!(
            index.resolve(40, 32, 3, DecodeMode::Strict),
            Err(ChartError::UnresolvedStringOffset { index: 3, offset: 40 })
        ));
        assert_eq!(index.resolve(40, 32, 3, DecodeMode::Lenient).unwrap(), None);
        // Pointers into the record table itself never resolve.
        assert!(index.resolve(4, 32, 0, DecodeMode::Strict).is_err());
    }

    #[test]
    fn test_lossy_utf8() {
        let index = PoolIndex::parse(&[0x66, 0xFF, 0x00]);
        assert_eq!(index.get(0), Some("f\u{FFFD}"));
    }
}
