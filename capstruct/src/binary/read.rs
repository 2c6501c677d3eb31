//! Read binary data in place.

use crate::binary::{decode_pointer, Pointer, WORD};

/// An error produced while reading a buffer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("{struct_name} has no field named `{field}`{}", suggestion_note(.suggestion))]
    NoSuchField {
        struct_name: String,
        field: String,
        suggestion: Option<String>,
    },
    #[error("{struct_name} has no union")]
    NotAUnion { struct_name: String },
    #[error("{field}: tried to read a union member while `{active}` is active")]
    InactiveUnionMember { field: String, active: String },
    #[error("{field}: not a pointer field")]
    NotAPointer { field: String },
    #[error("{field}: not a group field")]
    NotAGroup { field: String },
    #[error("attempted to read {len} bytes at offset {offset}, beyond the end of the buffer")]
    OutOfBounds { offset: usize, len: usize },
    #[error("{field}: expected {expected} pointer")]
    UnexpectedPointer { field: String, expected: &'static str },
    #[error("{field}: text is not valid UTF-8")]
    InvalidText { field: String },
    #[error("far pointers are not supported")]
    FarPointer,
    #[error("{field}: invalid default value")]
    InvalidDefault { field: String },
    #[error("invalid message framing: {reason}")]
    BadFraming { reason: &'static str },
}

fn suggestion_note(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(suggestion) => format!(" (did you mean `{suggestion}`?)"),
        None => String::new(),
    }
}

/// A buffer holding one segment of words.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment<'data> {
    data: &'data [u8],
}

/// Generates a method that reads a little endian primitive at a byte offset.
macro_rules! read_le_prim {
    ($read_le_prim:ident, $T:ident) => {
        pub fn $read_le_prim(&self, offset: usize) -> Result<$T, ReadError> {
            Ok($T::from_le_bytes(self.read_array(offset)?))
        }
    };
}

impl<'data> Segment<'data> {
    pub fn new(data: &'data [u8]) -> Segment<'data> {
        Segment { data }
    }

    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'data [u8], ReadError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(ReadError::OutOfBounds { offset, len })
    }

    fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], ReadError> {
        let mut buf = [0; N];
        buf.copy_from_slice(self.bytes(offset, N)?);
        Ok(buf)
    }

    read_le_prim!(read_u8, u8);
    read_le_prim!(read_u16, u16);
    read_le_prim!(read_u32, u32);
    read_le_prim!(read_u64, u64);

    /// Read bit `bit` counted from the byte at `offset`.
    pub fn read_bit(&self, offset: usize, bit: u32) -> Result<bool, ReadError> {
        let byte = self.read_u8(offset + (bit / 8) as usize)?;
        Ok(byte & (1 << (bit % 8)) != 0)
    }

    /// Read and decode the pointer word at `offset`.
    pub fn read_pointer(&self, offset: usize) -> Result<Pointer, ReadError> {
        decode_pointer(offset, self.read_u64(offset)?)
    }

    /// Check that `words` words starting at `offset` lie inside the segment.
    pub fn check_words(&self, offset: usize, words: usize) -> Result<(), ReadError> {
        self.bytes(offset, words * WORD).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian() {
        let segment = Segment::new(b"\x01\x02\x03\x04\x05\x06\x07\x08");
        assert_eq!(segment.read_u8(0), Ok(1));
        assert_eq!(segment.read_u16(0), Ok(0x0201));
        assert_eq!(segment.read_u32(4), Ok(0x0807_0605));
        assert_eq!(segment.read_u64(0), Ok(0x0807_0605_0403_0201));
    }

    #[test]
    fn reads_bits() {
        let segment = Segment::new(b"\x05\x80");
        assert_eq!(segment.read_bit(0, 0), Ok(true));
        assert_eq!(segment.read_bit(0, 1), Ok(false));
        assert_eq!(segment.read_bit(0, 2), Ok(true));
        assert_eq!(segment.read_bit(0, 15), Ok(true));
    }

    #[test]
    fn out_of_bounds() {
        let segment = Segment::new(b"\x00\x00");
        assert_eq!(
            segment.read_u32(0),
            Err(ReadError::OutOfBounds { offset: 0, len: 4 }),
        );
    }
}
