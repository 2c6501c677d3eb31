//! Binary layout of structs, lists and pointers.
//!
//! A struct occupies `data_size` 8-byte words of packed scalars, followed
//! immediately by `ptrs_size` 8-byte pointer slots. All values are little
//! endian. Pointers are relative to the word following the pointer itself.

pub mod read;
pub mod write;

pub use self::read::{ReadError, Segment};
pub use self::write::Builder;

/// Size of a word in bytes.
pub const WORD: usize = 8;

/// Number of words needed to hold `bytes` bytes.
pub fn words_for_bytes(bytes: usize) -> usize {
    (bytes + WORD - 1) / WORD
}

/// Number of words needed to hold `bits` bits.
pub fn words_for_bits(bits: usize) -> usize {
    (bits + 63) / 64
}

/// The element size stored in a list pointer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementSize {
    Void = 0,
    Bit = 1,
    Byte = 2,
    TwoBytes = 3,
    FourBytes = 4,
    EightBytes = 5,
    Pointer = 6,
    InlineComposite = 7,
}

impl ElementSize {
    pub fn from_bits(bits: u8) -> ElementSize {
        match bits & 7 {
            0 => ElementSize::Void,
            1 => ElementSize::Bit,
            2 => ElementSize::Byte,
            3 => ElementSize::TwoBytes,
            4 => ElementSize::FourBytes,
            5 => ElementSize::EightBytes,
            6 => ElementSize::Pointer,
            _ => ElementSize::InlineComposite,
        }
    }

    /// The element size used for scalars of the given byte width.
    pub fn for_byte_width(width: u32) -> ElementSize {
        match width {
            1 => ElementSize::Byte,
            2 => ElementSize::TwoBytes,
            4 => ElementSize::FourBytes,
            _ => ElementSize::EightBytes,
        }
    }

    /// Bits taken by one element. Composite elements report zero, as their
    /// size is stored in the list's tag word.
    pub fn bits(self) -> usize {
        match self {
            ElementSize::Void | ElementSize::InlineComposite => 0,
            ElementSize::Bit => 1,
            ElementSize::Byte => 8,
            ElementSize::TwoBytes => 16,
            ElementSize::FourBytes => 32,
            ElementSize::EightBytes | ElementSize::Pointer => 64,
        }
    }
}

/// A decoded pointer word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pointer {
    Null,
    Struct {
        /// Byte offset of the struct's data region in the segment.
        target: usize,
        data_size: u16,
        ptrs_size: u16,
    },
    List {
        /// Byte offset of the list's first word in the segment.
        target: usize,
        element_size: ElementSize,
        /// Element count, or the word count of a composite list.
        count: u32,
    },
    Far,
    Other,
}

const KIND_STRUCT: u64 = 0;
const KIND_LIST: u64 = 1;
const KIND_FAR: u64 = 2;

/// Encode a struct pointer located at byte `at` that targets byte `target`.
pub fn struct_pointer(at: usize, target: usize, data_size: u16, ptrs_size: u16) -> u64 {
    let offset = if data_size == 0 && ptrs_size == 0 {
        // An empty struct has no content to point at, but must stay distinct
        // from the null pointer.
        -1
    } else {
        relative_offset(at, target)
    };
    encode_offset(offset) | KIND_STRUCT | (u64::from(data_size) << 32) | (u64::from(ptrs_size) << 48)
}

/// Encode a list pointer located at byte `at` that targets byte `target`.
pub fn list_pointer(at: usize, target: usize, element_size: ElementSize, count: u32) -> u64 {
    let offset = relative_offset(at, target);
    encode_offset(offset)
        | KIND_LIST
        | ((element_size as u64) << 32)
        | (u64::from(count & 0x1fff_ffff) << 35)
}

/// Encode the tag word that precedes the elements of a composite list.
pub fn composite_tag(count: u32, data_size: u16, ptrs_size: u16) -> u64 {
    (u64::from(count) << 2) | (u64::from(data_size) << 32) | (u64::from(ptrs_size) << 48)
}

/// Decode the pointer word `word`, located at byte `at`.
pub fn decode_pointer(at: usize, word: u64) -> Result<Pointer, ReadError> {
    if word == 0 {
        return Ok(Pointer::Null);
    }
    let offset = ((word as u32) as i32) >> 2;
    match word & 3 {
        KIND_STRUCT => Ok(Pointer::Struct {
            target: target_of(at, offset)?,
            data_size: (word >> 32) as u16,
            ptrs_size: (word >> 48) as u16,
        }),
        KIND_LIST => Ok(Pointer::List {
            target: target_of(at, offset)?,
            element_size: ElementSize::from_bits((word >> 32) as u8),
            count: (word >> 35) as u32,
        }),
        KIND_FAR => Ok(Pointer::Far),
        _ => Ok(Pointer::Other),
    }
}

fn relative_offset(at: usize, target: usize) -> i32 {
    ((target as i64 - (at + WORD) as i64) / WORD as i64) as i32
}

fn encode_offset(offset: i32) -> u64 {
    u64::from((offset as u32) << 2)
}

fn target_of(at: usize, offset: i32) -> Result<usize, ReadError> {
    let target = (at + WORD) as i64 + i64::from(offset) * WORD as i64;
    usize::try_from(target).map_err(|_| ReadError::OutOfBounds {
        offset: at,
        len: WORD,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_struct_pointer_is_not_null() {
        let word = struct_pointer(0, 8, 0, 0);
        assert_eq!(word.to_le_bytes(), *b"\xfc\xff\xff\xff\x00\x00\x00\x00");
        assert_eq!(
            decode_pointer(0, word).unwrap(),
            Pointer::Struct {
                target: 0,
                data_size: 0,
                ptrs_size: 0,
            },
        );
    }

    #[test]
    fn empty_text_pointer() {
        let word = u64::from_le_bytes(*b"\x01\x00\x00\x00\x02\x00\x00\x00");
        assert_eq!(
            decode_pointer(0, word).unwrap(),
            Pointer::List {
                target: 8,
                element_size: ElementSize::Byte,
                count: 0,
            },
        );
    }

    #[test]
    fn negative_struct_offset() {
        let word = struct_pointer(16, 0, 1, 0);
        assert_eq!(
            decode_pointer(16, word).unwrap(),
            Pointer::Struct {
                target: 0,
                data_size: 1,
                ptrs_size: 0,
            },
        );
    }

    #[test]
    fn list_pointer_round_trip() {
        let word = list_pointer(8, 24, ElementSize::EightBytes, 3);
        assert_eq!(
            decode_pointer(8, word).unwrap(),
            Pointer::List {
                target: 24,
                element_size: ElementSize::EightBytes,
                count: 3,
            },
        );
    }
}
