//! Write binary data into a growable segment.

use crate::binary::{list_pointer, struct_pointer, ElementSize, WORD};

/// An in-memory segment that can be allocated from and written into.
///
/// Allocations are zero filled, so only non-zero values ever need writing.
#[derive(Debug, Default)]
pub struct Builder {
    buffer: Vec<u8>,
}

/// Generates a method that writes a little endian primitive at a byte offset.
macro_rules! write_le_prim {
    ($write_le_prim:ident, $T:ident) => {
        pub fn $write_le_prim(&mut self, offset: usize, value: $T) {
            self.write_bytes(offset, &value.to_le_bytes());
        }
    };
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Get the buffer.
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    /// Get the buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Append `words` zeroed words, returning the byte offset of the first.
    pub fn alloc(&mut self, words: usize) -> usize {
        let offset = self.buffer.len();
        self.buffer.resize(offset + words * WORD, 0);
        offset
    }

    /// Overwrite bytes previously allocated.
    ///
    /// # Panics
    ///
    /// If the range was never allocated.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    write_le_prim!(write_u8, u8);
    write_le_prim!(write_u16, u16);
    write_le_prim!(write_u32, u32);
    write_le_prim!(write_u64, u64);

    /// Set or clear bit `bit` counted from the byte at `offset`.
    pub fn write_bit(&mut self, offset: usize, bit: u32, value: bool) {
        let byte = &mut self.buffer[offset + (bit / 8) as usize];
        let mask = 1 << (bit % 8);
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    pub fn write_struct_pointer(&mut self, at: usize, target: usize, data_size: u16, ptrs_size: u16) {
        self.write_u64(at, struct_pointer(at, target, data_size, ptrs_size));
    }

    pub fn write_list_pointer(
        &mut self,
        at: usize,
        target: usize,
        element_size: ElementSize,
        count: u32,
    ) {
        self.write_u64(at, list_pointer(at, target, element_size, count));
    }

    /// Allocate a byte list holding `bytes`, pointed to from `at`. Text is
    /// written with its NUL terminator included in `bytes`.
    pub fn write_byte_list(&mut self, at: usize, bytes: &[u8]) {
        let target = self.alloc(crate::binary::words_for_bytes(bytes.len()));
        self.write_bytes(target, bytes);
        self.write_list_pointer(at, target, ElementSize::Byte, bytes.len() as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{Pointer, Segment};

    #[test]
    fn alloc_is_zeroed() {
        let mut builder = Builder::new();
        assert_eq!(builder.alloc(2), 0);
        assert_eq!(builder.alloc(1), 16);
        assert_eq!(builder.buffer(), &[0; 24][..]);
    }

    #[test]
    fn bits() {
        let mut builder = Builder::new();
        builder.alloc(1);
        builder.write_bit(0, 9, true);
        builder.write_bit(0, 0, true);
        builder.write_bit(0, 0, false);
        assert_eq!(&builder.buffer()[..2], b"\x00\x02");
    }

    #[test]
    fn text_list() {
        let mut builder = Builder::new();
        let at = builder.alloc(1);
        builder.write_byte_list(at, b"hi\0");

        let segment = Segment::new(builder.buffer());
        assert_eq!(
            segment.read_pointer(at).unwrap(),
            Pointer::List {
                target: 8,
                element_size: ElementSize::Byte,
                count: 3,
            },
        );
        assert_eq!(segment.bytes(8, 3).unwrap(), b"hi\0");
    }
}
