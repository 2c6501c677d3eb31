//! Stream framing for single-segment messages.
//!
//! A message starts with a header of little endian `u32`s: the number of
//! segments minus one, followed by the size in words of each segment. The
//! first word of the first segment is a pointer to the root struct.

use crate::binary::{words_for_bytes, Builder, Pointer, ReadError, Segment, WORD};
use crate::module::{Module, StructId};
use crate::reader::{Instance, StructReader};

/// Frame an instance as a single-segment message.
pub fn dumps(instance: &Instance<'_>) -> Vec<u8> {
    let ty = instance.struct_type();
    let content = instance.as_bytes();
    let words = 1 + words_for_bytes(content.len());

    let mut builder = Builder::new();
    let header = builder.alloc(1);
    builder.write_u32(header, 0);
    builder.write_u32(header + 4, words as u32);

    let root = builder.alloc(1);
    let target = builder.alloc(words - 1);
    builder.write_struct_pointer(root, target, ty.data_size(), ty.ptrs_size());
    builder.write_bytes(target, content);
    builder.into_buffer()
}

/// Read the root struct of a framed message as an instance of `id`.
///
/// A null root reads as a struct with no data or pointers, so every field
/// takes its default.
pub fn loads<'a>(
    bytes: &'a [u8],
    module: &'a Module,
    id: StructId,
) -> Result<StructReader<'a>, ReadError> {
    let header = Segment::new(bytes);
    let segments = header.read_u32(0)?;
    if segments != 0 {
        return Err(ReadError::BadFraming {
            reason: "multi-segment messages are not supported",
        });
    }
    let words = header.read_u32(4)? as usize;
    let segment = header
        .bytes(WORD, words * WORD)
        .map_err(|_| ReadError::BadFraming {
            reason: "segment is shorter than its declared size",
        })?;

    let segment = Segment::new(segment);
    let reader = match segment.read_pointer(0) {
        Ok(Pointer::Null) | Err(ReadError::OutOfBounds { .. }) => {
            module.from_buffer(id, &[], 0, 0, 0)
        }
        Ok(Pointer::Struct {
            target,
            data_size,
            ptrs_size,
        }) => {
            segment.check_words(target, usize::from(data_size) + usize::from(ptrs_size))?;
            module.from_buffer(id, segment.data(), target, data_size, ptrs_size)
        }
        Ok(Pointer::Far) => return Err(ReadError::FarPointer),
        Ok(Pointer::List { .. } | Pointer::Other) => {
            return Err(ReadError::UnexpectedPointer {
                field: "root".to_owned(),
                expected: "struct",
            })
        }
        Err(error) => return Err(error),
    };
    tracing::trace!(
        name = module.struct_type(id).dotname(),
        data_size = reader.data_size(),
        ptrs_size = reader.ptrs_size(),
        "loaded message"
    );
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::surface::parse_schema;
    use crate::value::Args;

    fn module(source: &str) -> Module {
        compile(&parse_schema(0, source).unwrap()).unwrap()
    }

    #[test]
    fn framing() {
        let module = module("struct Point { x @0 :Int64; y @1 :Int64; }");
        let point = module.lookup("Point").unwrap();
        let args = Args::new().with("x", 1i64).with("y", 2i64);
        let instance = module.construct(point, &args).unwrap();

        let bytes = dumps(&instance);
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[..8], *b"\x00\x00\x00\x00\x03\x00\x00\x00");
        assert_eq!(bytes[8..16], *b"\x00\x00\x00\x00\x02\x00\x00\x00");

        let reader = loads(&bytes, &module, point).unwrap();
        assert_eq!(reader.get("x").unwrap().as_i64(), Some(1));
        assert_eq!(reader.get("y").unwrap().as_i64(), Some(2));
    }

    #[test]
    fn null_root() {
        let module = module("struct S { x @0 :Int32 = 7; t @1 :Text; }");
        let s = module.lookup("S").unwrap();
        let bytes = b"\x00\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00";
        let reader = loads(bytes, &module, s).unwrap();
        assert_eq!(reader.get("x").unwrap().as_i64(), Some(7));
        assert!(!reader.has("t").unwrap());
    }

    #[test]
    fn bad_framing() {
        let module = module("struct S { x @0 :Int32; }");
        let s = module.lookup("S").unwrap();
        let two_segments = b"\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00";
        assert!(matches!(
            loads(two_segments, &module, s),
            Err(ReadError::BadFraming { .. })
        ));
        let truncated = b"\x00\x00\x00\x00\x04\x00\x00\x00";
        assert!(matches!(
            loads(truncated, &module, s),
            Err(ReadError::BadFraming { .. })
        ));
        assert!(matches!(
            loads(b"", &module, s),
            Err(ReadError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn list_root() {
        let module = module("struct S { x @0 :Int32; }");
        let s = module.lookup("S").unwrap();
        let bytes = b"\x00\x00\x00\x00\x01\x00\x00\x00\x01\x00\x00\x00\x02\x00\x00\x00";
        assert_eq!(
            loads(bytes, &module, s).unwrap_err().to_string(),
            "root: expected struct pointer",
        );
    }
}
