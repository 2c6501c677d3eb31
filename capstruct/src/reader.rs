//! Zero-copy views of structs and lists in a buffer.
//!
//! Readers never copy the buffer. A read past the end of a struct's data
//! region returns the field's default, and a pointer slot past the end of its
//! pointer region reads as null. This is what lets an older or newer version
//! of a struct be read under a different schema.

use std::fmt;

use crate::binary::{ElementSize, Pointer, ReadError, Segment, WORD};
use crate::compile::repr;
use crate::module::{Accessor, AccessorKind, ElementType, Module, PointerTarget, StructId, StructType};
use crate::value::Value;

/// A view of a struct, or of a group within a struct.
#[derive(Copy, Clone)]
pub struct StructReader<'a> {
    module: &'a Module,
    ty: StructId,
    segment: Segment<'a>,
    /// Byte offset of the data region.
    offset: usize,
    data_size: u16,
    ptrs_size: u16,
}

impl fmt::Debug for StructReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructReader")
            .field("ty", &self.struct_type().dotname())
            .field("offset", &self.offset)
            .field("data_size", &self.data_size)
            .field("ptrs_size", &self.ptrs_size)
            .finish()
    }
}

impl<'a> StructReader<'a> {
    pub(crate) fn new(
        module: &'a Module,
        ty: StructId,
        buffer: &'a [u8],
        offset: usize,
        data_size: u16,
        ptrs_size: u16,
    ) -> StructReader<'a> {
        StructReader {
            module,
            ty,
            segment: Segment::new(buffer),
            offset,
            data_size,
            ptrs_size,
        }
    }

    pub fn module(&self) -> &'a Module {
        self.module
    }

    pub fn type_id(&self) -> StructId {
        self.ty
    }

    pub fn struct_type(&self) -> &'a StructType {
        self.module.struct_type(self.ty)
    }

    /// Data words present in the buffer, which may differ from the words the
    /// schema declares.
    pub fn data_size(&self) -> u16 {
        self.data_size
    }

    pub fn ptrs_size(&self) -> u16 {
        self.ptrs_size
    }

    /// Read a field. Absent pointers read as [`Value::Null`].
    pub fn get(&self, name: &str) -> Result<Value<'a>, ReadError> {
        let accessor = self.accessor(name)?;
        self.ensure_active(accessor)?;
        self.read(accessor)
    }

    /// Read a field, substituting absent pointers with the declared default,
    /// or with an empty text, data, list or struct.
    pub fn get_or_default(&self, name: &str) -> Result<Value<'a>, ReadError> {
        let accessor = self.accessor(name)?;
        self.ensure_active(accessor)?;
        match (self.read(accessor)?, &accessor.kind) {
            (Value::Null, AccessorKind::Pointer(slot)) => match &slot.default {
                Some(default) => {
                    let encoded = default.encoded(self.module, &slot.target, &accessor.name)?;
                    read_pointer(self.module, Segment::new(encoded), 0, &slot.target, &accessor.name)
                }
                None => Ok(empty_value(self.module, &slot.target)),
            },
            (value, _) => Ok(value),
        }
    }

    /// Whether a pointer field is set, or a nullable field holds a value.
    pub fn has(&self, name: &str) -> Result<bool, ReadError> {
        let accessor = self.accessor(name)?;
        self.has_value(accessor)
    }

    /// Whether a nullable field has its null flag set.
    pub fn is_null(&self, name: &str) -> Result<bool, ReadError> {
        let accessor = self.accessor(name)?;
        match &accessor.kind {
            AccessorKind::Nullable(nullable) => nullable.is_null(self),
            AccessorKind::Pointer(_) => Ok(!self.has_value(accessor)?),
            _ => Err(ReadError::NotAPointer {
                field: accessor.name.clone(),
            }),
        }
    }

    /// The raw group behind a group or nullable field.
    pub fn raw_group(&self, name: &str) -> Result<StructReader<'a>, ReadError> {
        let accessor = self.accessor(name)?;
        match &accessor.kind {
            AccessorKind::Group(group) => Ok(self.group(*group)),
            AccessorKind::Nullable(nullable) => Ok(self.group(nullable.group)),
            _ => Err(ReadError::NotAGroup {
                field: accessor.name.clone(),
            }),
        }
    }

    /// The live union discriminant.
    pub fn which(&self) -> Result<u16, ReadError> {
        let tag = self.struct_type().union().ok_or_else(|| ReadError::NotAUnion {
            struct_name: self.struct_type().dotname().to_owned(),
        })?;
        if tag.offset() + 2 > u32::from(self.data_size) * WORD as u32 {
            return Ok(0);
        }
        self.segment.read_u16(self.offset + tag.offset() as usize)
    }

    /// The name of the active union member, or `None` if the tag is unknown
    /// to this version of the schema.
    pub fn active_member(&self) -> Result<Option<&'a str>, ReadError> {
        let tag = self.which()?;
        Ok(self.struct_type().union().and_then(|union| union.name_of(tag)))
    }

    /// Whether the union member `member` is active, like `is_square()`.
    pub fn is(&self, member: &str) -> Result<bool, ReadError> {
        let accessor = self.accessor(member)?;
        match accessor.discriminant {
            Some(discriminant) => Ok(self.which()? == discriminant),
            None => Err(ReadError::NotAUnion {
                struct_name: format!("{}.{}", self.struct_type().dotname(), member),
            }),
        }
    }

    pub fn shortrepr(&self) -> Result<String, ReadError> {
        repr::render(self)
    }

    fn accessor(&self, name: &str) -> Result<&'a Accessor, ReadError> {
        let ty = self.struct_type();
        ty.field(name).ok_or_else(|| ty.no_such_field(name))
    }

    fn ensure_active(&self, accessor: &Accessor) -> Result<(), ReadError> {
        let discriminant = match accessor.discriminant {
            Some(discriminant) => discriminant,
            None => return Ok(()),
        };
        let tag = self.which()?;
        if tag == discriminant {
            return Ok(());
        }
        let active = match self.active_member()? {
            Some(name) => name.to_owned(),
            None => tag.to_string(),
        };
        Err(ReadError::InactiveUnionMember {
            field: accessor.name.clone(),
            active,
        })
    }

    fn group(&self, group: StructId) -> StructReader<'a> {
        StructReader { ty: group, ..*self }
    }

    fn data_fits(&self, byte: u32, width: u32) -> bool {
        byte + width <= u32::from(self.data_size) * WORD as u32
    }

    fn pointer_at(&self, slot: u16) -> Option<usize> {
        (slot < self.ptrs_size)
            .then(|| self.offset + usize::from(self.data_size) * WORD + usize::from(slot) * WORD)
    }

    pub(crate) fn has_value(&self, accessor: &Accessor) -> Result<bool, ReadError> {
        match &accessor.kind {
            AccessorKind::Pointer(slot) => match self.pointer_at(slot.slot) {
                Some(at) => Ok(self.segment.read_u64(at)? != 0),
                None => Ok(false),
            },
            AccessorKind::Nullable(nullable) => Ok(!nullable.is_null(self)?),
            _ => Err(ReadError::NotAPointer {
                field: accessor.name.clone(),
            }),
        }
    }

    /// Read a field without checking that it is the active union member.
    pub(crate) fn read(&self, accessor: &'a Accessor) -> Result<Value<'a>, ReadError> {
        tracing::trace!(field = %accessor.name, "reading field");

        match &accessor.kind {
            AccessorKind::Void => Ok(Value::Void),
            AccessorKind::Bool { bit, default } => {
                if !self.data_fits(bit / 8, 1) {
                    return Ok(Value::Bool(*default));
                }
                Ok(Value::Bool(self.segment.read_bit(self.offset, *bit)? ^ default))
            }
            AccessorKind::Int {
                width,
                byte,
                default,
            } => {
                if !self.data_fits(*byte, *width) {
                    return Ok(Value::Int(*default));
                }
                let raw = self.read_raw(*byte, *width)? ^ (*default as u64);
                Ok(Value::Int(sign_extend(raw, *width)))
            }
            AccessorKind::UInt {
                width,
                byte,
                default,
            } => {
                if !self.data_fits(*byte, *width) {
                    return Ok(Value::UInt(*default));
                }
                let raw = self.read_raw(*byte, *width)? ^ default;
                Ok(Value::UInt(raw))
            }
            AccessorKind::Float32 { byte, default } => {
                if !self.data_fits(*byte, 4) {
                    return Ok(Value::Float32(*default));
                }
                let bits = self.segment.read_u32(self.offset + *byte as usize)?;
                Ok(Value::Float32(f32::from_bits(bits ^ default.to_bits())))
            }
            AccessorKind::Float64 { byte, default } => {
                if !self.data_fits(*byte, 8) {
                    return Ok(Value::Float64(*default));
                }
                let bits = self.segment.read_u64(self.offset + *byte as usize)?;
                Ok(Value::Float64(f64::from_bits(bits ^ default.to_bits())))
            }
            AccessorKind::Enum { byte, default, .. } => {
                if !self.data_fits(*byte, 2) {
                    return Ok(Value::Enum(*default));
                }
                let raw = self.segment.read_u16(self.offset + *byte as usize)?;
                Ok(Value::Enum(raw ^ default))
            }
            AccessorKind::Pointer(slot) => match self.pointer_at(slot.slot) {
                Some(at) => read_pointer(self.module, self.segment, at, &slot.target, &accessor.name),
                None => Ok(Value::Null),
            },
            AccessorKind::Group(group) => Ok(Value::Struct(self.group(*group))),
            AccessorKind::Nullable(nullable) => nullable.read(self),
        }
    }

    fn read_raw(&self, byte: u32, width: u32) -> Result<u64, ReadError> {
        let offset = self.offset + byte as usize;
        match width {
            1 => self.segment.read_u8(offset).map(u64::from),
            2 => self.segment.read_u16(offset).map(u64::from),
            4 => self.segment.read_u32(offset).map(u64::from),
            _ => self.segment.read_u64(offset),
        }
    }
}

fn sign_extend(raw: u64, width: u32) -> i64 {
    match width {
        1 => i64::from(raw as u8 as i8),
        2 => i64::from(raw as u16 as i16),
        4 => i64::from(raw as u32 as i32),
        _ => raw as i64,
    }
}

/// The value an absent pointer takes when no default was declared.
fn empty_value<'a>(module: &'a Module, target: &'a PointerTarget) -> Value<'a> {
    match target {
        PointerTarget::Text => Value::Text(""),
        PointerTarget::Data => Value::Data(&[]),
        PointerTarget::List(elem) => Value::List(ListReader::empty(module, elem)),
        PointerTarget::Struct(id) => Value::Struct(StructReader::new(module, *id, &[], 0, 0, 0)),
    }
}

/// Follow the pointer at byte `at`.
pub(crate) fn read_pointer<'a>(
    module: &'a Module,
    segment: Segment<'a>,
    at: usize,
    target: &'a PointerTarget,
    field: &str,
) -> Result<Value<'a>, ReadError> {
    let unexpected = || ReadError::UnexpectedPointer {
        field: field.to_owned(),
        expected: target.description(),
    };

    match (target, segment.read_pointer(at)?) {
        (_, Pointer::Null) => Ok(Value::Null),
        (_, Pointer::Far) => Err(ReadError::FarPointer),
        (PointerTarget::Text, Pointer::List { target, element_size: ElementSize::Byte, count }) => {
            let bytes = segment.bytes(target, count as usize)?;
            let bytes = bytes.strip_suffix(b"\0").unwrap_or(bytes);
            let text = std::str::from_utf8(bytes).map_err(|_| ReadError::InvalidText {
                field: field.to_owned(),
            })?;
            Ok(Value::Text(text))
        }
        (PointerTarget::Data, Pointer::List { target, element_size: ElementSize::Byte, count }) => {
            Ok(Value::Data(segment.bytes(target, count as usize)?))
        }
        (PointerTarget::List(elem), Pointer::List { target, element_size, count }) => {
            let list = ListReader::new(module, segment, elem, target, element_size, count)?
                .ok_or_else(unexpected)?;
            Ok(Value::List(list))
        }
        (PointerTarget::Struct(id), Pointer::Struct { target, data_size, ptrs_size }) => {
            segment.check_words(target, usize::from(data_size) + usize::from(ptrs_size))?;
            let reader = StructReader {
                module,
                ty: *id,
                segment,
                offset: target,
                data_size,
                ptrs_size,
            };
            Ok(Value::Struct(reader))
        }
        (_, _) => Err(unexpected()),
    }
}

static TEXT: PointerTarget = PointerTarget::Text;
static DATA: PointerTarget = PointerTarget::Data;

/// A view of a list.
#[derive(Copy, Clone)]
pub struct ListReader<'a> {
    module: &'a Module,
    segment: Segment<'a>,
    elem: &'a ElementType,
    /// Byte offset of the first element.
    start: usize,
    len: u32,
    /// Distance between elements, in bits.
    step: usize,
    /// Sizes of composite struct elements.
    data_size: u16,
    ptrs_size: u16,
}

impl fmt::Debug for ListReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListReader")
            .field("elem", &self.elem)
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

impl<'a> ListReader<'a> {
    /// Returns `None` if the element size does not suit the element type.
    fn new(
        module: &'a Module,
        segment: Segment<'a>,
        elem: &'a ElementType,
        target: usize,
        element_size: ElementSize,
        count: u32,
    ) -> Result<Option<ListReader<'a>>, ReadError> {
        let expected = match elem {
            ElementType::Void => ElementSize::Void,
            ElementType::Bool => ElementSize::Bit,
            ElementType::Text | ElementType::Data | ElementType::List(_) => ElementSize::Pointer,
            ElementType::Struct(_) => ElementSize::InlineComposite,
            elem => ElementSize::for_byte_width(elem.byte_width().unwrap_or(8)),
        };
        if element_size != expected {
            return Ok(None);
        }

        if element_size != ElementSize::InlineComposite {
            let bits = element_size.bits() * count as usize;
            segment.check_words(target, crate::binary::words_for_bits(bits))?;
            return Ok(Some(ListReader {
                module,
                segment,
                elem,
                start: target,
                len: count,
                step: element_size.bits(),
                data_size: 0,
                ptrs_size: 0,
            }));
        }

        // The count of a composite list is its size in words, excluding the
        // tag word that describes its elements.
        segment.check_words(target, count as usize + 1)?;
        let tag = segment.read_u64(target)?;
        let len = (tag as u32) >> 2;
        let data_size = (tag >> 32) as u16;
        let ptrs_size = (tag >> 48) as u16;
        let words = usize::from(data_size) + usize::from(ptrs_size);
        if words * len as usize > count as usize {
            return Err(ReadError::OutOfBounds {
                offset: target + WORD,
                len: words * len as usize * WORD,
            });
        }
        Ok(Some(ListReader {
            module,
            segment,
            elem,
            start: target + WORD,
            len,
            step: words * WORD * 8,
            data_size,
            ptrs_size,
        }))
    }

    fn empty(module: &'a Module, elem: &'a ElementType) -> ListReader<'a> {
        ListReader {
            module,
            segment: Segment::new(&[]),
            elem,
            start: 0,
            len: 0,
            step: 0,
            data_size: 0,
            ptrs_size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn element_type(&self) -> &'a ElementType {
        self.elem
    }

    pub fn get(&self, index: usize) -> Result<Value<'a>, ReadError> {
        if index >= self.len() {
            return Err(ReadError::OutOfBounds {
                offset: index,
                len: self.len(),
            });
        }

        let bit = index * self.step;
        let at = self.start + bit / 8;
        let segment = self.segment;
        match self.elem {
            ElementType::Void => Ok(Value::Void),
            ElementType::Bool => Ok(Value::Bool(segment.read_bit(at, (bit % 8) as u32)?)),
            ElementType::Int(1) => Ok(Value::Int(i64::from(segment.read_u8(at)? as i8))),
            ElementType::Int(2) => Ok(Value::Int(i64::from(segment.read_u16(at)? as i16))),
            ElementType::Int(4) => Ok(Value::Int(i64::from(segment.read_u32(at)? as i32))),
            ElementType::Int(_) => Ok(Value::Int(segment.read_u64(at)? as i64)),
            ElementType::UInt(1) => Ok(Value::UInt(u64::from(segment.read_u8(at)?))),
            ElementType::UInt(2) => Ok(Value::UInt(u64::from(segment.read_u16(at)?))),
            ElementType::UInt(4) => Ok(Value::UInt(u64::from(segment.read_u32(at)?))),
            ElementType::UInt(_) => Ok(Value::UInt(segment.read_u64(at)?)),
            ElementType::Float32 => Ok(Value::Float32(f32::from_bits(segment.read_u32(at)?))),
            ElementType::Float64 => Ok(Value::Float64(f64::from_bits(segment.read_u64(at)?))),
            ElementType::Enum(_) => Ok(Value::Enum(segment.read_u16(at)?)),
            ElementType::Text => read_pointer(self.module, segment, at, &TEXT, "[]"),
            ElementType::Data => read_pointer(self.module, segment, at, &DATA, "[]"),
            ElementType::List(elem) => match read_pointer_list(self.module, segment, at, elem)? {
                Some(list) => Ok(Value::List(list)),
                None => Ok(Value::Null),
            },
            ElementType::Struct(id) => Ok(Value::Struct(StructReader {
                module: self.module,
                ty: *id,
                segment,
                offset: at,
                data_size: self.data_size,
                ptrs_size: self.ptrs_size,
            })),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Value<'a>, ReadError>> + '_ {
        (0..self.len()).map(move |index| self.get(index))
    }
}

/// Follow a pointer to a nested list, borrowing the element type from the
/// enclosing list.
fn read_pointer_list<'a>(
    module: &'a Module,
    segment: Segment<'a>,
    at: usize,
    elem: &'a ElementType,
) -> Result<Option<ListReader<'a>>, ReadError> {
    match segment.read_pointer(at)? {
        Pointer::Null => Ok(None),
        Pointer::Far => Err(ReadError::FarPointer),
        Pointer::List {
            target,
            element_size,
            count,
        } => match ListReader::new(module, segment, elem, target, element_size, count)? {
            Some(list) => Ok(Some(list)),
            None => Err(ReadError::UnexpectedPointer {
                field: "[]".to_owned(),
                expected: "list",
            }),
        },
        _ => Err(ReadError::UnexpectedPointer {
            field: "[]".to_owned(),
            expected: "list",
        }),
    }
}

/// A struct built by a constructor, owning its buffer.
#[derive(Clone)]
pub struct Instance<'m> {
    module: &'m Module,
    ty: StructId,
    buffer: Vec<u8>,
}

impl fmt::Debug for Instance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("ty", &self.struct_type().dotname())
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl<'m> Instance<'m> {
    pub(crate) fn new(module: &'m Module, ty: StructId, buffer: Vec<u8>) -> Instance<'m> {
        Instance { module, ty, buffer }
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    pub fn type_id(&self) -> StructId {
        self.ty
    }

    pub fn struct_type(&self) -> &'m StructType {
        self.module.struct_type(self.ty)
    }

    /// The struct's region, followed by everything its pointers refer to.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn reader(&self) -> StructReader<'_> {
        let ty = self.struct_type();
        StructReader::new(self.module, self.ty, &self.buffer, 0, ty.data_size, ty.ptrs_size)
    }
}
