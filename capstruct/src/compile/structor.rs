//! Construction of struct regions.
//!
//! A [`Structor`] writes an ordered set of fields into a zero-filled region,
//! then optionally stamps a union discriminant. Scalars are stored XOR-ed with
//! their declared default, so that an all-zero region reads back as the
//! defaults.

use crate::binary::{composite_tag, words_for_bits, words_for_bytes, Builder, ElementSize, WORD};
use crate::error::ConstructError;
use crate::module::{Accessor, AccessorKind, ElementType, Module, PointerTarget, StructType};
use crate::value::{Args, Input};

/// The fixed region that a struct's fields are written into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    /// Byte offset of the data section.
    pub offset: usize,
    pub data_size: u16,
    pub ptrs_size: u16,
}

impl Region {
    pub fn alloc(builder: &mut Builder, data_size: u16, ptrs_size: u16) -> Region {
        let offset = builder.alloc(usize::from(data_size) + usize::from(ptrs_size));
        Region {
            offset,
            data_size,
            ptrs_size,
        }
    }

    fn data(&self, byte: u32) -> usize {
        self.offset + byte as usize
    }

    fn pointer(&self, slot: u16) -> usize {
        self.offset + (usize::from(self.data_size) + usize::from(slot)) * WORD
    }
}

#[derive(Clone, Debug)]
pub struct Param {
    pub(crate) field: Accessor,
    /// Whether the argument must be supplied when the field has no declared
    /// default.
    pub(crate) mandatory: bool,
}

impl Param {
    pub(crate) fn optional(field: Accessor) -> Param {
        Param {
            field,
            mandatory: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn field(&self) -> &Accessor {
        &self.field
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }
}

/// A union discriminant to write after the fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    /// Byte offset in the data section.
    pub offset: u32,
    pub value: u16,
}

#[derive(Clone, Debug)]
pub struct Structor {
    /// The struct being built, for error messages.
    owner: String,
    data_size: u16,
    ptrs_size: u16,
    params: Vec<Param>,
    tag: Option<Tag>,
}

impl Structor {
    pub fn new(
        owner: impl Into<String>,
        data_size: u16,
        ptrs_size: u16,
        params: Vec<Param>,
        tag: Option<Tag>,
    ) -> Structor {
        Structor {
            owner: owner.into(),
            data_size,
            ptrs_size,
            params,
            tag,
        }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn tag(&self) -> Option<Tag> {
        self.tag
    }

    /// Allocate a fresh region and write `args` into it.
    pub fn build(&self, module: &Module, args: &Args) -> Result<Vec<u8>, ConstructError> {
        let mut builder = Builder::new();
        let region = Region::alloc(&mut builder, self.data_size, self.ptrs_size);
        self.write(module, &mut builder, region, args)?;
        Ok(builder.into_buffer())
    }

    pub(crate) fn write(
        &self,
        module: &Module,
        builder: &mut Builder,
        region: Region,
        args: &Args,
    ) -> Result<(), ConstructError> {
        if let Some(name) = (args.names()).find(|name| self.params.iter().all(|p| p.name() != *name)) {
            return Err(ConstructError::UnknownArgument {
                struct_name: self.owner.clone(),
                name: name.to_owned(),
            });
        }

        for param in &self.params {
            match args.get(param.name()) {
                Some(input) => write_field(module, builder, region, &param.field, input)?,
                None if param.mandatory && param.field.default.is_none() => {
                    return Err(ConstructError::MissingArgument {
                        field: param.field.name.clone(),
                    });
                }
                None => write_unset(module, builder, region, &param.field)?,
            }
        }

        if let Some(tag) = self.tag {
            builder.write_u16(region.data(tag.offset), tag.value);
        }

        Ok(())
    }
}

fn mismatch(field: &str, expected: impl ToString, found: &Input) -> ConstructError {
    ConstructError::TypeMismatch {
        field: field.to_owned(),
        expected: expected.to_string(),
        found: found.description(),
    }
}

/// Write a supplied argument.
pub(crate) fn write_field(
    module: &Module,
    builder: &mut Builder,
    region: Region,
    field: &Accessor,
    input: &Input,
) -> Result<(), ConstructError> {
    let name = field.name.as_str();

    match &field.kind {
        AccessorKind::Void => match input {
            Input::Void | Input::Null => Ok(()),
            input => Err(mismatch(name, "Void", input)),
        },
        AccessorKind::Bool { bit, default } => match input {
            Input::Bool(value) => {
                builder.write_bit(region.offset, *bit, value ^ default);
                Ok(())
            }
            input => Err(mismatch(name, "Bool", input)),
        },
        AccessorKind::Int {
            width,
            byte,
            default,
        } => {
            let value = coerce_int(input, *width).ok_or_else(|| mismatch(name, &field.type_name, input))?;
            write_uint(builder, region.data(*byte), *width, (value ^ default) as u64);
            Ok(())
        }
        AccessorKind::UInt {
            width,
            byte,
            default,
        } => {
            let value = coerce_uint(input, *width).ok_or_else(|| mismatch(name, &field.type_name, input))?;
            write_uint(builder, region.data(*byte), *width, value ^ default);
            Ok(())
        }
        AccessorKind::Float32 { byte, default } => {
            let value = coerce_f32(input).ok_or_else(|| mismatch(name, "Float32", input))?;
            builder.write_u32(region.data(*byte), value.to_bits() ^ default.to_bits());
            Ok(())
        }
        AccessorKind::Float64 { byte, default } => {
            let value = coerce_f64(input).ok_or_else(|| mismatch(name, "Float64", input))?;
            builder.write_u64(region.data(*byte), value.to_bits() ^ default.to_bits());
            Ok(())
        }
        AccessorKind::Enum { byte, default, .. } => {
            let value = coerce_enum(input).ok_or_else(|| mismatch(name, &field.type_name, input))?;
            builder.write_u16(region.data(*byte), value ^ default);
            Ok(())
        }
        AccessorKind::Pointer(slot) => {
            let at = region.pointer(slot.slot);
            write_pointer(module, builder, at, &slot.target, input, name)
        }
        AccessorKind::Group(group) => {
            let ty = module.struct_type(*group);
            let args = record_args(ty, input, name)?;
            ty.constructors.write(module, builder, region, &args)
        }
        AccessorKind::Nullable(nullable) => nullable.write(module, builder, region, Some(input)),
    }
}

/// Write the value a field takes when its argument is not supplied.
pub(crate) fn write_unset(
    module: &Module,
    builder: &mut Builder,
    region: Region,
    field: &Accessor,
) -> Result<(), ConstructError> {
    match &field.kind {
        AccessorKind::Pointer(slot) => match &slot.default {
            Some(default) => {
                let at = region.pointer(slot.slot);
                write_pointer(module, builder, at, &slot.target, default.literal(), &field.name)
            }
            None => Ok(()),
        },
        AccessorKind::Group(group) => {
            let ty = module.struct_type(*group);
            ty.constructors.write_defaults(module, builder, region)
        }
        AccessorKind::Nullable(nullable) => nullable.write(module, builder, region, None),
        // Zero bits already decode as the declared default.
        _ => Ok(()),
    }
}

/// Write `input` as the target of the pointer at byte `at`. Null leaves the
/// pointer unset.
pub(crate) fn write_pointer(
    module: &Module,
    builder: &mut Builder,
    at: usize,
    target: &PointerTarget,
    input: &Input,
    field: &str,
) -> Result<(), ConstructError> {
    match (target, input) {
        (_, Input::Null) => Ok(()),
        (PointerTarget::Text, Input::Text(text)) => {
            let mut bytes = Vec::with_capacity(text.len() + 1);
            bytes.extend_from_slice(text.as_bytes());
            bytes.push(0);
            builder.write_byte_list(at, &bytes);
            Ok(())
        }
        (PointerTarget::Data, Input::Data(data)) => {
            builder.write_byte_list(at, data);
            Ok(())
        }
        (PointerTarget::List(elem), Input::List(items)) => {
            write_list(module, builder, at, elem, items, field)
        }
        (PointerTarget::Struct(id), Input::Record(_) | Input::Tuple(_)) => {
            let ty = module.struct_type(*id);
            let args = record_args(ty, input, field)?;
            let region = Region::alloc(builder, ty.data_size, ty.ptrs_size);
            builder.write_struct_pointer(at, region.offset, ty.data_size, ty.ptrs_size);
            ty.constructors.write(module, builder, region, &args)
        }
        (target, input) => Err(mismatch(field, target.description(), input)),
    }
}

fn write_list(
    module: &Module,
    builder: &mut Builder,
    at: usize,
    elem: &ElementType,
    items: &[Input],
    field: &str,
) -> Result<(), ConstructError> {
    let count = items.len();

    match elem {
        ElementType::Void => {
            for item in items {
                if !matches!(item, Input::Void) {
                    return Err(mismatch(field, elem, item));
                }
            }
            let target = builder.buffer().len();
            builder.write_list_pointer(at, target, ElementSize::Void, count as u32);
        }
        ElementType::Bool => {
            let target = builder.alloc(words_for_bits(count));
            for (index, item) in items.iter().enumerate() {
                match item {
                    Input::Bool(value) => builder.write_bit(target, index as u32, *value),
                    item => return Err(mismatch(field, elem, item)),
                }
            }
            builder.write_list_pointer(at, target, ElementSize::Bit, count as u32);
        }
        ElementType::Text | ElementType::Data | ElementType::List(_) => {
            let target = builder.alloc(count);
            if let Some(pointer_target) = elem.pointer_target() {
                for (index, item) in items.iter().enumerate() {
                    let at = target + index * WORD;
                    write_pointer(module, builder, at, &pointer_target, item, field)?;
                }
            }
            builder.write_list_pointer(at, target, ElementSize::Pointer, count as u32);
        }
        ElementType::Struct(id) => {
            let ty = module.struct_type(*id);
            let words = usize::from(ty.data_size) + usize::from(ty.ptrs_size);
            let tag = builder.alloc(1 + count * words);
            builder.write_u64(tag, composite_tag(count as u32, ty.data_size, ty.ptrs_size));
            for (index, item) in items.iter().enumerate() {
                let region = Region {
                    offset: tag + WORD + index * words * WORD,
                    data_size: ty.data_size,
                    ptrs_size: ty.ptrs_size,
                };
                let args = record_args(ty, item, field)?;
                ty.constructors.write(module, builder, region, &args)?;
            }
            let size = (count * words) as u32;
            builder.write_list_pointer(at, tag, ElementSize::InlineComposite, size);
        }
        scalar => {
            let width = scalar.byte_width().unwrap_or(8);
            let target = builder.alloc(words_for_bytes(count * width as usize));
            for (index, item) in items.iter().enumerate() {
                let bits = match scalar {
                    ElementType::Int(width) => coerce_int(item, *width).map(|value| value as u64),
                    ElementType::UInt(width) => coerce_uint(item, *width),
                    ElementType::Float32 => coerce_f32(item).map(|value| u64::from(value.to_bits())),
                    ElementType::Float64 => coerce_f64(item).map(f64::to_bits),
                    _ => coerce_enum(item).map(u64::from),
                };
                let bits = bits.ok_or_else(|| mismatch(field, scalar, item))?;
                write_uint(builder, target + index * width as usize, width, bits);
            }
            let size = ElementSize::for_byte_width(width);
            builder.write_list_pointer(at, target, size, count as u32);
        }
    }

    Ok(())
}

/// The arguments of a struct or group value, given by name or by position.
pub(crate) fn record_args(ty: &StructType, input: &Input, field: &str) -> Result<Args, ConstructError> {
    match input {
        Input::Record(args) => Ok(args.clone()),
        Input::Tuple(items) if items.len() <= ty.fields.len() => Ok((ty.fields.iter())
            .zip(items)
            .map(|(field, item)| (field.name.clone(), item.clone()))
            .collect()),
        input => Err(mismatch(field, format_args!("{} value", ty.dotname), input)),
    }
}

fn write_uint(builder: &mut Builder, offset: usize, width: u32, bits: u64) {
    match width {
        1 => builder.write_u8(offset, bits as u8),
        2 => builder.write_u16(offset, bits as u16),
        4 => builder.write_u32(offset, bits as u32),
        _ => builder.write_u64(offset, bits),
    }
}

fn coerce_int(input: &Input, width: u32) -> Option<i64> {
    let value = match input {
        Input::Int(value) => *value,
        Input::UInt(value) => i64::try_from(*value).ok()?,
        _ => return None,
    };
    let fits = match width {
        1 => i8::try_from(value).is_ok(),
        2 => i16::try_from(value).is_ok(),
        4 => i32::try_from(value).is_ok(),
        _ => true,
    };
    fits.then_some(value)
}

fn coerce_uint(input: &Input, width: u32) -> Option<u64> {
    let value = match input {
        Input::UInt(value) => *value,
        Input::Int(value) => u64::try_from(*value).ok()?,
        _ => return None,
    };
    let fits = match width {
        1 => u8::try_from(value).is_ok(),
        2 => u16::try_from(value).is_ok(),
        4 => u32::try_from(value).is_ok(),
        _ => true,
    };
    fits.then_some(value)
}

fn coerce_f32(input: &Input) -> Option<f32> {
    match input {
        Input::Float32(value) => Some(*value),
        Input::Float64(value) => Some(*value as f32),
        Input::Int(value) => Some(*value as f32),
        Input::UInt(value) => Some(*value as f32),
        _ => None,
    }
}

fn coerce_f64(input: &Input) -> Option<f64> {
    match input {
        Input::Float32(value) => Some(f64::from(*value)),
        Input::Float64(value) => Some(*value),
        Input::Int(value) => Some(*value as f64),
        Input::UInt(value) => Some(*value as f64),
        _ => None,
    }
}

fn coerce_enum(input: &Input) -> Option<u16> {
    match input {
        Input::Enum(value) => Some(*value),
        Input::UInt(value) => u16::try_from(*value).ok(),
        Input::Int(value) => u16::try_from(*value).ok(),
        _ => None,
    }
}
