//! Compiled struct types.
//!
//! A [`Module`] is the result of compiling a [`crate::schema::Schema`]. It is
//! a table of [`StructType`]s, each describing where its fields live, how to
//! construct it, and how to render it. The table is interpreted by the shared
//! reading code in [`crate::reader`] and the writing code in
//! [`crate::compile::structor`].

use fxhash::FxHashMap;
use once_cell::sync::OnceCell;
use std::fmt;

use crate::binary::{Builder, ReadError};
use crate::compile::nullable::Nullable;
use crate::compile::repr::ReprPart;
use crate::compile::structor::{self, Region, Structor};
use crate::compile::union::{UnionConstructors, UnionTag};
use crate::error::ConstructError;
use crate::reader::{Instance, StructReader};
use crate::schema::EnumId;
use crate::value::{Args, Input, Variant};

/// Index of a struct type in a [`Module`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub(crate) u32);

impl StructId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct Module {
    types: Vec<StructType>,
    names: FxHashMap<String, StructId>,
    enums: Vec<EnumType>,
}

impl Module {
    pub(crate) fn new(
        types: Vec<StructType>,
        names: FxHashMap<String, StructId>,
        enums: Vec<EnumType>,
    ) -> Module {
        Module {
            types,
            names,
            enums,
        }
    }

    /// Look up a struct by its compile name (`Outer_Inner`) or its dotted
    /// name (`Outer.Inner`).
    pub fn lookup(&self, name: &str) -> Option<StructId> {
        self.names.get(name).copied()
    }

    pub fn struct_type(&self, id: StructId) -> &StructType {
        &self.types[id.index()]
    }

    /// All struct types, nested types before the types that contain them.
    pub fn struct_types(&self) -> impl Iterator<Item = (StructId, &StructType)> {
        (self.types.iter().enumerate()).map(|(index, ty)| (StructId(index as u32), ty))
    }

    pub fn enum_type(&self, id: EnumId) -> &EnumType {
        &self.enums[id.index()]
    }

    pub fn enum_types(&self) -> &[EnumType] {
        &self.enums
    }

    /// The names of all struct types, for suggestions in error messages.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|ty| ty.dotname.as_str())
    }

    /// Build a new instance of a struct with the general constructor.
    pub fn construct(&self, id: StructId, args: &Args) -> Result<Instance<'_>, ConstructError> {
        let ty = self.struct_type(id);
        let mut builder = Builder::new();
        let region = Region::alloc(&mut builder, ty.data_size, ty.ptrs_size);
        ty.constructors.write(self, &mut builder, region, args)?;
        Ok(Instance::new(self, id, builder.into_buffer()))
    }

    /// Build a new instance of a union struct with the factory of one member,
    /// like `new_square(...)`.
    pub fn construct_member(
        &self,
        id: StructId,
        member: &str,
        args: &Args,
    ) -> Result<Instance<'_>, ConstructError> {
        let ty = self.struct_type(id);
        let factory = match &ty.constructors {
            Constructors::Union(union) => union.factory(member),
            Constructors::Plain(_) => None,
        };
        let factory = factory.ok_or_else(|| ConstructError::UnknownMember {
            struct_name: ty.dotname.clone(),
            member: member.to_owned(),
        })?;
        Ok(Instance::new(self, id, factory.structor().build(self, args)?))
    }

    /// Build a new instance of a union struct from an explicitly selected
    /// member and the remaining non-union fields.
    pub fn construct_variant(
        &self,
        id: StructId,
        variant: &Variant,
        shared: &Args,
    ) -> Result<Instance<'_>, ConstructError> {
        let mut args = shared.clone();
        args.insert(variant.member.clone(), variant.value.clone());
        self.construct_member(id, &variant.member, &args)
    }

    /// View an existing buffer as an instance of a struct.
    pub fn from_buffer<'a>(
        &'a self,
        id: StructId,
        buffer: &'a [u8],
        offset: usize,
        data_size: u16,
        ptrs_size: u16,
    ) -> StructReader<'a> {
        StructReader::new(self, id, buffer, offset, data_size, ptrs_size)
    }
}

#[derive(Clone, Debug)]
pub struct EnumType {
    pub name: String,
    pub enumerants: Vec<String>,
}

impl EnumType {
    pub fn enumerant(&self, ordinal: u16) -> Option<&str> {
        self.enumerants.get(usize::from(ordinal)).map(String::as_str)
    }
}

#[derive(Debug)]
pub struct StructType {
    pub(crate) name: String,
    pub(crate) dotname: String,
    pub(crate) data_size: u16,
    pub(crate) ptrs_size: u16,
    pub(crate) is_group: bool,
    /// Nested non-group types, by their short names.
    pub(crate) nested: Vec<(String, StructId)>,
    pub(crate) union: Option<UnionTag>,
    pub(crate) fields: Vec<Accessor>,
    pub(crate) constructors: Constructors,
    pub(crate) repr: Vec<ReprPart>,
}

impl StructType {
    /// The compile name, like `Outer_Inner`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The runtime name, like `Outer.Inner`.
    pub fn dotname(&self) -> &str {
        &self.dotname
    }

    /// Number of data words in the region addressed by this struct's fields.
    pub fn data_size(&self) -> u16 {
        self.data_size
    }

    /// Number of pointer slots in the region addressed by this struct's
    /// fields.
    pub fn ptrs_size(&self) -> u16 {
        self.ptrs_size
    }

    pub fn is_group(&self) -> bool {
        self.is_group
    }

    pub fn nested(&self) -> &[(String, StructId)] {
        &self.nested
    }

    /// Resolve a nested type alias, like `Outer.Inner` from `Outer`.
    pub fn nested_type(&self, name: &str) -> Option<StructId> {
        (self.nested.iter()).find_map(|(nested, id)| (nested == name).then_some(*id))
    }

    pub fn union(&self) -> Option<&UnionTag> {
        self.union.as_ref()
    }

    pub fn fields(&self) -> &[Accessor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Accessor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn constructors(&self) -> &Constructors {
        &self.constructors
    }

    pub fn repr_plan(&self) -> &[ReprPart] {
        &self.repr
    }

    pub(crate) fn no_such_field(&self, name: &str) -> ReadError {
        let suggestion = (self.fields.iter())
            .map(|field| (levenshtein::levenshtein(name, &field.name), &field.name))
            .filter(|(distance, _)| *distance < 3)
            .min()
            .map(|(_, field)| field.clone());

        ReadError::NoSuchField {
            struct_name: self.dotname.clone(),
            field: name.to_owned(),
            suggestion,
        }
    }
}

/// How instances of a struct are built.
#[derive(Debug)]
pub enum Constructors {
    /// A single constructor over every field.
    Plain(Structor),
    /// One factory per union member, and a dispatching constructor.
    Union(UnionConstructors),
}

impl Constructors {
    /// Write `args` into a region allocated for this struct.
    pub(crate) fn write(
        &self,
        module: &Module,
        builder: &mut Builder,
        region: Region,
        args: &Args,
    ) -> Result<(), ConstructError> {
        match self {
            Constructors::Plain(structor) => structor.write(module, builder, region, args),
            Constructors::Union(union) => union.write(module, builder, region, args),
        }
    }

    /// Write the values an unset group takes.
    pub(crate) fn write_defaults(
        &self,
        module: &Module,
        builder: &mut Builder,
        region: Region,
    ) -> Result<(), ConstructError> {
        match self {
            Constructors::Plain(structor) => structor.write(module, builder, region, &Args::new()),
            Constructors::Union(union) => union.write_defaults(module, builder, region),
        }
    }
}

/// Where a field is stored, and how it is encoded.
#[derive(Clone, Debug)]
pub struct Accessor {
    pub(crate) name: String,
    pub(crate) kind: AccessorKind,
    /// Set for members of the enclosing struct's union.
    pub(crate) discriminant: Option<u16>,
    /// The default declared in the schema, if any.
    pub(crate) default: Option<Input>,
    /// The field's type as written in the schema.
    pub(crate) type_name: String,
}

impl Accessor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &AccessorKind {
        &self.kind
    }

    pub fn discriminant(&self) -> Option<u16> {
        self.discriminant
    }

    pub fn default(&self) -> Option<&Input> {
        self.default.as_ref()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, AccessorKind::Pointer(_))
    }
}

#[derive(Clone, Debug)]
pub enum AccessorKind {
    Void,
    Bool {
        /// Bit offset from the start of the data region.
        bit: u32,
        default: bool,
    },
    Int {
        /// Width in bytes.
        width: u32,
        /// Byte offset from the start of the data region.
        byte: u32,
        default: i64,
    },
    UInt {
        width: u32,
        byte: u32,
        default: u64,
    },
    Float32 {
        byte: u32,
        default: f32,
    },
    Float64 {
        byte: u32,
        default: f64,
    },
    Enum {
        byte: u32,
        r#enum: EnumId,
        default: u16,
    },
    Pointer(PointerSlot),
    /// A group, sharing the region of the enclosing struct.
    Group(StructId),
    Nullable(Box<Nullable>),
}

#[derive(Clone, Debug)]
pub struct PointerSlot {
    pub(crate) slot: u16,
    pub(crate) target: PointerTarget,
    pub(crate) default: Option<PointerDefault>,
}

impl PointerSlot {
    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub fn target(&self) -> &PointerTarget {
        &self.target
    }
}

/// What a pointer field points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PointerTarget {
    Text,
    Data,
    List(Box<ElementType>),
    Struct(StructId),
}

impl PointerTarget {
    pub(crate) fn description(&self) -> &'static str {
        match self {
            PointerTarget::Text => "text",
            PointerTarget::Data => "data",
            PointerTarget::List(_) => "list",
            PointerTarget::Struct(_) => "struct",
        }
    }
}

/// The element type of a list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    Void,
    Bool,
    /// A signed integer of the given byte width.
    Int(u32),
    /// An unsigned integer of the given byte width.
    UInt(u32),
    Float32,
    Float64,
    Enum(EnumId),
    Text,
    Data,
    List(Box<ElementType>),
    Struct(StructId),
}

impl ElementType {
    /// The target of elements stored as pointers.
    pub fn pointer_target(&self) -> Option<PointerTarget> {
        match self {
            ElementType::Text => Some(PointerTarget::Text),
            ElementType::Data => Some(PointerTarget::Data),
            ElementType::List(elem) => Some(PointerTarget::List(elem.clone())),
            ElementType::Struct(id) => Some(PointerTarget::Struct(*id)),
            _ => None,
        }
    }

    /// Width in bytes of scalar elements.
    pub fn byte_width(&self) -> Option<u32> {
        match self {
            ElementType::Int(width) | ElementType::UInt(width) => Some(*width),
            ElementType::Float32 => Some(4),
            ElementType::Float64 => Some(8),
            ElementType::Enum(_) => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Void => write!(f, "void"),
            ElementType::Bool => write!(f, "bool"),
            ElementType::Int(width) => write!(f, "Int{}", width * 8),
            ElementType::UInt(width) => write!(f, "UInt{}", width * 8),
            ElementType::Float32 => write!(f, "Float32"),
            ElementType::Float64 => write!(f, "Float64"),
            ElementType::Enum(_) => write!(f, "enum"),
            ElementType::Text => write!(f, "text"),
            ElementType::Data => write!(f, "data"),
            ElementType::List(elem) => write!(f, "list of {elem}"),
            ElementType::Struct(_) => write!(f, "struct"),
        }
    }
}

/// The declared default of a pointer field.
///
/// The default is encoded into its own small segment the first time it is
/// read, and shared by every reader afterwards.
#[derive(Clone, Debug)]
pub struct PointerDefault {
    literal: Input,
    encoded: OnceCell<Vec<u8>>,
}

impl PointerDefault {
    pub(crate) fn new(literal: Input) -> PointerDefault {
        PointerDefault {
            literal,
            encoded: OnceCell::new(),
        }
    }

    pub fn literal(&self) -> &Input {
        &self.literal
    }

    /// A segment whose first word is a pointer to the default value.
    pub(crate) fn encoded(
        &self,
        module: &Module,
        target: &PointerTarget,
        field: &str,
    ) -> Result<&[u8], ReadError> {
        let encoded = self.encoded.get_or_try_init(|| {
            let mut builder = Builder::new();
            let at = builder.alloc(1);
            structor::write_pointer(module, &mut builder, at, target, &self.literal, field)?;
            Ok::<_, ConstructError>(builder.into_buffer())
        });
        encoded.map(Vec::as_slice).map_err(|_| ReadError::InvalidDefault {
            field: field.to_owned(),
        })
    }
}
