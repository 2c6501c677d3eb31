//! The struct tree consumed by the compiler.
//!
//! A [`Schema`] is produced once by the front-end (see [`crate::surface`]) and
//! is never modified afterwards. Every struct node carries its own layout
//! facts: the number of data words and pointer slots it addresses, and where
//! its union discriminant lives.

use std::fmt;

use crate::value::Input;

/// Index of a struct node in [`Schema::nodes`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of an enum in [`Schema::enums`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumId(pub u32);

impl EnumId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, Default)]
pub struct Schema {
    /// The `@0x...` id of the schema file, if one was declared.
    pub file_id: Option<u64>,
    pub nodes: Vec<StructNode>,
    pub enums: Vec<EnumNode>,
}

impl Schema {
    pub fn node(&self, id: NodeId) -> &StructNode {
        &self.nodes[id.index()]
    }

    pub fn enum_node(&self, id: EnumId) -> &EnumNode {
        &self.enums[id.index()]
    }

    /// Struct nodes that are not nested in any other node, in declaration
    /// order.
    pub fn roots(&self) -> impl Iterator<Item = &StructNode> {
        self.nodes.iter().filter(|node| node.parent.is_none())
    }
}

#[derive(Clone, Debug)]
pub struct StructNode {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    /// Nested structs and groups, in declaration order.
    pub children: Vec<NodeId>,
    pub data_word_count: u16,
    pub pointer_count: u16,
    pub discriminant_count: u16,
    /// Offset of the discriminant, in multiples of 16 bits.
    pub discriminant_offset: u32,
    pub is_group: bool,
    pub fields: Vec<Field>,
}

impl StructNode {
    pub fn is_nested(&self) -> bool {
        self.parent.is_some()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Clone, Debug)]
pub struct EnumNode {
    pub id: EnumId,
    pub name: String,
    pub enumerants: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    /// The `@N` ordinal. Groups and named unions have none.
    pub ordinal: Option<u16>,
    pub r#type: Type,
    /// Offset of the field. Data fields count elements of their own width
    /// (bits for `Bool`), pointer fields count pointer slots. Always zero for
    /// groups and void.
    pub offset: u32,
    pub default: Option<Input>,
    /// Set for the members of this node's union.
    pub discriminant_value: Option<u16>,
    pub annotations: Vec<Annotation>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Annotation {
    /// Exposes a `{ isNull, value }` group as an optional value.
    Nullable,
    /// Any other annotation, by its dotted name. These are ignored.
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Enum(EnumId),
    Text,
    Data,
    List(Box<Type>),
    Struct(NodeId),
    Group(NodeId),
}

/// The value kind of a field, independent of its width.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Void,
    Bool,
    Int,
    UInt,
    Float32,
    Float64,
    Enum,
    Text,
    Data,
    List,
    Struct,
    Group,
}

impl Type {
    pub fn kind(&self) -> Kind {
        match self {
            Type::Void => Kind::Void,
            Type::Bool => Kind::Bool,
            Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64 => Kind::Int,
            Type::UInt8 | Type::UInt16 | Type::UInt32 | Type::UInt64 => Kind::UInt,
            Type::Float32 => Kind::Float32,
            Type::Float64 => Kind::Float64,
            Type::Enum(_) => Kind::Enum,
            Type::Text => Kind::Text,
            Type::Data => Kind::Data,
            Type::List(_) => Kind::List,
            Type::Struct(_) => Kind::Struct,
            Type::Group(_) => Kind::Group,
        }
    }

    /// Types stored in the pointer region.
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            Type::Text | Type::Data | Type::List(_) | Type::Struct(_)
        )
    }

    /// Integer, float and enum types.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self.kind(),
            Kind::Int | Kind::UInt | Kind::Float32 | Kind::Float64 | Kind::Enum
        )
    }

    /// Base-2 logarithm of the width in bits of a type stored in the data
    /// region. `None` for void, pointers and groups.
    pub fn lg_bits(&self) -> Option<u32> {
        match self {
            Type::Bool => Some(0),
            Type::Int8 | Type::UInt8 => Some(3),
            Type::Int16 | Type::UInt16 | Type::Enum(_) => Some(4),
            Type::Int32 | Type::UInt32 | Type::Float32 => Some(5),
            Type::Int64 | Type::UInt64 | Type::Float64 => Some(6),
            Type::Void
            | Type::Text
            | Type::Data
            | Type::List(_)
            | Type::Struct(_)
            | Type::Group(_) => None,
        }
    }

    /// Width in bytes of a type stored in the data region, or zero.
    pub fn byte_width(&self) -> u32 {
        match self.lg_bits() {
            Some(lg) if lg >= 3 => 1 << (lg - 3),
            _ => 0,
        }
    }
}

impl fmt::Display for Type {
    /// Formats builtin types by name. Named types are printed by their index
    /// here; use [`Schema::type_name`] for their declared names.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "Void"),
            Type::Bool => write!(f, "Bool"),
            Type::Int8 => write!(f, "Int8"),
            Type::Int16 => write!(f, "Int16"),
            Type::Int32 => write!(f, "Int32"),
            Type::Int64 => write!(f, "Int64"),
            Type::UInt8 => write!(f, "UInt8"),
            Type::UInt16 => write!(f, "UInt16"),
            Type::UInt32 => write!(f, "UInt32"),
            Type::UInt64 => write!(f, "UInt64"),
            Type::Float32 => write!(f, "Float32"),
            Type::Float64 => write!(f, "Float64"),
            Type::Enum(id) => write!(f, "Enum({})", id.0),
            Type::Text => write!(f, "Text"),
            Type::Data => write!(f, "Data"),
            Type::List(elem) => write!(f, "List({elem})"),
            Type::Struct(id) => write!(f, "Struct({})", id.0),
            Type::Group(id) => write!(f, "Group({})", id.0),
        }
    }
}

impl Schema {
    /// The type as it would be written in a schema file.
    pub fn type_name(&self, r#type: &Type) -> String {
        match r#type {
            Type::Enum(id) => self.enum_node(*id).name.clone(),
            Type::Struct(id) => self.node(*id).name.clone(),
            Type::Group(_) => "group".to_owned(),
            Type::List(elem) => format!("List({})", self.type_name(elem)),
            r#type => r#type.to_string(),
        }
    }
}

impl Field {
    pub fn is_part_of_union(&self) -> bool {
        self.discriminant_value.is_some()
    }

    pub fn is_pointer(&self) -> bool {
        self.r#type.is_pointer()
    }

    pub fn is_group(&self) -> bool {
        matches!(self.r#type, Type::Group(_))
    }

    pub fn is_nullable(&self) -> bool {
        self.is_group() && self.annotations.contains(&Annotation::Nullable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_kinds() {
        assert!(Type::Text.is_pointer());
        assert!(Type::Data.is_pointer());
        assert!(Type::List(Box::new(Type::Int64)).is_pointer());
        assert!(Type::Struct(NodeId(0)).is_pointer());
        assert!(!Type::Group(NodeId(0)).is_pointer());
        assert!(!Type::Int64.is_pointer());
    }

    #[test]
    fn data_widths() {
        assert_eq!(Type::Bool.byte_width(), 0);
        assert_eq!(Type::Bool.lg_bits(), Some(0));
        assert_eq!(Type::Int8.byte_width(), 1);
        assert_eq!(Type::Enum(EnumId(0)).byte_width(), 2);
        assert_eq!(Type::Float32.byte_width(), 4);
        assert_eq!(Type::UInt64.byte_width(), 8);
        assert_eq!(Type::Void.lg_bits(), None);
    }

    #[test]
    fn list_display() {
        let r#type = Type::List(Box::new(Type::List(Box::new(Type::Int16))));
        assert_eq!(r#type.to_string(), "List(List(Int16))");
    }
}
