//! Compilation of a [`Schema`] into a [`Module`].
//!
//! Struct types are emitted in two passes over the node tree. The declaration
//! pass registers the name of every node, so that structs can refer to
//! themselves, to each other, and to types declared later in the file. The
//! definition pass then builds the body of each node, children before their
//! parents, so that groups are complete before the struct that contains them.

use fxhash::FxHashMap;

use crate::error::{CompileError, ConfigurationError};
use crate::module::{
    Accessor, AccessorKind, Constructors, ElementType, EnumType, Module, PointerDefault,
    PointerSlot, PointerTarget, StructId, StructType,
};
use crate::schema::{Field, NodeId, Schema, StructNode, Type};
use crate::value::Input;

pub mod nullable;
pub mod repr;
pub mod structor;
pub mod union;

use self::nullable::Nullable;
use self::structor::{Param, Structor};
use self::union::{UnionConstructors, UnionTag};

/// Compile every struct in a schema. Any error aborts the whole schema.
pub fn compile(schema: &Schema) -> Result<Module, CompileError> {
    let mut context = Context::new(schema);
    for node in schema.roots() {
        context.emit_declaration(node)?;
    }
    for node in schema.roots() {
        context.emit_definition(node)?;
    }
    context.finish()
}

enum Slot {
    /// The name is known, but the body is not built yet.
    Declared { name: String, dotname: String },
    Defined(StructType),
}

pub struct Context<'schema> {
    schema: &'schema Schema,
    slots: Vec<Slot>,
    ids: FxHashMap<NodeId, StructId>,
    names: FxHashMap<String, StructId>,
}

impl<'schema> Context<'schema> {
    pub fn new(schema: &'schema Schema) -> Context<'schema> {
        Context {
            schema,
            slots: Vec::new(),
            ids: FxHashMap::default(),
            names: FxHashMap::default(),
        }
    }

    /// The name a node is compiled under, like `Outer_Inner`.
    fn compile_name(&self, node: &StructNode) -> String {
        match node.parent {
            Some(parent) => format!("{}_{}", self.compile_name(self.schema.node(parent)), node.name),
            None => node.name.clone(),
        }
    }

    /// The name a node is known by at runtime, like `Outer.Inner`.
    fn dotname(&self, node: &StructNode) -> String {
        match node.parent {
            Some(parent) => format!("{}.{}", self.dotname(self.schema.node(parent)), node.name),
            None => node.name.clone(),
        }
    }

    /// Register the names of a node and its children, children first.
    pub fn emit_declaration(&mut self, node: &StructNode) -> Result<(), CompileError> {
        let schema = self.schema;
        for child in &node.children {
            self.emit_declaration(schema.node(*child))?;
        }

        let name = self.compile_name(node);
        let dotname = self.dotname(node);
        let id = StructId(self.slots.len() as u32);

        for key in [&name, &dotname] {
            if self.names.insert(key.clone(), id).map_or(false, |other| other != id) {
                return Err(ConfigurationError::DuplicateName { name: key.clone() }.into());
            }
        }
        self.ids.insert(node.id, id);

        tracing::debug!(struct_name = %dotname, id = id.0, "declared struct");
        self.slots.push(Slot::Declared { name, dotname });

        Ok(())
    }

    /// Build the bodies of a node and its children, children first.
    pub fn emit_definition(&mut self, node: &StructNode) -> Result<(), CompileError> {
        let schema = self.schema;
        for child in &node.children {
            self.emit_definition(schema.node(*child))?;
        }

        let id = self.declared(node, node.id)?;
        let (name, dotname) = match &self.slots[id.index()] {
            Slot::Declared { name, dotname } => (name.clone(), dotname.clone()),
            Slot::Defined(ty) => (ty.name.clone(), ty.dotname.clone()),
        };

        let mut nested = Vec::new();
        for child in node.children.iter().map(|child| schema.node(*child)) {
            if !child.is_group {
                nested.push((child.name.clone(), self.declared(node, child.id)?));
            }
        }

        let union = match node.discriminant_count {
            0 => None,
            _ => Some(UnionTag::build(node)?),
        };

        let fields = (node.fields.iter())
            .map(|field| self.accessor(node, field))
            .collect::<Result<Vec<_>, _>>()?;

        let constructors = match &union {
            Some(tag) => Constructors::Union(UnionConstructors::new(
                &dotname,
                &fields,
                node.data_word_count,
                node.pointer_count,
                tag,
            )),
            None => {
                let params = fields.iter().cloned().map(Param::optional).collect();
                let (data_size, ptrs_size) = (node.data_word_count, node.pointer_count);
                Constructors::Plain(Structor::new(&dotname, data_size, ptrs_size, params, None))
            }
        };

        let repr = repr::plan(&fields);

        tracing::debug!(
            struct_name = %dotname,
            data_size = node.data_word_count,
            ptrs_size = node.pointer_count,
            fields = fields.len(),
            "defined struct"
        );

        self.slots[id.index()] = Slot::Defined(StructType {
            name,
            dotname,
            data_size: node.data_word_count,
            ptrs_size: node.pointer_count,
            is_group: node.is_group,
            nested,
            union,
            fields,
            constructors,
            repr,
        });

        Ok(())
    }

    fn finish(self) -> Result<Module, CompileError> {
        let schema = self.schema;
        let types = (self.slots.into_iter().enumerate())
            .map(|(index, slot)| match slot {
                Slot::Defined(ty) => Ok(ty),
                Slot::Declared { dotname, .. } => Err(ConfigurationError::Undefined {
                    struct_name: dotname,
                    node: index as u32,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let enums = (schema.enums.iter())
            .map(|node| EnumType {
                name: node.name.clone(),
                enumerants: node.enumerants.clone(),
            })
            .collect();

        Ok(Module::new(types, self.names, enums))
    }

    /// The id of a node that has been declared.
    fn declared(&self, from: &StructNode, node: NodeId) -> Result<StructId, ConfigurationError> {
        self.ids.get(&node).copied().ok_or_else(|| ConfigurationError::Undeclared {
            struct_name: from.name.clone(),
            node: node.0,
        })
    }

    /// The id of a node that has been fully defined.
    fn defined(&self, from: &StructNode, node: NodeId) -> Result<StructId, ConfigurationError> {
        let id = self.declared(from, node)?;
        match self.slots[id.index()] {
            Slot::Defined(_) => Ok(id),
            Slot::Declared { .. } => Err(ConfigurationError::Undefined {
                struct_name: from.name.clone(),
                node: node.0,
            }),
        }
    }

    fn accessor(&self, node: &StructNode, field: &Field) -> Result<Accessor, CompileError> {
        tracing::trace!(struct_name = %node.name, field = %field.name, "compiling field");

        let invalid_default = || ConfigurationError::InvalidDefault {
            field: field.name.clone(),
        };
        let offset = field.offset;
        let width = field.r#type.byte_width();

        let kind = match &field.r#type {
            Type::Void => AccessorKind::Void,
            Type::Bool => AccessorKind::Bool {
                bit: offset,
                default: match &field.default {
                    None => false,
                    Some(Input::Bool(value)) => *value,
                    Some(_) => return Err(invalid_default().into()),
                },
            },
            Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64 => AccessorKind::Int {
                width,
                byte: offset * width,
                default: match &field.default {
                    None => 0,
                    Some(input) => int_default(input, width).ok_or_else(invalid_default)?,
                },
            },
            Type::UInt8 | Type::UInt16 | Type::UInt32 | Type::UInt64 => AccessorKind::UInt {
                width,
                byte: offset * width,
                default: match &field.default {
                    None => 0,
                    Some(input) => uint_default(input, width).ok_or_else(invalid_default)?,
                },
            },
            Type::Float32 => AccessorKind::Float32 {
                byte: offset * 4,
                default: match &field.default {
                    None => 0.0,
                    Some(Input::Float32(value)) => *value,
                    Some(Input::Float64(value)) => *value as f32,
                    Some(Input::Int(value)) => *value as f32,
                    Some(Input::UInt(value)) => *value as f32,
                    Some(_) => return Err(invalid_default().into()),
                },
            },
            Type::Float64 => AccessorKind::Float64 {
                byte: offset * 8,
                default: match &field.default {
                    None => 0.0,
                    Some(Input::Float32(value)) => f64::from(*value),
                    Some(Input::Float64(value)) => *value,
                    Some(Input::Int(value)) => *value as f64,
                    Some(Input::UInt(value)) => *value as f64,
                    Some(_) => return Err(invalid_default().into()),
                },
            },
            Type::Enum(r#enum) => AccessorKind::Enum {
                byte: offset * 2,
                r#enum: *r#enum,
                default: match &field.default {
                    None => 0,
                    Some(Input::Enum(value)) => *value,
                    Some(input) => uint_default(input, 2).ok_or_else(invalid_default)? as u16,
                },
            },
            Type::Text | Type::Data | Type::List(_) | Type::Struct(_) => {
                AccessorKind::Pointer(PointerSlot {
                    slot: u16::try_from(offset).map_err(|_| self.outside_region(node, field))?,
                    target: self.pointer_target(node, &field.r#type)?,
                    default: (field.default.clone())
                        .filter(|input| *input != Input::Null)
                        .map(PointerDefault::new),
                })
            }
            Type::Group(group) if field.is_nullable() => {
                AccessorKind::Nullable(Box::new(self.nullable(node, field, *group)?))
            }
            Type::Group(group) => AccessorKind::Group(self.defined(node, *group)?),
        };

        self.check_region(node, field, &kind)?;

        Ok(Accessor {
            name: field.name.clone(),
            kind,
            discriminant: field.discriminant_value,
            default: field.default.clone(),
            type_name: self.schema.type_name(&field.r#type),
        })
    }

    fn nullable(
        &self,
        node: &StructNode,
        field: &Field,
        group: NodeId,
    ) -> Result<Nullable, CompileError> {
        let group_node = self.schema.node(group);
        let (flag, value) = nullable::validate(field, group_node)?;
        Ok(Nullable {
            group: self.defined(node, group)?,
            flag: self.accessor(group_node, flag)?,
            value: self.accessor(group_node, value)?,
        })
    }

    fn pointer_target(&self, node: &StructNode, r#type: &Type) -> Result<PointerTarget, ConfigurationError> {
        match r#type {
            Type::Text => Ok(PointerTarget::Text),
            Type::Data => Ok(PointerTarget::Data),
            Type::List(elem) => Ok(PointerTarget::List(Box::new(self.element_type(node, elem)?))),
            Type::Struct(id) => Ok(PointerTarget::Struct(self.declared(node, *id)?)),
            _ => Err(ConfigurationError::Undeclared {
                struct_name: node.name.clone(),
                node: u32::MAX,
            }),
        }
    }

    fn element_type(&self, node: &StructNode, r#type: &Type) -> Result<ElementType, ConfigurationError> {
        Ok(match r#type {
            Type::Void => ElementType::Void,
            Type::Bool => ElementType::Bool,
            Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64 => ElementType::Int(r#type.byte_width()),
            Type::UInt8 | Type::UInt16 | Type::UInt32 | Type::UInt64 => {
                ElementType::UInt(r#type.byte_width())
            }
            Type::Float32 => ElementType::Float32,
            Type::Float64 => ElementType::Float64,
            Type::Enum(id) => ElementType::Enum(*id),
            Type::Text => ElementType::Text,
            Type::Data => ElementType::Data,
            Type::List(elem) => ElementType::List(Box::new(self.element_type(node, elem)?)),
            Type::Struct(id) | Type::Group(id) => ElementType::Struct(self.declared(node, *id)?),
        })
    }

    /// Check that a field lies inside the region its node addresses.
    fn check_region(&self, node: &StructNode, field: &Field, kind: &AccessorKind) -> Result<(), ConfigurationError> {
        let data_bytes = u32::from(node.data_word_count) * 8;
        let fits = match kind {
            AccessorKind::Bool { bit, .. } => bit / 8 < data_bytes,
            AccessorKind::Int { width, byte, .. } | AccessorKind::UInt { width, byte, .. } => {
                byte + width <= data_bytes
            }
            AccessorKind::Float32 { byte, .. } => byte + 4 <= data_bytes,
            AccessorKind::Float64 { byte, .. } => byte + 8 <= data_bytes,
            AccessorKind::Enum { byte, .. } => byte + 2 <= data_bytes,
            AccessorKind::Pointer(slot) => slot.slot < node.pointer_count,
            AccessorKind::Void | AccessorKind::Group(_) | AccessorKind::Nullable(_) => true,
        };
        match fits {
            true => Ok(()),
            false => Err(self.outside_region(node, field)),
        }
    }

    fn outside_region(&self, node: &StructNode, field: &Field) -> ConfigurationError {
        ConfigurationError::OutsideRegion {
            struct_name: self.dotname(node),
            field: field.name.clone(),
        }
    }
}

fn int_default(input: &Input, width: u32) -> Option<i64> {
    let value = match input {
        Input::Int(value) => *value,
        Input::UInt(value) => i64::try_from(*value).ok()?,
        _ => return None,
    };
    let bits = width * 8;
    let fits = bits == 64 || (-(1 << (bits - 1))..(1 << (bits - 1))).contains(&value);
    fits.then_some(value)
}

fn uint_default(input: &Input, width: u32) -> Option<u64> {
    let value = match input {
        Input::UInt(value) => *value,
        Input::Int(value) => u64::try_from(*value).ok()?,
        Input::Enum(value) => u64::from(*value),
        _ => return None,
    };
    let bits = width * 8;
    (bits == 64 || value < (1 << bits)).then_some(value)
}
