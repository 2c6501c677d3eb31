//! Short textual representations of structs.

use std::fmt::Write;

use itertools::Itertools;

use crate::binary::ReadError;
use crate::module::{Accessor, AccessorKind, ElementType, Module, PointerTarget};
use crate::reader::{ListReader, StructReader};
use crate::schema::EnumId;
use crate::value::Value;

/// When a field shows up in the representation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Presence {
    Always,
    /// Pointer fields, only when set.
    IfSet,
    /// Non-pointer union members, only when active.
    IfActive(u16),
    /// Pointer union members, only when active. An unset pointer renders as
    /// the placeholder.
    IfActiveOr(u16, &'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReprPart {
    /// Index into the struct's fields.
    pub(crate) field: usize,
    pub(crate) presence: Presence,
}

impl ReprPart {
    pub fn field(&self) -> usize {
        self.field
    }

    pub fn presence(&self) -> Presence {
        self.presence
    }
}

pub(crate) fn plan(fields: &[Accessor]) -> Vec<ReprPart> {
    (fields.iter().enumerate())
        .map(|(index, field)| {
            let presence = match (&field.kind, field.discriminant) {
                (AccessorKind::Pointer(slot), Some(discriminant)) => {
                    Presence::IfActiveOr(discriminant, placeholder(&slot.target))
                }
                (AccessorKind::Pointer(_), None) => Presence::IfSet,
                (_, Some(discriminant)) => Presence::IfActive(discriminant),
                (_, None) => Presence::Always,
            };
            ReprPart {
                field: index,
                presence,
            }
        })
        .collect()
}

fn placeholder(target: &PointerTarget) -> &'static str {
    match target {
        PointerTarget::Struct(_) => "()",
        PointerTarget::Text | PointerTarget::Data => "\"\"",
        PointerTarget::List(_) => "[]",
    }
}

/// Render a struct as `(name = value, ...)`.
pub(crate) fn render(reader: &StructReader<'_>) -> Result<String, ReadError> {
    let ty = reader.struct_type();
    let tag = match ty.union() {
        Some(_) => Some(reader.which()?),
        None => None,
    };

    let mut parts = Vec::with_capacity(ty.repr_plan().len());
    for part in ty.repr_plan() {
        let field = &ty.fields()[part.field];
        match part.presence {
            Presence::Always => {}
            Presence::IfSet if !reader.has_value(field)? => continue,
            Presence::IfSet => {}
            Presence::IfActive(discriminant) if tag != Some(discriminant) => continue,
            Presence::IfActive(_) => {}
            Presence::IfActiveOr(discriminant, _) if tag != Some(discriminant) => continue,
            Presence::IfActiveOr(_, placeholder) if !reader.has_value(field)? => {
                parts.push(format!("{} = {}", field.name(), placeholder));
                continue;
            }
            Presence::IfActiveOr(..) => {}
        }

        let mut out = format!("{} = ", field.name());
        write_value(reader.module(), &reader.read(field)?, enum_of(field), &mut out)?;
        parts.push(out);
    }

    Ok(format!("({})", parts.iter().format(", ")))
}

fn enum_of(field: &Accessor) -> Option<EnumId> {
    match &field.kind {
        AccessorKind::Enum { r#enum, .. } => Some(*r#enum),
        AccessorKind::Nullable(nullable) => enum_of(nullable.value()),
        _ => None,
    }
}

fn write_value(
    module: &Module,
    value: &Value<'_>,
    r#enum: Option<EnumId>,
    out: &mut String,
) -> Result<(), ReadError> {
    // Writing to a `String` cannot fail.
    let _ = match value {
        Value::Null => write!(out, "null"),
        Value::Void => write!(out, "void"),
        Value::Bool(value) => write!(out, "{value}"),
        Value::Int(value) => write!(out, "{value}"),
        Value::UInt(value) => write!(out, "{value}"),
        Value::Float32(value) => write!(out, "{value:?}"),
        Value::Float64(value) => write!(out, "{value:?}"),
        Value::Enum(value) => {
            let name = r#enum.and_then(|id| module.enum_type(id).enumerant(*value));
            match name {
                Some(name) => write!(out, "{name}"),
                None => write!(out, "{value}"),
            }
        }
        Value::Text(text) => write!(out, "{text:?}"),
        Value::Data(data) => write!(out, "\"{}\"", data.escape_ascii()),
        Value::List(list) => return write_list(module, list, out),
        Value::Struct(reader) => write!(out, "{}", render(reader)?),
    };
    Ok(())
}

fn write_list(module: &Module, list: &ListReader<'_>, out: &mut String) -> Result<(), ReadError> {
    let r#enum = match list.element_type() {
        ElementType::Enum(id) => Some(*id),
        _ => None,
    };

    out.push('[');
    for (index, item) in list.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_value(module, &item?, r#enum, out)?;
    }
    out.push(']');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accessor(name: &str, kind: AccessorKind, discriminant: Option<u16>) -> Accessor {
        Accessor {
            name: name.to_owned(),
            kind,
            discriminant,
            default: None,
            type_name: String::new(),
        }
    }

    fn text(slot: u16) -> AccessorKind {
        AccessorKind::Pointer(crate::module::PointerSlot {
            slot,
            target: PointerTarget::Text,
            default: None,
        })
    }

    #[test]
    fn presence_plan() {
        let int = || AccessorKind::Int {
            width: 8,
            byte: 0,
            default: 0,
        };
        let fields = [
            accessor("x", int(), None),
            accessor("name", text(0), None),
            accessor("square", int(), Some(0)),
            accessor("label", text(1), Some(1)),
        ];
        let presences = plan(&fields).into_iter().map(|part| part.presence).collect::<Vec<_>>();
        assert_eq!(
            presences,
            [
                Presence::Always,
                Presence::IfSet,
                Presence::IfActive(0),
                Presence::IfActiveOr(1, "\"\""),
            ],
        );
    }
}
