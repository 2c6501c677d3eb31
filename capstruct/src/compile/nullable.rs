//! Groups annotated as nullable.
//!
//! A nullable group holds exactly two fields, `isNull` and `value`. The group
//! is still stored as-is, but its accessor reads as [`Value::Null`] while the
//! flag is set, and as the value otherwise.

use crate::binary::{Builder, ReadError};
use crate::compile::structor::{self, Region};
use crate::error::{ConstructError, SchemaError};
use crate::module::{Accessor, AccessorKind, Module, StructId};
use crate::reader::StructReader;
use crate::schema::{Field, StructNode};
use crate::value::{Input, Value};

const IS_NULL: &str = "isNull";
const VALUE: &str = "value";

#[derive(Clone, Debug)]
pub struct Nullable {
    pub(crate) group: StructId,
    pub(crate) flag: Accessor,
    pub(crate) value: Accessor,
}

/// Check the shape of a nullable group, returning its `isNull` and `value`
/// fields.
pub(crate) fn validate<'schema>(
    field: &Field,
    group: &'schema StructNode,
) -> Result<(&'schema Field, &'schema Field), SchemaError> {
    let shape_error = || SchemaError::NullableShape {
        field: field.name.clone(),
    };

    let (flag, value) = match group.fields.as_slice() {
        [first, second] if first.name == IS_NULL && second.name == VALUE => (first, second),
        [first, second] if first.name == VALUE && second.name == IS_NULL => (second, first),
        _ => return Err(shape_error()),
    };
    if value.is_pointer() {
        return Err(SchemaError::NullablePointer {
            field: field.name.clone(),
        });
    }

    Ok((flag, value))
}

impl Nullable {
    pub fn group(&self) -> StructId {
        self.group
    }

    pub fn flag(&self) -> &Accessor {
        &self.flag
    }

    pub fn value(&self) -> &Accessor {
        &self.value
    }

    /// Any non-zero flag marks the value as absent.
    pub(crate) fn is_null<'a>(&'a self, reader: &StructReader<'a>) -> Result<bool, ReadError> {
        let flag = match &self.flag.kind {
            AccessorKind::Bool { .. }
            | AccessorKind::Int { .. }
            | AccessorKind::UInt { .. }
            | AccessorKind::Float32 { .. }
            | AccessorKind::Float64 { .. }
            | AccessorKind::Enum { .. } => reader.read(&self.flag)?,
            _ => return Ok(false),
        };
        Ok(match flag {
            Value::Bool(flag) => flag,
            Value::Int(flag) => flag != 0,
            Value::UInt(flag) => flag != 0,
            Value::Float32(flag) => flag != 0.0,
            Value::Float64(flag) => flag != 0.0,
            Value::Enum(flag) => flag != 0,
            _ => false,
        })
    }

    pub(crate) fn read<'a>(&'a self, reader: &StructReader<'a>) -> Result<Value<'a>, ReadError> {
        if self.is_null(reader)? {
            return Ok(Value::Null);
        }
        reader.read(&self.value)
    }

    /// Write a nullable field. Both `None` (unset) and [`Input::Null`] set
    /// the null flag and leave the value zeroed.
    pub(crate) fn write(
        &self,
        module: &Module,
        builder: &mut Builder,
        region: Region,
        input: Option<&Input>,
    ) -> Result<(), ConstructError> {
        match input {
            None | Some(Input::Null) => {
                structor::write_field(module, builder, region, &self.flag, &self.flag_input(true))
            }
            Some(input) => {
                structor::write_field(module, builder, region, &self.flag, &self.flag_input(false))?;
                structor::write_field(module, builder, region, &self.value, input)
            }
        }
    }

    fn flag_input(&self, is_null: bool) -> Input {
        match self.flag.kind {
            AccessorKind::Bool { .. } => Input::Bool(is_null),
            AccessorKind::Enum { .. } => Input::Enum(u16::from(is_null)),
            AccessorKind::UInt { .. } => Input::UInt(u64::from(is_null)),
            AccessorKind::Float32 { .. } => Input::Float32(f32::from(u8::from(is_null))),
            AccessorKind::Float64 { .. } => Input::Float64(f64::from(u8::from(is_null))),
            AccessorKind::Void => Input::Void,
            _ => Input::Int(i64::from(is_null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Annotation, NodeId, Type};

    fn field(name: &str, r#type: Type) -> Field {
        Field {
            name: name.to_owned(),
            ordinal: None,
            r#type,
            offset: 0,
            default: None,
            discriminant_value: None,
            annotations: Vec::new(),
        }
    }

    fn group(fields: Vec<Field>) -> StructNode {
        StructNode {
            id: NodeId(1),
            name: "x".to_owned(),
            parent: Some(NodeId(0)),
            children: Vec::new(),
            data_word_count: 2,
            pointer_count: 1,
            discriminant_count: 0,
            discriminant_offset: 0,
            is_group: true,
            fields,
        }
    }

    fn nullable_field() -> Field {
        let mut field = field("x", Type::Group(NodeId(1)));
        field.annotations.push(Annotation::Nullable);
        field
    }

    #[test]
    fn accepts_either_order() {
        let group = group(vec![field("value", Type::Int64), field("isNull", Type::UInt8)]);
        let (flag, value) = validate(&nullable_field(), &group).unwrap();
        assert_eq!(flag.name, "isNull");
        assert_eq!(value.name, "value");
    }

    #[test]
    fn rejects_wrong_shape() {
        let group = group(vec![
            field("isNull", Type::UInt8),
            field("value", Type::Int64),
            field("extra", Type::Int64),
        ]);
        assert_eq!(
            validate(&nullable_field(), &group).unwrap_err().to_string(),
            "x: nullable groups must have exactly two fields: \"isNull\" and \"value\"",
        );

        let group = group_with_names("isNull", "val");
        assert!(matches!(
            validate(&nullable_field(), &group),
            Err(SchemaError::NullableShape { .. }),
        ));
    }

    fn group_with_names(first: &str, second: &str) -> StructNode {
        group(vec![field(first, Type::UInt8), field(second, Type::Int64)])
    }

    #[test]
    fn rejects_pointer_values() {
        let group = group(vec![field("isNull", Type::UInt8), field("value", Type::Text)]);
        assert_eq!(
            validate(&nullable_field(), &group).unwrap_err().to_string(),
            "x: cannot use pointer types for nullable values. Pointers are already nullable.",
        );
    }
}
