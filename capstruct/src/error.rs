//! Errors raised while compiling a schema and while constructing structs.

use itertools::Itertools;

pub use crate::binary::ReadError;

/// A failure that aborts the compilation of a whole schema.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// The schema is well formed, but uses a feature incorrectly.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{field}: nullable groups must have exactly two fields: \"isNull\" and \"value\"")]
    NullableShape { field: String },
    #[error("{field}: cannot use pointer types for nullable values. Pointers are already nullable.")]
    NullablePointer { field: String },
}

/// The struct tree handed to the compiler breaks one of its invariants.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{struct_name}: union members `{first}` and `{second}` share discriminant {value}")]
    DuplicateDiscriminant {
        struct_name: String,
        first: String,
        second: String,
        value: u16,
    },
    #[error("{struct_name}: discriminant {value} of `{field}` is out of range 0..{count}")]
    DiscriminantOutOfRange {
        struct_name: String,
        field: String,
        value: u16,
        count: u16,
    },
    #[error("{struct_name}: no union member has discriminant {value}")]
    MissingDiscriminant { struct_name: String, value: u16 },
    #[error("`{name}` is declared more than once")]
    DuplicateName { name: String },
    #[error("{struct_name}: node {node} was referenced before being declared")]
    Undeclared { struct_name: String, node: u32 },
    #[error("{struct_name}: group {node} was referenced before being defined")]
    Undefined { struct_name: String, node: u32 },
    #[error("{field}: default value does not match the field type")]
    InvalidDefault { field: String },
    #[error("{struct_name}: `{field}` lies outside the struct's data or pointer region")]
    OutsideRegion { struct_name: String, field: String },
}

/// A failure while building a new struct. Previously built structs are never
/// affected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConstructError {
    #[error("{field}: missing required argument")]
    MissingArgument { field: String },
    #[error("{field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },
    #[error("one of the following args is required: {}", .members.iter().join(", "))]
    MissingUnionMember { members: Vec<String> },
    #[error("got multiple values for the union tag: {first}, {second}")]
    ConflictingUnionMembers { first: String, second: String },
    #[error("{struct_name}: unexpected argument `{name}`")]
    UnknownArgument { struct_name: String, name: String },
    #[error("{struct_name}: no union member named `{member}`")]
    UnknownMember { struct_name: String, member: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_messages() {
        let shape = SchemaError::NullableShape {
            field: "x".to_owned(),
        };
        assert_eq!(
            shape.to_string(),
            "x: nullable groups must have exactly two fields: \"isNull\" and \"value\"",
        );
        let pointer = CompileError::from(SchemaError::NullablePointer {
            field: "x".to_owned(),
        });
        assert_eq!(
            pointer.to_string(),
            "x: cannot use pointer types for nullable values. Pointers are already nullable.",
        );
    }

    #[test]
    fn union_member_messages() {
        let missing = ConstructError::MissingUnionMember {
            members: vec!["square".to_owned(), "circle".to_owned()],
        };
        assert_eq!(
            missing.to_string(),
            "one of the following args is required: square, circle",
        );
        let conflicting = ConstructError::ConflictingUnionMembers {
            first: "square".to_owned(),
            second: "circle".to_owned(),
        };
        assert_eq!(
            conflicting.to_string(),
            "got multiple values for the union tag: square, circle",
        );
    }
}
