use codespan_reporting::diagnostic::{Diagnostic, Label};

use crate::source::{ByteRange, FileId};

/// Elaboration diagnostic messages.
#[derive(Debug, Clone)]
pub enum Message {
    /// The name was not declared in any enclosing scope.
    UnknownType {
        range: ByteRange,
        name: String,
        suggestion: Option<String>,
    },
    /// A qualified name passed through something without nested types.
    NotAScope {
        range: ByteRange,
        name: String,
    },
    DuplicateName {
        range: ByteRange,
        previous: ByteRange,
        name: String,
    },
    DuplicateOrdinal {
        range: ByteRange,
        previous: ByteRange,
        ordinal: u16,
    },
    MissingOrdinal {
        range: ByteRange,
        ordinal: u16,
    },
    UnionTooSmall {
        range: ByteRange,
    },
    UnexpectedUnion {
        range: ByteRange,
    },
    NestedDeclaration {
        range: ByteRange,
    },
    EmptyGroup {
        range: ByteRange,
    },
    MismatchedDefault {
        range: ByteRange,
        expected_type: String,
    },
    IntegerOutOfRange {
        range: ByteRange,
        expected_type: String,
    },
    UnknownEnumerant {
        range: ByteRange,
        name: String,
        enum_name: String,
        suggestion: Option<String>,
    },
    UnknownField {
        range: ByteRange,
        name: String,
        struct_name: String,
    },
}

impl Message {
    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        let primary_label = |range: &ByteRange| Label::primary(range.file_id(), *range);
        let secondary_label = |range: &ByteRange| Label::secondary(range.file_id(), *range);
        let help = |suggestion: &Option<String>| match suggestion {
            Some(suggestion) => vec![format!("help: did you mean `{suggestion}`?")],
            None => Vec::new(),
        };

        match self {
            Message::UnknownType {
                range,
                name,
                suggestion,
            } => Diagnostic::error()
                .with_message(format!("cannot find type `{name}` in this scope"))
                .with_labels(vec![primary_label(range).with_message("unknown type")])
                .with_notes(help(suggestion)),
            Message::NotAScope { range, name } => Diagnostic::error()
                .with_message(format!("`{name}` does not contain nested types"))
                .with_labels(vec![primary_label(range)]),
            Message::DuplicateName {
                range,
                previous,
                name,
            } => Diagnostic::error()
                .with_message(format!("the name `{name}` is defined multiple times"))
                .with_labels(vec![
                    primary_label(range).with_message("redefined here"),
                    secondary_label(previous).with_message("previously defined here"),
                ]),
            Message::DuplicateOrdinal {
                range,
                previous,
                ordinal,
            } => Diagnostic::error()
                .with_message(format!("duplicate ordinal @{ordinal}"))
                .with_labels(vec![
                    primary_label(range).with_message("reused here"),
                    secondary_label(previous).with_message("first used here"),
                ]),
            Message::MissingOrdinal { range, ordinal } => Diagnostic::error()
                .with_message(format!("skipped ordinal @{ordinal}"))
                .with_labels(vec![primary_label(range)])
                .with_notes(vec![
                    "ordinals must be sequential, starting from zero".to_owned(),
                ]),
            Message::UnionTooSmall { range } => Diagnostic::error()
                .with_message("union must have at least two members")
                .with_labels(vec![primary_label(range)]),
            Message::UnexpectedUnion { range } => Diagnostic::error()
                .with_message("unexpected unnamed union")
                .with_labels(vec![primary_label(range)])
                .with_notes(vec![
                    "a struct or group may contain at most one unnamed union, and unions may not directly contain unnamed unions".to_owned(),
                ]),
            Message::NestedDeclaration { range } => Diagnostic::error()
                .with_message("nested declarations are only allowed directly inside structs")
                .with_labels(vec![primary_label(range)]),
            Message::EmptyGroup { range } => Diagnostic::error()
                .with_message("union members must contain at least one field")
                .with_labels(vec![primary_label(range)]),
            Message::MismatchedDefault {
                range,
                expected_type,
            } => Diagnostic::error()
                .with_message("mismatched types in default value")
                .with_labels(vec![
                    primary_label(range).with_message(format!("expected `{expected_type}`"))
                ]),
            Message::IntegerOutOfRange {
                range,
                expected_type,
            } => Diagnostic::error()
                .with_message(format!("integer does not fit in `{expected_type}`"))
                .with_labels(vec![primary_label(range)]),
            Message::UnknownEnumerant {
                range,
                name,
                enum_name,
                suggestion,
            } => Diagnostic::error()
                .with_message(format!("no enumerant named `{name}` in `{enum_name}`"))
                .with_labels(vec![primary_label(range).with_message("unknown enumerant")])
                .with_notes(help(suggestion)),
            Message::UnknownField {
                range,
                name,
                struct_name,
            } => Diagnostic::error()
                .with_message(format!("`{struct_name}` has no field named `{name}`"))
                .with_labels(vec![primary_label(range).with_message("unknown field")]),
        }
    }
}
