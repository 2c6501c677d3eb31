//! The surface language: a subset of the Cap'n Proto schema language.
//!
//! Source files are lexed, parsed into the syntax tree defined here, and then
//! elaborated into a [`Schema`], which resolves names and lays out fields.

use codespan_reporting::diagnostic::Diagnostic;

use crate::schema::Schema;
use crate::source::{ByteRange, FileId};

pub mod elaboration;
mod lexer;
mod parser;

#[derive(Clone, Debug)]
pub struct Ident {
    pub range: ByteRange,
    pub name: String,
}

/// A parsed schema file.
#[derive(Clone, Debug)]
pub struct File {
    /// The `@0x...;` id of the file.
    pub id: Option<u64>,
    pub items: Vec<Item>,
}

#[derive(Clone, Debug)]
pub enum Item {
    Struct(StructDecl),
    Enum(EnumDecl),
}

#[derive(Clone, Debug)]
pub struct StructDecl {
    pub range: ByteRange,
    pub name: Ident,
    pub members: Vec<Member>,
}

#[derive(Clone, Debug)]
pub struct EnumDecl {
    pub range: ByteRange,
    pub name: Ident,
    pub enumerants: Vec<Enumerant>,
}

#[derive(Clone, Debug)]
pub struct Enumerant {
    pub name: Ident,
    pub ordinal: Ordinal,
}

#[derive(Copy, Clone, Debug)]
pub struct Ordinal {
    pub range: ByteRange,
    pub value: u16,
}

#[derive(Clone, Debug)]
pub enum Member {
    Field(FieldDecl),
    Group(GroupDecl),
    Union(UnionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
}

/// `name @N :Type = default $annotation;`
#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub range: ByteRange,
    pub name: Ident,
    pub ordinal: Ordinal,
    pub r#type: TypeExpr,
    pub default: Option<Literal>,
    pub annotations: Vec<AnnotationUse>,
}

/// `name :group $annotation { ... }`
#[derive(Clone, Debug)]
pub struct GroupDecl {
    pub range: ByteRange,
    pub name: Ident,
    pub annotations: Vec<AnnotationUse>,
    pub members: Vec<Member>,
}

/// `union { ... }`, or `name :union { ... }` when named.
#[derive(Clone, Debug)]
pub struct UnionDecl {
    pub range: ByteRange,
    pub name: Option<Ident>,
    pub annotations: Vec<AnnotationUse>,
    pub members: Vec<Member>,
}

#[derive(Clone, Debug)]
pub enum TypeExpr {
    /// A builtin or a declared type, possibly qualified: `Outer.Inner`.
    Name(Vec<Ident>),
    List(ByteRange, Box<TypeExpr>),
}

impl TypeExpr {
    pub fn range(&self) -> ByteRange {
        match self {
            TypeExpr::Name(path) => match (path.first(), path.last()) {
                (Some(first), Some(last)) => first.range.merge(last.range),
                // Parsed paths always have at least one segment.
                _ => ByteRange::new(0, 0, 0),
            },
            TypeExpr::List(range, _) => *range,
        }
    }
}

/// `$Path.to.annotation(argument)`
#[derive(Clone, Debug)]
pub struct AnnotationUse {
    pub range: ByteRange,
    pub path: Vec<Ident>,
    pub argument: Option<Literal>,
}

impl AnnotationUse {
    pub fn dotted_name(&self) -> String {
        let names = self.path.iter().map(|ident| ident.name.as_str());
        names.collect::<Vec<_>>().join(".")
    }
}

#[derive(Clone, Debug)]
pub struct Literal {
    pub range: ByteRange,
    pub kind: LiteralKind,
}

#[derive(Clone, Debug)]
pub enum LiteralKind {
    Integer { negative: bool, magnitude: u64 },
    Float(f64),
    Bool(bool),
    /// `void`, `inf`, `nan`, or an enumerant.
    Name(String),
    Text(String),
    List(Vec<Literal>),
    Record(Vec<(Ident, Literal)>),
}

/// Parse a schema file.
pub fn parse(file_id: FileId, source: &str) -> Result<File, Diagnostic<FileId>> {
    parser::parse(file_id, source)
}

/// Parse and elaborate a schema file.
pub fn parse_schema(file_id: FileId, source: &str) -> Result<Schema, Vec<Diagnostic<FileId>>> {
    let file = parse(file_id, source).map_err(|diagnostic| vec![diagnostic])?;
    elaboration::elaborate(file_id, &file)
}
