//! A listing of compiled modules.
//!
//! The listing shows every struct's layout constants, the aliases of its
//! nested types, its union tag, where each field is stored, and the
//! constructors and representation generated for it.
//!
//! ```
//! use capstruct::compile::compile;
//! use capstruct::pretty::Context;
//! use capstruct::surface::parse_schema;
//!
//! let schema = parse_schema(0, "struct Point { x @0 :Int64; y @1 :Int64; }").unwrap();
//! let module = compile(&schema).unwrap();
//!
//! let doc = Context::new(&module).module();
//! println!("{}", doc.pretty(80));
//! ```

use pretty::RcDoc;

use crate::compile::repr::Presence;
use crate::compile::structor::{Param, Structor};
use crate::compile::union::UnionTag;
use crate::module::{Accessor, AccessorKind, Constructors, EnumType, Module, StructType};
use crate::value::Input;

const INDENT: isize = 4;

pub struct Context<'module> {
    module: &'module Module,
}

impl<'module> Context<'module> {
    pub fn new(module: &'module Module) -> Context<'module> {
        Context { module }
    }

    pub fn module(&self) -> RcDoc<'module> {
        let enums = self.module.enum_types().iter().map(|ty| self.enum_type(ty));
        let structs = self.module.struct_types().map(|(_, ty)| self.struct_type(ty));
        let separator = RcDoc::hardline().append(RcDoc::hardline());
        RcDoc::intersperse(enums.chain(structs), separator)
    }

    fn block(
        &self,
        header: RcDoc<'module>,
        lines: Vec<RcDoc<'module>>,
    ) -> RcDoc<'module> {
        if lines.is_empty() {
            return RcDoc::concat([header, RcDoc::text(" {}")]);
        }
        RcDoc::concat([
            header,
            RcDoc::text(" {"),
            RcDoc::concat([
                RcDoc::hardline(),
                RcDoc::intersperse(lines, RcDoc::hardline()),
            ])
            .nest(INDENT),
            RcDoc::hardline(),
            RcDoc::text("}"),
        ])
    }

    fn enum_type(&self, ty: &'module EnumType) -> RcDoc<'module> {
        let enumerants = ty.enumerants.iter().enumerate().map(|(ordinal, name)| {
            RcDoc::text(format!("{name} = {ordinal};"))
        });
        self.block(
            RcDoc::text(format!("enum {}", ty.name)),
            enumerants.collect(),
        )
    }

    fn struct_type(&self, ty: &'module StructType) -> RcDoc<'module> {
        let keyword = match ty.is_group() {
            true => "group",
            false => "struct",
        };

        let mut lines = vec![
            RcDoc::text(format!("data_size = {};", ty.data_size())),
            RcDoc::text(format!("ptrs_size = {};", ty.ptrs_size())),
        ];
        lines.extend(ty.nested().iter().map(|(alias, id)| {
            let target = self.module.struct_type(*id).name();
            RcDoc::text(format!("alias {alias} = {target};"))
        }));
        if let Some(tag) = ty.union() {
            lines.push(self.tag(tag));
        }
        lines.extend(ty.fields().iter().map(|field| self.field(field)));
        match ty.constructors() {
            Constructors::Plain(structor) => lines.push(self.constructor("new", structor)),
            Constructors::Union(union) => {
                let mandatory = union.mandatory().iter().map(|name| RcDoc::text(name.clone()));
                lines.push(RcDoc::concat([
                    RcDoc::text("new(one of "),
                    RcDoc::intersperse(
                        union.factories().iter().map(|f| RcDoc::text(f.member().to_owned())),
                        RcDoc::text(" | "),
                    ),
                    RcDoc::concat(mandatory.map(|name| RcDoc::text(", ").append(name))),
                    RcDoc::text(");"),
                ]));
                lines.extend(union.factories().iter().map(|factory| {
                    let name = format!("new_{}", factory.member());
                    self.constructor(&name, factory.structor())
                }));
            }
        }
        lines.push(self.repr_plan(ty));

        self.block(RcDoc::text(format!("{keyword} {}", ty.name())), lines)
    }

    fn tag(&self, tag: &'module UnionTag) -> RcDoc<'module> {
        let start = tag.offset();
        let members = tag.names().iter().enumerate().map(|(value, name)| {
            RcDoc::text(format!("{name} = {value};"))
        });
        self.block(
            RcDoc::text(format!("tag @ data[{start}..{}]", start + 2)),
            members.collect(),
        )
    }

    fn field(&self, field: &'module Accessor) -> RcDoc<'module> {
        let r#type = match field.kind() {
            AccessorKind::Group(id) => format!("group {}", self.module.struct_type(*id).name()),
            AccessorKind::Nullable(nullable) => {
                format!("nullable {}", nullable.value().type_name())
            }
            _ => field.type_name().to_owned(),
        };
        let mut doc = RcDoc::text(format!("{} :{}", field.name(), r#type));

        if let Some(location) = location(field.kind()) {
            doc = doc.append(RcDoc::text(format!(" @ {location}")));
        }
        if let AccessorKind::Nullable(nullable) = field.kind() {
            if let Some(location) = location(nullable.flag().kind()) {
                doc = doc.append(RcDoc::text(format!(", null @ {location}")));
            }
        }
        if let Some(default) = field.default() {
            doc = doc.append(RcDoc::text(format!(" = {}", self.default(field, default))));
        }
        if let Some(discriminant) = field.discriminant() {
            doc = doc.append(RcDoc::text(format!(" when tag == {discriminant}")));
        }
        doc.append(RcDoc::text(";"))
    }

    fn default(&self, field: &Accessor, default: &Input) -> String {
        match (field.kind(), default) {
            (AccessorKind::Enum { r#enum, .. }, Input::Enum(value)) => {
                match self.module.enum_type(*r#enum).enumerant(*value) {
                    Some(name) => name.to_owned(),
                    None => input(default),
                }
            }
            _ => input(default),
        }
    }

    fn constructor(&self, name: &str, structor: &'module Structor) -> RcDoc<'module> {
        let params = structor.params().iter().map(param);
        let mut doc = RcDoc::concat([
            RcDoc::text(format!("{name}(")),
            RcDoc::intersperse(params, RcDoc::text(", ")),
            RcDoc::text(")"),
        ]);
        if let Some(tag) = structor.tag() {
            doc = doc.append(RcDoc::text(format!(" sets tag = {}", tag.value)));
        }
        doc.append(RcDoc::text(";"))
    }

    fn repr_plan(&self, ty: &'module StructType) -> RcDoc<'module> {
        let parts = ty.repr_plan().iter().map(|part| {
            let name = ty.fields()[part.field()].name();
            RcDoc::text(match part.presence() {
                Presence::Always => name.to_owned(),
                Presence::IfSet => format!("{name} if set"),
                Presence::IfActive(value) => format!("{name} if tag == {value}"),
                Presence::IfActiveOr(value, placeholder) => {
                    format!("{name} if tag == {value} else {placeholder}")
                }
            })
        });
        RcDoc::concat([
            RcDoc::text("shortrepr("),
            RcDoc::intersperse(parts, RcDoc::text(", ")),
            RcDoc::text(");"),
        ])
    }
}

fn param<'module>(param: &'module Param) -> RcDoc<'module> {
    match param.is_mandatory() {
        true => RcDoc::text(param.name().to_owned()),
        false => RcDoc::text(format!("{}?", param.name())),
    }
}

fn location(kind: &AccessorKind) -> Option<String> {
    let bytes = |byte: u32, width: u32| format!("data[{byte}..{}]", byte + width);
    match kind {
        AccessorKind::Bool { bit, .. } => Some(format!("data[bit {bit}]")),
        AccessorKind::Int { width, byte, .. } | AccessorKind::UInt { width, byte, .. } => {
            Some(bytes(*byte, *width))
        }
        AccessorKind::Float32 { byte, .. } => Some(bytes(*byte, 4)),
        AccessorKind::Float64 { byte, .. } => Some(bytes(*byte, 8)),
        AccessorKind::Enum { byte, .. } => Some(bytes(*byte, 2)),
        AccessorKind::Pointer(slot) => Some(format!("ptrs[{}]", slot.slot())),
        AccessorKind::Nullable(nullable) => location(nullable.value().kind()),
        AccessorKind::Void | AccessorKind::Group(_) => None,
    }
}

/// Defaults as they would be written in a schema.
fn input(literal: &Input) -> String {
    match literal {
        Input::Null => "null".to_owned(),
        Input::Void => "void".to_owned(),
        Input::Bool(value) => value.to_string(),
        Input::Int(value) => value.to_string(),
        Input::UInt(value) => value.to_string(),
        Input::Float32(value) => format!("{value:?}"),
        Input::Float64(value) => format!("{value:?}"),
        Input::Enum(value) => format!("#{value}"),
        Input::Text(value) => format!("{value:?}"),
        Input::Data(value) => format!("\"{}\"", value.escape_ascii()),
        Input::List(items) => {
            let items = items.iter().map(input).collect::<Vec<_>>();
            format!("[{}]", items.join(", "))
        }
        Input::Record(args) => {
            let entries = args.iter().map(|(name, value)| format!("{name} = {}", input(value)));
            format!("({})", entries.collect::<Vec<_>>().join(", "))
        }
        Input::Tuple(items) => {
            let items = items.iter().map(input).collect::<Vec<_>>();
            format!("({})", items.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::surface::parse_schema;
    use crate::value::Args;

    fn listing(source: &str) -> String {
        let module = compile(&parse_schema(0, source).unwrap()).unwrap();
        let doc = Context::new(&module).module();
        format!("{}", doc.pretty(80))
    }

    #[test]
    fn point() {
        pretty_assertions::assert_eq!(
            listing("struct Point { x @0 :Int64; y @1 :Int64 = 3; }"),
            "\
struct Point {
    data_size = 2;
    ptrs_size = 0;
    x :Int64 @ data[0..8];
    y :Int64 @ data[8..16] = 3;
    new(x?, y?);
    shortrepr(x, y);
}",
        );
    }

    #[test]
    fn union() {
        pretty_assertions::assert_eq!(
            listing(
                "struct Shape {
                    area @0 :Float64;
                    union {
                        square @1 :Float64;
                        circle @2 :Text;
                    }
                }"
            ),
            "\
struct Shape {
    data_size = 3;
    ptrs_size = 1;
    tag @ data[16..18] {
        square = 0;
        circle = 1;
    }
    area :Float64 @ data[0..8];
    square :Float64 @ data[8..16] when tag == 0;
    circle :Text @ ptrs[0] when tag == 1;
    new(one of square | circle, area);
    new_square(square?, area?) sets tag = 0;
    new_circle(circle?, area?) sets tag = 1;
    shortrepr(area, square if tag == 0, circle if tag == 1 else \"\");
}",
        );
    }

    #[test]
    fn input_defaults() {
        assert_eq!(input(&Input::Data(b"a\n".to_vec())), r#""a\n""#);
        assert_eq!(input(&Input::Float64(1.0)), "1.0");
        assert_eq!(
            input(&Input::List(vec![Input::Int(1), Input::Int(-2)])),
            "[1, -2]"
        );
        assert_eq!(
            input(&Input::Record(Args::new().with("a", Input::List(vec![Input::Bool(true)])))),
            "(a = [true])"
        );
        assert_eq!(
            input(&Input::Tuple(vec![Input::Text("x".to_owned()), Input::Null])),
            r#"("x", null)"#
        );
    }
}
