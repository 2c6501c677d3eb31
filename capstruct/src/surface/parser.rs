//! A recursive descent parser for schema files.

use codespan_reporting::diagnostic::{Diagnostic, Label};

use crate::source::{ByteRange, FileId};
use crate::surface::lexer::{self, Spanned, Token};
use crate::surface::{
    AnnotationUse, EnumDecl, Enumerant, FieldDecl, File, GroupDecl, Ident, Item, Literal,
    LiteralKind, Member, Ordinal, StructDecl, TypeExpr, UnionDecl,
};

pub fn parse(file_id: FileId, source: &str) -> Result<File, Diagnostic<FileId>> {
    let tokens = lexer::tokens(file_id, source)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| error.to_diagnostic())?;
    let end = source.len() as u32;
    let mut parser = Parser {
        tokens,
        position: 0,
        eof: ByteRange::new(file_id, end, end),
    };
    parser.file()
}

struct Parser<'source> {
    tokens: Vec<Spanned<Token<'source>>>,
    position: usize,
    eof: ByteRange,
}

type ParseResult<T> = Result<T, Diagnostic<FileId>>;

impl<'source> Parser<'source> {
    fn peek(&self) -> Option<&Token<'source>> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token<'source>> {
        self.tokens.get(self.position + n).map(|(token, _)| token)
    }

    fn range(&self) -> ByteRange {
        self.tokens.get(self.position).map_or(self.eof, |(_, range)| *range)
    }

    /// The range of the most recently consumed token.
    fn previous_range(&self) -> ByteRange {
        match self.position.checked_sub(1) {
            Some(position) => self.tokens[position].1,
            None => self.eof,
        }
    }

    fn bump(&mut self) -> Option<Spanned<Token<'source>>> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn check(&self, token: &Token<'_>) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token<'_>) -> bool {
        let matches = self.check(token);
        if matches {
            self.position += 1;
        }
        matches
    }

    fn unexpected(&self, expected: &str) -> Diagnostic<FileId> {
        let range = self.range();
        let found = match self.peek() {
            Some(token) => format!("`{}`", token.description()),
            None => "end of file".to_owned(),
        };
        Diagnostic::error()
            .with_message(format!("unexpected {found}"))
            .with_labels(vec![
                Label::primary(range.file_id(), range).with_message(format!("expected {expected}"))
            ])
    }

    fn expect(&mut self, token: &Token<'_>) -> ParseResult<ByteRange> {
        match self.eat(token) {
            true => Ok(self.previous_range()),
            false => Err(self.unexpected(&format!("`{}`", token.description()))),
        }
    }

    fn ident(&mut self) -> ParseResult<Ident> {
        match self.peek() {
            Some(Token::Name(name)) => {
                let name = (*name).to_owned();
                self.position += 1;
                Ok(Ident {
                    range: self.previous_range(),
                    name,
                })
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    fn integer(&mut self) -> ParseResult<(u64, ByteRange)> {
        match self.peek() {
            Some(Token::IntLiteral(literal)) => {
                let literal = *literal;
                self.position += 1;
                let range = self.previous_range();
                parse_integer(literal)
                    .map(|value| (value, range))
                    .ok_or_else(|| {
                        Diagnostic::error()
                            .with_message("integer literal is too large")
                            .with_labels(vec![Label::primary(range.file_id(), range)])
                    })
            }
            _ => Err(self.unexpected("an integer")),
        }
    }

    fn ordinal(&mut self) -> ParseResult<Ordinal> {
        let start = self.expect(&Token::At)?;
        let (value, range) = self.integer()?;
        let range = start.merge(range);
        let value = u16::try_from(value).map_err(|_| {
            Diagnostic::error()
                .with_message("ordinal is too large")
                .with_labels(vec![Label::primary(range.file_id(), range)])
        })?;
        Ok(Ordinal { range, value })
    }

    fn file(&mut self) -> ParseResult<File> {
        let mut id = None;
        let mut items = Vec::new();

        while let Some(token) = self.peek() {
            match token {
                Token::At => {
                    self.position += 1;
                    id = Some(self.integer()?.0);
                    self.expect(&Token::Semicolon)?;
                }
                Token::KeywordUsing => self.using()?,
                Token::KeywordStruct => items.push(Item::Struct(self.struct_decl()?)),
                Token::KeywordEnum => items.push(Item::Enum(self.enum_decl()?)),
                _ => return Err(self.unexpected("`struct`, `enum` or `using`")),
            }
        }

        Ok(File { id, items })
    }

    /// `using Name = import "file";`, which is accepted and ignored.
    fn using(&mut self) -> ParseResult<()> {
        self.expect(&Token::KeywordUsing)?;
        self.ident()?;
        self.expect(&Token::Equals)?;
        self.expect(&Token::KeywordImport)?;
        match self.bump() {
            Some((Token::StringLiteral(_), _)) => {}
            _ => {
                self.position -= 1;
                return Err(self.unexpected("a string literal"));
            }
        }
        self.expect(&Token::Semicolon)?;
        Ok(())
    }

    /// An optional `@0x...` id after a declaration's name, which is ignored.
    fn declaration_id(&mut self) -> ParseResult<()> {
        if self.eat(&Token::At) {
            self.integer()?;
        }
        Ok(())
    }

    fn struct_decl(&mut self) -> ParseResult<StructDecl> {
        let start = self.expect(&Token::KeywordStruct)?;
        let name = self.ident()?;
        self.declaration_id()?;
        self.annotations()?;
        let members = self.members()?;
        Ok(StructDecl {
            range: start.merge(self.previous_range()),
            name,
            members,
        })
    }

    fn enum_decl(&mut self) -> ParseResult<EnumDecl> {
        let start = self.expect(&Token::KeywordEnum)?;
        let name = self.ident()?;
        self.declaration_id()?;
        self.annotations()?;
        self.expect(&Token::OpenBrace)?;

        let mut enumerants = Vec::new();
        while !self.eat(&Token::CloseBrace) {
            let name = self.ident()?;
            let ordinal = self.ordinal()?;
            self.annotations()?;
            self.expect(&Token::Semicolon)?;
            enumerants.push(Enumerant { name, ordinal });
        }

        Ok(EnumDecl {
            range: start.merge(self.previous_range()),
            name,
            enumerants,
        })
    }

    /// `{ member* }`
    fn members(&mut self) -> ParseResult<Vec<Member>> {
        self.expect(&Token::OpenBrace)?;
        let mut members = Vec::new();
        while !self.eat(&Token::CloseBrace) {
            members.push(self.member()?);
        }
        Ok(members)
    }

    fn member(&mut self) -> ParseResult<Member> {
        match self.peek() {
            Some(Token::KeywordStruct) => Ok(Member::Struct(self.struct_decl()?)),
            Some(Token::KeywordEnum) => Ok(Member::Enum(self.enum_decl()?)),
            Some(Token::KeywordUnion) => {
                let start = self.range();
                self.position += 1;
                let annotations = self.annotations()?;
                let members = self.members()?;
                Ok(Member::Union(UnionDecl {
                    range: start.merge(self.previous_range()),
                    name: None,
                    annotations,
                    members,
                }))
            }
            Some(Token::Name(_)) => match self.peek_nth(1) {
                Some(Token::Colon) => self.group_or_union(),
                _ => Ok(Member::Field(self.field()?)),
            },
            _ => Err(self.unexpected("a field, group, union or nested declaration")),
        }
    }

    /// `name :group { ... }` or `name :union { ... }`
    fn group_or_union(&mut self) -> ParseResult<Member> {
        let name = self.ident()?;
        self.expect(&Token::Colon)?;
        let is_union = match self.peek() {
            Some(Token::KeywordGroup) => false,
            Some(Token::KeywordUnion) => true,
            _ => return Err(self.unexpected("`group`, `union` or an ordinal")),
        };
        self.position += 1;
        let annotations = self.annotations()?;
        let members = self.members()?;
        let range = name.range.merge(self.previous_range());

        Ok(match is_union {
            true => Member::Union(UnionDecl {
                range,
                name: Some(name),
                annotations,
                members,
            }),
            false => Member::Group(GroupDecl {
                range,
                name,
                annotations,
                members,
            }),
        })
    }

    /// `name @N :Type = default $annotation;`
    fn field(&mut self) -> ParseResult<FieldDecl> {
        let name = self.ident()?;
        let ordinal = self.ordinal()?;
        self.expect(&Token::Colon)?;
        let r#type = self.type_expr()?;
        let default = match self.eat(&Token::Equals) {
            true => Some(self.literal()?),
            false => None,
        };
        let annotations = self.annotations()?;
        let end = self.expect(&Token::Semicolon)?;

        Ok(FieldDecl {
            range: name.range.merge(end),
            name,
            ordinal,
            r#type,
            default,
            annotations,
        })
    }

    fn type_expr(&mut self) -> ParseResult<TypeExpr> {
        let first = self.ident()?;
        if first.name == "List" && self.eat(&Token::OpenParen) {
            let elem = self.type_expr()?;
            let end = self.expect(&Token::CloseParen)?;
            return Ok(TypeExpr::List(first.range.merge(end), Box::new(elem)));
        }

        let mut path = vec![first];
        while self.eat(&Token::FullStop) {
            path.push(self.ident()?);
        }
        Ok(TypeExpr::Name(path))
    }

    fn annotations(&mut self) -> ParseResult<Vec<AnnotationUse>> {
        let mut annotations = Vec::new();
        while self.check(&Token::Dollar) {
            let start = self.range();
            self.position += 1;
            let mut path = vec![self.ident()?];
            while self.eat(&Token::FullStop) {
                path.push(self.ident()?);
            }
            let argument = match self.eat(&Token::OpenParen) {
                true => {
                    let argument = self.literal()?;
                    self.expect(&Token::CloseParen)?;
                    Some(argument)
                }
                false => None,
            };
            annotations.push(AnnotationUse {
                range: start.merge(self.previous_range()),
                path,
                argument,
            });
        }
        Ok(annotations)
    }

    fn literal(&mut self) -> ParseResult<Literal> {
        let start = self.range();
        let negative = self.eat(&Token::Minus);

        let kind = match self.bump() {
            Some((Token::IntLiteral(literal), range)) => match parse_integer(literal) {
                Some(magnitude) => LiteralKind::Integer {
                    negative,
                    magnitude,
                },
                None => {
                    return Err(Diagnostic::error()
                        .with_message("integer literal is too large")
                        .with_labels(vec![Label::primary(range.file_id(), range)]));
                }
            },
            Some((Token::FloatLiteral(literal), range)) => match literal.parse::<f64>() {
                Ok(value) if negative => LiteralKind::Float(-value),
                Ok(value) => LiteralKind::Float(value),
                Err(_) => {
                    return Err(Diagnostic::error()
                        .with_message("invalid float literal")
                        .with_labels(vec![Label::primary(range.file_id(), range)]));
                }
            },
            Some((Token::Name(name), _)) if negative && (name == "inf") => {
                LiteralKind::Float(f64::NEG_INFINITY)
            }
            _ if negative => {
                self.position -= 1;
                return Err(self.unexpected("a number"));
            }
            Some((Token::Name(name), _)) => LiteralKind::Name(name.to_owned()),
            Some((Token::KeywordTrue, _)) => LiteralKind::Bool(true),
            Some((Token::KeywordFalse, _)) => LiteralKind::Bool(false),
            Some((Token::StringLiteral(literal), range)) => match unescape(literal) {
                Some(text) => LiteralKind::Text(text),
                None => {
                    return Err(Diagnostic::error()
                        .with_message("invalid escape sequence in string literal")
                        .with_labels(vec![Label::primary(range.file_id(), range)]));
                }
            },
            Some((Token::OpenBracket, _)) => {
                let mut items = Vec::new();
                while !self.eat(&Token::CloseBracket) {
                    items.push(self.literal()?);
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::CloseBracket)?;
                        break;
                    }
                }
                LiteralKind::List(items)
            }
            Some((Token::OpenParen, _)) => {
                let mut entries = Vec::new();
                while !self.eat(&Token::CloseParen) {
                    let name = self.ident()?;
                    self.expect(&Token::Equals)?;
                    entries.push((name, self.literal()?));
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::CloseParen)?;
                        break;
                    }
                }
                LiteralKind::Record(entries)
            }
            _ => {
                self.position -= 1;
                return Err(self.unexpected("a literal"));
            }
        };

        Ok(Literal {
            range: start.merge(self.previous_range()),
            kind,
        })
    }
}

fn parse_integer(literal: &str) -> Option<u64> {
    match literal.strip_prefix("0x").or_else(|| literal.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => literal.parse().ok(),
    }
}

fn unescape(literal: &str) -> Option<String> {
    let mut text = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            text.push(c);
            continue;
        }
        match chars.next()? {
            'n' => text.push('\n'),
            'r' => text.push('\r'),
            't' => text.push('\t'),
            '0' => text.push('\0'),
            '\\' => text.push('\\'),
            '"' => text.push('"'),
            '\'' => text.push('\''),
            'x' => {
                let hex = [chars.next()?, chars.next()?].iter().collect::<String>();
                text.push(char::from(u8::from_str_radix(&hex, 16).ok()?));
            }
            _ => return None,
        }
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> File {
        match parse(0, source) {
            Ok(file) => file,
            Err(diagnostic) => panic!("{}", diagnostic.message),
        }
    }

    #[test]
    fn file_id_and_using() {
        let file = parse_ok(
            r#"
            @0xbf5147cbbecf40c1;
            using Py = import "/capnp/py.capnp";
            struct Empty {}
            "#,
        );
        assert_eq!(file.id, Some(0xbf5147cbbecf40c1));
        assert_eq!(file.items.len(), 1);
    }

    #[test]
    fn fields_and_groups() {
        let file = parse_ok(
            r#"
            struct Foo {
                x @0 :Int64 = -42;
                names @1 :List(Text) = ["a", "b"];
                point :group $Py.nullable {
                    isNull @2 :Int8;
                    value @3 :Int64;
                }
                shape :union {
                    square @4 :Float64;
                    circle @5 :Float64;
                }
                union {
                    a @6 :Void;
                    b @7 :Outer.Inner = (x = 1);
                }
            }
            "#,
        );

        let Item::Struct(foo) = &file.items[0] else { panic!("expected a struct") };
        assert_eq!(foo.members.len(), 5);
        match &foo.members[0] {
            Member::Field(field) => {
                assert_eq!(field.ordinal.value, 0);
                assert!(matches!(
                    field.default,
                    Some(Literal {
                        kind: LiteralKind::Integer {
                            negative: true,
                            magnitude: 42,
                        },
                        ..
                    }),
                ));
            }
            member => panic!("unexpected member {member:?}"),
        }
        match &foo.members[2] {
            Member::Group(group) => {
                assert_eq!(group.annotations[0].dotted_name(), "Py.nullable");
                assert_eq!(group.members.len(), 2);
            }
            member => panic!("unexpected member {member:?}"),
        }
        assert!(matches!(&foo.members[3], Member::Union(UnionDecl { name: Some(_), .. })));
        assert!(matches!(&foo.members[4], Member::Union(UnionDecl { name: None, .. })));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(unescape(r#"a\n\x41\"b"#).as_deref(), Some("a\nA\"b"));
        assert_eq!(unescape(r"\q"), None);
    }

    #[test]
    fn missing_semicolon() {
        let diagnostic = parse(0, "struct Foo { x @0 :Int64 }").unwrap_err();
        assert_eq!(diagnostic.message, "unexpected `}`");
    }
}
