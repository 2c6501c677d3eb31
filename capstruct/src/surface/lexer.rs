use codespan_reporting::diagnostic::{Diagnostic, Label};
use logos::Logos;

use crate::source::{BytePos, ByteRange, FileId};

#[derive(Clone, Debug, PartialEq, Logos)]
#[logos(extras = FileId)]
pub enum Token<'source> {
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Name(&'source str),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| &lex.slice()[1..(lex.slice().len() - 1)])]
    StringLiteral(&'source str),
    #[regex(r"[0-9]+")]
    #[regex(r"0[xX][0-9a-fA-F]+")]
    IntLiteral(&'source str),
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+")]
    FloatLiteral(&'source str),

    #[token("enum")]
    KeywordEnum,
    #[token("false")]
    KeywordFalse,
    #[token("group")]
    KeywordGroup,
    #[token("import")]
    KeywordImport,
    #[token("struct")]
    KeywordStruct,
    #[token("true")]
    KeywordTrue,
    #[token("union")]
    KeywordUnion,
    #[token("using")]
    KeywordUsing,

    #[token("@")]
    At,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("$")]
    Dollar,
    #[token("=")]
    Equals,
    #[token(".")]
    FullStop,
    #[token("-")]
    Minus,
    #[token(";")]
    Semicolon,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,

    #[error]
    #[regex(r"\p{Whitespace}", logos::skip)]
    #[regex(r"#[^\n]*", logos::skip)]
    Error,
}

impl<'source> Token<'source> {
    pub fn description(&self) -> &'static str {
        match self {
            Token::Name(_) => "name",
            Token::StringLiteral(_) => "string literal",
            Token::IntLiteral(_) => "integer literal",
            Token::FloatLiteral(_) => "float literal",
            Token::KeywordEnum => "enum",
            Token::KeywordFalse => "false",
            Token::KeywordGroup => "group",
            Token::KeywordImport => "import",
            Token::KeywordStruct => "struct",
            Token::KeywordTrue => "true",
            Token::KeywordUnion => "union",
            Token::KeywordUsing => "using",
            Token::At => "@",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::Dollar => "$",
            Token::Equals => "=",
            Token::FullStop => ".",
            Token::Minus => "-",
            Token::Semicolon => ";",
            Token::OpenBrace => "{",
            Token::CloseBrace => "}",
            Token::OpenBracket => "[",
            Token::CloseBracket => "]",
            Token::OpenParen => "(",
            Token::CloseParen => ")",
            Token::Error => "error",
        }
    }
}

pub type Spanned<Tok> = (Tok, ByteRange);

#[derive(Clone, Debug)]
pub enum Error {
    UnexpectedCharacter { range: ByteRange },
}

impl Error {
    pub fn range(&self) -> ByteRange {
        match self {
            Error::UnexpectedCharacter { range } => *range,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        let range = self.range();
        let message = match self {
            Error::UnexpectedCharacter { .. } => "unexpected character",
        };
        Diagnostic::error()
            .with_message(message)
            .with_labels(vec![Label::primary(range.file_id(), range)])
    }
}

pub fn tokens(
    file_id: FileId,
    source: &str,
) -> impl Iterator<Item = Result<Spanned<Token<'_>>, Error>> {
    assert!(
        source.len() < u32::MAX as usize,
        "`source` must be less than 4GiB in length"
    );

    Token::lexer_with_extras(source, file_id)
        .spanned()
        .map(move |(token, range)| {
            let start = range.start as BytePos;
            let end = range.end as BytePos;
            let range = ByteRange::new(file_id, start, end);
            match token {
                Token::Error => Err(Error::UnexpectedCharacter { range }),
                token => Ok((token, range)),
            }
        })
}
