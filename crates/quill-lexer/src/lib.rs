//! quill-lexer — turns Quill source text into a token stream.
//!
//! The lexer never aborts: malformed input produces an `ERROR` token and an
//! entry in the accompanying error list, and scanning continues. The token
//! stream always ends with a single `EOF` token.

#![deny(missing_docs)]

use quill_core::{Pos, SourceId, Span};
use std::fmt;

/// Reserved words recognised by the lexer (see the language reference).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `and`
    And,
    /// `break`
    Break,
    /// `case`
    Case,
    /// `class`
    Class,
    /// `const`
    Const,
    /// `continue`
    Continue,
    /// `default`
    Default,
    /// `do`
    Do,
    /// `else`
    Else,
    /// `enum`
    Enum,
    /// `false`
    False,
    /// `float`
    Float,
    /// `for`
    For,
    /// `function`
    Function,
    /// `if`
    If,
    /// `import`
    Import,
    /// `int`
    Int,
    /// `bool`
    Bool,
    /// `nil` / `null` (both lexemes map here)
    Nil,
    /// `or`
    Or,
    /// `print`
    Print,
    /// `return`
    Return,
    /// `string`
    StringType,
    /// `struct`
    Struct,
    /// `super`
    Super,
    /// `switch`
    Switch,
    /// `this`
    This,
    /// `true`
    True,
    /// `typedef`
    Typedef,
    /// `var`
    Var,
    /// `void`
    Void,
    /// `while`
    While,
    /// `public`
    Public,
    /// `private`
    Private,
}

fn keyword_of(s: &str) -> Option<Keyword> {
    use Keyword::{
        And, Bool, Break, Case, Class, Const, Continue, Default, Do, Else, Enum, False, Float,
        For, Function, If, Import, Int, Nil, Or, Print, Private, Public, Return, Struct, StringType,
        Super, Switch, This, True, Typedef, Var, Void, While,
    };
    Some(match s {
        "and" => And,
        "break" => Break,
        "case" => Case,
        "class" => Class,
        "const" => Const,
        "continue" => Continue,
        "default" => Default,
        "do" => Do,
        "else" => Else,
        "enum" => Enum,
        "false" => False,
        "float" => Float,
        "for" => For,
        "function" => Function,
        "if" => If,
        "import" => Import,
        "int" => Int,
        "bool" => Bool,
        "nil" | "null" => Nil,
        "or" => Or,
        "print" => Print,
        "return" => Return,
        "string" => StringType,
        "struct" => Struct,
        "super" => Super,
        "switch" => Switch,
        "this" => This,
        "true" => True,
        "typedef" => Typedef,
        "var" => Var,
        "void" => Void,
        "while" => While,
        "public" => Public,
        "private" => Private,
        _ => return None,
    })
}

/// The kind of a lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal; always carries its parsed value.
    Number(f64),
    /// String literal, already escape-decoded.
    String(String),
    /// Identifier (not a reserved word).
    Identifier(String),
    /// Reserved word.
    Keyword(Keyword),

    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `:`
    Colon,
    /// `.`
    Dot,

    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,

    /// `=`
    Assign,
    /// `==`
    EqualEqual,
    /// `!=`
    BangEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,

    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `!`
    Bang,

    /// Malformed token; `message` describes the failure.
    Error {
        /// Human-readable explanation.
        message: String,
    },
    /// Always the final token of a stream.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// The raw source text the token was scanned from.
    pub lexeme: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl Token {
    /// The token's location as a `Span` covering only its first character;
    /// the lexer does not track end positions per-token (only line/column
    /// of the start, per the token contract).
    pub fn span(&self, source: SourceId) -> Span {
        let pos = Pos { line: self.line, column: self.column };
        Span::new(source, pos, pos)
    }

    /// Numeric value, if this is a `Number` token.
    pub fn number_value(&self) -> Option<f64> {
        match self.kind {
            TokenKind::Number(v) => Some(v),
            _ => None,
        }
    }
}

/// Scans `source` into a token stream, collecting recoverable errors along
/// the way. `tokens` always ends with `TokenKind::Eof`; the lexer never
/// panics or aborts early.
pub fn lex(source: &str) -> (Vec<Token>, Vec<String>) {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.scan_token();
        let is_eof = matches!(tok.kind, TokenKind::Eof);
        tokens.push(tok);
        if is_eof {
            break;
        }
    }
    (tokens, lexer.errors)
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    off: usize,
    line: u32,
    column: u32,
    errors: Vec<String>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), off: 0, line: 1, column: 1, errors: Vec::new() }
    }

    fn is_eof(&self) -> bool {
        self.off >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.off).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.off + n).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.off += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&mut self, line: u32, column: u32, message: impl Into<String>) -> Token {
        let message = message.into();
        self.errors.push(format!("[{line}:{column}] {message}"));
        Token { kind: TokenKind::Error { message }, lexeme: String::new(), line, column }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !self.is_eof() && self.peek() != Some(b'\n') {
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    let mut depth = 1u32;
                    while depth > 0 {
                        if self.is_eof() {
                            break;
                        }
                        if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'*') {
                            self.advance();
                            self.advance();
                            depth += 1;
                        } else if self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                            self.advance();
                            self.advance();
                            depth -= 1;
                        } else {
                            self.advance();
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_token(&mut self) -> Token {
        self.skip_ws_and_comments();
        if self.is_eof() {
            return Token { kind: TokenKind::Eof, lexeme: String::new(), line: self.line, column: self.column };
        }

        let start = self.off;
        let line = self.line;
        let column = self.column;
        let c = self.advance().unwrap();

        let kind = match c {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b':' => TokenKind::Colon,
            b'.' => TokenKind::Dot,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'~' => TokenKind::Tilde,
            b'^' => TokenKind::Caret,
            b'!' => if self.matches(b'=') { TokenKind::BangEqual } else { TokenKind::Bang },
            b'=' => if self.matches(b'=') { TokenKind::EqualEqual } else { TokenKind::Assign },
            b'<' => if self.matches(b'=') { TokenKind::LessEqual } else { TokenKind::Less },
            b'>' => if self.matches(b'=') { TokenKind::GreaterEqual } else { TokenKind::Greater },
            b'&' => if self.matches(b'&') { TokenKind::AndAnd } else { TokenKind::Amp },
            b'|' => if self.matches(b'|') { TokenKind::OrOr } else { TokenKind::Pipe },
            b'"' => return self.scan_string(start, line, column),
            b'0'..=b'9' => return self.scan_number(start, line, column),
            c if is_ident_start(c) => return self.scan_identifier(start, line, column),
            other => {
                let ch = other as char;
                return self.error(line, column, format!("Unexpected character '{ch}'"));
            }
        };

        let lexeme = self.src[start..self.off].to_string();
        Token { kind, lexeme, line, column }
    }

    fn scan_string(&mut self, start: usize, line: u32, column: u32) -> Token {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return self.error(line, column, "Unterminated string");
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    match self.advance() {
                        Some(b'n') => value.push('\n'),
                        Some(b't') => value.push('\t'),
                        Some(b'r') => value.push('\r'),
                        Some(b'\\') => value.push('\\'),
                        Some(b'"') => value.push('"'),
                        Some(other) => {
                            // Unknown escape: keep both characters verbatim.
                            value.push('\\');
                            value.push(other as char);
                        }
                        None => return self.error(line, column, "Unterminated string"),
                    }
                }
                Some(_) => {
                    let ch_start = self.off;
                    self.advance();
                    value.push_str(&self.src[ch_start..self.off]);
                }
            }
        }
        let lexeme = self.src[start..self.off].to_string();
        Token { kind: TokenKind::String(value), lexeme, line, column }
    }

    fn scan_number(&mut self, start: usize, line: u32, column: u32) -> Token {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            self.advance();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.advance();
            }
        }
        let lexeme = self.src[start..self.off].to_string();
        match lexeme.parse::<f64>() {
            Ok(v) => Token { kind: TokenKind::Number(v), lexeme, line, column },
            Err(_) => self.error(line, column, format!("Invalid number literal '{lexeme}'")),
        }
    }

    fn scan_identifier(&mut self, start: usize, line: u32, column: u32) -> Token {
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.advance();
        }
        let lexeme = self.src[start..self.off].to_string();
        let kind = match keyword_of(&lexeme) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier(lexeme.clone()),
        };
        Token { kind, lexeme, line, column }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn arithmetic_and_identifiers() {
        let ks = kinds("int x = 2 + 3 * 4;");
        assert_eq!(
            ks,
            vec![
                TokenKind::Keyword(Keyword::Int),
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::Number(2.0),
                TokenKind::Plus,
                TokenKind::Number(3.0),
                TokenKind::Star,
                TokenKind::Number(4.0),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        let ks = kinds("a != b && c <= d || e");
        assert!(ks.contains(&TokenKind::BangEqual));
        assert!(ks.contains(&TokenKind::AndAnd));
        assert!(ks.contains(&TokenKind::LessEqual));
        assert!(ks.contains(&TokenKind::OrOr));
    }

    #[test]
    fn nested_block_comments() {
        let ks = kinds("/* outer /* inner */ still outer */ 1;");
        assert_eq!(ks, vec![TokenKind::Number(1.0), TokenKind::Semicolon, TokenKind::Eof]);
    }

    #[test]
    fn unterminated_string_errors_but_does_not_panic() {
        let (tokens, errors) = lex("\"unterminated");
        assert!(!errors.is_empty());
        assert!(matches!(tokens[0].kind, TokenKind::Error { .. }));
        assert!(matches!(tokens.last().unwrap().kind, TokenKind::Eof));
    }

    #[test]
    fn nil_and_null_are_the_same_keyword() {
        let ks = kinds("nil; null;");
        assert_eq!(ks[0], TokenKind::Keyword(Keyword::Nil));
        assert_eq!(ks[2], TokenKind::Keyword(Keyword::Nil));
    }

    #[test]
    fn unknown_escape_preserves_both_characters() {
        let (tokens, _) = lex(r#""a\qb""#);
        match &tokens[0].kind {
            TokenKind::String(s) => assert_eq!(s, "a\\qb"),
            other => panic!("expected string token, got {other:?}"),
        }
    }
}
