//! Script lexer, expression AST, and expression parser.
//!
//! The language is line oriented: statements end at a newline, and a line
//! holding only `---` splits the enter half from the leave half.  Tokens
//! carry their 1-based line so every diagnostic can name it.
//!
//! Expression grammar:
//!
//! ```text
//! expr    := STRING | INT | '&' lvalue | 'len' '(' expr ')'
//!          | IDENT '(' [expr (',' expr)*] ')' | lvalue
//! lvalue  := 'argN' | 'retval' | IDENT
//! ```

use std::fmt;

use super::builtins::Builtin;
use crate::error::SyntaxError;

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Ident(String),
    Str(String),
    /// Integer literal; `None` when it does not fit in 64 bits.
    Int(Option<i64>),
    Assign,
    Ampersand,
    LParen,
    RParen,
    Comma,
    Newline,
    /// A line consisting solely of `---`.
    Delimiter,
    /// Input no token can start with, or an unterminated string literal.
    Illegal,
    Eof,
}

impl Token {
    /// Diagnostic for meeting this token where it does not belong.
    fn unexpected(&self) -> String {
        match self {
            Token::Ident(name) if name == "var" => "Unexpected token var".into(),
            Token::Ident(_) => "Unexpected identifier".into(),
            Token::Str(_) => "Unexpected string".into(),
            Token::Int(_) => "Unexpected number".into(),
            Token::Assign => "Unexpected token =".into(),
            Token::Ampersand => "Unexpected token &".into(),
            Token::LParen => "Unexpected token (".into(),
            Token::RParen => "Unexpected token )".into(),
            Token::Comma => "Unexpected token ,".into(),
            Token::Delimiter => "Unexpected token ---".into(),
            Token::Illegal => "Unexpected token ILLEGAL".into(),
            Token::Newline | Token::Eof => "Unexpected end of input".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    /// Only whitespace seen so far on the current line.
    line_start: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0, line: 1, line_start: true }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut it = self.src[self.pos..].chars();
        it.next();
        it.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_ws_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.pos += 1;
                }
                '#' => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// At the start of a line, consume it if it is exactly `---`.
    fn eat_delimiter_line(&mut self) -> bool {
        let rest = &self.src[self.pos..];
        let end = rest.find('\n').unwrap_or(rest.len());
        if rest[..end].trim() == "---" {
            self.pos += end;
            true
        } else {
            false
        }
    }

    fn read_number(&mut self, negative: bool) -> Token {
        let radix = if self.src[self.pos..].starts_with("0x") || self.src[self.pos..].starts_with("0X") {
            self.pos += 2;
            16
        } else {
            10
        };
        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_digit(radix)) {
            self.pos += 1;
        }
        // `12abc`, `0x`, `0xZ`: not a number and not an identifier either.
        if self.pos == digits_start || matches!(self.peek(), Some(c) if is_ident_char(c)) {
            while matches!(self.peek(), Some(c) if is_ident_char(c)) {
                self.pos += 1;
            }
            return Token::Illegal;
        }
        let digits = &self.src[digits_start..self.pos];
        let value = i64::from_str_radix(digits, radix)
            .ok()
            .map(|n| if negative { -n } else { n });
        Token::Int(value)
    }

    fn read_string(&mut self, quote: char) -> Token {
        let mut s = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Token::Illegal,
                Some('\\') => match self.advance() {
                    None | Some('\n') => return Token::Illegal,
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('0') => s.push('\0'),
                    Some('u') => match self.read_unicode_escape() {
                        Some(c) => s.push(c),
                        None => return Token::Illegal,
                    },
                    Some(c) => s.push(c),
                },
                Some(c) if c == quote => return Token::Str(s),
                Some(c) => s.push(c),
            }
        }
    }

    /// `\uXXXX`, four hex digits naming a scalar value.
    fn read_unicode_escape(&mut self) -> Option<char> {
        let hex = self.src.get(self.pos..self.pos + 4)?;
        let code = u32::from_str_radix(hex, 16).ok()?;
        self.pos += 4;
        char::from_u32(code)
    }

    fn read_ident(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.pos += 1;
        }
        Token::Ident(self.src[start..self.pos].to_owned())
    }

    fn next_token(&mut self) -> Spanned {
        self.skip_ws_and_comments();
        let line = self.line;

        if self.line_start && self.eat_delimiter_line() {
            self.line_start = false;
            return Spanned { token: Token::Delimiter, line };
        }

        let Some(ch) = self.peek() else {
            return Spanned { token: Token::Eof, line };
        };
        self.line_start = false;

        let token = match ch {
            '\n' => {
                self.pos += 1;
                self.line += 1;
                self.line_start = true;
                Token::Newline
            }
            '0'..='9' => self.read_number(false),
            '-' if matches!(self.peek2(), Some('0'..='9')) => {
                self.pos += 1;
                self.read_number(true)
            }
            '"' | '\'' => {
                self.pos += 1;
                self.read_string(ch)
            }
            c if c.is_ascii_alphabetic() || c == '_' => self.read_ident(),
            _ => {
                self.advance();
                match ch {
                    '=' => Token::Assign,
                    '&' => Token::Ampersand,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    _ => Token::Illegal,
                }
            }
        };
        Spanned { token, line }
    }

    fn tokenize(mut self) -> Vec<Spanned> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token();
            let done = matches!(t.token, Token::Eof);
            tokens.push(t);
            if done {
                break;
            }
        }
        tokens
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn tokenize(src: &str) -> Vec<Spanned> {
    Lexer::new(src).tokenize()
}

// ── AST ───────────────────────────────────────────────────────────────────────

/// A storage location a script can assign to or take the address of.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LValue {
    Local(String),
    Argument(usize),
    ReturnValue,
}

impl LValue {
    /// Classify an identifier: `argN`, `retval`, or a local name.
    pub(crate) fn from_ident(name: &str) -> LValue {
        if name == "retval" {
            return LValue::ReturnValue;
        }
        if let Some(digits) = name.strip_prefix("arg") {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(index) = digits.parse() {
                    return LValue::Argument(index);
                }
            }
        }
        LValue::Local(name.to_owned())
    }
}

impl fmt::Display for LValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LValue::Local(name) => f.write_str(name),
            LValue::Argument(i) => write!(f, "arg{i}"),
            LValue::ReturnValue => f.write_str("retval"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Str(String),
    Int(i32),
    Var(String),
    Arg(usize),
    RetVal,
    AddressOf(LValue),
    Len(Box<Expr>),
    Call(Builtin, Vec<Expr>),
    /// `a, b, c`; legal only as a whole statement.
    Comma(Vec<Expr>),
}

impl Expr {
    fn from_lvalue(lv: LValue) -> Expr {
        match lv {
            LValue::Local(name) => Expr::Var(name),
            LValue::Argument(i) => Expr::Arg(i),
            LValue::ReturnValue => Expr::RetVal,
        }
    }

    /// The storage location this expression names, if it names one.
    pub fn as_lvalue(&self) -> Option<LValue> {
        match self {
            Expr::Var(name) => Some(LValue::Local(name.clone())),
            Expr::Arg(i) => Some(LValue::Argument(*i)),
            Expr::RetVal => Some(LValue::ReturnValue),
            _ => None,
        }
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Deepest nesting of `len(...)` and call arguments a script may use.
pub(crate) const MAX_NESTING: usize = 64;

pub(crate) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned>) -> Self {
        Parser { tokens, pos: 0, depth: 0 }
    }

    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |t| &t.token)
    }

    /// Line of the next token.
    pub(crate) fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .map_or(1, |t| t.line)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    pub(crate) fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Error for the next token, which does not belong here.
    pub(crate) fn unexpected(&self) -> SyntaxError {
        SyntaxError::new(self.line(), self.peek().unexpected())
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.line(), message)
    }

    fn expect(&mut self, expected: &Token) -> Result<(), SyntaxError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    pub(crate) fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("Expression nested too deeply"));
        }
        self.depth += 1;
        let result = self.parse_primary();
        self.depth -= 1;
        result
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let line = self.line();
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::Int(n) => {
                self.advance();
                int_literal(n)
                    .map(Expr::Int)
                    .ok_or_else(|| SyntaxError::new(line, "Invalid number"))
            }
            Token::Ampersand => {
                self.advance();
                Ok(Expr::AddressOf(self.parse_lvalue()?))
            }
            Token::Ident(name) if name != "var" => {
                self.advance();
                if self.peek() != &Token::LParen {
                    return Ok(Expr::from_lvalue(LValue::from_ident(&name)));
                }
                if name == "len" {
                    self.advance();
                    let inner = self.parse_expr()?;
                    self.expect(&Token::RParen)?;
                    return Ok(Expr::Len(Box::new(inner)));
                }
                let builtin = Builtin::from_name(&name)
                    .ok_or_else(|| SyntaxError::new(line, format!("Unknown function {name}")))?;
                let args = self.parse_call_args()?;
                builtin
                    .check_arity(args.len())
                    .map_err(|msg| SyntaxError::new(line, msg))?;
                Ok(Expr::Call(builtin, args))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// `( [expr (',' expr)*] )`
    fn parse_call_args(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        args.push(self.parse_expr()?);
        while self.eat(&Token::Comma) {
            args.push(self.parse_expr()?);
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    pub(crate) fn parse_lvalue(&mut self) -> Result<LValue, SyntaxError> {
        match self.peek().clone() {
            Token::Ident(name) if name != "var" => {
                self.advance();
                if self.peek() == &Token::LParen {
                    return Err(self.unexpected());
                }
                Ok(LValue::from_ident(&name))
            }
            _ => Err(self.unexpected()),
        }
    }
}

/// Literals must fit 32 bits, signed or unsigned; unsigned values keep their
/// bit pattern (`0xFFFFFFFF` is `-1`).
fn int_literal(n: Option<i64>) -> Option<i32> {
    let n = n?;
    if let Ok(v) = i32::try_from(n) {
        return Some(v);
    }
    u32::try_from(n).ok().map(|v| v as i32)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
