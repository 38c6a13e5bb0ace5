//! Tokenizer for trigger scripts.
//!
//! [`Lexer`] is a lazy iterator: each call to `next` scans exactly one token.
//! The stream always finishes with [`TokenKind::Eof`]; after that, or after
//! the first [`LexError`], the iterator is exhausted.

use std::fmt;

use super::LexError;
use super::ast::Position;

/// Reserved words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `let`
    Let,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `for`
    For,
    /// `in`
    In,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `cooldown`
    Cooldown,
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `global`
    Global,
}

impl Keyword {
    fn from_ident(text: &str) -> Option<Keyword> {
        Some(match text {
            "let" => Keyword::Let,
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "for" => Keyword::For,
            "in" => Keyword::In,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "cooldown" => Keyword::Cooldown,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "null" => Keyword::Null,
            "global" => Keyword::Global,
            _ => return None,
        })
    }

    /// Source spelling of the keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Let => "let",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::In => "in",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Cooldown => "cooldown",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
            Keyword::Global => "global",
        }
    }
}

/// Operators and punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
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
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `;`
    Semicolon,
    /// `=`
    Assign,
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
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
}

impl Punct {
    /// Source spelling of the punctuation.
    pub fn as_str(self) -> &'static str {
        match self {
            Punct::LParen => "(",
            Punct::RParen => ")",
            Punct::LBrace => "{",
            Punct::RBrace => "}",
            Punct::LBracket => "[",
            Punct::RBracket => "]",
            Punct::Comma => ",",
            Punct::Dot => ".",
            Punct::DotDot => "..",
            Punct::Semicolon => ";",
            Punct::Assign => "=",
            Punct::Plus => "+",
            Punct::Minus => "-",
            Punct::Star => "*",
            Punct::Slash => "/",
            Punct::Percent => "%",
            Punct::EqEq => "==",
            Punct::NotEq => "!=",
            Punct::Lt => "<",
            Punct::Le => "<=",
            Punct::Gt => ">",
            Punct::Ge => ">=",
            Punct::AndAnd => "&&",
            Punct::OrOr => "||",
            Punct::Bang => "!",
        }
    }
}

/// Token classification.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal.
    Int(i64),
    /// Floating-point literal.
    Float(f64),
    /// String literal with escapes decoded.
    Str(String),
    /// Identifier.
    Ident(String),
    /// Reserved word.
    Keyword(Keyword),
    /// `#Name` executor reference.
    Executor(String),
    /// `?name` condition reference.
    Condition(String),
    /// Operator or punctuation.
    Punct(Punct),
    /// Statement-separating line break.
    Newline,
    /// End of input.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(value) => write!(f, "integer {}", value),
            TokenKind::Float(value) => write!(f, "number {}", value),
            TokenKind::Str(text) => write!(f, "string {:?}", text),
            TokenKind::Ident(name) => write!(f, "identifier `{}`", name),
            TokenKind::Keyword(kw) => write!(f, "keyword `{}`", kw.as_str()),
            TokenKind::Executor(name) => write!(f, "executor `#{}`", name),
            TokenKind::Condition(name) => write!(f, "condition `?{}`", name),
            TokenKind::Punct(p) => write!(f, "`{}`", p.as_str()),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// Lexical token with its literal text and start position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Classification.
    pub kind: TokenKind,
    /// Exact source text of the token.
    pub text: String,
    /// Start position.
    pub pos: Position,
}

/// Lazy tokenizer over script source.
pub struct Lexer<'a> {
    src: &'a str,
    index: usize,
    line: usize,
    column: usize,
    // Newlines are insignificant while inside `(...)` or `[...]`.
    nesting: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `src`.
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            index: 0,
            line: 1,
            column: 1,
            nesting: 0,
            done: false,
        }
    }

    fn current(&self) -> Option<char> {
        self.src[self.index..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        let mut chars = self.src[self.index..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            self.index += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn error(&self, pos: Position, message: impl Into<String>) -> LexError {
        LexError {
            pos,
            message: message.into(),
        }
    }

    /// Skip spaces and comments. Stops in front of a significant newline.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.current() {
            if ch == '\n' {
                if self.nesting == 0 {
                    return;
                }
                self.advance();
            } else if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_char() == Some('/') {
                while let Some(ch) = self.current() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                return;
            }
        }
    }

    fn scan_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        let start = self.index;
        let pos = self.here();

        let Some(ch) = self.current() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                pos,
            });
        };

        let kind = match ch {
            '\n' => {
                self.advance();
                TokenKind::Newline
            }
            '"' => self.scan_string(pos)?,
            '0'..='9' => self.scan_number(pos)?,
            '#' | '?' => {
                self.advance();
                let name = self.scan_name();
                if name.is_empty() {
                    let what = if ch == '#' { "executor" } else { "condition" };
                    return Err(self.error(pos, format!("expected {} name after `{}`", what, ch)));
                }
                if ch == '#' {
                    TokenKind::Executor(name)
                } else {
                    TokenKind::Condition(name)
                }
            }
            c if is_name_start(c) => {
                let name = self.scan_name();
                match Keyword::from_ident(&name) {
                    Some(kw) => TokenKind::Keyword(kw),
                    None => TokenKind::Ident(name),
                }
            }
            _ => TokenKind::Punct(self.scan_punct(pos)?),
        };

        Ok(Token {
            kind,
            text: self.src[start..self.index].to_string(),
            pos,
        })
    }

    fn scan_name(&mut self) -> String {
        let start = self.index;
        if let Some(ch) = self.current() {
            if !is_name_start(ch) {
                return String::new();
            }
        }
        while let Some(ch) = self.current() {
            if is_name_continue(ch) {
                self.advance();
            } else {
                break;
            }
        }
        self.src[start..self.index].to_string()
    }

    fn scan_string(&mut self, pos: Position) -> Result<TokenKind, LexError> {
        // consume opening quote
        self.advance();
        let mut buf = String::new();
        while let Some(ch) = self.current() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(TokenKind::Str(buf));
                }
                '\\' => {
                    let escape_pos = self.here();
                    self.advance();
                    let escaped = self
                        .current()
                        .ok_or_else(|| self.error(escape_pos, "incomplete escape"))?;
                    let value = match escaped {
                        '"' => '"',
                        '\\' => '\\',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => {
                            return Err(
                                self.error(escape_pos, format!("unknown escape: \\{}", other))
                            );
                        }
                    };
                    self.advance();
                    buf.push(value);
                }
                '\n' => break,
                other => {
                    self.advance();
                    buf.push(other);
                }
            }
        }
        Err(self.error(pos, "unterminated string literal"))
    }

    fn scan_number(&mut self, pos: Position) -> Result<TokenKind, LexError> {
        let start = self.index;
        while matches!(self.current(), Some('0'..='9')) {
            self.advance();
        }

        // `1..5` is a range, not a float.
        let mut is_float = false;
        if self.current() == Some('.') && matches!(self.peek_char(), Some('0'..='9')) {
            is_float = true;
            self.advance();
            while matches!(self.current(), Some('0'..='9')) {
                self.advance();
            }
        }

        if let Some(ch) = self.current() {
            if is_name_start(ch) {
                return Err(self.error(self.here(), format!("invalid digit `{}` in number", ch)));
            }
        }

        let text = &self.src[start..self.index];
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error(pos, "invalid float literal"))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error(pos, "integer literal out of range"))
        }
    }

    fn scan_punct(&mut self, pos: Position) -> Result<Punct, LexError> {
        let Some(ch) = self.current() else {
            return Err(self.error(pos, "unexpected end of input"));
        };
        let next = self.peek_char();
        let (punct, width) = match (ch, next) {
            ('.', Some('.')) => (Punct::DotDot, 2),
            ('=', Some('=')) => (Punct::EqEq, 2),
            ('!', Some('=')) => (Punct::NotEq, 2),
            ('<', Some('=')) => (Punct::Le, 2),
            ('>', Some('=')) => (Punct::Ge, 2),
            ('&', Some('&')) => (Punct::AndAnd, 2),
            ('|', Some('|')) => (Punct::OrOr, 2),
            ('(', _) => (Punct::LParen, 1),
            (')', _) => (Punct::RParen, 1),
            ('{', _) => (Punct::LBrace, 1),
            ('}', _) => (Punct::RBrace, 1),
            ('[', _) => (Punct::LBracket, 1),
            (']', _) => (Punct::RBracket, 1),
            (',', _) => (Punct::Comma, 1),
            ('.', _) => (Punct::Dot, 1),
            (';', _) => (Punct::Semicolon, 1),
            ('=', _) => (Punct::Assign, 1),
            ('+', _) => (Punct::Plus, 1),
            ('-', _) => (Punct::Minus, 1),
            ('*', _) => (Punct::Star, 1),
            ('/', _) => (Punct::Slash, 1),
            ('%', _) => (Punct::Percent, 1),
            ('<', _) => (Punct::Lt, 1),
            ('>', _) => (Punct::Gt, 1),
            ('!', _) => (Punct::Bang, 1),
            (other, _) => {
                return Err(self.error(pos, format!("unexpected character `{}`", other)));
            }
        };
        for _ in 0..width {
            self.advance();
        }

        match punct {
            Punct::LParen | Punct::LBracket => self.nesting += 1,
            Punct::RParen | Punct::RBracket => self.nesting = self.nesting.saturating_sub(1),
            _ => {}
        }
        Ok(punct)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.scan_token();
        match &result {
            Ok(token) if token.kind == TokenKind::Eof => self.done = true,
            Err(_) => self.done = true,
            Ok(_) => {}
        }
        Some(result)
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}

/// Tokenize the whole input eagerly. Mostly useful for tooling and tests.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(src).collect()
}

fn is_name_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

fn is_name_continue(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}
