//! Forma tokenizer — converts `.forma` text into a token stream.
//!
//! Handles: identifiers, string literals, structural brackets, colon,
//! question mark, comma. Line comments (`//`) and block comments
//! (`/* ... */`, nesting) are discarded and never emitted as tokens.
//!
//! Guarantees:
//! - Deterministic: same input always produces same token stream
//! - Every byte of non-comment, non-whitespace input maps to exactly one token
//! - Complete error reporting: line:column for every error

use serde::Serialize;

use crate::error::{DiagnosticCode, ParseError, Result};

/// Token types for `.forma` syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Str(String),

    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }
    LAngle,   // <
    RAngle,   // >
    Colon,    // :
    Question, // ?
    Comma,    // ,

    Eof,
}

impl Token {
    /// Short human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier '{}'", s),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LAngle => "'<'".to_string(),
            Token::RAngle => "'>'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Question => "'?'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// Position in source text for error reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Token with source position.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenizer for `.forma` source text.
pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Tokenizer {
    pub fn new(text: &str) -> Self {
        Tokenizer {
            input: text.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input into a stream of spanned tokens.
    ///
    /// The stream is always terminated by a single `Eof` token.
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_at_end() {
                tokens.push(SpannedToken {
                    token: Token::Eof,
                    span: self.current_span(),
                });
                break;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        Ok(tokens)
    }

    // ── Character helpers ──────────────────────────────────

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.input.get(self.position).copied();
        if let Some(c) = ch {
            self.position += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        ch
    }

    fn current_span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
            offset: self.position,
        }
    }

    fn syntax_error(&self, message: impl Into<String>, span: &Span) -> ParseError {
        ParseError::new(DiagnosticCode::E000, message, span)
    }

    // ── Whitespace & comments ──────────────────────────────

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            while let Some(ch) = self.peek() {
                if ch.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }

            // Line comment: // to end of line
            if self.peek() == Some('/') && self.peek_ahead(1) == Some('/') {
                while let Some(ch) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }

            // Block comment: /* ... */, nesting
            if self.peek() == Some('/') && self.peek_ahead(1) == Some('*') {
                self.advance();
                self.advance();
                let mut depth = 1usize;
                while depth > 0 {
                    match (self.peek(), self.peek_ahead(1)) {
                        (Some('/'), Some('*')) => {
                            self.advance();
                            self.advance();
                            depth += 1;
                        }
                        (Some('*'), Some('/')) => {
                            self.advance();
                            self.advance();
                            depth -= 1;
                        }
                        (Some(_), _) => {
                            self.advance();
                        }
                        (None, _) => {
                            let span = self.current_span();
                            return Err(self.syntax_error("unterminated block comment", &span));
                        }
                    }
                }
                continue;
            }

            return Ok(());
        }
    }

    // ── Main dispatch ──────────────────────────────────────

    fn next_token(&mut self) -> Result<SpannedToken> {
        let span = self.current_span();
        let Some(ch) = self.peek() else {
            return Err(self.syntax_error("unexpected end of input", &span));
        };

        let single = match ch {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '<' => Some(Token::LAngle),
            '>' => Some(Token::RAngle),
            ':' => Some(Token::Colon),
            '?' => Some(Token::Question),
            ',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(SpannedToken { token, span });
        }

        match ch {
            '"' => self.read_string(span),
            c if c.is_alphanumeric() || c == '_' => self.read_identifier(span),
            _ => Err(self.syntax_error(format!("unexpected character '{}'", ch), &span)),
        }
    }

    // ── String literals ────────────────────────────────────

    fn read_string(&mut self, span: Span) -> Result<SpannedToken> {
        self.advance(); // opening "
        let mut value = String::new();

        loop {
            match self.peek() {
                None => return Err(self.syntax_error("unterminated string literal", &span)),
                Some('\n') => {
                    return Err(self.syntax_error("unterminated string literal", &span));
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some(c) => value.push(c),
                        None => {
                            return Err(self.syntax_error("unterminated string literal", &span));
                        }
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Ok(SpannedToken {
            token: Token::Str(value),
            span,
        })
    }

    // ── Identifiers ────────────────────────────────────────

    /// Identifiers: letters, digits, `_`, `.` — version literals like
    /// `v7.0` tokenize as a single identifier.
    fn read_identifier(&mut self, span: Span) -> Result<SpannedToken> {
        let start = self.position;

        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.input[start..self.position].iter().collect();
        Ok(SpannedToken {
            token: Token::Ident(text),
            span,
        })
    }
}
