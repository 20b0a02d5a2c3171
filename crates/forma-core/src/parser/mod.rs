//! Forma parser — tokenizer, IR types, and recursive descent parser.
//!
//! Converts `.forma` text into the raw IR ([`Model`]). Single forward-only
//! pass with bounded lookahead; the grammar is LL(1) at the top level,
//! dispatched on the keyword after `(`.
//!
//! Plural forms (`shapes`, `choices`, `mixins`) are pure sugar: they reuse
//! the singular body parsers, so `(shapes (A ...) (B ...))` produces IR
//! identical to `(shape A ...) (shape B ...)`.
//!
//! The parser raises one [`ParseError`] and stops — syntax errors are fatal
//! to the file; multi-error reporting happens at the structural level in
//! [`crate::validator`].

pub mod ast;
pub mod tokenizer;

use indexmap::IndexMap;

use crate::error::{DiagnosticCode, ParseError, Result};
use ast::{Choice, Field, Meta, Mixin, MixinRef, Model, Shape, TypeExpr, Variant};
use tokenizer::{Span, SpannedToken, Token, Tokenizer};

/// Parse `.forma` source text into the raw IR.
///
/// # Errors
/// Returns a [`ParseError`] with line/column for any syntax violation;
/// `E010` for an unknown top-level form keyword, `E000` otherwise.
pub fn parse(source: &str) -> Result<Model> {
    let tokens = Tokenizer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,

    // IR accumulators
    model_seen: bool,
    name: String,
    version: String,
    description: Option<String>,
    namespace: Option<String>,
    mixins: Option<IndexMap<String, Mixin>>,
    choices: Option<IndexMap<String, Choice>>,
    shapes: Option<IndexMap<String, Shape>>,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Parser {
            tokens,
            pos: 0,
            model_seen: false,
            name: String::new(),
            version: String::new(),
            description: None,
            namespace: None,
            mixins: None,
            choices: None,
            shapes: None,
        }
    }

    // ── Token access ───────────────────────────────────────

    fn peek(&self) -> &SpannedToken {
        &self.tokens[self.pos]
    }

    /// One extra token of lookahead, for distinguishing `name: type` fields
    /// from bare variant names.
    fn peek2(&self) -> &Token {
        match self.tokens.get(self.pos + 1) {
            Some(st) => &st.token,
            None => &Token::Eof,
        }
    }

    fn advance(&mut self) -> SpannedToken {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn syntax_error(&self, message: impl Into<String>, span: &Span) -> ParseError {
        ParseError::new(DiagnosticCode::E000, message, span)
    }

    fn expect(&mut self, expected: &Token) -> Result<SpannedToken> {
        let tok = self.peek().clone();
        if std::mem::discriminant(&tok.token) == std::mem::discriminant(expected) {
            Ok(self.advance())
        } else {
            Err(self.syntax_error(
                format!("expected {}, got {}", expected.describe(), tok.token.describe()),
                &tok.span,
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span)> {
        let tok = self.peek().clone();
        match tok.token {
            Token::Ident(name) => {
                self.advance();
                Ok((name, tok.span))
            }
            other => Err(self.syntax_error(
                format!("expected identifier, got {}", other.describe()),
                &tok.span,
            )),
        }
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if std::mem::discriminant(&self.peek().token) == std::mem::discriminant(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    // ── Top level ──────────────────────────────────────────

    fn parse(mut self) -> Result<Model> {
        while self.peek().token != Token::Eof {
            let tok = self.peek().clone();
            if tok.token == Token::LParen {
                self.parse_form()?;
            } else {
                return Err(self.syntax_error(
                    format!("expected '(' to start a form, got {}", tok.token.describe()),
                    &tok.span,
                ));
            }
        }

        let meta = if self.model_seen || self.namespace.is_some() {
            Some(Meta {
                name: self.name,
                version: self.version,
                description: self.description,
                namespace: self.namespace,
            })
        } else {
            None
        };

        Ok(Model {
            meta,
            mixins: self.mixins,
            choices: self.choices,
            shapes: self.shapes,
        })
    }

    fn parse_form(&mut self) -> Result<()> {
        self.expect(&Token::LParen)?;
        let tok = self.peek().clone();
        let keyword = match &tok.token {
            Token::Ident(kw) => kw.clone(),
            other => {
                return Err(self.syntax_error(
                    format!("expected keyword after '(', got {}", other.describe()),
                    &tok.span,
                ));
            }
        };
        self.advance();

        match keyword.as_str() {
            "namespace" => self.parse_namespace(&tok.span)?,
            "model" => self.parse_model(&tok.span)?,
            "mixin" => self.parse_mixin_body()?,
            "mixins" => self.parse_plural(Parser::parse_mixin_body, Section::Mixins)?,
            "choice" => self.parse_choice_body()?,
            "choices" => self.parse_plural(Parser::parse_choice_body, Section::Choices)?,
            "shape" => self.parse_shape_body()?,
            "shapes" => self.parse_plural(Parser::parse_shape_body, Section::Shapes)?,
            _ => {
                return Err(ParseError::new(
                    DiagnosticCode::E010,
                    format!("unknown form keyword '{}'", keyword),
                    &tok.span,
                ));
            }
        }

        self.expect(&Token::RParen)?;
        Ok(())
    }

    /// Shared driver for the plural forms: `(shapes (Name ...) (Name ...))`.
    /// Declares the section even when no bodies follow, then desugars each
    /// parenthesized body through the singular parser.
    fn parse_plural(
        &mut self,
        body: fn(&mut Parser) -> Result<()>,
        section: Section,
    ) -> Result<()> {
        match section {
            Section::Mixins => {
                self.mixins.get_or_insert_with(IndexMap::new);
            }
            Section::Choices => {
                self.choices.get_or_insert_with(IndexMap::new);
            }
            Section::Shapes => {
                self.shapes.get_or_insert_with(IndexMap::new);
            }
        }
        while self.peek().token == Token::LParen {
            self.advance();
            body(self)?;
            self.expect(&Token::RParen)?;
        }
        Ok(())
    }

    // ── namespace / model ──────────────────────────────────

    fn parse_namespace(&mut self, kw_span: &Span) -> Result<()> {
        if self.namespace.is_some() {
            return Err(self.syntax_error("duplicate namespace declaration", kw_span));
        }
        let (ns, _) = self.expect_ident()?;
        self.namespace = Some(ns);
        Ok(())
    }

    fn parse_model(&mut self, kw_span: &Span) -> Result<()> {
        if self.model_seen {
            return Err(self.syntax_error("duplicate model declaration", kw_span));
        }
        self.model_seen = true;

        let (name, _) = self.expect_ident()?;
        self.name = name;

        // Version identifier like v7.0; the leading 'v' is stripped.
        let (version, _) = self.expect_ident()?;
        self.version = version.strip_prefix('v').unwrap_or(&version).to_string();

        if let Token::Str(_) = self.peek().token {
            if let Token::Str(desc) = self.advance().token {
                self.description = Some(desc);
            }
        }
        Ok(())
    }

    // ── mixin ──────────────────────────────────────────────

    fn parse_mixin_body(&mut self) -> Result<()> {
        let (name, span) = self.expect_ident()?;
        let type_params = self.parse_type_params()?;
        let includes = self.parse_include_list()?;
        let fields = self.parse_fields()?;
        self.mixins.get_or_insert_with(IndexMap::new).insert(
            name.clone(),
            Mixin {
                name,
                type_params,
                includes,
                fields,
                span,
            },
        );
        Ok(())
    }

    /// Optional type parameter declaration: `<T, U, ...>`.
    fn parse_type_params(&mut self) -> Result<Vec<String>> {
        let mut params = Vec::new();
        if self.match_token(&Token::LAngle) {
            params.push(self.expect_ident()?.0);
            while self.match_token(&Token::Comma) {
                params.push(self.expect_ident()?.0);
            }
            self.expect(&Token::RAngle)?;
        }
        Ok(params)
    }

    /// Optional bracket-delimited mixin include list: `[A B<int>]`.
    fn parse_include_list(&mut self) -> Result<Vec<MixinRef>> {
        let mut refs = Vec::new();
        if self.match_token(&Token::LBracket) {
            while matches!(self.peek().token, Token::Ident(_)) {
                refs.push(self.parse_mixin_ref()?);
            }
            self.expect(&Token::RBracket)?;
        }
        Ok(refs)
    }

    /// A mixin reference: `Name` or `Name<type_expr, ...>`.
    fn parse_mixin_ref(&mut self) -> Result<MixinRef> {
        let (name, span) = self.expect_ident()?;
        let mut type_args = Vec::new();
        if self.match_token(&Token::LAngle) {
            type_args.push(self.parse_type_expr()?);
            while self.match_token(&Token::Comma) {
                type_args.push(self.parse_type_expr()?);
            }
            self.expect(&Token::RAngle)?;
        }
        Ok(MixinRef { name, type_args, span })
    }

    // ── shape ──────────────────────────────────────────────

    fn parse_shape_body(&mut self) -> Result<()> {
        let (name, span) = self.expect_ident()?;
        let includes = self.parse_include_list()?;
        let fields = self.parse_fields()?;
        self.shapes.get_or_insert_with(IndexMap::new).insert(
            name.clone(),
            Shape {
                name,
                includes,
                fields,
                span,
            },
        );
        Ok(())
    }

    // ── choice ─────────────────────────────────────────────

    fn parse_choice_body(&mut self) -> Result<()> {
        let (name, span) = self.expect_ident()?;
        let mut common: Option<Vec<Field>> = None;
        let mut variants: Vec<Variant> = Vec::new();

        loop {
            let tok = self.peek().clone();
            match &tok.token {
                Token::RParen | Token::Eof => break,
                Token::LParen => {
                    self.advance();
                    let (block_name, block_span) = self.expect_ident()?;
                    let fields = self.parse_fields()?;
                    self.expect(&Token::RParen)?;

                    if block_name == "common" {
                        if common.is_some() {
                            return Err(self.syntax_error(
                                format!("duplicate common block in choice '{}'", name),
                                &block_span,
                            ));
                        }
                        common = Some(fields);
                    } else {
                        variants.push(Variant {
                            name: block_name,
                            fields,
                            has_body: true,
                            span: block_span,
                        });
                    }
                }
                Token::Ident(_) => {
                    let (vname, vspan) = self.expect_ident()?;
                    variants.push(Variant {
                        name: vname,
                        fields: Vec::new(),
                        has_body: false,
                        span: vspan,
                    });
                }
                other => {
                    return Err(self.syntax_error(
                        format!(
                            "expected variant name or '(' in choice '{}', got {}",
                            name,
                            other.describe()
                        ),
                        &tok.span,
                    ));
                }
            }
        }

        self.choices.get_or_insert_with(IndexMap::new).insert(
            name.clone(),
            Choice {
                name,
                common,
                variants,
                span,
            },
        );
        Ok(())
    }

    // ── fields ─────────────────────────────────────────────

    /// Parse `name: type_expr` lines until the next token pair is not
    /// IDENT ':' — bare identifiers (variant names) are left unconsumed.
    fn parse_fields(&mut self) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        while matches!(self.peek().token, Token::Ident(_)) && *self.peek2() == Token::Colon {
            let (name, span) = self.expect_ident()?;
            self.expect(&Token::Colon)?;
            let ty = self.parse_type_expr()?;
            fields.push(Field { name, ty, span });
        }
        Ok(fields)
    }

    // ── type expressions ───────────────────────────────────

    /// ```text
    /// type_expr := base_type ['?']
    /// base_type := IDENT ['<' type_expr {',' type_expr} '>']
    ///            | '[' type_expr ']'
    ///            | '{' type_expr ',' type_expr '}'
    /// ```
    fn parse_type_expr(&mut self) -> Result<TypeExpr> {
        let tok = self.peek().clone();
        let mut ty = match &tok.token {
            Token::LBracket => {
                self.advance();
                let element = self.parse_type_expr()?;
                self.expect(&Token::RBracket)?;
                TypeExpr::Collection {
                    element: Box::new(element),
                    nullable: false,
                }
            }
            Token::LBrace => {
                self.advance();
                let key = self.parse_type_expr()?;
                self.expect(&Token::Comma)?;
                let value = self.parse_type_expr()?;
                self.expect(&Token::RBrace)?;
                TypeExpr::Association {
                    key: Box::new(key),
                    value: Box::new(value),
                    nullable: false,
                }
            }
            Token::Ident(_) => {
                let (name, _) = self.expect_ident()?;
                let mut args = Vec::new();
                if self.match_token(&Token::LAngle) {
                    args.push(self.parse_type_expr()?);
                    while self.match_token(&Token::Comma) {
                        args.push(self.parse_type_expr()?);
                    }
                    self.expect(&Token::RAngle)?;
                }
                TypeExpr::Named {
                    name,
                    args,
                    nullable: false,
                }
            }
            other => {
                return Err(self.syntax_error(
                    format!("expected a type expression, got {}", other.describe()),
                    &tok.span,
                ));
            }
        };

        // '?' binds to the immediately preceding type position.
        if self.match_token(&Token::Question) {
            ty.set_nullable(true);
        }
        Ok(ty)
    }
}

enum Section {
    Mixins,
    Choices,
    Shapes,
}
