//! IR node types for parsed Forma hub models.
//!
//! The parser produces a [`Model`] — the raw IR. It is never mutated after
//! parsing; mixin expansion derives a separate structure
//! ([`crate::resolver::ExpandedModel`]) so the raw form stays inspectable.
//!
//! Spans are carried for error reporting but excluded from serialization,
//! so two parses of equivalent (e.g. singular vs. plural) forms serialize
//! identically.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::parser::tokenizer::Span;

/// Model header: `(model Name v1.0 "description")` plus `(namespace ...)`.
///
/// `name`/`version` are empty strings when the corresponding form was never
/// seen — the validator reports E002/E003 for those.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A parsed type expression.
///
/// The `?` suffix binds to the immediately preceding type position: a
/// nullable element inside `[...]` or `{...}` is represented on the inner
/// node, not propagated outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeExpr {
    /// `Name` or `Name<A, B>`
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<TypeExpr>,
        #[serde(default)]
        nullable: bool,
    },
    /// `[T]`
    Collection {
        element: Box<TypeExpr>,
        #[serde(default)]
        nullable: bool,
    },
    /// `{K, V}`
    Association {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
        #[serde(default)]
        nullable: bool,
    },
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named {
            name: name.into(),
            args: Vec::new(),
            nullable: false,
        }
    }

    pub fn nullable(&self) -> bool {
        match self {
            TypeExpr::Named { nullable, .. }
            | TypeExpr::Collection { nullable, .. }
            | TypeExpr::Association { nullable, .. } => *nullable,
        }
    }

    pub fn set_nullable(&mut self, value: bool) {
        match self {
            TypeExpr::Named { nullable, .. }
            | TypeExpr::Collection { nullable, .. }
            | TypeExpr::Association { nullable, .. } => *nullable = value,
        }
    }
}

impl std::fmt::Display for TypeExpr {
    /// Renders in source syntax: `Name<A, B>?`, `[T]`, `{K, V}?`.
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TypeExpr::Named { name, args, nullable } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
            TypeExpr::Collection { element, nullable } => {
                write!(f, "[{}]", element)?;
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
            TypeExpr::Association { key, value, nullable } => {
                write!(f, "{{{}, {}}}", key, value)?;
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
        }
    }
}

/// A `name: type` field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    #[serde(skip)]
    pub span: Span,
}

/// A reference to a mixin from a `[...]` include list: `Timestamped` or
/// `Versioned<Bird>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixinRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_args: Vec<TypeExpr>,
    #[serde(skip)]
    pub span: Span,
}

impl std::fmt::Display for MixinRef {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.type_args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.type_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// A non-instantiable field template, optionally generic, optionally
/// composed from other mixins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mixin {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<MixinRef>,
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub span: Span,
}

/// A named structured type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<MixinRef>,
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub span: Span,
}

/// One alternative of a choice. `has_body` distinguishes `(Card ...)` from
/// a bare `Cash` variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub has_body: bool,
    #[serde(skip)]
    pub span: Span,
}

/// Derived classification of a choice; never stored in the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceKind {
    /// All variants fieldless, no common block.
    EnumLike,
    /// At least one fielded variant, or a common block.
    UnionLike,
}

/// A named set of alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common: Option<Vec<Field>>,
    pub variants: Vec<Variant>,
    #[serde(skip)]
    pub span: Span,
}

impl Choice {
    pub fn kind(&self) -> ChoiceKind {
        if self.common.is_some() || self.variants.iter().any(|v| !v.fields.is_empty()) {
            ChoiceKind::UnionLike
        } else {
            ChoiceKind::EnumLike
        }
    }
}

/// What a bare type name resolves to within a model.
///
/// Resolution is total over identifiers: any undeclared name is an [`NameKind::Atom`],
/// left for satellites to define.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Shape,
    Choice,
    Mixin,
    Atom,
}

/// The raw IR for one `.forma` file.
///
/// Sections are `None` when never declared and `Some` (possibly empty) when
/// a form declared them — an empty declared section drives W017. Entries
/// preserve declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixins: Option<IndexMap<String, Mixin>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<IndexMap<String, Choice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shapes: Option<IndexMap<String, Shape>>,
}

impl Model {
    pub fn mixin(&self, name: &str) -> Option<&Mixin> {
        self.mixins.as_ref().and_then(|m| m.get(name))
    }

    pub fn choice(&self, name: &str) -> Option<&Choice> {
        self.choices.as_ref().and_then(|m| m.get(name))
    }

    pub fn shape(&self, name: &str) -> Option<&Shape> {
        self.shapes.as_ref().and_then(|m| m.get(name))
    }

    /// Classify a bare type name. Shape-to-shape references are name lookups
    /// into this table, so recursive and mutually recursive shapes need no
    /// special handling.
    pub fn classify(&self, name: &str) -> NameKind {
        if self.shape(name).is_some() {
            NameKind::Shape
        } else if self.choice(name).is_some() {
            NameKind::Choice
        } else if self.mixin(name).is_some() {
            NameKind::Mixin
        } else {
            NameKind::Atom
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: TypeExpr) -> Field {
        Field {
            name: name.to_string(),
            ty,
            span: Span::default(),
        }
    }

    #[test]
    fn test_type_expr_display() {
        let ty = TypeExpr::Association {
            key: Box::new(TypeExpr::named("string")),
            value: Box::new(TypeExpr::Collection {
                element: Box::new(TypeExpr::Named {
                    name: "json".to_string(),
                    args: Vec::new(),
                    nullable: true,
                }),
                nullable: false,
            }),
            nullable: true,
        };
        assert_eq!(ty.to_string(), "{string, [json?]}?");
    }

    #[test]
    fn test_named_wrapper_display() {
        let ty = TypeExpr::Named {
            name: "tree".to_string(),
            args: vec![TypeExpr::named("Category")],
            nullable: false,
        };
        assert_eq!(ty.to_string(), "tree<Category>");
    }

    #[test]
    fn test_choice_kind_enum_like() {
        let choice = Choice {
            name: "Color".to_string(),
            common: None,
            variants: vec![
                Variant {
                    name: "red".to_string(),
                    fields: Vec::new(),
                    has_body: false,
                    span: Span::default(),
                },
                Variant {
                    name: "green".to_string(),
                    fields: Vec::new(),
                    has_body: false,
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        };
        assert_eq!(choice.kind(), ChoiceKind::EnumLike);
    }

    #[test]
    fn test_choice_kind_union_like() {
        let choice = Choice {
            name: "Payment".to_string(),
            common: Some(vec![field("amount", TypeExpr::named("float"))]),
            variants: vec![
                Variant {
                    name: "Card".to_string(),
                    fields: vec![field("number", TypeExpr::named("string"))],
                    has_body: true,
                    span: Span::default(),
                },
                Variant {
                    name: "Cash".to_string(),
                    fields: Vec::new(),
                    has_body: false,
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        };
        assert_eq!(choice.kind(), ChoiceKind::UnionLike);
    }

    #[test]
    fn test_classify_falls_back_to_atom() {
        let model = Model::default();
        assert_eq!(model.classify("UUID"), NameKind::Atom);
    }
}
