//! Mixin composition resolver.
//!
//! Takes the raw IR and computes, for every mixin and shape, the fully
//! expanded field list: transitively included mixin fields with type
//! parameters substituted at each reference site.
//!
//! Cycle detection runs first as an iterative three-color depth-first
//! traversal over the include graph, so deeply nested cycles cannot
//! overflow the stack. Mixins on a cycle are reported once per cycle
//! (E091) and excluded from expansion; everything else still resolves.
//!
//! Structural problems found here (unknown includes, arity mismatches,
//! field collisions) are pushed onto the shared diagnostic list — the
//! resolver never aborts.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{Diagnostic, DiagnosticCode};
use crate::parser::ast::{Choice, Meta, Mixin, MixinRef, Model, Shape, TypeExpr};

/// A field in an expanded field set, tagged with the mixin (or shape) that
/// contributed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    /// The include-list entry the field came through, or the declaring
    /// entity itself for own fields.
    pub source: String,
}

/// The expanded IR: every mixin and shape flattened to its resolved field
/// set. Mixins that sit on a composition cycle are excluded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpandedModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub mixins: IndexMap<String, Vec<ResolvedField>>,
    pub choices: IndexMap<String, Choice>,
    pub shapes: IndexMap<String, Vec<ResolvedField>>,
}

impl ExpandedModel {
    /// Field names of an expanded shape, in resolution order.
    pub fn shape_field_names(&self, shape: &str) -> Vec<&str> {
        self.shapes
            .get(shape)
            .map(|fields| fields.iter().map(|f| f.name.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Expand every mixin and shape in `model`, accumulating structural
/// diagnostics. Always returns a (possibly partial) expanded model.
pub fn expand(model: &Model, diagnostics: &mut Vec<Diagnostic>) -> ExpandedModel {
    let mut resolver = Resolver {
        model,
        diagnostics,
        memo: HashMap::new(),
        in_cycle: HashSet::new(),
    };
    resolver.detect_cycles();

    let mut expanded = ExpandedModel {
        meta: model.meta.clone(),
        ..ExpandedModel::default()
    };

    if let Some(mixins) = &model.mixins {
        for name in mixins.keys() {
            if resolver.in_cycle.contains(name) {
                continue;
            }
            let fields = resolver.expand_mixin(name);
            expanded.mixins.insert(name.clone(), fields);
        }
    }

    if let Some(choices) = &model.choices {
        expanded.choices = choices.clone();
    }

    if let Some(shapes) = &model.shapes {
        for (name, shape) in shapes {
            let fields = resolver.expand_shape(shape);
            expanded.shapes.insert(name.clone(), fields);
        }
    }

    expanded
}

struct Resolver<'a> {
    model: &'a Model,
    diagnostics: &'a mut Vec<Diagnostic>,
    /// Per-mixin expanded field lists. Own fields keep their type
    /// parameters unsubstituted; substitution happens at each reference
    /// site over this list.
    memo: HashMap<String, Vec<ResolvedField>>,
    in_cycle: HashSet<String>,
}

impl Resolver<'_> {
    // ── Cycle detection ────────────────────────────────────

    /// Three-color depth-first search over the include graph, with an
    /// explicit stack. A back-edge to a gray node closes a cycle; each
    /// distinct cycle is reported once and its members marked.
    fn detect_cycles(&mut self) {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            Gray,
            Black,
        }

        let Some(mixins) = &self.model.mixins else {
            return;
        };

        let mut color: HashMap<&str, Color> = HashMap::new();
        for root in mixins.keys() {
            if color.contains_key(root.as_str()) {
                continue;
            }
            // (mixin name, next include index)
            let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
            color.insert(root, Color::Gray);

            while let Some(&mut (name, ref mut idx)) = stack.last_mut() {
                let Some(mixin) = mixins.get(name) else {
                    stack.pop();
                    continue;
                };
                if *idx >= mixin.includes.len() {
                    color.insert(name, Color::Black);
                    stack.pop();
                    continue;
                }
                let next = mixin.includes[*idx].name.as_str();
                *idx += 1;

                // Unknown includes are reported as E092 during expansion.
                if !mixins.contains_key(next) {
                    continue;
                }
                match color.get(next) {
                    None => {
                        color.insert(next, Color::Gray);
                        stack.push((next, 0));
                    }
                    Some(Color::Gray) => {
                        let start = stack
                            .iter()
                            .position(|&(n, _)| n == next)
                            .unwrap_or(0);
                        let members: Vec<&str> = stack[start..].iter().map(|&(n, _)| n).collect();
                        let already = members.iter().any(|m| self.in_cycle.contains(*m));
                        if !already {
                            let mut path: Vec<&str> = members.clone();
                            path.push(next);
                            self.diagnostics.push(Diagnostic::new(
                                DiagnosticCode::E091,
                                format!("circular mixin composition: {}", path.join(" -> ")),
                                format!("mixins.{}", next),
                            ));
                        }
                        for m in members {
                            self.in_cycle.insert(m.to_string());
                        }
                    }
                    Some(Color::Black) => {}
                }
            }
        }
    }

    // ── Mixin expansion ────────────────────────────────────

    /// Expand one mixin: composed fields first (in include-list order),
    /// then own fields. Memoized; cycle members resolve to an empty list.
    fn expand_mixin(&mut self, name: &str) -> Vec<ResolvedField> {
        if let Some(cached) = self.memo.get(name) {
            return cached.clone();
        }
        if self.in_cycle.contains(name) {
            return Vec::new();
        }
        let Some(mixin) = self.model.mixin(name) else {
            return Vec::new();
        };
        let location = format!("mixins.{}.includes", name);

        let mut fields: IndexMap<String, ResolvedField> = IndexMap::new();
        for include in &mixin.includes {
            let Some(referenced) = self.model.mixin(&include.name) else {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticCode::E092,
                    format!(
                        "mixin \"{}\" references unknown mixin \"{}\"",
                        name, include.name
                    ),
                    &location,
                ));
                continue;
            };
            if self.in_cycle.contains(&include.name) {
                continue;
            }
            self.check_arity(include, &referenced.type_params, &location);

            let subst = substitution_map(&referenced.type_params, &include.type_args);
            for resolved in self.expand_mixin(&include.name) {
                let ty = substitute(&resolved.ty, &subst);
                match fields.get(&resolved.name) {
                    Some(existing) => {
                        self.diagnostics.push(Diagnostic::new(
                            DiagnosticCode::E090,
                            format!(
                                "field \"{}\" is defined in both mixin \"{}\" and mixin \"{}\"",
                                resolved.name, existing.source, include.name
                            ),
                            &location,
                        ));
                    }
                    None => {
                        fields.insert(
                            resolved.name.clone(),
                            ResolvedField {
                                name: resolved.name,
                                ty,
                                source: include.name.clone(),
                            },
                        );
                    }
                }
            }
        }

        // Own fields collide with composed ones rather than shadowing
        // them; shadowing is a shape-level affordance only.
        for field in &mixin.fields {
            match fields.get(&field.name) {
                Some(existing) => {
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticCode::E090,
                        format!(
                            "field \"{}\" is defined in both mixin \"{}\" and mixin \"{}\"",
                            field.name, existing.source, name
                        ),
                        &location,
                    ));
                }
                None => {
                    fields.insert(
                        field.name.clone(),
                        ResolvedField {
                            name: field.name.clone(),
                            ty: field.ty.clone(),
                            source: name.to_string(),
                        },
                    );
                }
            }
        }

        let expanded: Vec<ResolvedField> = fields.into_values().collect();
        self.memo.insert(name.to_string(), expanded.clone());
        expanded
    }

    // ── Shape expansion ────────────────────────────────────

    /// Expand a shape's include list, then layer own fields on top. Own
    /// fields replace same-named mixin fields in place (W012), never error.
    fn expand_shape(&mut self, shape: &Shape) -> Vec<ResolvedField> {
        let location = format!("shapes.{}.includes", shape.name);
        let mut fields: IndexMap<String, ResolvedField> = IndexMap::new();

        for include in &shape.includes {
            let Some(referenced) = self.model.mixin(&include.name) else {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::E084,
                        format!(
                            "unknown mixin \"{}\" in shape \"{}\"",
                            include.name, shape.name
                        ),
                        &location,
                    )
                    .with_span(include.span.clone()),
                );
                continue;
            };
            if self.in_cycle.contains(&include.name) {
                continue;
            }
            self.check_arity(include, &referenced.type_params, &location);

            let subst = substitution_map(&referenced.type_params, &include.type_args);
            for resolved in self.expand_mixin(&include.name) {
                let ty = substitute(&resolved.ty, &subst);
                match fields.get(&resolved.name) {
                    Some(existing) => {
                        self.diagnostics.push(Diagnostic::new(
                            DiagnosticCode::E090,
                            format!(
                                "field \"{}\" is defined in both mixin \"{}\" and mixin \"{}\"",
                                resolved.name, existing.source, include.name
                            ),
                            &location,
                        ));
                    }
                    None => {
                        fields.insert(
                            resolved.name.clone(),
                            ResolvedField {
                                name: resolved.name,
                                ty,
                                source: include.name.clone(),
                            },
                        );
                    }
                }
            }
        }

        for field in &shape.fields {
            let own = ResolvedField {
                name: field.name.clone(),
                ty: field.ty.clone(),
                source: shape.name.clone(),
            };
            if let Some(existing) = fields.get(&field.name) {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::W012,
                        format!(
                            "field \"{}\" in shape \"{}\" shadows mixin field from \"{}\"",
                            field.name, shape.name, existing.source
                        ),
                        format!("shapes.{}.fields.{}", shape.name, field.name),
                    )
                    .with_span(field.span.clone()),
                );
                // Replace in place so the mixin's field position is kept.
                fields.insert(field.name.clone(), own);
            } else {
                fields.insert(field.name.clone(), own);
            }
        }

        fields.into_values().collect()
    }

    // ── Shared checks ──────────────────────────────────────

    fn check_arity(&mut self, include: &MixinRef, params: &[String], location: &str) {
        let supplied = include.type_args.len();
        let expected = params.len();
        if supplied == expected {
            return;
        }
        let message = if expected > 0 && supplied == 0 {
            format!(
                "mixin \"{}\" requires {} type argument(s), got 0",
                include.name, expected
            )
        } else if expected == 0 {
            format!(
                "mixin \"{}\" is not generic but got {} type argument(s)",
                include.name, supplied
            )
        } else {
            format!(
                "mixin \"{}\" requires {} type argument(s), got {}",
                include.name, expected, supplied
            )
        };
        self.diagnostics.push(
            Diagnostic::new(DiagnosticCode::E086, message, location)
                .with_span(include.span.clone()),
        );
    }
}

fn substitution_map(params: &[String], args: &[TypeExpr]) -> HashMap<String, TypeExpr> {
    params
        .iter()
        .zip(args.iter())
        .map(|(p, a)| (p.clone(), a.clone()))
        .collect()
}

/// Structural substitution over a type expression. A bare named type whose
/// name is a bound parameter is replaced with the argument; nullability at
/// the occurrence site is preserved by OR-ing it onto the replacement.
fn substitute(ty: &TypeExpr, subst: &HashMap<String, TypeExpr>) -> TypeExpr {
    if subst.is_empty() {
        return ty.clone();
    }
    match ty {
        TypeExpr::Named { name, args, nullable } => {
            if args.is_empty() {
                if let Some(replacement) = subst.get(name) {
                    let mut out = replacement.clone();
                    if *nullable {
                        out.set_nullable(true);
                    }
                    return out;
                }
            }
            TypeExpr::Named {
                name: name.clone(),
                args: args.iter().map(|a| substitute(a, subst)).collect(),
                nullable: *nullable,
            }
        }
        TypeExpr::Collection { element, nullable } => TypeExpr::Collection {
            element: Box::new(substitute(element, subst)),
            nullable: *nullable,
        },
        TypeExpr::Association { key, value, nullable } => TypeExpr::Association {
            key: Box::new(substitute(key, subst)),
            value: Box::new(substitute(value, subst)),
            nullable: *nullable,
        },
    }
}
