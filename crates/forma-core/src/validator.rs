//! Structural validation over the raw and expanded IR.
//!
//! The validator never throws for recoverable conditions: it runs every
//! pass, accumulates all errors and warnings it can find, and returns the
//! expanded model alongside the diagnostic list. Only the parser's own
//! syntax failures are fatal.
//!
//! Pass order: meta header, cross-section name uniqueness, mixins,
//! choices, mixin/shape expansion (which reports composition problems),
//! then shapes against the expanded IR.

use std::collections::BTreeSet;

use crate::error::{Diagnostic, DiagnosticCode};
use crate::parser::ast::{Model, NameKind, TypeExpr};
use crate::resolver::{self, ExpandedModel};

/// Run all validation passes over a parsed model.
///
/// Returns the expanded IR (mixins and shapes flattened to resolved field
/// sets) and every diagnostic found. The model is valid when no diagnostic
/// has error severity.
pub fn validate(model: &Model) -> (ExpandedModel, Vec<Diagnostic>) {
    let mut validator = Validator {
        model,
        diagnostics: Vec::new(),
    };
    validator.check_meta();
    validator.check_duplicate_names();
    validator.check_mixins();
    validator.check_choices();
    let expanded = resolver::expand(model, &mut validator.diagnostics);
    validator.check_shapes(&expanded);
    (expanded, validator.diagnostics)
}

/// True when the diagnostic list contains no errors.
pub fn is_valid(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .all(|d| d.severity != crate::error::Severity::Error)
}

struct Validator<'a> {
    model: &'a Model,
    diagnostics: Vec<Diagnostic>,
}

impl Validator<'_> {
    fn error(&mut self, code: DiagnosticCode, message: String, location: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(code, message, location));
    }

    // ── meta ───────────────────────────────────────────────

    fn check_meta(&mut self) {
        let Some(meta) = &self.model.meta else {
            self.error(
                DiagnosticCode::E001,
                "\"meta\" section is missing".to_string(),
                "meta",
            );
            return;
        };
        if meta.name.is_empty() {
            self.error(
                DiagnosticCode::E002,
                "\"meta.name\" is missing or empty".to_string(),
                "meta.name",
            );
        }
        if meta.version.is_empty() {
            self.error(
                DiagnosticCode::E003,
                "\"meta.version\" is missing or empty".to_string(),
                "meta.version",
            );
        }
        if meta.description.is_none() {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticCode::W013,
                "\"meta.description\" is missing",
                "meta",
            ));
        }
        if let Some(ns) = &meta.namespace {
            if !is_dotted_identifier(ns) {
                self.error(
                    DiagnosticCode::E004,
                    "\"meta.namespace\" must be a non-empty dotted identifier".to_string(),
                    "meta.namespace",
                );
            }
        }
    }

    // ── cross-section uniqueness ───────────────────────────

    /// E100: the same name declared in two of shapes/choices/mixins.
    /// Checked in section order so the message wording is deterministic.
    fn check_duplicate_names(&mut self) {
        let mut seen: Vec<(&str, &str)> = Vec::new(); // (name, section)

        let sections: [(&str, Vec<&str>); 3] = [
            (
                "shapes",
                self.model
                    .shapes
                    .as_ref()
                    .map(|s| s.keys().map(String::as_str).collect())
                    .unwrap_or_default(),
            ),
            (
                "choices",
                self.model
                    .choices
                    .as_ref()
                    .map(|s| s.keys().map(String::as_str).collect())
                    .unwrap_or_default(),
            ),
            (
                "mixins",
                self.model
                    .mixins
                    .as_ref()
                    .map(|s| s.keys().map(String::as_str).collect())
                    .unwrap_or_default(),
            ),
        ];

        for (section, names) in sections {
            for name in names {
                match seen.iter().find(|(n, _)| *n == name) {
                    Some((_, first_section)) => {
                        let message = format!(
                            "\"{}\" is defined in both \"{}\" and \"{}\"",
                            name, first_section, section
                        );
                        self.error(DiagnosticCode::E100, message, format!("{}.{}", section, name));
                    }
                    None => seen.push((name, section)),
                }
            }
        }
    }

    // ── mixins ─────────────────────────────────────────────

    fn check_mixins(&mut self) {
        let Some(mixins) = &self.model.mixins else {
            return;
        };
        if mixins.is_empty() {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticCode::W017,
                "\"mixins\" section is empty",
                "mixins",
            ));
            return;
        }
        for (name, mixin) in mixins {
            let location = format!("mixins.{}", name);
            if mixin.fields.is_empty() {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::E060,
                        format!("mixin \"{}\" has no fields", name),
                        &location,
                    )
                    .with_span(mixin.span.clone()),
                );
            }
            for field in &mixin.fields {
                // Types built purely from the mixin's own parameters are
                // checked at each reference site after substitution.
                if uses_only_params(&field.ty, &mixin.type_params) {
                    continue;
                }
                let field_location = format!("{}.fields.{}", location, field.name);
                self.check_type(&field.ty, &field_location);
            }
        }
    }

    // ── choices ────────────────────────────────────────────

    fn check_choices(&mut self) {
        let Some(choices) = &self.model.choices else {
            return;
        };
        if choices.is_empty() {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticCode::W017,
                "\"choices\" section is empty",
                "choices",
            ));
            return;
        }
        for (name, choice) in choices {
            let location = format!("choices.{}", name);

            if choice.variants.len() < 2 {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::E050,
                        format!(
                            "choice \"{}\" must have at least 2 variants (has {})",
                            name,
                            choice.variants.len()
                        ),
                        &location,
                    )
                    .with_span(choice.span.clone()),
                );
            }

            let mut seen: BTreeSet<&str> = BTreeSet::new();
            for variant in &choice.variants {
                let variant_location = format!("{}.{}", location, variant.name);
                if !seen.insert(&variant.name) {
                    self.error(
                        DiagnosticCode::E052,
                        format!("duplicate variant \"{}\" in choice \"{}\"", variant.name, name),
                        &variant_location,
                    );
                }
                if variant.has_body && variant.fields.is_empty() {
                    self.error(
                        DiagnosticCode::E051,
                        format!(
                            "variant \"{}\" in choice \"{}\" has an empty body",
                            variant.name, name
                        ),
                        &variant_location,
                    );
                }
                for field in &variant.fields {
                    let field_location = format!("{}.{}", variant_location, field.name);
                    self.check_type(&field.ty, &field_location);
                }
            }

            if let Some(common) = &choice.common {
                if common.is_empty() {
                    self.error(
                        DiagnosticCode::E053,
                        format!("\"common\" block in choice \"{}\" has no fields", name),
                        format!("{}.common", location),
                    );
                }
                for field in common {
                    let field_location = format!("{}.common.{}", location, field.name);
                    self.check_type(&field.ty, &field_location);
                }
            }
        }
    }

    // ── shapes ─────────────────────────────────────────────

    fn check_shapes(&mut self, expanded: &ExpandedModel) {
        let Some(shapes) = &self.model.shapes else {
            return;
        };
        if shapes.is_empty() {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticCode::W017,
                "\"shapes\" section is empty",
                "shapes",
            ));
            return;
        }
        for (name, shape) in shapes {
            let location = format!("shapes.{}", name);

            // Type arguments supplied at each include site.
            for include in &shape.includes {
                for arg in &include.type_args {
                    self.check_type(arg, &format!("{}.includes", location));
                }
            }

            for field in &shape.fields {
                let field_location = format!("{}.fields.{}", location, field.name);
                self.check_type(&field.ty, &field_location);
            }

            // Mixin-contributed fields, checked with substitution applied.
            if let Some(resolved) = expanded.shapes.get(name) {
                for field in resolved {
                    if field.source == *name {
                        continue;
                    }
                    let field_location =
                        format!("{}.includes.{}.{}", location, field.source, field.name);
                    self.check_type(&field.ty, &field_location);
                }
                if resolved.is_empty() {
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::E070,
                            format!("shape \"{}\" has no fields", name),
                            format!("{}.fields", location),
                        )
                        .with_span(shape.span.clone()),
                    );
                }
            }
        }
    }

    // ── type resolution ────────────────────────────────────

    /// Validate one type expression. Unresolved bare names are atoms and
    /// always valid; only a mixin name in type position is an error.
    fn check_type(&mut self, ty: &TypeExpr, location: &str) {
        match ty {
            TypeExpr::Named { name, args, .. } => {
                if name.is_empty() {
                    self.error(DiagnosticCode::E041, "empty type string".to_string(), location);
                    return;
                }
                if !args.is_empty() {
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticCode::W015,
                        format!("named wrapper \"{}\"", name),
                        location,
                    ));
                    for arg in args {
                        if arg.nullable() {
                            self.warn_nullable_element(arg, &format!("wrapper \"{}\"", name), location);
                        }
                        self.check_type(arg, location);
                    }
                } else if self.model.classify(name) == NameKind::Mixin {
                    self.error(
                        DiagnosticCode::E042,
                        format!(
                            "mixin \"{}\" cannot be used as a field type (use a shape instead)",
                            name
                        ),
                        location,
                    );
                }
            }
            TypeExpr::Collection { element, .. } => {
                if element.nullable() {
                    self.warn_nullable_element(element, "collection", location);
                }
                self.check_type(element, location);
            }
            TypeExpr::Association { key, value, .. } => {
                for arg in [key, value] {
                    if arg.nullable() {
                        self.warn_nullable_element(arg, "association", location);
                    }
                    self.check_type(arg, location);
                }
            }
        }
    }

    fn warn_nullable_element(&mut self, element: &TypeExpr, context: &str, location: &str) {
        self.diagnostics.push(Diagnostic::new(
            DiagnosticCode::W019,
            format!(
                "nullable element type \"{}\" inside {} — nullable collection elements are discouraged",
                element, context
            ),
            location,
        ));
    }
}

/// True when every leaf name in the type is one of `params`. Such types
/// are placeholders and only checkable after substitution.
fn uses_only_params(ty: &TypeExpr, params: &[String]) -> bool {
    if params.is_empty() {
        return false;
    }
    match ty {
        TypeExpr::Named { name, args, .. } => {
            if args.is_empty() {
                params.iter().any(|p| p == name)
            } else {
                args.iter().all(|a| uses_only_params(a, params))
            }
        }
        TypeExpr::Collection { element, .. } => uses_only_params(element, params),
        TypeExpr::Association { key, value, .. } => {
            uses_only_params(key, params) && uses_only_params(value, params)
        }
    }
}

/// Dotted identifier: one or more non-empty segments of word characters
/// separated by single dots.
fn is_dotted_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.split('.')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn validate_source(source: &str) -> (ExpandedModel, Vec<Diagnostic>) {
        let model = parse(source).expect("test input should parse");
        validate(&model)
    }

    fn errors(diagnostics: &[Diagnostic]) -> Vec<DiagnosticCode> {
        diagnostics
            .iter()
            .filter(|d| d.severity == crate::error::Severity::Error)
            .map(|d| d.code)
            .collect()
    }

    fn warnings(diagnostics: &[Diagnostic]) -> Vec<DiagnosticCode> {
        diagnostics
            .iter()
            .filter(|d| d.severity == crate::error::Severity::Warning)
            .map(|d| d.code)
            .collect()
    }

    const VALID_MODEL: &str = r#"
(namespace com.example.birds)
(model BirdTracker v1.0 "Track sightings of birds")

(mixin Timestamped
  created_at: datetime
  updated_at: datetime?)

(mixin Versioned<T>
  current: T
  history: [T])

(choice Status active retired)

(shape Bird [Timestamped Versioned<Bird>]
  name: string
  status: Status
  tags: [string]
  notes: {string, json})
"#;

    // ── end-to-end scenarios ──────────────────────────

    #[test]
    fn test_valid_model_has_no_errors() {
        let (expanded, diagnostics) = validate_source(VALID_MODEL);
        assert_eq!(errors(&diagnostics), vec![]);
        assert!(is_valid(&diagnostics));
        assert_eq!(
            expanded.shape_field_names("Bird"),
            vec!["created_at", "updated_at", "current", "history", "name", "status", "tags", "notes"]
        );
    }

    #[test]
    fn test_minimal_model_has_no_errors() {
        let (expanded, diagnostics) =
            validate_source("(model M v1.0)(shape User id: UUID name: string)");
        assert_eq!(errors(&diagnostics), vec![]);
        let fields: Vec<(String, String)> = expanded.shapes["User"]
            .iter()
            .map(|f| (f.name.clone(), f.ty.to_string()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("id".to_string(), "UUID".to_string()),
                ("name".to_string(), "string".to_string())
            ]
        );
    }

    #[test]
    fn test_transitive_inclusion_through_validate() {
        let (expanded, diagnostics) = validate_source(
            "(model T v1.0 \"d\")\n(mixin A created_at: datetime)\n(mixin B [A] created_by: UUID)\n(shape X [B] name: string)",
        );
        assert!(is_valid(&diagnostics));
        assert_eq!(
            expanded.shape_field_names("X"),
            vec!["created_at", "created_by", "name"]
        );
    }

    #[test]
    fn test_collision_yields_exactly_one_e090() {
        let (_, diagnostics) = validate_source(
            "(model T v1.0 \"d\")\n(mixin A x: int)\n(mixin B x: string)\n(mixin C [A B] y: int)",
        );
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E090]);
    }

    #[test]
    fn test_zero_variant_choice() {
        let (_, diagnostics) = validate_source("(model T v1.0 \"d\")\n(choice Status)");
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E050]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("at least 2 variants (has 0)")));
    }

    // ── meta ──────────────────────────────────────────

    #[test]
    fn test_missing_meta() {
        let (_, diagnostics) = validate_source("(shape Foo x: int)");
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E001]);
    }

    #[test]
    fn test_missing_description_warns() {
        let (_, diagnostics) = validate_source("(model T v1.0)\n(shape Foo x: int)");
        assert_eq!(warnings(&diagnostics), vec![DiagnosticCode::W013]);
        assert!(is_valid(&diagnostics));
    }

    #[test]
    fn test_namespace_without_model() {
        // A namespace alone yields a meta section with empty name/version.
        let (_, diagnostics) = validate_source("(namespace a.b)\n(shape Foo x: int)");
        let errs = errors(&diagnostics);
        assert!(errs.contains(&DiagnosticCode::E002));
        assert!(errs.contains(&DiagnosticCode::E003));
    }

    #[test]
    fn test_malformed_namespace() {
        let (_, diagnostics) = validate_source("(namespace a..b)\n(model T v1.0 \"d\")\n(shape Foo x: int)");
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E004]);
    }

    #[test]
    fn test_dotted_identifier() {
        assert!(is_dotted_identifier("com.example.birds"));
        assert!(is_dotted_identifier("single"));
        assert!(!is_dotted_identifier(""));
        assert!(!is_dotted_identifier("a..b"));
        assert!(!is_dotted_identifier(".a"));
        assert!(!is_dotted_identifier("a.b-c"));
    }

    // ── cross-section duplicates ──────────────────────

    #[test]
    fn test_duplicate_across_sections() {
        let (_, diagnostics) = validate_source(
            "(model T v1.0 \"d\")\n(shape Foo x: int)\n(choice Foo a b)",
        );
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E100]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message == "\"Foo\" is defined in both \"shapes\" and \"choices\""));
    }

    #[test]
    fn test_duplicate_mixin_name() {
        let (_, diagnostics) = validate_source(
            "(model T v1.0 \"d\")\n(shape Foo x: int)\n(mixin Foo y: int)",
        );
        assert!(errors(&diagnostics).contains(&DiagnosticCode::E100));
    }

    // ── mixins ────────────────────────────────────────

    #[test]
    fn test_empty_mixin() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(mixin M)\n(shape Foo x: int)");
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E060]);
    }

    #[test]
    fn test_generic_param_skips_type_check() {
        // T is an unparameterized mixin name elsewhere only by accident;
        // a pure-parameter type must not be resolved before substitution.
        let (_, diagnostics) = validate_source(
            "(model T v1.0 \"d\")\n(mixin V<T> current: T history: [T])\n(shape Foo [V<Bird>] x: int)",
        );
        assert!(is_valid(&diagnostics));
    }

    // ── choices ───────────────────────────────────────

    #[test]
    fn test_duplicate_variant() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(choice Color red red blue)");
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E052]);
    }

    #[test]
    fn test_empty_variant_body() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(choice P (Card) Cash)");
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E051]);
    }

    #[test]
    fn test_bare_variant_is_fine() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(choice P (Card number: string) Cash)");
        assert!(is_valid(&diagnostics));
    }

    #[test]
    fn test_empty_common_block() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(choice P (common) X Y)");
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E053]);
    }

    // ── shapes ────────────────────────────────────────

    #[test]
    fn test_mixin_as_field_type() {
        let (_, diagnostics) = validate_source(
            "(model T v1.0 \"d\")\n(mixin M x: int)\n(shape Foo m: M)",
        );
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E042]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("use a shape instead")));
    }

    #[test]
    fn test_shape_reference_is_fine() {
        let (_, diagnostics) = validate_source(
            "(model T v1.0 \"d\")\n(shape Bar y: int)\n(shape Foo bar: Bar other: Foo)",
        );
        assert!(is_valid(&diagnostics));
    }

    #[test]
    fn test_unknown_atom_is_fine() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(shape Foo id: UUID when: datetime)");
        assert!(is_valid(&diagnostics));
    }

    #[test]
    fn test_empty_shape() {
        let (_, diagnostics) = validate_source("(model T v1.0 \"d\")\n(shape Foo)");
        assert_eq!(errors(&diagnostics), vec![DiagnosticCode::E070]);
    }

    #[test]
    fn test_shape_empty_own_but_mixin_fields_ok() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(mixin M x: int)\n(shape Foo [M])");
        assert!(is_valid(&diagnostics));
    }

    // ── warnings ──────────────────────────────────────

    #[test]
    fn test_empty_sections_warn() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(shapes)\n(choices)\n(mixins)");
        let mut warns = warnings(&diagnostics);
        warns.sort_by_key(|c| format!("{}", c));
        assert_eq!(
            warns,
            vec![DiagnosticCode::W017, DiagnosticCode::W017, DiagnosticCode::W017]
        );
    }

    #[test]
    fn test_named_wrapper_warns() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(shape Foo cats: tree<Category>)");
        assert_eq!(warnings(&diagnostics), vec![DiagnosticCode::W015]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message == "named wrapper \"tree\""));
    }

    #[test]
    fn test_nullable_collection_element_warns() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(shape Foo xs: [string?])");
        assert_eq!(warnings(&diagnostics), vec![DiagnosticCode::W019]);
    }

    #[test]
    fn test_nullable_association_value_warns() {
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(shape Foo m: {string, json?})");
        assert_eq!(warnings(&diagnostics), vec![DiagnosticCode::W019]);
    }

    #[test]
    fn test_independent_nullable_markers_warn_separately() {
        // The outer '?' is on the collection itself and legal; only the
        // element's marker warns.
        let (_, diagnostics) =
            validate_source("(model T v1.0 \"d\")\n(shape Foo xs: [string?]?)");
        assert_eq!(warnings(&diagnostics), vec![DiagnosticCode::W019]);
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let (_, diagnostics) = validate_source(
            "(model T v1.0 \"d\")\n(shape Foo xs: [string?] cats: tree<Category>)",
        );
        assert!(is_valid(&diagnostics));
        assert!(!warnings(&diagnostics).is_empty());
    }
}
