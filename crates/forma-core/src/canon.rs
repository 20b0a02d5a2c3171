//! Canonical form and model fingerprinting.
//!
//! Renders a parsed model into a single deterministic text form used for
//! comparison and hashing: fixed section order, entries sorted by name,
//! fields kept in declared order (field order is part of a shape's
//! meaning, entry order is not).
//!
//! # Guarantees
//!
//! - **Deterministic**: same model always produces the same text
//! - **Order-insensitive**: declaration order of entries never changes
//!   the fingerprint
//! - **Semantic**: comments, whitespace, and singular-vs-plural spelling
//!   never change the fingerprint

use sha2::{Digest, Sha256};

use crate::parser::ast::{Choice, Field, Mixin, MixinRef, Model, Shape};

/// Render the canonical text form of a model.
pub fn canonical_text(model: &Model) -> String {
    let mut out = String::new();

    if let Some(meta) = &model.meta {
        if let Some(ns) = &meta.namespace {
            out.push_str(&format!("(namespace {})\n", ns));
        }
        out.push_str(&format!("(model {} v{}", meta.name, meta.version));
        if let Some(desc) = &meta.description {
            out.push_str(&format!(" \"{}\"", escape(desc)));
        }
        out.push_str(")\n");
    }

    if let Some(mixins) = &model.mixins {
        let mut entries: Vec<&Mixin> = mixins.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for mixin in entries {
            out.push_str(&render_mixin(mixin));
        }
    }

    if let Some(choices) = &model.choices {
        let mut entries: Vec<&Choice> = choices.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for choice in entries {
            out.push_str(&render_choice(choice));
        }
    }

    if let Some(shapes) = &model.shapes {
        let mut entries: Vec<&Shape> = shapes.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for shape in entries {
            out.push_str(&render_shape(shape));
        }
    }

    out
}

/// SHA-256 of the canonical text, hex-encoded.
pub fn fingerprint(model: &Model) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_text(model).as_bytes());
    format!("{:x}", hasher.finalize())
}

// ── Rendering ──────────────────────────────────────────────

fn render_mixin(mixin: &Mixin) -> String {
    let mut out = format!("(mixin {}", mixin.name);
    if !mixin.type_params.is_empty() {
        out.push_str(&format!("<{}>", mixin.type_params.join(", ")));
    }
    out.push_str(&render_includes(&mixin.includes));
    out.push_str(&render_fields(&mixin.fields));
    out.push_str(")\n");
    out
}

fn render_shape(shape: &Shape) -> String {
    let mut out = format!("(shape {}", shape.name);
    out.push_str(&render_includes(&shape.includes));
    out.push_str(&render_fields(&shape.fields));
    out.push_str(")\n");
    out
}

fn render_choice(choice: &Choice) -> String {
    let mut out = format!("(choice {}", choice.name);
    if let Some(common) = &choice.common {
        out.push_str(" (common");
        out.push_str(&render_fields(common));
        out.push(')');
    }
    for variant in &choice.variants {
        if variant.has_body {
            out.push_str(&format!(" ({}", variant.name));
            out.push_str(&render_fields(&variant.fields));
            out.push(')');
        } else {
            out.push_str(&format!(" {}", variant.name));
        }
    }
    out.push_str(")\n");
    out
}

fn render_includes(includes: &[MixinRef]) -> String {
    if includes.is_empty() {
        return String::new();
    }
    let refs: Vec<String> = includes.iter().map(|r| r.to_string()).collect();
    format!(" [{}]", refs.join(" "))
}

fn render_fields(fields: &[Field]) -> String {
    let mut out = String::new();
    for field in fields {
        out.push_str(&format!(" {}: {}", field.name, field.ty));
    }
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
