//! Forma Core - Canonical implementation of the Forma hub schema language
//!
//! This is the single source of truth for Forma semantics. The CLI and any
//! future bindings build on this crate; it is pure and does no I/O.
//!
//! # Architecture
//!
//! ```text
//! Forma Text → Tokenizer → Parser → Raw IR
//!                                      ↓
//!                                  Resolver → Mixin Expansion + Substitution
//!                                      ↓
//!                                  Validator → Structural Checks + Diagnostics
//! ```
//!
//! Satellite documents are layered over the hub with [`overlay::merge`];
//! [`canon::fingerprint`] gives the model a stable semantic hash.
//!
//! # Guarantees
//!
//! - **Deterministic**: same input always produces identical IR and
//!   diagnostics
//! - **Complete**: validation never stops at the first structural problem
//! - **Canonical**: one fingerprint per model, independent of formatting
//!   and declaration order

pub mod canon;
pub mod error;
pub mod overlay;
pub mod parser;
pub mod resolver;
pub mod validator;

pub use error::{Diagnostic, DiagnosticCode, ParseError, Result, Severity};
pub use parser::ast::*;
pub use parser::parse;
pub use resolver::{ExpandedModel, ResolvedField};
pub use validator::{is_valid, validate};
