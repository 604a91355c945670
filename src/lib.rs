//! # Component Document Compiler
//!
//! Compiles single-file component documents into a module descriptor.
//! A document mixes up to four sections in one file:
//!
//! - template markup with `{{ dataPath : actions : output }}` placeholders
//! - a `<script>` section declaring helpers (functions or string templates)
//! - a `<style>` section whose class names get scoped per component
//! - an optional `<script type="application/json">` handshake block with
//!   demo input data
//!
//! ## Pipeline Invariants
//!
//! 1. **Determinism**: identical `(raw text, options)` produce byte-identical
//!    `code` and identical scoped class maps. Every map reaching the output is
//!    ordered.
//!
//! 2. **Fatal vs. non-fatal**: a missing template, unbalanced placeholder
//!    braces and an unparsable handshake block abort the document with a
//!    [`CompilerError`]. A broken helper or style rule is skipped and reported
//!    as a [`Diagnostic`].
//!
//! 3. **Top-level only**: helpers are read from top-level declarations of the
//!    script's syntax tree, never from nested scopes.
//!
//! 4. **Scoping modes**: development hashes `component_class` and survives
//!    CSS edits; production hashes the serialized rule and changes with it.
//!
//! 5. **Production output** never carries handshake data.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod boundary;
pub mod cache;
pub mod codegen;
pub mod compiler;
pub mod discovery;
pub mod error;
pub mod handshake;
pub mod helpers;
pub mod ir;
pub mod markup;
pub mod parse;
pub mod style;
pub mod validate;
pub mod visitor;

#[cfg(test)]
mod pipeline_tests;

pub use boundary::{publish_styles, CollectedStyles, HotUpdate, StyleSink};
pub use cache::{CacheKey, ResultCache};
pub use codegen::assemble;
pub use compiler::{compile, CompileOptions, Compiler, SourceFile};
pub use error::{CompilerError, Diagnostic, ErrorKind, SourceLocation};
pub use helpers::{extract_helpers, HelperExtraction};
pub use ir::*;
pub use parse::extract;
pub use style::{HashMode, ScopedStyle, StyleConfig, StyleScoper};
pub use validate::{required_helpers, validate};

#[cfg(feature = "napi")]
pub use compiler::compile_component_native;

#[cfg(feature = "napi")]
#[napi]
pub fn compiler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
