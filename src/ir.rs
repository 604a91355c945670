//! Intermediate representation shared by every compiler stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Diagnostic;

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// One component document split into its sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDocument {
    pub template_markup: String,
    pub script_text: Option<String>,
    pub style_text: Option<String>,
    pub handshake_data: Option<serde_json::Value>,
    pub is_style_only: bool,
    pub source_path: String,
    /// Lowercase hex SHA-256 of the raw document text
    pub content_hash: String,
    pub component_name: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLACEHOLDERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Route,
    Save,
    Overwrite,
    Data,
    Render,
    ExtendedRender,
    Mix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSpec {
    pub kind: ActionKind,
    /// Helper identifier. Empty for an anonymous `[]` mix.
    pub name: String,
    /// Render produced by `?` / `??`
    #[serde(default)]
    pub conditional: bool,
}

/// One `{{ ... }}` occurrence in the template markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placeholder {
    /// Exact source slice including the braces
    pub raw_text: String,
    pub data_path: String,
    pub actions: Vec<ActionSpec>,
    pub output_name: Option<String>,
    pub source_offset: u32,
    pub line: u32,
    pub column: u32,
}

impl Placeholder {
    /// `@all` and `@root` address the whole render context.
    pub fn is_whole_context(&self) -> bool {
        self.data_path == "@all" || self.data_path == "@root"
    }

    /// Slash-delimited nested access, `a/b/c` -> `["a", "b", "c"]`.
    pub fn path_segments(&self) -> Vec<&str> {
        if self.data_path.is_empty() || self.is_whole_context() {
            return Vec::new();
        }
        self.data_path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn helper_names(&self) -> impl Iterator<Item = &str> {
        self.actions
            .iter()
            .filter(|a| !a.name.is_empty())
            .map(|a| a.name.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DestructureKind {
    Object,
    Array,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Param {
    #[serde(rename_all = "camelCase")]
    Named {
        name: String,
        has_default: bool,
    },
    #[serde(rename_all = "camelCase")]
    Destructured {
        kind: DestructureKind,
        bindings: Vec<String>,
        has_default: bool,
    },
    Rest {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParameterShape {
    /// Verbatim parameter list, parentheses included when present
    pub source: String,
    pub params: Vec<Param>,
}

/// Materialised function helper. Holds the verbatim declaration source that
/// parsed as a standalone expression, so it can be spliced into output code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallableHandle {
    source: String,
}

impl CallableHandle {
    pub(crate) fn from_verified_source(source: String) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Helper {
    #[serde(rename_all = "camelCase")]
    Function {
        name: String,
        parameter_shape: ParameterShape,
        body_text: String,
        callable: CallableHandle,
        /// Other top-level helpers the body refers to
        references: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Template { name: String, literal_text: String },
}

impl Helper {
    pub fn name(&self) -> &str {
        match self {
            Helper::Function { name, .. } | Helper::Template { name, .. } => name,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Helper::Function { .. })
    }
}

pub type HelperMap = BTreeMap<String, Helper>;

// ═══════════════════════════════════════════════════════════════════════════════
// STYLES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedClass {
    pub scoped_name: String,
    pub rule_content: String,
}

/// Original class name -> scoped class.
pub type ScopedClassMap = BTreeMap<String, ScopedClass>;

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    pub code: String,
    /// Original -> scoped class names, present iff a style section existed
    pub style_exports: Option<BTreeMap<String, String>>,
    pub used_style_variables: Vec<String>,
    pub is_style_only: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub timing_ms: f64,
    /// Rewritten stylesheet for external aggregation
    pub css: Option<String>,
    pub component_name: String,
    pub content_hash: String,
    pub required_helpers: Vec<String>,
    pub helper_names: Vec<String>,
    pub source_map: Option<String>,
}
