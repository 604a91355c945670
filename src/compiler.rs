//! Compilation pipeline
//!
//! raw text → sections → placeholders + helpers → scoped styles → module.
//!
//! [`compile`] runs one document. [`Compiler`] adds an optional shared
//! [`ResultCache`] and parallel batch compilation.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{compute_hash, CacheKey, ResultCache};
use crate::codegen::assemble;
use crate::error::CompilerError;
use crate::helpers::{extract_helpers, HelperExtraction};
use crate::ir::CompilationResult;
use crate::parse::{extract, Extraction};
use crate::style::{HashMode, StyleConfig, StyleScoper, DEFAULT_CLASS_NAME_PATTERN};
use crate::validate::{required_helpers, validate};

pub const FALLBACK_COMPONENT_NAME: &str = "component";

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub production_mode: bool,
    /// Ship handshake data in development builds
    pub include_handshake: bool,
    pub hash_mode: HashMode,
    pub source_maps: bool,
    pub source_path: Option<String>,
    /// Overrides the name derived from `source_path`
    pub component_name: Option<String>,
    pub class_name_pattern: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            production_mode: false,
            include_handshake: true,
            hash_mode: HashMode::Development,
            source_maps: false,
            source_path: None,
            component_name: None,
            class_name_pattern: None,
        }
    }
}

impl CompileOptions {
    pub fn development() -> Self {
        Self::default()
    }

    pub fn production() -> Self {
        Self {
            production_mode: true,
            hash_mode: HashMode::Production,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_source_path(mut self, source_path: impl Into<String>) -> Self {
        self.source_path = Some(source_path.into());
        self
    }

    /// SHA-256 of the options' JSON form.
    pub fn fingerprint(&self) -> String {
        compute_hash(&serde_json::to_string(self).unwrap_or_default())
    }

    pub fn style_config(&self) -> StyleConfig {
        StyleConfig {
            hash_mode: self.hash_mode,
            pattern: self
                .class_name_pattern
                .clone()
                .unwrap_or_else(|| DEFAULT_CLASS_NAME_PATTERN.to_string()),
        }
    }

    /// Explicit name, else the file stem of `source_path`, restricted to
    /// `[A-Za-z0-9_-]`.
    pub fn component_name(&self) -> String {
        let candidate = self.component_name.clone().or_else(|| {
            self.source_path
                .as_deref()
                .and_then(|p| Path::new(p).file_stem())
                .map(|stem| stem.to_string_lossy().into_owned())
        });

        let sanitized: String = candidate
            .unwrap_or_default()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if sanitized.chars().all(|c| c == '_') {
            FALLBACK_COMPONENT_NAME.to_string()
        } else {
            sanitized
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

fn source_map(result: &CompilationResult, source_path: &str, raw_text: &str) -> String {
    serde_json::json!({
        "version": 3,
        "file": format!("{}.js", result.component_name),
        "sources": [source_path],
        "sourcesContent": [raw_text],
        "names": [],
        "mappings": "",
    })
    .to_string()
}

/// Compile one component document.
pub fn compile(raw_text: &str, options: &CompileOptions) -> Result<CompilationResult, CompilerError> {
    let start = Instant::now();
    let source_path = options.source_path.clone().unwrap_or_default();
    let component_name = options.component_name();

    let Extraction {
        document,
        mut diagnostics,
    } = extract(raw_text, &source_path, &component_name)?;

    let placeholders = validate(&document.template_markup).map_err(|e| e.in_file(&source_path))?;

    let helpers = match &document.script_text {
        Some(script) => {
            let extraction = extract_helpers(script);
            diagnostics.extend(extraction.diagnostics(script));
            extraction
        }
        None => HelperExtraction::default(),
    };

    let scoper = StyleScoper::new(options.style_config());
    let scoped = document
        .style_text
        .as_deref()
        .map(|style| scoper.scope(style, &document.component_name));
    if let Some(scoped) = &scoped {
        diagnostics.extend(scoped.diagnostics.iter().cloned());
    }

    let mut result = assemble(&document, &helpers.helpers, scoped.as_ref(), options);
    result.required_helpers = required_helpers(&placeholders).into_iter().collect();
    result.diagnostics = diagnostics;

    let missing: Vec<&String> = result
        .required_helpers
        .iter()
        .filter(|name| !helpers.helpers.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        tracing::debug!(?missing, "placeholders reference helpers not declared in the script");
    }

    if options.source_maps {
        result.source_map = Some(source_map(&result, &source_path, raw_text));
    }
    result.timing_ms = start.elapsed().as_secs_f64() * 1000.0;

    tracing::debug!(
        component = %result.component_name,
        diagnostics = result.diagnostics.len(),
        timing_ms = result.timing_ms,
        "compiled component"
    );
    Ok(result)
}

/// One document for [`Compiler::compile_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Compiles documents with one set of options, optionally through a cache.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
    cache: Option<Arc<ResultCache>>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options, cache: None }
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compile(&self, raw_text: &str) -> Result<Arc<CompilationResult>, CompilerError> {
        self.compile_with(raw_text, &self.options)
    }

    /// Compile with `path` as the source path, so the component name follows
    /// the file name.
    pub fn compile_file(&self, path: &str, raw_text: &str) -> Result<Arc<CompilationResult>, CompilerError> {
        let options = self.options.clone().with_source_path(path);
        self.compile_with(raw_text, &options)
    }

    fn compile_with(
        &self,
        raw_text: &str,
        options: &CompileOptions,
    ) -> Result<Arc<CompilationResult>, CompilerError> {
        let Some(cache) = &self.cache else {
            return compile(raw_text, options).map(Arc::new);
        };

        let key = CacheKey::new(raw_text, options);
        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }
        let result = Arc::new(compile(raw_text, options)?);
        cache.set(key, Arc::clone(&result));
        Ok(result)
    }

    /// Compile every file in parallel. Results keep the input order.
    pub fn compile_batch(&self, files: &[SourceFile]) -> Vec<Result<Arc<CompilationResult>, CompilerError>> {
        files
            .par_iter()
            .map(|file| self.compile_file(&file.path, &file.text))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Compile `source` with options given as JSON. Returns the result as JSON;
/// fatal errors are thrown with the serialized `CompilerError` as reason.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_component_native(
    source: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = match options_json.as_deref() {
        Some(json) if !json.trim().is_empty() => CompileOptions::from_json(json)
            .map_err(|e| napi::Error::from_reason(format!("Invalid options: {}", e)))?,
        _ => CompileOptions::default(),
    };

    let result = compile(&source, &options).map_err(|e| {
        let reason = serde_json::to_string(&e).unwrap_or_else(|_| e.to_string());
        napi::Error::from_reason(reason)
    })?;

    serde_json::to_value(&result)
        .map_err(|e| napi::Error::from_reason(format!("Serialize error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = CompileOptions::default();
        assert!(options.include_handshake);
        assert!(!options.production_mode);
        assert_eq!(options.hash_mode, HashMode::Development);

        let prod = CompileOptions::production();
        assert!(prod.production_mode);
        assert_eq!(prod.hash_mode, HashMode::Production);
    }

    #[test]
    fn test_options_from_camel_case_json() {
        let options = CompileOptions::from_json(
            r#"{"productionMode": true, "hashMode": "production", "componentName": "nav"}"#,
        )
        .unwrap();
        assert!(options.production_mode);
        assert!(options.include_handshake);
        assert_eq!(options.hash_mode, HashMode::Production);
        assert_eq!(options.component_name.as_deref(), Some("nav"));
    }

    #[test]
    fn test_component_name_derivation() {
        let named = CompileOptions {
            component_name: Some("my card".to_string()),
            ..CompileOptions::default()
        };
        assert_eq!(named.component_name(), "my_card");

        let from_path = CompileOptions::default().with_source_path("src/components/user-card.html");
        assert_eq!(from_path.component_name(), "user-card");

        assert_eq!(CompileOptions::default().component_name(), FALLBACK_COMPONENT_NAME);
    }

    #[test]
    fn test_fingerprint_tracks_options() {
        let a = CompileOptions::development();
        let b = CompileOptions::development().with_source_path("a.html");
        assert_eq!(a.fingerprint(), CompileOptions::default().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_cached_compiler_reuses_results() {
        let cache = Arc::new(ResultCache::new());
        let compiler = Compiler::new(CompileOptions::default()).with_cache(Arc::clone(&cache));

        let first = compiler.compile("<p>{{ name }}</p>").unwrap();
        let second = compiler.compile("<p>{{ name }}</p>").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_batch_keeps_order() {
        let compiler = Compiler::new(CompileOptions::default());
        let files = vec![
            SourceFile::new("a.html", "<p>a</p>"),
            SourceFile::new("b.html", ""),
            SourceFile::new("c.html", "<style>.c{x:y}</style>"),
        ];
        let results = compiler.compile_batch(&files);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().component_name, "a");
        assert_eq!(
            results[1].as_ref().unwrap_err().code,
            crate::error::ERR_MISSING_TEMPLATE
        );
        assert!(results[2].as_ref().unwrap().is_style_only);
    }

    #[test]
    fn test_source_map_when_requested() {
        let options = CompileOptions {
            source_maps: true,
            ..CompileOptions::default().with_source_path("card.html")
        };
        let result = compile("<p>x</p>", &options).unwrap();
        let map: serde_json::Value = serde_json::from_str(result.source_map.as_deref().unwrap()).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["file"], "card.js");
        assert_eq!(map["sources"][0], "card.html");
    }
}
