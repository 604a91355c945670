//! Helper Extractor
//!
//! Classifies the top-level declarations of the script section by syntax
//! tree node kind:
//!
//! | declaration                                   | helper                    |
//! |-----------------------------------------------|---------------------------|
//! | `function f(..) {..}`                         | function                  |
//! | `const f = function (..) {..}` / `(..) => ..` | function                  |
//! | `const f = (..) => \`..\``                    | template (static chunks)  |
//! | `const f = "..."`                             | template                  |
//! | `const f = \`..\``                            | template, if well formed  |
//!
//! Nested scopes are never inspected. A declaration that cannot be parsed or
//! materialised is skipped with a warning; the rest of the script still
//! yields its helpers.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, BindingPattern, Declaration, Expression, FormalParameters, Function,
    FunctionBody, IdentifierReference, Statement, TemplateLiteral, VariableDeclaration,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use regex::Regex;
use std::collections::BTreeSet;

use crate::error::{Diagnostic, SourceLocation};
use crate::ir::{CallableHandle, DestructureKind, Helper, HelperMap, Param, ParameterShape};

lazy_static! {
    static ref TAG_OPEN_RE: Regex = Regex::new(r"<([a-zA-Z][a-zA-Z0-9-]*)\b[^>]*?(/?)>").unwrap();
    static ref TAG_CLOSE_RE: Regex = Regex::new(r"</([a-zA-Z][a-zA-Z0-9-]*)\s*>").unwrap();
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][\w$]*$").unwrap();
    static ref PATTERN_NAME_RE: Regex = Regex::new(r"([A-Za-z_$][\w$]*)(\s*:)?").unwrap();
    static ref REST_PARAM_RE: Regex = Regex::new(r"\.\.\.\s*([A-Za-z_$][\w$]*)").unwrap();
    static ref DECLARATION_START_RE: Regex =
        Regex::new(r"^(?:export\s+)?(?:async\s+)?(?:function\b|const\s|let\s|var\s)").unwrap();
    static ref DECLARATION_NAME_RE: Regex = Regex::new(
        r"^(?:export\s+)?(?:async\s+)?(?:function\s*\*?\s*|const\s+|let\s+|var\s+)([A-Za-z_$][\w$]*)"
    )
    .unwrap();
}

/// Tags that never need a closing partner.
const VOID_TAGS: &[&str] = &["input", "br", "img", "hr"];

/// Helpers are emitted verbatim into a JavaScript module, so type syntax is
/// a parse error rather than something to strip.
fn source_type() -> SourceType {
    SourceType::mjs()
}

fn slice(source: &str, span: Span) -> &str {
    &source[span.start as usize..span.end as usize]
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE FRAGMENT CHECK
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether a bare template literal looks like a markup fragment.
///
/// Empty text passes. Text without a `{{` marker and without any tag is not a
/// template. Text with tags needs as many closing tags as opening ones, void
/// tags and `/>` self-closers excepted.
pub fn is_well_formed_template(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }

    let has_tags = TAG_OPEN_RE.is_match(text) || TAG_CLOSE_RE.is_match(text);
    if !text.contains("{{") && !has_tags {
        return false;
    }

    let opening = TAG_OPEN_RE
        .captures_iter(text)
        .filter(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let self_closed = caps.get(2).map(|m| !m.as_str().is_empty()).unwrap_or(false);
            !self_closed && !VOID_TAGS.contains(&name.as_str())
        })
        .count();
    let closing = TAG_CLOSE_RE
        .captures_iter(text)
        .filter(|caps| !VOID_TAGS.contains(&caps[1].to_ascii_lowercase().as_str()))
        .count();

    opening == closing
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALLABLE MATERIALISATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Verify that `source` stands on its own as a function value.
///
/// Each call parses in a fresh allocator, so one helper's failure can never
/// leak into another's.
pub fn materialize_callable(source: &str) -> Result<CallableHandle, String> {
    let allocator = Allocator::default();
    match Parser::new(&allocator, source, source_type()).parse_expression() {
        Ok(expr) => match expr {
            Expression::FunctionExpression(_) | Expression::ArrowFunctionExpression(_) => {
                Ok(CallableHandle::from_verified_source(source.to_string()))
            }
            _ => Err("declaration source is not a function value".to_string()),
        },
        Err(errors) => Err(errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unparsable function source".to_string())),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

fn collect_binding_names(pattern: &BindingPattern, source: &str, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            names.push(id.name.to_string());
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_names(&prop.value, source, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_names(&rest.argument, source, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for pattern in arr.elements.iter().flatten() {
                collect_binding_names(pattern, source, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_names(&rest.argument, source, names);
            }
        }
        // `name = default` inside a pattern
        other => {
            let left = binding_target(slice(source, other.span()));
            if IDENTIFIER_RE.is_match(left) {
                names.push(left.to_string());
            }
        }
    }
}

/// Text left of a top-level default `=`.
fn binding_target(param_source: &str) -> &str {
    match top_level_default_index(param_source) {
        Some(index) => param_source[..index].trim(),
        None => param_source.trim(),
    }
}

/// Index of a `=` outside brackets and strings that is an assignment, not
/// a comparison or an arrow.
fn top_level_default_index(param_source: &str) -> Option<usize> {
    let bytes = param_source.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == b'\\' {
                i += 1;
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            b'"' | b'\'' | b'`' => quote = Some(c),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if next != b'=' && next != b'>' && !matches!(prev, b'=' | b'!' | b'<' | b'>') {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

fn has_top_level_default(param_source: &str) -> bool {
    top_level_default_index(param_source).is_some()
}

/// Parameter recovered from its text alone.
fn fallback_param(item_source: &str) -> Param {
    let has_default = has_top_level_default(item_source);
    let target = binding_target(item_source);
    let kind = match target.chars().next() {
        Some('{') => DestructureKind::Object,
        Some('[') => DestructureKind::Array,
        _ => {
            return Param::Named {
                name: target.to_string(),
                has_default,
            }
        }
    };
    // Keys followed by `:` are renamed away; everything else binds
    let bindings = PATTERN_NAME_RE
        .captures_iter(target)
        .filter(|caps| caps.get(2).is_none())
        .map(|caps| caps[1].to_string())
        .collect();
    Param::Destructured {
        kind,
        bindings,
        has_default,
    }
}

fn parameter_shape(params: &FormalParameters, source: &str) -> ParameterShape {
    let mut shape = ParameterShape {
        source: slice(source, params.span).to_string(),
        params: Vec::new(),
    };

    for item in &params.items {
        let item_source = slice(source, item.span);
        let has_default = has_top_level_default(item_source);

        let param = match &item.pattern {
            BindingPattern::BindingIdentifier(id) => Param::Named {
                name: id.name.to_string(),
                has_default,
            },
            BindingPattern::ObjectPattern(_) | BindingPattern::ArrayPattern(_) => {
                let kind = if matches!(item.pattern, BindingPattern::ObjectPattern(_)) {
                    DestructureKind::Object
                } else {
                    DestructureKind::Array
                };
                let mut bindings = Vec::new();
                collect_binding_names(&item.pattern, source, &mut bindings);
                Param::Destructured {
                    kind,
                    bindings,
                    has_default,
                }
            }
            // Defaulted parameter in layouts that wrap the pattern
            _ => fallback_param(item_source),
        };
        shape.params.push(param);
    }

    // The rest parameter is always last: look only past the final item
    let tail_start = params
        .items
        .last()
        .map(|item| item.span.end)
        .unwrap_or(params.span.start);
    let tail = &source[tail_start as usize..params.span.end as usize];
    if let Some(caps) = REST_PARAM_RE.captures(tail) {
        shape.params.push(Param::Rest {
            name: caps[1].to_string(),
        });
    }

    shape
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATION CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct ReferenceCollector {
    names: BTreeSet<String>,
}

impl<'a> Visit<'a> for ReferenceCollector {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.names.insert(ident.name.to_string());
    }
}

/// Non-fatal per-declaration failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionWarning {
    pub name: Option<String>,
    pub message: String,
    /// Byte offset into the script text
    pub offset: usize,
}

struct Classified {
    helper: Helper,
    /// Every identifier the body refers to; narrowed to helper names later
    referenced: BTreeSet<String>,
}

type DeclOutcome = Result<Classified, ExtractionWarning>;

struct DeclarationClassifier<'s> {
    source: &'s str,
    /// Offset of `source` inside the whole script
    base: usize,
    outcomes: Vec<DeclOutcome>,
}

impl<'s> DeclarationClassifier<'s> {
    fn new(source: &'s str, base: usize) -> Self {
        Self {
            source,
            base,
            outcomes: Vec::new(),
        }
    }

    fn classify_statements(&mut self, body: &[Statement]) {
        for stmt in body {
            match stmt {
                Statement::FunctionDeclaration(func) => self.function_declaration(func),
                Statement::VariableDeclaration(decl) => self.variable_declaration(decl),
                Statement::ExportNamedDeclaration(export) => match &export.declaration {
                    Some(Declaration::FunctionDeclaration(func)) => self.function_declaration(func),
                    Some(Declaration::VariableDeclaration(decl)) => self.variable_declaration(decl),
                    _ => {}
                },
                _ => {}
            }
        }
    }

    fn function_declaration(&mut self, func: &Function) {
        let Some(id) = &func.id else {
            return;
        };
        let outcome = self.function_helper(
            id.name.to_string(),
            func.span,
            &func.params,
            func.body.as_deref(),
        );
        self.outcomes.push(outcome);
    }

    fn variable_declaration(&mut self, decl: &VariableDeclaration) {
        for declarator in &decl.declarations {
            let BindingPattern::BindingIdentifier(id) = &declarator.id else {
                continue;
            };
            let Some(init) = &declarator.init else {
                continue;
            };
            let name = id.name.to_string();

            let outcome = match unwrap_parens(init) {
                Expression::FunctionExpression(func) => {
                    self.function_helper(name, func.span, &func.params, func.body.as_deref())
                }
                Expression::ArrowFunctionExpression(arrow) => match arrow_template_body(arrow) {
                    Some(tpl) => Ok(template_helper(name, static_chunks(tpl))),
                    None => self.function_helper(name, arrow.span, &arrow.params, Some(&*arrow.body)),
                },
                Expression::StringLiteral(s) => Ok(template_helper(name, s.value.to_string())),
                Expression::TemplateLiteral(tpl) => {
                    let text = static_chunks(tpl);
                    if !is_well_formed_template(&text) {
                        tracing::trace!(name = %name, "template literal is not a markup fragment");
                        continue;
                    }
                    Ok(template_helper(name, text))
                }
                _ => continue,
            };
            self.outcomes.push(outcome);
        }
    }

    fn function_helper(
        &self,
        name: String,
        span: Span,
        params: &FormalParameters,
        body: Option<&FunctionBody>,
    ) -> DeclOutcome {
        let callable_source = slice(self.source, span);
        let callable = materialize_callable(callable_source).map_err(|message| ExtractionWarning {
            name: Some(name.clone()),
            message: format!("helper '{}' skipped: {}", name, message),
            offset: self.base + span.start as usize,
        })?;

        let mut collector = ReferenceCollector::default();
        collector.visit_formal_parameters(params);
        if let Some(body) = body {
            collector.visit_function_body(body);
        }

        Ok(Classified {
            helper: Helper::Function {
                name,
                parameter_shape: parameter_shape(params, self.source),
                body_text: body
                    .map(|b| slice(self.source, b.span).to_string())
                    .unwrap_or_default(),
                callable,
                references: Vec::new(),
            },
            referenced: collector.names,
        })
    }
}

fn template_helper(name: String, literal_text: String) -> Classified {
    Classified {
        helper: Helper::Template { name, literal_text },
        referenced: BTreeSet::new(),
    }
}

fn unwrap_parens<'b, 'a>(mut expr: &'b Expression<'a>) -> &'b Expression<'a> {
    while let Expression::ParenthesizedExpression(paren) = expr {
        expr = &paren.expression;
    }
    expr
}

/// `(..) => \`..\`` with nothing but the template literal as its body.
fn arrow_template_body<'b, 'a>(
    arrow: &'b ArrowFunctionExpression<'a>,
) -> Option<&'b TemplateLiteral<'a>> {
    if !arrow.expression || arrow.body.statements.len() != 1 {
        return None;
    }
    match &arrow.body.statements[0] {
        Statement::ExpressionStatement(stmt) => match unwrap_parens(&stmt.expression) {
            Expression::TemplateLiteral(tpl) => Some(&**tpl),
            _ => None,
        },
        _ => None,
    }
}

/// Raw text of the literal's static chunks, interpolations dropped.
fn static_chunks(tpl: &TemplateLiteral) -> String {
    tpl.quasis
        .iter()
        .map(|quasi| quasi.value.raw.as_str())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// FAILURE ISOLATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Index just past the string opening at `start`. Plain quotes end at a
/// newline when unterminated.
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'\n' if quote != b'`' => return i,
            c if c == quote => return i + 1,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Split a script into top-level declaration chunks `(offset, text)`.
///
/// A chunk starts at a declaration keyword that either begins an unindented
/// line or follows a statement boundary (`;`, newline, closing `}`) at
/// bracket depth 0. An unindented keyword resets the depth, so an unclosed
/// bracket only ever spoils its own declaration.
fn split_top_level_declarations(script: &str) -> Vec<(usize, &str)> {
    let bytes = script.as_bytes();
    let mut starts = vec![0usize];
    let mut depth = 0i32;
    let mut at_boundary = true;
    let mut line_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'\n' {
            line_start = true;
            if depth == 0 {
                at_boundary = true;
            }
            i += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            line_start = false;
            i += 1;
            continue;
        }

        if c.is_ascii_alphabetic()
            && i > 0
            && (line_start || (at_boundary && depth == 0))
            && DECLARATION_START_RE.is_match(&script[i..])
        {
            starts.push(i);
            depth = 0;
        }
        line_start = false;
        at_boundary = false;

        match c {
            b'"' | b'\'' | b'`' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
                continue;
            }
            b'{' | b'(' | b'[' => depth += 1,
            b'}' | b')' | b']' => {
                depth = (depth - 1).max(0);
                if depth == 0 && c == b'}' {
                    at_boundary = true;
                }
            }
            b';' if depth == 0 => at_boundary = true,
            _ => {}
        }
        i += 1;
    }

    let mut chunks = Vec::with_capacity(starts.len());
    for (index, start) in starts.iter().enumerate() {
        let end = starts.get(index + 1).copied().unwrap_or(script.len());
        chunks.push((*start, &script[*start..end]));
    }
    chunks
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone)]
pub struct HelperExtraction {
    pub helpers: HelperMap,
    pub warnings: Vec<ExtractionWarning>,
}

impl HelperExtraction {
    /// Warnings as diagnostics positioned inside `script`.
    pub fn diagnostics(&self, script: &str) -> Vec<Diagnostic> {
        self.warnings
            .iter()
            .map(|w| Diagnostic::helper(w.message.clone(), SourceLocation::from_offset(script, w.offset)))
            .collect()
    }
}

fn parse_and_classify(source: &str, base: usize) -> Result<Vec<DeclOutcome>, String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(ret
            .errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unparsable script".to_string()));
    }

    let mut classifier = DeclarationClassifier::new(source, base);
    classifier.classify_statements(&ret.program.body);
    Ok(classifier.outcomes)
}

/// Extract every top-level helper from `script`.
pub fn extract_helpers(script: &str) -> HelperExtraction {
    let mut outcomes = Vec::new();
    let mut warnings = Vec::new();

    match parse_and_classify(script, 0) {
        Ok(found) => outcomes.extend(found),
        Err(message) => {
            tracing::debug!(error = %message, "script failed to parse as a whole, isolating declarations");
            for (offset, chunk) in split_top_level_declarations(script) {
                if chunk.trim().is_empty() {
                    continue;
                }
                match parse_and_classify(chunk, offset) {
                    Ok(found) => outcomes.extend(found),
                    Err(message) => {
                        let name = DECLARATION_NAME_RE
                            .captures(chunk.trim_start())
                            .map(|caps| caps[1].to_string());
                        let leading = chunk.len() - chunk.trim_start().len();
                        let message = match &name {
                            Some(n) => format!("helper '{}' skipped: {}", n, message),
                            None => format!("script fragment skipped: {}", message),
                        };
                        warnings.push(ExtractionWarning {
                            name,
                            message,
                            offset: offset + leading,
                        });
                    }
                }
            }
        }
    }

    let mut classified = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(c) => classified.push(c),
            Err(warning) => warnings.push(warning),
        }
    }

    // Later declarations of the same name win, as they would at runtime
    let names: BTreeSet<String> = classified.iter().map(|c| c.helper.name().to_string()).collect();
    let mut helpers = HelperMap::new();
    for Classified { mut helper, referenced } in classified {
        if let Helper::Function { name, references, .. } = &mut helper {
            *references = referenced
                .into_iter()
                .filter(|r| r != name && names.contains(r))
                .collect();
        }
        helpers.insert(helper.name().to_string(), helper);
    }

    warnings.sort_by_key(|w| w.offset);
    tracing::debug!(
        helpers = helpers.len(),
        warnings = warnings.len(),
        "extracted helpers"
    );

    HelperExtraction { helpers, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper<'h>(extraction: &'h HelperExtraction, name: &str) -> &'h Helper {
        extraction
            .helpers
            .get(name)
            .unwrap_or_else(|| panic!("missing helper {}", name))
    }

    #[test]
    fn test_function_declaration() {
        let out = extract_helpers("function greet(name) { return name; }");
        match helper(&out, "greet") {
            Helper::Function {
                parameter_shape,
                body_text,
                callable,
                ..
            } => {
                assert_eq!(parameter_shape.source, "(name)");
                assert_eq!(
                    parameter_shape.params,
                    vec![Param::Named {
                        name: "name".to_string(),
                        has_default: false
                    }]
                );
                assert_eq!(body_text, "{ return name; }");
                assert_eq!(callable.source(), "function greet(name) { return name; }");
            }
            other => panic!("expected function helper, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_template_literal() {
        let out = extract_helpers("const opt = `<option>{{x}}</option>`;");
        assert_eq!(
            helper(&out, "opt"),
            &Helper::Template {
                name: "opt".to_string(),
                literal_text: "<option>{{x}}</option>".to_string()
            }
        );
    }

    #[test]
    fn test_arrow_returning_template_is_template_helper() {
        let out = extract_helpers("const row = (item) => `<tr>${item.a}<td>{{b}}</td></tr>`;");
        assert_eq!(
            helper(&out, "row"),
            &Helper::Template {
                name: "row".to_string(),
                literal_text: "<tr><td>{{b}}</td></tr>".to_string()
            }
        );
    }

    #[test]
    fn test_raw_text_is_not_unescaped() {
        let out = extract_helpers(r"const t = `<b>\n{{x}}</b>`;");
        match helper(&out, "t") {
            Helper::Template { literal_text, .. } => assert_eq!(literal_text, r"<b>\n{{x}}</b>"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_arrow_and_function_expressions() {
        let out = extract_helpers(
            "const double = (n) => n * 2;\nlet shout = function (s) { return s + '!'; };\nvar sum = async ({ a, b }, [c, d] = [], ...rest) => { return a; };",
        );
        assert!(helper(&out, "double").is_function());
        assert!(helper(&out, "shout").is_function());
        match helper(&out, "sum") {
            Helper::Function {
                parameter_shape, ..
            } => {
                assert_eq!(
                    parameter_shape.params,
                    vec![
                        Param::Destructured {
                            kind: DestructureKind::Object,
                            bindings: vec!["a".to_string(), "b".to_string()],
                            has_default: false
                        },
                        Param::Destructured {
                            kind: DestructureKind::Array,
                            bindings: vec!["c".to_string(), "d".to_string()],
                            has_default: true
                        },
                        Param::Rest {
                            name: "rest".to_string()
                        },
                    ]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_string_literal_helper() {
        let out = extract_helpers(r#"const label = "Hello {{name}}";"#);
        assert_eq!(
            helper(&out, "label"),
            &Helper::Template {
                name: "label".to_string(),
                literal_text: "Hello {{name}}".to_string()
            }
        );
    }

    #[test]
    fn test_non_template_literals_are_ignored() {
        let out = extract_helpers("const msg = `plain text`;\nconst bad = `<div><span></div>`;\nconst n = 4;");
        assert!(out.helpers.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_nested_declarations_are_ignored() {
        let out = extract_helpers("function outer() { function inner() {} const t = 'x'; }");
        let names: Vec<&String> = out.helpers.keys().collect();
        assert_eq!(names, vec!["outer"]);
    }

    #[test]
    fn test_exported_declarations() {
        let out = extract_helpers("export function a() {}\nexport const b = '<i></i>';");
        assert!(out.helpers.contains_key("a"));
        assert!(out.helpers.contains_key("b"));
    }

    #[test]
    fn test_references_between_helpers() {
        let out = extract_helpers(
            "function wrap(x) { return bold(x) + Math.max(1, 2); }\nfunction bold(x) { return '<b>' + x + '</b>'; }",
        );
        match helper(&out, "wrap") {
            Helper::Function { references, .. } => assert_eq!(references, &vec!["bold".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_broken_declaration_is_skipped() {
        let script = "function good(a) { return a; }\nconst broken = (x => { return x;\nconst opt = `<option>{{x}}</option>`;\nfunction alsoGood() { return 1; }";
        let out = extract_helpers(script);
        assert!(out.helpers.contains_key("good"));
        assert!(out.helpers.contains_key("opt"));
        assert!(out.helpers.contains_key("alsoGood"));
        assert!(!out.helpers.contains_key("broken"));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].name.as_deref(), Some("broken"));

        let diagnostics = out.diagnostics(script);
        assert_eq!(diagnostics[0].code, crate::error::WARN_HELPER_EXTRACTION);
        assert_eq!(diagnostics[0].line, 2);
    }

    #[test]
    fn test_type_annotations_are_rejected() {
        let script = "function typed(x: string) { return x; }\nfunction plain(x) { return x; }";
        let out = extract_helpers(script);
        assert!(out.helpers.contains_key("plain"));
        assert!(!out.helpers.contains_key("typed"));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].name.as_deref(), Some("typed"));
        assert_eq!(out.warnings[0].offset, 0);
        assert!(materialize_callable("(x: number) => x").is_err());
    }

    #[test]
    fn test_split_top_level_declarations() {
        let script = "const a = { x: 1,\n  y: 'const z = 2' };\nfunction b() { const c = 1; }\nlet d = 1; var e = 2";
        let chunks: Vec<&str> = split_top_level_declarations(script)
            .into_iter()
            .map(|(_, c)| c.trim())
            .collect();
        assert_eq!(
            chunks,
            vec![
                "const a = { x: 1,\n  y: 'const z = 2' };",
                "function b() { const c = 1; }",
                "let d = 1;",
                "var e = 2"
            ]
        );
    }

    #[test]
    fn test_materialize_rejects_non_functions() {
        assert!(materialize_callable("function f() {}").is_ok());
        assert!(materialize_callable("(a) => a").is_ok());
        assert!(materialize_callable("42").is_err());
        assert!(materialize_callable("function (").is_err());
    }

    #[test]
    fn test_well_formed_template() {
        assert!(is_well_formed_template(""));
        assert!(is_well_formed_template("{{name}}"));
        assert!(is_well_formed_template("<li>{{x}}</li>"));
        assert!(is_well_formed_template("<label>A<input type=\"text\"><br></label>"));
        assert!(is_well_formed_template("<div><my-icon /></div>"));
        assert!(!is_well_formed_template("just words"));
        assert!(!is_well_formed_template("<div><span></div>"));
    }

    #[test]
    fn test_default_detection() {
        assert!(has_top_level_default("a = 1"));
        assert!(has_top_level_default("{ a } = {}"));
        assert!(!has_top_level_default("{ a = 1 }"));
        assert!(!has_top_level_default("a"));
    }
}
