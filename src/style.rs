//! Style Scoper
//!
//! Turns the class names declared in a component's stylesheet into scoped
//! names that cannot clash with other components, rewrites the stylesheet's
//! selectors to use them, and rewrites `class` attributes in the template to
//! match.
//!
//! Scoped names follow a pattern, `[name]_[local]_[hash:base64:5]` unless
//! configured otherwise. The hash input depends on the [`HashMode`]:
//! development hashes `component_class` so names survive unrelated CSS edits;
//! production hashes the serialized rule so names change with the rule body.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{Diagnostic, SourceLocation};
use crate::ir::{ScopedClass, ScopedClassMap};

pub const DEFAULT_CLASS_NAME_PATTERN: &str = "[name]_[local]_[hash:base64:5]";

/// At-rules whose block is itself a rule list.
const NESTED_AT_RULES: &[&str] = &["media", "supports", "layer", "container", "document", "scope"];

lazy_static! {
    static ref CLASS_ATTR_RE: Regex =
        Regex::new(r#"(?i)(^|[\s"'/])(class\s*=\s*)("([^"]*)"|'([^']*)')"#).unwrap();
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"(?s)\{\{.*?\}\}").unwrap();
    static ref CLASS_TOKEN_RE: Regex = Regex::new(r"\S+").unwrap();
    static ref STYLE_VAR_RE: Regex = Regex::new(r"var\(\s*(--[A-Za-z0-9_-]+)").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref CSS_COMMENT_RE: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// Hash of `componentName_className`
    #[default]
    Development,
    /// Hash of the serialized rule
    Production,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleConfig {
    pub hash_mode: HashMode,
    pub pattern: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            hash_mode: HashMode::Development,
            pattern: DEFAULT_CLASS_NAME_PATTERN.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HASHING
// ═══════════════════════════════════════════════════════════════════════════════

/// 32-bit rolling hash over UTF-16 code units: `h = h * 31 + unit`.
pub fn rolling_hash(input: &str) -> i32 {
    input
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// First five base-36 digits of the absolute rolling hash.
pub fn short_hash(input: &str) -> String {
    let magnitude = (rolling_hash(input) as i64).unsigned_abs();
    to_base36(magnitude).chars().take(5).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// RULE PARSER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct CssParseError {
    pub message: String,
    pub offset: usize,
}

impl CssParseError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// A qualified rule. Offsets index into the whole stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: String,
    pub selector_start: usize,
    pub selector_end: usize,
    pub declarations: String,
}

impl StyleRule {
    /// `selector { prop: value; ... }` with whitespace collapsed.
    pub fn serialize(&self) -> String {
        let selector = collapse_whitespace(&CSS_COMMENT_RE.replace_all(&self.selector, ""));
        let body = CSS_COMMENT_RE.replace_all(&self.declarations, "");

        if body.contains('{') {
            return format!("{} {{ {} }}", selector, collapse_whitespace(&body));
        }

        let declarations: Vec<String> = split_declarations(&body)
            .into_iter()
            .filter_map(|decl| {
                let (prop, value) = decl.split_once(':')?;
                let prop = prop.trim();
                let value = collapse_whitespace(value);
                (!prop.is_empty()).then(|| format!("{}: {};", prop, value))
            })
            .collect();

        if declarations.is_empty() {
            format!("{} {{}}", selector)
        } else {
            format!("{} {{ {} }}", selector, declarations.join(" "))
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Split on `;` outside strings and parentheses.
fn split_declarations(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                ';' if depth <= 0 => {
                    parts.push(&body[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&body[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

#[derive(Debug, Default)]
pub struct ParsedSheet {
    pub rules: Vec<StyleRule>,
    /// Offsets of rules skipped for having no selector
    pub empty_selectors: Vec<usize>,
}

struct RuleParser<'a> {
    css: &'a str,
    bytes: &'a [u8],
    pos: usize,
    sheet: ParsedSheet,
}

impl<'a> RuleParser<'a> {
    fn new(css: &'a str) -> Self {
        Self {
            css,
            bytes: css.as_bytes(),
            pos: 0,
            sheet: ParsedSheet::default(),
        }
    }

    fn at(&self, offset: usize, pattern: &[u8]) -> bool {
        self.bytes[offset..].starts_with(pattern)
    }

    fn skip_comment(&self, start: usize) -> Result<usize, CssParseError> {
        self.css[start + 2..]
            .find("*/")
            .map(|end| start + 2 + end + 2)
            .ok_or_else(|| CssParseError::new("unterminated comment", start))
    }

    fn skip_string(&self, start: usize) -> Result<usize, CssParseError> {
        let quote = self.bytes[start];
        let mut i = start + 1;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'\n' => break,
                c if c == quote => return Ok(i + 1),
                _ => i += 1,
            }
        }
        Err(CssParseError::new("unterminated string", start))
    }

    fn skip_trivia(&mut self) -> Result<(), CssParseError> {
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            } else if self.at(self.pos, b"/*") {
                self.pos = self.skip_comment(self.pos)?;
            } else if self.at(self.pos, b"<!--") {
                self.pos += 4;
            } else if self.at(self.pos, b"-->") {
                self.pos += 3;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Scan a prelude up to its `{`, `;` or `}`. Returns the terminator's
    /// index, `None` at end of input.
    fn scan_prelude(&self) -> Result<(usize, Option<u8>), CssParseError> {
        let mut i = self.pos;
        let mut parens = 0i32;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'"' | b'\'' => {
                    i = self.skip_string(i)?;
                    continue;
                }
                b'/' if self.at(i, b"/*") => {
                    i = self.skip_comment(i)?;
                    continue;
                }
                b'(' => parens += 1,
                b')' => parens -= 1,
                b';' if parens > 0 => {}
                c @ (b'{' | b';' | b'}') => return Ok((i, Some(c))),
                _ => {}
            }
            i += 1;
        }
        Ok((self.bytes.len(), None))
    }

    /// Index of the `}` closing the block whose body starts at `start`.
    fn block_end(&self, start: usize) -> Result<usize, CssParseError> {
        let mut depth = 1;
        let mut i = start;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'"' | b'\'' => {
                    i = self.skip_string(i)?;
                    continue;
                }
                b'/' if self.at(i, b"/*") => {
                    i = self.skip_comment(i)?;
                    continue;
                }
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Err(CssParseError::new("unterminated block", start.saturating_sub(1)))
    }

    fn parse_list(&mut self, nested: bool) -> Result<(), CssParseError> {
        loop {
            self.skip_trivia()?;
            if self.pos >= self.bytes.len() {
                return if nested {
                    Err(CssParseError::new("unterminated at-rule block", self.pos))
                } else {
                    Ok(())
                };
            }
            match self.bytes[self.pos] {
                b'}' if nested => {
                    self.pos += 1;
                    return Ok(());
                }
                b'}' => return Err(CssParseError::new("unexpected '}'", self.pos)),
                b'@' => self.parse_at_rule()?,
                _ => self.parse_rule()?,
            }
        }
    }

    fn parse_at_rule(&mut self) -> Result<(), CssParseError> {
        let start = self.pos;
        let name: String = self.css[start + 1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match self.scan_prelude()? {
            // Statement at-rule, e.g. @import or @charset
            (end, Some(b';')) => self.pos = end + 1,
            (end, None) => self.pos = end,
            (end, Some(b'{')) => {
                if NESTED_AT_RULES.contains(&name.as_str()) {
                    self.pos = end + 1;
                    self.parse_list(true)?;
                } else {
                    self.pos = self.block_end(end + 1)? + 1;
                }
            }
            (end, _) => return Err(CssParseError::new("unexpected '}' in at-rule", end)),
        }
        Ok(())
    }

    fn parse_rule(&mut self) -> Result<(), CssParseError> {
        let start = self.pos;
        let (open, terminator) = self.scan_prelude()?;
        match terminator {
            Some(b'{') => {}
            Some(c) => {
                return Err(CssParseError::new(
                    format!("unexpected '{}' before rule block", c as char),
                    open,
                ))
            }
            None => return Err(CssParseError::new("rule without a block", start)),
        }

        let close = self.block_end(open + 1)?;
        self.pos = close + 1;

        let raw = &self.css[start..open];
        let selector = raw.trim();
        if selector.is_empty() {
            self.sheet.empty_selectors.push(start);
            return Ok(());
        }
        let selector_start = start + (raw.len() - raw.trim_start().len());
        self.sheet.rules.push(StyleRule {
            selector: selector.to_string(),
            selector_start,
            selector_end: selector_start + selector.len(),
            declarations: self.css[open + 1..close].to_string(),
        });
        Ok(())
    }
}

/// Parse the stylesheet's qualified rules, descending into grouping at-rules.
pub fn parse_rules(css: &str) -> Result<ParsedSheet, CssParseError> {
    let mut parser = RuleParser::new(css);
    parser.parse_list(false)?;
    Ok(parser.sheet)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTOR CLASSES
// ═══════════════════════════════════════════════════════════════════════════════

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || c == '-'
}

/// Class tokens of a selector as `(start, end, name)`, `start` at the dot.
/// Attribute selectors and strings are skipped, identifiers are taken whole.
fn selector_classes(selector: &str) -> Vec<(usize, usize, &str)> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = selector.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            '[' => {
                while i < chars.len() && chars[i].1 != ']' {
                    i += 1;
                }
            }
            '"' | '\'' => {
                i += 1;
                while i < chars.len() && chars[i].1 != c {
                    i += 1;
                }
            }
            '\\' => i += 1,
            '.' => {
                let mut j = i + 1;
                if j < chars.len() && chars[j].1 == '-' {
                    j += 1;
                }
                if j < chars.len() && is_ident_start(chars[j].1) {
                    while j < chars.len() && is_ident_char(chars[j].1) {
                        j += 1;
                    }
                    let end = chars.get(j).map(|(o, _)| *o).unwrap_or(selector.len());
                    tokens.push((offset, end, &selector[offset + 1..end]));
                    i = j;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    tokens
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ScopedStyle {
    pub rewritten_css: String,
    pub classes: ScopedClassMap,
    pub diagnostics: Vec<Diagnostic>,
}

impl ScopedStyle {
    /// Original -> scoped class name.
    pub fn exports(&self) -> BTreeMap<String, String> {
        self.classes
            .iter()
            .map(|(name, class)| (name.clone(), class.scoped_name.clone()))
            .collect()
    }
}

/// Scoper for one compilation. Holds no state between calls.
#[derive(Debug, Clone, Default)]
pub struct StyleScoper {
    config: StyleConfig,
}

/// Allocates scoped names in first-appearance order.
struct NameAllocator<'c> {
    config: &'c StyleConfig,
    component_name: &'c str,
    classes: ScopedClassMap,
    taken: HashSet<String>,
}

impl<'c> NameAllocator<'c> {
    fn new(config: &'c StyleConfig, component_name: &'c str) -> Self {
        Self {
            config,
            component_name,
            classes: ScopedClassMap::new(),
            taken: HashSet::new(),
        }
    }

    /// First occurrence wins.
    fn record(&mut self, class_name: &str, rule_content: String) {
        if self.classes.contains_key(class_name) {
            return;
        }

        let hash_input = match self.config.hash_mode {
            HashMode::Development => format!("{}_{}", self.component_name, class_name),
            HashMode::Production => rule_content.clone(),
        };
        let base = self
            .config
            .pattern
            .replace("[name]", self.component_name)
            .replace("[local]", class_name)
            .replace("[hash:base64:5]", &short_hash(&hash_input));

        let mut scoped_name = base.clone();
        let mut suffix = 2;
        while self.taken.contains(&scoped_name) {
            scoped_name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.taken.insert(scoped_name.clone());

        self.classes.insert(
            class_name.to_string(),
            ScopedClass {
                scoped_name,
                rule_content,
            },
        );
    }
}

impl StyleScoper {
    pub fn new(config: StyleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    pub fn scope(&self, style_text: &str, component_name: &str) -> ScopedStyle {
        match parse_rules(style_text) {
            Ok(sheet) => self.scope_rules(style_text, component_name, sheet),
            Err(err) => {
                tracing::debug!(error = %err, "stylesheet parse failed, scanning class names");
                self.scope_by_scan(style_text, component_name, err)
            }
        }
    }

    fn scope_rules(&self, style_text: &str, component_name: &str, sheet: ParsedSheet) -> ScopedStyle {
        let mut names = NameAllocator::new(&self.config, component_name);

        for rule in &sheet.rules {
            if !rule.selector.starts_with('.') {
                continue;
            }
            let content = rule.serialize();
            for (_, _, class_name) in selector_classes(&rule.selector) {
                names.record(class_name, content.clone());
            }
        }
        let classes = names.classes;

        let mut replacements: Vec<(usize, usize, String)> = Vec::new();
        for rule in &sheet.rules {
            for (start, end, class_name) in selector_classes(&rule.selector) {
                if let Some(class) = classes.get(class_name) {
                    replacements.push((
                        rule.selector_start + start,
                        rule.selector_start + end,
                        format!(".{}", class.scoped_name),
                    ));
                }
            }
        }

        let diagnostics = sheet
            .empty_selectors
            .iter()
            .map(|&offset| {
                Diagnostic::style_rule(
                    "rule without a selector skipped",
                    SourceLocation::from_offset(style_text, offset),
                )
            })
            .collect();

        tracing::debug!(
            rules = sheet.rules.len(),
            classes = classes.len(),
            "scoped stylesheet"
        );

        ScopedStyle {
            rewritten_css: apply_replacements(style_text, replacements),
            classes,
            diagnostics,
        }
    }

    fn scope_by_scan(&self, style_text: &str, component_name: &str, err: CssParseError) -> ScopedStyle {
        let preludes = fallback_preludes(style_text);

        let mut names = NameAllocator::new(&self.config, component_name);
        for (_, prelude) in &preludes {
            let content = prelude.trim().to_string();
            for (_, _, class_name) in selector_classes(prelude) {
                names.record(class_name, content.clone());
            }
        }
        let classes = names.classes;

        let mut replacements: Vec<(usize, usize, String)> = Vec::new();
        for (offset, prelude) in &preludes {
            for (start, end, class_name) in selector_classes(prelude) {
                if let Some(class) = classes.get(class_name) {
                    replacements.push((offset + start, offset + end, format!(".{}", class.scoped_name)));
                }
            }
        }

        ScopedStyle {
            rewritten_css: apply_replacements(style_text, replacements),
            classes,
            diagnostics: vec![Diagnostic::style_rule(
                format!("stylesheet could not be parsed ({}), class names recovered by scan", err.message),
                SourceLocation::from_offset(style_text, err.offset),
            )],
        }
    }
}

/// Rule preludes of a sheet the rule parser rejected, as `(offset, text)`.
///
/// A prelude is the text before a `{`, starting after the previous `{`, `}`
/// or `;`. Segments ending in `;` or `}` are declarations and are never
/// returned, so values such as `url(img.png)` stay untouched even inside an
/// unclosed block. At-rule preludes are skipped; comments are blanked out
/// with spaces so offsets still line up with `css`.
fn fallback_preludes(css: &str) -> Vec<(usize, String)> {
    let bytes = css.as_bytes();
    let mut preludes = Vec::new();
    let mut segment_start = 0;
    let mut comments: Vec<(usize, usize)> = Vec::new();
    let mut parens = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = css[i + 2..].find("*/").map(|e| i + 2 + e + 2).unwrap_or(bytes.len());
                comments.push((i, end));
                i = end;
                continue;
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b'{' if parens == 0 => {
                let mut prelude = css[segment_start..i].to_string();
                for (start, end) in comments.drain(..) {
                    prelude.replace_range(
                        start - segment_start..end - segment_start,
                        &" ".repeat(end - start),
                    );
                }
                if !prelude.trim_start().starts_with('@') {
                    preludes.push((segment_start, prelude));
                }
                segment_start = i + 1;
            }
            b'}' | b';' if parens == 0 => {
                segment_start = i + 1;
                comments.clear();
            }
            _ => {}
        }
        i += 1;
    }

    preludes
}

/// Apply `(start, end, text)` replacements, last first so earlier offsets
/// stay valid.
fn apply_replacements(source: &str, mut replacements: Vec<(usize, usize, String)>) -> String {
    replacements.sort_by(|a, b| b.0.cmp(&a.0));
    let mut out = source.to_string();
    for (start, end, text) in replacements {
        out.replace_range(start..end, &text);
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE & VARIABLES
// ═══════════════════════════════════════════════════════════════════════════════

fn rewrite_class_tokens(value: &str, classes: &ScopedClassMap) -> String {
    CLASS_TOKEN_RE
        .replace_all(value, |caps: &regex::Captures| match classes.get(&caps[0]) {
            Some(class) => class.scoped_name.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Rewrite `class` attribute values in `markup`, whole tokens only.
/// `{{...}}` placeholders inside a value are left alone.
pub fn rewrite_template_classes(markup: &str, classes: &ScopedClassMap) -> String {
    if classes.is_empty() {
        return markup.to_string();
    }

    CLASS_ATTR_RE
        .replace_all(markup, |caps: &regex::Captures| {
            let (quote, value) = match (caps.get(4), caps.get(5)) {
                (Some(v), _) => ('"', v.as_str()),
                (None, Some(v)) => ('\'', v.as_str()),
                (None, None) => ('"', ""),
            };

            let mut rewritten = String::with_capacity(value.len());
            let mut last = 0;
            for placeholder in PLACEHOLDER_RE.find_iter(value) {
                rewritten.push_str(&rewrite_class_tokens(&value[last..placeholder.start()], classes));
                rewritten.push_str(placeholder.as_str());
                last = placeholder.end();
            }
            rewritten.push_str(&rewrite_class_tokens(&value[last..], classes));

            format!("{}{}{}{}{}", &caps[1], &caps[2], quote, rewritten, quote)
        })
        .into_owned()
}

/// Distinct custom properties referenced through `var(--name)`, in order of
/// first appearance.
pub fn used_style_variables(style_text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    STYLE_VAR_RE
        .captures_iter(style_text)
        .map(|caps| caps[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
