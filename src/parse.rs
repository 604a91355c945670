//! Section Extractor
//!
//! Splits a raw component document into template markup, script text, style
//! text and handshake data. html5ever builds the tree the blocks are read
//! from; the template is what is left of the source text once the recognised
//! blocks are cut out, so author formatting survives byte for byte.
//!
//! Blocks inside HTML comments, `<template>` elements and raw-text elements
//! such as `<textarea>` are never read by html5ever as scripts or styles, so
//! the cutter leaves them in the markup as well. When the two views still
//! disagree on how many blocks there are, a section warning says so.

use lazy_static::lazy_static;
use regex::Regex;

use crate::cache::compute_hash;
use crate::error::{CompilerError, Diagnostic, SourceLocation};
use crate::handshake::parse_handshake;
use crate::ir::ComponentDocument;
use crate::markup::{parse_markup, MarkupElement};
use crate::visitor::{walk_element, MarkupVisitor};

lazy_static! {
    /// Everything the cutter has to classify, leftmost first. Comments and
    /// inert elements run to the end of input when unclosed, as they do in
    /// html5ever.
    static ref BLOCK_TOKEN_RE: Regex = Regex::new(concat!(
        r"(?is)(?P<comment><!--.*?(?:-->|\z))",
        r"|(?P<template><template(?:\s[^>]*)?>.*?(?:</template\s*>|\z))",
        r"|(?P<rawtext><(?:textarea|title|noscript|xmp|iframe|noembed|noframes)\b[^>]*>.*?",
        r"(?:</(?:textarea|title|noscript|xmp|iframe|noembed|noframes)\s*>|\z))",
        r"|<script\b(?P<script_attrs>[^>]*)>.*?</script\s*>",
        r"|(?P<style><style\b[^>]*>.*?</style\s*>)",
    ))
    .unwrap();

    /// Attribute regex for parsing script attributes
    static ref ATTR_REGEX: Regex =
        Regex::new(r#"(?i)([a-z0-9:-]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^>\s]+)))?"#).unwrap();

    static ref DOCTYPE_RE: Regex = Regex::new(r"(?i)^<!doctype[^>]*>").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPT KINDS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Helper declarations
    Script,
    /// Handshake data
    StructuredData,
    /// Anything else, e.g. `text/template`. Left in the template untouched.
    Other,
}

impl ScriptKind {
    pub fn from_type_attr(type_attr: Option<&str>) -> Self {
        let Some(value) = type_attr else {
            return ScriptKind::Script;
        };
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "script" | "module" | "text/javascript" | "application/javascript"
            | "text/ecmascript" | "application/ecmascript" => ScriptKind::Script,
            v if v.contains("json") => ScriptKind::StructuredData,
            _ => ScriptKind::Other,
        }
    }
}

/// External scripts (`src=`) carry no inline content and belong to the template.
fn classify_script(is_external: bool, type_attr: Option<&str>) -> ScriptKind {
    if is_external {
        ScriptKind::Other
    } else {
        ScriptKind::from_type_attr(type_attr)
    }
}

fn parse_attrs(attr_string: &str) -> Vec<(String, String)> {
    ATTR_REGEX
        .captures_iter(attr_string)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK COLLECTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct SectionCollector {
    scripts: Vec<String>,
    data_blocks: Vec<String>,
    styles: Vec<String>,
}

impl MarkupVisitor for SectionCollector {
    fn visit_element(&mut self, element: &MarkupElement) {
        match element.name.as_str() {
            "script" => match classify_script(element.has_attr("src"), element.attr("type")) {
                ScriptKind::Script => self.scripts.push(element.text_content()),
                ScriptKind::StructuredData => self.data_blocks.push(element.text_content()),
                ScriptKind::Other => {}
            },
            "style" => self.styles.push(element.text_content()),
            _ => walk_element(self, element),
        }
    }
}

fn script_kind_of(attrs: &[(String, String)]) -> ScriptKind {
    let is_external = attrs.iter().any(|(k, _)| k == "src");
    let type_attr = attrs
        .iter()
        .find(|(k, _)| k == "type")
        .map(|(_, v)| v.as_str());
    classify_script(is_external, type_attr)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK CUTTING
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Script(ScriptKind),
    Style,
    /// Comment or raw-text element
    Inert,
    Template,
}

impl BlockKind {
    /// Blocks that become sections and leave the template.
    fn is_cut(self) -> bool {
        matches!(
            self,
            BlockKind::Script(ScriptKind::Script | ScriptKind::StructuredData) | BlockKind::Style
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct RawBlock {
    kind: BlockKind,
    start: usize,
    end: usize,
    /// Just past the opening tag
    content_start: usize,
}

fn scan_blocks(raw_text: &str) -> Vec<RawBlock> {
    BLOCK_TOKEN_RE
        .captures_iter(raw_text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let kind = if caps.name("comment").is_some() || caps.name("rawtext").is_some() {
                BlockKind::Inert
            } else if caps.name("template").is_some() {
                BlockKind::Template
            } else if caps.name("style").is_some() {
                BlockKind::Style
            } else {
                let attrs = parse_attrs(caps.name("script_attrs").map(|m| m.as_str()).unwrap_or(""));
                BlockKind::Script(script_kind_of(&attrs))
            };
            let content_start = whole
                .as_str()
                .find('>')
                .map(|i| whole.start() + i + 1)
                .unwrap_or(whole.end());
            Some(RawBlock {
                kind,
                start: whole.start(),
                end: whole.end(),
                content_start,
            })
        })
        .collect()
}

/// Remove the cut blocks from the source.
fn strip_blocks(raw_text: &str, blocks: &[RawBlock]) -> String {
    let mut out = String::with_capacity(raw_text.len());
    let mut last = 0;
    for block in blocks.iter().filter(|b| b.kind.is_cut()) {
        out.push_str(&raw_text[last..block.start]);
        last = block.end;
    }
    out.push_str(&raw_text[last..]);
    out
}

fn offsets_of(blocks: &[RawBlock], kind: BlockKind) -> Vec<usize> {
    blocks.iter().filter(|b| b.kind == kind).map(|b| b.start).collect()
}

/// Scripts and styles inside `<template>` stay markup; say so.
fn template_block_warnings(raw_text: &str, blocks: &[RawBlock]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for block in blocks.iter().filter(|b| b.kind == BlockKind::Template) {
        let inner = &raw_text[block.content_start..block.end];
        for nested in scan_blocks(inner).iter().filter(|b| b.kind.is_cut()) {
            let what = if nested.kind == BlockKind::Style { "style" } else { "script" };
            diagnostics.push(Diagnostic::section(
                format!("{} block inside <template> is kept as template markup", what),
                SourceLocation::from_offset(raw_text, block.content_start + nested.start),
            ));
        }
    }
    diagnostics
}

/// Warn when html5ever read a different number of blocks of `kind` than the
/// cutter removed. Content of the unmatched blocks may be missing from the
/// section or left behind in the template.
fn count_mismatch_warning(
    raw_text: &str,
    blocks: &[RawBlock],
    kind: BlockKind,
    read: usize,
    label: &str,
) -> Option<Diagnostic> {
    let offsets = offsets_of(blocks, kind);
    if offsets.len() == read {
        return None;
    }
    Some(Diagnostic::section(
        format!(
            "{} {} block(s) found in the markup tree but {} cut from the template text",
            read,
            label,
            offsets.len()
        ),
        SourceLocation::from_offset(raw_text, offsets.first().copied().unwrap_or(0)),
    ))
}

/// True when `markup` is empty or only the skeleton a markup parser wraps
/// around an empty document.
fn is_empty_skeleton(markup: &str) -> bool {
    let compact: String = markup
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    let compact = DOCTYPE_RE.replace(&compact, "");

    matches!(
        compact.as_ref(),
        "" | "<html></html>"
            | "<html><head></head><body></body></html>"
            | "<head></head><body></body>"
            | "<body></body>"
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: ComponentDocument,
    pub diagnostics: Vec<Diagnostic>,
}

/// Split `raw_text` into a [`ComponentDocument`].
///
/// Fails with `MissingTemplate` when there is no usable template and the
/// document is not style-only, and with `StructuredDataParseError` when the
/// handshake block cannot be parsed.
pub fn extract(
    raw_text: &str,
    source_path: &str,
    component_name: &str,
) -> Result<Extraction, CompilerError> {
    let nodes = parse_markup(raw_text);
    let mut collector = SectionCollector::default();
    collector.visit_nodes(&nodes);

    let mut diagnostics = Vec::new();

    let script_blocks: Vec<&str> = collector
        .scripts
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let script_text = if script_blocks.is_empty() {
        None
    } else {
        Some(script_blocks.join("\n\n"))
    };

    let blocks = scan_blocks(raw_text);
    let structured = BlockKind::Script(ScriptKind::StructuredData);

    let checks = [
        (BlockKind::Script(ScriptKind::Script), collector.scripts.len(), "script"),
        (structured, collector.data_blocks.len(), "handshake"),
        (BlockKind::Style, collector.styles.len(), "style"),
    ];
    for (kind, read, label) in checks {
        diagnostics.extend(count_mismatch_warning(raw_text, &blocks, kind, read, label));
    }
    diagnostics.extend(template_block_warnings(raw_text, &blocks));

    let style_offsets = offsets_of(&blocks, BlockKind::Style);
    for (index, _) in collector.styles.iter().enumerate().skip(1) {
        let offset = style_offsets.get(index).copied().unwrap_or(0);
        diagnostics.push(Diagnostic::section(
            format!("style block #{} ignored, only the first style block is used", index + 1),
            SourceLocation::from_offset(raw_text, offset),
        ));
    }
    let style_text = collector.styles.first().map(|s| s.trim().to_string());

    let data_blocks: Vec<&RawBlock> = blocks.iter().filter(|b| b.kind == structured).collect();
    for index in 1..collector.data_blocks.len() {
        let offset = data_blocks.get(index).map(|b| b.start).unwrap_or(0);
        diagnostics.push(Diagnostic::section(
            format!("handshake block #{} ignored, only the first one is used", index + 1),
            SourceLocation::from_offset(raw_text, offset),
        ));
    }
    let handshake_data = match collector.data_blocks.first() {
        Some(block) => parse_handshake(block).map_err(|mut e| {
            let content_start = data_blocks.first().map(|b| b.content_start).unwrap_or(0);
            e.location = e.location.rebase(raw_text, content_start);
            e.in_file(source_path)
        })?,
        None => None,
    };

    let stripped = strip_blocks(raw_text, &blocks);
    let trimmed = stripped.trim();
    let template_markup = if is_empty_skeleton(trimmed) {
        String::new()
    } else {
        trimmed.to_string()
    };

    let is_style_only = template_markup.is_empty() && script_text.is_none() && style_text.is_some();
    if template_markup.is_empty() && !is_style_only {
        return Err(CompilerError::missing_template().in_file(source_path));
    }

    tracing::debug!(
        source_path,
        template_len = template_markup.len(),
        has_script = script_text.is_some(),
        has_style = style_text.is_some(),
        has_handshake = handshake_data.is_some(),
        is_style_only,
        "extracted sections"
    );

    Ok(Extraction {
        document: ComponentDocument {
            template_markup,
            script_text,
            style_text,
            handshake_data,
            is_style_only,
            source_path: source_path.to_string(),
            content_hash: compute_hash(raw_text),
            component_name: component_name.to_string(),
        },
        diagnostics,
    })
}
