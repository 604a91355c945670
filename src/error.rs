//! Compiler errors and diagnostics.
//!
//! Fatal problems abort the document and surface as [`CompilerError`].
//! Everything else degrades gracefully and is reported as a [`Diagnostic`]
//! on the compilation result. The compiler never prints either of them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR / DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_MISSING_TEMPLATE: &str = "MissingTemplate";
pub const ERR_MALFORMED_TEMPLATE: &str = "MalformedTemplate";
pub const ERR_STRUCTURED_DATA: &str = "StructuredDataParseError";
pub const WARN_HELPER_EXTRACTION: &str = "HelperExtractionWarning";
pub const WARN_STYLE_RULE: &str = "StyleRuleParseWarning";
pub const WARN_SECTION: &str = "SectionExtractionWarning";

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE LOCATION
// ═══════════════════════════════════════════════════════════════════════════════

/// 1-based line/column plus the 0-based byte offset they were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32, offset: u32) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// Resolve a byte offset inside `text`. Offsets past the end clamp to it.
    pub fn from_offset(text: &str, offset: usize) -> Self {
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }

        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;

        Self {
            line: line as u32,
            column: column as u32,
            offset: offset as u32,
        }
    }

    /// Move a line/column counted inside `text[base..]` onto `text` itself.
    /// The stored offset is ignored and recomputed.
    pub fn rebase(self, text: &str, base: usize) -> Self {
        let base = base.min(text.len());
        let mut line_start = base;
        for (index, line) in text[base..].split_inclusive('\n').enumerate() {
            if index + 1 == self.line as usize {
                let column_bytes: usize = line
                    .chars()
                    .take(self.column.saturating_sub(1) as usize)
                    .map(char::len_utf8)
                    .sum();
                return Self::from_offset(text, line_start + column_bytes);
            }
            line_start += line.len();
        }
        Self::from_offset(text, text.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FATAL ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingTemplate,
    MalformedTemplate,
    StructuredDataParse,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::MissingTemplate => ERR_MISSING_TEMPLATE,
            ErrorKind::MalformedTemplate => ERR_MALFORMED_TEMPLATE,
            ErrorKind::StructuredDataParse => ERR_STRUCTURED_DATA,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message} ({file_path}:{}:{})", .location.line, .location.column)]
pub struct CompilerError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub file_path: String,
    pub location: SourceLocation,
}

impl CompilerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            code: kind.code().to_string(),
            message: message.into(),
            file_path: String::new(),
            location,
        }
    }

    pub fn missing_template() -> Self {
        Self::new(
            ErrorKind::MissingTemplate,
            "document has no template markup and is not a style-only document",
            SourceLocation::new(1, 1, 0),
        )
    }

    pub fn malformed_template(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(ErrorKind::MalformedTemplate, message, location)
    }

    pub fn structured_data(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(ErrorKind::StructuredDataParse, message, location)
    }

    /// Attach the document path. Stages below the pipeline do not know it.
    pub fn in_file(mut self, file_path: &str) -> Self {
        self.file_path = file_path.to_string();
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NON-FATAL DIAGNOSTICS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Diagnostic {
    pub fn new(code: &str, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            line: location.line,
            column: location.column,
            offset: location.offset,
        }
    }

    pub fn helper(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(WARN_HELPER_EXTRACTION, message, location)
    }

    pub fn style_rule(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(WARN_STYLE_RULE, message, location)
    }

    pub fn section(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(WARN_SECTION, message, location)
    }
}
