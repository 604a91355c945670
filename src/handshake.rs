//! Handshake block parsing.
//!
//! Handshake blocks are hand-authored, so before strict JSON parsing a
//! string-aware pre-pass drops `//` and `/* */` comments, turns single-quoted
//! strings (keys in particular) into double-quoted ones and removes trailing
//! commas. Newlines inside comments are kept so serde_json's line numbers
//! still point into the author's block.

use crate::error::{CompilerError, SourceLocation};

/// Parse a handshake block. Whitespace-only blocks carry no data. Error
/// locations are relative to `text`.
pub fn parse_handshake(text: &str) -> Result<Option<serde_json::Value>, CompilerError> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let normalized = normalize_structured_data(text);
    serde_json::from_str(&normalized).map(Some).map_err(|e| {
        let line = e.line().max(1) as u32;
        let column = e.column().max(1) as u32;
        // serde_json appends its own block-relative position
        let detail = e.to_string();
        let detail = match detail.rfind(" at line ") {
            Some(index) => detail[..index].to_string(),
            None => detail,
        };
        CompilerError::structured_data(
            format!("handshake block is not valid structured data: {}", detail),
            SourceLocation::new(line, column, 0),
        )
    })
}

/// Rewrite relaxed structured-data text into strict JSON text.
pub fn normalize_structured_data(text: &str) -> String {
    strip_trailing_commas(&strip_comments_and_quotes(text))
}

fn strip_comments_and_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // Double-quoted string: copy verbatim
        if c == '"' {
            out.push(c);
            i += 1;
            while i < chars.len() {
                let s = chars[i];
                out.push(s);
                i += 1;
                if s == '\\' && i < chars.len() {
                    out.push(chars[i]);
                    i += 1;
                } else if s == '"' {
                    break;
                }
            }
            continue;
        }

        // Single-quoted string: re-quote
        if c == '\'' {
            out.push('"');
            i += 1;
            while i < chars.len() {
                let s = chars[i];
                i += 1;
                match s {
                    '\\' if i < chars.len() => {
                        let escaped = chars[i];
                        i += 1;
                        if escaped == '\'' {
                            out.push('\'');
                        } else {
                            out.push('\\');
                            out.push(escaped);
                        }
                    }
                    '"' => out.push_str("\\\""),
                    '\'' => break,
                    _ => out.push(s),
                }
            }
            out.push('"');
            continue;
        }

        if c == '/' && i + 1 < chars.len() {
            if chars[i + 1] == '/' {
                i += 2;
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            if chars[i + 1] == '*' {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && i + 1 < chars.len() && chars[i + 1] == '/') {
                    if chars[i] == '\n' {
                        out.push('\n');
                    }
                    i += 1;
                }
                i += 2;
                continue;
            }
        }

        out.push(c);
        i += 1;
    }

    out
}

/// Input must already be comment-free with double-quoted strings only.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                i += 1;
                continue;
            }
        }

        out.push(c);
        i += 1;
    }

    out
}
