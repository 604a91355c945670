//! Placeholder Validator
//!
//! Scans template markup for `{{ ... }}` placeholders:
//!
//! ```text
//! {{ dataPath : action, action : action : outputName }}
//! ```
//!
//! The brace balance check runs over the whole markup before any placeholder
//! is parsed. Each placeholder then yields its data path, its action list and
//! an optional output name; the action names are the helpers the template
//! depends on.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

use crate::error::{CompilerError, SourceLocation};
use crate::ir::{ActionKind, ActionSpec, Placeholder};

lazy_static! {
    /// Non-greedy: a placeholder ends at the first `}}`
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap();
}

/// Prefix sigils, longest first so `^^` wins over `^` and `??` over `?`.
const SIGILS: &[(&str, ActionKind, bool)] = &[
    ("^^", ActionKind::Overwrite, false),
    ("^", ActionKind::Save, false),
    (">", ActionKind::Data, false),
    ("[]", ActionKind::Mix, false),
    ("??", ActionKind::Render, true),
    ("?", ActionKind::Render, true),
    ("++", ActionKind::ExtendedRender, false),
    ("+", ActionKind::ExtendedRender, false),
];

// ═══════════════════════════════════════════════════════════════════════════════
// BRACE BALANCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Offset of the first brace pair that has no partner.
fn first_unbalanced_offset(markup: &str) -> usize {
    let mut open_stack: Vec<usize> = Vec::new();
    let mut i = 0;
    let bytes = markup.as_bytes();

    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            open_stack.push(i);
            i += 2;
        } else if bytes[i] == b'}' && bytes[i + 1] == b'}' {
            if open_stack.pop().is_none() {
                return i;
            }
            i += 2;
        } else {
            i += 1;
        }
    }

    open_stack.first().copied().unwrap_or(0)
}

fn check_balance(markup: &str) -> Result<(), CompilerError> {
    let opening = markup.matches("{{").count();
    let closing = markup.matches("}}").count();
    if opening == closing {
        return Ok(());
    }

    let offset = first_unbalanced_offset(markup);
    Err(CompilerError::malformed_template(
        format!(
            "unbalanced placeholder braces: {} opening '{{{{' vs {} closing '}}}}'",
            opening, closing
        ),
        SourceLocation::from_offset(markup, offset),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTION TOKENS
// ═══════════════════════════════════════════════════════════════════════════════

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_numeric_token(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+')
}

/// A bare `[]` is a literal array marker: kept as an anonymous mix.
fn is_anonymous_mix(token: &str) -> bool {
    token == "[]"
}

/// Tokens that are positional syntax noise rather than helper references.
pub fn is_noise_token(token: &str) -> bool {
    let token = token.trim();
    token.chars().count() <= 1
        || token.contains('=')
        || is_numeric_token(token)
        || !token.chars().any(is_name_char)
}

/// Strip every leading sigil. The first sigil decides the kind.
pub fn strip_sigils(token: &str) -> (Option<(ActionKind, bool)>, &str) {
    let mut rest = token.trim();
    let mut kind = None;

    'outer: loop {
        for (sigil, sigil_kind, conditional) in SIGILS {
            if let Some(stripped) = rest.strip_prefix(sigil) {
                if kind.is_none() {
                    kind = Some((*sigil_kind, *conditional));
                }
                rest = stripped.trim_start();
                continue 'outer;
            }
        }
        break;
    }

    (kind, rest)
}

fn parse_actions(segments: &[&str]) -> Vec<ActionSpec> {
    let mut actions = Vec::new();
    let mut unprefixed = Vec::new();

    for segment in segments {
        for token in segment.split(',').map(str::trim) {
            if is_anonymous_mix(token) {
                actions.push(ActionSpec {
                    kind: ActionKind::Mix,
                    name: String::new(),
                    conditional: false,
                });
                continue;
            }
            if is_noise_token(token) {
                continue;
            }

            let (kind, name) = strip_sigils(token);
            let (kind, conditional) = match kind {
                Some(k) => k,
                None => {
                    unprefixed.push(actions.len());
                    (ActionKind::Route, false)
                }
            };
            actions.push(ActionSpec {
                kind,
                name: name.to_string(),
                conditional,
            });
        }
    }

    // An unprefixed token in trailing position renders
    let last_named = actions.iter().rposition(|a| !a.name.is_empty());
    if let Some(last) = last_named {
        if unprefixed.contains(&last) {
            actions[last].kind = ActionKind::Render;
        }
    }

    actions
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLACEHOLDERS
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_placeholder(markup: &str, raw_text: &str, content: &str, offset: usize) -> Placeholder {
    let parts: Vec<&str> = content.split(':').collect();
    let data_path = parts[0].trim().to_string();

    let (action_segments, output_name) = if parts.len() >= 3 {
        let output = parts[parts.len() - 1].trim();
        (
            &parts[1..parts.len() - 1],
            (!output.is_empty()).then(|| output.to_string()),
        )
    } else {
        (&parts[1..], None)
    };

    let location = SourceLocation::from_offset(markup, offset);
    Placeholder {
        raw_text: raw_text.to_string(),
        data_path,
        actions: parse_actions(action_segments),
        output_name,
        source_offset: location.offset,
        line: location.line,
        column: location.column,
    }
}

/// Validate `markup` and return its placeholders in source order.
pub fn validate(markup: &str) -> Result<Vec<Placeholder>, CompilerError> {
    check_balance(markup)?;

    let placeholders: Vec<Placeholder> = PLACEHOLDER_RE
        .captures_iter(markup)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let content = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            Some(parse_placeholder(markup, whole.as_str(), content, whole.start()))
        })
        .collect();

    tracing::debug!(count = placeholders.len(), "validated placeholders");
    Ok(placeholders)
}

/// Distinct helper names referenced by `placeholders`, sorted.
pub fn required_helpers(placeholders: &[Placeholder]) -> BTreeSet<String> {
    placeholders
        .iter()
        .flat_map(|p| p.helper_names())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ERR_MALFORMED_TEMPLATE;
    use rstest::rstest;

    #[test]
    fn test_unbalanced_braces_rejected() {
        let err = validate("<p>{{ a }}</p><p>{{ b </p>").unwrap_err();
        assert_eq!(err.code, ERR_MALFORMED_TEMPLATE);
        assert_eq!(err.location.offset, 17);

        let err = validate("<p>a }}</p>").unwrap_err();
        assert_eq!(err.location.column, 6);
    }

    #[test]
    fn test_balance_checked_before_parsing() {
        // Second placeholder would parse fine on its own
        assert!(validate("{{ x : helper }} {{").is_err());
    }

    #[test]
    fn test_mixed_action_list_required_helpers() {
        let placeholders = validate("<ul>{{ items : [], cardItem, #, [] : list }}</ul>").unwrap();
        assert_eq!(placeholders.len(), 1);
        let p = &placeholders[0];
        assert_eq!(p.data_path, "items");
        assert_eq!(p.output_name.as_deref(), Some("list"));
        assert_eq!(p.raw_text, "{{ items : [], cardItem, #, [] : list }}");

        let helpers: Vec<String> = required_helpers(&placeholders).into_iter().collect();
        assert_eq!(helpers, vec!["cardItem".to_string()]);

        let mixes = p.actions.iter().filter(|a| a.kind == ActionKind::Mix).count();
        assert_eq!(mixes, 2);
        let card = p.actions.iter().find(|a| a.name == "cardItem").unwrap();
        assert_eq!(card.kind, ActionKind::Render);
    }

    #[test]
    fn test_two_segments_are_actions() {
        let p = &validate("{{ user/name : upper }}").unwrap()[0];
        assert_eq!(p.path_segments(), vec!["user", "name"]);
        assert_eq!(p.output_name, None);
        assert_eq!(p.actions[0].name, "upper");
        assert_eq!(p.actions[0].kind, ActionKind::Render);
    }

    #[test]
    fn test_route_then_render() {
        let p = &validate("{{ @all : format, wrap : out }}").unwrap()[0];
        assert!(p.is_whole_context());
        assert_eq!(p.actions[0].kind, ActionKind::Route);
        assert_eq!(p.actions[1].kind, ActionKind::Render);
    }

    #[test]
    fn test_empty_placeholder() {
        let p = &validate("<b>{{}}</b>").unwrap()[0];
        assert_eq!(p.data_path, "");
        assert!(p.actions.is_empty());
        assert_eq!(p.line, 1);
        assert_eq!(p.column, 4);
    }

    #[test]
    fn test_location_on_later_line() {
        let p = &validate("<div>\n  <b>{{ name }}</b>\n</div>").unwrap()[0];
        assert_eq!(p.line, 2);
        assert_eq!(p.column, 6);
        assert_eq!(p.source_offset, 11);
    }

    #[rstest]
    #[case("^^total", ActionKind::Overwrite, "total")]
    #[case("^total", ActionKind::Save, "total")]
    #[case(">loader", ActionKind::Data, "loader")]
    #[case("[]mixer", ActionKind::Mix, "mixer")]
    #[case("?maybe", ActionKind::Render, "maybe")]
    #[case("??maybe", ActionKind::Render, "maybe")]
    #[case("+extra", ActionKind::ExtendedRender, "extra")]
    #[case("++extra", ActionKind::ExtendedRender, "extra")]
    #[case("^^>both", ActionKind::Overwrite, "both")]
    fn test_sigils(#[case] token: &str, #[case] kind: ActionKind, #[case] name: &str) {
        let (found, rest) = strip_sigils(token);
        assert_eq!(found.map(|(k, _)| k), Some(kind));
        assert_eq!(rest, name);
    }

    #[rstest]
    #[case("#", true)]
    #[case("[]", true)]
    #[case("{}", true)]
    #[case("42", true)]
    #[case("a=b", true)]
    #[case("x", true)]
    #[case("^^", true)]
    #[case("cardItem", false)]
    #[case("^save", false)]
    fn test_noise_tokens(#[case] token: &str, #[case] noise: bool) {
        assert_eq!(is_noise_token(token), noise);
    }

    #[test]
    fn test_conditional_flag() {
        let p = &validate("{{ x : ?show }}").unwrap()[0];
        assert!(p.actions[0].conditional);
        assert_eq!(p.actions[0].kind, ActionKind::Render);
    }
}
