//! Interfaces consumed by collaborators outside the compiler: the hot-reload
//! notifier and the project-wide stylesheet aggregator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ir::CompilationResult;

/// Notification for the file watcher after a recompile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotUpdate {
    pub file: String,
    pub has_style_change: bool,
}

impl HotUpdate {
    /// Compare a fresh result against the previous one for the same file.
    /// Without a previous result any stylesheet counts as a change.
    pub fn between(
        file: impl Into<String>,
        previous: Option<&CompilationResult>,
        current: &CompilationResult,
    ) -> Self {
        let has_style_change = match previous {
            Some(previous) => {
                previous.css != current.css || previous.style_exports != current.style_exports
            }
            None => current.css.is_some(),
        };
        Self {
            file: file.into(),
            has_style_change,
        }
    }
}

/// Receives each component's rewritten stylesheet.
pub trait StyleSink {
    fn accept(&mut self, component_name: &str, css: &str);
}

/// Hand the result's stylesheet to `sink`. Returns whether there was one.
pub fn publish_styles(result: &CompilationResult, sink: &mut dyn StyleSink) -> bool {
    match &result.css {
        Some(css) => {
            sink.accept(&result.component_name, css);
            true
        }
        None => false,
    }
}

/// In-memory sink keyed by component name. A later stylesheet for the same
/// component replaces the earlier one.
#[derive(Debug, Default, Clone)]
pub struct CollectedStyles {
    entries: BTreeMap<String, String>,
}

impl CollectedStyles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, component_name: &str) -> Option<&str> {
        self.entries.get(component_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All stylesheets in component name order, each under a marker comment.
    pub fn stylesheet(&self) -> String {
        self.entries
            .iter()
            .map(|(name, css)| format!("/* {} */\n{}\n", name, css.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl StyleSink for CollectedStyles {
    fn accept(&mut self, component_name: &str, css: &str) {
        self.entries.insert(component_name.to_string(), css.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, CompileOptions};

    fn compile_named(name: &str, raw: &str) -> CompilationResult {
        let options = CompileOptions {
            component_name: Some(name.to_string()),
            ..CompileOptions::default()
        };
        compile(raw, &options).unwrap()
    }

    #[test]
    fn test_hot_update_detects_style_change() {
        let before = compile_named("card", "<p class=\"a\">x</p><style>.a { color: red; }</style>");
        let text_only = compile_named("card", "<p class=\"a\">y</p><style>.a { color: red; }</style>");
        let restyled = compile_named("card", "<p class=\"a\">y</p><style>.a { color: blue; }</style>");

        assert!(!HotUpdate::between("card.html", Some(&before), &text_only).has_style_change);
        assert!(HotUpdate::between("card.html", Some(&before), &restyled).has_style_change);
        assert!(HotUpdate::between("card.html", None, &before).has_style_change);
    }

    #[test]
    fn test_collected_styles() {
        let mut sink = CollectedStyles::new();
        assert!(publish_styles(&compile_named("b", "<style>.x{a:b}</style>"), &mut sink));
        assert!(publish_styles(&compile_named("a", "<style>.y{a:b}</style>"), &mut sink));
        assert!(!publish_styles(&compile_named("c", "<p>no style</p>"), &mut sink));

        assert_eq!(sink.len(), 2);
        assert!(sink.get("a").unwrap().starts_with(".a_y_"));
        let sheet = sink.stylesheet();
        assert!(sheet.starts_with("/* a */\n.a_y_"));
        assert!(sheet.contains("/* b */\n.b_x_"));
    }
}
