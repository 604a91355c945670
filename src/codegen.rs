//! Module Assembler
//!
//! Generates the module source for a compiled component. Two shapes:
//!
//! ```js
//! // style-only documents
//! export const styles = {"a":"card_a_mm8id"};
//!
//! // everything else
//! const template = "...";
//! const helpers = { ... };
//! const handshake = {...};
//! export const styles = {...};   // only with a style section
//! export default { template, helpers, handshake, styles };
//! ```
//!
//! Every string goes through a JSON string literal and every map is ordered,
//! so the same input always yields the same bytes. Scoped class names are
//! applied to the template and to template helpers, both of which end up
//! as rendered markup.

use std::collections::BTreeMap;

use crate::compiler::CompileOptions;
use crate::ir::{CompilationResult, ComponentDocument, Helper, HelperMap, ScopedClassMap};
use crate::style::{rewrite_template_classes, used_style_variables, ScopedStyle};

// ═══════════════════════════════════════════════════════════════════════════════
// LITERALS
// ═══════════════════════════════════════════════════════════════════════════════

/// Double-quoted literal valid in both JSON and JavaScript.
pub fn js_string_literal(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn styles_literal(exports: &BTreeMap<String, String>) -> String {
    let entries: Vec<String> = exports
        .iter()
        .map(|(original, scoped)| format!("{}:{}", js_string_literal(original), js_string_literal(scoped)))
        .collect();
    format!("{{{}}}", entries.join(","))
}

fn helpers_literal(helpers: &HelperMap, classes: Option<&ScopedClassMap>) -> String {
    if helpers.is_empty() {
        return "{}".to_string();
    }

    let entries: Vec<String> = helpers
        .iter()
        .map(|(name, helper)| {
            let value = match helper {
                Helper::Function { callable, .. } => callable.source().to_string(),
                Helper::Template { literal_text, .. } => match classes {
                    Some(classes) => js_string_literal(&rewrite_template_classes(literal_text, classes)),
                    None => js_string_literal(literal_text),
                },
            };
            format!("  {}: {}", js_string_literal(name), value)
        })
        .collect();
    format!("{{\n{}\n}}", entries.join(",\n"))
}

/// Handshake data ships only to development builds that asked for it.
fn handshake_literal(document: &ComponentDocument, options: &CompileOptions) -> String {
    match &document.handshake_data {
        Some(data) if options.include_handshake && !options.production_mode => data.to_string(),
        _ => "{}".to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSEMBLY
// ═══════════════════════════════════════════════════════════════════════════════

fn style_only_code(exports: &BTreeMap<String, String>) -> String {
    format!("export const styles = {};\n", styles_literal(exports))
}

fn standard_code(
    template: &str,
    helpers: &HelperMap,
    handshake: &str,
    scoped: Option<&ScopedStyle>,
) -> String {
    let classes = scoped.map(|s| &s.classes);
    let exports = scoped.map(ScopedStyle::exports);

    let mut code = String::new();
    code.push_str(&format!("const template = {};\n", js_string_literal(template)));
    code.push_str(&format!("const helpers = {};\n", helpers_literal(helpers, classes)));
    code.push_str(&format!("const handshake = {};\n", handshake));

    match &exports {
        Some(exports) => {
            code.push_str(&format!("export const styles = {};\n", styles_literal(exports)));
            code.push_str("export default { template, helpers, handshake, styles };\n");
        }
        None => code.push_str("export default { template, helpers, handshake };\n"),
    }
    code
}

/// Build the result for one document. Diagnostics, timing and the required
/// helper list are filled in by the caller.
pub fn assemble(
    document: &ComponentDocument,
    helpers: &HelperMap,
    scoped: Option<&ScopedStyle>,
    options: &CompileOptions,
) -> CompilationResult {
    let style_exports = scoped.map(ScopedStyle::exports);

    let code = if document.is_style_only {
        style_only_code(style_exports.as_ref().unwrap_or(&BTreeMap::new()))
    } else {
        let template = match scoped {
            Some(scoped) => rewrite_template_classes(&document.template_markup, &scoped.classes),
            None => document.template_markup.clone(),
        };
        standard_code(
            &template,
            helpers,
            &handshake_literal(document, options),
            scoped,
        )
    };

    tracing::debug!(
        component = %document.component_name,
        is_style_only = document.is_style_only,
        helpers = helpers.len(),
        bytes = code.len(),
        "assembled module"
    );

    CompilationResult {
        code,
        style_exports,
        used_style_variables: document
            .style_text
            .as_deref()
            .map(used_style_variables)
            .unwrap_or_default(),
        is_style_only: document.is_style_only,
        diagnostics: Vec::new(),
        timing_ms: 0.0,
        css: scoped.map(|s| s.rewritten_css.clone()),
        component_name: document.component_name.clone(),
        content_hash: document.content_hash.clone(),
        required_helpers: Vec::new(),
        helper_names: helpers.keys().cloned().collect(),
        source_map: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::extract_helpers;
    use crate::style::{StyleConfig, StyleScoper};
    use serde_json::json;

    fn document(template: &str, style: Option<&str>, handshake: Option<serde_json::Value>) -> ComponentDocument {
        ComponentDocument {
            template_markup: template.to_string(),
            script_text: None,
            style_text: style.map(str::to_string),
            handshake_data: handshake,
            is_style_only: template.is_empty() && style.is_some(),
            source_path: "card.html".to_string(),
            content_hash: "abc".to_string(),
            component_name: "card".to_string(),
        }
    }

    #[test]
    fn test_js_string_literal() {
        assert_eq!(js_string_literal("say \"hi\"\n"), r#""say \"hi\"\n""#);
        assert_eq!(js_string_literal("a\\b"), r#""a\\b""#);
    }

    #[test]
    fn test_style_only_is_single_statement() {
        let doc = document("", Some(".a{color:red}"), None);
        let scoped = StyleScoper::new(StyleConfig::default()).scope(".a{color:red}", "card");
        let result = assemble(&doc, &HelperMap::new(), Some(&scoped), &CompileOptions::default());

        assert!(result.is_style_only);
        assert_eq!(result.code, "export const styles = {\"a\":\"card_a_mm8id\"};\n");
        assert_eq!(result.css.as_deref(), Some(".card_a_mm8id{color:red}"));
    }

    #[test]
    fn test_standard_output_shape() {
        let helpers = extract_helpers(
            "function greet(name) { return name; }\nconst opt = `<option>{{x}}</option>`;",
        )
        .helpers;
        let doc = document("<p>{{ user : greet }}</p>", None, None);
        let result = assemble(&doc, &helpers, None, &CompileOptions::default());

        assert_eq!(
            result.code,
            concat!(
                "const template = \"<p>{{ user : greet }}</p>\";\n",
                "const helpers = {\n",
                "  \"greet\": function greet(name) { return name; },\n",
                "  \"opt\": \"<option>{{x}}</option>\"\n",
                "};\n",
                "const handshake = {};\n",
                "export default { template, helpers, handshake };\n",
            )
        );
        assert_eq!(result.helper_names, vec!["greet".to_string(), "opt".to_string()]);
        assert!(result.style_exports.is_none());
    }

    #[test]
    fn test_handshake_dropped_in_production() {
        let doc = document("<p>x</p>", None, Some(json!({"user": "Ada"})));

        let dev = assemble(&doc, &HelperMap::new(), None, &CompileOptions::development());
        assert!(dev.code.contains("const handshake = {\"user\":\"Ada\"};"));

        let prod = assemble(&doc, &HelperMap::new(), None, &CompileOptions::production());
        assert!(prod.code.contains("const handshake = {};"));

        let opted_out = CompileOptions {
            include_handshake: false,
            ..CompileOptions::development()
        };
        let off = assemble(&doc, &HelperMap::new(), None, &opted_out);
        assert!(off.code.contains("const handshake = {};"));
    }

    #[test]
    fn test_styles_exported_and_template_rewritten() {
        let css = ".title { color: var(--accent); }";
        let doc = document("<h1 class=\"title\">{{ t }}</h1>", Some(css), None);
        let scoped = StyleScoper::new(StyleConfig::default()).scope(css, "card");
        let result = assemble(&doc, &HelperMap::new(), Some(&scoped), &CompileOptions::default());

        let scoped_name = &scoped.classes["title"].scoped_name;
        assert!(result
            .code
            .contains(&format!("const template = \"<h1 class=\\\"{}\\\">{{{{ t }}}}</h1>\";", scoped_name)));
        assert!(result
            .code
            .contains(&format!("export const styles = {{\"title\":\"{}\"}};", scoped_name)));
        assert!(result
            .code
            .ends_with("export default { template, helpers, handshake, styles };\n"));
        assert_eq!(result.used_style_variables, vec!["--accent".to_string()]);
    }

    #[test]
    fn test_template_helpers_use_scoped_classes() {
        let css = ".item { color: red; }";
        let helpers = extract_helpers(
            "const row = `<li class=\"item\">{{x}}</li>`;\nfunction label(x) { return '<b class=\"item\">' + x; }",
        )
        .helpers;
        let doc = document("<ul>{{ rows : row }}</ul>", Some(css), None);
        let scoped = StyleScoper::new(StyleConfig::default()).scope(css, "card");
        let result = assemble(&doc, &helpers, Some(&scoped), &CompileOptions::default());

        let scoped_name = &scoped.classes["item"].scoped_name;
        assert!(result
            .code
            .contains(&format!("  \"row\": \"<li class=\\\"{}\\\">{{{{x}}}}</li>\"", scoped_name)));
        // Function helpers are emitted as written
        assert!(result.code.contains("'<b class=\"item\">'"));
        match &helpers["row"] {
            Helper::Template { literal_text, .. } => assert_eq!(literal_text, "<li class=\"item\">{{x}}</li>"),
            other => panic!("unexpected helper {:?}", other),
        }
    }
}
