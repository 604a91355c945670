//! End-to-end compilation tests

use crate::compiler::{compile, CompileOptions, Compiler, SourceFile};
use crate::error::{
    ERR_MALFORMED_TEMPLATE, ERR_MISSING_TEMPLATE, ERR_STRUCTURED_DATA, WARN_HELPER_EXTRACTION, WARN_SECTION,
};
use crate::ir::Helper;
use crate::style::HashMode;

const CARD: &str = r#"
<article class="card">
  <h2 class="title">{{ user/name : greet }}</h2>
  <select>{{ options : [], opt, #, [] : choices }}</select>
</article>

<script>
  function greet(name) { return "Hi " + name; }
  const opt = `<option>{{x}}</option>`;
</script>

<style>
  .card { padding: 4px; color: var(--fg); }
  .title { font-weight: bold; }
</style>

<script type="application/json">
  {
    // demo data
    'user': { "name": "Ada" },
    "options": ["a", "b"],
  }
</script>
"#;

fn options_for(path: &str, base: CompileOptions) -> CompileOptions {
    base.with_source_path(path)
}

#[test]
fn test_compilation_is_deterministic() {
    for base in [CompileOptions::development(), CompileOptions::production()] {
        let options = options_for("card.html", base);
        let first = compile(CARD, &options).unwrap();
        let second = compile(CARD, &options).unwrap();
        assert_eq!(first.code, second.code);
        assert_eq!(first.style_exports, second.style_exports);
        assert_eq!(first.css, second.css);
    }
}

#[test]
fn test_full_document() {
    let result = compile(CARD, &options_for("card.html", CompileOptions::development())).unwrap();

    assert!(!result.is_style_only);
    assert_eq!(result.component_name, "card");
    assert_eq!(result.required_helpers, vec!["greet".to_string(), "opt".to_string()]);
    assert_eq!(result.helper_names, vec!["greet".to_string(), "opt".to_string()]);
    assert_eq!(result.used_style_variables, vec!["--fg".to_string()]);
    assert!(result.diagnostics.is_empty());

    let exports = result.style_exports.as_ref().unwrap();
    let card = &exports["card"];
    let title = &exports["title"];
    assert!(card.starts_with("card_card_"));
    assert!(title.starts_with("card_title_"));

    assert!(result.code.contains("  \"greet\": function greet(name) { return \"Hi \" + name; },\n"));
    assert!(result.code.contains("  \"opt\": \"<option>{{x}}</option>\"\n"));
    assert!(result.code.contains(&format!("<article class=\\\"{}\\\">", card)));
    assert!(result.code.contains(&format!("<h2 class=\\\"{}\\\">", title)));
    let handshake_line = result
        .code
        .lines()
        .find(|line| line.starts_with("const handshake = "))
        .unwrap();
    let handshake: serde_json::Value = serde_json::from_str(
        handshake_line
            .trim_start_matches("const handshake = ")
            .trim_end_matches(';'),
    )
    .unwrap();
    assert_eq!(handshake, serde_json::json!({"user": {"name": "Ada"}, "options": ["a", "b"]}));
    assert!(result
        .code
        .ends_with("export default { template, helpers, handshake, styles };\n"));
    assert!(result.css.as_ref().unwrap().contains(&format!(".{} {{ padding", card)));
}

#[test]
fn test_production_drops_handshake() {
    let result = compile(CARD, &options_for("card.html", CompileOptions::production())).unwrap();
    assert!(result.code.contains("const handshake = {};"));
    assert!(!result.code.contains("Ada"));
}

#[test]
fn test_hash_modes_react_differently_to_rule_edits() {
    let edited = CARD.replace("font-weight: bold;", "font-weight: normal;");

    let dev = CompileOptions::development();
    let before = compile(CARD, &dev).unwrap().style_exports.unwrap();
    let after = compile(&edited, &dev).unwrap().style_exports.unwrap();
    assert_eq!(before["title"], after["title"]);

    let prod = CompileOptions::production();
    let before = compile(CARD, &prod).unwrap().style_exports.unwrap();
    let after = compile(&edited, &prod).unwrap().style_exports.unwrap();
    assert_ne!(before["title"], after["title"]);
    assert_eq!(before["card"], after["card"]);
}

#[test]
fn test_style_only_document() {
    let options = CompileOptions {
        component_name: Some("card".to_string()),
        ..CompileOptions::default()
    };
    let result = compile("<style>.a{color:red}</style>", &options).unwrap();
    assert!(result.is_style_only);
    assert_eq!(result.code, "export const styles = {\"a\":\"card_a_mm8id\"};\n");
    assert_eq!(result.code.matches(';').count(), 1);
}

#[test]
fn test_fatal_errors_carry_file_path() {
    let options = options_for("broken.html", CompileOptions::default());

    let err = compile("<script>const a = 1;</script>", &options).unwrap_err();
    assert_eq!(err.code, ERR_MISSING_TEMPLATE);
    assert_eq!(err.file_path, "broken.html");

    let err = compile("<p>{{ a </p>", &options).unwrap_err();
    assert_eq!(err.code, ERR_MALFORMED_TEMPLATE);
    assert_eq!(err.file_path, "broken.html");
    assert_eq!(err.location.column, 4);

    let err = compile("<p>x</p><script type=\"application/json\">{ a: }</script>", &options).unwrap_err();
    assert_eq!(err.code, ERR_STRUCTURED_DATA);
    assert_eq!(err.file_path, "broken.html");
}

#[test]
fn test_broken_helper_does_not_abort() {
    let raw = "<p>{{ x : good }}</p>\n<script>\nfunction good(a) { return a; }\nconst bad = (a => {\n</script>";
    let result = compile(raw, &CompileOptions::default()).unwrap();
    assert_eq!(result.helper_names, vec!["good".to_string()]);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, WARN_HELPER_EXTRACTION);
    assert!(result.diagnostics[0].message.contains("bad"));
}

#[test]
fn test_helpers_are_typed_in_extraction() {
    let extraction = crate::helpers::extract_helpers(
        "function greet(name) { return name; }\nconst opt = `<option>{{x}}</option>`;",
    );
    assert!(matches!(extraction.helpers["greet"], Helper::Function { .. }));
    assert!(matches!(extraction.helpers["opt"], Helper::Template { .. }));
}

#[test]
fn test_custom_class_name_pattern() {
    let options = CompileOptions {
        class_name_pattern: Some("x-[local]-[hash:base64:5]".to_string()),
        hash_mode: HashMode::Development,
        ..options_for("card.html", CompileOptions::default())
    };
    let exports = compile(CARD, &options).unwrap().style_exports.unwrap();
    assert!(exports["card"].starts_with("x-card-"));
}

#[test]
fn test_batch_matches_single_compiles() {
    let compiler = Compiler::new(CompileOptions::production());
    let files = vec![
        SourceFile::new("one.html", CARD),
        SourceFile::new("two.html", CARD.replace("card", "panel")),
    ];
    let batch = compiler.compile_batch(&files);
    for (file, outcome) in files.iter().zip(batch) {
        let single = compile(&file.text, &options_for(&file.path, CompileOptions::production())).unwrap();
        assert_eq!(outcome.unwrap().code, single.code);
    }
}

#[test]
fn test_template_element_script_is_not_lost() {
    let raw = "<div>{{ a }}</div><template><script>function hidden() {}</script></template>";
    let result = compile(raw, &CompileOptions::default()).unwrap();
    assert!(result.helper_names.is_empty());
    assert!(result
        .code
        .starts_with("const template = \"<div>{{ a }}</div><template><script>function hidden() {}</script></template>\";"));
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, WARN_SECTION);
}

#[test]
fn test_typed_helper_is_reported_not_emitted() {
    let raw = "<p>{{ x : g }}</p><script>function g(x: string) { return x; }</script>";
    let result = compile(raw, &CompileOptions::default()).unwrap();
    assert!(result.helper_names.is_empty());
    assert!(!result.code.contains("x: string"));
    assert_eq!(result.diagnostics[0].code, WARN_HELPER_EXTRACTION);
}
