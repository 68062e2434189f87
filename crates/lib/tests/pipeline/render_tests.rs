use boa_engine::{Context, Source};
use tmplc_lib::precompile;
use tmplc_lib::precompile::WhitespacePolicy;

use super::common::{JS_ENGINE, TestTree, fixture_content};

/// Evaluate scripts in order in a fresh context and return the last value.
fn eval_all(scripts: &[&str]) -> String {
  let mut context = Context::default();
  let mut last = None;
  for script in scripts {
    last = Some(context.eval(Source::from_bytes(*script)).unwrap());
  }
  last
    .unwrap()
    .to_string(&mut context)
    .unwrap()
    .to_std_string_escaped()
}

#[test]
fn precompiled_module_renders_like_direct_compilation() {
  let tree = TestTree::new();
  let source = "<h1>{{title}}</h1><p>{{shout body}}</p>";
  tree.write("page.hbs", source);

  precompile(&tree.options(JS_ENGINE)).unwrap();

  let engine = fixture_content(JS_ENGINE);
  let module = tree.read_output("root.js");
  let helpers = "Handlebars.registerHelper('shout', function (s) { return s.toUpperCase() + '!'; });";
  let data = "({ title: 'Hello', body: 'world' })";

  let precompiled = eval_all(&[
    &engine,
    helpers,
    &module,
    &format!("Handlebars.templates['page']({data})"),
  ]);
  let direct = eval_all(&[
    &engine,
    helpers,
    &format!("Handlebars.compile({})({data})", serde_json::to_string(source).unwrap()),
  ]);

  assert_eq!(precompiled, "<h1>Hello</h1><p>WORLD!</p>");
  assert_eq!(precompiled, direct);
}

#[test]
fn modules_share_one_registry() {
  let tree = TestTree::new();
  tree.write("a.hbs", "A{{x}}");
  tree.write("sub/b.hbs", "B{{x}}");

  precompile(&tree.options(JS_ENGINE)).unwrap();

  let engine = fixture_content(JS_ENGINE);
  let root = tree.read_output("root.js");
  let sub = tree.read_output("sub/sub.js");
  let rendered = eval_all(&[
    &engine,
    &root,
    &sub,
    "Handlebars.templates['a']({ x: 1 }) + Handlebars.templates['b']({ x: 2 })",
  ]);

  assert_eq!(rendered, "A1B2");
}

#[test]
fn purge_strips_line_breaks_before_compiling() {
  let tree = TestTree::new();
  tree.write("a.html", "<p>\n\tHi\r\n</p>");
  let mut options = tree.options(JS_ENGINE);
  options.whitespace = WhitespacePolicy { purge: true };

  precompile(&options).unwrap();

  let module = tree.read_output("root.js");
  assert!(module.contains(r#""<p>Hi</p>""#), "{module}");
}

#[test]
fn without_purge_text_is_unchanged() {
  let tree = TestTree::new();
  tree.write("a.html", "<p>\n\tHi\r\n</p>");

  precompile(&tree.options(JS_ENGINE)).unwrap();

  let module = tree.read_output("root.js");
  assert!(module.contains(r#""<p>\n\tHi\r\n</p>""#), "{module}");
}

#[test]
fn configured_encoding_applies_to_input_and_output() {
  let tree = TestTree::new();
  let path = tree.source().join("menu.html");
  std::fs::write(&path, b"caf\xe9 {{item}}").unwrap();
  let mut options = tree.options(JS_ENGINE);
  options.encoding = encoding_rs::WINDOWS_1252;

  precompile(&options).unwrap();

  let bytes = std::fs::read(tree.output().join("root.js")).unwrap();
  assert!(bytes.windows(4).any(|w| w == b"caf\xe9"));
  assert!(std::str::from_utf8(&bytes).is_err());
}
