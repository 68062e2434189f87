use tmplc_lib::precompile;
use tmplc_lib::walk::HierarchyPolicy;

use super::common::{JS_ENGINE, TestTree};

fn nested_tree() -> TestTree {
  let tree = TestTree::new();
  tree.write("a.html", "<p>a</p>");
  tree.write("sub/b.html", "<p>b</p>");
  tree.write("sub/deep/c.html", "<p>c</p>");
  tree
}

#[test]
fn preserve_mode_mirrors_source_tree() {
  let tree = nested_tree();

  let report = precompile(&tree.options(JS_ENGINE)).unwrap();

  assert_eq!(report.bundles.len(), 3);
  assert_eq!(report.templates_compiled, 3);
  assert_eq!(tree.output_files(), vec!["root.js", "sub/deep/deep.js", "sub/sub.js"]);
}

#[test]
fn flatten_mode_joins_relative_path() {
  let tree = nested_tree();
  let mut options = tree.options(JS_ENGINE);
  options.hierarchy = HierarchyPolicy::FLATTEN;

  precompile(&options).unwrap();

  assert_eq!(tree.output_files(), vec!["index.js", "sub-deep.js", "sub.js"]);
}

#[test]
fn directories_without_templates_are_skipped_but_descended() {
  let tree = TestTree::new();
  tree.write("README.md", "not a template");
  tree.write("empty/notes.txt", "nothing");
  tree.write("empty/inner/x.hbs", "{{x}}");

  let report = precompile(&tree.options(JS_ENGINE)).unwrap();

  assert_eq!(report.bundles.len(), 1);
  assert_eq!(tree.output_files(), vec!["empty/inner/inner.js"]);
}

#[test]
fn bundles_are_reported_in_pre_order() {
  let tree = nested_tree();

  let report = precompile(&tree.options(JS_ENGINE)).unwrap();

  let paths: Vec<_> = report
    .bundles
    .iter()
    .map(|m| m.path.strip_prefix(tree.output()).unwrap().to_path_buf())
    .collect();
  assert_eq!(
    paths,
    vec![
      std::path::PathBuf::from("root.js"),
      std::path::PathBuf::from("sub/sub.js"),
      std::path::PathBuf::from("sub/deep/deep.js"),
    ]
  );
}

#[test]
fn module_registers_templates_in_name_order() {
  let tree = TestTree::new();
  tree.write("b.hbs", "b");
  tree.write("a.html", "a");

  let report = precompile(&tree.options(JS_ENGINE)).unwrap();

  assert_eq!(report.bundles[0].templates, vec!["a", "b"]);
  let module = tree.read_output("root.js");
  let a = module.find("templates['a']").unwrap();
  let b = module.find("templates['b']").unwrap();
  assert!(a < b);
  assert!(module.starts_with("(function() {\n"));
  assert!(module.ends_with("})();\n"));
}

#[test]
fn output_in_source_directory_is_stable() {
  let tree = nested_tree();
  let mut options = tree.options(JS_ENGINE);
  options.output_dir = tree.source();

  let first = precompile(&options).unwrap();
  let second = precompile(&options).unwrap();

  assert_eq!(first.bundles.len(), second.bundles.len());
  assert_eq!(second.templates_compiled, 3);
}

#[test]
fn rerun_produces_identical_bytes() {
  let tree = nested_tree();
  let options = tree.options(JS_ENGINE);

  precompile(&options).unwrap();
  let first: Vec<_> = tree.output_files().iter().map(|f| tree.read_output(f)).collect();
  precompile(&options).unwrap();
  let second: Vec<_> = tree.output_files().iter().map(|f| tree.read_output(f)).collect();

  assert_eq!(first, second);
}

#[test]
fn dry_run_writes_nothing() {
  let tree = nested_tree();
  let mut options = tree.options(JS_ENGINE);
  options.dry_run = true;

  let report = precompile(&options).unwrap();

  assert!(report.dry_run);
  assert_eq!(report.bundles.len(), 3);
  assert!(!tree.output().exists());
}

#[test]
fn custom_output_extension() {
  let tree = TestTree::new();
  tree.write("a.html", "a");
  let mut options = tree.options(JS_ENGINE);
  options.output_extension = "tmpl.js".to_string();

  precompile(&options).unwrap();

  assert_eq!(tree.output_files(), vec!["root.tmpl.js"]);
}
