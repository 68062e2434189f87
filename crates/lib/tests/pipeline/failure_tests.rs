use std::sync::atomic::AtomicBool;

use tmplc_lib::precompile::{FailurePolicy, KnownHelpersConfig};
use tmplc_lib::sandbox::SandboxError;
use tmplc_lib::{PrecompileError, precompile, precompile_with_cancel};

use super::common::{JS_ENGINE, LUA_ENGINE, TestTree};

fn strict(names: &[&str]) -> KnownHelpersConfig {
  KnownHelpersConfig {
    names: names.iter().map(|n| n.to_string()).collect(),
    strict_only: true,
  }
}

#[test]
fn unknown_helper_fails_when_strict() {
  let tree = TestTree::new();
  tree.write("nav.hbs", "<a>{{link target}}</a>");
  let mut options = tree.options(JS_ENGINE);
  options.known_helpers = strict(&[]);

  let err = precompile(&options).unwrap_err();

  match err {
    PrecompileError::Compile {
      engine,
      template,
      source,
      ..
    } => {
      assert_eq!(engine, JS_ENGINE);
      assert!(template.ends_with("nav.hbs"));
      assert!(source.message.contains("unknown helper link"), "{}", source.message);
    }
    other => panic!("expected compile error, got {other:?}"),
  }
  assert!(tree.output_files().is_empty());
}

#[test]
fn known_helper_compiles_when_strict() {
  let tree = TestTree::new();
  tree.write("nav.hbs", "<a>{{link target}}</a>");
  let mut options = tree.options(JS_ENGINE);
  options.known_helpers = strict(&["link"]);

  let report = precompile(&options).unwrap();

  assert_eq!(report.templates_compiled, 1);
}

#[test]
fn unknown_helper_is_allowed_when_lenient() {
  let tree = TestTree::new();
  tree.write("nav.hbs", "<a>{{link target}}</a>");
  let mut options = tree.options(JS_ENGINE);
  options.known_helpers = KnownHelpersConfig {
    names: Vec::new(),
    strict_only: false,
  };

  assert!(precompile(&options).is_ok());
}

#[test]
fn lua_engine_honors_helper_gate() {
  let tree = TestTree::new();
  tree.write("nav.hbs", "<a>{{link target}}</a>");
  let mut options = tree.options(LUA_ENGINE);
  options.known_helpers = strict(&["t"]);

  let err = precompile(&options).unwrap_err();
  assert!(matches!(err, PrecompileError::Compile { .. }));

  options.known_helpers = strict(&["link"]);
  let report = precompile(&options).unwrap();
  assert!(tree.read_output("root.js").contains("templates['nav']=template(function (c, h)"));
  assert_eq!(report.templates_compiled, 1);
}

#[test]
fn collect_all_skips_rejected_templates() {
  let tree = TestTree::new();
  tree.write("a.hbs", "{{title}}");
  tree.write("b.hbs", "{{link target}}");
  tree.write("sub/c.hbs", "{{t key}}");
  tree.write("sub/d.hbs", "{{body}}");
  let mut options = tree.options(JS_ENGINE);
  options.known_helpers = strict(&[]);
  options.failure_policy = FailurePolicy::CollectAll;

  let err = precompile(&options).unwrap_err();

  let PrecompileError::CompileFailures(failures) = err else {
    panic!("expected collected failures");
  };
  assert_eq!(failures.len(), 2);
  assert!(failures[0].template.ends_with("b.hbs"));
  assert!(failures[1].template.ends_with("c.hbs"));

  let root = tree.read_output("root.js");
  assert!(root.contains("templates['a']"));
  assert!(!root.contains("templates['b']"));
  let sub = tree.read_output("sub/sub.js");
  assert!(sub.contains("templates['d']"));
  assert!(!sub.contains("templates['c']"));
}

#[test]
fn collect_all_writes_nothing_for_fully_rejected_bundle() {
  let tree = TestTree::new();
  tree.write("only.hbs", "{{link target}}");
  let mut options = tree.options(JS_ENGINE);
  options.known_helpers = strict(&[]);
  options.failure_policy = FailurePolicy::CollectAll;

  assert!(matches!(precompile(&options), Err(PrecompileError::CompileFailures(f)) if f.len() == 1));
  assert!(tree.output_files().is_empty());
}

#[test]
fn cancelled_run_writes_nothing() {
  let tree = TestTree::new();
  tree.write("a.hbs", "{{title}}");
  let cancel = AtomicBool::new(true);

  let err = precompile_with_cancel(&tree.options(JS_ENGINE), &cancel).unwrap_err();

  assert!(matches!(err, PrecompileError::Cancelled));
  assert!(tree.output_files().is_empty());
}

#[test]
fn missing_source_directory_fails() {
  let tree = TestTree::new();
  let mut options = tree.options(JS_ENGINE);
  options.source_dir = tree.temp.path().join("nope");

  assert!(matches!(precompile(&options), Err(PrecompileError::SourceDir { .. })));
}

#[test]
fn missing_engine_fails_before_compiling() {
  let tree = TestTree::new();
  tree.write("a.hbs", "{{title}}");

  let err = precompile(&tree.options("handlebars-0.0.0.js")).unwrap_err();

  assert!(matches!(err, PrecompileError::Provision { .. }));
  assert!(!tree.output().join("root.js").exists());
}

#[test]
fn engine_without_entrypoint_fails_to_load() {
  let tree = TestTree::new();
  tree.write("a.hbs", "{{title}}");
  let scripts = tree.temp.path().join("scripts");
  std::fs::create_dir_all(&scripts).unwrap();
  std::fs::write(scripts.join("broken.js"), "var Handlebars = {};").unwrap();
  let mut options = tree.options("broken.js");
  options.provision.script_dirs = vec![scripts];

  let err = precompile(&options).unwrap_err();

  assert!(matches!(err, PrecompileError::Sandbox(SandboxError::MissingEntrypoint { .. })));
}
