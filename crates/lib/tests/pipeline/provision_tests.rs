use tmplc_lib::engine::{EngineLocation, EngineRemote, Provisioner};
use tmplc_lib::{PrecompileError, precompile};

use super::common::{JS_ENGINE, TestTree, fixture_content};

fn remote_options(tree: &TestTree, server_url: &str) -> tmplc_lib::PrecompileOptions {
  let mut options = tree.options(JS_ENGINE);
  options.provision.script_dirs = Vec::new();
  options.provision.offline = false;
  options.provision.remote = EngineRemote::Template {
    url: format!("{}/engines/{{name}}", server_url),
  };
  options
}

#[test]
fn empty_cache_fetches_once_then_reuses() {
  let mut server = mockito::Server::new();
  let download = server
    .mock("GET", "/engines/fake-handlebars.js")
    .with_status(200)
    .with_body(fixture_content(JS_ENGINE))
    .expect(1)
    .create();

  let tree = TestTree::new();
  tree.write("a.hbs", "{{title}}");
  let options = remote_options(&tree, &server.url());

  let first = precompile(&options).unwrap();
  assert!(matches!(first.engine.location, EngineLocation::Fetched(_)));
  let cached: Vec<_> = std::fs::read_dir(tree.cache()).unwrap().collect();
  assert_eq!(cached.len(), 1);

  let second = precompile(&options).unwrap();
  assert!(matches!(second.engine.location, EngineLocation::Cached(_)));

  download.assert();
}

#[test]
fn metadata_listing_locates_download() {
  let mut server = mockito::Server::new();
  let listing_body = format!(
    r#"[{{"name":"other.js","html_url":"{0}/other"}},{{"name":"fake-handlebars.js","html_url":"{0}/files/fake"}}]"#,
    server.url()
  );
  let _listing = server
    .mock("GET", "/downloads")
    .with_status(200)
    .with_header("content-type", "application/json")
    .with_body(listing_body)
    .create();
  let _redirect = server
    .mock("GET", "/files/fake")
    .with_status(302)
    .with_header("location", "/cdn/fake-handlebars.js")
    .create();
  let _file = server
    .mock("GET", "/cdn/fake-handlebars.js")
    .with_status(200)
    .with_body(fixture_content(JS_ENGINE))
    .create();

  let tree = TestTree::new();
  let mut options = tree.options(JS_ENGINE);
  options.provision.script_dirs = Vec::new();
  options.provision.offline = false;
  options.provision.remote = EngineRemote::Metadata {
    url: format!("{}/downloads", server.url()),
  };

  let engine = Provisioner::new(options.provision.clone()).resolve(JS_ENGINE).unwrap();

  assert_eq!(engine.location, EngineLocation::Fetched(tree.cache().join(JS_ENGINE)));
  assert_eq!(engine.read_source().unwrap(), fixture_content(JS_ENGINE));
}

#[test]
fn offline_cache_miss_fails() {
  let tree = TestTree::new();
  tree.write("a.hbs", "{{title}}");
  let mut options = tree.options(JS_ENGINE);
  options.provision.script_dirs = Vec::new();

  let err = precompile(&options).unwrap_err();

  assert!(matches!(err, PrecompileError::Provision { .. }));
}
