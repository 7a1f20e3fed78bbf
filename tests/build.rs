//! End-to-end build tests over temporary projects

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use tangram_lib::bundler::Bundler;
use tangram_lib::cli::{BuildOptions, Mode};
use tangram_lib::config::Config;
use tangram_lib::error::BuildError;

fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn write_binary(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn load_config(root: &Path) -> Config {
    Config::load(root.join("tangram.toml")).unwrap()
}

async fn build(root: &Path, mode: Mode) -> Result<(), BuildError> {
    let bundler = Bundler::new(load_config(root), BuildOptions { mode }).unwrap();
    bundler.build().await.map(|_| ())
}

fn read_dist(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join("dist").join(rel)).unwrap()
}

fn dist_files(root: &Path) -> Vec<String> {
    let mut files = Vec::new();
    let dist = root.join("dist");
    collect_files(&dist, &dist, &mut files);
    files.sort();
    files
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<String>) {
    if !dir.is_dir() {
        return;
    }
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_files(base, &path, out);
        } else {
            out.push(
                path.strip_prefix(base)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/"),
            );
        }
    }
}

/// Project with two entries sharing a module, plus a commons group
fn shared_project(root: &Path) {
    write_file(
        root,
        "tangram.toml",
        r#"
            [entry]
            app = "src/app.js"
            admin = "src/admin.js"

            [[split.groups]]
            name = "commons"
            min_shared_references = 2
            min_size = 0
        "#,
    );
    write_file(root, "src/app.js", "import { greet } from './util';\ngreet('app');\n");
    write_file(root, "src/admin.js", "import { greet } from './util';\ngreet('admin');\n");
    write_file(
        root,
        "src/util.js",
        "export function greet(name) { console.log('hi ' + name); }\n",
    );
}

/// A shared module lands in exactly one chunk, and every module is
/// registered exactly once across all emitted scripts.
#[tokio::test]
async fn shared_module_extracted_once() {
    let dir = TempDir::new().unwrap();
    shared_project(dir.path());

    build(dir.path(), Mode::Development).await.unwrap();

    let files = dist_files(dir.path());
    assert_eq!(
        files,
        vec!["admin.bundle.js", "app.bundle.js", "commons.js"]
    );

    let commons = read_dist(dir.path(), "commons.js");
    assert!(commons.contains("__tangram_modules__[\"src/util.js\"]"));

    // No duplication: util.js is registered only in the commons chunk
    for name in ["app.bundle.js", "admin.bundle.js"] {
        let script = read_dist(dir.path(), name);
        assert!(
            !script.contains("__tangram_modules__[\"src/util.js\"]"),
            "{name} duplicates the shared module"
        );
    }
}

/// Identical inputs and policy produce byte-identical artifacts.
#[tokio::test]
async fn rebuild_is_deterministic() {
    let dir = TempDir::new().unwrap();
    shared_project(dir.path());

    build(dir.path(), Mode::Production).await.unwrap();
    let first: Vec<(String, Vec<u8>)> = dist_files(dir.path())
        .into_iter()
        .map(|f| {
            let bytes = fs::read(dir.path().join("dist").join(&f)).unwrap();
            (f, bytes)
        })
        .collect();

    build(dir.path(), Mode::Production).await.unwrap();
    let second: Vec<(String, Vec<u8>)> = dist_files(dir.path())
        .into_iter()
        .map(|f| {
            let bytes = fs::read(dir.path().join("dist").join(&f)).unwrap();
            (f, bytes)
        })
        .collect();

    assert_eq!(first, second);
}

/// A->B->A import cycle terminates and registers each module once.
#[tokio::test]
async fn cyclic_imports_terminate() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "tangram.toml",
        "[entry]\napp = \"src/a.js\"\n",
    );
    write_file(dir.path(), "src/a.js", "import { b } from './b';\nexport const a = 1;\n");
    write_file(dir.path(), "src/b.js", "import { a } from './a';\nexport const b = 2;\n");

    build(dir.path(), Mode::Development).await.unwrap();

    let script = read_dist(dir.path(), "app.bundle.js");
    assert_eq!(script.matches("__tangram_modules__[\"src/a.js\"]").count(), 1);
    assert_eq!(script.matches("__tangram_modules__[\"src/b.js\"]").count(), 1);
}

/// A dynamic import seeds its own chunk; renaming the target removes the
/// stale artifact on the next build (clean-before-write).
#[tokio::test]
async fn stale_artifacts_are_cleaned() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "tangram.toml",
        "[entry]\napp = \"src/index.js\"\n",
    );
    write_file(dir.path(), "src/index.js", "import('./lazy');\n");
    write_file(dir.path(), "src/lazy.js", "export const lazy = true;\n");

    build(dir.path(), Mode::Development).await.unwrap();
    assert!(dir.path().join("dist/lazy.js").exists());

    // Rename the dynamically imported module
    fs::rename(dir.path().join("src/lazy.js"), dir.path().join("src/later.js")).unwrap();
    write_file(dir.path(), "src/index.js", "import('./later');\n");

    build(dir.path(), Mode::Development).await.unwrap();
    assert!(dir.path().join("dist/later.js").exists());
    assert!(
        !dir.path().join("dist/lazy.js").exists(),
        "stale artifact survived the rebuild"
    );
}

/// An unresolvable import aborts the build and leaves the previous good
/// output untouched.
#[tokio::test]
async fn unresolved_import_aborts_and_preserves_output() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "tangram.toml",
        "[entry]\napp = \"src/index.js\"\n",
    );
    write_file(dir.path(), "src/index.js", "console.log('ok');\n");

    build(dir.path(), Mode::Development).await.unwrap();
    let good = read_dist(dir.path(), "app.bundle.js");

    write_file(dir.path(), "src/index.js", "import './missing';\n");

    let err = build(dir.path(), Mode::Development).await.unwrap_err();
    match err {
        BuildError::UnresolvedImport { specifier, .. } => assert_eq!(specifier, "./missing"),
        other => panic!("unexpected error: {other}"),
    }

    // Prior artifacts are still in place
    assert_eq!(read_dist(dir.path(), "app.bundle.js"), good);
}

/// A fresh project with a broken import produces no output at all.
#[tokio::test]
async fn failed_build_publishes_nothing() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "tangram.toml",
        "[entry]\napp = \"src/index.js\"\n",
    );
    write_file(dir.path(), "src/index.js", "import './missing';\n");

    build(dir.path(), Mode::Development).await.unwrap_err();
    assert!(!dir.path().join("dist").exists());
}

/// Stylesheets are extracted per chunk, minified by the css-minify
/// plugin, and referenced from the generated HTML page.
#[tokio::test]
async fn css_extraction_and_html_generation() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "tangram.toml",
        r#"
            [entry]
            app = "src/index.js"

            [[plugin]]
            name = "html"
            [plugin.options]
            title = "Demo"

            [[plugin]]
            name = "css-minify"
        "#,
    );
    write_file(dir.path(), "src/index.js", "import './style.css';\nconsole.log('up');\n");
    write_file(dir.path(), "src/style.css", "body {\n  color: #ff0000;\n}\n");

    build(dir.path(), Mode::Production).await.unwrap();

    let html = read_dist(dir.path(), "index.html");
    assert!(html.contains("<title>Demo</title>"));
    assert!(html.contains("app.bundle.js"));
    assert!(html.contains("app.css"));

    let css = read_dist(dir.path(), "app.css");
    assert!(!css.contains('\n'), "stylesheet was not minified: {css}");

    // The importing script gets a stub module for the extracted stylesheet
    let script = read_dist(dir.path(), "app.bundle.js");
    assert!(script.contains("__tangram_modules__[\"src/style.css\"]"));
}

/// Small images inline as data URIs; larger ones are emitted as hashed
/// standalone files.
#[tokio::test]
async fn asset_inlining_and_emission() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "tangram.toml",
        r#"
            [entry]
            app = "src/index.js"

            [output]
            inline_limit = 8
        "#,
    );
    write_file(
        dir.path(),
        "src/index.js",
        "import small from './small.png';\nimport big from './big.png';\nconsole.log(small, big);\n",
    );
    write_binary(dir.path(), "src/small.png", &[1, 2, 3, 4]);
    write_binary(dir.path(), "src/big.png", &[9u8; 64]);

    build(dir.path(), Mode::Development).await.unwrap();

    let script = read_dist(dir.path(), "app.bundle.js");
    assert!(script.contains("data:image/png;base64,"));

    let files = dist_files(dir.path());
    let asset = files
        .iter()
        .find(|f| f.starts_with("images/big-"))
        .expect("standalone asset emitted");
    assert!(asset.ends_with(".png"));
    assert!(script.contains(asset.as_str()));
}

/// JSON modules are validated and wrapped; their data flows into the bundle.
#[tokio::test]
async fn json_modules_are_wrapped() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "tangram.toml",
        "[entry]\napp = \"src/index.js\"\n",
    );
    write_file(dir.path(), "src/index.js", "import config from './config.json';\n");
    write_file(dir.path(), "src/config.json", "{\"debug\": true}\n");

    build(dir.path(), Mode::Development).await.unwrap();

    let script = read_dist(dir.path(), "app.bundle.js");
    assert!(script.contains("module.exports = {\"debug\": true}"));
}

/// A transform failure carries the module path and aborts the build.
#[tokio::test]
async fn transform_failure_aborts() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "tangram.toml",
        "[entry]\napp = \"src/index.js\"\n",
    );
    write_file(dir.path(), "src/index.js", "import bad from './bad.json';\n");
    write_file(dir.path(), "src/bad.json", "not json at all");

    let err = build(dir.path(), Mode::Development).await.unwrap_err();
    match err {
        BuildError::Transform { path, transform, .. } => {
            assert!(path.ends_with(PathBuf::from("src/bad.json")));
            assert_eq!(transform, "json");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("dist").exists());
}
