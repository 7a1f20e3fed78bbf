//! Artifact emission
//!
//! Renders chunks to named artifacts (scripts, extracted stylesheets,
//! standalone assets), rewrites inter-module references to the bundle
//! runtime, and writes everything through a staging directory that is
//! swapped into place only after the whole build has succeeded. The swap
//! doubles as clean-before-write: stale artifacts from a prior run do not
//! survive it.

mod lower;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bundler::{Chunk, ChunkKind};
use crate::cli::Mode;
use crate::config::Config;
use crate::error::{BuildError, Result};
use crate::graph::{ModuleGraph, ModuleId, ModuleSource, ModuleType};
use crate::utils::hash_content;

pub use lower::lower_module;

/// What an artifact is, for plugin dispatch and HTML injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Script,
    Stylesheet,
    Asset,
    Html,
}

/// A final output file, held in memory until the swap
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Output-relative filename (may contain subdirectories)
    pub filename: String,

    pub contents: Vec<u8>,

    pub kind: ArtifactKind,

    /// The chunk this artifact was rendered from, if any
    pub chunk: Option<(String, ChunkKind)>,
}

/// Summary of a written artifact, for the CLI report
#[derive(Debug)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub size: usize,
}

/// Substitute `[name]`, `[hash]` and `[id]` tokens in a filename template
pub fn render_template(template: &str, name: &str, hash: &str, id: usize) -> String {
    template
        .replace("[name]", name)
        .replace("[hash]", hash)
        .replace("[id]", &id.to_string())
}

/// Module key used by the bundle runtime: root-relative path with
/// forward slashes. Stable across machines, unlike absolute paths.
pub fn module_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Render every chunk into its artifacts.
///
/// Each chunk yields a script artifact; chunks containing stylesheet
/// modules additionally yield an extracted stylesheet; binary modules
/// that were not inlined yield standalone asset files.
pub fn render_artifacts(
    graph: &ModuleGraph,
    chunks: &[Chunk],
    config: &Config,
    mode: Mode,
) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();

    for (id, chunk) in chunks.iter().enumerate() {
        // Standalone assets first, so the script can reference their URLs
        let mut asset_urls: Vec<(ModuleId, String)> = Vec::new();
        for &module_id in &chunk.modules {
            let module = graph.get_module(module_id).expect("module in chunk");
            if let ModuleSource::Binary(bytes) = module.output() {
                let filename = asset_filename(&module.path, bytes, config);
                let url = format!("{}{}", config.output.public_path, filename);
                asset_urls.push((module_id, url));
                artifacts.push(Artifact {
                    filename,
                    contents: bytes.clone(),
                    kind: ArtifactKind::Asset,
                    chunk: Some((chunk.name.clone(), chunk.kind)),
                });
            }
        }

        let mut script = render_chunk_script(graph, chunk, config, &asset_urls);
        if mode == Mode::Production {
            script = minify_script(&script);
        }

        let template = if chunk.is_entry() {
            &config.output.filename
        } else {
            &config.output.chunk_filename
        };
        let hash = hash_content(script.as_bytes());
        let filename = render_template(template, &chunk.name, &hash, id);
        debug!("chunk '{}' -> {}", chunk.name, filename);

        artifacts.push(Artifact {
            filename,
            contents: script.into_bytes(),
            kind: ArtifactKind::Script,
            chunk: Some((chunk.name.clone(), chunk.kind)),
        });

        // Extracted stylesheet
        let css = render_chunk_css(graph, chunk);
        if !css.is_empty() {
            let template = if chunk.is_entry() {
                &config.output.css_filename
            } else {
                &config.output.css_chunk_filename
            };
            let hash = hash_content(css.as_bytes());
            let filename = render_template(template, &chunk.name, &hash, id);

            artifacts.push(Artifact {
                filename,
                contents: css.into_bytes(),
                kind: ArtifactKind::Stylesheet,
                chunk: Some((chunk.name.clone(), chunk.kind)),
            });
        }
    }

    Ok(artifacts)
}

fn asset_filename(path: &Path, bytes: &[u8], config: &Config) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("asset");
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("bin");
    let hash = hash_content(bytes);
    let name = config
        .output
        .asset_filename
        .replace("[name]", stem)
        .replace("[hash]", &hash)
        .replace("[ext]", ext);
    if config.output.asset_dir.is_empty() {
        name
    } else {
        format!("{}/{}", config.output.asset_dir, name)
    }
}

/// The bundle runtime: a shared module registry plus require/import
/// helpers. Idempotent so that every chunk can carry it and load in any
/// order.
const RUNTIME: &str = r#"(function (global) {
  var modules = global.__tangram_modules__ = global.__tangram_modules__ || {};
  var cache = global.__tangram_cache__ = global.__tangram_cache__ || {};
  global.__tangram_require__ = global.__tangram_require__ || function (key) {
    if (cache[key]) return cache[key].exports;
    var module = (cache[key] = { exports: {} });
    var fn = modules[key];
    if (fn) fn(module, module.exports, global.__tangram_require__);
    return module.exports;
  };
  global.__tangram_import__ = global.__tangram_import__ || function (key) {
    return Promise.resolve().then(function () { return global.__tangram_require__(key); });
  };
})(typeof window !== 'undefined' ? window : globalThis);
"#;

fn render_chunk_script(
    graph: &ModuleGraph,
    chunk: &Chunk,
    config: &Config,
    asset_urls: &[(ModuleId, String)],
) -> String {
    let mut out = String::new();
    out.push_str(RUNTIME);

    for &module_id in &chunk.modules {
        let module = graph.get_module(module_id).expect("module in chunk");
        let key = module_key(&config.root, &module.path);

        match module.output() {
            ModuleSource::Binary(_) => {
                // Non-inlined asset: the module exports its public URL
                let url = asset_urls
                    .iter()
                    .find(|(id, _)| *id == module_id)
                    .map(|(_, url)| url.as_str())
                    .unwrap_or("");
                out.push_str(&format!(
                    "\n__tangram_modules__[{key:?}] = function (module) {{\n  module.exports = {url:?};\n}};\n"
                ));
            }
            ModuleSource::Text(code) => {
                if module.module_type == ModuleType::Css {
                    // Extracted to a stylesheet artifact; importers get an
                    // empty exports object
                    out.push_str(&format!(
                        "\n__tangram_modules__[{key:?}] = function (module) {{\n  module.exports = {{}};\n}};\n"
                    ));
                } else {
                    let bindings: Vec<lower::ImportBinding> = module
                        .imports
                        .iter()
                        .filter_map(|imp| {
                            graph.get_module(imp.target).map(|target| lower::ImportBinding {
                                specifier: imp.specifier.clone(),
                                key: module_key(&config.root, &target.path),
                                kind: imp.kind,
                            })
                        })
                        .collect();
                    let lowered = lower_module(code, &bindings);
                    out.push_str(&format!(
                        "\n// {key}\n__tangram_modules__[{key:?}] = function (module, exports, require) {{\n{lowered}\n}};\n"
                    ));
                }
            }
        }
    }

    if chunk.is_entry() {
        if let Some(root) = chunk.root {
            if let Some(entry) = graph.get_module(root) {
                let key = module_key(&config.root, &entry.path);
                out.push_str(&format!("\n__tangram_require__({key:?});\n"));
            }
        }
    }

    out
}

/// Concatenate the chunk's stylesheet modules, in module-ID order
fn render_chunk_css(graph: &ModuleGraph, chunk: &Chunk) -> String {
    let mut css = String::new();

    for &module_id in &chunk.modules {
        let module = graph.get_module(module_id).expect("module in chunk");
        if module.module_type != ModuleType::Css {
            continue;
        }
        if let Some(text) = module.output().as_text() {
            if !css.is_empty() {
                css.push('\n');
            }
            css.push_str(text);
            if !css.ends_with('\n') {
                css.push('\n');
            }
        }
    }

    css
}

/// Strip comments and collapse whitespace in a rendered script.
///
/// String and template literals are preserved verbatim.
pub fn minify_script(code: &str) -> String {
    let mut result = String::with_capacity(code.len());
    let mut in_string = false;
    let mut string_char = ' ';
    let mut in_single_comment = false;
    let mut in_multi_comment = false;
    let mut prev_char = ' ';
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        if in_single_comment {
            if c == '\n' {
                in_single_comment = false;
                result.push('\n');
            }
            continue;
        }

        if in_multi_comment {
            if prev_char == '*' && c == '/' {
                in_multi_comment = false;
            }
            prev_char = c;
            continue;
        }

        if in_string {
            result.push(c);
            if c == string_char && prev_char != '\\' {
                in_string = false;
            }
            prev_char = c;
            continue;
        }

        if c == '"' || c == '\'' || c == '`' {
            in_string = true;
            string_char = c;
            result.push(c);
            prev_char = c;
            continue;
        }

        if c == '/' {
            if let Some(&next) = chars.peek() {
                if next == '/' {
                    in_single_comment = true;
                    chars.next();
                    continue;
                } else if next == '*' {
                    in_multi_comment = true;
                    chars.next();
                    continue;
                }
            }
        }

        if c.is_whitespace() {
            if !result.ends_with(' ') && !result.ends_with('\n') {
                result.push(' ');
            }
        } else {
            result.push(c);
        }

        prev_char = c;
    }

    result
}

/// Write artifacts through a staging directory and swap it into place.
///
/// The previous output directory is untouched until every artifact has
/// been written, then replaced in one rename.
pub fn write_artifacts(artifacts: &[Artifact], config: &Config) -> Result<Vec<ArtifactInfo>> {
    let output_dir = config.output_dir();
    let staging_dir = staging_path(&output_dir);

    if staging_dir.exists() {
        fs::remove_dir_all(&staging_dir).map_err(|source| BuildError::Emit {
            path: staging_dir.clone(),
            source,
        })?;
    }
    fs::create_dir_all(&staging_dir).map_err(|source| BuildError::Emit {
        path: staging_dir.clone(),
        source,
    })?;

    let mut written = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let path = staging_dir.join(&artifact.filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| BuildError::Emit {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, &artifact.contents).map_err(|source| BuildError::Emit {
            path: path.clone(),
            source,
        })?;

        written.push(ArtifactInfo {
            path: output_dir.join(&artifact.filename),
            size: artifact.contents.len(),
        });
    }

    // Atomic swap: clear the previous output, move staging into place
    if output_dir.exists() {
        fs::remove_dir_all(&output_dir).map_err(|source| BuildError::Emit {
            path: output_dir.clone(),
            source,
        })?;
    }
    fs::rename(&staging_dir, &output_dir).map_err(|source| BuildError::Emit {
        path: output_dir.clone(),
        source,
    })?;

    Ok(written)
}

fn staging_path(output_dir: &Path) -> PathBuf {
    let dirname = output_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("out");
    output_dir.with_file_name(format!(".{dirname}.staging"))
}
