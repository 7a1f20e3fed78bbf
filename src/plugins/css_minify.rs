//! Stylesheet minification plugin
//!
//! Minifies emitted stylesheet artifacts in place via lightningcss.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use super::{Plugin, PluginContext};
use crate::emit::Artifact;
use crate::error::{BuildError, Result};

/// Minifies artifacts whose filename matches the configured pattern
pub struct CssMinifyPlugin {
    matcher: GlobMatcher,
}

impl CssMinifyPlugin {
    pub fn from_options(options: Option<&toml::Table>) -> Result<Self> {
        let pattern = options
            .and_then(|t| t.get("pattern"))
            .and_then(|v| v.as_str())
            .unwrap_or("*.css");

        let matcher = Glob::new(pattern)
            .map_err(|e| BuildError::Config(format!("css-minify: invalid pattern '{pattern}': {e}")))?
            .compile_matcher();

        Ok(Self { matcher })
    }

    fn minify(&self, filename: &str, css: &str) -> std::result::Result<String, String> {
        let mut sheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: filename.to_string(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| e.to_string())?;

        sheet.minify(MinifyOptions::default()).map_err(|e| e.to_string())?;

        let output = sheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .map_err(|e| e.to_string())?;

        Ok(output.code)
    }
}

#[async_trait]
impl Plugin for CssMinifyPlugin {
    fn name(&self) -> &str {
        "css-minify"
    }

    async fn on_emit(&self, _ctx: &PluginContext, artifacts: &mut Vec<Artifact>) -> Result<()> {
        for artifact in artifacts.iter_mut() {
            if !self.matcher.is_match(Path::new(&artifact.filename)) {
                continue;
            }

            let css = std::str::from_utf8(&artifact.contents).map_err(|e| {
                BuildError::Transform {
                    path: PathBuf::from(&artifact.filename),
                    step: 0,
                    transform: "css-minify".to_string(),
                    message: e.to_string(),
                }
            })?;

            let minified =
                self.minify(&artifact.filename, css)
                    .map_err(|message| BuildError::Transform {
                        path: PathBuf::from(&artifact.filename),
                        step: 0,
                        transform: "css-minify".to_string(),
                        message,
                    })?;

            artifact.contents = minified.into_bytes();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::ChunkKind;
    use crate::cli::Mode;
    use crate::emit::ArtifactKind;

    fn ctx() -> PluginContext {
        PluginContext {
            root: PathBuf::from("/p"),
            public_path: "./".to_string(),
            mode: Mode::Production,
        }
    }

    #[tokio::test]
    async fn test_minifies_matching_stylesheets() {
        let plugin = CssMinifyPlugin::from_options(None).unwrap();
        let mut artifacts = vec![Artifact {
            filename: "app.css".to_string(),
            contents: b"body {\n  color: #ff0000;\n}\n".to_vec(),
            kind: ArtifactKind::Stylesheet,
            chunk: Some(("app".to_string(), ChunkKind::Entry)),
        }];

        plugin.on_emit(&ctx(), &mut artifacts).await.unwrap();

        let css = String::from_utf8(artifacts[0].contents.clone()).unwrap();
        assert!(!css.contains('\n'), "expected single-line output: {css}");
        assert!(css.contains("body"));
    }

    #[tokio::test]
    async fn test_ignores_non_matching_artifacts() {
        let plugin = CssMinifyPlugin::from_options(None).unwrap();
        let contents = b"var a = 1;\nvar b = 2;\n".to_vec();
        let mut artifacts = vec![Artifact {
            filename: "app.bundle.js".to_string(),
            contents: contents.clone(),
            kind: ArtifactKind::Script,
            chunk: Some(("app".to_string(), ChunkKind::Entry)),
        }];

        plugin.on_emit(&ctx(), &mut artifacts).await.unwrap();
        assert_eq!(artifacts[0].contents, contents);
    }
}
