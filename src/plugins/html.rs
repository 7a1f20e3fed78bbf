//! HTML generation plugin
//!
//! Emits an HTML page referencing the build's entry scripts and extracted
//! stylesheets, from a template file or a default skeleton.

use std::fs;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Plugin, PluginContext};
use crate::bundler::ChunkKind;
use crate::cli::Mode;
use crate::emit::{Artifact, ArtifactKind};
use crate::error::{BuildError, Result};

static TITLE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<title>[^<]*</title>").unwrap());
static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static INTER_TAG_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").unwrap());

/// Generates an HTML entry page
pub struct HtmlPlugin {
    title: String,
    filename: String,
    template: Option<String>,
    minify: Option<bool>,
}

impl HtmlPlugin {
    pub fn from_options(options: Option<&toml::Table>) -> Result<Self> {
        let get_str = |key: &str| -> Option<String> {
            options
                .and_then(|t| t.get(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Ok(Self {
            title: get_str("title").unwrap_or_else(|| "Tangram App".to_string()),
            filename: get_str("filename").unwrap_or_else(|| "index.html".to_string()),
            template: get_str("template"),
            minify: options
                .and_then(|t| t.get("minify"))
                .and_then(|v| v.as_bool()),
        })
    }

    fn skeleton(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{}</title>
  </head>
  <body>
  </body>
</html>
"#,
            self.title
        )
    }
}

#[async_trait]
impl Plugin for HtmlPlugin {
    fn name(&self) -> &str {
        "html"
    }

    async fn on_emit(&self, ctx: &PluginContext, artifacts: &mut Vec<Artifact>) -> Result<()> {
        let mut page = match &self.template {
            Some(template) => {
                let path = ctx.root.join(template);
                fs::read_to_string(&path).map_err(|source| BuildError::Io { path, source })?
            }
            None => self.skeleton(),
        };

        if TITLE_TAG.is_match(&page) {
            page = TITLE_TAG
                .replace(&page, format!("<title>{}</title>", self.title).as_str())
                .into_owned();
        }

        // Shared chunks register their modules before any entry executes,
        // so their tags come first
        let ordered_kinds = [ChunkKind::Shared, ChunkKind::Entry];

        let mut links = String::new();
        let mut scripts = String::new();
        for kind in ordered_kinds {
            for artifact in artifacts.iter() {
                let Some((_, chunk_kind)) = &artifact.chunk else {
                    continue;
                };
                if *chunk_kind != kind {
                    continue;
                }
                match artifact.kind {
                    ArtifactKind::Stylesheet => {
                        links.push_str(&format!(
                            "    <link rel=\"stylesheet\" href=\"{}{}\">\n",
                            ctx.public_path, artifact.filename
                        ));
                    }
                    ArtifactKind::Script => {
                        scripts.push_str(&format!(
                            "    <script src=\"{}{}\"></script>\n",
                            ctx.public_path, artifact.filename
                        ));
                    }
                    _ => {}
                }
            }
        }

        page = match page.find("</head>") {
            Some(pos) => format!("{}{}{}", &page[..pos], links, &page[pos..]),
            None => format!("{links}{page}"),
        };
        page = match page.rfind("</body>") {
            Some(pos) => format!("{}{}{}", &page[..pos], scripts, &page[pos..]),
            None => format!("{page}{scripts}"),
        };

        let minify = self.minify.unwrap_or(ctx.mode == Mode::Production);
        if minify {
            page = HTML_COMMENT.replace_all(&page, "").into_owned();
            page = INTER_TAG_SPACE.replace_all(&page, "><").into_owned();
            page = page.trim().to_string();
        }

        // Replace a previously generated page with the same name
        artifacts.retain(|a| a.filename != self.filename);
        artifacts.push(Artifact {
            filename: self.filename.clone(),
            contents: page.into_bytes(),
            kind: ArtifactKind::Html,
            chunk: None,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx() -> PluginContext {
        PluginContext {
            root: PathBuf::from("/p"),
            public_path: "./".to_string(),
            mode: Mode::Development,
        }
    }

    fn script(filename: &str, kind: ChunkKind) -> Artifact {
        Artifact {
            filename: filename.to_string(),
            contents: Vec::new(),
            kind: ArtifactKind::Script,
            chunk: Some(("app".to_string(), kind)),
        }
    }

    #[tokio::test]
    async fn test_generates_page_with_tags() {
        let plugin = HtmlPlugin::from_options(None).unwrap();
        let mut artifacts = vec![
            script("app.bundle.js", ChunkKind::Entry),
            script("commons.js", ChunkKind::Shared),
            Artifact {
                filename: "app.css".to_string(),
                contents: Vec::new(),
                kind: ArtifactKind::Stylesheet,
                chunk: Some(("app".to_string(), ChunkKind::Entry)),
            },
        ];

        plugin.on_emit(&ctx(), &mut artifacts).await.unwrap();

        let page = artifacts
            .iter()
            .find(|a| a.kind == ArtifactKind::Html)
            .expect("html artifact");
        let html = String::from_utf8(page.contents.clone()).unwrap();

        assert!(html.contains("<title>Tangram App</title>"));
        assert!(html.contains("<link rel=\"stylesheet\" href=\"./app.css\">"));
        // Shared chunk script precedes the entry script
        let shared = html.find("commons.js").unwrap();
        let entry = html.find("app.bundle.js").unwrap();
        assert!(shared < entry);
    }

    #[tokio::test]
    async fn test_async_chunks_are_not_referenced() {
        let plugin = HtmlPlugin::from_options(None).unwrap();
        let mut artifacts = vec![
            script("app.bundle.js", ChunkKind::Entry),
            script("lazy.js", ChunkKind::Async),
        ];

        plugin.on_emit(&ctx(), &mut artifacts).await.unwrap();

        let page = artifacts
            .iter()
            .find(|a| a.kind == ArtifactKind::Html)
            .expect("html artifact");
        let html = String::from_utf8(page.contents.clone()).unwrap();

        assert!(html.contains("app.bundle.js"));
        assert!(!html.contains("lazy.js"));
    }

    #[tokio::test]
    async fn test_minify_strips_comments_and_whitespace() {
        let mut table = toml::Table::new();
        table.insert("minify".to_string(), toml::Value::Boolean(true));
        table.insert("title".to_string(), toml::Value::String("X".to_string()));
        let plugin = HtmlPlugin::from_options(Some(&table)).unwrap();

        let mut artifacts = Vec::new();
        plugin.on_emit(&ctx(), &mut artifacts).await.unwrap();

        let html = String::from_utf8(artifacts[0].contents.clone()).unwrap();
        assert!(!html.contains("\n  "));
        assert!(html.contains("<title>X</title>"));
    }
}
