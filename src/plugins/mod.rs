//! Plugin system
//!
//! Post-emit hooks over the rendered artifact set. The core depends only
//! on the `Plugin` trait; the built-in plugins are constructed from the
//! configuration's `[[plugin]]` tables.

mod css_minify;
mod html;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::cli::Mode;
use crate::config::Config;
use crate::emit::Artifact;
use crate::error::{BuildError, Result};

pub use css_minify::CssMinifyPlugin;
pub use html::HtmlPlugin;

/// Plugin hook context
pub struct PluginContext {
    /// Project root directory
    pub root: PathBuf,

    /// Public URL prefix for emitted artifacts
    pub public_path: String,

    pub mode: Mode,
}

/// Plugin trait - a post-emit capability over the artifact set.
///
/// Hooks run after all chunks are rendered and before anything is
/// written; a plugin may rewrite artifacts in place or append new ones.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name for logging and error context
    fn name(&self) -> &str;

    async fn on_emit(&self, ctx: &PluginContext, artifacts: &mut Vec<Artifact>) -> Result<()>;
}

/// The configured plugins, run in declaration order
pub struct PluginSet {
    plugins: Vec<Arc<dyn Plugin>>,
    context: PluginContext,
}

impl PluginSet {
    /// Build the plugin set from configuration
    pub fn from_config(config: &Config, mode: Mode) -> Result<Self> {
        let mut plugins: Vec<Arc<dyn Plugin>> = Vec::new();

        for entry in &config.plugins {
            let plugin: Arc<dyn Plugin> = match entry.name.as_str() {
                "html" => Arc::new(HtmlPlugin::from_options(entry.options.as_ref())?),
                "css-minify" => Arc::new(CssMinifyPlugin::from_options(entry.options.as_ref())?),
                other => {
                    return Err(BuildError::Config(format!("unknown plugin '{other}'")));
                }
            };
            plugins.push(plugin);
        }

        Ok(Self {
            plugins,
            context: PluginContext {
                root: config.root.clone(),
                public_path: config.output.public_path.clone(),
                mode,
            },
        })
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run every plugin's on_emit hook, in order
    pub async fn run_on_emit(&self, artifacts: &mut Vec<Artifact>) -> Result<()> {
        for plugin in &self.plugins {
            debug!("running plugin '{}'", plugin.name());
            plugin.on_emit(&self.context, artifacts).await?;
        }
        Ok(())
    }
}
