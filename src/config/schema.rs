//! Configuration schema definitions

use serde::{Deserialize, Serialize};

/// Output configuration
///
/// Filename templates support `[name]`, `[hash]` and `[id]` substitution
/// tokens; asset templates additionally support `[ext]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory, relative to the project root
    #[serde(default = "default_output_dir")]
    pub path: String,

    /// Public URL prefix for emitted assets
    #[serde(default = "default_public_path")]
    pub public_path: String,

    /// Filename template for entry chunks
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Filename template for non-entry chunks
    #[serde(default = "default_chunk_filename")]
    pub chunk_filename: String,

    /// Filename template for stylesheets extracted from entry chunks
    #[serde(default = "default_css_filename")]
    pub css_filename: String,

    /// Filename template for stylesheets extracted from non-entry chunks
    #[serde(default = "default_css_chunk_filename")]
    pub css_chunk_filename: String,

    /// Filename template for standalone asset files
    #[serde(default = "default_asset_filename")]
    pub asset_filename: String,

    /// Subdirectory for standalone asset files
    #[serde(default = "default_asset_dir")]
    pub asset_dir: String,

    /// Binary modules at or below this size (bytes) are inlined as data URIs
    #[serde(default = "default_inline_limit")]
    pub inline_limit: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_dir(),
            public_path: default_public_path(),
            filename: default_filename(),
            chunk_filename: default_chunk_filename(),
            css_filename: default_css_filename(),
            css_chunk_filename: default_css_chunk_filename(),
            asset_filename: default_asset_filename(),
            asset_dir: default_asset_dir(),
            inline_limit: default_inline_limit(),
        }
    }
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_public_path() -> String {
    "./".to_string()
}

fn default_filename() -> String {
    "[name].bundle.js".to_string()
}

fn default_chunk_filename() -> String {
    "[name].js".to_string()
}

fn default_css_filename() -> String {
    "[name].css".to_string()
}

fn default_css_chunk_filename() -> String {
    "[id].css".to_string()
}

fn default_asset_filename() -> String {
    "[name]-[hash].[ext]".to_string()
}

fn default_asset_dir() -> String {
    "images".to_string()
}

fn default_inline_limit() -> usize {
    20_000
}

/// Split policy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Cache groups, applied in priority order (ties break by declaration order)
    #[serde(default)]
    pub groups: Vec<SplitGroup>,
}

/// A single grouping rule for shared-chunk extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitGroup {
    /// Chunk name for modules extracted by this group
    pub name: String,

    /// Optional glob matched against the module path (e.g. "**/node_modules/**")
    #[serde(default)]
    pub test: Option<String>,

    /// Minimum number of chunks referencing a module before it is extracted
    #[serde(default = "default_min_shared")]
    pub min_shared_references: usize,

    /// Skip extraction when the collected group is smaller than this (bytes)
    #[serde(default)]
    pub min_size: usize,

    /// Higher priority groups claim modules first
    #[serde(default)]
    pub priority: i32,

    /// Keep modules already extracted into a matching chunk instead of
    /// creating a new one
    #[serde(default)]
    pub reuse_existing_chunk: bool,
}

fn default_min_shared() -> usize {
    2
}

/// A transform rule: modules whose path matches `pattern` run through the
/// named transforms. The first matching rule wins; its steps execute in
/// declaration order, first to last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformRule {
    /// Glob matched against the module path
    pub pattern: String,

    /// Built-in transform names, executed in order
    #[serde(rename = "use")]
    pub transforms: Vec<String>,
}

/// Default rules mirroring the built-in loader set
pub fn default_transform_rules() -> Vec<TransformRule> {
    vec![
        TransformRule {
            pattern: "**/*.ts".to_string(),
            transforms: vec!["typescript".to_string()],
        },
        TransformRule {
            pattern: "**/*.css".to_string(),
            transforms: vec!["css".to_string()],
        },
        TransformRule {
            pattern: "**/*.json".to_string(),
            transforms: vec!["json".to_string()],
        },
        TransformRule {
            pattern: "**/*.{png,jpg,jpeg,gif}".to_string(),
            transforms: vec!["inline-assets".to_string()],
        },
    ]
}

/// Plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin name/identifier
    pub name: String,

    /// Plugin-specific options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<toml::Table>,
}
