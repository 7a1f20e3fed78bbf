//! Configuration handling for Tangram
//!
//! Parses and manages tangram.toml configuration files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

mod schema;

pub use schema::*;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Entry points: chunk name -> source path
    pub entry: HashMap<String, String>,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Split policy
    #[serde(default)]
    pub split: SplitConfig,

    /// Ordered transform rules
    #[serde(default = "default_transform_rules", rename = "transform")]
    pub transforms: Vec<TransformRule>,

    /// Post-emit plugins
    #[serde(default, rename = "plugin")]
    pub plugins: Vec<PluginConfig>,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse tangram.toml")?;

        // Root is the directory containing the config file, canonicalized
        // so that module paths resolved through symlinks still fall under it
        let root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        config.root = fs::canonicalize(&root).unwrap_or(root);

        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            entry: {
                let mut map = HashMap::new();
                map.insert("app".to_string(), "src/index.js".to_string());
                map
            },
            output: OutputConfig::default(),
            split: SplitConfig::default(),
            transforms: default_transform_rules(),
            plugins: Vec::new(),
            root: PathBuf::from("."),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.entry.is_empty() {
            anyhow::bail!("At least one entry must be specified in tangram.toml");
        }

        for (name, path) in &self.entry {
            let full_path = self.root.join(path);
            if !full_path.exists() {
                anyhow::bail!(
                    "Entry '{}' points to non-existent file: {}",
                    name,
                    full_path.display()
                );
            }
        }

        for rule in &self.transforms {
            if rule.transforms.is_empty() {
                anyhow::bail!("Transform rule '{}' names no transforms", rule.pattern);
            }
        }

        Ok(())
    }

    /// Get the absolute output directory path
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output.path)
    }

    /// All entries as (name, absolute path), sorted by name.
    ///
    /// Sorting makes traversal order, and with it module IDs and chunk
    /// ordering, reproducible across runs.
    pub fn all_entries(&self) -> Vec<(String, PathBuf)> {
        let mut entries: Vec<(String, PathBuf)> = self
            .entry
            .iter()
            .map(|(name, path)| (name.clone(), self.root.join(path)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
