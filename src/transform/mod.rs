//! Transform pipeline
//!
//! Maps modules to an ordered list of transform steps via pattern-keyed
//! rules. The first rule whose glob matches the module path wins, and its
//! steps run in declaration order, first to last.

mod builtins;

use std::path::Path;
use std::sync::Arc;

use globset::{Glob, GlobMatcher};
use tracing::debug;

use crate::config::Config;
use crate::error::{BuildError, Result};
use crate::graph::ModuleSource;

pub use builtins::builtin_transform;

/// Shared context passed to every transform step
pub struct TransformContext {
    /// Binary modules at or below this size become data-URI modules
    pub inline_limit: usize,
}

/// A single transform step: a pure function over module contents.
///
/// Failures are plain messages; the pipeline attaches the module path and
/// step index.
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        source: ModuleSource,
        path: &Path,
        ctx: &TransformContext,
    ) -> std::result::Result<ModuleSource, String>;
}

struct CompiledRule {
    pattern: String,
    matcher: GlobMatcher,
    steps: Vec<Arc<dyn Transform>>,
}

/// The transform pipeline, compiled from configuration
pub struct TransformPipeline {
    rules: Vec<CompiledRule>,
    ctx: TransformContext,
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl TransformPipeline {
    /// Compile the configured transform rules.
    ///
    /// Unknown transform names and unparsable globs are configuration
    /// errors, caught before any module is read.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.transforms.len());

        for rule in &config.transforms {
            let matcher = Glob::new(&rule.pattern)
                .map_err(|e| {
                    BuildError::Config(format!("invalid transform pattern '{}': {e}", rule.pattern))
                })?
                .compile_matcher();

            let mut steps = Vec::with_capacity(rule.transforms.len());
            for name in &rule.transforms {
                let step = builtin_transform(name).ok_or_else(|| {
                    BuildError::Config(format!("unknown transform '{name}'"))
                })?;
                steps.push(step);
            }

            rules.push(CompiledRule {
                pattern: rule.pattern.clone(),
                matcher,
                steps,
            });
        }

        Ok(Self {
            rules,
            ctx: TransformContext {
                inline_limit: config.output.inline_limit,
            },
        })
    }

    /// Run a module through its matching rule, if any.
    ///
    /// Modules matched by no rule pass through untouched.
    pub fn transform(&self, source: ModuleSource, path: &Path) -> Result<ModuleSource> {
        let Some(rule) = self.rules.iter().find(|r| r.matcher.is_match(path)) else {
            return Ok(source);
        };

        debug!("transforming {} via '{}'", path.display(), rule.pattern);

        let mut current = source;
        for (step, transform) in rule.steps.iter().enumerate() {
            current = transform
                .apply(current, path, &self.ctx)
                .map_err(|message| BuildError::Transform {
                    path: path.to_path_buf(),
                    step,
                    transform: transform.name().to_string(),
                    message,
                })?;
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    fn pipeline() -> TransformPipeline {
        TransformPipeline::from_config(&Config::default_config()).unwrap()
    }

    #[test]
    fn test_unknown_transform_is_config_error() {
        let mut config = Config::default_config();
        config.transforms[0].transforms = vec!["does-not-exist".to_string()];

        let err = TransformPipeline::from_config(&config).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn test_unmatched_module_passes_through() {
        let source = ModuleSource::Text("let x = 1;".to_string());
        let out = pipeline()
            .transform(source, &PathBuf::from("/p/src/main.js"))
            .unwrap();
        assert_eq!(out.as_text(), Some("let x = 1;"));
    }

    #[test]
    fn test_transform_error_carries_step_and_path() {
        let source = ModuleSource::Text("not json".to_string());
        let err = pipeline()
            .transform(source, &PathBuf::from("/p/src/data.json"))
            .unwrap_err();

        match err {
            BuildError::Transform { path, step, transform, .. } => {
                assert_eq!(path, PathBuf::from("/p/src/data.json"));
                assert_eq!(step, 0);
                assert_eq!(transform, "json");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let mut config = Config::default_config();
        config.transforms = vec![
            crate::config::TransformRule {
                pattern: "**/*.json".to_string(),
                transforms: vec!["json".to_string()],
            },
            crate::config::TransformRule {
                pattern: "**/*".to_string(),
                transforms: vec!["typescript".to_string()],
            },
        ];

        let pipeline = TransformPipeline::from_config(&config).unwrap();
        let out = pipeline
            .transform(
                ModuleSource::Text("{\"a\": 1}".to_string()),
                &PathBuf::from("/p/src/data.json"),
            )
            .unwrap();

        assert!(out.as_text().unwrap().starts_with("module.exports ="));
    }
}
