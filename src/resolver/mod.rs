//! Module resolution
//!
//! Extracts import specifiers from source code and maps them to files on
//! disk. Resolution failures are fatal: a broken module graph makes the
//! rest of the build meaningless.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::error::{BuildError, Result};
use crate::graph::{ImportKind, ModuleType};

/// Regex patterns for extracting imports
static IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:import|export)\s+(?:(?:\{[^}]*\}|\*\s+as\s+\w+|\w+(?:\s*,\s*\{[^}]*\})?)\s+from\s+)?["']([^"']+)["']|require\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

static DYNAMIC_IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

/// Module resolver
pub struct Resolver {
    config: Arc<Config>,
}

impl Resolver {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Extract import specifiers from source code, in source order.
    ///
    /// A specifier imported both statically and dynamically is reported
    /// once, as static: it will load with its importer anyway.
    pub fn extract_imports(
        &self,
        source: &str,
        module_type: &ModuleType,
    ) -> Vec<(String, ImportKind)> {
        if !module_type.is_script() {
            return Vec::new();
        }

        let mut imports: Vec<(String, ImportKind)> = Vec::new();

        for cap in IMPORT_REGEX.captures_iter(source) {
            if let Some(specifier) = cap.get(1).or_else(|| cap.get(2)) {
                let spec = specifier.as_str();
                if !imports.iter().any(|(s, _)| s == spec) {
                    imports.push((spec.to_string(), ImportKind::Static));
                }
            }
        }

        for cap in DYNAMIC_IMPORT_REGEX.captures_iter(source) {
            if let Some(specifier) = cap.get(1) {
                let spec = specifier.as_str();
                if !imports.iter().any(|(s, _)| s == spec) {
                    imports.push((spec.to_string(), ImportKind::Dynamic));
                }
            }
        }

        debug!("found {} imports", imports.len());

        imports
    }

    /// Resolve an import specifier to an absolute file path
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Result<PathBuf> {
        debug!("resolving '{}' from '{}'", specifier, importer.display());

        let resolved = if specifier.starts_with('.') || specifier.starts_with('/') {
            let base_dir = importer.parent().unwrap_or(Path::new("."));
            self.resolve_relative(specifier, base_dir)
        } else {
            self.resolve_bare(specifier, importer)
        };

        resolved.ok_or_else(|| BuildError::UnresolvedImport {
            specifier: specifier.to_string(),
            importer: importer.to_path_buf(),
        })
    }

    /// Resolve a relative or root-absolute import by probing the filesystem
    fn resolve_relative(&self, specifier: &str, base_dir: &Path) -> Option<PathBuf> {
        let target = if specifier.starts_with('/') {
            self.config.root.join(specifier.trim_start_matches('/'))
        } else {
            base_dir.join(specifier)
        };

        // Exact path first
        if target.is_file() {
            return Some(target);
        }

        // Then with extensions appended
        let extensions = ["js", "ts", "mjs", "cjs", "json", "css"];
        for ext in &extensions {
            let with_ext = target.with_extension(ext);
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        // Then as a directory with an index file
        if target.is_dir() {
            for ext in &extensions {
                let index = target.join(format!("index.{}", ext));
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }

    /// Resolve a bare import by walking up to the nearest node_modules
    fn resolve_bare(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        let mut current = importer.to_path_buf();

        loop {
            let node_modules = current.join("node_modules");

            if node_modules.is_dir() {
                if let Some(resolved) = self.resolve_in_node_modules(&node_modules, specifier) {
                    return Some(resolved);
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Resolve a package specifier within a node_modules directory
    fn resolve_in_node_modules(&self, node_modules: &Path, specifier: &str) -> Option<PathBuf> {
        let (package_name, subpath) = if specifier.starts_with('@') {
            // Scoped package: @scope/name or @scope/name/subpath
            let parts: Vec<&str> = specifier.splitn(3, '/').collect();
            if parts.len() < 2 {
                return None;
            }
            (format!("{}/{}", parts[0], parts[1]), parts.get(2).map(|s| s.to_string()))
        } else {
            let parts: Vec<&str> = specifier.splitn(2, '/').collect();
            (parts[0].to_string(), parts.get(1).map(|s| s.to_string()))
        };

        let package_dir = node_modules.join(&package_name);
        if !package_dir.is_dir() {
            return None;
        }

        if let Some(sub) = subpath {
            return self.resolve_relative(&sub, &package_dir);
        }

        // Consult package.json for module/main entry fields
        let package_json = package_dir.join("package.json");
        if package_json.is_file() {
            if let Ok(content) = fs::read_to_string(&package_json) {
                if let Ok(pkg) = serde_json::from_str::<serde_json::Value>(&content) {
                    // ESM entry first
                    if let Some(module) = pkg.get("module").and_then(|v| v.as_str()) {
                        let module_path = package_dir.join(module);
                        if module_path.is_file() {
                            return Some(module_path);
                        }
                    }

                    if let Some(main) = pkg.get("main").and_then(|v| v.as_str()) {
                        if let Some(resolved) = self.resolve_relative(main, &package_dir) {
                            return Some(resolved);
                        }
                    }
                }
            }
        }

        self.resolve_relative("index.js", &package_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(Config::default_config()))
    }

    #[test]
    fn test_extract_static_imports() {
        let source = r#"
            import foo from './foo';
            import { bar } from './bar.js';
            import * as baz from '../baz';
            import qux, { quux } from './qux';
            export { corge } from './corge';
            const x = require('./x');
        "#;

        let imports = resolver().extract_imports(source, &ModuleType::JavaScript);
        let specs: Vec<&str> = imports.iter().map(|(s, _)| s.as_str()).collect();

        assert_eq!(specs, vec!["./foo", "./bar.js", "../baz", "./qux", "./corge", "./x"]);
        assert!(imports.iter().all(|(_, k)| *k == ImportKind::Static));
    }

    #[test]
    fn test_extract_dynamic_imports() {
        let source = r#"
            import base from './base';
            const lazy = import('./lazy');
        "#;

        let imports = resolver().extract_imports(source, &ModuleType::JavaScript);

        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0], ("./base".to_string(), ImportKind::Static));
        assert_eq!(imports[1], ("./lazy".to_string(), ImportKind::Dynamic));
    }

    #[test]
    fn test_static_wins_over_dynamic() {
        let source = r#"
            import eager from './both';
            const later = import('./both');
        "#;

        let imports = resolver().extract_imports(source, &ModuleType::JavaScript);
        assert_eq!(imports, vec![("./both".to_string(), ImportKind::Static)]);
    }

    #[test]
    fn test_non_script_modules_have_no_imports() {
        let imports = resolver().extract_imports("@import './other.css';", &ModuleType::Css);
        assert!(imports.is_empty());
    }

    #[test]
    fn test_unresolvable_import_is_an_error() {
        let err = resolver()
            .resolve("./does-not-exist", Path::new("/nowhere/mod.js"))
            .unwrap_err();

        match err {
            BuildError::UnresolvedImport { specifier, importer } => {
                assert_eq!(specifier, "./does-not-exist");
                assert_eq!(importer, PathBuf::from("/nowhere/mod.js"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
