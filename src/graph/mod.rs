//! Module graph data structures
//!
//! The graph is append-only: modules are inserted once, keyed by their
//! resolved path, and edges record which module imported which. The
//! path-keyed table doubles as the visited set during traversal, so
//! cyclic imports terminate naturally.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Unique identifier for a module, assigned in traversal order
pub type ModuleId = usize;

/// How a dependency was imported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// Top-level `import`/`require` - the dependency loads with its importer
    Static,
    /// `import()` expression - an eligible split point
    Dynamic,
}

/// Types of modules the bundler can handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleType {
    JavaScript,
    TypeScript,
    Css,
    Json,
    Image,
    Unknown,
}

impl ModuleType {
    /// Determine module type from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" => ModuleType::JavaScript,
            "ts" | "mts" | "cts" => ModuleType::TypeScript,
            "css" | "scss" | "sass" | "less" => ModuleType::Css,
            "json" => ModuleType::Json,
            "png" | "jpg" | "jpeg" | "gif" => ModuleType::Image,
            _ => ModuleType::Unknown,
        }
    }

    /// Check if this is a script-like module (participates in import extraction)
    pub fn is_script(&self) -> bool {
        matches!(self, ModuleType::JavaScript | ModuleType::TypeScript)
    }
}

/// Raw or transformed module contents
#[derive(Debug, Clone)]
pub enum ModuleSource {
    Text(String),
    Binary(Vec<u8>),
}

impl ModuleSource {
    /// Size estimate in bytes, used by the split policy
    pub fn len(&self) -> usize {
        match self {
            ModuleSource::Text(s) => s.len(),
            ModuleSource::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text contents, if this is a text module
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ModuleSource::Text(s) => Some(s),
            ModuleSource::Binary(_) => None,
        }
    }
}

/// An import that has been resolved to another module in the graph
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    /// The specifier as written in the source
    pub specifier: String,
    /// The module the specifier resolved to
    pub target: ModuleId,
    pub kind: ImportKind,
}

/// A module in the dependency graph
#[derive(Debug, Clone)]
pub struct Module {
    /// Absolute path to the module
    pub path: PathBuf,

    /// Raw contents as read from disk
    pub source: ModuleSource,

    pub module_type: ModuleType,

    /// Whether this is an entry point
    pub is_entry: bool,

    /// Resolved imports in source order
    pub imports: Vec<ResolvedImport>,

    /// Output of the transform pipeline, once it has run
    pub transformed: Option<ModuleSource>,
}

impl Module {
    /// Detect module type from path
    pub fn detect_type(path: &Path) -> ModuleType {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(ModuleType::from_extension)
            .unwrap_or(ModuleType::Unknown)
    }

    /// Contents to emit: transformed output when present, raw source otherwise
    pub fn output(&self) -> &ModuleSource {
        self.transformed.as_ref().unwrap_or(&self.source)
    }
}

/// The module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All modules, indexed by ModuleId
    modules: Vec<Module>,

    /// Map from resolved path to module ID
    path_to_id: HashMap<PathBuf, ModuleId>,

    /// Dependency edges: importer -> (imported, kind), deduplicated
    edges: Vec<Vec<(ModuleId, ImportKind)>>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph, returning its ID.
    ///
    /// Adding a path that is already present returns the existing ID;
    /// this is what terminates traversal of cyclic imports.
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        if let Some(&id) = self.path_to_id.get(&module.path) {
            return id;
        }

        let id = self.modules.len();
        self.path_to_id.insert(module.path.clone(), id);
        self.modules.push(module);
        self.edges.push(Vec::new());
        id
    }

    /// Add a dependency edge between modules
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId, kind: ImportKind) {
        let deps = &mut self.edges[from];
        if !deps.iter().any(|&(t, k)| t == to && k == kind) {
            deps.push((to, kind));
        }
    }

    pub fn get_module_id(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn get_module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(id)
    }

    /// All module IDs in insertion (traversal) order
    pub fn all_module_ids(&self) -> Vec<ModuleId> {
        (0..self.modules.len()).collect()
    }

    /// Direct dependencies of a module, in import order
    pub fn dependencies(&self, id: ModuleId) -> &[(ModuleId, ImportKind)] {
        &self.edges[id]
    }

    /// All modules reachable from `start` over static edges (BFS).
    ///
    /// Dynamic edges are not followed: the target of a dynamic import
    /// belongs to its own chunk.
    pub fn static_reachable(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        visited.insert(start);

        while let Some(id) = queue.pop_front() {
            result.push(id);

            for &(dep, kind) in &self.edges[id] {
                if kind == ImportKind::Static && visited.insert(dep) {
                    queue.push_back(dep);
                }
            }
        }

        result
    }

    /// Targets of dynamic imports anywhere in the graph, sorted by path
    pub fn dynamic_split_points(&self) -> Vec<ModuleId> {
        let mut targets: Vec<ModuleId> = self
            .edges
            .iter()
            .flatten()
            .filter(|&&(_, kind)| kind == ImportKind::Dynamic)
            .map(|&(target, _)| target)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        targets.sort_by(|&a, &b| self.modules[a].path.cmp(&self.modules[b].path));
        targets
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(path: &str) -> Module {
        Module {
            path: PathBuf::from(path),
            source: ModuleSource::Text(String::new()),
            module_type: ModuleType::JavaScript,
            is_entry: false,
            imports: Vec::new(),
            transformed: None,
        }
    }

    #[test]
    fn test_module_type_detection() {
        assert_eq!(ModuleType::from_extension("js"), ModuleType::JavaScript);
        assert_eq!(ModuleType::from_extension("ts"), ModuleType::TypeScript);
        assert_eq!(ModuleType::from_extension("css"), ModuleType::Css);
        assert_eq!(ModuleType::from_extension("json"), ModuleType::Json);
        assert_eq!(ModuleType::from_extension("png"), ModuleType::Image);
        assert_eq!(ModuleType::from_extension("xyz"), ModuleType::Unknown);
    }

    #[test]
    fn test_add_module_dedupes_by_path() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(module("/p/a.js"));
        let b = graph.add_module(module("/p/a.js"));
        assert_eq!(a, b);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_static_reachable_skips_dynamic_edges() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(module("/p/a.js"));
        let b = graph.add_module(module("/p/b.js"));
        let c = graph.add_module(module("/p/c.js"));
        graph.add_dependency(a, b, ImportKind::Static);
        graph.add_dependency(a, c, ImportKind::Dynamic);

        let reached = graph.static_reachable(a);
        assert_eq!(reached, vec![a, b]);
        assert_eq!(graph.dynamic_split_points(), vec![c]);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(module("/p/a.js"));
        let b = graph.add_module(module("/p/b.js"));
        graph.add_dependency(a, b, ImportKind::Static);
        graph.add_dependency(b, a, ImportKind::Static);

        let reached = graph.static_reachable(a);
        assert_eq!(reached.len(), 2);
    }
}
