//! Core bundler implementation
//!
//! Sequences the build phases: module graph construction, parallel
//! transformation, chunk splitting, and artifact emission. The splitter
//! only runs once the graph is closed, and emission only once the
//! partition is final.

mod chunk;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::cli::BuildOptions;
use crate::config::Config;
use crate::emit::{self, ArtifactInfo};
use crate::error::{BuildError, Result};
use crate::graph::{Module, ModuleGraph, ModuleId, ModuleSource, ModuleType, ResolvedImport};
use crate::plugins::PluginSet;
use crate::resolver::Resolver;
use crate::split;
use crate::transform::TransformPipeline;

pub use chunk::{Chunk, ChunkKind};

/// Result of a build operation
#[derive(Debug)]
pub struct BuildResult {
    /// Written artifacts
    pub artifacts: Vec<ArtifactInfo>,

    /// Number of modules in the graph
    pub module_count: usize,

    /// Number of chunks in the partition
    pub chunk_count: usize,
}

/// The main bundler
pub struct Bundler {
    /// Project configuration
    config: Arc<Config>,

    /// Build options
    options: BuildOptions,

    /// Module resolver
    resolver: Resolver,

    /// Transform pipeline
    pipeline: Arc<TransformPipeline>,

    /// Post-emit plugins
    plugins: PluginSet,

    /// Module graph
    graph: Arc<RwLock<ModuleGraph>>,
}

impl Bundler {
    /// Create a new bundler instance
    pub fn new(config: Config, options: BuildOptions) -> Result<Self> {
        let config = Arc::new(config);
        let resolver = Resolver::new(config.clone());
        let pipeline = Arc::new(TransformPipeline::from_config(&config)?);
        let plugins = PluginSet::from_config(&config, options.mode)?;

        Ok(Self {
            config,
            options,
            resolver,
            pipeline,
            plugins,
            graph: Arc::new(RwLock::new(ModuleGraph::new())),
        })
    }

    /// Build the project
    pub async fn build(&self) -> Result<BuildResult> {
        let start = Instant::now();

        // 1. Build the module graph from the entries
        info!("Building module graph...");
        let entries = self.build_module_graph().await?;

        // 2. Transform all modules (independent per module)
        info!("Transforming modules...");
        self.transform_modules().await?;

        // 3. Partition into chunks, then render while the graph is held;
        // the lock is released before the async plugin hooks run
        info!("Splitting chunks...");
        let (mut artifacts, module_count, chunk_count) = {
            let graph = self.graph.read();
            let chunks = split::split(&graph, &entries, &self.config.split)?;

            info!("Emitting artifacts...");
            let artifacts =
                emit::render_artifacts(&graph, &chunks, &self.config, self.options.mode)?;
            (artifacts, graph.len(), chunks.len())
        };

        // 4. Post-emit plugins, then swap the staged output into place
        self.plugins.run_on_emit(&mut artifacts).await?;
        let written = emit::write_artifacts(&artifacts, &self.config)?;

        debug!("build completed in {:?}", start.elapsed());

        Ok(BuildResult {
            artifacts: written,
            module_count,
            chunk_count,
        })
    }

    /// Build the module graph by traversing from the entries.
    ///
    /// Returns (entry name, root module) pairs in sorted-name order, the
    /// seed order the splitter relies on.
    async fn build_module_graph(&self) -> Result<Vec<(String, ModuleId)>> {
        let mut entries = Vec::new();

        for (name, path) in self.config.all_entries() {
            debug!("processing entry: {} -> {}", name, path.display());
            let root = self.process_module(&path, true).await?;
            entries.push((name, root));
        }

        Ok(entries)
    }

    /// Process a single module and its dependencies
    ///
    /// Uses Box::pin for async recursion to avoid infinite type size issues
    async fn process_module(&self, path: &Path, is_entry: bool) -> Result<ModuleId> {
        let canonical_path = fs::canonicalize(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // Already visited: this check is what terminates cyclic imports
        {
            let graph = self.graph.read();
            if let Some(id) = graph.get_module_id(&canonical_path) {
                return Ok(id);
            }
        }

        let module_type = Module::detect_type(&canonical_path);

        let source = if module_type == ModuleType::Image {
            ModuleSource::Binary(fs::read(&canonical_path).map_err(|source| BuildError::Io {
                path: canonical_path.clone(),
                source,
            })?)
        } else {
            ModuleSource::Text(fs::read_to_string(&canonical_path).map_err(|source| {
                BuildError::Io {
                    path: canonical_path.clone(),
                    source,
                }
            })?)
        };

        let specifiers = match source.as_text() {
            Some(text) => self.resolver.extract_imports(text, &module_type),
            None => Vec::new(),
        };

        let module = Module {
            path: canonical_path.clone(),
            source,
            module_type,
            is_entry,
            imports: Vec::new(),
            transformed: None,
        };

        // Insert before recursing, so cycles find the module in the graph
        let module_id = {
            let mut graph = self.graph.write();
            graph.add_module(module)
        };

        let mut imports = Vec::with_capacity(specifiers.len());
        for (specifier, kind) in specifiers {
            let resolved = self.resolver.resolve(&specifier, &canonical_path)?;
            let dep_id = Box::pin(self.process_module(&resolved, false)).await?;

            imports.push(ResolvedImport {
                specifier,
                target: dep_id,
                kind,
            });

            let mut graph = self.graph.write();
            graph.add_dependency(module_id, dep_id, kind);
        }

        {
            let mut graph = self.graph.write();
            if let Some(module) = graph.get_module_mut(module_id) {
                module.imports = imports;
            }
        }

        Ok(module_id)
    }

    /// Transform all modules in the graph, one task per module
    async fn transform_modules(&self) -> Result<()> {
        let jobs: Vec<(ModuleId, ModuleSource, std::path::PathBuf)> = {
            let graph = self.graph.read();
            graph
                .all_module_ids()
                .into_iter()
                .map(|id| {
                    let module = graph.get_module(id).expect("id from graph");
                    (id, module.source.clone(), module.path.clone())
                })
                .collect()
        };

        let mut tasks = JoinSet::new();
        for (id, source, path) in jobs {
            let pipeline = Arc::clone(&self.pipeline);
            tasks.spawn(async move { pipeline.transform(source, &path).map(|out| (id, out)) });
        }

        while let Some(joined) = tasks.join_next().await {
            let (id, transformed) = joined.expect("transform task panicked")?;
            let mut graph = self.graph.write();
            if let Some(module) = graph.get_module_mut(id) {
                module.transformed = Some(transformed);
            }
        }

        Ok(())
    }
}
