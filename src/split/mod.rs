//! Chunk splitting
//!
//! Partitions the closed module graph into chunks. Seed chunks come from
//! configured entries and from dynamic-import split points; cache groups
//! then extract shared modules into their own chunks. The partition is a
//! pure function of graph + policy, so identical inputs always produce an
//! identical partition.

use std::collections::HashMap;

use globset::{Glob, GlobMatcher};
use tracing::debug;

use crate::bundler::{Chunk, ChunkKind};
use crate::config::SplitConfig;
use crate::error::{BuildError, Result};
use crate::graph::{ModuleGraph, ModuleId};

struct CompiledGroup {
    name: String,
    matcher: Option<GlobMatcher>,
    min_shared_references: usize,
    min_size: usize,
    priority: i32,
    reuse_existing_chunk: bool,
}

/// Validate and compile the split policy.
///
/// Rejected combinations: empty or duplicate group names, a group named
/// like an entry, `min_shared_references` of zero, unparsable `test` glob.
fn compile_policy(policy: &SplitConfig, entry_names: &[&str]) -> Result<Vec<CompiledGroup>> {
    let mut groups = Vec::with_capacity(policy.groups.len());

    for group in &policy.groups {
        if group.name.is_empty() {
            return Err(BuildError::SplitPolicy("group with empty name".to_string()));
        }
        if groups.iter().any(|g: &CompiledGroup| g.name == group.name) {
            return Err(BuildError::SplitPolicy(format!(
                "duplicate group name '{}'",
                group.name
            )));
        }
        if entry_names.contains(&group.name.as_str()) {
            return Err(BuildError::SplitPolicy(format!(
                "group '{}' conflicts with an entry of the same name",
                group.name
            )));
        }
        if group.min_shared_references == 0 {
            return Err(BuildError::SplitPolicy(format!(
                "group '{}': min_shared_references must be at least 1",
                group.name
            )));
        }

        let matcher = match &group.test {
            Some(pattern) => Some(
                Glob::new(pattern)
                    .map_err(|e| {
                        BuildError::SplitPolicy(format!(
                            "group '{}': invalid test pattern '{pattern}': {e}",
                            group.name
                        ))
                    })?
                    .compile_matcher(),
            ),
            None => None,
        };

        groups.push(CompiledGroup {
            name: group.name.clone(),
            matcher,
            min_shared_references: group.min_shared_references,
            min_size: group.min_size,
            priority: group.priority,
            reuse_existing_chunk: group.reuse_existing_chunk,
        });
    }

    // Higher priority first; the stable sort keeps declaration order for ties
    groups.sort_by(|a, b| b.priority.cmp(&a.priority));
    Ok(groups)
}

/// Partition the graph into chunks.
///
/// `entries` are (name, root) pairs in sorted-name order; the caller
/// guarantees every root is in the graph.
pub fn split(
    graph: &ModuleGraph,
    entries: &[(String, ModuleId)],
    policy: &SplitConfig,
) -> Result<Vec<Chunk>> {
    let entry_names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    let groups = compile_policy(policy, &entry_names)?;

    // Seed chunks: entries first, then async roots in sorted path order
    let mut seeds: Vec<(String, ChunkKind, ModuleId)> = entries
        .iter()
        .map(|(name, root)| (name.clone(), ChunkKind::Entry, *root))
        .collect();

    let entry_roots: Vec<ModuleId> = entries.iter().map(|(_, r)| *r).collect();
    let mut taken_names: Vec<String> = entries.iter().map(|(n, _)| n.clone()).collect();

    for root in graph.dynamic_split_points() {
        if entry_roots.contains(&root) {
            continue;
        }
        let stem = graph
            .get_module(root)
            .and_then(|m| m.path.file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("chunk")
            .to_string();
        let name = unique_name(stem, &taken_names);
        taken_names.push(name.clone());
        seeds.push((name, ChunkKind::Async, root));
    }

    // Which seed chunks reach each module over static edges, in seed order
    let mut reached_by: HashMap<ModuleId, Vec<usize>> = HashMap::new();
    let mut owner: HashMap<ModuleId, usize> = HashMap::new();

    for (seed_idx, (_, _, root)) in seeds.iter().enumerate() {
        for module in graph.static_reachable(*root) {
            reached_by.entry(module).or_default().push(seed_idx);
            // A module with no matching group falls into the first
            // chunk that reached it
            owner.entry(module).or_insert(seed_idx);
        }
    }

    // Cache groups extract modules out of their owning seed chunks.
    // Extraction is exclusive: priority order decides which group claims
    // a module, so no module is ever duplicated.
    let mut extracted: HashMap<ModuleId, usize> = HashMap::new(); // module -> shared chunk idx
    let mut shared: Vec<(String, Vec<ModuleId>)> = Vec::new();

    for group in &groups {
        let mut candidates: Vec<ModuleId> = graph
            .all_module_ids()
            .into_iter()
            .filter(|id| !extracted.contains_key(id))
            .filter(|id| reached_by.get(id).map_or(0, Vec::len) >= group.min_shared_references)
            .filter(|id| match (&group.matcher, graph.get_module(*id)) {
                (Some(matcher), Some(module)) => matcher.is_match(&module.path),
                (None, Some(_)) => true,
                (_, None) => false,
            })
            .collect();
        candidates.sort_unstable();

        if candidates.is_empty() {
            continue;
        }

        let total_size: usize = candidates
            .iter()
            .filter_map(|id| graph.get_module(*id))
            .map(|m| m.output().len())
            .sum();
        if total_size < group.min_size {
            debug!(
                "group '{}' skipped: {total_size} bytes below min_size {}",
                group.name, group.min_size
            );
            continue;
        }

        // Reuse: when the candidates are exactly an existing non-entry seed
        // chunk, leave them there instead of cutting a new chunk
        if group.reuse_existing_chunk {
            let owners: Vec<usize> = candidates.iter().map(|id| owner[id]).collect();
            if let Some(&first_owner) = owners.first() {
                let same_owner = owners.iter().all(|&o| o == first_owner);
                if same_owner && seeds[first_owner].1 != ChunkKind::Entry {
                    let owned: Vec<ModuleId> = owner
                        .iter()
                        .filter(|&(m, &o)| o == first_owner && !extracted.contains_key(m))
                        .map(|(&m, _)| m)
                        .collect();
                    if owned.len() == candidates.len() {
                        debug!("group '{}' reuses chunk '{}'", group.name, seeds[first_owner].0);
                        continue;
                    }
                }
            }
        }

        let chunk_idx = shared.len();
        for &id in &candidates {
            extracted.insert(id, chunk_idx);
        }
        shared.push((group.name.clone(), candidates));
    }

    // Materialize: seed chunks keep their unextracted modules, shared
    // chunks follow in creation order
    let mut chunks = Vec::new();

    for (seed_idx, (name, kind, root)) in seeds.iter().enumerate() {
        let mut modules: Vec<ModuleId> = owner
            .iter()
            .filter(|&(m, &o)| o == seed_idx && !extracted.contains_key(m))
            .map(|(&m, _)| m)
            .collect();
        modules.sort_unstable();

        if modules.is_empty() && *kind != ChunkKind::Entry {
            continue;
        }

        chunks.push(Chunk {
            name: name.clone(),
            kind: *kind,
            modules,
            root: Some(*root),
        });
    }

    for (name, mut modules) in shared {
        modules.sort_unstable();
        chunks.push(Chunk {
            name,
            kind: ChunkKind::Shared,
            modules,
            root: None,
        });
    }

    Ok(chunks)
}

fn unique_name(stem: String, taken: &[String]) -> String {
    if !taken.contains(&stem) {
        return stem;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
