//! Chunk types for code splitting

use crate::graph::ModuleId;

/// How a chunk came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Rooted at a configured entry point - loaded immediately
    Entry,
    /// Rooted at a dynamic-import split point - loaded on demand
    Async,
    /// Extracted by a split-policy group - shared between other chunks
    Shared,
}

/// A chunk is a group of modules emitted together as one logical unit
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk name, used for output filename substitution
    pub name: String,

    pub kind: ChunkKind,

    /// Modules in this chunk, in ascending module-ID order
    pub modules: Vec<ModuleId>,

    /// The module execution starts from, for entry chunks
    pub root: Option<ModuleId>,
}

impl Chunk {
    pub fn is_entry(&self) -> bool {
        self.kind == ChunkKind::Entry
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }
}
