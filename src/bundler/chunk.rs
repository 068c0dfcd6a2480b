//! Chunk types for code splitting

use super::ModuleId;

/// Type of chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// Entry point chunk - loaded immediately
    Entry,
    /// Modules from external dependency roots
    Vendor,
    /// A named library carved out of the vendor chunk
    Library,
    /// Modules reached by several entries - loaded on demand
    Shared,
}

impl ChunkKind {
    /// Initial chunks are referenced directly by the entry document
    pub fn is_initial(&self) -> bool {
        !matches!(self, ChunkKind::Shared)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Entry => "entry",
            ChunkKind::Vendor => "vendor",
            ChunkKind::Library => "library",
            ChunkKind::Shared => "shared",
        }
    }
}

/// A chunk is a group of modules that will be bundled together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk name (used for output filename)
    pub name: String,

    /// Type of chunk
    pub kind: ChunkKind,

    /// Module IDs included in this chunk, ordered by module key
    pub module_ids: Vec<ModuleId>,

    /// Entry module executed when the chunk loads
    pub entry: Option<ModuleId>,

    /// Other chunks this chunk's modules need, transitively, in chunk order
    pub requires: Vec<String>,
}

impl Chunk {
    fn new(name: String, kind: ChunkKind, entry: Option<ModuleId>) -> Self {
        Self {
            name,
            kind,
            module_ids: Vec::new(),
            entry,
            requires: Vec::new(),
        }
    }

    /// Create a new entry chunk
    pub fn entry(name: String, entry: ModuleId) -> Self {
        Self::new(name, ChunkKind::Entry, Some(entry))
    }

    /// Create a new vendor chunk
    pub fn vendor(name: String) -> Self {
        Self::new(name, ChunkKind::Vendor, None)
    }

    /// Create a new library chunk
    pub fn library(name: String) -> Self {
        Self::new(name, ChunkKind::Library, None)
    }

    /// Create a new shared chunk
    pub fn shared(name: String) -> Self {
        Self::new(name, ChunkKind::Shared, None)
    }

    /// Check if chunk is empty
    pub fn is_empty(&self) -> bool {
        self.module_ids.is_empty()
    }

    /// Number of modules in chunk
    pub fn len(&self) -> usize {
        self.module_ids.len()
    }
}
